//! Simplified fallback backend.
//!
//! Low-end and reduced-motion tiers skip the full simulation: particles
//! sit near their grid home with a gentle 2D drift and a bass size pulse.
//! Grid selection and hover behave exactly like the full engine so the
//! host's interaction path is identical across variants.

use std::collections::HashSet;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use stagedust_api::{
    Attributes, CellKey, FrameInput, GridEvent, GridSize, ParticleBackend, WorldRect,
};

use crate::config::{QualityTier, Tunables};
use crate::engine::home::{HomeLayout, NO_CELL};
use crate::engine::interact::InteractionLayer;

pub struct DriftBackend {
    tunables: Tunables,
    world: WorldRect,
    home: HomeLayout,
    interact: InteractionLayer,
    selected: HashSet<CellKey>,
    phase: Vec<f32>,
    positions: Vec<f32>,
    colors: Vec<f32>,
    sizes: Vec<f32>,
    opacities: Vec<f32>,
    smoothed_bass: f32,
    clock: f32,
}

impl DriftBackend {
    pub fn new(tier: QualityTier, tunables: Tunables) -> Self {
        let mut rng = SmallRng::from_rng(&mut rand::rng());
        let count = tier.particle_count();
        let world = WorldRect::from_w_h(tunables.world.width, tunables.world.height);
        let home = HomeLayout::build(GridSize::new(0, 0), count, &tunables.grid);

        Self {
            world,
            home,
            interact: InteractionLayer::new(),
            selected: HashSet::new(),
            phase: (0..count).map(|_| rng.random_range(0.0..1.0)).collect(),
            positions: vec![0.0; count * 3],
            colors: vec![0.0; count * 3],
            sizes: vec![0.0; count],
            opacities: vec![0.0; count],
            smoothed_bass: 0.0,
            clock: 0.0,
            tunables,
        }
    }
}

impl ParticleBackend for DriftBackend {
    fn update_frame(&mut self, input: &FrameInput) {
        let dt = input.dt.clamp(0.0, self.tunables.motion.dt_max);
        self.clock += dt;

        self.selected.clear();
        self.selected.extend(input.selected.iter().copied());

        if input.grid != self.home.grid() {
            self.home.rebuild(input.grid, &self.tunables.grid);
        }
        self.interact.set_enabled(!input.is_playing);
        self.interact.update_cursor(
            input.cursor,
            self.world,
            dt,
            self.tunables.cursor.activation_rate,
        );

        let bass = if input.audio.active {
            input.audio.bass_magnitude
        } else {
            0.0
        };
        self.smoothed_bass += (bass - self.smoothed_bass) * 0.2;

        let render = &self.tunables.render;
        for i in 0..self.phase.len() {
            let phase = self.phase[i] * std::f32::consts::TAU;
            let cell = self.home.cell_of(i);
            let (center, selected) = if cell != NO_CELL {
                let key = self.home.key_of_cell(cell);
                (self.home.center(cell), self.selected.contains(&key))
            } else {
                (glam::Vec3::ZERO, false)
            };

            let sway = Vec2::new(
                (self.clock * 0.9 + phase).sin(),
                (self.clock * 1.1 + phase).cos(),
            ) * (0.12 + self.smoothed_bass * 0.2);

            let offset = self.home.offset(i);
            self.positions[i * 3] = center.x + offset.x + sway.x;
            self.positions[i * 3 + 1] = center.y + offset.y + sway.y;
            self.positions[i * 3 + 2] = 0.0;

            let color = if selected {
                render.stage_selected
            } else {
                render.stage_base
            };
            self.colors[i * 3] = color[0];
            self.colors[i * 3 + 1] = color[1];
            self.colors[i * 3 + 2] = color[2];

            self.sizes[i] = render.size_stage * (1.0 + self.smoothed_bass * 0.6);
            self.opacities[i] = render.opacity_stage;
        }
    }

    fn pointer_down(&mut self, world: Vec2) -> &[GridEvent] {
        self.interact.pointer_down(world, &self.home, &self.selected)
    }

    fn pointer_move(&mut self, world: Vec2) -> &[GridEvent] {
        self.interact.pointer_move(world, &self.home)
    }

    fn pointer_up(&mut self) -> &[GridEvent] {
        self.interact.pointer_up()
    }

    fn pointer_leave(&mut self) -> &[GridEvent] {
        self.interact.pointer_leave()
    }

    fn set_interaction_enabled(&mut self, enabled: bool) -> &[GridEvent] {
        self.interact.set_enabled(enabled)
    }

    fn attributes(&self) -> Attributes<'_> {
        Attributes {
            positions: &self.positions,
            colors: &self.colors,
            sizes: &self.sizes,
            opacities: &self.opacities,
        }
    }

    fn particle_count(&self) -> usize {
        self.phase.len()
    }
}
