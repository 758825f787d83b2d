//! The particle engine.
//!
//! `ParticleEngine` owns every subsystem and all per-particle buffers, and
//! advances them in a fixed order once per rendered frame: clamp dt,
//! rebuild the home layout if the grid changed, ease the regime
//! transition, tick trigger envelopes, smooth the cursor, run emission,
//! rebuild the density field, then integrate forces and write render
//! attributes.

pub mod density;
pub mod drift;
pub mod emitter;
pub mod envelope;
pub mod forces;
pub mod home;
pub mod interact;
pub mod store;
pub mod transition;

use std::collections::HashSet;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use stagedust_api::{
    Attributes, AudioSnapshot, CellKey, FrameInput, GridEvent, GridSize, ParticleBackend,
    WorldRect,
};

use crate::config::{QualityTier, Tunables};
use density::DensityField;
use drift::DriftBackend;
use emitter::Emission;
use envelope::EnvelopeTracker;
use forces::{CursorSphere, ForcePass, FrameAudio};
use home::HomeLayout;
use interact::InteractionLayer;
use store::ParticlePool;
use transition::TransitionController;

/// Build the backend for a quality tier. `Low` gets the simplified drift
/// variant; everything else gets the full simulation.
pub fn create_backend(tier: QualityTier, tunables: Tunables) -> Box<dyn ParticleBackend> {
    if tier.uses_drift() {
        Box::new(DriftBackend::new(tier, tunables))
    } else {
        Box::new(ParticleEngine::new(tier, tunables))
    }
}

pub struct ParticleEngine {
    tunables: Tunables,
    world: WorldRect,
    pool: ParticlePool,
    home: HomeLayout,
    density: DensityField,
    envelopes: EnvelopeTracker,
    emission: Emission,
    transition: TransitionController,
    interact: InteractionLayer,
    frame_audio: FrameAudio,
    sphere: CursorSphere,
    silent: AudioSnapshot,
    /// Per-frame mirror of the caller-owned selection set
    selected: HashSet<CellKey>,
    /// Per-cell scratch recomputed each frame for the force pass
    cell_env: Vec<f32>,
    cell_selected: Vec<bool>,
    rng: SmallRng,
    clock: f32,
}

impl ParticleEngine {
    pub fn new(tier: QualityTier, tunables: Tunables) -> Self {
        Self::with_seed(tier, tunables, rand::random())
    }

    /// Deterministic construction for tests and reproducible captures.
    pub fn with_seed(tier: QualityTier, tunables: Tunables, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let world = WorldRect::from_w_h(tunables.world.width, tunables.world.height);
        let count = tier.particle_count();
        let pool = ParticlePool::new(count, world, &tunables.emitter, &mut rng);
        let home = HomeLayout::build(GridSize::new(0, 0), count, &tunables.grid);
        let density = DensityField::new(world.padded(tunables.world.wrap_pad));
        let sphere = CursorSphere::new(tunables.cursor.capacity);

        Self {
            world,
            pool,
            home,
            density,
            envelopes: EnvelopeTracker::new(),
            emission: Emission::new(),
            transition: TransitionController::new(),
            interact: InteractionLayer::new(),
            frame_audio: FrameAudio::new(),
            sphere,
            silent: AudioSnapshot::silent(),
            selected: HashSet::new(),
            cell_env: Vec::new(),
            cell_selected: Vec::new(),
            rng,
            clock: 0.0,
            tunables,
        }
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn world(&self) -> WorldRect {
        self.world
    }

    pub fn visual_weight(&self) -> f32 {
        self.transition.visual_weight()
    }
}

impl ParticleBackend for ParticleEngine {
    fn update_frame(&mut self, input: &FrameInput) {
        let dt = input.dt.clamp(0.0, self.tunables.motion.dt_max);
        self.clock += dt;

        // Analyzer not connected yet: simulate against silence
        let audio = if input.audio.active {
            input.audio
        } else {
            &self.silent
        };

        self.selected.clear();
        self.selected.extend(input.selected.iter().copied());

        // Layout must be rebuilt before the physics step reads it
        if input.grid != self.home.grid() {
            self.home.rebuild(input.grid, &self.tunables.grid);
            self.cell_env.resize(input.grid.cell_count(), 0.0);
            self.cell_selected.resize(input.grid.cell_count(), false);
        }

        self.transition
            .update(dt, input.is_playing, &self.tunables.transition);

        // The grid is inert while audio is playing
        self.interact.set_enabled(!input.is_playing);

        self.envelopes
            .tick(self.clock, input.triggered, input.beat_index, &self.selected);
        for index in 0..input.grid.cell_count() {
            let key = input.grid.key_of(index);
            self.cell_env[index] = self.envelopes.level(key);
            self.cell_selected[index] = self.selected.contains(&key);
        }

        self.interact.update_cursor(
            input.cursor,
            self.world,
            dt,
            self.tunables.cursor.activation_rate,
        );

        self.emission.update(
            dt,
            audio,
            self.transition.visual_weight(),
            &mut self.pool,
            self.world,
            &self.tunables.emitter,
            &mut self.rng,
        );

        // Density must be complete before any particle reads its gradient
        if self.transition.visual_weight() > self.tunables.density.active_threshold {
            self.density
                .rebuild(&self.pool.pos, self.world.padded(self.tunables.world.wrap_pad));
        } else {
            self.density.deactivate();
        }

        self.frame_audio
            .compute(audio, self.world, &self.tunables, self.clock);

        let hovered_cell = input
            .hovered
            .or(self.interact.hovered())
            .and_then(|key| input.grid.index_of(key))
            .map(|index| index as u32);

        forces::run(ForcePass {
            pool: &mut self.pool,
            home: &self.home,
            density: &self.density,
            transition: &self.transition,
            interact: &self.interact,
            audio,
            frame: &self.frame_audio,
            sphere: &self.sphere,
            hovered_cell,
            cell_env: &self.cell_env,
            cell_selected: &self.cell_selected,
            tunables: &self.tunables,
            world: self.world,
            clock: self.clock,
            dt,
        });
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
            positions: &self.pool.positions,
            colors: &self.pool.colors,
            sizes: &self.pool.sizes,
            opacities: &self.pool.opacities,
        }
    }

    fn particle_count(&self) -> usize {
        self.pool.len()
    }
}
