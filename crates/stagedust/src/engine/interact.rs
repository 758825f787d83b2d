//! Pointer interaction.
//!
//! Resolves gestures on the grid plane into cell select/deselect events
//! (drag-paint, at most once per gesture per cell), tracks hover, and
//! smooths the cursor-attraction activation used by the force pass.

use std::collections::HashSet;

use glam::Vec2;
use stagedust_api::{CellKey, GridEvent, WorldRect};

use crate::engine::home::HomeLayout;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DragMode {
    Select,
    Deselect,
}

pub struct InteractionLayer {
    enabled: bool,
    drag: Option<DragMode>,
    /// Cells already painted during the current gesture
    visited: HashSet<CellKey>,
    hovered: Option<CellKey>,
    /// Reused event buffer; cleared at the start of every pointer call
    events: Vec<GridEvent>,
    cursor_active: bool,
    cursor_world: Vec2,
    cursor_strength: f32,
}

impl InteractionLayer {
    pub fn new() -> Self {
        Self {
            enabled: true,
            drag: None,
            visited: HashSet::new(),
            hovered: None,
            events: Vec::new(),
            cursor_active: false,
            cursor_world: Vec2::ZERO,
            cursor_strength: 0.0,
        }
    }

    pub fn pointer_down(
        &mut self,
        world: Vec2,
        layout: &HomeLayout,
        selected: &HashSet<CellKey>,
    ) -> &[GridEvent] {
        self.events.clear();
        if !self.enabled {
            return &self.events;
        }

        if let Some(key) = layout.nearest_cell(world.x, world.y) {
            // The first cell touched fixes the gesture's mode
            let mode = if selected.contains(&key) {
                DragMode::Deselect
            } else {
                DragMode::Select
            };
            self.drag = Some(mode);
            self.visited.clear();
            self.visited.insert(key);
            self.events.push(match mode {
                DragMode::Select => GridEvent::Select(key),
                DragMode::Deselect => GridEvent::Deselect(key),
            });
        }
        &self.events
    }

    pub fn pointer_move(&mut self, world: Vec2, layout: &HomeLayout) -> &[GridEvent] {
        self.events.clear();
        if !self.enabled {
            return &self.events;
        }

        let cell = layout.nearest_cell(world.x, world.y);
        if cell != self.hovered {
            self.hovered = cell;
            self.events.push(GridEvent::HoverChange(cell));
        }

        if let (Some(mode), Some(key)) = (self.drag, cell) {
            // A cell revisited within one gesture is not toggled twice
            if self.visited.insert(key) {
                self.events.push(match mode {
                    DragMode::Select => GridEvent::Select(key),
                    DragMode::Deselect => GridEvent::Deselect(key),
                });
            }
        }
        &self.events
    }

    pub fn pointer_up(&mut self) -> &[GridEvent] {
        self.events.clear();
        self.drag = None;
        self.visited.clear();
        &self.events
    }

    pub fn pointer_leave(&mut self) -> &[GridEvent] {
        self.events.clear();
        self.drag = None;
        self.visited.clear();
        if self.hovered.take().is_some() {
            self.events.push(GridEvent::HoverChange(None));
        }
        &self.events
    }

    /// Enable or disable gesture handling. Disabling clears hover and any
    /// active drag.
    pub fn set_enabled(&mut self, enabled: bool) -> &[GridEvent] {
        self.events.clear();
        if self.enabled == enabled {
            return &self.events;
        }
        self.enabled = enabled;
        if !enabled {
            self.drag = None;
            self.visited.clear();
            if self.hovered.take().is_some() {
                self.events.push(GridEvent::HoverChange(None));
            }
        }
        &self.events
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn hovered(&self) -> Option<CellKey> {
        self.hovered
    }

    /// Map the normalized cursor into world space and ease the activation
    /// scalar toward its presence.
    pub fn update_cursor(
        &mut self,
        cursor: Option<[f32; 2]>,
        world: WorldRect,
        dt: f32,
        activation_rate: f32,
    ) {
        if let Some([u, v]) = cursor {
            self.cursor_active = true;
            self.cursor_world = Vec2::new(
                world.left() + u.clamp(0.0, 1.0) * world.w,
                world.bottom() + v.clamp(0.0, 1.0) * world.h,
            );
        } else {
            self.cursor_active = false;
        }

        let target = if self.cursor_active { 1.0 } else { 0.0 };
        self.cursor_strength +=
            (target - self.cursor_strength) * (1.0 - (-activation_rate * dt).exp());
    }

    pub fn cursor_world(&self) -> Vec2 {
        self.cursor_world
    }

    /// Smoothed cursor activation in [0,1].
    pub fn cursor_strength(&self) -> f32 {
        self.cursor_strength
    }
}

impl Default for InteractionLayer {
    fn default() -> Self {
        Self::new()
    }
}
