//! Backend trait and output attribute buffers

use glam::Vec2;

use crate::frame::{FrameInput, GridEvent};

/// Borrowed views of the per-particle render attributes.
///
/// Layouts match a point-rendering pipeline directly: positions and colors
/// are tightly packed xyz / rgb triples, sizes and opacities one float per
/// particle. The byte views exist for GPU upload without copying.
#[derive(Copy, Clone)]
pub struct Attributes<'a> {
    /// xyz per particle, world units
    pub positions: &'a [f32],
    /// rgb per particle, each component in [0,1]
    pub colors: &'a [f32],
    /// Point size per particle, world units
    pub sizes: &'a [f32],
    /// Opacity per particle in [0,1]
    pub opacities: &'a [f32],
}

impl<'a> Attributes<'a> {
    pub fn position_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.positions)
    }

    pub fn color_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.colors)
    }

    pub fn size_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.sizes)
    }

    pub fn opacity_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.opacities)
    }
}

/// One particle backend variant.
///
/// Implementations are selected at construction time (full engine, or the
/// simplified drift variant for low-end devices) and share this surface so
/// the host can swap them without touching its render path.
///
/// Pointer methods take world-space coordinates on the grid plane and
/// return the grid events the gesture produced this call. The returned
/// slice borrows an internal buffer and is valid until the next pointer
/// call.
pub trait ParticleBackend {
    /// Advance the simulation by one frame.
    fn update_frame(&mut self, input: &FrameInput);

    fn pointer_down(&mut self, world: Vec2) -> &[GridEvent];
    fn pointer_move(&mut self, world: Vec2) -> &[GridEvent];
    fn pointer_up(&mut self) -> &[GridEvent];
    fn pointer_leave(&mut self) -> &[GridEvent];

    /// Enable or disable grid interaction (the grid is inert during
    /// playback). Disabling clears hover and any active drag.
    fn set_interaction_enabled(&mut self, enabled: bool) -> &[GridEvent];

    /// Render attributes for the current frame.
    fn attributes(&self) -> Attributes<'_>;

    /// Number of live particles (constant per construction).
    fn particle_count(&self) -> usize;
}
