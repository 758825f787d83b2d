//! Per-frame engine input and grid events

use std::collections::HashSet;

use crate::audio::AudioSnapshot;
use crate::grid::{CellKey, GridSize};

/// Everything the engine reads for one frame.
///
/// Selection and audio buffers stay owned by the host and are borrowed
/// read-only; the engine owns all per-particle state.
pub struct FrameInput<'a> {
    /// Frame delta time in seconds (the engine clamps it again)
    pub dt: f32,
    /// Playback transport state; drives the regime transition
    pub is_playing: bool,
    /// Current grid dimensions
    pub grid: GridSize,
    /// Cells the user has selected
    pub selected: &'a HashSet<CellKey>,
    /// Cell currently firing a test signal, if any
    pub triggered: Option<CellKey>,
    /// Monotonic counter incremented on every trigger beat
    pub beat_index: u64,
    /// Cell under the pointer, if any
    pub hovered: Option<CellKey>,
    /// Pointer position in normalized [0,1]² window coordinates
    pub cursor: Option<[f32; 2]>,
    /// This frame's audio analysis
    pub audio: &'a AudioSnapshot,
}

/// Grid side effects produced by pointer gestures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GridEvent {
    Select(CellKey),
    Deselect(CellKey),
    HoverChange(Option<CellKey>),
}
