//! Per-frame audio snapshot consumed by the engine
//!
//! The snapshot is produced once per frame by an external analyzer. The
//! engine never touches samples or FFTs; it only reads these values.

/// Number of frequency bins in the per-bin arrays
pub const NUM_BINS: usize = 64;

/// One frame of already-analyzed audio.
///
/// Bin 0 is the lowest frequency. `pans` runs −1.0 (hard left) to +1.0
/// (hard right). When `active` is false the analyzer is not connected and
/// every field must be treated as zero.
#[derive(Clone)]
pub struct AudioSnapshot {
    /// Per-bin magnitude (0-1, smoothed upstream)
    pub magnitudes: [f32; NUM_BINS],
    /// Per-bin transient energy (0-1, spikes on onsets)
    pub transients: [f32; NUM_BINS],
    /// Per-bin stereo pan position (−1 left … +1 right)
    pub pans: [f32; NUM_BINS],
    /// Combined low-end magnitude (0-1)
    pub bass_magnitude: f32,
    /// Low-end transient energy (0-1)
    pub bass_transient: f32,
    /// Dominant frequency of the low end, in Hz
    pub dominant_bass_hz: f32,
    /// False while the analyzer is not yet connected
    pub active: bool,
}

impl AudioSnapshot {
    /// All-zero snapshot, marked inactive.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Mean bin magnitude, used as the global energy of the frame.
    pub fn ambient_energy(&self) -> f32 {
        self.magnitudes.iter().sum::<f32>() / NUM_BINS as f32
    }

    /// Mean bin transient, used as the global onset strength of the frame.
    pub fn global_transient(&self) -> f32 {
        self.transients.iter().sum::<f32>() / NUM_BINS as f32
    }
}

impl Default for AudioSnapshot {
    fn default() -> Self {
        Self {
            magnitudes: [0.0; NUM_BINS],
            transients: [0.0; NUM_BINS],
            pans: [0.0; NUM_BINS],
            bass_magnitude: 0.0,
            bass_transient: 0.0,
            dominant_bass_hz: 0.0,
            active: false,
        }
    }
}
