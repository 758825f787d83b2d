//! Audio-reactive particle engine.
//!
//! Animates a fixed population of point particles that blend continuously
//! between two regimes: a *soundstage* mode where particles coalesce onto a
//! grid of small spheres (one per selectable spatial test point), and a
//! *visualizer* mode where the same particles flow freely, driven by the
//! frequency content and stereo image of playing audio.
//!
//! The engine is renderer-agnostic: it consumes a [`FrameInput`] once per
//! display frame and writes per-particle position/color/size/opacity into
//! owned flat buffers, exposed through [`stagedust_api::Attributes`] for
//! direct upload to any point-rendering pipeline.

pub mod config;
pub mod engine;

pub use config::{QualityTier, Tunables};
pub use engine::drift::DriftBackend;
pub use engine::{create_backend, ParticleEngine};

// Re-exported so hosts and tests use the same versions the engine is built
// against.
pub use glam;
pub use stagedust_api as api;

pub use stagedust_api::{
    Attributes, AudioSnapshot, CellKey, FrameInput, GridEvent, GridSize, ParticleBackend,
    WorldRect, NUM_BINS,
};
