//! Engine configuration.
//!
//! Every force magnitude, rate, and threshold the simulation uses is a
//! named field here rather than a constant in the force code, so the host
//! can re-tune the motion (or ship a reduced-motion profile) without
//! touching the engine. User overrides load from `~/.stagedust.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

const CONFIG_TEMPLATE: &str = r#"# stagedust engine tunables
#
# Uncomment a section to override the built-in defaults. Values not listed
# here keep their defaults; see the Tunables docs for the full set.

# [world]
# width = 32.0
# height = 18.0
# wrap_pad = 1.5
# edge_margin = 2.0
# edge_gain = 4.0
# restitution = 0.55

# [grid]
# extent = 10.0
# max_spacing = 2.2
# sphere_radius = 0.38

# [motion]
# max_speed = 9.0
# stage_drag = 5.5
# visual_drag = 0.9

# [transition]
# to_visual_rate = 2.6
# to_stage_rate = 1.1
# deploy_secs = 1.6
"#;

/// Particle population tier, fixed at engine construction.
///
/// Changing tier reconstructs the engine; capacity is never resized in a
/// running session. `Low` selects the simplified drift backend instead of
/// the full simulation.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum QualityTier {
    Low,
    Medium,
    High,
    Ultra,
}

impl QualityTier {
    pub fn particle_count(&self) -> usize {
        match self {
            QualityTier::Low => 1_500,
            QualityTier::Medium => 6_000,
            QualityTier::High => 12_000,
            QualityTier::Ultra => 24_000,
        }
    }

    /// Whether this tier runs the simplified drift backend.
    pub fn uses_drift(&self) -> bool {
        matches!(self, QualityTier::Low)
    }
}

/// World bounds and edge behavior.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WorldTunables {
    /// Visible world width in world units
    pub width: f32,
    /// Visible world height in world units
    pub height: f32,
    /// Extra band beyond the visible edge where positions wrap toroidally
    pub wrap_pad: f32,
    /// Width of the inward-mixing band along each edge
    pub edge_margin: f32,
    /// Strength of the inward mixing force inside the margin band
    pub edge_gain: f32,
    /// Velocity kept after an edge bounce (0 = dead stop, 1 = elastic)
    pub restitution: f32,
}

impl Default for WorldTunables {
    fn default() -> Self {
        Self {
            width: 32.0,
            height: 18.0,
            wrap_pad: 1.5,
            edge_margin: 2.0,
            edge_gain: 4.0,
            restitution: 0.55,
        }
    }
}

/// Soundstage grid geometry and home-sphere motion.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GridTunables {
    /// Span the grid is fit into; spacing = extent / max(rows-1, cols-1)
    pub extent: f32,
    /// Upper bound on cell spacing for very small grids
    pub max_spacing: f32,
    /// Radius of each cell's home sphere
    pub sphere_radius: f32,
    /// Amplitude of the idle breathing/orbit oscillation
    pub breathing_amp: f32,
    /// Angular rate of the breathing oscillation, rad/s
    pub breathing_rate: f32,
    /// Breathing amplitude multiplier while the cell is hovered
    pub hover_amp: f32,
    /// Displacement amplitude driven by the trigger envelope
    pub envelope_jitter: f32,
}

impl Default for GridTunables {
    fn default() -> Self {
        Self {
            extent: 10.0,
            max_spacing: 2.2,
            sphere_radius: 0.38,
            breathing_amp: 0.05,
            breathing_rate: 1.3,
            hover_amp: 3.0,
            envelope_jitter: 0.45,
        }
    }
}

/// Home spring response.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SpringTunables {
    /// Base spring constant toward the home point
    pub gain: f32,
    /// Distance below which the spring stays at base stiffness
    pub deadzone: f32,
    /// Extra stiffness per world unit beyond the deadzone
    pub stiffen_gain: f32,
    /// Cap on the stiffness multiplier
    pub stiffen_max: f32,
    /// Distance from home beyond which the coalesce speed boost applies
    pub coalesce_distance: f32,
    /// Speed-limit multiplier while coalescing from far away
    pub coalesce_boost: f32,
    /// Gentle recentering spring for strays in soundstage mode
    pub confine_gain: f32,
    /// Radius beyond which the soundstage confinement engages
    pub confine_radius: f32,
}

impl Default for SpringTunables {
    fn default() -> Self {
        Self {
            gain: 14.0,
            deadzone: 0.25,
            stiffen_gain: 2.2,
            stiffen_max: 3.0,
            coalesce_distance: 2.0,
            coalesce_boost: 1.8,
            confine_gain: 0.8,
            confine_radius: 9.0,
        }
    }
}

/// Cursor-sphere formation.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CursorTunables {
    /// Attraction radius around the cursor
    pub radius: f32,
    /// Number of sphere slots; particles past this get the fallback pull
    pub capacity: usize,
    /// Radius of the formed sphere
    pub sphere_radius: f32,
    /// Spring constant toward an assigned sphere slot
    pub spring_gain: f32,
    /// Tangential orbital sway around the sphere
    pub sway_gain: f32,
    /// Generic pull for overflow particles still inside the radius
    pub fallback_gain: f32,
    /// Flatten-toward-plane force for overflow particles
    pub flatten_gain: f32,
    /// Rate of the smoothed activation scalar, 1/s
    pub activation_rate: f32,
}

impl Default for CursorTunables {
    fn default() -> Self {
        Self {
            radius: 3.2,
            capacity: 96,
            sphere_radius: 0.9,
            spring_gain: 22.0,
            sway_gain: 2.4,
            fallback_gain: 6.0,
            flatten_gain: 3.0,
            activation_rate: 9.0,
        }
    }
}

/// Ambient flow and thermal noise.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FlowTunables {
    /// Strength of the smooth sinusoidal drift
    pub drift_gain: f32,
    /// Spatial frequency of the drift field, 1/world-unit
    pub drift_scale: f32,
    /// Strength of the per-particle high-frequency jitter
    pub noise_gain: f32,
    /// How much ambient audio energy amplifies flow and jitter
    pub energy_gain: f32,
}

impl Default for FlowTunables {
    fn default() -> Self {
        Self {
            drift_gain: 1.1,
            drift_scale: 0.21,
            noise_gain: 2.6,
            energy_gain: 2.0,
        }
    }
}

/// Per-bin audio force field.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FieldTunables {
    /// Neighboring bins examined on each side of a particle's own bin
    pub window: usize,
    /// Pull toward a bin anchor per unit magnitude
    pub pull_gain: f32,
    /// Push away from a bin anchor per unit hit strength
    pub push_gain: f32,
    /// Exponent shaping transient energy into hit strength
    pub hit_exponent: f32,
    /// Tangential swirl per unit magnitude
    pub swirl_gain: f32,
    /// Radius of the short-range capture pull
    pub capture_radius: f32,
    /// Capture pull strength
    pub capture_gain: f32,
    /// Radius of the transient burst impulse
    pub burst_radius: f32,
    /// Transient level a bin must exceed to burst
    pub burst_threshold: f32,
    /// Outward burst impulse strength
    pub burst_gain: f32,
    /// Horizontal spread of bin anchors as a fraction of the half-width
    pub pan_spread: f32,
    /// Stereo steering force per unit pan
    pub pan_gain: f32,
}

impl Default for FieldTunables {
    fn default() -> Self {
        Self {
            window: 2,
            pull_gain: 3.4,
            push_gain: 5.2,
            hit_exponent: 1.6,
            swirl_gain: 2.8,
            capture_radius: 0.55,
            capture_gain: 18.0,
            burst_radius: 0.35,
            burst_threshold: 0.55,
            burst_gain: 60.0,
            pan_spread: 0.7,
            pan_gain: 4.2,
        }
    }
}

/// Coarse frequency-band directional forces.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BandTunables {
    /// Upward lift from the bottom per unit low-band energy
    pub low_lift: f32,
    /// Inward squeeze near the sides per unit mid energy
    pub mid_squeeze: f32,
    /// Swirl around the center per unit mid energy
    pub mid_swirl: f32,
    /// Downward press per unit high-band energy
    pub high_press: f32,
    /// Sharp extra press when the high-band transient spikes
    pub high_punch: f32,
    /// High-band transient level that triggers the punch
    pub punch_threshold: f32,
    /// Horizontal shake amplitude per unit bass power
    pub shake_gain: f32,
    /// Shake rate at the highest bass frequency, rad/s
    pub shake_rate_fast: f32,
    /// Shake rate at the lowest bass frequency, rad/s
    pub shake_rate_slow: f32,
}

impl Default for BandTunables {
    fn default() -> Self {
        Self {
            low_lift: 6.5,
            mid_squeeze: 3.0,
            mid_swirl: 2.2,
            high_press: 4.0,
            high_punch: 9.0,
            punch_threshold: 0.5,
            shake_gain: 1.6,
            shake_rate_fast: 18.0,
            shake_rate_slow: 7.0,
        }
    }
}

/// Crowd-density repulsion.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DensityTunables {
    /// Repulsion strength per unit density gradient
    pub gain: f32,
    /// Visualizer weight above which the field is rebuilt and applied
    pub active_threshold: f32,
}

impl Default for DensityTunables {
    fn default() -> Self {
        Self {
            gain: 1.9,
            active_threshold: 0.6,
        }
    }
}

/// Emission and respawn rates.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EmitterTunables {
    /// Ambient emission floor, particles per second
    pub base_rate: f32,
    /// Additional rate per unit ambient energy
    pub energy_rate: f32,
    /// Additional rate per unit global transient
    pub transient_rate: f32,
    /// Ambient emissions allowed in a single frame
    pub frame_cap: usize,
    /// Weighted choice between the spawn distributions
    pub weight_center: f32,
    pub weight_everywhere: f32,
    pub weight_perimeter: f32,
    /// Inward launch speed for perimeter spawns
    pub perimeter_launch: f32,
    /// New lifespans are drawn uniformly from this range, seconds
    pub lifespan_min: f32,
    pub lifespan_max: f32,
    /// Visualizer weight above which expired particles respawn
    pub respawn_threshold: f32,
    /// Low-bass power needed to open the jet
    pub jet_threshold: f32,
    /// Jet emission rate per unit power, particles per second
    pub jet_rate: f32,
    /// Jet emissions allowed in a single frame
    pub jet_cap: usize,
    /// Upward launch speed scale for jet spawns
    pub jet_launch: f32,
    /// Dominant bass frequency mapping: full jet weight at/below this
    pub jet_low_hz: f32,
    /// ...and zero weight at/above this
    pub jet_high_hz: f32,
    /// How much the bass transient boosts jet power
    pub jet_transient_gain: f32,
}

impl Default for EmitterTunables {
    fn default() -> Self {
        Self {
            base_rate: 6.0,
            energy_rate: 90.0,
            transient_rate: 140.0,
            frame_cap: 24,
            weight_center: 0.25,
            weight_everywhere: 0.35,
            weight_perimeter: 0.40,
            perimeter_launch: 3.0,
            lifespan_min: 4.0,
            lifespan_max: 11.0,
            respawn_threshold: 0.1,
            jet_threshold: 0.18,
            jet_rate: 220.0,
            jet_cap: 16,
            jet_launch: 7.0,
            jet_low_hz: 30.0,
            jet_high_hz: 120.0,
            jet_transient_gain: 1.5,
        }
    }
}

/// Regime transition easing.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TransitionTunables {
    /// Exponential approach rate toward the visualizer, 1/s
    pub to_visual_rate: f32,
    /// Approach rate back toward the soundstage (slower by design intent)
    pub to_stage_rate: f32,
    /// Distance to target below which the scalar snaps exactly
    pub snap_epsilon: f32,
    /// Length of the linear deploy ramp after returning to soundstage
    pub deploy_secs: f32,
}

impl Default for TransitionTunables {
    fn default() -> Self {
        Self {
            to_visual_rate: 2.6,
            to_stage_rate: 1.1,
            snap_epsilon: 1e-3,
            deploy_secs: 1.6,
        }
    }
}

/// Integration limits and damping.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MotionTunables {
    /// Exponential damping rate in soundstage mode, 1/s
    pub stage_drag: f32,
    /// Linear drag rate in visualizer mode, 1/s
    pub visual_drag: f32,
    /// Hard speed limit, world units per second
    pub max_speed: f32,
    /// Upper clamp on the frame delta, seconds
    pub dt_max: f32,
    /// Always-on recentering pull toward the world center
    pub recenter_gain: f32,
    /// How quickly audio activity suppresses the recentering pull
    pub recenter_activity_scale: f32,
}

impl Default for MotionTunables {
    fn default() -> Self {
        Self {
            stage_drag: 5.5,
            visual_drag: 0.9,
            max_speed: 9.0,
            dt_max: 1.0 / 30.0,
            recenter_gain: 0.35,
            recenter_activity_scale: 4.0,
        }
    }
}

/// Render attribute shaping.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RenderTunables {
    /// Base color of unselected grid particles
    pub stage_base: [f32; 3],
    /// Color of selected-cell particles
    pub stage_selected: [f32; 3],
    /// Color the trigger envelope glows toward
    pub glow: [f32; 3],
    /// Visualizer color at the lowest frequency bin
    pub visual_low: [f32; 3],
    /// Visualizer color at the highest frequency bin
    pub visual_high: [f32; 3],
    /// Point size in soundstage mode
    pub size_stage: f32,
    /// Base point size in visualizer mode
    pub size_visual: f32,
    /// Size added per unit local audio activity
    pub size_energy_gain: f32,
    /// Opacity in soundstage mode
    pub opacity_stage: f32,
    /// Opacity in visualizer mode
    pub opacity_visual: f32,
    /// Respawn fade-in length, seconds
    pub fade_in: f32,
    /// End-of-life fade-out length, seconds
    pub fade_out: f32,
}

impl Default for RenderTunables {
    fn default() -> Self {
        Self {
            stage_base: [0.42, 0.47, 0.58],
            stage_selected: [0.55, 0.80, 1.00],
            glow: [0.95, 0.98, 1.00],
            visual_low: [1.00, 0.45, 0.20],
            visual_high: [0.30, 0.65, 1.00],
            size_stage: 0.06,
            size_visual: 0.05,
            size_energy_gain: 0.16,
            opacity_stage: 0.85,
            opacity_visual: 0.75,
            fade_in: 0.4,
            fade_out: 0.8,
        }
    }
}

/// The complete tunables surface, one nested struct per concern.
#[derive(Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Tunables {
    pub world: WorldTunables,
    pub grid: GridTunables,
    pub spring: SpringTunables,
    pub cursor: CursorTunables,
    pub flow: FlowTunables,
    pub field: FieldTunables,
    pub bands: BandTunables,
    pub density: DensityTunables,
    pub emitter: EmitterTunables,
    pub transition: TransitionTunables,
    pub motion: MotionTunables,
    pub render: RenderTunables,
}

impl Tunables {
    fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".stagedust.toml"))
    }

    /// Load user overrides, falling back to defaults on any failure.
    ///
    /// Writes a commented template on first run so the file is
    /// discoverable.
    pub fn load() -> Self {
        let path = match Self::path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            let _ = fs::write(&path, CONFIG_TEMPLATE);
            println!("Created config template at {:?}", path);
        }

        fs::read_to_string(&path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Load a specific file, surfacing parse errors to the caller.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading tunables from {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("parsing tunables in {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_capacities_ascend() {
        let tiers = [
            QualityTier::Low,
            QualityTier::Medium,
            QualityTier::High,
            QualityTier::Ultra,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0].particle_count() < pair[1].particle_count());
        }
        assert!(QualityTier::Low.uses_drift());
        assert!(!QualityTier::High.uses_drift());
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let tunables: Tunables = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(tunables.world.width, WorldTunables::default().width);
        assert_eq!(tunables.emitter.frame_cap, EmitterTunables::default().frame_cap);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let tunables: Tunables = toml::from_str("[world]\nwidth = 40.0\n").unwrap();
        assert_eq!(tunables.world.width, 40.0);
        assert_eq!(tunables.world.height, WorldTunables::default().height);
        assert_eq!(tunables.spring.gain, SpringTunables::default().gain);
    }
}
