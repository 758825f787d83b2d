//! Per-frame force accumulation and integration.
//!
//! This is the hot path: every particle accumulates the blended two-regime
//! force stack (home spring, cursor sphere, ambient flow, per-bin audio
//! field, coarse band forces, density repulsion, boundary handling,
//! calm recenter), then integrates with damping and a speed clamp and
//! writes its render attributes. No allocation happens in here.

use glam::{Vec2, Vec3};
use stagedust_api::{AudioSnapshot, WorldRect, NUM_BINS};

use crate::config::Tunables;
use crate::engine::density::DensityField;
use crate::engine::home::{HomeLayout, NO_CELL};
use crate::engine::interact::InteractionLayer;
use crate::engine::store::ParticlePool;
use crate::engine::transition::TransitionController;

/// Guard for divisions by near-zero distances.
const EPS: f32 = 1e-4;

/// Bin ranges of the five coarse bands: low, low-mid, mid, mid-high, high.
const BAND_RANGES: [(usize, usize); 5] = [(0, 6), (6, 16), (16, 32), (32, 48), (48, NUM_BINS)];

/// Audio quantities derived once per frame, not per particle.
pub struct FrameAudio {
    pub energy: f32,
    pub bands: [f32; 5],
    pub band_transients: [f32; 5],
    /// Horizontal shake force for this frame, already oscillated
    pub shake: f32,
    /// World-space anchor of each bin (pan-steered x, band-mapped y)
    pub anchor_x: [f32; NUM_BINS],
    pub anchor_y: [f32; NUM_BINS],
    /// Nonlinear per-bin hit strength from transient energy
    pub hit: [f32; NUM_BINS],
}

impl FrameAudio {
    pub fn new() -> Self {
        Self {
            energy: 0.0,
            bands: [0.0; 5],
            band_transients: [0.0; 5],
            shake: 0.0,
            anchor_x: [0.0; NUM_BINS],
            anchor_y: [0.0; NUM_BINS],
            hit: [0.0; NUM_BINS],
        }
    }

    pub fn compute(
        &mut self,
        audio: &AudioSnapshot,
        world: WorldRect,
        tunables: &Tunables,
        clock: f32,
    ) {
        self.energy = audio.ambient_energy();

        for (band, &(lo, hi)) in BAND_RANGES.iter().enumerate() {
            let width = (hi - lo) as f32;
            self.bands[band] = audio.magnitudes[lo..hi].iter().sum::<f32>() / width;
            self.band_transients[band] = audio.transients[lo..hi].iter().sum::<f32>() / width;
        }

        let half_w = world.w * 0.5;
        for bin in 0..NUM_BINS {
            self.anchor_x[bin] = audio.pans[bin] * half_w * tunables.field.pan_spread;
            self.anchor_y[bin] =
                world.bottom() + (bin as f32 + 0.5) / NUM_BINS as f32 * world.h;
            self.hit[bin] = audio.transients[bin].powf(tunables.field.hit_exponent);
        }

        // Bass shake: lower dominant frequency means a stronger, slower
        // oscillation.
        let depth = ((tunables.emitter.jet_high_hz - audio.dominant_bass_hz)
            / (tunables.emitter.jet_high_hz - tunables.emitter.jet_low_hz).max(1e-3))
        .clamp(0.0, 1.0);
        let rate = tunables.bands.shake_rate_fast
            + (tunables.bands.shake_rate_slow - tunables.bands.shake_rate_fast) * depth;
        let amp = audio.bass_magnitude * tunables.bands.shake_gain * (0.5 + depth);
        self.shake = (clock * rate).sin() * amp;
    }
}

/// Precomputed unit sphere the cursor formation pulls particles onto.
pub struct CursorSphere {
    points: Vec<Vec3>,
}

impl CursorSphere {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: (0..capacity)
                .map(|i| crate::engine::home::fibonacci_sphere(i, capacity.max(1)))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, slot: usize) -> Vec3 {
        self.points[slot]
    }
}

/// Borrowed frame state for one integration pass.
pub struct ForcePass<'a> {
    pub pool: &'a mut ParticlePool,
    pub home: &'a HomeLayout,
    pub density: &'a DensityField,
    pub transition: &'a TransitionController,
    pub interact: &'a InteractionLayer,
    pub audio: &'a AudioSnapshot,
    pub frame: &'a FrameAudio,
    pub sphere: &'a CursorSphere,
    pub hovered_cell: Option<u32>,
    /// Envelope level per cell, precomputed for the frame
    pub cell_env: &'a [f32],
    /// Selection flag per cell, precomputed for the frame
    pub cell_selected: &'a [bool],
    pub tunables: &'a Tunables,
    pub world: WorldRect,
    pub clock: f32,
    pub dt: f32,
}

pub fn run(pass: ForcePass) {
    let ForcePass {
        pool,
        home,
        density,
        transition,
        interact,
        audio,
        frame,
        sphere,
        hovered_cell,
        cell_env,
        cell_selected,
        tunables,
        world,
        clock,
        dt,
    } = pass;

    let t = transition.visual_weight();
    let s = transition.stage_weight();
    let deploy = transition.deploy_eased();
    let pad = world.padded(tunables.world.wrap_pad);
    let half_w = world.w * 0.5;
    let margin = tunables.world.edge_margin;

    let cursor_strength = interact.cursor_strength();
    let cursor = interact.cursor_world();
    let cursor_on = s > 0.5 && cursor_strength > 0.01;
    let mut cursor_slots_used = 0usize;

    let drag = tunables.motion.stage_drag
        + (tunables.motion.visual_drag - tunables.motion.stage_drag) * t;
    let damping = (-drag * dt).exp();

    for i in 0..pool.len() {
        let p = pool.pos[i];
        let mut v = pool.vel[i];
        let phase = pool.phase[i];
        let origin = pool.origin[i];

        let mut force = Vec3::ZERO;
        let mut activity = 0.0f32;
        let mut home_distance = 0.0f32;
        let mut glow = 0.0f32;
        let mut hover_boost = false;

        let cell = home.cell_of(i);

        // 1. Grid spring toward the (displaced) home point
        if s > 1e-3 && cell != NO_CELL && transition.is_seeded(phase) {
            let center = home.center(cell);
            glow = cell_env[cell as usize];
            hover_boost = hovered_cell == Some(cell);

            let mut amp = tunables.grid.breathing_amp;
            if hover_boost {
                amp *= tunables.grid.hover_amp;
            }
            let theta = clock * tunables.grid.breathing_rate + phase * std::f32::consts::TAU;
            let sway = home.tangent(i) * theta.sin() * amp
                + home.bitangent(i) * (theta * 0.8).cos() * amp;

            let mut target = center + home.offset(i) * deploy + sway;
            if glow > 0.0 {
                // Envelope flash jitters the whole cell
                let j = tunables.grid.envelope_jitter * glow;
                target += Vec3::new(
                    (clock * 37.0 + phase * 61.0).sin(),
                    (clock * 41.0 + phase * 53.0).cos(),
                    (clock * 29.0 + phase * 47.0).sin(),
                ) * j;
            }

            let delta = target - p;
            home_distance = delta.length();
            // Stiffer recovery once knocked past the deadzone
            let stiffen = 1.0
                + (tunables.spring.stiffen_gain
                    * (home_distance - tunables.spring.deadzone).max(0.0))
                .min(tunables.spring.stiffen_max - 1.0);
            force += delta * tunables.spring.gain * stiffen * s;
        }

        // 2. Cursor-sphere formation, soundstage only
        if cursor_on {
            let to_cursor = Vec3::new(cursor.x - p.x, cursor.y - p.y, -p.z);
            let dist = to_cursor.length();
            if dist < tunables.cursor.radius {
                if cursor_slots_used < sphere.capacity() {
                    // Claim a sphere slot, first come first served
                    let slot = cursor_slots_used;
                    cursor_slots_used += 1;
                    let radius = tunables.cursor.sphere_radius * cursor_strength;
                    let target =
                        Vec3::new(cursor.x, cursor.y, 0.0) + sphere.point(slot) * radius;
                    let delta = target - p;
                    force += delta * tunables.cursor.spring_gain * cursor_strength;

                    let radial = to_cursor / (dist + EPS);
                    let orbit = Vec3::new(-radial.y, radial.x, 0.0);
                    force += orbit
                        * tunables.cursor.sway_gain
                        * cursor_strength
                        * (clock * 1.7 + phase * std::f32::consts::TAU).sin();
                } else {
                    // Out of slots: generic pull plus flatten toward the plane
                    let radial = to_cursor / (dist + EPS);
                    force += radial * tunables.cursor.fallback_gain * cursor_strength;
                    force.z -= p.z * tunables.cursor.flatten_gain * cursor_strength;
                }
            }
        }

        // 3. Ambient flow and thermal noise
        if t > 1e-3 {
            let flow = &tunables.flow;
            let k = flow.drift_scale;
            let drive = 0.35 + frame.energy * flow.energy_gain;
            let drift = Vec3::new(
                (p.y * k + clock * 0.7 + phase * std::f32::consts::TAU).sin()
                    + 0.5 * (p.y * k * 2.3 - clock * 0.4).sin(),
                (p.x * k * 1.3 - clock * 0.5 + phase * 4.0).sin()
                    + 0.5 * (p.x * k * 2.9 + clock * 0.3).cos(),
                0.3 * (p.x * k + p.y * k + clock * 0.6).sin(),
            );
            force += drift * flow.drift_gain * drive * t;

            let jitter = Vec3::new(
                (clock * 13.7 + phase * 97.0).sin(),
                (clock * 17.3 + phase * 131.0).cos(),
                (clock * 11.9 + phase * 73.0).sin(),
            );
            force += jitter * flow.noise_gain * (0.2 + frame.energy) * t;
            activity += frame.energy;
        }

        // 4. Per-bin audio field around the particle's own bin
        if t > 1e-3 {
            let field = &tunables.field;
            let bin_here = (((p.y - world.bottom()) / world.h * NUM_BINS as f32) as i32)
                .clamp(0, NUM_BINS as i32 - 1);
            let window = field.window as i32;
            for offset in -window..=window {
                let bin = bin_here + offset;
                if !(0..NUM_BINS as i32).contains(&bin) {
                    continue;
                }
                let bin = bin as usize;
                let magnitude = audio.magnitudes[bin];
                let hit = frame.hit[bin];
                if magnitude < 0.01 && hit < 0.01 {
                    continue;
                }
                let falloff = 1.0 / (1.0 + offset.abs() as f32);

                let anchor = Vec3::new(frame.anchor_x[bin], frame.anchor_y[bin], 0.0);
                let delta = anchor - p;
                let dist = delta.length();
                let dir = delta / (dist + EPS);

                force += dir * field.pull_gain * magnitude * falloff * t;
                force -= dir * field.push_gain * hit * falloff * t;

                // Alternate swirl handedness by bin so neighbors shear
                let handed = if bin % 2 == 0 { 1.0 } else { -1.0 };
                let swirl = Vec3::new(-dir.y, dir.x, 0.0) * handed;
                force += swirl * field.swirl_gain * magnitude * falloff * t;

                if dist < field.capture_radius {
                    force += dir * field.capture_gain * magnitude * t;
                }
                if dist < field.burst_radius && audio.transients[bin] > field.burst_threshold {
                    force -= dir
                        * field.burst_gain
                        * (audio.transients[bin] - field.burst_threshold)
                        * t;
                }

                // Stereo steering, kept coherent by the launch direction
                let pan = audio.pans[bin];
                let coherence = 0.5 + 0.5 * origin.x * pan.signum();
                force.x += pan * field.pan_gain * magnitude * falloff * coherence * t;

                activity += (magnitude + hit) * falloff;
            }
        }

        // 5. Coarse band directional forces
        if t > 1e-3 {
            let bands = &tunables.bands;
            let height_frac = ((p.y - world.bottom()) / world.h).clamp(0.0, 1.0);

            force.y += frame.bands[0] * bands.low_lift * (1.0 - height_frac) * t;

            let mid = (frame.bands[1] + frame.bands[2] + frame.bands[3]) / 3.0;
            let xn = p.x / (half_w + EPS);
            if xn.abs() > 0.6 {
                force.x -= xn.signum() * bands.mid_squeeze * mid * t;
            } else {
                force.x += xn.signum() * bands.mid_squeeze * 0.5 * mid * t;
            }
            let planar = Vec2::new(p.x, p.y);
            let r = planar.length();
            let swirl = Vec2::new(-planar.y, planar.x) / (r + EPS);
            force += Vec3::new(swirl.x, swirl.y, 0.0) * bands.mid_swirl * mid * t;

            force.y -= frame.bands[4] * bands.high_press * height_frac * t;
            let high_transient = frame.band_transients[4];
            if high_transient > bands.punch_threshold {
                force.y -= bands.high_punch * (high_transient - bands.punch_threshold) * t;
            }

            force.x += frame.shake * t;
            activity += frame.bands[0] + mid + frame.bands[4];
        }

        // 6. Crowd-density repulsion
        if t > tunables.density.active_threshold {
            let gradient = density.gradient_at(p.x, p.y);
            force -= Vec3::new(gradient.x, gradient.y, 0.0) * tunables.density.gain * t;
        }

        // 7. Boundary handling
        if t > 0.5 {
            // Inward mixing inside the edge margins
            let over_r = p.x - (world.right() - margin);
            if over_r > 0.0 {
                force.x -= tunables.world.edge_gain * (over_r / margin) * t;
            }
            let over_l = (world.left() + margin) - p.x;
            if over_l > 0.0 {
                force.x += tunables.world.edge_gain * (over_l / margin) * t;
            }
            let over_t = p.y - (world.top() - margin);
            if over_t > 0.0 {
                force.y -= tunables.world.edge_gain * (over_t / margin) * t;
            }
            let over_b = (world.bottom() + margin) - p.y;
            if over_b > 0.0 {
                force.y += tunables.world.edge_gain * (over_b / margin) * t;
            }
        } else if s > 0.5 {
            let r = p.length();
            if r > tunables.spring.confine_radius {
                force += -p * tunables.spring.confine_gain * s;
            }
        }

        // 8. Calm recenter, weaker the more audio is driving the particle
        let calm = tunables.motion.recenter_gain
            / (1.0 + activity * tunables.motion.recenter_activity_scale);
        force += -p * calm;

        // Integrate
        v += force * dt;
        v *= damping;

        let mut max_speed = tunables.motion.max_speed;
        if s > 0.5 && home_distance > tunables.spring.coalesce_distance {
            max_speed *= tunables.spring.coalesce_boost;
        }
        let speed = v.length();
        if speed > max_speed {
            v *= max_speed / (speed + EPS);
        }

        let mut p = p + v * dt;

        if t > 0.5 {
            // Reflect at the visible edge, wrap at the padded bounds
            let restitution = tunables.world.restitution;
            if p.x > world.right() && v.x > 0.0 {
                v.x = -v.x * restitution;
            } else if p.x < world.left() && v.x < 0.0 {
                v.x = -v.x * restitution;
            }
            if p.y > world.top() && v.y > 0.0 {
                v.y = -v.y * restitution;
            } else if p.y < world.bottom() && v.y < 0.0 {
                v.y = -v.y * restitution;
            }

            if p.x > pad.right() {
                p.x -= pad.w;
            } else if p.x < pad.left() {
                p.x += pad.w;
            }
            if p.y > pad.top() {
                p.y -= pad.h;
            } else if p.y < pad.bottom() {
                p.y += pad.h;
            }
        }

        pool.pos[i] = p;
        pool.vel[i] = v;

        // Render attributes
        let render = &tunables.render;

        let (mut stage_r, mut stage_g, mut stage_b) =
            if cell != NO_CELL && cell_selected[cell as usize] {
                (
                    render.stage_selected[0],
                    render.stage_selected[1],
                    render.stage_selected[2],
                )
            } else {
                (render.stage_base[0], render.stage_base[1], render.stage_base[2])
            };
        if glow > 0.0 {
            let g = glow * 0.8;
            stage_r += (render.glow[0] - stage_r) * g;
            stage_g += (render.glow[1] - stage_g) * g;
            stage_b += (render.glow[2] - stage_b) * g;
        }
        if hover_boost {
            stage_r = (stage_r * 1.15).min(1.0);
            stage_g = (stage_g * 1.15).min(1.0);
            stage_b = (stage_b * 1.15).min(1.0);
        }

        let bin_ratio = ((p.y - world.bottom()) / world.h).clamp(0.0, 1.0);
        let act = activity.min(1.0);
        let brightness = 0.55 + 0.45 * act;
        let visual_r = (render.visual_low[0]
            + (render.visual_high[0] - render.visual_low[0]) * bin_ratio)
            * brightness;
        let visual_g = (render.visual_low[1]
            + (render.visual_high[1] - render.visual_low[1]) * bin_ratio)
            * brightness;
        let visual_b = (render.visual_low[2]
            + (render.visual_high[2] - render.visual_low[2]) * bin_ratio)
            * brightness;

        pool.colors[i * 3] = (stage_r + (visual_r - stage_r) * t).clamp(0.0, 1.0);
        pool.colors[i * 3 + 1] = (stage_g + (visual_g - stage_g) * t).clamp(0.0, 1.0);
        pool.colors[i * 3 + 2] = (stage_b + (visual_b - stage_b) * t).clamp(0.0, 1.0);

        let stage_size = render.size_stage
            * (1.0 + 0.8 * glow + if hover_boost { 0.3 } else { 0.0 });
        let visual_size =
            render.size_visual + render.size_energy_gain * act + v.length() * 0.006;
        pool.sizes[i] = stage_size + (visual_size - stage_size) * t;

        let fade_in = (pool.age[i] / render.fade_in.max(EPS)).clamp(0.0, 1.0);
        let fade_out =
            ((pool.lifespan[i] - pool.age[i]) / render.fade_out.max(EPS)).clamp(0.0, 1.0);
        let visual_opacity = render.opacity_visual * fade_in * fade_out;
        pool.opacities[i] =
            render.opacity_stage + (visual_opacity - render.opacity_stage) * t;

        pool.positions[i * 3] = p.x;
        pool.positions[i * 3 + 1] = p.y;
        pool.positions[i * 3 + 2] = p.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_ranges_cover_all_bins() {
        let mut covered = 0;
        for (lo, hi) in BAND_RANGES {
            assert!(lo < hi);
            covered += hi - lo;
        }
        assert_eq!(covered, NUM_BINS);
        assert_eq!(BAND_RANGES[0].0, 0);
        assert_eq!(BAND_RANGES[4].1, NUM_BINS);
    }

    #[test]
    fn test_frame_audio_anchors_span_world_height() {
        let mut frame = FrameAudio::new();
        let world = WorldRect::from_w_h(32.0, 18.0);
        let tunables = Tunables::default();
        let audio = AudioSnapshot::silent();
        frame.compute(&audio, world, &tunables, 0.0);

        assert!(frame.anchor_y[0] > world.bottom());
        assert!(frame.anchor_y[NUM_BINS - 1] < world.top());
        assert!(frame.anchor_y[0] < frame.anchor_y[NUM_BINS - 1]);
    }

    #[test]
    fn test_shake_stronger_for_deeper_bass() {
        let world = WorldRect::from_w_h(32.0, 18.0);
        let tunables = Tunables::default();

        let mut audio = AudioSnapshot::silent();
        audio.bass_magnitude = 1.0;

        // Sample the oscillation envelope over time for both depths
        let peak = |hz: f32| {
            let mut frame = FrameAudio::new();
            let mut snapshot = audio.clone();
            snapshot.dominant_bass_hz = hz;
            let mut max = 0.0f32;
            for step in 0..200 {
                frame.compute(&snapshot, world, &tunables, step as f32 * 0.016);
                max = max.max(frame.shake.abs());
            }
            max
        };

        assert!(peak(35.0) > peak(115.0));
    }

    #[test]
    fn test_cursor_sphere_points_are_unit() {
        let sphere = CursorSphere::new(96);
        assert_eq!(sphere.capacity(), 96);
        for slot in 0..96 {
            assert!((sphere.point(slot).length() - 1.0).abs() < 1e-3);
        }
    }
}
