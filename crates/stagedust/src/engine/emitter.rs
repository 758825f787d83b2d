//! Emission and respawn.
//!
//! Ages the population and re-seeds particles along two independent paths:
//! an ambient emitter whose rate follows the overall audio energy, and a
//! low-frequency jet that opens when the bass is both loud and deep.
//! Fractional emission counters carry over between frames so sub-particle
//! rates still emit eventually.

use rand::rngs::SmallRng;
use rand::Rng;
use stagedust_api::{AudioSnapshot, WorldRect};

use crate::config::EmitterTunables;
use crate::engine::store::{ParticlePool, SpawnStrategy};

pub struct Emission {
    ambient_carry: f32,
    jet_carry: f32,
    /// Round-robin pick of the next particle to re-seed
    next_particle: usize,
}

impl Emission {
    pub fn new() -> Self {
        Self {
            ambient_carry: 0.0,
            jet_carry: 0.0,
            next_particle: 0,
        }
    }

    /// Derived low-bass power: magnitude boosted by the transient, weighted
    /// by how deep the dominant bass frequency sits in the jet window.
    pub fn low_bass_power(audio: &AudioSnapshot, tunables: &EmitterTunables) -> f32 {
        let depth = (tunables.jet_high_hz - audio.dominant_bass_hz)
            / (tunables.jet_high_hz - tunables.jet_low_hz).max(1e-3);
        audio.bass_magnitude
            * (1.0 + audio.bass_transient * tunables.jet_transient_gain)
            * depth.clamp(0.0, 1.0)
    }

    /// Age the population and run both emitters for one frame.
    pub fn update(
        &mut self,
        dt: f32,
        audio: &AudioSnapshot,
        visual_weight: f32,
        pool: &mut ParticlePool,
        world: WorldRect,
        tunables: &EmitterTunables,
        rng: &mut SmallRng,
    ) {
        // Aging and natural expiry
        for i in 0..pool.len() {
            pool.age[i] += dt;
            if pool.age[i] >= pool.lifespan[i] {
                if visual_weight > tunables.respawn_threshold {
                    let strategy = self.pick_ambient_strategy(tunables, rng);
                    pool.respawn_at(i, strategy, 1.0, world, tunables, rng);
                } else {
                    // Grid particles never expire; hold just under the bound
                    pool.age[i] = pool.lifespan[i] - 1e-3;
                }
            }
        }

        // Audio-driven emission belongs to the visualizer regime
        if visual_weight < 0.5 {
            return;
        }

        let energy = audio.ambient_energy();
        let transient = audio.global_transient();

        let ambient_rate = tunables.base_rate
            + energy * tunables.energy_rate
            + transient * tunables.transient_rate;
        self.ambient_carry += ambient_rate * dt;
        let ambient_emit = (self.ambient_carry as usize).min(tunables.frame_cap);
        self.ambient_carry -= ambient_emit as f32;
        for _ in 0..ambient_emit {
            let i = self.claim(pool.len());
            let strategy = self.pick_ambient_strategy(tunables, rng);
            pool.respawn_at(i, strategy, 1.0, world, tunables, rng);
        }

        let power = Self::low_bass_power(audio, tunables);
        if power > tunables.jet_threshold {
            self.jet_carry += power * tunables.jet_rate * dt;
            let jet_emit = (self.jet_carry as usize).min(tunables.jet_cap);
            self.jet_carry -= jet_emit as f32;
            let launch = tunables.jet_launch * (0.5 + power);
            for _ in 0..jet_emit {
                let i = self.claim(pool.len());
                pool.respawn_at(i, SpawnStrategy::BassJet, launch, world, tunables, rng);
            }
        } else {
            self.jet_carry = 0.0;
        }
    }

    fn claim(&mut self, pool_len: usize) -> usize {
        let i = self.next_particle % pool_len.max(1);
        self.next_particle = self.next_particle.wrapping_add(1);
        i
    }

    fn pick_ambient_strategy(
        &self,
        tunables: &EmitterTunables,
        rng: &mut SmallRng,
    ) -> SpawnStrategy {
        let total =
            tunables.weight_center + tunables.weight_everywhere + tunables.weight_perimeter;
        let roll = rng.random_range(0.0..total.max(1e-6));
        if roll < tunables.weight_center {
            SpawnStrategy::Center
        } else if roll < tunables.weight_center + tunables.weight_everywhere {
            SpawnStrategy::Everywhere
        } else {
            SpawnStrategy::Perimeter
        }
    }
}

impl Default for Emission {
    fn default() -> Self {
        Self::new()
    }
}
