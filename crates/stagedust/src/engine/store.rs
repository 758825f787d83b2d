//! Columnar particle storage.
//!
//! All simulation state lives in fixed-capacity column vectors allocated
//! once at construction; the per-frame loops mutate them in place. Render
//! attributes are kept in flat arrays laid out for direct GPU upload.

use glam::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::Rng;
use stagedust_api::WorldRect;

use crate::config::EmitterTunables;

/// Spatial rule used to re-seed a particle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpawnStrategy {
    /// Small blob around the world center, launched outward
    Center,
    /// Uniform over the padded world bounds
    Everywhere,
    /// Random edge of the padded bounds, launched inward
    Perimeter,
    /// Band below the visible world, launched up and outward
    BassJet,
}

/// Fixed-capacity particle pool.
pub struct ParticlePool {
    // Simulation state, one entry per particle
    pub pos: Vec<Vec3>,
    pub vel: Vec<Vec3>,
    /// Unit direction the particle was launched in, 2D
    pub origin: Vec<Vec2>,
    /// Random constant per particle, in [0,1); decorrelates oscillations
    pub phase: Vec<f32>,
    pub age: Vec<f32>,
    pub lifespan: Vec<f32>,

    // Render attributes, flat for upload
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
    pub sizes: Vec<f32>,
    pub opacities: Vec<f32>,
}

impl ParticlePool {
    pub fn new(
        count: usize,
        world: WorldRect,
        tunables: &EmitterTunables,
        rng: &mut SmallRng,
    ) -> Self {
        let mut pool = Self {
            pos: vec![Vec3::ZERO; count],
            vel: vec![Vec3::ZERO; count],
            origin: vec![Vec2::X; count],
            phase: (0..count).map(|_| rng.random_range(0.0..1.0)).collect(),
            age: vec![0.0; count],
            lifespan: vec![1.0; count],
            positions: vec![0.0; count * 3],
            colors: vec![0.0; count * 3],
            sizes: vec![0.0; count],
            opacities: vec![0.0; count],
        };

        for i in 0..count {
            pool.respawn_at(i, SpawnStrategy::Everywhere, 1.0, world, tunables, rng);
            // Desynchronize first-generation expiry
            pool.age[i] = rng.random_range(0.0..pool.lifespan[i] * 0.8);
        }

        pool
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// Re-seed one particle in place: new position and velocity per the
    /// strategy, age zero, fresh lifespan, origin direction recomputed
    /// from the launch velocity.
    pub fn respawn_at(
        &mut self,
        i: usize,
        strategy: SpawnStrategy,
        launch_scale: f32,
        world: WorldRect,
        tunables: &EmitterTunables,
        rng: &mut SmallRng,
    ) {
        let half_w = world.w * 0.5;
        let half_h = world.h * 0.5;

        let (pos, vel) = match strategy {
            SpawnStrategy::Center => {
                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                let dir = Vec2::new(angle.cos(), angle.sin());
                // sqrt keeps the blob area-uniform
                let r = world.h * 0.15 * rng.random_range(0.0f32..1.0).sqrt();
                let pos = Vec3::new(
                    world.x + dir.x * r,
                    world.y + dir.y * r,
                    rng.random_range(-0.5..0.5),
                );
                let speed = rng.random_range(0.2..0.9) * launch_scale;
                (pos, Vec3::new(dir.x * speed, dir.y * speed, 0.0))
            }
            SpawnStrategy::Everywhere => {
                let pos = Vec3::new(
                    rng.random_range(world.left()..world.right()),
                    rng.random_range(world.bottom()..world.top()),
                    rng.random_range(-0.6..0.6),
                );
                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                let speed = rng.random_range(0.1..0.6) * launch_scale;
                (
                    pos,
                    Vec3::new(angle.cos() * speed, angle.sin() * speed, 0.0),
                )
            }
            SpawnStrategy::Perimeter => {
                // Pick an edge, then launch inward with some tangential drift
                let edge = rng.random_range(0..4);
                let (pos, inward) = match edge {
                    0 => (
                        Vec2::new(world.left(), rng.random_range(-half_h..half_h)),
                        Vec2::X,
                    ),
                    1 => (
                        Vec2::new(world.right(), rng.random_range(-half_h..half_h)),
                        Vec2::NEG_X,
                    ),
                    2 => (
                        Vec2::new(rng.random_range(-half_w..half_w), world.top()),
                        Vec2::NEG_Y,
                    ),
                    _ => (
                        Vec2::new(rng.random_range(-half_w..half_w), world.bottom()),
                        Vec2::Y,
                    ),
                };
                let tangent = Vec2::new(-inward.y, inward.x) * rng.random_range(-0.4..0.4);
                let dir = (inward + tangent).normalize_or_zero();
                let speed =
                    rng.random_range(0.6..1.0) * tunables.perimeter_launch * launch_scale;
                (
                    Vec3::new(pos.x, pos.y, rng.random_range(-0.3..0.3)),
                    Vec3::new(dir.x * speed, dir.y * speed, 0.0),
                )
            }
            SpawnStrategy::BassJet => {
                let x = rng.random_range(-half_w * 0.8..half_w * 0.8);
                let pos = Vec3::new(
                    world.x + x,
                    world.bottom() - rng.random_range(0.5..1.5),
                    rng.random_range(-0.3..0.3),
                );
                let up = rng.random_range(0.7..1.0) * launch_scale;
                let out = (x / half_w) * 0.3 * launch_scale;
                (pos, Vec3::new(out, up, 0.0))
            }
        };

        self.pos[i] = pos;
        self.vel[i] = vel;
        self.age[i] = 0.0;
        self.lifespan[i] = rng.random_range(tunables.lifespan_min..tunables.lifespan_max);

        let launch = Vec2::new(vel.x, vel.y);
        self.origin[i] = if launch.length_squared() > 1e-8 {
            launch.normalize()
        } else {
            let angle = self.phase[i] * std::f32::consts::TAU;
            Vec2::new(angle.cos(), angle.sin())
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn pool() -> (ParticlePool, SmallRng, WorldRect, EmitterTunables) {
        let mut rng = SmallRng::seed_from_u64(7);
        let world = WorldRect::from_w_h(32.0, 18.0);
        let tunables = EmitterTunables::default();
        let pool = ParticlePool::new(256, world, &tunables, &mut rng);
        (pool, rng, world, tunables)
    }

    #[test]
    fn test_new_pool_is_finite_and_aged_within_lifespan() {
        let (pool, _, _, _) = pool();
        for i in 0..pool.len() {
            assert!(pool.pos[i].is_finite());
            assert!(pool.vel[i].is_finite());
            assert!(pool.age[i] >= 0.0 && pool.age[i] < pool.lifespan[i]);
            assert!((pool.origin[i].length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_respawn_resets_age_and_draws_lifespan_in_range() {
        let (mut pool, mut rng, world, tunables) = pool();
        pool.age[3] = 100.0;
        pool.respawn_at(3, SpawnStrategy::Center, 1.0, world, &tunables, &mut rng);
        assert_eq!(pool.age[3], 0.0);
        assert!(pool.lifespan[3] >= tunables.lifespan_min);
        assert!(pool.lifespan[3] <= tunables.lifespan_max);
    }

    #[test]
    fn test_perimeter_spawn_launches_inward() {
        let (mut pool, mut rng, world, tunables) = pool();
        for _ in 0..50 {
            pool.respawn_at(0, SpawnStrategy::Perimeter, 1.0, world, &tunables, &mut rng);
            let p = pool.pos[0];
            let v = pool.vel[0];
            // Velocity must point back toward the interior
            let to_center = Vec2::new(world.x - p.x, world.y - p.y);
            assert!(to_center.dot(Vec2::new(v.x, v.y)) > 0.0);
        }
    }

    #[test]
    fn test_bass_jet_spawns_below_world_moving_up() {
        let (mut pool, mut rng, world, tunables) = pool();
        for _ in 0..50 {
            pool.respawn_at(0, SpawnStrategy::BassJet, 2.0, world, &tunables, &mut rng);
            assert!(pool.pos[0].y < world.bottom());
            assert!(pool.vel[0].y > 0.0);
        }
    }
}
