//! Crowd-density field.
//!
//! A coarse occupancy grid over the wraparound bounds, rebuilt every frame
//! while the visualizer is active. The integrator reads a central-difference
//! gradient of the over-density and pushes particles away from crowded
//! regions.

use glam::{Vec2, Vec3};
use stagedust_api::WorldRect;

/// Field resolution, fixed and independent of particle count.
pub const FIELD_COLS: usize = 48;
pub const FIELD_ROWS: usize = 27;

pub struct DensityField {
    bounds: WorldRect,
    counts: Vec<f32>,
    grad_x: Vec<f32>,
    grad_y: Vec<f32>,
    binned: usize,
    active: bool,
}

impl DensityField {
    pub fn new(bounds: WorldRect) -> Self {
        Self {
            bounds,
            counts: vec![0.0; FIELD_COLS * FIELD_ROWS],
            grad_x: vec![0.0; FIELD_COLS * FIELD_ROWS],
            grad_y: vec![0.0; FIELD_COLS * FIELD_ROWS],
            binned: 0,
            active: false,
        }
    }

    /// Particles binned inside the bounds on the last rebuild.
    pub fn binned(&self) -> usize {
        self.binned
    }

    pub fn counts(&self) -> &[f32] {
        &self.counts
    }

    /// Mark the field inactive; `gradient_at` returns zero until the next
    /// rebuild.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Full rebuild: clear, bin every particle's (x, y), then the gradient
    /// of (count − expected) per cell. Must complete before any gradient
    /// lookup this frame.
    pub fn rebuild(&mut self, positions: &[Vec3], bounds: WorldRect) {
        self.bounds = bounds;
        self.counts.fill(0.0);
        self.binned = 0;

        for p in positions {
            if let Some(cell) = self.cell_index(p.x, p.y) {
                self.counts[cell] += 1.0;
                self.binned += 1;
            }
        }

        // Over-density relative to a uniform spread; the constant expected
        // term cancels in the central differences.
        let expected = self.binned as f32 / (FIELD_COLS * FIELD_ROWS) as f32;
        for row in 0..FIELD_ROWS {
            for col in 0..FIELD_COLS {
                // Clamped neighbor lookups at the boundary
                let left = self.counts[row * FIELD_COLS + col.saturating_sub(1)] - expected;
                let right =
                    self.counts[row * FIELD_COLS + (col + 1).min(FIELD_COLS - 1)] - expected;
                let below = self.counts[col + FIELD_COLS * row.saturating_sub(1)] - expected;
                let above =
                    self.counts[col + FIELD_COLS * (row + 1).min(FIELD_ROWS - 1)] - expected;
                let here = row * FIELD_COLS + col;
                self.grad_x[here] = (right - left) * 0.5;
                self.grad_y[here] = (above - below) * 0.5;
            }
        }
        self.active = true;
    }

    /// Over-density gradient at a world point; zero outside the bounds or
    /// while inactive.
    pub fn gradient_at(&self, x: f32, y: f32) -> Vec2 {
        if !self.active {
            return Vec2::ZERO;
        }
        match self.cell_index(x, y) {
            Some(cell) => Vec2::new(self.grad_x[cell], self.grad_y[cell]),
            None => Vec2::ZERO,
        }
    }

    fn cell_index(&self, x: f32, y: f32) -> Option<usize> {
        let u = (x - self.bounds.left()) / self.bounds.w;
        let v = (y - self.bounds.bottom()) / self.bounds.h;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return None;
        }
        let col = ((u * FIELD_COLS as f32) as usize).min(FIELD_COLS - 1);
        let row = ((v * FIELD_ROWS as f32) as usize).min(FIELD_ROWS - 1);
        Some(row * FIELD_COLS + col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> WorldRect {
        WorldRect::from_w_h(32.0, 18.0)
    }

    #[test]
    fn test_counts_conserve_inside_particles() {
        let mut field = DensityField::new(bounds());
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, -3.0, 1.0),
            Vec3::new(-15.9, 8.9, 0.0),
            Vec3::new(100.0, 0.0, 0.0), // outside
        ];
        field.rebuild(&positions, bounds());
        assert_eq!(field.binned(), 3);
        assert_eq!(field.counts().iter().sum::<f32>() as usize, 3);
    }

    #[test]
    fn test_gradient_points_toward_crowd() {
        let mut field = DensityField::new(bounds());
        // Dense blob right of center
        let positions: Vec<Vec3> = (0..200)
            .map(|i| Vec3::new(6.0 + (i % 10) as f32 * 0.05, (i / 10) as f32 * 0.05, 0.0))
            .collect();
        field.rebuild(&positions, bounds());
        // Just left of the blob, density rises toward +x
        let g = field.gradient_at(5.4, 0.3);
        assert!(g.x > 0.0);
    }

    #[test]
    fn test_inactive_field_returns_zero() {
        let mut field = DensityField::new(bounds());
        field.rebuild(&[Vec3::ZERO], bounds());
        field.deactivate();
        assert_eq!(field.gradient_at(0.0, 0.0), Vec2::ZERO);
    }

    #[test]
    fn test_boundary_cells_are_clamped() {
        let mut field = DensityField::new(bounds());
        let positions = vec![Vec3::new(-15.99, -8.99, 0.0); 50];
        field.rebuild(&positions, bounds());
        // Corner lookup must not panic and must be finite
        let g = field.gradient_at(-15.99, -8.99);
        assert!(g.is_finite());
    }
}
