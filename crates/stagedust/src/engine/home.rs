//! Home-position layout for the soundstage grid.
//!
//! Assigns every particle to a grid cell and a fixed point on that cell's
//! small sphere, with a tangent basis for hover motion. Rebuilt only when
//! the grid dimensions change.

use glam::Vec3;
use stagedust_api::{CellKey, GridSize};

use crate::config::GridTunables;

/// Sentinel cell index for particles with no cell (empty grid).
pub const NO_CELL: u32 = u32::MAX;

/// Golden angle in radians, the azimuth step of the Fibonacci lattice.
const GOLDEN_ANGLE: f32 = 2.399_963_2;

pub struct HomeLayout {
    grid: GridSize,
    spacing: f32,
    /// World-space center of every cell, row-major
    centers: Vec<Vec3>,
    /// Per particle: fixed offset on the unit sphere, scaled by the radius
    offsets: Vec<Vec3>,
    /// Per particle: sphere normal at the home point
    normals: Vec<Vec3>,
    /// Per particle: orthonormal tangent pair at the home point
    tangents: Vec<Vec3>,
    bitangents: Vec<Vec3>,
    /// Per particle: owning cell index, or NO_CELL
    cell_of: Vec<u32>,
}

impl HomeLayout {
    pub fn build(grid: GridSize, particle_count: usize, tunables: &GridTunables) -> Self {
        let mut layout = Self {
            grid: GridSize::new(0, 0),
            spacing: tunables.max_spacing,
            centers: Vec::new(),
            offsets: vec![Vec3::ZERO; particle_count],
            normals: vec![Vec3::Z; particle_count],
            tangents: vec![Vec3::X; particle_count],
            bitangents: vec![Vec3::Y; particle_count],
            cell_of: vec![NO_CELL; particle_count],
        };
        layout.rebuild(grid, tunables);
        layout
    }

    /// Recompute the whole layout for new grid dimensions. O(N), amortized
    /// to grid changes only.
    pub fn rebuild(&mut self, grid: GridSize, tunables: &GridTunables) {
        self.grid = grid;

        let span = grid.rows.max(grid.cols).saturating_sub(1).max(1) as f32;
        self.spacing = (tunables.extent / span).min(tunables.max_spacing);

        let cells = grid.cell_count();
        self.centers.clear();
        self.centers.reserve(cells);
        for index in 0..cells {
            let key = grid.key_of(index);
            self.centers.push(self.center_for(key));
        }

        let n = self.cell_of.len();
        if cells == 0 {
            self.cell_of.fill(NO_CELL);
            self.offsets.fill(Vec3::ZERO);
            return;
        }

        // Every cell gets floor(n/cells); the first n % cells get one more.
        let base = n / cells;
        let remainder = n % cells;
        let mut particle = 0;
        for cell in 0..cells {
            let share = base + usize::from(cell < remainder);
            for slot in 0..share {
                let normal = fibonacci_sphere(slot, share.max(1));
                let (tangent, bitangent) = tangent_basis(normal);
                self.cell_of[particle] = cell as u32;
                self.offsets[particle] = normal * tunables.sphere_radius;
                self.normals[particle] = normal;
                self.tangents[particle] = tangent;
                self.bitangents[particle] = bitangent;
                particle += 1;
            }
        }
        debug_assert_eq!(particle, n);
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn cell_of(&self, particle: usize) -> u32 {
        self.cell_of[particle]
    }

    pub fn offset(&self, particle: usize) -> Vec3 {
        self.offsets[particle]
    }

    pub fn normal(&self, particle: usize) -> Vec3 {
        self.normals[particle]
    }

    pub fn tangent(&self, particle: usize) -> Vec3 {
        self.tangents[particle]
    }

    pub fn bitangent(&self, particle: usize) -> Vec3 {
        self.bitangents[particle]
    }

    pub fn center(&self, cell: u32) -> Vec3 {
        self.centers[cell as usize]
    }

    pub fn key_of_cell(&self, cell: u32) -> CellKey {
        self.grid.key_of(cell as usize)
    }

    fn center_for(&self, key: CellKey) -> Vec3 {
        let cx = (self.grid.cols.saturating_sub(1)) as f32 * 0.5;
        let cy = (self.grid.rows.saturating_sub(1)) as f32 * 0.5;
        Vec3::new(
            (key.col as f32 - cx) * self.spacing,
            (key.row as f32 - cy) * self.spacing,
            0.0,
        )
    }

    /// Nearest grid cell to a world point on the grid plane, if in range.
    pub fn nearest_cell(&self, x: f32, y: f32) -> Option<CellKey> {
        if self.grid.cell_count() == 0 {
            return None;
        }
        let cx = (self.grid.cols.saturating_sub(1)) as f32 * 0.5;
        let cy = (self.grid.rows.saturating_sub(1)) as f32 * 0.5;
        let key = CellKey::new(
            (x / self.spacing + cx).round() as i32,
            (y / self.spacing + cy).round() as i32,
        );
        if self.grid.contains(key) {
            Some(key)
        } else {
            None
        }
    }
}

/// Near-uniform point `i` of `n` on the unit sphere, golden-angle azimuth.
pub(crate) fn fibonacci_sphere(i: usize, n: usize) -> Vec3 {
    let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
    let ring = (1.0 - y * y).max(0.0).sqrt();
    let azimuth = GOLDEN_ANGLE * i as f32;
    Vec3::new(ring * azimuth.cos(), y, ring * azimuth.sin())
}

/// Orthonormal tangent pair for a unit normal.
fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
    let helper = if normal.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
    let tangent = helper.cross(normal).normalize_or_zero();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(layout: &HomeLayout, cells: usize) -> Vec<usize> {
        let mut counts = vec![0usize; cells];
        for i in 0..layout.cell_of.len() {
            counts[layout.cell_of(i) as usize] += 1;
        }
        counts
    }

    #[test]
    fn test_even_distribution_with_remainder() {
        let tunables = GridTunables::default();
        let layout = HomeLayout::build(GridSize::new(3, 4), 1001, &tunables);
        let counts = counts(&layout, 12);
        let base = 1001 / 12;
        for (cell, &count) in counts.iter().enumerate() {
            let expected = base + usize::from(cell < 1001 % 12);
            assert_eq!(count, expected);
        }
        assert_eq!(counts.iter().sum::<usize>(), 1001);
    }

    #[test]
    fn test_twelve_cells_1200_particles_exact_hundred_each() {
        let tunables = GridTunables::default();
        let layout = HomeLayout::build(GridSize::new(4, 3), 1200, &tunables);
        let counts = counts(&layout, 12);
        assert!(counts.iter().all(|&c| c == 100));
        for i in 0..1200 {
            let offset = layout.offset(i);
            assert!(offset.length() <= tunables.sphere_radius + 1e-4);
        }
    }

    #[test]
    fn test_sphere_points_are_unit_and_basis_orthonormal() {
        let tunables = GridTunables::default();
        let layout = HomeLayout::build(GridSize::new(2, 2), 400, &tunables);
        for i in 0..400 {
            let n = layout.normal(i);
            let t = layout.tangent(i);
            let b = layout.bitangent(i);
            assert!((n.length() - 1.0).abs() < 1e-3);
            assert!((t.length() - 1.0).abs() < 1e-3);
            assert!(n.dot(t).abs() < 1e-3);
            assert!(n.dot(b).abs() < 1e-3);
            assert!(t.dot(b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_nearest_cell_round_trip() {
        let tunables = GridTunables::default();
        let layout = HomeLayout::build(GridSize::new(5, 7), 1000, &tunables);
        for index in 0..layout.grid().cell_count() {
            let key = layout.grid().key_of(index);
            let center = layout.center(index as u32);
            assert_eq!(layout.nearest_cell(center.x, center.y), Some(key));
        }
        // Far outside the grid resolves to nothing
        assert_eq!(layout.nearest_cell(1e4, 1e4), None);
    }

    #[test]
    fn test_empty_grid_assigns_no_cells() {
        let tunables = GridTunables::default();
        let layout = HomeLayout::build(GridSize::new(0, 0), 64, &tunables);
        assert!((0..64).all(|i| layout.cell_of(i) == NO_CELL));
        assert_eq!(layout.nearest_cell(0.0, 0.0), None);
    }

    #[test]
    fn test_spacing_clamped_for_tiny_grids() {
        let tunables = GridTunables::default();
        let layout = HomeLayout::build(GridSize::new(2, 2), 100, &tunables);
        assert!(layout.spacing() <= tunables.max_spacing);
    }
}
