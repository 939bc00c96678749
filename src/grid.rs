//! Occupancy grid value type and read-only collision queries.
//!
//! The grid is received whole from the perception side, owned by the
//! orchestrator, and shared with an in-flight search as an `Arc` snapshot —
//! it is never mutated after construction. All collision queries go through
//! [`CostmapView`], which answers with [`CellState`] rather than panicking on
//! out-of-range coordinates.

use crate::core::{FrameId, Point2D, Pose2D};
use crate::error::{MargaError, Result};

/// Cost value bounds for grid cells.
pub mod costs {
    /// Known free space.
    pub const FREE: u8 = 0;
    /// Maximum cost, always an obstacle.
    pub const LETHAL: u8 = 255;
}

/// Integer cell coordinate within a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Result of a cell query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Free,
    Occupied,
    OutOfBounds,
}

/// A 2D occupancy grid with per-cell cost in [0, 255].
///
/// `origin` places cell (0, 0)'s corner within `frame`; cells extend along
/// the origin pose's rotated X/Y axes at `resolution` meters per cell.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    frame: FrameId,
    origin: Pose2D,
    resolution: f32,
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl OccupancyGrid {
    /// Build a grid from received metadata and cell data.
    ///
    /// Rejects non-positive resolution, zero dimensions, and mismatched data
    /// length as malformed input.
    pub fn new(
        frame: impl Into<FrameId>,
        origin: Pose2D,
        resolution: f32,
        width: usize,
        height: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        if resolution <= 0.0 {
            return Err(MargaError::InvalidInput(format!(
                "grid resolution must be positive, got {resolution}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(MargaError::InvalidInput(format!(
                "grid dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if data.len() != width * height {
            return Err(MargaError::InvalidInput(format!(
                "grid data length {} does not match {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            frame: frame.into(),
            origin,
            resolution,
            width,
            height,
            data,
        })
    }

    /// An all-free grid, useful for tests and simulation.
    pub fn empty(
        frame: impl Into<FrameId>,
        origin: Pose2D,
        resolution: f32,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        Self::new(
            frame,
            origin,
            resolution,
            width,
            height,
            vec![costs::FREE; width * height],
        )
    }

    pub fn frame(&self) -> &FrameId {
        &self.frame
    }

    pub fn origin(&self) -> Pose2D {
        self.origin
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw cost of a cell, `None` if outside the grid.
    #[inline]
    pub fn cost(&self, coord: GridCoord) -> Option<u8> {
        if coord.x < 0 || coord.y < 0 {
            return None;
        }
        let (x, y) = (coord.x as usize, coord.y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// Set the cost of a cell. Intended for grid construction in simulation
    /// and tests; a grid handed to the planner is never mutated.
    pub fn set_cost(&mut self, coord: GridCoord, cost: u8) {
        if coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
        {
            self.data[coord.y as usize * self.width + coord.x as usize] = cost;
        }
    }

    /// Fill a rectangle of cells with a cost (inclusive bounds, clamped).
    pub fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, cost: u8) {
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.set_cost(GridCoord::new(x, y), cost);
            }
        }
    }
}

/// Read-only query surface over an [`OccupancyGrid`].
///
/// Poses handed to a view must already be expressed in the grid's frame;
/// the view only converts between that frame and cell coordinates.
#[derive(Clone, Copy, Debug)]
pub struct CostmapView<'a> {
    grid: &'a OccupancyGrid,
    obstacle_threshold: u8,
}

impl<'a> CostmapView<'a> {
    pub fn new(grid: &'a OccupancyGrid, obstacle_threshold: u8) -> Self {
        Self {
            grid,
            obstacle_threshold,
        }
    }

    pub fn grid(&self) -> &OccupancyGrid {
        self.grid
    }

    /// State of a single cell.
    #[inline]
    pub fn state(&self, coord: GridCoord) -> CellState {
        match self.grid.cost(coord) {
            None => CellState::OutOfBounds,
            Some(cost) if cost >= self.obstacle_threshold => CellState::Occupied,
            Some(_) => CellState::Free,
        }
    }

    /// Whether a cell is inside the grid and below the obstacle threshold.
    #[inline]
    pub fn is_free(&self, coord: GridCoord) -> bool {
        self.state(coord) == CellState::Free
    }

    /// Convert a point in the grid's frame to a cell coordinate.
    #[inline]
    pub fn point_to_grid(&self, point: Point2D) -> GridCoord {
        let local = self.grid.origin.inverse_transform_point(point);
        GridCoord::new(
            (local.x / self.grid.resolution).floor() as i32,
            (local.y / self.grid.resolution).floor() as i32,
        )
    }

    /// Convert a cell coordinate to the cell-center point in the grid's frame.
    #[inline]
    pub fn grid_to_point(&self, coord: GridCoord) -> Point2D {
        let local = Point2D::new(
            (coord.x as f32 + 0.5) * self.grid.resolution,
            (coord.y as f32 + 0.5) * self.grid.resolution,
        );
        self.grid.origin.transform_point(local)
    }

    /// Check that every cell of a footprint template, offset to `center`, is
    /// free. Occupied and out-of-bounds cells both fail the check.
    pub fn footprint_free(&self, center: GridCoord, template: &[GridCoord]) -> bool {
        template.iter().all(|offset| {
            self.is_free(GridCoord::new(center.x + offset.x, center.y + offset.y))
        })
    }
}

/// Cell offsets covering a disc of the given radius, used as a vehicle
/// footprint template for collision checks.
pub fn disc_template(radius_m: f32, resolution: f32) -> Vec<GridCoord> {
    let r_cells = (radius_m / resolution).ceil() as i32;
    let r2 = (radius_m / resolution) * (radius_m / resolution);
    let mut cells = Vec::new();
    for dy in -r_cells..=r_cells {
        for dx in -r_cells..=r_cells {
            if (dx * dx + dy * dy) as f32 <= r2 {
                cells.push(GridCoord::new(dx, dy));
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn grid_with_wall() -> OccupancyGrid {
        let mut grid = OccupancyGrid::empty("costmap", Pose2D::identity(), 0.5, 20, 20).unwrap();
        grid.fill_rect(10, 0, 10, 19, costs::LETHAL);
        grid
    }

    #[test]
    fn test_rejects_malformed_grids() {
        assert!(OccupancyGrid::empty("c", Pose2D::identity(), 0.0, 10, 10).is_err());
        assert!(OccupancyGrid::empty("c", Pose2D::identity(), 0.5, 0, 10).is_err());
        assert!(OccupancyGrid::new("c", Pose2D::identity(), 0.5, 4, 4, vec![0; 3]).is_err());
    }

    #[test]
    fn test_cell_state() {
        let grid = grid_with_wall();
        let view = CostmapView::new(&grid, 100);
        assert_eq!(view.state(GridCoord::new(5, 5)), CellState::Free);
        assert_eq!(view.state(GridCoord::new(10, 5)), CellState::Occupied);
        assert_eq!(view.state(GridCoord::new(-1, 5)), CellState::OutOfBounds);
        assert_eq!(view.state(GridCoord::new(5, 20)), CellState::OutOfBounds);
    }

    #[test]
    fn test_point_grid_roundtrip() {
        let grid = grid_with_wall();
        let view = CostmapView::new(&grid, 100);
        let coord = view.point_to_grid(Point2D::new(2.6, 1.1));
        assert_eq!(coord, GridCoord::new(5, 2));
        let center = view.grid_to_point(coord);
        assert_relative_eq!(center.x, 2.75, epsilon = 1e-6);
        assert_relative_eq!(center.y, 1.25, epsilon = 1e-6);
    }

    #[test]
    fn test_rotated_origin() {
        let origin = Pose2D::new(1.0, 0.0, FRAC_PI_2);
        let grid = OccupancyGrid::empty("costmap", origin, 1.0, 10, 10).unwrap();
        let view = CostmapView::new(&grid, 100);
        // A point one meter along the grid's X axis lies at (1, 1) in frame.
        let coord = view.point_to_grid(Point2D::new(1.0, 1.5));
        assert_eq!(coord, GridCoord::new(1, 0));
    }

    #[test]
    fn test_footprint_blocked_by_wall_and_bounds() {
        let grid = grid_with_wall();
        let view = CostmapView::new(&grid, 100);
        let template = disc_template(0.6, grid.resolution());

        assert!(view.footprint_free(GridCoord::new(5, 10), &template));
        // Adjacent to the wall: disc overlaps an occupied cell.
        assert!(!view.footprint_free(GridCoord::new(9, 10), &template));
        // Near the border: disc leaves the grid.
        assert!(!view.footprint_free(GridCoord::new(0, 10), &template));
    }
}
