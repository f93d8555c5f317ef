//! Fixed-size latitude/longitude grid index.
//!
//! Buckets payloads into square cells of `cell_size` degrees so that "what is
//! near this point" becomes a handful of hash lookups instead of a scan over
//! every geometry vertex. Lookups over-approximate: callers refine candidates
//! with exact distances.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::domain::GeoPoint;

use super::distance::{METERS_PER_DEGREE_LAT, meters_per_degree_lng};

/// Cell coordinates: `(floor(lat / size), floor(lng / size))`.
pub type CellKey = (i32, i32);

/// A uniform grid mapping cells to the payloads whose geometry touches them.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cell_size: f64,
    cells: HashMap<CellKey, HashSet<T>>,
}

impl<T: Copy + Eq + Hash> SpatialGrid<T> {
    /// Create an empty grid with the given cell size in degrees.
    ///
    /// The cell size is fixed for the lifetime of the grid.
    pub fn new(cell_size_deg: f64) -> Self {
        Self {
            cell_size: cell_size_deg,
            cells: HashMap::new(),
        }
    }

    /// Cell size in degrees.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// The cell containing a point.
    pub fn cell_key(&self, point: GeoPoint) -> CellKey {
        (
            (point.lat() / self.cell_size).floor() as i32,
            (point.lng() / self.cell_size).floor() as i32,
        )
    }

    /// Record `payload` in the cell containing `point`.
    pub fn insert(&mut self, point: GeoPoint, payload: T) {
        let key = self.cell_key(point);
        self.cells.entry(key).or_default().insert(payload);
    }

    /// Record `payload` in every cell the straight segment `start`-`end` crosses.
    ///
    /// Walks the segment in steps of half a cell, which cannot skip a cell.
    pub fn insert_segment(&mut self, start: GeoPoint, end: GeoPoint, payload: T) {
        let span = (end.lat() - start.lat())
            .abs()
            .max((end.lng() - start.lng()).abs());
        let steps = ((span / (self.cell_size / 2.0)).ceil() as usize).max(1);

        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            self.insert(start.lerp(end, t), payload);
        }
    }

    /// Union of payloads in the `(2 * ring + 1)` square block of cells around
    /// the point's cell.
    ///
    /// When the block holds more cells than the grid has filled, the filled
    /// cells are scanned instead, so cost is bounded by the grid's size.
    pub fn neighbors(&self, point: GeoPoint, ring: u32) -> HashSet<T> {
        let (row, col) = self.cell_key(point);
        let (row, col, ring) = (i64::from(row), i64::from(col), i64::from(ring));
        let side = 2 * ring + 1;
        let mut found = HashSet::new();

        if side.saturating_mul(side) > self.cells.len() as i64 {
            for (&(r, c), payloads) in &self.cells {
                if (i64::from(r) - row).abs() <= ring && (i64::from(c) - col).abs() <= ring {
                    found.extend(payloads.iter().copied());
                }
            }
            return found;
        }

        for dr in -ring..=ring {
            for dc in -ring..=ring {
                let (Ok(r), Ok(c)) = (i32::try_from(row + dr), i32::try_from(col + dc)) else {
                    continue;
                };
                if let Some(payloads) = self.cells.get(&(r, c)) {
                    found.extend(payloads.iter().copied());
                }
            }
        }

        found
    }

    /// Number of cell rings needed to cover `radius_m` around `point`.
    ///
    /// Sized by the narrower (east-west) cell dimension at the point's
    /// latitude, so the block always contains the full search circle.
    pub fn ring_for_radius(&self, point: GeoPoint, radius_m: f64) -> u32 {
        let cell_height_m = self.cell_size * METERS_PER_DEGREE_LAT;
        let cell_width_m = self.cell_size * meters_per_degree_lng(point.lat());
        let narrowest = cell_width_m.min(cell_height_m).max(1.0);
        (radius_m.max(0.0) / narrowest).ceil() as u32
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    #[test]
    fn cell_key_floors_negative_longitudes() {
        let grid: SpatialGrid<u32> = SpatialGrid::new(0.01);
        assert_eq!(grid.cell_key(pt(54.905, -1.575)), (5490, -158));
        assert_eq!(grid.cell_key(pt(0.0, 0.0)), (0, 0));
        assert_eq!(grid.cell_key(pt(-0.001, -0.001)), (-1, -1));
    }

    #[test]
    fn neighbors_include_adjacent_cells_only_within_ring() {
        let mut grid = SpatialGrid::new(0.01);
        grid.insert(pt(54.905, -1.575), 1u32);
        grid.insert(pt(54.915, -1.575), 2u32); // one cell north
        grid.insert(pt(54.935, -1.575), 3u32); // three cells north

        let ring0 = grid.neighbors(pt(54.905, -1.575), 0);
        assert_eq!(ring0, HashSet::from([1]));

        let ring1 = grid.neighbors(pt(54.905, -1.575), 1);
        assert_eq!(ring1, HashSet::from([1, 2]));

        let ring3 = grid.neighbors(pt(54.905, -1.575), 3);
        assert_eq!(ring3, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn payloads_deduplicate_within_a_cell() {
        let mut grid = SpatialGrid::new(0.01);
        grid.insert(pt(54.901, -1.571), 7u32);
        grid.insert(pt(54.902, -1.572), 7u32);
        assert_eq!(grid.cell_count(), 1);
        assert_eq!(grid.neighbors(pt(54.901, -1.571), 0).len(), 1);
    }

    #[test]
    fn segment_insertion_covers_intermediate_cells() {
        let mut grid = SpatialGrid::new(0.01);
        // A single long segment spanning ten cells with no interior vertices
        grid.insert_segment(pt(54.805, -1.575), pt(54.905, -1.575), 9u32);

        for i in 0..10 {
            let lat = 54.805 + 0.01 * i as f64;
            assert!(
                grid.neighbors(pt(lat, -1.575), 0).contains(&9),
                "cell at {lat} not covered"
            );
        }
    }

    #[test]
    fn ring_for_radius_uses_narrow_dimension() {
        let grid: SpatialGrid<u32> = SpatialGrid::new(0.005);
        // At 54.9N a 0.005 degree cell is ~320 m wide and ~557 m tall
        let p = pt(54.9, -1.57);
        assert_eq!(grid.ring_for_radius(p, 0.0), 0);
        assert_eq!(grid.ring_for_radius(p, 75.0), 1);
        assert_eq!(grid.ring_for_radius(p, 300.0), 1);
        assert_eq!(grid.ring_for_radius(p, 500.0), 2);
    }

    #[test]
    fn huge_ring_scans_filled_cells() {
        let mut grid = SpatialGrid::new(0.005);
        grid.insert(pt(54.9, -1.57), 1u32);
        grid.insert(pt(51.5, -0.12), 2u32);
        grid.insert(pt(-33.9, 151.2), 3u32);

        let p = pt(54.8, -1.45);
        assert_eq!(grid.neighbors(p, u32::MAX), HashSet::from([1, 2, 3]));
        assert_eq!(grid.neighbors(p, 40), HashSet::from([1]));

        let ring = grid.ring_for_radius(p, 1e15);
        assert_eq!(ring, u32::MAX);
        assert_eq!(grid.neighbors(p, ring).len(), 3);
    }

    #[test]
    fn empty_grid() {
        let grid: SpatialGrid<u32> = SpatialGrid::new(0.01);
        assert!(grid.is_empty());
        assert!(grid.neighbors(pt(54.9, -1.57), 5).is_empty());
    }
}
