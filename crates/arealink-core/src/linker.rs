//! Hierarchy linker: assigns each child region to at most one parent.
//!
//! For each child, candidate parents are those with a bounding box
//! containing the child's center; the first candidate (in parent input
//! order) whose polygons contain the center exactly is the parent.
//! First-match-wins: overlapping parents are not disambiguated by area or
//! distance, so parent order must be preserved for reproducible results.
//! A child with no such parent stays unlinked; that is not an error.

use std::collections::HashMap;

use tracing::info;

use crate::geometry::{BoundingBox, Coordinate};
use crate::region::Region;

/// Source of candidate parents for a point.
///
/// Implementations must return indices into the parent slice they were
/// built from, in ascending order, and only for parents with a bounding
/// box containing the point. Any index that satisfies this contract gives
/// the same links as [`BboxScan`].
pub trait CandidateIndex {
    fn candidates(&self, point: Coordinate) -> Vec<usize>;
}

/// Linear scan over every parent's bounding boxes.
pub struct BboxScan<'a> {
    parents: &'a [Region],
}

impl<'a> BboxScan<'a> {
    pub fn new(parents: &'a [Region]) -> Self {
        Self { parents }
    }
}

impl CandidateIndex for BboxScan<'_> {
    fn candidates(&self, point: Coordinate) -> Vec<usize> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, p)| p.bbox_contains(point))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Upper bound on grid cells along either axis of the parents' extent.
const MAX_CELLS_PER_AXIS: f64 = 256.0;

/// Uniform grid over parent bounding boxes, for large parent lists.
pub struct GridIndex {
    cell_deg: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    bboxes: Vec<Vec<BoundingBox>>,
}

impl GridIndex {
    /// Build with square cells of `cell_deg` degrees.
    ///
    /// The size is clamped to at least 0.01 and grown so the parents'
    /// combined extent spans at most 256 cells per axis, which bounds the
    /// entries any single bounding box can add.
    pub fn new(parents: &[Region], cell_deg: f64) -> Self {
        let requested = if cell_deg.is_finite() { cell_deg.max(0.01) } else { 1.0 };
        let cell_deg = requested.max(extent_span(parents) / MAX_CELLS_PER_AXIS);
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();

        for (i, parent) in parents.iter().enumerate() {
            for bbox in &parent.bboxes {
                let (lat0, lon0) = cell_of(cell_deg, bbox.min_lat, bbox.min_lon);
                let (lat1, lon1) = cell_of(cell_deg, bbox.max_lat, bbox.max_lon);
                for lat in lat0..=lat1 {
                    for lon in lon0..=lon1 {
                        let slot = cells.entry((lat, lon)).or_default();
                        if slot.last() != Some(&i) {
                            slot.push(i);
                        }
                    }
                }
            }
        }

        Self {
            cell_deg,
            cells,
            bboxes: parents.iter().map(|p| p.bboxes.clone()).collect(),
        }
    }

    pub fn cell_deg(&self) -> f64 {
        self.cell_deg
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Larger side, in degrees, of the box enclosing every parent bbox.
fn extent_span(parents: &[Region]) -> f64 {
    let mut boxes = parents.iter().flat_map(|p| p.bboxes.iter());
    let Some(&first) = boxes.next() else {
        return 0.0;
    };
    let extent = boxes.fold(first, |acc, b| BoundingBox {
        min_lat: acc.min_lat.min(b.min_lat),
        min_lon: acc.min_lon.min(b.min_lon),
        max_lat: acc.max_lat.max(b.max_lat),
        max_lon: acc.max_lon.max(b.max_lon),
    });
    (extent.max_lat - extent.min_lat).max(extent.max_lon - extent.min_lon)
}

fn cell_of(cell_deg: f64, lat: f64, lon: f64) -> (i64, i64) {
    ((lat / cell_deg).floor() as i64, (lon / cell_deg).floor() as i64)
}

impl CandidateIndex for GridIndex {
    fn candidates(&self, point: Coordinate) -> Vec<usize> {
        let Some(slot) = self.cells.get(&cell_of(self.cell_deg, point.lat, point.lon)) else {
            return Vec::new();
        };
        let mut found: Vec<usize> = slot
            .iter()
            .copied()
            .filter(|&i| self.bboxes[i].iter().any(|b| b.contains(point)))
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

/// First candidate parent whose polygons contain `point`.
pub fn find_parent<I>(parents: &[Region], point: Coordinate, index: &I) -> Option<usize>
where
    I: CandidateIndex + ?Sized,
{
    index
        .candidates(point)
        .into_iter()
        .find(|&i| parents[i].polygon_contains(point))
}

/// Link every child to a parent with a linear bounding-box scan.
///
/// Returns one entry per child: the index into `parents`, or `None`.
pub fn link(parents: &[Region], children: &[Region]) -> Vec<Option<usize>> {
    link_with(parents, children, &BboxScan::new(parents))
}

/// Link using a caller-supplied candidate index built over `parents`.
pub fn link_with<I>(parents: &[Region], children: &[Region], index: &I) -> Vec<Option<usize>>
where
    I: CandidateIndex + ?Sized,
{
    let links: Vec<Option<usize>> = children
        .iter()
        .map(|child| find_parent(parents, child.center, index))
        .collect();

    let linked = links.iter().filter(|l| l.is_some()).count();
    info!(
        parents = parents.len(),
        children = children.len(),
        linked,
        unlinked = children.len() - linked,
        "linked region hierarchy"
    );
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Polygon, Ring};
    use crate::region::{AdminLevel, RegionTree};
    use crate::testing::{region_from_polygon, square_region};

    #[test]
    fn inside_and_outside_child() {
        // One province, one district inside it, one deliberately outside.
        let parents = vec![square_region("P", AdminLevel::Adm1, 0.0, 0.0, 10.0)];
        let children = vec![
            square_region("inside", AdminLevel::Adm2, 2.0, 2.0, 1.0),
            square_region("outside", AdminLevel::Adm2, 20.0, 20.0, 1.0),
        ];

        let links = link(&parents, &children);
        assert_eq!(links, vec![Some(0), None]);

        let tree = RegionTree::assemble("KOR", None, parents, children, &links);
        assert_eq!(tree.stats().linked, 1);
        assert_eq!(tree.stats().unlinked, 1);
        assert_eq!(tree.find("inside").unwrap().parent_id.as_deref(), Some("P"));
    }

    #[test]
    fn bbox_hit_without_polygon_hit_is_rejected() {
        // Triangle whose bbox covers the child center but whose outline does not.
        let triangle = Polygon::new(
            Ring::new(vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 10.0),
                Coordinate::new(10.0, 0.0),
            ]),
            vec![],
        );
        let parents = vec![region_from_polygon("T", AdminLevel::Adm1, triangle)];
        let children = vec![square_region("corner", AdminLevel::Adm2, 8.0, 8.0, 1.0)];

        assert!(parents[0].bbox_contains(children[0].center));
        assert_eq!(link(&parents, &children), vec![None]);
    }

    #[test]
    fn first_match_wins_for_overlapping_parents() {
        let parents = vec![
            square_region("A", AdminLevel::Adm1, 0.0, 0.0, 10.0),
            square_region("B", AdminLevel::Adm1, 0.0, 0.0, 10.0),
        ];
        let children = vec![square_region("c", AdminLevel::Adm2, 4.0, 4.0, 1.0)];
        assert_eq!(link(&parents, &children), vec![Some(0)]);

        let reversed: Vec<Region> = parents.into_iter().rev().collect();
        let links = link(&reversed, &children);
        assert_eq!(reversed[links[0].unwrap()].id, "B");
    }

    #[test]
    fn linking_is_idempotent() {
        let parents = vec![
            square_region("A", AdminLevel::Adm1, 0.0, 0.0, 5.0),
            square_region("B", AdminLevel::Adm1, 0.0, 5.0, 5.0),
        ];
        let children: Vec<Region> = (0..10)
            .map(|i| square_region(&format!("c{i}"), AdminLevel::Adm2, 1.0, i as f64, 0.5))
            .collect();
        let first = link(&parents, &children);
        let second = link(&parents, &children);
        assert_eq!(first, second);
    }

    #[test]
    fn grid_index_matches_linear_scan() {
        let parents: Vec<Region> = (0..6)
            .map(|i| square_region(&format!("p{i}"), AdminLevel::Adm1, 0.0, i as f64 * 3.0, 3.0))
            .collect();
        let children: Vec<Region> = (0..40)
            .map(|i| square_region(&format!("c{i}"), AdminLevel::Adm2, 1.0, i as f64 * 0.5 - 1.0, 0.2))
            .collect();

        let grid = GridIndex::new(&parents, 1.0);
        assert_eq!(link_with(&parents, &children, &grid), link(&parents, &children));
    }

    #[test]
    fn grid_over_country_sized_parent_stays_bounded() {
        // 40 degrees of latitude by 170 of longitude.
        let wide = Polygon::new(
            Ring::new(vec![
                Coordinate::new(-20.0, -85.0),
                Coordinate::new(-20.0, 85.0),
                Coordinate::new(20.0, 85.0),
                Coordinate::new(20.0, -85.0),
            ]),
            vec![],
        );
        let parents = vec![
            square_region("small", AdminLevel::Adm1, 10.0, 10.0, 0.5),
            region_from_polygon("wide", AdminLevel::Adm1, wide),
        ];
        let children = vec![
            square_region("in-small", AdminLevel::Adm2, 10.1, 10.1, 0.1),
            square_region("in-wide", AdminLevel::Adm2, 0.0, 50.0, 1.0),
            square_region("outside", AdminLevel::Adm2, 60.0, 0.0, 1.0),
        ];

        let grid = GridIndex::new(&parents, 0.01);
        assert!(grid.cell_deg() >= 170.0 / 256.0);
        assert!(grid.cell_count() <= 257 * 257);
        let links = link_with(&parents, &children, &grid);
        assert_eq!(links, vec![Some(0), Some(1), None]);
        assert_eq!(links, link(&parents, &children));
    }

    #[test]
    fn empty_inputs() {
        let parents = vec![square_region("A", AdminLevel::Adm1, 0.0, 0.0, 5.0)];
        assert!(link(&parents, &[]).is_empty());
        let children = vec![square_region("c", AdminLevel::Adm2, 1.0, 1.0, 1.0)];
        assert_eq!(link(&[], &children), vec![None]);
    }
}
