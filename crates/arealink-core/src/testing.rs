//! Region fixtures shared by unit tests.

use crate::geometry::{Coordinate, Polygon, Ring};
use crate::region::{AdminLevel, ExternalRefs, Region};

pub(crate) fn region_from_polygon(id: &str, level: AdminLevel, polygon: Polygon) -> Region {
    let bbox = polygon.bounding_box().expect("fixture polygon is not degenerate");
    let center = polygon.interior_point().expect("fixture polygon has an interior point");
    Region {
        id: id.to_string(),
        name: id.to_string(),
        level,
        country_code: "KOR".into(),
        group: None,
        iso_code: None,
        polygons: vec![polygon],
        bboxes: vec![bbox],
        center,
        parent_id: None,
        parent: None,
        children: vec![],
        external: ExternalRefs::default(),
    }
}

/// Axis-aligned square with its south-west corner at (`lat`, `lon`).
pub(crate) fn square_region(id: &str, level: AdminLevel, lat: f64, lon: f64, size: f64) -> Region {
    let polygon = Polygon::new(
        Ring::new(vec![
            Coordinate::new(lat, lon),
            Coordinate::new(lat, lon + size),
            Coordinate::new(lat + size, lon + size),
            Coordinate::new(lat + size, lon),
        ]),
        vec![],
    );
    region_from_polygon(id, level, polygon)
}
