//! Boundary mapper: raw boundary features → typed [`Region`] records.
//!
//! One administrative level is mapped at a time. Features with missing
//! properties or unusable geometry are data defects: they are dropped and
//! reported as [`Diagnostic`]s, never as errors, because partial ingestion
//! of upstream boundary data is normal.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::feature::{Feature, FeatureCollection};
use crate::geometry::{BoundingBox, Coordinate, Polygon};
use crate::region::{AdminLevel, ExternalRefs, Region};

/// Property keys to read from each feature. Defaults follow geoBoundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyKeys {
    pub id: String,
    pub name: String,
    pub group: String,
    pub iso: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            id: "shapeID".into(),
            name: "shapeName".into(),
            group: "shapeGroup".into(),
            iso: "shapeISO".into(),
        }
    }
}

/// Why a feature was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DropReason {
    MissingProperty(String),
    NoUsablePolygon,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingProperty(key) => write!(f, "missing property {key}"),
            Self::NoUsablePolygon => f.write_str("no polygon with at least three points"),
        }
    }
}

/// A dropped feature, identified by its position in the input batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: AdminLevel,
    pub feature_index: usize,
    pub id: Option<String>,
    pub reason: DropReason,
}

/// Result of mapping one level. `regions` keeps input order.
#[derive(Debug, Clone, Default)]
pub struct MapOutcome {
    pub regions: Vec<Region>,
    pub dropped: Vec<Diagnostic>,
}

/// Maps boundary features of one country.
#[derive(Debug, Clone)]
pub struct BoundaryMapper {
    country_code: String,
    keys: PropertyKeys,
}

impl BoundaryMapper {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            keys: PropertyKeys::default(),
        }
    }

    pub fn with_keys(mut self, keys: PropertyKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn map_level(&self, level: AdminLevel, collection: &FeatureCollection) -> MapOutcome {
        let outcome = match level {
            AdminLevel::Adm0 => self.map_with(level, collection, |f| self.adm0_identity(f)),
            AdminLevel::Adm1 => self.map_with(level, collection, |f| self.adm1_identity(f)),
            AdminLevel::Adm2 => self.map_with(level, collection, |f| self.adm2_identity(f)),
        };
        info!(
            country = %self.country_code,
            level = %level,
            mapped = outcome.regions.len(),
            dropped = outcome.dropped.len(),
            "mapped boundary features"
        );
        outcome
    }

    /// Country outline. Requires an id; the name falls back to the country code.
    pub fn map_adm0(&self, collection: &FeatureCollection) -> MapOutcome {
        self.map_level(AdminLevel::Adm0, collection)
    }

    /// First-level regions. Requires id, name, group and ISO code.
    pub fn map_adm1(&self, collection: &FeatureCollection) -> MapOutcome {
        self.map_level(AdminLevel::Adm1, collection)
    }

    /// Second-level regions. Requires an id; the name falls back through
    /// name → ISO code → id so no region is ever unnamed.
    pub fn map_adm2(&self, collection: &FeatureCollection) -> MapOutcome {
        self.map_level(AdminLevel::Adm2, collection)
    }

    fn map_with<F>(&self, level: AdminLevel, collection: &FeatureCollection, identity: F) -> MapOutcome
    where
        F: Fn(&Feature) -> Result<Identity, DropReason>,
    {
        let mut outcome = MapOutcome::default();

        for (feature_index, feature) in collection.features.iter().enumerate() {
            let result = identity(feature).and_then(|ident| self.build(level, feature, ident));
            match result {
                Ok(region) => outcome.regions.push(region),
                Err(reason) => {
                    let id = feature.string_property(&self.keys.id);
                    debug!(
                        country = %self.country_code,
                        level = %level,
                        feature_index,
                        id = id.as_deref().unwrap_or("-"),
                        reason = %reason,
                        "dropping boundary feature"
                    );
                    outcome.dropped.push(Diagnostic {
                        level,
                        feature_index,
                        id,
                        reason,
                    });
                }
            }
        }

        outcome
    }

    fn build(&self, level: AdminLevel, feature: &Feature, ident: Identity) -> Result<Region, DropReason> {
        let (polygons, bboxes) = usable_polygons(feature.polygons());
        // Every polygon with a bounding box has an interior point, so this
        // only fails when none survived.
        let center = representative_point(&polygons).ok_or(DropReason::NoUsablePolygon)?;

        Ok(Region {
            id: ident.id,
            name: ident.name,
            level,
            country_code: self.country_code.clone(),
            group: ident.group,
            iso_code: ident.iso,
            polygons,
            bboxes,
            center,
            parent_id: None,
            parent: None,
            children: Vec::new(),
            external: ExternalRefs::default(),
        })
    }

    fn required(&self, feature: &Feature, key: &str) -> Result<String, DropReason> {
        feature
            .string_property(key)
            .ok_or_else(|| DropReason::MissingProperty(key.to_string()))
    }

    fn adm0_identity(&self, feature: &Feature) -> Result<Identity, DropReason> {
        let id = self.required(feature, &self.keys.id)?;
        let name = feature
            .string_property(&self.keys.name)
            .unwrap_or_else(|| self.country_code.clone());
        Ok(Identity {
            id,
            name,
            group: feature.string_property(&self.keys.group),
            iso: feature.string_property(&self.keys.iso),
        })
    }

    fn adm1_identity(&self, feature: &Feature) -> Result<Identity, DropReason> {
        Ok(Identity {
            id: self.required(feature, &self.keys.id)?,
            name: self.required(feature, &self.keys.name)?,
            group: Some(self.required(feature, &self.keys.group)?),
            iso: Some(self.required(feature, &self.keys.iso)?),
        })
    }

    fn adm2_identity(&self, feature: &Feature) -> Result<Identity, DropReason> {
        let id = self.required(feature, &self.keys.id)?;
        let iso = feature.string_property(&self.keys.iso);
        let name = feature
            .string_property(&self.keys.name)
            .or_else(|| iso.clone())
            .unwrap_or_else(|| id.clone());
        Ok(Identity {
            id,
            name,
            group: feature.string_property(&self.keys.group),
            iso,
        })
    }
}

struct Identity {
    id: String,
    name: String,
    group: Option<String>,
    iso: Option<String>,
}

/// Keep polygons that have a bounding box, paired index-for-index with it.
fn usable_polygons(polygons: Vec<Polygon>) -> (Vec<Polygon>, Vec<BoundingBox>) {
    polygons
        .into_iter()
        .filter_map(|p| p.bounding_box().map(|b| (p, b)))
        .unzip()
}

/// Interior point of the largest polygon that has one (first wins on ties).
///
/// Every level uses this rule, so a region's center and any matching
/// anchor derived from the same polygons always agree.
pub fn representative_point(polygons: &[Polygon]) -> Option<Coordinate> {
    let mut best: Option<(f64, Coordinate)> = None;
    for polygon in polygons {
        let Some(point) = polygon.interior_point() else {
            continue;
        };
        let area = polygon.area();
        if best.is_none_or(|(best_area, _)| area > best_area) {
            best = Some((area, point));
        }
    }
    best.map(|(_, point)| point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(lon: f64, lat: f64, size: f64) -> serde_json::Value {
        json!([[
            [lon, lat],
            [lon + size, lat],
            [lon + size, lat + size],
            [lon, lat + size],
            [lon, lat]
        ]])
    }

    fn feature(props: serde_json::Value, coordinates: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": props,
            "geometry": {"type": "Polygon", "coordinates": coordinates}
        })
    }

    fn collection(features: Vec<serde_json::Value>) -> FeatureCollection {
        serde_json::from_value(json!({"type": "FeatureCollection", "features": features})).unwrap()
    }

    fn adm1_props(id: &str, name: &str) -> serde_json::Value {
        json!({"shapeID": id, "shapeName": name, "shapeGroup": "KOR", "shapeISO": format!("KR-{id}")})
    }

    #[test]
    fn adm1_requires_every_property() {
        let fc = collection(vec![
            feature(adm1_props("11", "Seoul"), square(126.0, 37.0, 1.0)),
            feature(json!({"shapeID": "26", "shapeName": "Busan", "shapeGroup": "KOR"}), square(129.0, 35.0, 1.0)),
            feature(json!({"shapeID": "27", "shapeName": "  ", "shapeGroup": "KOR", "shapeISO": "KR-27"}), square(128.0, 35.0, 1.0)),
        ]);

        let outcome = BoundaryMapper::new("KOR").map_adm1(&fc);
        assert_eq!(outcome.regions.len(), 1);
        let seoul = &outcome.regions[0];
        assert_eq!(seoul.name, "Seoul");
        assert_eq!(seoul.group.as_deref(), Some("KOR"));
        assert_eq!(seoul.iso_code.as_deref(), Some("KR-11"));
        assert_eq!(seoul.level, AdminLevel::Adm1);
        assert_eq!(seoul.bboxes.len(), 1);

        assert_eq!(outcome.dropped.len(), 2);
        assert_eq!(outcome.dropped[0].feature_index, 1);
        assert_eq!(outcome.dropped[0].reason, DropReason::MissingProperty("shapeISO".into()));
        assert_eq!(outcome.dropped[1].id.as_deref(), Some("27"));
        assert_eq!(outcome.dropped[1].reason, DropReason::MissingProperty("shapeName".into()));
    }

    #[test]
    fn degenerate_geometry_is_dropped() {
        let fc = collection(vec![feature(
            adm1_props("11", "Seoul"),
            json!([[[126.0, 37.0], [127.0, 37.0], [126.0, 37.0]]]),
        )]);
        let outcome = BoundaryMapper::new("KOR").map_adm1(&fc);
        assert!(outcome.regions.is_empty());
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].reason, DropReason::NoUsablePolygon);
        assert!(representative_point(&[]).is_none());
    }

    #[test]
    fn missing_geometry_is_dropped() {
        let fc: FeatureCollection = serde_json::from_value(json!({
            "features": [{"type": "Feature", "properties": {"shapeID": "x"}, "geometry": null}]
        }))
        .unwrap();
        let outcome = BoundaryMapper::new("KOR").map_adm2(&fc);
        assert!(outcome.regions.is_empty());
        assert_eq!(outcome.dropped[0].reason, DropReason::NoUsablePolygon);
    }

    #[test]
    fn adm2_name_fallback_chain() {
        let fc = collection(vec![
            feature(json!({"shapeID": "a", "shapeName": "Jongno-gu", "shapeISO": "KR-11-110"}), square(126.9, 37.5, 0.1)),
            feature(json!({"shapeID": "b", "shapeName": "", "shapeISO": "KR-11-140"}), square(127.0, 37.5, 0.1)),
            feature(json!({"shapeID": "c", "shapeISO": " "}), square(127.1, 37.5, 0.1)),
            feature(json!({"shapeName": "No id"}), square(127.2, 37.5, 0.1)),
        ]);

        let outcome = BoundaryMapper::new("KOR").map_adm2(&fc);
        let names: Vec<&str> = outcome.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Jongno-gu", "KR-11-140", "c"]);
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].reason, DropReason::MissingProperty("shapeID".into()));
    }

    #[test]
    fn output_keeps_input_order() {
        let fc = collection(vec![
            feature(json!({"shapeID": "z"}), square(0.0, 0.0, 1.0)),
            feature(json!({"shapeID": "a"}), square(2.0, 0.0, 1.0)),
            feature(json!({"shapeID": "m"}), square(4.0, 0.0, 1.0)),
        ]);
        let ids: Vec<String> = BoundaryMapper::new("KOR")
            .map_adm2(&fc)
            .regions
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn center_comes_from_largest_polygon() {
        let fc: FeatureCollection = serde_json::from_value(json!({
            "features": [{
                "type": "Feature",
                "properties": {"shapeID": "island"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [square(0.0, 0.0, 1.0), square(10.0, 10.0, 4.0)]
                }
            }]
        }))
        .unwrap();
        let region = &BoundaryMapper::new("KOR").map_adm2(&fc).regions[0];
        assert_eq!(region.polygons.len(), 2);
        assert_eq!(region.bboxes.len(), 2);
        assert!((region.center.lat - 12.0).abs() < 1e-9);
        assert!((region.center.lon - 12.0).abs() < 1e-9);
        assert!(region.contains(region.center));
    }

    #[test]
    fn unusable_polygons_are_filtered_from_multipolygon() {
        let fc: FeatureCollection = serde_json::from_value(json!({
            "features": [{
                "type": "Feature",
                "properties": {"shapeID": "x"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0.0, 0.0], [1.0, 1.0]]], square(5.0, 5.0, 1.0)]
                }
            }]
        }))
        .unwrap();
        let region = &BoundaryMapper::new("KOR").map_adm2(&fc).regions[0];
        assert_eq!(region.polygons.len(), 1);
        assert_eq!(region.bboxes.len(), 1);
    }

    #[test]
    fn adm0_name_defaults_to_country_code() {
        let fc = collection(vec![feature(json!({"shapeID": "KOR-ADM0"}), square(124.0, 33.0, 8.0))]);
        let outcome = BoundaryMapper::new("KOR").map_adm0(&fc);
        assert_eq!(outcome.regions[0].name, "KOR");
        assert_eq!(outcome.regions[0].level, AdminLevel::Adm0);
    }

    #[test]
    fn custom_keys() {
        let keys = PropertyKeys {
            id: "code".into(),
            name: "label".into(),
            group: "grp".into(),
            iso: "iso".into(),
        };
        let fc = collection(vec![feature(json!({"code": 7, "label": "Seven"}), square(0.0, 0.0, 1.0))]);
        let outcome = BoundaryMapper::new("KOR").with_keys(keys).map_adm2(&fc);
        assert_eq!(outcome.regions[0].id, "7");
        assert_eq!(outcome.regions[0].name, "Seven");
    }
}
