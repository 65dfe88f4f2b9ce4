//! Raw boundary features as published by GeoJSON boundary sources.
//!
//! Only the parts the mapper needs are modelled: an open property bag and
//! `Polygon` / `MultiPolygon` geometries. Other geometry types deserialize
//! to [`Geometry::Unsupported`] and contribute no polygons.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::geometry::{Coordinate, Polygon, Ring};

/// A GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// A single boundary feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// GeoJSON geometry, positions in `[lon, lat]` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Feature {
    /// A property as a trimmed, non-blank string.
    ///
    /// Numeric properties are rendered with their JSON representation so
    /// numeric ids survive; everything else (null, bool, arrays) is `None`.
    pub fn string_property(&self, key: &str) -> Option<String> {
        let raw = match self.properties.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!raw.is_empty()).then_some(raw)
    }

    /// Polygons carried by this feature, in source order.
    pub fn polygons(&self) -> Vec<Polygon> {
        self.geometry
            .as_ref()
            .map(Geometry::polygons)
            .unwrap_or_default()
    }
}

impl Geometry {
    /// Convert to kernel polygons. Invalid positions are skipped; polygons
    /// without rings are dropped. Degenerate rings are kept so the caller
    /// decides what counts as usable.
    pub fn polygons(&self) -> Vec<Polygon> {
        match self {
            Geometry::Polygon { coordinates } => polygon_from_rings(coordinates).into_iter().collect(),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .filter_map(|rings| polygon_from_rings(rings))
                .collect(),
            Geometry::Unsupported => Vec::new(),
        }
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon> {
    let rings = rings
        .iter()
        .map(|positions| {
            Ring::new(
                positions
                    .iter()
                    .filter_map(|p| Coordinate::from_position(p))
                    .collect(),
            )
        })
        .collect();
    Polygon::from_rings(rings)
}
