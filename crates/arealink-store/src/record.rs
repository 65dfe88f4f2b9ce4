use arealink_core::{AdminLevel, Coordinate, EnrichmentStatus, Polygon, Region, RegionTree};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flattened, persisted view of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub id: String,
    pub country_code: String,
    pub level: AdminLevel,
    pub name: String,
    pub parent_id: Option<String>,
    pub parent_name: Option<String>,
    pub group: Option<String>,
    pub iso_code: Option<String>,
    pub center: Coordinate,
    pub polygons: Vec<Polygon>,
    pub osm_id: Option<String>,
    pub wikidata: Option<String>,
    pub name_en: Option<String>,
    pub name_local: Option<String>,
    pub enrichment_status: Option<EnrichmentStatus>,
    pub confidence: Option<f64>,
    pub enriched_at: Option<DateTime<Utc>>,
}

impl AreaRecord {
    pub fn from_region(tree: &RegionTree, region: &Region) -> Self {
        Self {
            id: region.id.clone(),
            country_code: region.country_code.clone(),
            level: region.level,
            name: region.name.clone(),
            parent_id: region.parent_id.clone(),
            parent_name: tree.parent_of(region).map(|p| p.name.clone()),
            group: region.group.clone(),
            iso_code: region.iso_code.clone(),
            center: region.center,
            polygons: region.polygons.clone(),
            osm_id: region.external.osm_id.clone(),
            wikidata: region.external.wikidata.clone(),
            name_en: region.external.name_en.clone(),
            name_local: region.external.name_local.clone(),
            enrichment_status: None,
            confidence: None,
            enriched_at: None,
        }
    }

    pub fn is_missing_names(&self) -> bool {
        self.name_en.is_none() || self.name_local.is_none()
    }

    /// Take fresh ingestion fields from `incoming`, keeping names and
    /// enrichment state already stored when `incoming` has none.
    pub(crate) fn merge_from(&mut self, incoming: AreaRecord) {
        let name_en = incoming.name_en.or(self.name_en.take());
        let name_local = incoming.name_local.or(self.name_local.take());
        let status = self.enrichment_status;
        let confidence = self.confidence;
        let enriched_at = self.enriched_at;
        *self = AreaRecord {
            name_en,
            name_local,
            enrichment_status: status,
            confidence,
            enriched_at,
            ..incoming
        };
    }
}
