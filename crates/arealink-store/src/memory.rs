//! In-process store, used when no database path is configured and in tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use arealink_core::{AdminLevel, EnrichmentCandidate, EnrichmentStatus, RegionTree};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::{AreaRecord, AreaStore, StoreError};

#[derive(Default)]
struct State {
    records: Vec<AreaRecord>,
    index: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Other("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl AreaStore for MemoryStore {
    async fn list_countries(&self) -> Result<Vec<String>, StoreError> {
        let state = self.lock()?;
        let codes: BTreeSet<&str> = state.records.iter().map(|r| r.country_code.as_str()).collect();
        Ok(codes.into_iter().map(str::to_string).collect())
    }

    async fn upsert_tree(&self, tree: &RegionTree) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        let mut written = 0;
        for region in tree.regions() {
            let incoming = AreaRecord::from_region(tree, region);
            match state.index.get(&incoming.id).copied() {
                Some(i) => state.records[i].merge_from(incoming),
                None => {
                    let i = state.records.len();
                    state.index.insert(incoming.id.clone(), i);
                    state.records.push(incoming);
                }
            }
            written += 1;
        }
        info!(country = tree.country_code(), written, "upserted region tree");
        Ok(written)
    }

    async fn fetch_regions_missing_names(
        &self,
        country: &str,
        level: Option<AdminLevel>,
    ) -> Result<Vec<AreaRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.country_code == country)
            .filter(|r| level.is_none_or(|l| r.level == l))
            .filter(|r| r.is_missing_names())
            .cloned()
            .collect())
    }

    async fn commit_enrichment(
        &self,
        region_id: &str,
        candidate: &EnrichmentCandidate,
        status: EnrichmentStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let i = state
            .index
            .get(region_id)
            .copied()
            .ok_or_else(|| StoreError::RegionNotFound(region_id.to_string()))?;
        let record = &mut state.records[i];
        record.name_en = Some(candidate.name_en.trim().to_string());
        record.name_local = Some(candidate.name_local.trim().to_string());
        record.enrichment_status = Some(status);
        record.confidence = Some(candidate.confidence);
        record.enriched_at = Some(Utc::now());
        Ok(())
    }

    async fn get_area(&self, region_id: &str) -> Result<Option<AreaRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state.index.get(region_id).map(|&i| state.records[i].clone()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use arealink_core::{Coordinate, Polygon, Region, Ring};

    pub(crate) fn square(id: &str, level: AdminLevel, lat: f64, lon: f64, size: f64) -> Region {
        let polygon = Polygon::new(
            Ring::new(vec![
                Coordinate::new(lat, lon),
                Coordinate::new(lat, lon + size),
                Coordinate::new(lat + size, lon + size),
                Coordinate::new(lat + size, lon),
            ]),
            vec![],
        );
        Region {
            id: id.to_string(),
            name: format!("{id} name"),
            level,
            country_code: "KOR".into(),
            group: Some("KOR".into()),
            iso_code: None,
            bboxes: vec![polygon.bounding_box().unwrap()],
            center: polygon.interior_point().unwrap(),
            polygons: vec![polygon],
            parent_id: None,
            parent: None,
            children: vec![],
            external: Default::default(),
        }
    }

    /// One province containing one district, plus one unlinked district.
    pub(crate) fn sample_tree() -> RegionTree {
        RegionTree::assemble(
            "KOR",
            None,
            vec![square("P1", AdminLevel::Adm1, 0.0, 0.0, 10.0)],
            vec![
                square("D1", AdminLevel::Adm2, 1.0, 1.0, 1.0),
                square("D2", AdminLevel::Adm2, 50.0, 50.0, 1.0),
            ],
            &[Some(0), None],
        )
    }

    pub(crate) fn candidate(region_id: &str, confidence: f64) -> EnrichmentCandidate {
        EnrichmentCandidate {
            region_id: region_id.into(),
            name_en: "Jongno-gu".into(),
            name_local: "종로구".into(),
            confidence,
            reasoning: None,
        }
    }

    #[tokio::test]
    async fn upsert_and_fetch_missing() {
        let store = MemoryStore::new();
        assert_eq!(store.upsert_tree(&sample_tree()).await.unwrap(), 3);
        assert_eq!(store.list_countries().await.unwrap(), vec!["KOR"]);

        let all = store.fetch_regions_missing_names("KOR", None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "D1", "D2"]);

        let adm2 = store
            .fetch_regions_missing_names("KOR", Some(AdminLevel::Adm2))
            .await
            .unwrap();
        assert_eq!(adm2.len(), 2);
        assert_eq!(adm2[0].parent_name.as_deref(), Some("P1 name"));
        assert!(adm2[1].parent_id.is_none());

        assert!(store.fetch_regions_missing_names("JPN", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_fills_names() {
        let store = MemoryStore::new();
        store.upsert_tree(&sample_tree()).await.unwrap();
        store
            .commit_enrichment("D1", &candidate("D1", 0.9), EnrichmentStatus::Applied)
            .await
            .unwrap();

        let rec = store.get_area("D1").await.unwrap().unwrap();
        assert_eq!(rec.name_en.as_deref(), Some("Jongno-gu"));
        assert_eq!(rec.enrichment_status, Some(EnrichmentStatus::Applied));
        assert!(rec.enriched_at.is_some());

        let missing = store.fetch_regions_missing_names("KOR", None).await.unwrap();
        assert!(missing.iter().all(|r| r.id != "D1"));
    }

    #[tokio::test]
    async fn commit_unknown_region_fails() {
        let store = MemoryStore::new();
        let err = store
            .commit_enrichment("nope", &candidate("nope", 0.9), EnrichmentStatus::Applied)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RegionNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn reingest_keeps_enriched_names() {
        let store = MemoryStore::new();
        store.upsert_tree(&sample_tree()).await.unwrap();
        store
            .commit_enrichment("D1", &candidate("D1", 0.6), EnrichmentStatus::Validated)
            .await
            .unwrap();
        store.upsert_tree(&sample_tree()).await.unwrap();

        assert_eq!(store.len(), 3);
        let rec = store.get_area("D1").await.unwrap().unwrap();
        assert_eq!(rec.name_local.as_deref(), Some("종로구"));
        assert_eq!(rec.enrichment_status, Some(EnrichmentStatus::Validated));
    }
}
