//! External match resolver: pairs third-party point elements with the
//! child region that encloses them.
//!
//! Elements are visited in input order and each claims the first region
//! (in region order) whose bounding box and polygons contain its center.
//! First-claim-wins: a region already claimed keeps its element and later
//! elements landing in it are dropped.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry::Coordinate;
use crate::region::{Region, RegionTree};

/// An element from the point-of-interest source (OSM element shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub center: Option<Coordinate>,
}

impl PointElement {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.tag("name")
    }

    pub fn name_en(&self) -> Option<&str> {
        self.tag("name:en")
    }

    pub fn wikidata(&self) -> Option<&str> {
        self.tag("wikidata")
    }

    /// `relation/123`-style reference.
    pub fn osm_ref(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}

/// Region id → claimed element, plus counters for what was not matched.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    matches: HashMap<String, PointElement>,
    claim_order: Vec<String>,
    pub without_center: usize,
    pub unmatched: usize,
    pub conflicts: usize,
}

impl MatchSet {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, region_id: &str) -> Option<&PointElement> {
        self.matches.get(region_id)
    }

    /// Matches in the order regions were claimed.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PointElement)> {
        self.claim_order
            .iter()
            .filter_map(|id| self.matches.get(id).map(|e| (id.as_str(), e)))
    }

    /// Copy OSM id, Wikidata id and names onto the matched regions.
    ///
    /// Returns how many regions were updated. Existing values are
    /// overwritten; ids absent from the tree are ignored.
    pub fn apply(&self, tree: &mut RegionTree) -> usize {
        let mut applied = 0;
        for (region_id, element) in self.iter() {
            let Some(region) = tree.find_mut(region_id) else {
                continue;
            };
            let refs = &mut region.external;
            refs.osm_id = Some(element.osm_ref());
            refs.wikidata = element.wikidata().map(str::to_string);
            refs.name_en = element.name_en().map(str::to_string);
            refs.name_local = element.name().map(str::to_string);
            applied += 1;
        }
        applied
    }
}

/// Match elements to the child regions that enclose them.
pub fn resolve_matches<'a, I>(children: I, elements: &[PointElement]) -> MatchSet
where
    I: IntoIterator<Item = &'a Region>,
    I::IntoIter: Clone,
{
    let children = children.into_iter();
    let mut set = MatchSet::default();

    for element in elements {
        let Some(center) = element.center else {
            set.without_center += 1;
            continue;
        };

        let Some(region) = children.clone().find(|r| r.contains(center)) else {
            set.unmatched += 1;
            continue;
        };

        if set.matches.contains_key(&region.id) {
            debug!(
                region = %region.id,
                element = %element.osm_ref(),
                "region already claimed, dropping element"
            );
            set.conflicts += 1;
            continue;
        }

        set.claim_order.push(region.id.clone());
        set.matches.insert(region.id.clone(), element.clone());
    }

    info!(
        elements = elements.len(),
        matched = set.len(),
        conflicts = set.conflicts,
        unmatched = set.unmatched,
        without_center = set.without_center,
        "resolved external matches"
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::AdminLevel;
    use crate::testing::square_region;

    fn element(id: u64, lat: f64, lon: f64, name: &str) -> PointElement {
        PointElement {
            kind: "relation".into(),
            id,
            tags: BTreeMap::from([
                ("name".to_string(), name.to_string()),
                ("name:en".to_string(), format!("{name} (en)")),
                ("wikidata".to_string(), format!("Q{id}")),
            ]),
            center: Some(Coordinate::new(lat, lon)),
        }
    }

    fn districts() -> Vec<Region> {
        vec![
            square_region("d1", AdminLevel::Adm2, 0.0, 0.0, 1.0),
            square_region("d2", AdminLevel::Adm2, 0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn matches_enclosing_region() {
        let regions = districts();
        let set = resolve_matches(&regions, &[element(1, 0.5, 1.5, "Two"), element(2, 0.5, 0.5, "One")]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("d2").unwrap().id, 1);
        assert_eq!(set.get("d1").unwrap().id, 2);
        let order: Vec<&str> = set.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["d2", "d1"]);
    }

    #[test]
    fn first_claim_wins() {
        let regions = districts();
        let set = resolve_matches(&regions, &[element(1, 0.5, 0.5, "First"), element(2, 0.6, 0.6, "Second")]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("d1").unwrap().id, 1);
        assert_eq!(set.conflicts, 1);
    }

    #[test]
    fn elements_without_center_or_outside_are_skipped() {
        let regions = districts();
        let mut no_center = element(1, 0.0, 0.0, "Nowhere");
        no_center.center = None;
        let set = resolve_matches(&regions, &[no_center, element(2, 50.0, 50.0, "Far")]);
        assert!(set.is_empty());
        assert_eq!(set.without_center, 1);
        assert_eq!(set.unmatched, 1);
    }

    #[test]
    fn shared_edge_goes_to_first_region() {
        let regions = districts();
        let set = resolve_matches(&regions, &[element(1, 0.5, 1.0, "Edge")]);
        assert!(set.get("d1").is_some());
        assert!(set.get("d2").is_none());
    }

    #[test]
    fn empty_inputs_give_empty_mapping() {
        let regions = districts();
        assert!(resolve_matches(&regions, &[]).is_empty());
        assert!(resolve_matches(&Vec::<Region>::new(), &[element(1, 0.5, 0.5, "x")]).is_empty());
    }

    #[test]
    fn apply_copies_metadata() {
        let mut tree = RegionTree::assemble("KOR", None, vec![], districts(), &[]);
        let set = resolve_matches(tree.at_level(AdminLevel::Adm2), &[element(7, 0.5, 0.5, "종로구")]);
        assert_eq!(set.apply(&mut tree), 1);

        let refs = &tree.find("d1").unwrap().external;
        assert_eq!(refs.osm_id.as_deref(), Some("relation/7"));
        assert_eq!(refs.wikidata.as_deref(), Some("Q7"));
        assert_eq!(refs.name_local.as_deref(), Some("종로구"));
        assert_eq!(refs.name_en.as_deref(), Some("종로구 (en)"));
    }

    #[test]
    fn parses_overpass_element() {
        let json = r#"{"type":"relation","id":2297418,"center":{"lat":37.59,"lon":126.98},
            "tags":{"name":"종로구","name:en":"Jongno-gu","admin_level":"6"}}"#;
        let el: PointElement = serde_json::from_str(json).unwrap();
        assert_eq!(el.name_en(), Some("Jongno-gu"));
        assert_eq!(el.center, Some(Coordinate::new(37.59, 126.98)));
        assert_eq!(el.osm_ref(), "relation/2297418");
    }
}
