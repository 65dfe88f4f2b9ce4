//! Region records and the per-country region arena.
//!
//! Regions never own each other. A [`RegionTree`] owns every region of one
//! country in a flat `Vec`; parent and child links are [`RegionIdx`]
//! values into that `Vec`, and the parent's external id is kept alongside
//! for persistence.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::geometry::{BoundingBox, Coordinate, Polygon};

/// Administrative boundary tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdminLevel {
    #[serde(rename = "ADM0")]
    Adm0,
    #[serde(rename = "ADM1")]
    Adm1,
    #[serde(rename = "ADM2")]
    Adm2,
}

impl AdminLevel {
    pub const ALL: [AdminLevel; 3] = [AdminLevel::Adm0, AdminLevel::Adm1, AdminLevel::Adm2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adm0 => "ADM0",
            Self::Adm1 => "ADM1",
            Self::Adm2 => "ADM2",
        }
    }

    /// OpenStreetMap `admin_level` most datasets use for this tier.
    ///
    /// Only a hint: countries differ (e.g. ADM2 is 6 in Korea, 8 in parts of Europe).
    pub fn osm_admin_level(&self) -> u8 {
        match self {
            Self::Adm0 => 2,
            Self::Adm1 => 4,
            Self::Adm2 => 6,
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown admin level: {0:?} (expected ADM0, ADM1 or ADM2)")]
pub struct ParseLevelError(String);

impl FromStr for AdminLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADM0" => Ok(Self::Adm0),
            "ADM1" => Ok(Self::Adm1),
            "ADM2" => Ok(Self::Adm2),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Index of a region inside its [`RegionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionIdx(pub usize);

/// Metadata copied from a matched third-party element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalRefs {
    pub osm_id: Option<String>,
    pub wikidata: Option<String>,
    pub name_en: Option<String>,
    pub name_local: Option<String>,
}

/// One administrative region at a single level.
///
/// `polygons` only holds usable polygons, and `bboxes[i]` is the bounding
/// box of `polygons[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub level: AdminLevel,
    pub country_code: String,
    pub group: Option<String>,
    pub iso_code: Option<String>,
    pub polygons: Vec<Polygon>,
    pub bboxes: Vec<BoundingBox>,
    pub center: Coordinate,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent: Option<RegionIdx>,
    #[serde(default)]
    pub children: Vec<RegionIdx>,
    #[serde(default)]
    pub external: ExternalRefs,
}

impl Region {
    /// Cheap pre-filter: any bounding box contains the point.
    pub fn bbox_contains(&self, point: Coordinate) -> bool {
        self.bboxes.iter().any(|b| b.contains(point))
    }

    /// Exact test: any polygon (holes honoured) contains the point.
    pub fn polygon_contains(&self, point: Coordinate) -> bool {
        self.polygons.iter().any(|p| p.contains(point))
    }

    /// Both the pre-filter and the exact test pass.
    pub fn contains(&self, point: Coordinate) -> bool {
        self.bbox_contains(point) && self.polygon_contains(point)
    }
}

/// Summary counts for a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub adm1: usize,
    pub adm2: usize,
    pub linked: usize,
    pub unlinked: usize,
}

/// Arena of the regions of one country.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionTree {
    country_code: String,
    root: Option<RegionIdx>,
    regions: Vec<Region>,
    index: HashMap<String, RegionIdx>,
}

impl RegionTree {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ..Self::default()
        }
    }

    /// Build a tree from mapped levels and the linker's output.
    ///
    /// `links[i]` is the index into `parents` chosen for `children[i]`
    /// (missing entries mean unlinked). When `country` is given it becomes
    /// the root and every first-level region hangs off it. Regions whose id
    /// is already present are dropped with a warning.
    pub fn assemble(
        country_code: impl Into<String>,
        country: Option<Region>,
        parents: Vec<Region>,
        children: Vec<Region>,
        links: &[Option<usize>],
    ) -> Self {
        let mut tree = Self::new(country_code);
        let root = country.and_then(|c| tree.insert(c, None));
        tree.root = root;

        let parent_slots: Vec<Option<RegionIdx>> =
            parents.into_iter().map(|p| tree.insert(p, root)).collect();

        for (i, child) in children.into_iter().enumerate() {
            let parent = links
                .get(i)
                .copied()
                .flatten()
                .and_then(|p| parent_slots.get(p).copied().flatten());
            tree.insert(child, parent);
        }

        tree
    }

    fn insert(&mut self, mut region: Region, parent: Option<RegionIdx>) -> Option<RegionIdx> {
        if self.index.contains_key(&region.id) {
            warn!(id = %region.id, level = %region.level, "duplicate region id, dropping");
            return None;
        }

        let idx = RegionIdx(self.regions.len());
        region.parent = parent;
        region.parent_id = parent.map(|p| self.regions[p.0].id.clone());
        region.children.clear();
        self.index.insert(region.id.clone(), idx);
        self.regions.push(region);
        if let Some(p) = parent {
            self.regions[p.0].children.push(idx);
        }
        Some(idx)
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn root(&self) -> Option<&Region> {
        self.root.and_then(|idx| self.get(idx))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, idx: RegionIdx) -> Option<&Region> {
        self.regions.get(idx.0)
    }

    pub fn idx_of(&self, id: &str) -> Option<RegionIdx> {
        self.index.get(id).copied()
    }

    pub fn find(&self, id: &str) -> Option<&Region> {
        self.idx_of(id).and_then(|idx| self.get(idx))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Region> {
        let idx = self.idx_of(id)?;
        self.regions.get_mut(idx.0)
    }

    pub fn parent_of(&self, region: &Region) -> Option<&Region> {
        region.parent.and_then(|idx| self.get(idx))
    }

    pub fn children_of<'a>(&'a self, region: &'a Region) -> impl Iterator<Item = &'a Region> + 'a {
        region.children.iter().filter_map(|idx| self.get(*idx))
    }

    /// Regions at one level, in insertion order.
    pub fn at_level(&self, level: AdminLevel) -> impl Iterator<Item = &Region> + Clone + '_ {
        self.regions.iter().filter(move |r| r.level == level)
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for r in &self.regions {
            match r.level {
                AdminLevel::Adm0 => {}
                AdminLevel::Adm1 => stats.adm1 += 1,
                AdminLevel::Adm2 => {
                    stats.adm2 += 1;
                    if r.parent.is_some() {
                        stats.linked += 1;
                    } else {
                        stats.unlinked += 1;
                    }
                }
            }
        }
        stats
    }
}
