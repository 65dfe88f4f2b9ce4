//! DuckDB area store.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use arealink_core::{AdminLevel, Coordinate, EnrichmentCandidate, EnrichmentStatus, RegionTree};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::types::Type;
use duckdb::{Connection, Row, params};
use tracing::info;

use crate::{AreaRecord, AreaStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS areas (
    id                VARCHAR PRIMARY KEY,
    seq               BIGINT NOT NULL,
    country_code      VARCHAR NOT NULL,
    level             VARCHAR NOT NULL,
    name              VARCHAR NOT NULL,
    parent_id         VARCHAR,
    parent_name       VARCHAR,
    shape_group       VARCHAR,
    iso_code          VARCHAR,
    center_lat        DOUBLE NOT NULL,
    center_lon        DOUBLE NOT NULL,
    geometry          VARCHAR NOT NULL,
    osm_id            VARCHAR,
    wikidata          VARCHAR,
    name_en           VARCHAR,
    name_local        VARCHAR,
    enrichment_status VARCHAR,
    confidence        DOUBLE,
    enriched_at       VARCHAR
);";

const UPSERT: &str = "
INSERT INTO areas (id, seq, country_code, level, name, parent_id, parent_name,
    shape_group, iso_code, center_lat, center_lon, geometry, osm_id, wikidata,
    name_en, name_local)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
    seq = excluded.seq,
    country_code = excluded.country_code,
    level = excluded.level,
    name = excluded.name,
    parent_id = excluded.parent_id,
    parent_name = excluded.parent_name,
    shape_group = excluded.shape_group,
    iso_code = excluded.iso_code,
    center_lat = excluded.center_lat,
    center_lon = excluded.center_lon,
    geometry = excluded.geometry,
    osm_id = excluded.osm_id,
    wikidata = excluded.wikidata,
    name_en = COALESCE(excluded.name_en, areas.name_en),
    name_local = COALESCE(excluded.name_local, areas.name_local)";

const SELECT_COLUMNS: &str = "id, country_code, level, name, parent_id, parent_name, shape_group, \
     iso_code, center_lat, center_lon, geometry, osm_id, wikidata, name_en, name_local, \
     enrichment_status, confidence, enriched_at";

/// DuckDB-backed [`AreaStore`], in-memory or file-backed.
///
/// One `areas` row per region. Geometry is kept as JSON text and
/// timestamps as RFC 3339 strings. Trait calls run on tokio's blocking
/// pool so file I/O never stalls a runtime worker.
pub struct DuckStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        lock_conn(&self.conn)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock_conn(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Other(format!("duckdb task failed: {e}")))?
    }

    // ── Counts ──

    pub fn area_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT count(*)::BIGINT FROM areas", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock()
        .map_err(|_| StoreError::Other("duckdb connection lock poisoned".into()))
}

fn conversion_error<E>(idx: usize, err: E) -> duckdb::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn read_record(row: &Row<'_>) -> duckdb::Result<AreaRecord> {
    let level: String = row.get(2)?;
    let level: AdminLevel = level.parse().map_err(|e| conversion_error(2, e))?;
    let geometry: String = row.get(10)?;
    let polygons = serde_json::from_str(&geometry).map_err(|e| conversion_error(10, e))?;
    let status: Option<String> = row.get(15)?;
    let enrichment_status = status
        .map(|s| s.parse::<EnrichmentStatus>())
        .transpose()
        .map_err(|e| conversion_error(15, e))?;
    let enriched_at: Option<String> = row.get(17)?;
    let enriched_at = enriched_at
        .map(|s| DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| conversion_error(17, e))?;

    Ok(AreaRecord {
        id: row.get(0)?,
        country_code: row.get(1)?,
        level,
        name: row.get(3)?,
        parent_id: row.get(4)?,
        parent_name: row.get(5)?,
        group: row.get(6)?,
        iso_code: row.get(7)?,
        center: Coordinate::new(row.get(8)?, row.get(9)?),
        polygons,
        osm_id: row.get(11)?,
        wikidata: row.get(12)?,
        name_en: row.get(13)?,
        name_local: row.get(14)?,
        enrichment_status,
        confidence: row.get(16)?,
        enriched_at,
    })
}

#[async_trait]
impl AreaStore for DuckStore {
    async fn list_countries(&self) -> Result<Vec<String>, StoreError> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT country_code FROM areas ORDER BY country_code")?;
            let codes = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(codes)
        })
        .await
    }

    async fn upsert_tree(&self, tree: &RegionTree) -> Result<usize, StoreError> {
        let rows = tree
            .regions()
            .iter()
            .map(|region| {
                let rec = AreaRecord::from_region(tree, region);
                let geometry = serde_json::to_string(&rec.polygons)?;
                Ok((rec, geometry))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        let country = tree.country_code().to_string();

        let written = self
            .blocking(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(UPSERT)?;
                    for (seq, (rec, geometry)) in rows.iter().enumerate() {
                        stmt.execute(params![
                            rec.id,
                            seq as i64,
                            rec.country_code,
                            rec.level.as_str(),
                            rec.name,
                            rec.parent_id,
                            rec.parent_name,
                            rec.group,
                            rec.iso_code,
                            rec.center.lat,
                            rec.center.lon,
                            geometry,
                            rec.osm_id,
                            rec.wikidata,
                            rec.name_en,
                            rec.name_local
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        info!(country = %country, written, "upserted region tree");
        Ok(written)
    }

    async fn fetch_regions_missing_names(
        &self,
        country: &str,
        level: Option<AdminLevel>,
    ) -> Result<Vec<AreaRecord>, StoreError> {
        let country = country.to_string();
        self.blocking(move |conn| {
            let level_filter = if level.is_some() { "AND level = ?" } else { "" };
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM areas
                 WHERE country_code = ? {level_filter}
                   AND (name_en IS NULL OR name_local IS NULL)
                 ORDER BY seq"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = match level {
                Some(l) => stmt.query_map(params![country, l.as_str()], read_record)?,
                None => stmt.query_map(params![country], read_record)?,
            };
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn commit_enrichment(
        &self,
        region_id: &str,
        candidate: &EnrichmentCandidate,
        status: EnrichmentStatus,
    ) -> Result<(), StoreError> {
        let region_id = region_id.to_string();
        let name_en = candidate.name_en.trim().to_string();
        let name_local = candidate.name_local.trim().to_string();
        let confidence = candidate.confidence;
        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE areas SET name_en = ?, name_local = ?, enrichment_status = ?,
                    confidence = ?, enriched_at = ?
                 WHERE id = ?",
                params![
                    name_en,
                    name_local,
                    status.as_str(),
                    confidence,
                    Utc::now().to_rfc3339(),
                    region_id
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::RegionNotFound(region_id));
            }
            Ok(())
        })
        .await
    }

    async fn get_area(&self, region_id: &str) -> Result<Option<AreaRecord>, StoreError> {
        let region_id = region_id.to_string();
        self.blocking(move |conn| {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM areas WHERE id = ?");
            match conn.query_row(&sql, [region_id.as_str()], read_record) {
                Ok(record) => Ok(Some(record)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}
