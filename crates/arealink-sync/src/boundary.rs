//! geoBoundaries client: resolves a country/level to its GeoJSON release
//! and downloads the feature collection.

use arealink_core::{AdminLevel, FeatureCollection};
use async_trait::async_trait;
use serde::Deserialize;

use crate::SyncError;

/// Source of raw admin-boundary polygons for one country and level.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    async fn fetch_level(
        &self,
        country_iso3: &str,
        level: AdminLevel,
    ) -> Result<FeatureCollection, SyncError>;
}

/// Release metadata returned by `/{ISO}/{ADM}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryMetadata {
    #[serde(rename = "boundaryName", default)]
    pub boundary_name: Option<String>,
    #[serde(rename = "boundaryISO", default)]
    pub boundary_iso: Option<String>,
    #[serde(rename = "boundaryType", default)]
    pub boundary_type: Option<String>,
    #[serde(rename = "gjDownloadURL", default)]
    pub gj_download_url: Option<String>,
    #[serde(rename = "simplifiedGeometryGeoJSON", default)]
    pub simplified_url: Option<String>,
}

impl BoundaryMetadata {
    /// Full-resolution GeoJSON if published, else the simplified one.
    pub fn download_url(&self) -> Option<&str> {
        [&self.gj_download_url, &self.simplified_url]
            .into_iter()
            .filter_map(|u| u.as_deref().map(str::trim))
            .find(|u| !u.is_empty())
    }
}

/// Metadata endpoint for a country and level.
pub fn metadata_url(base_url: &str, country_iso3: &str, level: AdminLevel) -> String {
    format!(
        "{}/{}/{}/",
        base_url.trim_end_matches('/'),
        country_iso3.to_ascii_uppercase(),
        level.as_str()
    )
}

/// Parse a metadata response. The API answers with an object for a single
/// release, or an array when several match; the first entry is used.
pub fn parse_metadata(body: &str) -> Result<Option<BoundaryMetadata>, SyncError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let first = match value {
        serde_json::Value::Array(items) => match items.into_iter().next() {
            Some(item) => item,
            None => return Ok(None),
        },
        other => other,
    };
    Ok(Some(serde_json::from_value(first)?))
}

#[cfg(feature = "http")]
pub use http::GeoBoundariesClient;

#[cfg(feature = "http")]
mod http {
    use super::*;

    use tokio_util::sync::CancellationToken;
    use tracing::info;

    use crate::retry::{RetryPolicy, retry};

    /// HTTP client for the geoBoundaries open API.
    pub struct GeoBoundariesClient {
        client: reqwest::Client,
        base_url: String,
        policy: RetryPolicy,
        cancel: CancellationToken,
    }

    impl GeoBoundariesClient {
        /// `base_url` is like `https://www.geoboundaries.org/api/current/gbOpen`.
        pub fn new(base_url: String, policy: RetryPolicy, cancel: CancellationToken) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.trim_end_matches('/').to_string(),
                policy,
                cancel,
            }
        }

        async fn get_text(&self, url: &str) -> Result<String, SyncError> {
            let resp = self.client.get(url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(SyncError::Server {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(resp.text().await?)
        }

        async fn get_with_retry(&self, url: &str) -> Result<String, SyncError> {
            retry(&self.policy, &self.cancel, SyncError::is_retryable, || {
                self.get_text(url)
            })
            .await
        }
    }

    #[async_trait]
    impl BoundarySource for GeoBoundariesClient {
        async fn fetch_level(
            &self,
            country_iso3: &str,
            level: AdminLevel,
        ) -> Result<FeatureCollection, SyncError> {
            let url = metadata_url(&self.base_url, country_iso3, level);
            info!(url = %url, country = country_iso3, level = %level, "fetching boundary metadata");
            let body = self.get_with_retry(&url).await?;

            let missing = || SyncError::MissingDownloadUrl {
                country: country_iso3.to_string(),
                level: level.to_string(),
            };
            let metadata = parse_metadata(&body)?.ok_or_else(missing)?;
            let download = metadata.download_url().ok_or_else(missing)?;

            info!(url = %download, country = country_iso3, level = %level, "downloading boundaries");
            let geojson = self.get_with_retry(download).await?;
            let collection: FeatureCollection = serde_json::from_str(&geojson)?;
            info!(
                country = country_iso3,
                level = %level,
                features = collection.features.len(),
                "downloaded boundaries"
            );
            Ok(collection)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_metadata_url() {
        assert_eq!(
            metadata_url("https://www.geoboundaries.org/api/current/gbOpen/", "kor", AdminLevel::Adm2),
            "https://www.geoboundaries.org/api/current/gbOpen/KOR/ADM2/"
        );
    }

    #[test]
    fn parses_single_release() {
        let body = r#"{"boundaryID":"KOR-ADM1-1","boundaryName":"South Korea","boundaryISO":"KOR",
            "boundaryType":"ADM1","gjDownloadURL":"https://example.org/kor-adm1.geojson",
            "simplifiedGeometryGeoJSON":"https://example.org/kor-adm1-simple.geojson"}"#;
        let meta = parse_metadata(body).unwrap().unwrap();
        assert_eq!(meta.boundary_iso.as_deref(), Some("KOR"));
        assert_eq!(meta.download_url(), Some("https://example.org/kor-adm1.geojson"));
    }

    #[test]
    fn falls_back_to_simplified_and_handles_arrays() {
        let body = r#"[{"boundaryType":"ADM2","gjDownloadURL":"  ",
            "simplifiedGeometryGeoJSON":"https://example.org/simple.geojson"}]"#;
        let meta = parse_metadata(body).unwrap().unwrap();
        assert_eq!(meta.download_url(), Some("https://example.org/simple.geojson"));

        assert!(parse_metadata("[]").unwrap().is_none());
    }
}
