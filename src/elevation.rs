//! Elevation acquisition.
//!
//! The path core only needs "one coordinate in, one optional elevation out,
//! asynchronously" — that contract is the [`ElevationSource`] trait. Lookups
//! for different endpoints run concurrently with no ordering guarantee, and a
//! failed lookup simply leaves the endpoint unknown; the core never retries.
//! Retry policy belongs to the concrete provider.

use futures::future::BoxFuture;

use crate::{GeoPoint, Result};

/// Asynchronous, fallible elevation lookup.
pub trait ElevationSource: Send + Sync {
    /// Resolve the elevation in meters at `point`.
    fn lookup(&self, point: GeoPoint) -> BoxFuture<'static, Result<f64>>;
}

#[cfg(feature = "http")]
mod open_elevation {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use log::{debug, warn};
    use serde::Deserialize;

    use crate::{GeoPoint, PathError, Result};

    use super::ElevationSource;

    const DEFAULT_BASE_URL: &str = "https://api.open-elevation.com";
    const MAX_RETRIES: u32 = 3;

    #[derive(Debug, Deserialize)]
    struct LookupResponse {
        results: Vec<LookupResult>,
    }

    #[derive(Debug, Deserialize)]
    struct LookupResult {
        elevation: f64,
    }

    /// Elevation provider backed by the Open-Elevation REST API.
    ///
    /// Transport errors are retried with exponential backoff; HTTP error
    /// statuses and empty result sets surface as [`PathError::LookupFailed`].
    pub struct OpenElevationSource {
        client: reqwest::Client,
        base_url: String,
    }

    impl OpenElevationSource {
        pub fn new() -> Result<Self> {
            Self::with_base_url(DEFAULT_BASE_URL)
        }

        /// Point the provider at a different host (e.g. a self-hosted
        /// instance or a test server).
        pub fn with_base_url(base_url: &str) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| PathError::LookupFailed {
                    message: format!("failed to create HTTP client: {}", e),
                })?;
            Ok(Self {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        }

        fn parse_body(body: LookupResponse) -> Result<f64> {
            body.results
                .first()
                .map(|r| r.elevation)
                .ok_or_else(|| PathError::LookupFailed {
                    message: "empty result set".to_string(),
                })
        }
    }

    impl ElevationSource for OpenElevationSource {
        fn lookup(&self, point: GeoPoint) -> BoxFuture<'static, Result<f64>> {
            let client = self.client.clone();
            let url = format!(
                "{}/api/v1/lookup?locations={},{}",
                self.base_url, point.lat, point.lng
            );

            Box::pin(async move {
                let mut retries = 0;
                loop {
                    match client.get(&url).send().await {
                        Ok(resp) => {
                            let status = resp.status();
                            if !status.is_success() {
                                return Err(PathError::LookupFailed {
                                    message: format!("HTTP {}", status),
                                });
                            }
                            let body: LookupResponse =
                                resp.json().await.map_err(|e| PathError::LookupFailed {
                                    message: format!("parse error: {}", e),
                                })?;
                            let elevation = Self::parse_body(body)?;
                            debug!(
                                "[OpenElevation] {},{} -> {}m",
                                point.lat, point.lng, elevation
                            );
                            return Ok(elevation);
                        }
                        Err(e) => {
                            retries += 1;
                            if retries > MAX_RETRIES {
                                return Err(PathError::LookupFailed {
                                    message: format!("request error: {}", e),
                                });
                            }
                            let backoff = Duration::from_millis(500 * (1 << retries));
                            warn!(
                                "[OpenElevation] error for {},{}: {}, retry {} after {:?}",
                                point.lat, point.lng, e, retries, backoff
                            );
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_lookup_response() {
            let body: LookupResponse = serde_json::from_str(
                r#"{"results":[{"latitude":35.713,"longitude":51.396,"elevation":1712.0}]}"#,
            )
            .unwrap();
            assert_eq!(OpenElevationSource::parse_body(body).unwrap(), 1712.0);
        }

        #[test]
        fn test_empty_result_set_is_failure() {
            let body: LookupResponse = serde_json::from_str(r#"{"results":[]}"#).unwrap();
            assert!(matches!(
                OpenElevationSource::parse_body(body),
                Err(PathError::LookupFailed { .. })
            ));
        }
    }
}

#[cfg(feature = "http")]
pub use open_elevation::OpenElevationSource;
