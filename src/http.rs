//! HTTP client for the GPS location relay.
//!
//! The relay answers `POST {base_url}/device/location` with the latest fix
//! for a device code. Anything short of a well-formed 2xx answer is "no fix
//! this tick": the tracking state is never touched by a failed poll.
//!
//! - Connection pooling across devices
//! - Concurrent fetches for several devices per tick
//! - Retry with exponential backoff on transport errors, 429 and 5xx

use base64::Engine;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{Result, TrackerError};
use crate::{Fix, GeoPoint};

const MAX_CONCURRENCY: usize = 8;
const BACKOFF_BASE_MS: u64 = 200;

/// Location relay connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RelayConfig {
    /// Base URL without trailing slash, e.g. `https://relay.example.com/api`
    pub base_url: String,
    /// Sent as HTTP Basic `API_KEY:<key>` when present
    pub api_key: Option<String>,
    /// Per-request timeout. Default: 10000 ms
    pub timeout_ms: u64,
    /// Retries after the first attempt. Default: 2
    pub max_retries: u32,
}

impl RelayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout_ms: 10_000,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationRequest<'a> {
    device_code: &'a str,
}

/// Relay response body.
#[derive(Debug, Deserialize)]
struct LocationResponse {
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    longitude: f64,
    timestamp: i64,
    #[serde(default)]
    accuracy: Option<f64>,
}

/// Parse a relay response body into a fix.
///
/// Returns `None` for malformed JSON or missing fields. Coordinate range
/// checks happen later, at the path filter.
pub fn parse_fix_response(body: &[u8]) -> Option<Fix> {
    let data: LocationResponse = match serde_json::from_slice(body) {
        Ok(d) => d,
        Err(e) => {
            debug!("Malformed relay response: {}", e);
            return None;
        }
    };

    let fix = Fix::new(GeoPoint::new(data.latitude, data.longitude), data.timestamp);
    Some(match data.accuracy {
        Some(a) if a.is_finite() && a > 0.0 => fix.with_accuracy(a),
        _ => fix,
    })
}

/// Client for the location relay.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    endpoint: String,
    auth_header: Option<String>,
    max_retries: u32,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(MAX_CONCURRENCY)
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| TrackerError::Relay(format!("Failed to create HTTP client: {}", e)))?;

        let auth_header = config.api_key.as_ref().map(|key| {
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("API_KEY:{}", key));
            format!("Basic {}", encoded)
        });

        Ok(Self {
            client,
            endpoint: format!("{}/device/location", config.base_url.trim_end_matches('/')),
            auth_header,
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the latest fix for one device, or `None` if this tick failed.
    pub async fn fetch_fix(&self, device_code: &str) -> Option<Fix> {
        let mut retries = 0;
        let req_start = Instant::now();

        loop {
            let mut request = self
                .client
                .post(&self.endpoint)
                .json(&LocationRequest { device_code });
            if let Some(auth) = &self.auth_header {
                request = request.header("Authorization", auth);
            }

            let failure = match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return match resp.bytes().await {
                            Ok(bytes) => {
                                let fix = parse_fix_response(&bytes);
                                debug!(
                                    "[Relay {}] {:?} in {:?} ({} bytes)",
                                    device_code,
                                    fix.map(|f| (f.point.latitude, f.point.longitude)),
                                    req_start.elapsed(),
                                    bytes.len()
                                );
                                fix
                            }
                            Err(e) => {
                                warn!("[Relay {}] Body download error: {}", device_code, e);
                                None
                            }
                        };
                    }
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        warn!("[Relay {}] HTTP {}, no fix this tick", device_code, status);
                        return None;
                    }
                    format!("HTTP {}", status)
                }
                Err(e) => e.to_string(),
            };

            retries += 1;
            if retries > self.max_retries {
                warn!("[Relay {}] Giving up after {} attempts: {}", device_code, retries, failure);
                return None;
            }

            let wait = Duration::from_millis(BACKOFF_BASE_MS * (1 << retries.min(5)));
            warn!("[Relay {}] {}, retry {} after {:?}", device_code, failure, retries, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Fetch fixes for several devices concurrently.
    ///
    /// Results line up with `device_codes`.
    pub async fn fetch_fixes(&self, device_codes: Vec<String>) -> Vec<Option<Fix>> {
        use futures::stream::{self, StreamExt};

        let total = device_codes.len();
        let start = Instant::now();

        let results: Vec<Option<Fix>> = stream::iter(device_codes)
            .map(|code| async move { self.fetch_fix(&code).await })
            .buffered(MAX_CONCURRENCY)
            .collect()
            .await;

        info!(
            "[Relay] {}/{} devices reported a fix in {:?}",
            results.iter().filter(|f| f.is_some()).count(),
            total,
            start.elapsed()
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fix_response() {
        let body = br#"{"latitude": 16.4755, "longitude": 102.825,
            "timestamp": 1700000000000, "accuracy": 12.5}"#;
        let fix = parse_fix_response(body).unwrap();
        assert_eq!(fix.point, GeoPoint::new(16.4755, 102.825));
        assert_eq!(fix.timestamp, 1_700_000_000_000);
        assert_eq!(fix.accuracy_meters, Some(12.5));
    }

    #[test]
    fn test_parse_fix_response_aliases_and_missing_accuracy() {
        let body = br#"{"lat": 1.5, "lng": 2.5, "timestamp": 5}"#;
        let fix = parse_fix_response(body).unwrap();
        assert_eq!(fix.point, GeoPoint::new(1.5, 2.5));
        assert_eq!(fix.accuracy_meters, None);

        let negative_accuracy =
            br#"{"latitude": 1.0, "longitude": 2.0, "timestamp": 5, "accuracy": -3}"#;
        assert_eq!(parse_fix_response(negative_accuracy).unwrap().accuracy_meters, None);
    }

    #[test]
    fn test_parse_fix_response_malformed() {
        assert!(parse_fix_response(b"").is_none());
        assert!(parse_fix_response(b"<html>502 Bad Gateway</html>").is_none());
        assert!(parse_fix_response(br#"{"latitude": 1.0, "timestamp": 5}"#).is_none());
        let wrong_type = br#"{"latitude": "north", "longitude": 2.0, "timestamp": 5}"#;
        assert!(parse_fix_response(wrong_type).is_none());
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(LocationRequest { device_code: "ABC123" }).unwrap();
        assert_eq!(body, serde_json::json!({ "deviceCode": "ABC123" }));
    }

    #[test]
    fn test_client_endpoint() {
        let mut config = RelayConfig::new("https://relay.example.com/api/");
        config.api_key = Some("secret".into());
        let client = RelayClient::new(config).unwrap();
        assert_eq!(client.endpoint(), "https://relay.example.com/api/device/location");
        assert_eq!(client.auth_header.as_deref(), Some("Basic QVBJX0tFWTpzZWNyZXQ="));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_no_fix() {
        let mut config = RelayConfig::new("http://127.0.0.1:9");
        config.max_retries = 0;
        config.timeout_ms = 500;
        let client = RelayClient::new(config).unwrap();
        assert!(client.fetch_fix("ABC123").await.is_none());
        assert_eq!(client.fetch_fixes(vec!["A".into(), "B".into()]).await, vec![None, None]);
    }
}
