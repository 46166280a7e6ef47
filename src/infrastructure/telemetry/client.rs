use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::{debug, instrument, warn};

use crate::domain::models::{TelemetryConfig, TelemetryReading, TelemetryResponse};
use crate::domain::ports::{TelemetryClient, TelemetryError};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP client for the device telemetry service
///
/// Features:
/// - Connection pooling and reuse (via reqwest::Client)
/// - Client-side rate limiting so a scheduler sweep cannot flood the service
/// - HTTP 404 and empty record lists both mean "no data yet"
/// - Every other failure is reported as transient; callers retry on a later tick
pub struct HttpTelemetryClient {
    http_client: ReqwestClient,
    base_url: String,
    api_key: Option<String>,
    limiter: Arc<Limiter>,
}

impl HttpTelemetryClient {
    /// Create a client from configuration
    ///
    /// # Returns
    /// * `Ok(HttpTelemetryClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to build HTTP client
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(per_second);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    fn device_url(&self, device_id: &str) -> String {
        format!("{}/device/{}", self.base_url, device_id.to_uppercase())
    }
}

#[async_trait]
impl TelemetryClient for HttpTelemetryClient {
    #[instrument(skip(self), fields(url))]
    async fn fetch_latest(
        &self,
        device_id: &str,
    ) -> Result<Option<TelemetryReading>, TelemetryError> {
        self.limiter.until_ready().await;

        let url = self.device_url(device_id);
        tracing::Span::current().record("url", url.as_str());

        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "telemetry request failed");
            TelemetryError::Network(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("device has no telemetry yet");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            warn!(status = status.as_u16(), "telemetry service returned an error");
            return Err(TelemetryError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: TelemetryResponse = serde_json::from_str(&body)
            .map_err(|e| TelemetryError::Malformed(e.to_string()))?;

        let latest = parsed.latest();
        if latest.is_none() {
            debug!("telemetry response carried no records");
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_url_is_upper_cased() {
        let client = HttpTelemetryClient::new(&TelemetryConfig {
            base_url: "http://telemetry.local/".to_string(),
            ..Default::default()
        })
        .expect("client");
        assert_eq!(
            client.device_url("ab12cd"),
            "http://telemetry.local/device/AB12CD"
        );
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let config = TelemetryConfig {
            requests_per_second: 0,
            burst_size: 0,
            ..Default::default()
        };
        assert!(HttpTelemetryClient::new(&config).is_ok());
    }
}
