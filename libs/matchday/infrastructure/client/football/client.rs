use super::types::ApiEnvelope;
use crate::domain::QueryParams;
use crate::infrastructure::client::UpstreamApi;
use crate::infrastructure::config::ApiConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream rate limit exceeded")]
    RateLimitExceeded,

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Quota headers reported by upstream on every response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitQuota {
    /// `x-ratelimit-requests-remaining` (daily)
    pub daily_remaining: Option<i64>,
    /// `x-ratelimit-requests-limit`
    pub daily_limit: Option<i64>,
    /// `x-ratelimit-remaining` (per minute)
    pub minute_remaining: Option<i64>,
    /// `x-ratelimit-limit`
    pub minute_limit: Option<i64>,
}

impl RateLimitQuota {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };
        Self {
            daily_remaining: read("x-ratelimit-requests-remaining"),
            daily_limit: read("x-ratelimit-requests-limit"),
            minute_remaining: read("x-ratelimit-remaining"),
            minute_limit: read("x-ratelimit-limit"),
        }
    }

    /// True when either quota is at or below `threshold` (daily uses 10x)
    pub fn is_low(&self, threshold: i64) -> bool {
        self.minute_remaining.map(|r| r <= threshold).unwrap_or(false)
            || self.daily_remaining.map(|r| r <= threshold * 10).unwrap_or(false)
    }
}

/// Successful upstream response
///
/// The envelope is decoded once on construction; a body that is not an
/// envelope reads as empty.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: serde_json::Value,
    pub quota: RateLimitQuota,
    envelope: ApiEnvelope,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        let envelope = ApiEnvelope::deserialize(&body).unwrap_or_default();
        Self {
            status,
            body,
            quota: RateLimitQuota::default(),
            envelope,
        }
    }

    pub fn with_quota(mut self, quota: RateLimitQuota) -> Self {
        self.quota = quota;
        self
    }

    pub fn envelope(&self) -> &ApiEnvelope {
        &self.envelope
    }

    pub fn has_data(&self) -> bool {
        self.envelope().has_data()
    }

    pub fn is_error(&self) -> bool {
        self.envelope().has_errors()
    }
}

/// HTTP client for the football API
pub struct FootballClient {
    base_url: String,
    host: String,
    low_quota_threshold: i64,
    client: Client,
}

impl FootballClient {
    /// Create a client with the API key header and request timeout applied
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let name = HeaderName::from_bytes(config.auth_header.as_bytes())
            .map_err(|e| UpstreamError::Config(format!("auth_header: {}", e)))?;
        let mut value = HeaderValue::from_str(&config.api_key)
            .map_err(|e| UpstreamError::Config(format!("api key: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(name, value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            host: config.host.clone(),
            low_quota_threshold: config.low_quota_threshold,
            client,
        })
    }

    fn log_quota(&self, endpoint: &str, quota: &RateLimitQuota) {
        debug!(
            endpoint = %endpoint,
            daily_remaining = ?quota.daily_remaining,
            minute_remaining = ?quota.minute_remaining,
            "Upstream quota"
        );
        if quota.is_low(self.low_quota_threshold) {
            warn!(
                "Upstream quota running low: {:?}/min, {:?}/day remaining",
                quota.minute_remaining, quota.daily_remaining
            );
        }
    }
}

#[async_trait]
impl UpstreamApi for FootballClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get(&self, endpoint: &str, params: &QueryParams) -> Result<UpstreamResponse> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_matches('/'));

        debug!("GET {} with {} params", url, params.len());

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::RequestFailed(e)
                }
            })?;

        let status = response.status();
        let quota = RateLimitQuota::from_headers(response.headers());
        self.log_quota(endpoint, &quota);

        if status.as_u16() == 429 {
            warn!("Upstream rate limit exceeded");
            return Err(UpstreamError::RateLimitExceeded);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::DeserializeFailed(e.to_string()))?;

        Ok(UpstreamResponse::new(status.as_u16(), body).with_quota(quota))
    }
}
