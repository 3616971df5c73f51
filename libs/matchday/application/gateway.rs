//! Read-through cache in front of the upstream football API

use crate::domain::{cache_key, CacheEntry, CacheStore, Clock, QueryParams, TtlPolicy, TtlTier};
use crate::infrastructure::client::{UpstreamApi, UpstreamError};
use crate::infrastructure::rate_limit::RateLimiter;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum GatewayError {
    /// No permit was available; `stale` is the last cached entry, if any
    #[error("Rate limit exceeded for {host}")]
    RateLimited {
        host: String,
        stale: Option<Box<CacheEntry>>,
    },

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    Hit,
    Miss,
    Stale,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheSource::Hit => "hit",
            CacheSource::Miss => "miss",
            CacheSource::Stale => "stale",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub source: CacheSource,
    pub entry: CacheEntry,
}

impl GatewayResponse {
    pub fn payload(&self) -> &serde_json::Value {
        &self.entry.response
    }

    pub fn has_data(&self) -> bool {
        self.entry.has_data
    }

    pub fn is_error(&self) -> bool {
        self.entry.is_error
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    rate_limited: AtomicU64,
    upstream_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub rate_limited: u64,
    pub upstream_errors: u64,
}

pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
    upstream: Arc<dyn UpstreamApi>,
    limiter: Arc<dyn RateLimiter>,
    ttl: TtlPolicy,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    counters: Counters,
}

/// `date` parameter of a request, when present and well formed
pub fn request_date(params: &QueryParams) -> Option<NaiveDate> {
    params
        .get("date")
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
}

impl CacheGateway {
    pub fn new(
        store: Arc<dyn CacheStore>,
        upstream: Arc<dyn UpstreamApi>,
        limiter: Arc<dyn RateLimiter>,
        ttl: TtlPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            upstream,
            limiter,
            ttl,
            clock,
            utc_offset: Utc.fix(),
            counters: Counters::default(),
        }
    }

    /// Offset used to decide which calendar day "today" is
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            upstream_errors: self.counters.upstream_errors.load(Ordering::Relaxed),
        }
    }

    /// Serve `endpoint` with `params` from cache, or fetch and cache it.
    ///
    /// A fresh entry is returned without contacting upstream unless
    /// `force_refresh` is set. Misses are gated by the rate limiter.
    pub async fn get(
        &self,
        endpoint: &str,
        params: QueryParams,
        force_refresh: bool,
    ) -> Result<GatewayResponse> {
        let endpoint = endpoint.trim_matches('/');
        if endpoint.is_empty() {
            return Err(GatewayError::InvalidRequest("empty endpoint".to_string()));
        }

        let key = cache_key(endpoint, &params);
        let now = self.clock.now();

        let existing = match self.store.get_entry(&key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(endpoint = %endpoint, "Cache read failed, treating as miss: {}", e);
                None
            }
        };

        if !force_refresh {
            if let Some(entry) = existing.as_ref().filter(|entry| entry.is_fresh(now)) {
                debug!(
                    endpoint = %endpoint,
                    remaining_secs = entry.remaining_secs(now),
                    "Cache hit"
                );
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(GatewayResponse {
                    source: CacheSource::Hit,
                    entry: entry.clone(),
                });
            }
        }

        let host = self.upstream.host().to_string();
        if !self.limiter.try_acquire(&host).await {
            warn!(endpoint = %endpoint, host = %host, "Rate limit reached, not calling upstream");
            self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            return Err(GatewayError::RateLimited {
                host,
                stale: existing.map(Box::new),
            });
        }

        debug!(endpoint = %endpoint, force_refresh, "Cache miss, fetching upstream");

        match self.upstream.get(endpoint, &params).await {
            Ok(response) if !response.is_error() => {
                let has_data = response.has_data();
                let tier = TtlPolicy::classify_request(
                    has_data,
                    false,
                    request_date(&params),
                    self.today(),
                );
                let entry = CacheEntry::new(
                    endpoint,
                    params,
                    response.body,
                    has_data,
                    false,
                    self.ttl.seconds(tier),
                    now,
                );
                debug!(endpoint = %endpoint, tier = %tier, ttl = entry.ttl_seconds, "Fetched");
                self.write(&entry).await;
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                Ok(GatewayResponse {
                    source: CacheSource::Miss,
                    entry,
                })
            }
            Ok(response) => {
                warn!(endpoint = %endpoint, errors = %response.envelope().errors, "Upstream reported errors");
                self.counters.upstream_errors.fetch_add(1, Ordering::Relaxed);
                let has_data = response.has_data();
                self.serve_failure(endpoint, params, existing, response.body, has_data, None)
                    .await
            }
            Err(UpstreamError::RateLimitExceeded) => {
                warn!(endpoint = %endpoint, "Upstream rejected request with 429");
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                Err(GatewayError::RateLimited {
                    host,
                    stale: existing.map(Box::new),
                })
            }
            Err(e) => {
                warn!(endpoint = %endpoint, "Upstream request failed: {}", e);
                self.counters.upstream_errors.fetch_add(1, Ordering::Relaxed);
                let body = json!({
                    "results": 0,
                    "errors": {"upstream": e.to_string()},
                    "response": [],
                });
                self.serve_failure(endpoint, params, existing, body, false, Some(e))
                    .await
            }
        }
    }

    /// Stale-if-error.
    ///
    /// Always writes an ERROR-tier entry so repeated failures are absorbed by
    /// the cache. With a previous entry its payload is kept and served;
    /// otherwise the error body is cached and the failure surfaced.
    async fn serve_failure(
        &self,
        endpoint: &str,
        params: QueryParams,
        existing: Option<CacheEntry>,
        error_body: serde_json::Value,
        error_has_data: bool,
        error: Option<UpstreamError>,
    ) -> Result<GatewayResponse> {
        let now = self.clock.now();
        let ttl = self.ttl.seconds(TtlTier::Error);

        if let Some(stale) = existing.filter(|entry| entry.has_data) {
            warn!(
                endpoint = %endpoint,
                cached_at = %stale.cached_at,
                "Serving stale entry after upstream failure"
            );
            let entry = CacheEntry::new(endpoint, params, stale.response, true, true, ttl, now);
            self.write(&entry).await;
            self.counters.stale.fetch_add(1, Ordering::Relaxed);
            return Ok(GatewayResponse {
                source: CacheSource::Stale,
                entry,
            });
        }

        let entry = CacheEntry::new(endpoint, params, error_body, error_has_data, true, ttl, now);
        self.write(&entry).await;

        match error {
            Some(e) => Err(GatewayError::Upstream(e)),
            None => Ok(GatewayResponse {
                source: CacheSource::Miss,
                entry,
            }),
        }
    }

    async fn write(&self, entry: &CacheEntry) {
        if let Err(e) = self.store.upsert_entry(entry).await {
            warn!(endpoint = %entry.endpoint, "Failed to write cache entry: {}", e);
        }
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.utc_offset).date_naive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ManualClock;
    use crate::infrastructure::client::UpstreamResponse;
    use crate::infrastructure::{MemoryStore, SlidingWindowLimiter};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    type Scripted = std::result::Result<serde_json::Value, UpstreamError>;

    #[derive(Default)]
    struct ScriptedUpstream {
        replies: Mutex<VecDeque<Scripted>>,
        calls: AtomicU64,
    }

    impl ScriptedUpstream {
        fn push(&self, reply: Scripted) {
            self.replies.lock().push_back(reply);
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamApi for ScriptedUpstream {
        fn host(&self) -> &str {
            "api.test"
        }

        async fn get(
            &self,
            _endpoint: &str,
            _params: &QueryParams,
        ) -> std::result::Result<UpstreamResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"results": 0, "errors": [], "response": []})));
            reply.map(|body| UpstreamResponse::new(200, body))
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 16, 12, 0, 0).unwrap()
    }

    fn fixtures_body(n: usize) -> serde_json::Value {
        let items: Vec<serde_json::Value> = (0..n).map(|i| json!({"fixture": {"id": i}})).collect();
        json!({"results": n, "errors": [], "response": items})
    }

    fn params(date: &str) -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("date".to_string(), date.to_string());
        params.insert("league".to_string(), "39".to_string());
        params.insert("season".to_string(), "2025".to_string());
        params
    }

    struct Harness {
        gateway: CacheGateway,
        upstream: Arc<ScriptedUpstream>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn harness(max_per_minute: u32) -> Harness {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryStore::new());
        let upstream = Arc::new(ScriptedUpstream::default());
        let limiter = Arc::new(SlidingWindowLimiter::new(max_per_minute, clock.clone()));
        let gateway = CacheGateway::new(
            store.clone(),
            upstream.clone(),
            limiter,
            TtlPolicy::default(),
            clock.clone(),
        );
        Harness {
            gateway,
            upstream,
            store,
            clock,
        }
    }

    #[tokio::test]
    async fn test_hit_before_expiry_skips_upstream() {
        let h = harness(10);
        h.upstream.push(Ok(fixtures_body(2)));

        let first = h.gateway.get("fixtures", params("2025-07-20"), false).await.unwrap();
        assert_eq!(first.source, CacheSource::Miss);
        assert_eq!(first.entry.ttl_seconds, TtlPolicy::default().seconds(TtlTier::Future));

        h.clock.advance(Duration::seconds(1000));
        let second = h.gateway.get("/fixtures/", params("2025-07-20"), false).await.unwrap();
        assert_eq!(second.source, CacheSource::Hit);
        assert_eq!(second.payload(), first.payload());
        assert_eq!(h.upstream.calls(), 1);

        h.clock.advance(Duration::seconds(900));
        let third = h.gateway.get("fixtures", params("2025-07-20"), false).await.unwrap();
        assert_eq!(third.source, CacheSource::Miss);
        assert_eq!(h.upstream.calls(), 2);
        assert_eq!(h.gateway.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_force_refresh_always_calls_upstream() {
        let h = harness(10);
        h.upstream.push(Ok(fixtures_body(1)));
        h.upstream.push(Ok(fixtures_body(3)));

        h.gateway.get("fixtures", params("2025-07-16"), false).await.unwrap();
        let refreshed = h.gateway.get("fixtures", params("2025-07-16"), true).await.unwrap();

        assert_eq!(h.upstream.calls(), 2);
        assert_eq!(refreshed.source, CacheSource::Miss);
        assert_eq!(refreshed.payload()["results"], 3);
    }

    #[tokio::test]
    async fn test_ttl_tiers() {
        let h = harness(10);
        let policy = TtlPolicy::default();

        h.upstream.push(Ok(fixtures_body(0)));
        let empty = h.gateway.get("fixtures", params("2025-07-20"), false).await.unwrap();
        assert_eq!(empty.entry.ttl_seconds, policy.seconds(TtlTier::Empty));
        assert!(!empty.has_data());

        h.upstream.push(Ok(fixtures_body(1)));
        let past = h.gateway.get("fixtures", params("2025-07-01"), false).await.unwrap();
        assert_eq!(past.entry.ttl_seconds, policy.seconds(TtlTier::Past));

        h.upstream.push(Ok(fixtures_body(1)));
        let today = h.gateway.get("fixtures", params("2025-07-16"), false).await.unwrap();
        assert_eq!(today.entry.ttl_seconds, policy.seconds(TtlTier::Default));

        h.upstream.push(Ok(fixtures_body(1)));
        let undated = h.gateway.get("standings", QueryParams::new(), false).await.unwrap();
        assert_eq!(undated.entry.ttl_seconds, policy.seconds(TtlTier::Default));

        // expiresAt == cachedAt + ttl for everything written
        let stored = h.store.get_entry(&past.entry.key).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, stored.cached_at + Duration::seconds(stored.ttl_seconds));
    }

    #[tokio::test]
    async fn test_rate_limited_miss_returns_stale_without_upstream() {
        let h = harness(1);
        h.upstream.push(Ok(fixtures_body(2)));
        h.gateway.get("fixtures", params("2025-07-16"), false).await.unwrap();

        let err = h
            .gateway
            .get("fixtures", params("2025-07-16"), true)
            .await
            .unwrap_err();
        match err {
            GatewayError::RateLimited { host, stale } => {
                assert_eq!(host, "api.test");
                assert_eq!(stale.unwrap().response["results"], 2);
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert_eq!(h.upstream.calls(), 1);

        let err = h
            .gateway
            .get("fixtures", params("2025-07-17"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { stale: None, .. }));
    }

    #[tokio::test]
    async fn test_stale_if_error_after_timeout() {
        let h = harness(10);
        h.upstream.push(Ok(fixtures_body(2)));
        let fresh = h.gateway.get("fixtures", params("2025-07-20"), false).await.unwrap();

        h.clock.advance(Duration::seconds(4000));
        h.upstream.push(Err(UpstreamError::Timeout));
        let stale = h.gateway.get("fixtures", params("2025-07-20"), false).await.unwrap();
        assert_eq!(stale.source, CacheSource::Stale);
        assert_eq!(stale.payload(), fresh.payload());
        assert!(stale.is_error());
        assert_eq!(stale.entry.ttl_seconds, TtlPolicy::default().seconds(TtlTier::Error));

        // ERROR-tier entry absorbs the next read
        let again = h.gateway.get("fixtures", params("2025-07-20"), false).await.unwrap();
        assert_eq!(again.source, CacheSource::Hit);
        assert_eq!(h.upstream.calls(), 2);
    }

    #[tokio::test]
    async fn test_error_without_previous_entry_is_cached_and_surfaced() {
        let h = harness(10);
        h.upstream.push(Err(UpstreamError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }));

        let err = h
            .gateway
            .get("fixtures", params("2025-07-20"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(UpstreamError::Status { status: 503, .. })));

        let cached = h.gateway.get("fixtures", params("2025-07-20"), false).await.unwrap();
        assert_eq!(cached.source, CacheSource::Hit);
        assert!(cached.is_error());
        assert!(!cached.has_data());
        assert_eq!(h.upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_error_envelope_cached_with_error_tier() {
        let h = harness(10);
        h.upstream.push(Ok(json!({"results": 0, "errors": {"token": "invalid"}, "response": []})));

        let response = h.gateway.get("teams", params("2025-07-20"), false).await.unwrap();
        assert_eq!(response.source, CacheSource::Miss);
        assert!(response.is_error());
        assert_eq!(response.entry.ttl_seconds, TtlPolicy::default().seconds(TtlTier::Error));
    }

    #[tokio::test]
    async fn test_empty_endpoint_rejected() {
        let h = harness(10);
        let err = h.gateway.get("/", QueryParams::new(), false).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert_eq!(h.upstream.calls(), 0);
    }

    #[test]
    fn test_request_date_parsing() {
        assert_eq!(
            request_date(&params("2025-07-16")),
            NaiveDate::from_ymd_opt(2025, 7, 16)
        );
        assert_eq!(request_date(&params("16/07/2025")), None);
        assert_eq!(request_date(&QueryParams::new()), None);
    }
}
