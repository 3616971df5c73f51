//! Upstream sports-data API clients

pub mod football;

use crate::domain::QueryParams;
use async_trait::async_trait;

pub use football::{
    decode_live_candidates, ApiEnvelope, FixtureRecord, FootballClient, LiveDecode, RateLimitQuota,
    UpstreamError, UpstreamResponse,
};

pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Read access to the upstream API
///
/// Implemented by [`FootballClient`] over HTTP and by scripted doubles in
/// tests.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Host the requests go to; rate limits are tracked per host
    fn host(&self) -> &str;

    /// GET `endpoint` with `params`.
    ///
    /// Transport failures, timeouts and non-2xx statuses are errors. A 2xx
    /// response whose body reports errors is returned as `Ok` and flagged by
    /// [`UpstreamResponse::is_error`].
    async fn get(&self, endpoint: &str, params: &QueryParams) -> Result<UpstreamResponse>;
}
