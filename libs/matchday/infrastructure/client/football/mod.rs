//! Football API (api-sports v3) client and payload types

pub mod client;
pub mod types;

pub use client::{FootballClient, RateLimitQuota, UpstreamError, UpstreamResponse};
pub use types::{decode_live_candidates, ApiEnvelope, FixtureRecord, LiveDecode};
