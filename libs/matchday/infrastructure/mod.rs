//! Infrastructure Layer
//!
//! Implementations of external interfaces: upstream API client, storage,
//! rate limiting, broadcast and the HTTP surface.

pub mod broadcast;
pub mod client;
pub mod config;
pub mod database;
pub mod logging;
pub mod memory;
pub mod rate_limit;
pub mod server;

pub use broadcast::{BroadcastError, EventBroadcaster};
pub use client::{FootballClient, RateLimitQuota, UpstreamApi, UpstreamError, UpstreamResponse};
pub use config::{ConfigError, GatewayConfig};
pub use database::SqlStore;
pub use logging::{init_tracing, init_tracing_with_level};
pub use memory::MemoryStore;
pub use rate_limit::{RateLimiter, SlidingWindowLimiter, SqlRateLimiter};
pub use server::{create_router, serve, ApiError, AppState};
