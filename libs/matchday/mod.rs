//! Matchday sports-data gateway
//!
//! Caching gateway in front of a third-party football API, live-match
//! diffing with event broadcast, and a precache scheduler.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod utils;

// Re-export commonly used items
pub use application::{
    CacheGateway, DiffEngine, GatewayResponse, LiveMatchPoller, MatchdayApp, PollResult,
    PrecacheScheduler, PrecacheStats,
};
pub use domain::{
    CacheEntry, Clock, DiffEvent, LiveMatchSnapshot, MatchEvent, MatchStatistics, QueryParams,
    SystemClock, TtlPolicy, TtlTier,
};
pub use infrastructure::{
    init_tracing, init_tracing_with_level, EventBroadcaster, FootballClient, GatewayConfig,
    MemoryStore, SlidingWindowLimiter, SqlRateLimiter, SqlStore,
};
pub use utils::{Heartbeat, ShutdownManager};
