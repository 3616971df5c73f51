//! Application Layer
//!
//! Use cases built on the domain ports: the caching gateway, live polling
//! with diffing, and the precache scheduler.

pub mod diff;
pub mod facade;
pub mod gateway;
pub mod poller;
pub mod precache;

// Re-export application facade for binaries
pub use facade::MatchdayApp;

// Re-export gateway
pub use gateway::{CacheGateway, CacheSource, GatewayError, GatewayResponse, GatewayStats};

// Re-export live pipeline
pub use diff::{DiffEngine, DiffOutcome, FixtureDiff, FixtureOutcome};
pub use poller::{LiveMatchPoller, PollError, PollResult};

// Re-export precache
pub use precache::{PrecacheError, PrecacheScheduler, PrecacheStats};
