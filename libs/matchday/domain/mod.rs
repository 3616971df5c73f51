//! Domain Layer
//!
//! Pure entities and ports. No I/O happens here.

pub mod cache;
pub mod clock;
pub mod events;
pub mod league;
pub mod live;
pub mod ports;
pub mod ttl;

pub use cache::{cache_key, CacheEntry, QueryParams};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{
    BroadcastMessage, CardEvent, DiffEvent, EventType, GoalEvent, StatusChangeEvent,
};
pub use league::{default_leagues, League, SeasonRule};
pub use live::{
    is_live_status, EventKind, LiveCandidate, LiveMatchSnapshot, MatchEvent, MatchStatistics,
    LIVE_STATUSES,
};
pub use ports::{CacheStore, LeaseStore, LiveMatchStore, StoreError, StoreResult};
pub use ttl::{TtlPolicy, TtlTier};
