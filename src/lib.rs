//! Matchday Gateway - Main Library
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **matchday**: Core gateway, live polling and precache logic (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use matchday_gateway::bin_common::{load_config_from_env, ConfigType};
//! use matchday_gateway::matchday::MatchdayApp;
//! ```

// Re-export workspace library for convenience
pub use matchday;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, ConfigType, PrecacheArgs};
    pub use runner::{print_banner, print_shutdown, RunConfig};
}
