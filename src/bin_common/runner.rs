//! Binary runner utilities
//!
//! Startup and shutdown banners shared by every binary.

use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// One-line description printed under the name
    pub description: Option<String>,
    /// Whether the binary runs until Ctrl+C
    pub long_running: bool,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            long_running: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark as a run-to-completion job
    pub fn one_shot(mut self) -> Self {
        self.long_running = false;
        self
    }
}

/// Print startup banner
pub fn print_banner(config: &RunConfig) {
    info!("");
    info!("========================================");
    info!("Starting {}", config.name);
    if let Some(description) = &config.description {
        info!("{}", description);
    }
    if config.long_running {
        info!("Press Ctrl+C to stop");
    }
    info!("========================================");
    info!("");
}

/// Print shutdown banner
pub fn print_shutdown(config: &RunConfig, stats: Option<&str>) {
    info!("");
    info!("========================================");
    info!("{} stopped gracefully", config.name);
    if let Some(stats) = stats {
        info!("{}", stats);
    }
    info!("========================================");
}
