//! Process utilities shared by the long-running jobs

mod heartbeat;
mod shutdown;

pub use heartbeat::Heartbeat;
pub use shutdown::ShutdownManager;
