// Domain-driven module structure for the LogMonitor agent.

/// Agent version reported at start-up.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Core infrastructure
pub mod text;
pub mod output;
pub mod state;

// Domain modules
pub mod conf;
pub mod monitor;
pub mod runtime;
