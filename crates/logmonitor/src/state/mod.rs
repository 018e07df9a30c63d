//! State module: the top-level monitoring context.

pub mod agent;

pub use agent::{LogMonitor, SharedMonitor};
