//! Runtime module: agent lifecycle: boot, run, shutdown.

pub mod boot;
pub mod run;
pub mod stop;
