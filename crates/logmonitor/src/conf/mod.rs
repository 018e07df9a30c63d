//! Conf module: agent settings and the monitor configuration file.

pub mod load;
pub mod model;

use thiserror::Error;

pub use model::{AgentConfig, EtwProvider, EtwSource, LoggerSettings, SourceConfig, SourceKind};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required element '{0}'")]
    Missing(&'static str),
    #[error("source #{index}: {reason}")]
    InvalidSource { index: usize, reason: String },
}
