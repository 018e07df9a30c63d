//! Output module: line formatting and the shared, serialized output sink.

pub mod format;
pub mod writer;

use thiserror::Error;

pub use format::{format_line, format_timestamp, sanitize_tag, terminate_line, Severity, DEFAULT_TAG};
pub use writer::{LogWriter, WriteFailurePolicy};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),
}
