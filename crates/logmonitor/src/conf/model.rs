//! Model: agent settings and the in-memory monitor configuration.

use std::fmt;
use std::path::PathBuf;

use crate::monitor::EventLevel;
use crate::output::{WriteFailurePolicy, DEFAULT_TAG};

/// Where the monitor configuration lives when nothing else is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logmonitor/LogMonitorConfig.json";

/// Settings of the agent process itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub config_path: PathBuf,
    pub component_tag: String,
    pub trace_write_errors: bool,
    /// JSON-lines file of events to feed into the in-process session.
    pub replay_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            component_tag: DEFAULT_TAG.to_string(),
            trace_write_errors: false,
            replay_path: None,
        }
    }
}

impl AgentConfig {
    pub fn write_failure_policy(&self) -> WriteFailurePolicy {
        if self.trace_write_errors {
            WriteFailurePolicy::Trace
        } else {
            WriteFailurePolicy::Ignore
        }
    }
}

/// Validated monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerSettings {
    pub sources: Vec<SourceConfig>,
}

/// Discriminant of [`SourceConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Etw,
    EventLog,
    File,
    Process,
    Unknown(String),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Etw => f.write_str("ETW"),
            SourceKind::EventLog => f.write_str("EventLog"),
            SourceKind::File => f.write_str("File"),
            SourceKind::Process => f.write_str("Process"),
            SourceKind::Unknown(name) => f.write_str(name),
        }
    }
}

/// One configured log source. Only `Etw` sources are monitored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Etw(EtwSource),
    EventLog,
    File,
    Process,
    Unknown(String),
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Etw(_) => SourceKind::Etw,
            SourceConfig::EventLog => SourceKind::EventLog,
            SourceConfig::File => SourceKind::File,
            SourceConfig::Process => SourceKind::Process,
            SourceConfig::Unknown(name) => SourceKind::Unknown(name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtwSource {
    pub providers: Vec<EtwProvider>,
}

/// A provider as written in the configuration file.
///
/// The GUID is kept as text: checking it is the monitor's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtwProvider {
    pub provider_name: Option<String>,
    pub provider_guid: Option<String>,
    pub level: EventLevel,
    /// Zero enables every keyword.
    pub keywords: u64,
}
