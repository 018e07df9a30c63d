use std::path::PathBuf;

use clap::Parser;
use logmonitor::conf::AgentConfig;
use logmonitor::runtime::{boot, run};

/// Forward events from the configured log sources to standard output.
#[derive(Parser, Debug)]
#[command(name = "logmonitor", version, about = "Forward monitored log events to stdout")]
struct Cli {
    /// Monitor configuration file (overrides LOGMONITOR_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines file of events to replay, then exit (overrides LOGMONITOR_REPLAY)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Component tag used on the agent's own lines (overrides LOGMONITOR_TAG)
    #[arg(long)]
    tag: Option<String>,

    /// Report dropped output lines on stderr
    #[arg(long)]
    trace_write_errors: bool,
}

impl Cli {
    fn apply(self, mut config: AgentConfig) -> AgentConfig {
        if let Some(path) = self.config {
            config.config_path = path;
        }
        if let Some(path) = self.replay {
            config.replay_path = Some(path);
        }
        if let Some(tag) = self.tag {
            config.component_tag = tag;
        }
        if self.trace_write_errors {
            config.trace_write_errors = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().apply(AgentConfig::from_env());
    boot::init_logging();
    config.validate()?;
    run::run(config).await
}
