//! Run: start monitoring, feed or wait, then shut down.

use std::sync::Arc;
use tracing::{error, info};

use crate::conf::AgentConfig;
use crate::monitor::replay::{load_events, publish_events, register_providers};
use crate::monitor::render_callback;
use crate::runtime::boot::boot;
use crate::runtime::stop::shutdown_signal;

/// Start the monitors described by `config.config_path` and keep them
/// running until a shutdown signal, or until a replay file is exhausted.
pub async fn run(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (monitor, bus) = boot(&config);

    // Replay providers must be resolvable before the monitors subscribe.
    let replay = match &config.replay_path {
        Some(path) => {
            let records = load_events(path)?;
            let registered = register_providers(&records, &bus);
            info!("Loaded {} replay event(s), {} new provider(s)", records.len(), registered);
            Some(records)
        }
        None => None,
    };

    let callback = render_callback(Arc::clone(monitor.writer()));
    if !monitor.start_log_monitor(&config.config_path, callback) {
        error!("Could not start monitoring with {}", config.config_path.display());
        return Err(format!("invalid configuration file: {}", config.config_path.display()).into());
    }
    info!("Monitoring with {} active monitor(s)", monitor.active_monitors());

    match replay {
        Some(records) => {
            let feed = Arc::clone(&bus);
            let published = tokio::task::spawn_blocking(move || publish_events(records, &feed)).await?;

            bus.close();
            let drain = Arc::clone(&monitor);
            tokio::task::spawn_blocking(move || drain.wait_log_monitor()).await?;
            info!("Replay complete: {} event(s)", published);
        }
        None => {
            info!("Press Ctrl+C to shutdown gracefully");
            shutdown_signal().await;
            monitor.stop_log_monitor();
            bus.close();
        }
    }

    info!("LogMonitor shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_replay_exits_after_drain() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write(
            dir.path(),
            "LogMonitorConfig.json",
            r#"{"LogConfig": {"sources": [{"type": "ETW", "providers": [{"providerName": "App", "level": "Verbose"}]}]}}"#,
        );
        let replay_path = write(
            dir.path(),
            "events.jsonl",
            "{\"provider\": \"App\", \"text\": \"hello\"}\n{\"provider\": \"App\", \"base64\": \"aGk=\"}\n",
        );

        let config = AgentConfig {
            config_path,
            replay_path: Some(replay_path),
            ..AgentConfig::default()
        };
        assert!(run(config).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_rejects_bad_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write(dir.path(), "LogMonitorConfig.json", "not json");
        let config = AgentConfig { config_path, ..AgentConfig::default() };
        let err = run(config).await.unwrap_err();
        assert!(err.to_string().contains("invalid configuration file"));
    }

    #[tokio::test]
    async fn test_run_replay_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write(dir.path(), "LogMonitorConfig.json", r#"{"LogConfig": {"sources": []}}"#);
        let replay_path = write(dir.path(), "events.jsonl", "{broken");
        let config = AgentConfig {
            config_path,
            replay_path: Some(replay_path),
            ..AgentConfig::default()
        };
        let err = run(config).await.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
