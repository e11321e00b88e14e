//! Subscriber setup for the `albumtree` binary.
//!
//! The library itself only emits `tracing` events: registry mutations and
//! store refusals from `album`, bulk check changes from `model`, history
//! pruning from `history`. Embedders install their own subscriber; the
//! command line tool calls [`init`].

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter, e.g. `ALBUMTREE_LOG=debug`
/// or `ALBUMTREE_LOG=albumtree::album=trace`.
pub const LOG_ENV: &str = "ALBUMTREE_LOG";

/// Other crates stay quiet unless asked for.
const DEFAULT_FILTER: &str = "warn,albumtree=info";

const LOG_FILE: &str = "albumtree.log";

static FILE_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Install the global subscriber. Fails if one is already installed.
///
/// Events go to the systemd journal when it is reachable, otherwise to a
/// daily file under `log_dir` (or [`default_log_dir`]).
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let filter = env_filter();

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(filter)
                .with(journald)
                .try_init()?;
            tracing::debug!("albumtree logging to the journal");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE));
    // Buffered lines are flushed when the guard drops, so it lives as long as the process.
    let _ = FILE_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    tracing::debug!("albumtree logging to {:?}", log_dir.join(LOG_FILE));
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("albumtree")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_dir() {
        let dir = default_log_dir();
        assert!(dir.ends_with("albumtree/logs"));
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
