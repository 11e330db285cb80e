//! Session log setup: a file per session plus stderr.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::ClientConfig;

pub const LOG_FILE: &str = "racetimer.log";

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. The returned guard
/// flushes the file writer when dropped and must outlive the program's work.
pub fn setup_logging(config: &ClientConfig) -> Result<WorkerGuard> {
    let session_id = config
        .session_id
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("session_%Y%m%d_%H%M%S").to_string());

    let session_dir = config.log_dir.join(&session_id);
    fs::create_dir_all(&session_dir)
        .with_context(|| format!("creating log directory {}", session_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&session_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!(session = %session_id, "logging initialized");
    tracing::debug!("log file: {}", session_dir.join(LOG_FILE).display());

    Ok(guard)
}
