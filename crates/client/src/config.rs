//! Client settings read from the environment.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root directory for session logs.
    pub log_dir: PathBuf,
    /// Log subdirectory; generated from the start time when unset.
    pub session_id: Option<String>,
}

impl ClientConfig {
    /// Environment variables:
    /// - `RACE_LOG_DIR` - Log root (default: platform cache dir + `logs`)
    /// - `RACE_SESSION_ID` - Session name (default: `session_<timestamp>`)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var("RACE_LOG_DIR")
            && !dir.trim().is_empty()
        {
            config.log_dir = PathBuf::from(dir);
        }
        config.session_id = env::var("RACE_SESSION_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());
        config
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            session_id: None,
        }
    }
}

/// Platform cache directory for logs, `./logs` when there is none.
pub fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "racetimer")
        .map(|dirs| dirs.cache_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}
