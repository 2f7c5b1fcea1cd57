//! Runtime configuration loaded from environment variables.
//!
//! - `TASKBOARD_DATA_DIR` - Data root (default: platform data directory)
//! - `TASKBOARD_PORT` - HTTP port (default: 17020)
//! - `TASKBOARD_SYNC_INTERVAL_SECS` - Auto-sync period (default: 1800)
//! - `TASKBOARD_FETCH_TIMEOUT_SECS` - Feed fetch timeout (default: 30)
//! - `TASKBOARD_FETCH_ATTEMPTS` - Feed fetch attempts before giving up (default: 3)
//! - `TASKBOARD_UPDATE_IMPORTED` - `true` to update imported events in place by UID

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;

use crate::sync::{ImportUpdatePolicy, RetryPolicy, SyncOptions, DEFAULT_SYNC_INTERVAL};

pub const DEFAULT_PORT: u16 = 17020;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub sync_interval: Duration,
    pub fetch_timeout: Duration,
    pub fetch_attempts: u32,
    pub update_policy: ImportUpdatePolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var_os("TASKBOARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let update_policy = match std::env::var("TASKBOARD_UPDATE_IMPORTED").ok().as_deref() {
            Some("1" | "true" | "yes") => ImportUpdatePolicy::ByExternalId,
            _ => ImportUpdatePolicy::Never,
        };

        Self {
            data_dir,
            port: env_parse("TASKBOARD_PORT").unwrap_or(defaults.port),
            sync_interval: env_parse("TASKBOARD_SYNC_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            fetch_timeout: env_parse("TASKBOARD_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            fetch_attempts: env_parse("TASKBOARD_FETCH_ATTEMPTS").unwrap_or(defaults.fetch_attempts),
            update_policy,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            fetch_timeout: self.fetch_timeout,
            retry: RetryPolicy {
                max_attempts: self.fetch_attempts.max(1),
                ..RetryPolicy::default()
            },
            update_policy: self.update_policy,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            port: DEFAULT_PORT,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            fetch_timeout: Duration::from_secs(30),
            fetch_attempts: 3,
            update_policy: ImportUpdatePolicy::Never,
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", "taskboard") {
        return dirs.data_dir().to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".taskboard")
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_options_never_disable_fetching() {
        let config = AppConfig {
            fetch_attempts: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.sync_options().retry.max_attempts, 1);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.sync_interval, Duration::from_secs(1800));
        assert_eq!(config.update_policy, ImportUpdatePolicy::Never);
    }
}
