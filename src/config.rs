use crate::ingest::RetryPolicy;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_DIR: &str = "saved_audios";
pub const DEFAULT_LEDGER_PATH: &str = "processed_files.log";
pub const DEFAULT_SCRATCH_PREFIX: &str = "RBX";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub watch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub scratch_prefix: String,
    pub open_retry_attempts: u32,
    pub open_retry_interval_ms: u64,
    pub scan_poll_interval_ms: u64,
    pub read_chunk_size: usize,
    /// 0 means one worker per available hardware thread.
    pub worker_threads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            scratch_prefix: DEFAULT_SCRATCH_PREFIX.to_string(),
            open_retry_attempts: 10,
            open_retry_interval_ms: 1000,
            scan_poll_interval_ms: 100,
            read_chunk_size: 64 * 1024,
            worker_threads: 0,
        }
    }
}

impl AppConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.open_retry_attempts,
            interval: Duration::from_millis(self.open_retry_interval_ms),
        }
    }

    pub fn scan_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scan_poll_interval_ms)
    }
}

/// The producer's cache directory under the user's temp dir.
pub fn default_watch_dir() -> PathBuf {
    env::temp_dir().join("Roblox").join("http")
}

/// Defaults, then an optional `Config.toml`, then `HARVESTER_*` variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let defaults = AppConfig::default();

    let builder = Config::builder()
        .set_default("watch_dir", defaults.watch_dir.to_string_lossy().into_owned())?
        .set_default("output_dir", DEFAULT_OUTPUT_DIR)?
        .set_default("ledger_path", DEFAULT_LEDGER_PATH)?
        .set_default("scratch_prefix", DEFAULT_SCRATCH_PREFIX)?
        .set_default("open_retry_attempts", i64::from(defaults.open_retry_attempts))?
        .set_default("open_retry_interval_ms", defaults.open_retry_interval_ms as i64)?
        .set_default("scan_poll_interval_ms", defaults.scan_poll_interval_ms as i64)?
        .set_default("read_chunk_size", defaults.read_chunk_size as i64)?
        .set_default("worker_threads", defaults.worker_threads as i64)?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("HARVESTER").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_producer_layout() {
        let config = AppConfig::default();
        assert!(config.watch_dir.ends_with(PathBuf::from("Roblox").join("http")));
        assert_eq!(config.output_dir, PathBuf::from("saved_audios"));
        assert_eq!(config.ledger_path, PathBuf::from("processed_files.log"));
        assert_eq!(config.scratch_prefix, "RBX");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = AppConfig {
            open_retry_attempts: 3,
            open_retry_interval_ms: 250,
            ..AppConfig::default()
        };
        assert_eq!(
            config.retry_policy(),
            RetryPolicy {
                max_attempts: 3,
                interval: Duration::from_millis(250),
            }
        );
        assert_eq!(config.scan_poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_configuration_uses_defaults() {
        let config = load_configuration().unwrap();
        assert_eq!(config.open_retry_attempts, 10);
        assert_eq!(config.scratch_prefix, "RBX");
    }
}
