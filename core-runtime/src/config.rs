//! # Agent Configuration
//!
//! Loads and validates the configuration file written by the provisioning
//! tool. The agent consumes it read-only; nothing here ever writes the file
//! back.
//!
//! ## File format
//!
//! ```json
//! {
//!   "store": { "endpoint": "https://store.example.net", "bucket": "displays",
//!              "access_token": "..." },
//!   "device": { "group": "lobby", "device": "screen-3" },
//!   "sync": { "poll_interval_secs": 300, "download_attempts": 3 },
//!   "paths": { "media_root": "/var/lib/sync-agent" }
//! }
//! ```
//!
//! Validation is fail-fast: a config that cannot drive a full sync cycle is
//! rejected at startup with an actionable message rather than failing later
//! mid-cycle.

use bridge_traits::http::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_download_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_failure_rollback_threshold() -> u32 {
    3
}

/// Remote store identity and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the S3-compatible endpoint.
    pub endpoint: String,
    /// Bucket holding this fleet's content.
    pub bucket: String,
    /// Static bearer token issued at provisioning time, if the store
    /// requires one.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Where this device lives in the remote key space.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Optional fleet group segment.
    #[serde(default)]
    pub group: Option<String>,
    /// Device identifier segment.
    pub device: String,
}

impl DeviceConfig {
    /// Key prefix for this device: `<group>/<device>`, or just `<device>`
    /// when the device is not grouped.
    pub fn prefix(&self) -> String {
        match self.group.as_deref() {
            Some(group) if !group.is_empty() => format!("{}/{}", group, self.device),
            _ => self.device.clone(),
        }
    }
}

/// Sync cadence and retry bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Attempts per entry download before the entry is skipped for the cycle.
    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,

    /// Base delay between download retries, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Cap on the backoff delay, in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            download_attempts: default_download_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// The bounded-retry policy applied at the entry-fetch boundary.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.download_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            use_exponential_backoff: true,
        }
    }
}

/// Playback escalation tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSettings {
    /// Consecutive renderer failures before the loop asks the library to
    /// roll back to the backup generation.
    #[serde(default = "default_failure_rollback_threshold")]
    pub failure_rollback_threshold: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            failure_rollback_threshold: default_failure_rollback_threshold(),
        }
    }
}

/// Local filesystem locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Root directory for the generation ring and pointer file.
    pub media_root: PathBuf,
    /// Optional append-only log file mirroring stdout logging.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Complete agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub store: StoreConfig,
    pub device: DeviceConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub playback: PlaybackSettings,
    pub paths: PathsConfig,
}

impl AgentConfig {
    /// Default config file location (`<config dir>/sync-agent/config.json`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sync-agent").join("config.json"))
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| {
            Error::Config(format!(
                "Cannot read config file {}: {}. Run the provisioning tool first.",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_slice(&raw)
            .map_err(|e| Error::Config(format!("Malformed config file {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store.endpoint.is_empty() {
            return Err(Error::Config("store.endpoint must not be empty".into()));
        }
        if self.store.bucket.is_empty() {
            return Err(Error::Config("store.bucket must not be empty".into()));
        }
        if self.device.device.is_empty() {
            return Err(Error::Config("device.device must not be empty".into()));
        }
        if self.sync.poll_interval_secs == 0 {
            return Err(Error::Config("sync.poll_interval_secs must be positive".into()));
        }
        if self.sync.download_attempts == 0 {
            return Err(Error::Config("sync.download_attempts must be at least 1".into()));
        }
        if self.paths.media_root.as_os_str().is_empty() {
            return Err(Error::Config("paths.media_root must not be empty".into()));
        }
        Ok(())
    }

    /// Prefix under which media objects live: `<group>/<device>/media/`.
    pub fn media_prefix(&self) -> String {
        format!("{}/media/", self.device.prefix())
    }

    /// Key of the playlist descriptor: `<group>/<device>/playlist.json`.
    pub fn playlist_key(&self) -> String {
        format!("{}/playlist.json", self.device.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_config(
            r#"{
                "store": { "endpoint": "https://store.example.net", "bucket": "displays" },
                "device": { "group": "lobby", "device": "screen-3" },
                "paths": { "media_root": "/var/lib/sync-agent" }
            }"#,
        );

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.device.prefix(), "lobby/screen-3");
        assert_eq!(config.media_prefix(), "lobby/screen-3/media/");
        assert_eq!(config.playlist_key(), "lobby/screen-3/playlist.json");
        assert_eq!(config.sync.poll_interval_secs, 300);
        assert_eq!(config.sync.retry_policy().max_attempts, 3);
    }

    #[test]
    fn test_ungrouped_device_prefix() {
        let device = DeviceConfig {
            group: None,
            device: "kiosk-7".to_string(),
        };
        assert_eq!(device.prefix(), "kiosk-7");

        let empty_group = DeviceConfig {
            group: Some(String::new()),
            device: "kiosk-7".to_string(),
        };
        assert_eq!(empty_group.prefix(), "kiosk-7");
    }

    #[test]
    fn test_rejects_empty_bucket() {
        let file = write_config(
            r#"{
                "store": { "endpoint": "https://store.example.net", "bucket": "" },
                "device": { "device": "screen-3" },
                "paths": { "media_root": "/var/lib/sync-agent" }
            }"#,
        );

        let err = AgentConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let file = write_config(
            r#"{
                "store": { "endpoint": "https://store.example.net", "bucket": "displays" },
                "device": { "device": "screen-3" },
                "sync": { "poll_interval_secs": 0 },
                "paths": { "media_root": "/var/lib/sync-agent" }
            }"#,
        );

        assert!(AgentConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_actionable() {
        let err = AgentConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("provisioning"));
    }
}
