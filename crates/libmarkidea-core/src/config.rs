use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MarkideaError;

/// Name of the config file inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Service configuration stored in `<data_dir>/config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root of all user repositories (`<notes_dir>/<username>/`)
    pub notes_dir: PathBuf,
    /// Directory holding `<username>.prv` private keys for SSH sync
    pub ssh_keys_dir: PathBuf,
    /// sled database holding deleted-note snapshots and sync settings
    pub db_path: PathBuf,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SchedulerConfig,
}

/// Cache sizing and expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on the summed byte length of cached note contents
    pub content_max_bytes: u64,
    /// Upper bound on the summed byte length of cached previews
    pub preview_max_bytes: u64,
    /// Idle time after which an entry expires; refreshed on every access
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            content_max_bytes: 125 * 1024 * 1024,
            preview_max_bytes: 10 * 1024 * 1024,
            ttl_secs: 12 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Remote sync scheduler timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed period between sweeps
    pub period_secs: u64,
    /// Delay before the first sweep
    pub initial_delay_secs: u64,
    /// Interval at which the task list is rebuilt from the store
    pub refresh_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_secs: 10,
            initial_delay_secs: 3,
            refresh_secs: 300,
        }
    }
}

impl SchedulerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs.max(1))
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}

impl ServiceConfig {
    /// Default layout under a single data directory
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            notes_dir: data_dir.join("notes"),
            ssh_keys_dir: data_dir.join("ssh-keys"),
            db_path: data_dir.join("db"),
            cache: CacheConfig::default(),
            sync: SchedulerConfig::default(),
        }
    }

    /// Repository root of a user
    pub fn user_repo_dir(&self, username: &str) -> PathBuf {
        self.notes_dir.join(username)
    }

    /// Private key used for a user's SSH transfers
    pub fn private_key_path(&self, username: &str) -> PathBuf {
        self.ssh_keys_dir.join(format!("{}.prv", username))
    }

    /// Check the directory layout, creating missing directories.
    ///
    /// A path occupied by a regular file is a configuration error.
    pub fn ensure_layout(&self) -> Result<(), MarkideaError> {
        for dir in [&self.notes_dir, &self.ssh_keys_dir] {
            if dir.exists() && !dir.is_dir() {
                return Err(MarkideaError::Configuration(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir).map_err(|e| {
                MarkideaError::Configuration(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

/// Load config from an explicit path
pub fn load_config(config_path: &Path) -> Result<Option<ServiceConfig>, MarkideaError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(config_path)?;
    let config: ServiceConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save config, creating the parent directory
pub fn save_config(config_path: &Path, config: &ServiceConfig) -> Result<(), MarkideaError> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(config_path, content)?;
    Ok(())
}

/// Load `<data_dir>/config.toml`, falling back to the default layout
pub fn load_or_default(data_dir: &Path) -> Result<ServiceConfig, MarkideaError> {
    let path = data_dir.join(CONFIG_FILE_NAME);
    Ok(load_config(&path)?.unwrap_or_else(|| ServiceConfig::with_data_dir(data_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = ServiceConfig::with_data_dir(dir.path());
        config.cache.ttl_secs = 60;
        config.sync.period_secs = 30;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "notes_dir = \"/srv/notes\"\nssh_keys_dir = \"/srv/keys\"\ndb_path = \"/srv/db\"\n",
        )
        .unwrap();

        let loaded = load_config(&path).unwrap().unwrap();
        assert_eq!(loaded.cache, CacheConfig::default());
        assert_eq!(loaded.sync.period_secs, 10);
        assert_eq!(loaded.sync.initial_delay_secs, 3);
        assert_eq!(loaded.private_key_path("alice"), PathBuf::from("/srv/keys/alice.prv"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = load_or_default(dir.path()).unwrap();
        assert_eq!(config.notes_dir, dir.path().join("notes"));
        assert_eq!(config.user_repo_dir("bob"), dir.path().join("notes").join("bob"));
    }

    #[test]
    fn test_ensure_layout_rejects_file() {
        let dir = tempdir().unwrap();
        let config = ServiceConfig::with_data_dir(dir.path());
        std::fs::write(&config.notes_dir, "not a dir").unwrap();

        let err = config.ensure_layout().unwrap_err();
        assert!(matches!(err, MarkideaError::Configuration(_)));
    }
}
