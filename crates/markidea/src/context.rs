use std::path::PathBuf;
use std::sync::Arc;

use libmarkidea_core::config::{load_config, load_or_default, ServiceConfig, CONFIG_FILE_NAME};
use libmarkidea_core::types::note::validate_name;
use libmarkidea_core::MarkideaError;
use libmarkidea_notes::{NoopContentIndex, NoteService};

use crate::cli::Cli;

/// Resolved configuration for one CLI invocation
pub struct MarkideaContext {
    pub config: ServiceConfig,
    pub config_path: PathBuf,
}

impl MarkideaContext {
    /// Resolve the config from `--config`, or `<data-dir>/config.toml` with
    /// defaults when that file does not exist
    pub fn resolve(cli: &Cli) -> Result<Self, MarkideaError> {
        match &cli.config {
            Some(path) => {
                let config = load_config(path)?.ok_or_else(|| {
                    MarkideaError::Configuration(format!("config file {} does not exist", path.display()))
                })?;
                Ok(Self {
                    config,
                    config_path: path.clone(),
                })
            }
            None => {
                let data_dir = data_dir(cli);
                Ok(Self {
                    config: load_or_default(&data_dir)?,
                    config_path: data_dir.join(CONFIG_FILE_NAME),
                })
            }
        }
    }

    pub fn open_service(&self) -> Result<NoteService, MarkideaError> {
        NoteService::open(self.config.clone(), Arc::new(NoopContentIndex))
    }
}

/// `--data-dir`, else `$HOME/.markidea`
pub fn data_dir(cli: &Cli) -> PathBuf {
    if let Some(dir) = &cli.data_dir {
        return dir.clone();
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".markidea")
}

/// The `--user` every note operation needs
pub fn require_user(cli: &Cli) -> Result<&str, MarkideaError> {
    let user = cli
        .user
        .as_deref()
        .ok_or_else(|| MarkideaError::InvalidArgs("--user is required".to_string()))?;
    validate_name("username", user)?;
    Ok(user)
}
