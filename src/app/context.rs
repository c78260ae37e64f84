use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::GitHubApi;
use crate::app::error::{GhNotifyError, Result};
use crate::config::{Config, ConfigSnapshot};
use crate::http::reqwest_client::ReqwestClient;

pub struct AppContext {
    pub config_path: PathBuf,
    pub config: Arc<ConfigSnapshot>,
    pub api: GitHubApi,
}

impl AppContext {
    /// Load the config from `config_path` (or the default location) and
    /// build a reqwest-backed API client.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(p) => p,
            None => Config::default_config_path()?,
        };

        let config = Self::load_snapshot(&config_path)?;
        let http = ReqwestClient::new().map_err(|e| GhNotifyError::Other(e.to_string()))?;

        Ok(Self::with_api(config_path, config, GitHubApi::new(Arc::new(http))))
    }

    pub fn with_api(config_path: PathBuf, config: Arc<ConfigSnapshot>, api: GitHubApi) -> Self {
        Self {
            config_path,
            config,
            api,
        }
    }

    /// Re-read the config file into a fresh snapshot.
    pub fn load_snapshot(config_path: &Path) -> Result<Arc<ConfigSnapshot>> {
        let config = Config::load(Some(config_path))?;
        Ok(config.snapshot()?)
    }
}
