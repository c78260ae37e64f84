//! Configuration management for ghnotify.
//!
//! Configuration is read from `~/.config/ghnotify/config.toml` at startup and
//! re-read on `SIGHUP`. If the file doesn't exist, a default configuration
//! with comments is created.

mod secret;

pub use secret::Secret;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lower bound for any poll interval, in seconds.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

/// Environment variable consulted when the config file carries no token.
pub const TOKEN_ENV_VAR: &str = "GHNOTIFY_TOKEN";

const DEFAULT_DOMAIN: &str = "github.com";

/// How consumers should group the notification list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    None,
    Repository,
    Type,
    Reason,
}

impl GroupBy {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupBy::None => "none",
            GroupBy::Repository => "repository",
            GroupBy::Type => "type",
            GroupBy::Reason => "reason",
        }
    }
}

/// Raw configuration as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub domain: String,
    pub token: Secret,
    pub refresh_interval_secs: u64,
    pub show_alerts: bool,
    pub participating_only: bool,
    pub group_by: GroupBy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            token: Secret::default(),
            refresh_interval_secs: MIN_REFRESH_INTERVAL_SECS,
            show_alerts: true,
            participating_only: false,
            group_by: GroupBy::None,
        }
    }
}

/// Names of the individual settings, as reported by the change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Domain,
    Token,
    RefreshInterval,
    ShowAlerts,
    ParticipatingOnly,
    GroupBy,
}

impl ConfigKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Domain => "domain",
            ConfigKey::Token => "token",
            ConfigKey::RefreshInterval => "refresh_interval_secs",
            ConfigKey::ShowAlerts => "show_alerts",
            ConfigKey::ParticipatingOnly => "participating_only",
            ConfigKey::GroupBy => "group_by",
        }
    }

    /// Whether a change to this key invalidates the list currently held or
    /// being fetched.
    pub fn invalidates_fetch(self) -> bool {
        matches!(
            self,
            ConfigKey::Domain | ConfigKey::Token | ConfigKey::ParticipatingOnly
        )
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path when `None`.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default().with_token_fallback(std::env::var(TOKEN_ENV_VAR).ok()));
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config.with_token_fallback(std::env::var(TOKEN_ENV_VAR).ok()))
    }

    /// Get the default config file path: `~/.config/ghnotify/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("ghnotify").join("config.toml"))
    }

    /// Use `fallback` as the token when the file does not provide one.
    pub fn with_token_fallback(mut self, fallback: Option<String>) -> Self {
        if self.token.is_empty() {
            if let Some(token) = fallback.filter(|t| !t.trim().is_empty()) {
                self.token = Secret::new(token.trim());
            }
        }
        self
    }

    /// Validate and freeze into the read-only value the engine consumes.
    pub fn snapshot(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let domain = normalize_domain(&self.domain);
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidDomain(self.domain.clone()));
        }

        Ok(Arc::new(ConfigSnapshot {
            domain,
            token: Secret::new(self.token.expose().trim()),
            refresh_interval_secs: self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS),
            show_alerts: self.show_alerts,
            participating_only: self.participating_only,
            group_by: self.group_by,
        }))
    }

    /// Keys whose values differ between `old` and `new`.
    pub fn diff(old: &ConfigSnapshot, new: &ConfigSnapshot) -> Vec<ConfigKey> {
        let mut changed = Vec::new();
        if old.domain != new.domain {
            changed.push(ConfigKey::Domain);
        }
        if old.token != new.token {
            changed.push(ConfigKey::Token);
        }
        if old.refresh_interval_secs != new.refresh_interval_secs {
            changed.push(ConfigKey::RefreshInterval);
        }
        if old.show_alerts != new.show_alerts {
            changed.push(ConfigKey::ShowAlerts);
        }
        if old.participating_only != new.participating_only {
            changed.push(ConfigKey::ParticipatingOnly);
        }
        if old.group_by != new.group_by {
            changed.push(ConfigKey::GroupBy);
        }
        changed
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# ghnotify configuration
#
# Changes are picked up on restart, or immediately with `kill -HUP <pid>`.

# github.com, or the hostname of a GitHub Enterprise instance
domain = "github.com"

# Personal access token with the `notifications` scope.
# Leave empty to read it from the GHNOTIFY_TOKEN environment variable.
token = ""

# Seconds between polls. Values below 60 are raised to 60, and the server
# may ask for a longer interval.
refresh_interval_secs = 60

# Show a desktop alert when the unread count grows
show_alerts = true

# Only fetch threads you participate in or are mentioned in
participating_only = false

# Grouping for list output: none, repository, type, reason
group_by = "none"
"##
        .to_string()
    }
}

fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(&trimmed);
    without_scheme.trim_end_matches('/').to_string()
}

/// Immutable, validated view of the configuration.
///
/// The engine never mutates it; a new snapshot replaces the old one when the
/// change stream fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub domain: String,
    pub token: Secret,
    pub refresh_interval_secs: u64,
    pub show_alerts: bool,
    pub participating_only: bool,
    pub group_by: GroupBy,
}

impl ConfigSnapshot {
    pub fn is_enterprise(&self) -> bool {
        self.domain != DEFAULT_DOMAIN
    }

    pub fn require_token(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(())
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            token: Secret::default(),
            refresh_interval_secs: MIN_REFRESH_INTERVAL_SECS,
            show_alerts: true,
            participating_only: false,
            group_by: GroupBy::None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("No access token configured (set `token` or {TOKEN_ENV_VAR})")]
    MissingToken,

    #[error("Invalid domain: {0:?}")]
    InvalidDomain(String),
}
