//! Command line flags and the dashboard configuration file.
//!
//! The file is JSON or TOML, picked by extension. Loading validates every
//! layout-shaping field up front: a dashboard that cannot be laid out is
//! rejected before anything reaches the terminal.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::types::Project;
use crate::ui::input::KeyBinding;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "devdash", version, about = "Developer dashboard in your terminal")]
pub struct Cli {
    /// Configuration file (.json or .toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Log every render task instead of drawing, then exit
    #[arg(short, long)]
    pub debug: bool,
    /// Refresh interval in seconds, overrides the configuration
    #[arg(long)]
    pub refresh: Option<u64>,
    /// Redraw widget content only on refresh instead of clearing the screen
    #[arg(long)]
    pub hot_reload: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid TOML in {file}: {source}")]
    Toml {
        file: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("unsupported configuration format {0:?}, use .json or .toml")]
    UnsupportedFormat(String),
    #[error("no configuration file given and none found in {0}")]
    NotFound(String),
    #[error("refresh interval must be at least one second")]
    InvalidRefresh,
    #[error("invalid key binding {key:?} for {action}: {reason}")]
    InvalidKey {
        action: &'static str,
        key: String,
        reason: String,
    },
    #[error("project #{0} has no name")]
    UnnamedProject(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Format::Json),
            "toml" => Ok(Format::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

fn default_refresh() -> u64 {
    60
}

fn default_quit_key() -> String {
    "C-c".to_string()
}

fn default_reload_key() -> String {
    "C-r".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Keys {
    #[serde(default = "default_quit_key")]
    pub quit: String,
    #[serde(default = "default_reload_key")]
    pub hot_reload: String,
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            quit: default_quit_key(),
            hot_reload: default_reload_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct General {
    /// Seconds between two refreshes.
    #[serde(default = "default_refresh")]
    pub refresh: u64,
    #[serde(default)]
    pub hot_reload: bool,
    #[serde(default)]
    pub keys: Keys,
}

impl Default for General {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            hot_reload: false,
            keys: Keys::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub keyfile: Option<String>,
    pub view_id: String,
    /// Filters applied to every query unless a widget sets `global`.
    #[serde(default)]
    pub filters: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchConsoleConfig {
    #[serde(default)]
    pub keyfile: Option<String>,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CiConfig {
    #[serde(default)]
    pub token: Option<String>,
    pub repository: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: Option<String>,
    pub owner: String,
    pub repository: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedlyConfig {
    pub address: String,
}

fn default_git_path() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_git_path")]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LocalHostConfig {}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteHostConfig {
    pub address: String,
    pub username: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
}

/// Services configured for one project. Absent services route every widget
/// of theirs to an inline error box.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub google_analytics: Option<AnalyticsConfig>,
    #[serde(default)]
    pub google_search_console: Option<SearchConsoleConfig>,
    #[serde(default)]
    pub travis: Option<CiConfig>,
    #[serde(default)]
    pub github: Option<GithubConfig>,
    #[serde(default)]
    pub feedly: Option<FeedlyConfig>,
    #[serde(default)]
    pub git: Option<GitConfig>,
    #[serde(default)]
    pub localhost: Option<LocalHostConfig>,
    #[serde(default)]
    pub remote_host: Option<RemoteHostConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Config {
    /// Apply command line overrides on top of the file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(refresh) = cli.refresh {
            self.general.refresh = refresh;
        }
        if cli.hot_reload {
            self.general.hot_reload = true;
        }
    }

    pub fn quit_key(&self) -> Result<KeyBinding, ConfigError> {
        parse_key("quit", &self.general.keys.quit)
    }

    pub fn reload_key(&self) -> Result<KeyBinding, ConfigError> {
        parse_key("hot_reload", &self.general.keys.hot_reload)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.refresh == 0 {
            return Err(ConfigError::InvalidRefresh);
        }
        self.quit_key()?;
        self.reload_key()?;
        if let Some(i) = self.projects.iter().position(|p| p.name.trim().is_empty()) {
            return Err(ConfigError::UnnamedProject(i));
        }
        Ok(())
    }
}

fn parse_key(action: &'static str, key: &str) -> Result<KeyBinding, ConfigError> {
    key.parse().map_err(|reason| ConfigError::InvalidKey {
        action,
        key: key.to_string(),
        reason,
    })
}

/// `<config_dir>/devdash/devdash.json`, or the `.toml` sibling if only that exists.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir()
        .map(|d| d.join("devdash"))
        .unwrap_or_else(|| PathBuf::from("."));

    ["devdash.json", "devdash.toml"]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
        .ok_or_else(|| ConfigError::NotFound(dir.display().to_string()))
}

/// Read, parse and validate a configuration file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;
    load_from_str(&content, format, &path.display().to_string())
}

/// Parse and validate configuration text. `source_name` only shows up in errors.
pub fn load_from_str(content: &str, format: Format, source_name: &str) -> Result<Config, ConfigError> {
    let config: Config = match format {
        Format::Json => serde_json::from_str(content).map_err(|e| ConfigError::Json {
            file: source_name.to_string(),
            source: e,
        })?,
        Format::Toml => toml::from_str(content).map_err(|e| ConfigError::Toml {
            file: source_name.to_string(),
            source: e,
        })?,
    };
    config.validate()?;
    Ok(config)
}
