//! Configuration loading and validation.
//!
//! Non-secret settings come from `~/.formrelay/config.toml` (or
//! `$FORMRELAY_CONFIG_PATH`). Secrets live in the `.env` file handled by
//! [`crate::credentials`].
//!
//! Precedence: env vars > config file > defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::extractor::{ChannelMap, LogicalChannel};

/// Default Jira attempts per issue.
pub const DEFAULT_JIRA_RETRIES: u32 = 3;

/// Errors that stop the process from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The home directory could not be determined.
    #[error("cannot determine home directory")]
    HomeDir,

    /// The config file exists but could not be read.
    #[error("failed to read config at {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required setting is absent or empty.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A `[channels]` entry names no known logical channel.
    #[error("channel {channel_id} maps to unknown logical channel {name:?}")]
    UnknownChannel {
        /// Raw channel id.
        channel_id: String,
        /// The configured name.
        name: String,
    },
}

// ── Paths ───────────────────────────────────────────────────────

/// Filesystem locations under `~/.formrelay/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime root (`~/.formrelay`).
    pub root: PathBuf,
    /// TOML settings.
    pub config_file: PathBuf,
    /// Secrets.
    pub env_file: PathBuf,
    /// Default log directory.
    pub logs_dir: PathBuf,
}

/// Resolve runtime paths from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError::HomeDir`] when the home directory is unknown.
pub fn runtime_paths() -> Result<RuntimePaths, ConfigError> {
    let home = directories::BaseDirs::new().ok_or(ConfigError::HomeDir)?;
    Ok(runtime_paths_with(home.home_dir(), |key| {
        std::env::var(key).ok()
    }))
}

/// Resolve runtime paths under `home`, honouring path overrides from `env`.
pub fn runtime_paths_with(home: &Path, env: impl Fn(&str) -> Option<String>) -> RuntimePaths {
    let root = home.join(".formrelay");
    RuntimePaths {
        config_file: env("FORMRELAY_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join("config.toml")),
        env_file: env("FORMRELAY_ENV_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| root.join(".env")),
        logs_dir: root.join("logs"),
        root,
    }
}

// ── Top-level config ────────────────────────────────────────────

/// Bridge configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Slack Web API settings.
    pub slack: SlackConfig,
    /// Raw channel id to logical channel name (`idea`, `issue`, `feedback`, `test`).
    pub channels: BTreeMap<String, String>,
    /// Issue tracker settings.
    pub jira: JiraConfig,
    /// Thank-you email settings.
    pub email: EmailConfig,
    /// Spreadsheet logging settings.
    pub sheets: SheetsConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from `paths.config_file` and apply env overrides.
    ///
    /// A missing file yields defaults, which then fail [`Config::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
    pub fn load(paths: &RuntimePaths) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(&paths.config_file)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Apply environment overrides through `env`.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("FORMRELAY_JIRA_BASE_URL") {
            self.jira.base_url = v;
        }
        if let Some(v) = env("FORMRELAY_JIRA_PROJECT_KEY") {
            self.jira.project_key = v;
        }
        if let Some(v) = env("FORMRELAY_JIRA_RETRIES") {
            match v.parse() {
                Ok(n) => self.jira.retries = n,
                Err(_) => warn!(
                    var = "FORMRELAY_JIRA_RETRIES",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("FORMRELAY_SHEETS_ID") {
            self.sheets.spreadsheet_id = v;
        }
        if let Some(v) = env("FORMRELAY_EMAIL_SENDER") {
            self.email.sender_alias = v;
        }
        if let Some(v) = env("FORMRELAY_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(v));
        }
    }

    /// Check that every enabled feature has what it needs.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.jira.base_url, "jira.base_url")?;
        require(&self.jira.project_key, "jira.project_key")?;
        if self.jira.retries == 0 {
            return Err(ConfigError::Missing("jira.retries (at least 1)"));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::Missing("channels"));
        }
        self.channel_map()?;

        if self.email.enabled {
            require(&self.email.sender_alias, "email.sender_alias")?;
            if self.email.token_file.is_none() {
                return Err(ConfigError::Missing("email.token_file"));
            }
        }
        if self.sheets.enabled {
            require(&self.sheets.spreadsheet_id, "sheets.spreadsheet_id")?;
            if self.sheets.token_file.is_none() {
                return Err(ConfigError::Missing("sheets.token_file"));
            }
        }
        Ok(())
    }

    /// Build the immutable channel mapping.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownChannel`] for unknown logical names.
    pub fn channel_map(&self) -> Result<ChannelMap, ConfigError> {
        let entries = self
            .channels
            .iter()
            .map(|(channel_id, name)| {
                LogicalChannel::from_name(name)
                    .map(|channel| (channel_id.clone(), channel))
                    .ok_or_else(|| ConfigError::UnknownChannel {
                        channel_id: channel_id.clone(),
                        name: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChannelMap::new(entries))
    }

    /// Log directory: `[logging] dir` or the runtime default.
    pub fn logs_dir(&self, paths: &RuntimePaths) -> PathBuf {
        self.logging
            .dir
            .clone()
            .unwrap_or_else(|| paths.logs_dir.clone())
    }
}

fn require(value: &str, name: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(())
}

// ── Sections ────────────────────────────────────────────────────

/// `[slack]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Web API origin.
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: crate::slack::client::DEFAULT_API_BASE.to_owned(),
        }
    }
}

/// `[jira]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Site origin, e.g. `https://acme.atlassian.net`.
    pub base_url: String,
    /// Project receiving new issues.
    pub project_key: String,
    /// Total attempts per issue.
    pub retries: u32,
    /// Sprint that new issues are added to, best-effort.
    pub intake_sprint_id: Option<u64>,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            project_key: String::new(),
            retries: DEFAULT_JIRA_RETRIES,
            intake_sprint_id: None,
        }
    }
}

/// `[email]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Send thank-you emails for positive feedback.
    pub enabled: bool,
    /// `From` address.
    pub sender_alias: String,
    /// Subject line.
    pub subject: String,
    /// Google OAuth token JSON.
    pub token_file: Option<PathBuf>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sender_alias: String::new(),
            subject: "Feedback received".to_owned(),
            token_file: None,
        }
    }
}

/// `[sheets]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Append a row for every created ticket.
    pub enabled: bool,
    /// Target spreadsheet.
    pub spreadsheet_id: String,
    /// Target tab.
    pub sheet_name: String,
    /// Google OAuth token JSON.
    pub token_file: Option<PathBuf>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spreadsheet_id: String::new(),
            sheet_name: "Tickets".to_owned(),
            token_file: None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotated JSON logs.
    pub dir: Option<PathBuf>,
}

// ── Tests ───────────────────────────────────────────────────────
