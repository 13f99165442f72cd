//! Configuration loading, validation, and management for Loopcast.
//!
//! Process-level configuration lives in `~/.loopcast/config.toml` with
//! environment variable overrides and is validated at startup. The bot's
//! operational settings (prefix, channel, messages, delays, role) are a
//! separate JSON record managed by [`SettingsStore`]; the platform token is
//! kept in a `.env`-style file managed by [`CredentialStore`].

pub mod credentials;
pub mod settings;

pub use credentials::CredentialStore;
pub use settings::{BotSettings, MAX_MESSAGE_LEN, SettingsError, SettingsStore};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.loopcast/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding `settings.json` and the credential file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Chat platform connection settings
    #[serde(default)]
    pub discord: DiscordSection,

    /// Command and broadcast tuning
    #[serde(default)]
    pub bot: BotSection,

    /// Control panel HTTP server
    #[serde(default)]
    pub panel: PanelSection,
}

fn default_data_dir() -> PathBuf {
    AppConfig::config_dir()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordSection {
    /// REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".into()
}
fn default_token_env() -> String {
    "DISCORD_TOKEN".into()
}

impl Default for DiscordSection {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSection {
    /// How long a destructive command waits for "yes"/"no"
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    /// Rate-limited attempts per message before the pass is abandoned
    #[serde(default = "default_max_send_attempts")]
    pub max_send_attempts: u32,

    /// First backoff step; doubled on every rate-limited attempt
    #[serde(default = "default_one_second")]
    pub base_backoff_secs: f64,

    /// Retry-after used when the server does not supply one
    #[serde(default = "default_one_second")]
    pub default_retry_after_secs: f64,
}

fn default_confirm_timeout() -> u64 {
    30
}
fn default_max_send_attempts() -> u32 {
    5
}
fn default_one_second() -> f64 {
    1.0
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: default_confirm_timeout(),
            max_send_attempts: default_max_send_attempts(),
            base_backoff_secs: default_one_second(),
            default_retry_after_secs: default_one_second(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Pause between stopping and starting the bot on restart
    #[serde(default = "default_restart_grace")]
    pub restart_grace_secs: u64,

    /// How long to wait for the bot process to exit after a kill
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5000
}
fn default_restart_grace() -> u64 {
    1
}
fn default_stop_timeout() -> u64 {
    10
}

impl Default for PanelSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            restart_grace_secs: default_restart_grace(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.loopcast/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `LOOPCAST_DATA_DIR`
    /// - `LOOPCAST_PANEL_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(dir) = std::env::var("LOOPCAST_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("LOOPCAST_PANEL_PORT") {
            config.panel.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("LOOPCAST_PANEL_PORT is not a port: {port}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".loopcast")
    }

    /// Path of the persisted bot settings.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Path of the credential file.
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(".env")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.confirm_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "bot.confirm_timeout_secs must be > 0".into(),
            ));
        }

        if self.bot.max_send_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "bot.max_send_attempts must be > 0".into(),
            ));
        }

        for (name, value) in [
            ("bot.base_backoff_secs", self.bot.base_backoff_secs),
            ("bot.default_retry_after_secs", self.bot.default_retry_after_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
            }
        }

        if self.discord.token_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "discord.token_env must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the platform token: environment first, then the credential file.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        if let Ok(token) = std::env::var(&self.discord.token_env) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }

        let store = CredentialStore::new(self.credentials_path(), &self.discord.token_env);
        match store.get()? {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ConfigError::MissingCredential(self.discord.token_env.clone())),
        }
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            discord: DiscordSection::default(),
            bot: BotSection::default(),
            panel: PanelSection::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No token found: set {0} in the environment or the credential file")]
    MissingCredential(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.panel.port, 5000);
        assert_eq!(config.bot.confirm_timeout_secs, 30);
        assert_eq!(config.bot.max_send_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.panel.port, config.panel.port);
        assert_eq!(parsed.discord.api_base, config.discord.api_base);
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.bot.max_send_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_backoff_rejected() {
        let mut config = AppConfig::default();
        config.bot.base_backoff_secs = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.discord.token_env, "DISCORD_TOKEN");
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[panel]\nport = 8080\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.panel.port, 8080);
        assert_eq!(config.panel.host, "127.0.0.1");
        assert_eq!(config.bot.confirm_timeout_secs, 30);
    }

    #[test]
    fn token_from_credential_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            discord: DiscordSection {
                token_env: "LOOPCAST_TEST_TOKEN_FILE_ONLY".into(),
                ..DiscordSection::default()
            },
            ..AppConfig::default()
        };
        assert!(matches!(
            config.resolve_token(),
            Err(ConfigError::MissingCredential(_))
        ));

        std::fs::write(
            config.credentials_path(),
            "LOOPCAST_TEST_TOKEN_FILE_ONLY=abc123\n",
        )
        .unwrap();
        assert_eq!(config.resolve_token().unwrap(), "abc123");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("DISCORD_TOKEN"));
        assert!(toml_str.contains("5000"));
    }
}
