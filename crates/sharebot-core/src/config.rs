//! Configuration module for ShareBot.
//!
//! Provides typed configuration structs that map to the optional YAML
//! configuration file, environment overrides (the variables the bot has
//! always been deployed with), validation, defaults, and a builder for
//! programmatic use.
//!
//! Precedence, lowest first: built-in defaults, YAML file, environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{SenderId, SharePath};
use crate::domain::{DomainError, RetryPolicy};
use crate::usecases::{ShareSummary, TransferSettings};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "SHAREBOT_CONFIG";

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never shows up in `Debug` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn redacted(&self) -> Self {
        if self.0.is_empty() {
            Self::default()
        } else {
            Self("***".to_string())
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for ShareBot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub share: ShareConfig,
    pub bot: BotConfig,
    pub transfer: TransferConfig,
    pub naming: NamingConfig,
    pub logging: LoggingConfig,
}

/// Which storage adapter talks to the share.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareBackend {
    /// Direct SMB via libsmbclient
    #[default]
    Smb,
    /// Share already mounted on the local filesystem
    Mount,
}

impl std::str::FromStr for ShareBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smb" => Ok(Self::Smb),
            "mount" => Ok(Self::Mount),
            other => Err(format!("unknown share backend '{other}' (expected smb or mount)")),
        }
    }
}

/// Remote share settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub backend: ShareBackend,
    /// SMB server host name or address.
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: Secret,
    /// Share name on the server.
    pub share: String,
    /// NetBIOS name of the server, when it differs from `server`.
    ///
    /// Shown in status output only. libsmbclient negotiates with the host
    /// in `server` and has no separate called-name setting, so this value
    /// never changes how the share is reached.
    pub server_name: Option<String>,
    pub workgroup: Option<String>,
    /// Local mount point of the share (mount backend only).
    pub mount_point: Option<PathBuf>,
    /// Directory inside the share that receives backups.
    pub backup_directory: String,
}

/// Telegram bot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: Secret,
    /// The only Telegram user allowed to use the bot.
    pub authorized_user_id: Option<i64>,
    pub api_url: String,
    /// Long-polling timeout for `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,
    /// How long shutdown waits for in-flight transfers, in seconds.
    pub shutdown_grace_secs: u64,
}

/// Transfer pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub max_file_size_mb: u64,
    pub chunk_size_kb: usize,
    pub max_transfer_retries: u32,
    /// Longest wait for one source read or share write, in seconds.
    pub idle_timeout_secs: u64,
    /// Backoff for share connections and whole-transfer retries.
    pub connect_retry: RetryPolicy,
}

/// Target naming settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Place files under `backup_directory/YYYY-MM-DD/`.
    pub date_subdirectories: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            backend: ShareBackend::Smb,
            server: String::new(),
            port: 445,
            username: String::new(),
            password: Secret::default(),
            share: String::new(),
            server_name: None,
            workgroup: None,
            mount_point: None,
            backup_directory: "/".to_string(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: Secret::default(),
            authorized_user_id: None,
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            shutdown_grace_secs: 30,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 2000,
            chunk_size_kb: 1024,
            max_transfer_retries: 2,
            idle_timeout_secs: 60,
            connect_retry: RetryPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/sharebot/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("sharebot")
            .join("config.yaml")
    }

    /// Config file that [`Config::resolve`] would read, if any
    ///
    /// An explicit path wins, then `SHAREBOT_CONFIG`, then the default
    /// path when that file exists.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let default = Self::default_path();
        default.exists().then_some(default)
    }

    /// Builds the effective configuration for a process
    ///
    /// Loads `.env` (if present), the YAML file from [`Config::locate`], then
    /// applies environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }

        let mut config = match Self::locate(explicit) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };

        let errors = config.apply_env();
        if !errors.is_empty() {
            anyhow::bail!("Invalid environment: {}", join_errors(&errors));
        }
        Ok(config)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, Vec<ValidationError>> {
        let mut config = Self::default();
        let errors = config.apply_env();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    /// Applies environment overrides from the process environment
    pub fn apply_env(&mut self) -> Vec<ValidationError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `get`; empty values are ignored
    ///
    /// Returns parse errors for values that are present but malformed.
    pub fn apply_env_with<F>(&mut self, get: F) -> Vec<ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = var("SHARE_BACKEND") {
            match v.parse() {
                Ok(backend) => self.share.backend = backend,
                Err(message) => errors.push(ValidationError::new("SHARE_BACKEND", message)),
            }
        }
        if let Some(v) = var("SMB_SERVER") {
            self.share.server = v;
        }
        if let Some(v) = var("SMB_PORT") {
            match v.parse() {
                Ok(port) => self.share.port = port,
                Err(_) => errors.push(ValidationError::new(
                    "SMB_PORT",
                    format!("not a valid port: {v}"),
                )),
            }
        }
        if let Some(v) = var("SMB_USERNAME") {
            self.share.username = v;
        }
        if let Some(v) = get("SMB_PASSWORD").filter(|v| !v.is_empty()) {
            self.share.password = Secret::new(v);
        }
        if let Some(v) = var("SMB_SHARE") {
            self.share.share = v;
        }
        if let Some(v) = var("SMB_SERVER_NAME") {
            self.share.server_name = Some(v);
        }
        if let Some(v) = var("SMB_WORKGROUP") {
            self.share.workgroup = Some(v);
        }
        if let Some(v) = var("SHARE_MOUNT_POINT") {
            self.share.mount_point = Some(PathBuf::from(v));
        }
        if let Some(v) = var("BACKUP_DIRECTORY") {
            self.share.backup_directory = v;
        }
        if let Some(v) = var("TELEGRAM_BOT_TOKEN") {
            self.bot.token = Secret::new(v);
        }
        if let Some(v) = var("AUTHORIZED_USER_ID") {
            match v.parse::<i64>() {
                // 0 is what an unset variable used to default to
                Ok(0) => self.bot.authorized_user_id = None,
                Ok(id) => self.bot.authorized_user_id = Some(id),
                Err(_) => errors.push(ValidationError::new(
                    "AUTHORIZED_USER_ID",
                    format!("not a numeric Telegram user id: {v}"),
                )),
            }
        }
        if let Some(v) = var("MAX_FILE_SIZE_MB") {
            match v.parse() {
                Ok(mb) => self.transfer.max_file_size_mb = mb,
                Err(_) => errors.push(ValidationError::new(
                    "MAX_FILE_SIZE_MB",
                    format!("not a whole number: {v}"),
                )),
            }
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.logging.level = v.to_ascii_lowercase();
        }

        errors
    }

    /// Copy with every secret replaced by `***`, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.share.password = self.share.password.redacted();
        copy.bot.token = self.bot.token.redacted();
        copy
    }
}

impl ShareConfig {
    /// Parsed backup directory
    pub fn backup_path(&self) -> Result<SharePath, DomainError> {
        SharePath::parse_lenient(&self.backup_directory)
    }

    /// Human-readable location of the share
    pub fn endpoint(&self) -> String {
        match self.backend {
            ShareBackend::Smb => format!("smb://{}:{}/{}", self.server, self.port, self.share),
            ShareBackend::Mount => match &self.mount_point {
                Some(path) => format!("file://{}", path.display()),
                None => "file://<unset>".to_string(),
            },
        }
    }

    pub fn summary(&self) -> ShareSummary {
        ShareSummary {
            endpoint: self.endpoint(),
            server: self.server.clone(),
            share: self.share.clone(),
            server_name: self.server_name.clone(),
            backup_directory: self
                .backup_path()
                .map(String::from)
                .unwrap_or_else(|_| self.backup_directory.clone()),
        }
    }
}

impl BotConfig {
    pub fn authorized_sender(&self) -> Option<SenderId> {
        self.authorized_user_id.map(SenderId::new)
    }
}

impl TransferConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn settings(&self) -> TransferSettings {
        TransferSettings {
            max_file_size: self.max_file_size_bytes(),
            chunk_size: self.chunk_size_kb.saturating_mul(1024),
            max_transfer_retries: self.max_transfer_retries,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            backoff: self.connect_retry.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field (e.g. `"share.port"`).
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest accepted copy chunk (64 MiB)
const MAX_CHUNK_SIZE_KB: usize = 64 * 1024;

impl Config {
    /// Validate all configuration values.
    ///
    /// Returns an empty `Vec` when the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = self.validate_share();
        errors.extend(self.validate_bot());
        errors.extend(self.validate_transfer());
        errors
    }

    /// Checks only what is needed to reach the share
    pub fn validate_share(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let share = &self.share;

        match share.backend {
            ShareBackend::Smb => {
                if share.server.trim().is_empty() {
                    errors.push(ValidationError::new("share.server", "must not be empty"));
                }
                if share.share.trim().is_empty() {
                    errors.push(ValidationError::new("share.share", "must not be empty"));
                }
                if share.port == 0 {
                    errors.push(ValidationError::new("share.port", "must be greater than 0"));
                }
            }
            ShareBackend::Mount => match &share.mount_point {
                None => errors.push(ValidationError::new(
                    "share.mount_point",
                    "required when share.backend is mount",
                )),
                Some(path) if !path.is_absolute() => errors.push(ValidationError::new(
                    "share.mount_point",
                    format!("must be an absolute path: {}", path.display()),
                )),
                Some(_) => {}
            },
        }

        if let Err(e) = share.backup_path() {
            errors.push(ValidationError::new("share.backup_directory", e.to_string()));
        }

        errors
    }

    fn validate_bot(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.bot.token.is_empty() {
            errors.push(ValidationError::new("bot.token", "must be set (TELEGRAM_BOT_TOKEN)"));
        }
        match self.bot.authorized_user_id {
            None => errors.push(ValidationError::new(
                "bot.authorized_user_id",
                "must be set (AUTHORIZED_USER_ID); without it every sender is rejected",
            )),
            Some(id) if id <= 0 => errors.push(ValidationError::new(
                "bot.authorized_user_id",
                "must be a positive Telegram user id",
            )),
            Some(_) => {}
        }
        if !self.bot.api_url.starts_with("http://") && !self.bot.api_url.starts_with("https://") {
            errors.push(ValidationError::new("bot.api_url", "must be an http(s) URL"));
        }
        if self.bot.poll_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "bot.poll_timeout_secs",
                "must be greater than 0",
            ));
        }
        errors
    }

    fn validate_transfer(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let transfer = &self.transfer;
        if transfer.max_file_size_mb == 0 {
            errors.push(ValidationError::new(
                "transfer.max_file_size_mb",
                "must be greater than 0",
            ));
        }
        if transfer.chunk_size_kb == 0 || transfer.chunk_size_kb > MAX_CHUNK_SIZE_KB {
            errors.push(ValidationError::new(
                "transfer.chunk_size_kb",
                format!("must be between 1 and {MAX_CHUNK_SIZE_KB}"),
            ));
        }
        if transfer.idle_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "transfer.idle_timeout_secs",
                "must be greater than 0",
            ));
        }
        if transfer.connect_retry.max_attempts == 0 {
            errors.push(ValidationError::new(
                "transfer.connect_retry.max_attempts",
                "must be greater than 0",
            ));
        }
        if transfer.connect_retry.multiplier < 1.0 {
            errors.push(ValidationError::new(
                "transfer.connect_retry.multiplier",
                "must be at least 1.0",
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!("must be one of: {}", LOG_LEVELS.join(", ")),
            ));
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn share_backend(mut self, backend: ShareBackend) -> Self {
        self.config.share.backend = backend;
        self
    }

    pub fn smb_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.config.share.server = server.into();
        self.config.share.port = port;
        self
    }

    pub fn smb_share(mut self, share: impl Into<String>) -> Self {
        self.config.share.share = share.into();
        self
    }

    pub fn smb_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.share.username = username.into();
        self.config.share.password = Secret::new(password);
        self
    }

    pub fn mount_point(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.share.backend = ShareBackend::Mount;
        self.config.share.mount_point = Some(path.into());
        self
    }

    pub fn backup_directory(mut self, dir: impl Into<String>) -> Self {
        self.config.share.backup_directory = dir.into();
        self
    }

    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.config.bot.token = Secret::new(token);
        self
    }

    pub fn authorized_user_id(mut self, id: i64) -> Self {
        self.config.bot.authorized_user_id = Some(id);
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.transfer.max_file_size_mb = mb;
        self
    }

    pub fn chunk_size_kb(mut self, kb: usize) -> Self {
        self.config.transfer.chunk_size_kb = kb;
        self
    }

    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.transfer.idle_timeout_secs = secs;
        self
    }

    pub fn date_subdirectories(mut self, enabled: bool) -> Self {
        self.config.naming.date_subdirectories = enabled;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
