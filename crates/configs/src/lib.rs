//! # configs
//!
//! Runtime configuration for civic-bot. Values come from a `.env` file (if
//! present) and the process environment; keys are the upper-case names
//! documented on [`AppConfig`]. Secrets are held as [`SecretString`] and
//! never appear in `Debug` output.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_webhook_path() -> String {
    "/webhook/telegram".to_string()
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_broadcast_delay_ms() -> u64 {
    40
}

fn default_db_max_connections() -> u32 {
    10
}

/// Flat shape of the environment. Secrets stay plain strings only until
/// validation wraps them.
#[derive(Deserialize)]
struct RawConfig {
    telegram_token: Option<String>,
    admin_secret: Option<String>,
    database_url: Option<String>,
    #[serde(default)]
    storage: StorageKind,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    use_webhook: bool,
    public_base_url: Option<String>,
    #[serde(default = "default_webhook_path")]
    webhook_path: String,
    webhook_secret: Option<String>,
    api_token: Option<String>,
    #[serde(default = "default_api_base")]
    telegram_api_base: String,
    #[serde(default = "default_upload_dir")]
    upload_dir: PathBuf,
    #[serde(default = "default_broadcast_delay_ms")]
    broadcast_delay_ms: u64,
    #[serde(default = "default_db_max_connections")]
    db_max_connections: u32,
    #[serde(default)]
    log_format: LogFormat,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    present(value).ok_or(ConfigError::Missing(key))
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: SecretString,
    /// `TELEGRAM_API_BASE`, without a trailing slash.
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    Postgres {
        url: SecretString,
        max_connections: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub webhook_path: String,
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How updates reach the bot.
#[derive(Debug, Clone)]
pub enum Delivery {
    Polling,
    Webhook {
        /// Full URL registered with Telegram.
        url: String,
        secret: Option<SecretString>,
    },
}

/// Keys: `TELEGRAM_TOKEN`, `ADMIN_SECRET`, `DATABASE_URL`, `STORAGE`,
/// `HOST`, `PORT`, `USE_WEBHOOK`, `PUBLIC_BASE_URL`, `WEBHOOK_PATH`,
/// `WEBHOOK_SECRET`, `API_TOKEN`, `TELEGRAM_API_BASE`, `UPLOAD_DIR`,
/// `BROADCAST_DELAY_MS`, `DB_MAX_CONNECTIONS`, `LOG_FORMAT`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub admin_secret: SecretString,
    /// Falls back to the admin secret.
    pub api_token: SecretString,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub delivery: Delivery,
    pub broadcast_delay: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reads `.env` (when present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(ConfigError::Invalid {
                    key: ".env",
                    reason: err.to_string(),
                });
            }
        }
        Self::from_environment(Environment::default())
    }

    fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let raw: RawConfig = Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let token = required(raw.telegram_token, "TELEGRAM_TOKEN")?;
        let admin_secret = required(raw.admin_secret, "ADMIN_SECRET")?;
        let api_token = present(raw.api_token).unwrap_or_else(|| admin_secret.clone());

        let storage = match raw.storage {
            StorageKind::Memory => StorageConfig::Memory,
            StorageKind::Postgres => StorageConfig::Postgres {
                url: SecretString::from(required(raw.database_url, "DATABASE_URL")?),
                max_connections: raw.db_max_connections.max(1),
            },
        };

        if !raw.webhook_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "WEBHOOK_PATH",
                reason: "must start with '/'".to_string(),
            });
        }

        let delivery = if raw.use_webhook {
            let base = required(raw.public_base_url, "PUBLIC_BASE_URL")?;
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                return Err(ConfigError::Invalid {
                    key: "PUBLIC_BASE_URL",
                    reason: "must be an http(s) URL".to_string(),
                });
            }
            Delivery::Webhook {
                url: format!("{}{}", base.trim_end_matches('/'), raw.webhook_path),
                secret: present(raw.webhook_secret).map(SecretString::from),
            }
        } else {
            Delivery::Polling
        };

        let config = Self {
            telegram: TelegramConfig {
                token: SecretString::from(token),
                api_base: raw.telegram_api_base.trim_end_matches('/').to_string(),
            },
            admin_secret: SecretString::from(admin_secret),
            api_token: SecretString::from(api_token),
            storage,
            server: ServerConfig {
                host: raw.host,
                port: raw.port,
                webhook_path: raw.webhook_path,
                upload_dir: raw.upload_dir,
            },
            delivery,
            broadcast_delay: Duration::from_millis(raw.broadcast_delay_ms),
            log_format: raw.log_format,
        };
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    /// Secret checked on inbound webhook deliveries, when push delivery is on.
    pub fn webhook_secret(&self) -> Option<SecretString> {
        match &self.delivery {
            Delivery::Webhook { secret, .. } => secret.clone(),
            Delivery::Polling => None,
        }
    }
}
