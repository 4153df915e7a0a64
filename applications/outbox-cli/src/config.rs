/// Console configuration
use clinic_server_client::ServerConfig;
use clinic_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "clinic-outbox.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerSettings,

    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_send_idempotency_key")]
    pub send_idempotency_key: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_queue_file")]
    pub queue_file: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    File,
}

impl AppConfig {
    /// Load configuration from file and environment.
    ///
    /// An explicit `path` must exist; otherwise `clinic-outbox.toml` in the
    /// working directory is used when present. `CLINIC_`-prefixed variables
    /// override both, with `__` between sections
    /// (`CLINIC_SERVER__URL`, `CLINIC_SYNC__RETRY__MAX_RETRIES`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CLINIC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server URL is required (set CLINIC_SERVER__URL)".to_string(),
            ));
        }

        if self.server.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "server.timeout_ms must be greater than zero".to_string(),
            ));
        }

        match self.storage.backend {
            StoreBackend::Sqlite if !self.storage.database_url.starts_with("sqlite:") => {
                return Err(ConfigError::Invalid(format!(
                    "storage.database_url must be a sqlite: URL, got {:?}",
                    self.storage.database_url
                )));
            }
            StoreBackend::File if self.storage.queue_file.as_os_str().is_empty() => {
                return Err(ConfigError::Invalid(
                    "storage.queue_file is required for the file backend".to_string(),
                ));
            }
            _ => {}
        }

        self.sync.validate().map_err(ConfigError::Invalid)
    }

    /// Settings for the records API client
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.server.url.clone())
            .api_prefix(self.server.api_prefix.clone());
        config.access_token = self.server.access_token.clone();
        config.timeout_ms = self.server.timeout_ms;
        config.send_idempotency_key = self.server.send_idempotency_key;
        config
    }
}

// Default values
fn default_server() -> ServerSettings {
    ServerSettings {
        url: default_url(),
        access_token: None,
        api_prefix: default_api_prefix(),
        timeout_ms: default_timeout_ms(),
        send_idempotency_key: default_send_idempotency_key(),
    }
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_send_idempotency_key() -> bool {
    true
}

fn default_storage() -> StorageSettings {
    StorageSettings {
        backend: StoreBackend::default(),
        database_url: default_database_url(),
        queue_file: default_queue_file(),
    }
}

fn default_database_url() -> String {
    "sqlite://clinic-outbox.db".to_string()
}

fn default_queue_file() -> PathBuf {
    PathBuf::from("clinic-outbox.json")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            sync: SyncConfig::default(),
        }
    }
}
