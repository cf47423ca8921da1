use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Prefix every protected route and `/login` is mounted under
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Maximum accepted request body size for document uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            api_prefix: default_api_prefix(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing bearer tokens
    #[serde(default)]
    pub jwt_secret: String,
    /// Lifetime of an issued token in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

fn default_token_ttl_hours() -> i64 {
    72
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Folder every object key is namespaced under
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Base URL clients fetch documents from. For S3 this defaults to the
    /// virtual-hosted bucket URL when unset.
    pub public_base_url: Option<String>,
    /// Root directory for the local backend
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            key_prefix: default_key_prefix(),
            public_base_url: None,
            local_root: default_local_root(),
            bucket: None,
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_key_prefix() -> String {
    "patient_documents".to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data/documents")
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Login attempts allowed per client IP per window
    #[serde(default = "default_login_requests")]
    pub login_requests_per_window: u32,
    /// Protected API requests allowed per client IP per window
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            login_requests_per_window: default_login_requests(),
            api_requests_per_window: default_api_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_login_requests() -> u32 {
    20
}

fn default_api_requests() -> u32 {
    300
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Read the file (defaults when absent) and apply `MEDPORTAL_*` overrides.
    /// Nothing is logged here since the subscriber is built from the result.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides(lookup)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Apply `MEDPORTAL_*` overrides on top of the file configuration.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("MEDPORTAL_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("MEDPORTAL_PORT is not a valid port: {}", port))?;
        }
        if let Some(dir) = lookup("MEDPORTAL_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
        if let Some(secret) = lookup("MEDPORTAL_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(backend) = lookup("MEDPORTAL_STORAGE_BACKEND") {
            self.storage.backend = match backend.to_lowercase().as_str() {
                "local" => StorageBackend::Local,
                "s3" => StorageBackend::S3,
                other => anyhow::bail!("Unknown storage backend: {}", other),
            };
        }
        if let Some(bucket) = lookup("MEDPORTAL_S3_BUCKET") {
            self.storage.bucket = Some(bucket);
        }
        if let Some(level) = lookup("MEDPORTAL_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.auth.token_ttl_hours > 0,
            "auth.token_ttl_hours must be positive, got {}",
            self.auth.token_ttl_hours
        );
        Ok(())
    }

    /// Generate a throwaway signing secret when none was configured.
    /// Returns true when one was generated. Call after logging is set up.
    pub fn ensure_jwt_secret(&mut self) -> bool {
        if !self.auth.jwt_secret.is_empty() {
            return false;
        }
        warn!("No JWT secret configured; generated a random one. Tokens will not survive a restart.");
        let bytes: [u8; 32] = rand::random();
        self.auth.jwt_secret = hex::encode(bytes);
        true
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
