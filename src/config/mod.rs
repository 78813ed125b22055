//! Configuration management
//!
//! This module handles loading and parsing configuration for the Kaizen admin service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Upload limits
    #[serde(default)]
    pub upload: UploadConfig,
    /// Image host credentials
    #[serde(default)]
    pub cloudinary: CloudinaryConfig,
    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Admin shell assets
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// The single origin allowed to read the public API
    #[serde(default = "default_public_origin")]
    pub public_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_origin: default_public_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_origin() -> String {
    "https://www.kaizenmartialartskenya.org".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/kaizen.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_entries() -> u64 {
    1_000
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum number of images in one gallery or slideshow
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_files() -> usize {
    10
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
        "image/avif".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }
}

/// Image host (Cloudinary) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    /// Base URL of the upload API
    #[serde(default = "default_cloudinary_api_base")]
    pub api_base: String,
    /// Cloud name (account identifier)
    #[serde(default)]
    pub cloud_name: Option<String>,
    /// Unsigned upload preset
    #[serde(default)]
    pub upload_preset: Option<String>,
    /// API key used for signed deletion
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret used for signed deletion
    #[serde(default, skip_serializing)]
    pub api_secret: Option<String>,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            api_base: default_cloudinary_api_base(),
            cloud_name: None,
            upload_preset: None,
            api_key: None,
            api_secret: None,
        }
    }
}

impl CloudinaryConfig {
    /// Uploads need a cloud name and an unsigned preset
    pub fn is_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.cloud_name) && set(&self.upload_preset)
    }
}

fn default_cloudinary_api_base() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a local session in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Mark session cookies `Secure`
    #[serde(default)]
    pub secure_cookies: bool,
    /// External identity provider
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Staff account created at startup when missing
    #[serde(default)]
    pub bootstrap_user: Option<BootstrapUser>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            secure_cookies: false,
            provider: ProviderConfig::default(),
            bootstrap_user: None,
        }
    }
}

fn default_session_days() -> i64 {
    7
}

/// Identity provider configuration (Firebase Authentication)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether provider sessions are honoured at all
    #[serde(default)]
    pub enabled: bool,
    /// Web API key of the Firebase project
    #[serde(default)]
    pub api_key: Option<String>,
    /// Account lookup endpoint
    #[serde(default = "default_provider_lookup_url")]
    pub lookup_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            lookup_url: default_provider_lookup_url(),
        }
    }
}

fn default_provider_lookup_url() -> String {
    "https://identitytoolkit.googleapis.com/v1/accounts:lookup".to_string()
}

/// Staff account seeded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapUser {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Admin shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Directory holding the built admin single-page app
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
        }
    }
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("admin-ui")
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - KAIZEN_SERVER_HOST, KAIZEN_SERVER_PORT, KAIZEN_SERVER_PUBLIC_ORIGIN
    /// - KAIZEN_DATABASE_DRIVER, KAIZEN_DATABASE_URL
    /// - KAIZEN_CACHE_TTL_SECONDS
    /// - KAIZEN_CLOUDINARY_CLOUD_NAME, KAIZEN_CLOUDINARY_UPLOAD_PRESET,
    ///   KAIZEN_CLOUDINARY_API_KEY, KAIZEN_CLOUDINARY_API_SECRET
    /// - KAIZEN_AUTH_SESSION_DAYS, KAIZEN_AUTH_PROVIDER_API_KEY
    /// - KAIZEN_ADMIN_STATIC_DIR
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("KAIZEN_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("KAIZEN_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(origin) = std::env::var("KAIZEN_SERVER_PUBLIC_ORIGIN") {
            self.server.public_origin = origin;
        }

        if let Ok(driver) = std::env::var("KAIZEN_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("KAIZEN_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("KAIZEN_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(v) = std::env::var("KAIZEN_CLOUDINARY_CLOUD_NAME") {
            self.cloudinary.cloud_name = Some(v);
        }
        if let Ok(v) = std::env::var("KAIZEN_CLOUDINARY_UPLOAD_PRESET") {
            self.cloudinary.upload_preset = Some(v);
        }
        if let Ok(v) = std::env::var("KAIZEN_CLOUDINARY_API_KEY") {
            self.cloudinary.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("KAIZEN_CLOUDINARY_API_SECRET") {
            self.cloudinary.api_secret = Some(v);
        }

        if let Ok(days) = std::env::var("KAIZEN_AUTH_SESSION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                if days > 0 {
                    self.auth.session_days = days;
                }
            }
        }
        if let Ok(key) = std::env::var("KAIZEN_AUTH_PROVIDER_API_KEY") {
            self.auth.provider.api_key = Some(key);
            self.auth.provider.enabled = true;
        }

        if let Ok(dir) = std::env::var("KAIZEN_ADMIN_STATIC_DIR") {
            self.admin.static_dir = PathBuf::from(dir);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENV_KEYS: &[&str] = &[
        "KAIZEN_SERVER_HOST",
        "KAIZEN_SERVER_PORT",
        "KAIZEN_SERVER_PUBLIC_ORIGIN",
        "KAIZEN_DATABASE_DRIVER",
        "KAIZEN_DATABASE_URL",
        "KAIZEN_CACHE_TTL_SECONDS",
        "KAIZEN_CLOUDINARY_CLOUD_NAME",
        "KAIZEN_CLOUDINARY_UPLOAD_PRESET",
        "KAIZEN_CLOUDINARY_API_KEY",
        "KAIZEN_CLOUDINARY_API_SECRET",
        "KAIZEN_AUTH_SESSION_DAYS",
        "KAIZEN_AUTH_PROVIDER_API_KEY",
        "KAIZEN_ADMIN_STATIC_DIR",
    ];

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.url, "data/kaizen.db");
        assert_eq!(config.upload.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.upload.max_files, 10);
        assert_eq!(config.auth.session_days, 7);
        assert!(!config.auth.provider.enabled);
        assert!(config.cloudinary.cloud_name.is_none());
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "   ").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl_seconds, 300);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "server:\n  port: 9000\ncloudinary:\n  cloud_name: dojo\n  upload_preset: gallery\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cloudinary.cloud_name.as_deref(), Some("dojo"));
        assert_eq!(config.cloudinary.upload_preset.as_deref(), Some("gallery"));
        assert_eq!(config.cloudinary.api_base, "https://api.cloudinary.com/v1_1");
    }

    #[test]
    fn test_load_bootstrap_user() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "auth:\n  bootstrap_user:\n    username: sensei\n    password: s3cret-pass\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let user = config.auth.bootstrap_user.expect("bootstrap user");
        assert_eq!(user.username, "sensei");
        assert_eq!(user.password, "s3cret-pass");
        assert!(user.name.is_none());
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: [unclosed\n").unwrap();

        let err = Config::load(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
        assert!(err.contains("line"));
    }

    #[test]
    fn test_env_override_server_and_database() {
        let _guard = lock_env();
        clear_env();

        std::env::set_var("KAIZEN_SERVER_PORT", "9191");
        std::env::set_var("KAIZEN_SERVER_PUBLIC_ORIGIN", "https://example.org");
        std::env::set_var("KAIZEN_DATABASE_DRIVER", "MySQL");
        std::env::set_var("KAIZEN_DATABASE_URL", "mysql://root@localhost/kaizen");

        let config = Config::load_with_env(std::path::Path::new("missing.yml")).unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.public_origin, "https://example.org");
        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://root@localhost/kaizen");

        clear_env();
    }

    #[test]
    fn test_env_override_secrets() {
        let _guard = lock_env();
        clear_env();

        std::env::set_var("KAIZEN_CLOUDINARY_API_KEY", "key");
        std::env::set_var("KAIZEN_CLOUDINARY_API_SECRET", "secret");
        std::env::set_var("KAIZEN_AUTH_PROVIDER_API_KEY", "firebase-key");

        let config = Config::load_with_env(std::path::Path::new("missing.yml")).unwrap();
        assert_eq!(config.cloudinary.api_key.as_deref(), Some("key"));
        assert_eq!(config.cloudinary.api_secret.as_deref(), Some("secret"));
        assert!(config.auth.provider.enabled);
        assert_eq!(config.auth.provider.api_key.as_deref(), Some("firebase-key"));

        clear_env();
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();
        clear_env();

        std::env::set_var("KAIZEN_SERVER_PORT", "not-a-port");
        std::env::set_var("KAIZEN_DATABASE_DRIVER", "postgres");
        std::env::set_var("KAIZEN_AUTH_SESSION_DAYS", "-3");

        let config = Config::load_with_env(std::path::Path::new("missing.yml")).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.auth.session_days, 7);

        clear_env();
    }

    #[test]
    fn test_api_secret_is_not_serialized() {
        let mut config = Config::default();
        config.cloudinary.api_secret = Some("top-secret".to_string());

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("top-secret"));
    }

    #[test]
    fn test_upload_type_check() {
        let upload = UploadConfig::default();
        assert!(upload.is_type_allowed("image/png"));
        assert!(!upload.is_type_allowed("application/pdf"));
    }

    #[test]
    fn test_cloudinary_needs_cloud_and_preset() {
        let mut cloudinary = CloudinaryConfig::default();
        assert!(!cloudinary.is_configured());

        cloudinary.cloud_name = Some("kaizen".to_string());
        cloudinary.upload_preset = Some(String::new());
        assert!(!cloudinary.is_configured());

        cloudinary.upload_preset = Some("unsigned".to_string());
        assert!(cloudinary.is_configured());
    }
}
