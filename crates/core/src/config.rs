//! Configuration management
//!
//! Connection settings come from three layers: command-line flags, environment variables and
//! the TOML file at `<config_dir>/s3kv/config.toml`. The CLI parses flags and environment
//! together, so this module only sees two layers: the file and an overlay on top of it.
//!
//! Changes to `schema_version` require migration support.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::store::DEFAULT_BUCKET;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "S3KV_CONFIG_DIR";

const DEFAULT_REGION: &str = "us-east-1";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            connection: ConnectionConfig::default(),
        }
    }
}

/// Partially specified connection, as read from one layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Full URL or bare `host[:port]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Use https for bare host endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl ConnectionConfig {
    /// Fields set in `other` win over fields set in `self`
    pub fn overlay(self, other: ConnectionConfig) -> ConnectionConfig {
        ConnectionConfig {
            access_key: other.access_key.or(self.access_key),
            secret_key: other.secret_key.or(self.secret_key),
            endpoint: other.endpoint.or(self.endpoint),
            bucket: other.bucket.or(self.bucket),
            secure: other.secure.or(self.secure),
            region: other.region.or(self.region),
        }
    }

    /// Check required fields and fill in defaults
    pub fn into_settings(self) -> Result<ConnectionSettings> {
        let access_key = required(self.access_key, "access key")?;
        let secret_key = required(self.secret_key, "secret key")?;
        let endpoint = required(self.endpoint, "endpoint")?;

        let settings = ConnectionSettings {
            access_key,
            secret_key,
            endpoint,
            secure: self.secure.unwrap_or(true),
            bucket: self
                .bucket
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            region: self
                .region
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };
        settings.endpoint_url()?;
        Ok(settings)
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Config(format!("{name} is not configured"))),
    }
}

/// Complete connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub secure: bool,
    pub bucket: String,
    pub region: String,
}

impl ConnectionSettings {
    /// Endpoint as a URL, adding a scheme from `secure` when none is given
    pub fn endpoint_url(&self) -> Result<Url> {
        if self.endpoint.contains("://") {
            return Ok(Url::parse(&self.endpoint)?);
        }
        let scheme = if self.secure { "https" } else { "http" };
        Ok(Url::parse(&format!("{scheme}://{}", self.endpoint))?)
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("endpoint", &self.endpoint)
            .field("secure", &self.secure)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager at `$S3KV_CONFIG_DIR` or the platform config directory
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("s3kv"),
        };
        Ok(Self::with_path(config_dir.join("config.toml")))
    }

    /// Create a ConfigManager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk, or the default when there is no file
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| Error::local_io(&self.config_path, e))?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config);
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade s3kv.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(config)
    }

    /// Save configuration to disk, readable by the owner only
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::local_io(parent, e))?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::local_io(&self.config_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)
                .map_err(|e| Error::local_io(&self.config_path, e))?;
        }

        Ok(())
    }

    fn migrate(&self, mut config: Config) -> Config {
        config.schema_version = SCHEMA_VERSION;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    fn complete() -> ConnectionConfig {
        ConnectionConfig {
            access_key: Some("minioadmin".into()),
            secret_key: Some("minioadmin".into()),
            endpoint: Some("localhost:9000".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.connection, ConnectionConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let mut config = Config::default();
        config.connection = complete();
        config.connection.bucket = Some("notes".into());

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded.connection, config.connection);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (manager, _temp_dir) = temp_config_manager();
        manager.save(&Config::default()).unwrap();

        let mode = std::fs::metadata(manager.config_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();
        let content = format!("schema_version = {}\n", SCHEMA_VERSION + 1);
        std::fs::write(manager.config_path(), content).unwrap();

        let err = manager.load().unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_invalid_toml() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(manager.config_path(), "connection = [").unwrap();
        assert!(matches!(manager.load(), Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_overlay_prefers_upper_layer() {
        let file = ConnectionConfig {
            bucket: Some("from-file".into()),
            secure: Some(false),
            ..complete()
        };
        let flags = ConnectionConfig {
            bucket: Some("from-flag".into()),
            ..Default::default()
        };

        let merged = file.overlay(flags);
        assert_eq!(merged.bucket.as_deref(), Some("from-flag"));
        assert_eq!(merged.secure, Some(false));
        assert_eq!(merged.endpoint.as_deref(), Some("localhost:9000"));
    }

    #[test]
    fn test_into_settings_defaults() {
        let settings = complete().into_settings().unwrap();
        assert_eq!(settings.bucket, DEFAULT_BUCKET);
        assert_eq!(settings.region, "us-east-1");
        assert!(settings.secure);
        assert_eq!(
            settings.endpoint_url().unwrap().as_str(),
            "https://localhost:9000/"
        );
    }

    #[test]
    fn test_into_settings_requires_credentials() {
        let config = ConnectionConfig {
            secret_key: None,
            ..complete()
        };
        let err = config.into_settings().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("secret key")));
    }

    #[test]
    fn test_endpoint_scheme() {
        let mut settings = complete().into_settings().unwrap();
        settings.secure = false;
        assert_eq!(settings.endpoint_url().unwrap().scheme(), "http");

        settings.endpoint = "https://s3.example.com".into();
        assert_eq!(settings.endpoint_url().unwrap().scheme(), "https");
    }

    #[test]
    fn test_debug_hides_secret() {
        let settings = complete().into_settings().unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("minioadmin\", secret"));
        assert!(debug.contains("***"));
    }
}
