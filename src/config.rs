use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{
    AuthError, CredentialStore, FileCredentialStore, IdentityClass, IdentityPriority,
    MemoryCredentialStore,
};

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings are overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "api.base_url") is overridden by an env var.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    /// Get all overrides as a map of setting key -> env var name.
    pub fn all(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
    /// Upper bound on how long a request waits for an in-flight refresh.
    /// Unset means the wait is bounded only by the refresh call itself.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_wait_timeout_secs: Option<u64>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            refresh_timeout_secs: default_refresh_timeout(),
            refresh_wait_timeout_secs: None,
            user_agent: None,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn refresh_wait_timeout(&self) -> Option<Duration> {
        self.refresh_wait_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Credential file used by the `file` backend.
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_credentials_path(),
        }
    }
}

impl CredentialsConfig {
    /// Open the configured credential store.
    pub fn open(&self) -> Result<Arc<dyn CredentialStore>, AuthError> {
        match self.backend {
            StorageBackend::File => Ok(Arc::new(FileCredentialStore::new(&self.path))),
            StorageBackend::Memory => Ok(Arc::new(MemoryCredentialStore::new())),
            #[cfg(feature = "system-keyring")]
            StorageBackend::Keyring => Ok(Arc::new(crate::auth::KeyringCredentialStore::new())),
            #[cfg(not(feature = "system-keyring"))]
            StorageBackend::Keyring => Err(AuthError::Storage(
                "keyring backend requires the `system-keyring` feature".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Resolution order when several classes hold credentials.
    #[serde(default = "default_priority")]
    pub priority: Vec<IdentityClass>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

impl IdentityConfig {
    pub fn priority(&self) -> Result<IdentityPriority, AuthError> {
        IdentityPriority::new(self.priority.clone())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Keyring => write!(f, "keyring"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown storage backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    "http://127.0.0.1:6184/api/".to_string()
}
const fn default_request_timeout() -> u64 {
    30
}
const fn default_upload_timeout() -> u64 {
    60
}
const fn default_connect_timeout() -> u64 {
    10
}
const fn default_refresh_timeout() -> u64 {
    30
}
fn default_storage_backend() -> StorageBackend {
    StorageBackend::File
}
fn default_credentials_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wcportal")
        .join("credentials.json")
}
fn default_priority() -> Vec<IdentityClass> {
    IdentityClass::ALL.to_vec()
}
fn default_log_level() -> String {
    "warn".to_string()
}

fn parse_priority(value: &str) -> Result<Vec<IdentityClass>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting prefixed with `WCPORTAL_` takes precedence over
    /// the file value and is tracked in `env_overrides`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save the current (file-level) configuration to a TOML file.
    /// This serializes the config without env overrides applied.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Every supported setting has a corresponding `WCPORTAL_*` env var. When
    /// set, the env var value replaces the file/default value and the setting
    /// key is recorded in `env_overrides`.
    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }
        macro_rules! env_path {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = PathBuf::from(val);
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_opt_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if val.is_empty() {
                        $field = None;
                        ov.record($key, $env);
                    } else if let Ok(parsed) = val.parse() {
                        $field = Some(parsed);
                        ov.record($key, $env);
                    }
                }
            };
        }

        // -- API --
        env_str!("api.base_url", "WCPORTAL_API_BASE_URL", self.api.base_url);
        env_parse!(
            "api.request_timeout_secs",
            "WCPORTAL_API_REQUEST_TIMEOUT",
            self.api.request_timeout_secs
        );
        env_parse!(
            "api.upload_timeout_secs",
            "WCPORTAL_API_UPLOAD_TIMEOUT",
            self.api.upload_timeout_secs
        );
        env_parse!(
            "api.connect_timeout_secs",
            "WCPORTAL_API_CONNECT_TIMEOUT",
            self.api.connect_timeout_secs
        );
        env_parse!(
            "api.refresh_timeout_secs",
            "WCPORTAL_API_REFRESH_TIMEOUT",
            self.api.refresh_timeout_secs
        );
        env_opt_parse!(
            "api.refresh_wait_timeout_secs",
            "WCPORTAL_API_REFRESH_WAIT_TIMEOUT",
            self.api.refresh_wait_timeout_secs
        );
        env_opt_parse!(
            "api.user_agent",
            "WCPORTAL_API_USER_AGENT",
            self.api.user_agent
        );

        // -- Credentials --
        if let Ok(val) = std::env::var("WCPORTAL_CREDENTIALS_BACKEND") {
            if let Ok(backend) = val.parse() {
                self.credentials.backend = backend;
                ov.record("credentials.backend", "WCPORTAL_CREDENTIALS_BACKEND");
            }
        }
        env_path!(
            "credentials.path",
            "WCPORTAL_CREDENTIALS_PATH",
            self.credentials.path
        );

        // -- Identity --
        if let Ok(val) = std::env::var("WCPORTAL_IDENTITY_PRIORITY") {
            match parse_priority(&val) {
                Ok(priority) => {
                    self.identity.priority = priority;
                    ov.record("identity.priority", "WCPORTAL_IDENTITY_PRIORITY");
                }
                Err(e) => tracing::warn!("Ignoring WCPORTAL_IDENTITY_PRIORITY: {e}"),
            }
        }

        // -- Logging --
        env_str!("logging.level", "WCPORTAL_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "WCPORTAL_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}

// Helper for the default credential file location
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local").join("share"))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:6184/api/");
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.api.upload_timeout(), Duration::from_secs(60));
        assert!(config.api.refresh_wait_timeout().is_none());
        assert_eq!(config.credentials.backend, StorageBackend::File);
        assert!(config.credentials.path.ends_with("wcportal/credentials.json"));
        assert_eq!(config.identity.priority, IdentityClass::ALL.to_vec());
        assert_eq!(config.logging.level, "warn");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("file".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert_eq!("Keyring".parse::<StorageBackend>().unwrap(), StorageBackend::Keyring);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_storage_backend_display() {
        assert_eq!(StorageBackend::File.to_string(), "file");
        assert_eq!(StorageBackend::Keyring.to_string(), "keyring");
        assert_eq!(StorageBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(
            parse_priority("teacher, admin").unwrap(),
            vec![IdentityClass::Teacher, IdentityClass::Admin]
        );
        assert!(parse_priority("teacher,parent").is_err());
    }

    #[test]
    fn test_env_overrides_tracking() {
        let mut ov = EnvOverrides::default();
        assert!(!ov.is_overridden("api.base_url"));

        ov.record("api.base_url", "WCPORTAL_API_BASE_URL");
        assert!(ov.is_overridden("api.base_url"));
        assert_eq!(ov.env_var_for("api.base_url"), Some("WCPORTAL_API_BASE_URL"));
        assert_eq!(ov.all().len(), 1);
    }

    #[test]
    fn test_env_override_applies() {
        // SAFETY: these variables are read by no other test.
        unsafe {
            std::env::set_var("WCPORTAL_API_UPLOAD_TIMEOUT", "120");
            std::env::set_var("WCPORTAL_API_REFRESH_WAIT_TIMEOUT", "15");
            std::env::set_var("WCPORTAL_IDENTITY_PRIORITY", "student,teacher");
            std::env::set_var("WCPORTAL_CREDENTIALS_BACKEND", "memory");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.api.upload_timeout_secs, 120);
        assert_eq!(config.api.refresh_wait_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(
            config.identity.priority,
            vec![IdentityClass::Student, IdentityClass::Teacher]
        );
        assert_eq!(config.credentials.backend, StorageBackend::Memory);
        assert!(config.env_overrides.is_overridden("identity.priority"));
        assert!(!config.env_overrides.is_overridden("api.request_timeout_secs"));

        unsafe {
            std::env::remove_var("WCPORTAL_API_UPLOAD_TIMEOUT");
            std::env::remove_var("WCPORTAL_API_REFRESH_WAIT_TIMEOUT");
            std::env::remove_var("WCPORTAL_IDENTITY_PRIORITY");
            std::env::remove_var("WCPORTAL_CREDENTIALS_BACKEND");
        }
    }

    #[test]
    fn test_env_bool_variants() {
        for (val, expected) in [
            ("1", true),
            ("yes", true),
            ("on", true),
            ("0", false),
            ("off", false),
        ] {
            // SAFETY: WCPORTAL_LOG_JSON is read by no other test.
            unsafe { std::env::set_var("WCPORTAL_LOG_JSON", val); }
            let mut config = Config::default();
            config.apply_env_overrides();
            assert_eq!(config.logging.json, expected, "WCPORTAL_LOG_JSON={val}");
        }
        unsafe { std::env::remove_var("WCPORTAL_LOG_JSON"); }
    }

    #[test]
    fn test_open_memory_store() {
        let credentials = CredentialsConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        let store = credentials.open().unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_invalid_priority_in_file() {
        let identity = IdentityConfig {
            priority: vec![IdentityClass::Admin, IdentityClass::Admin],
        };
        assert!(identity.priority().is_err());
    }

    #[test]
    fn test_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.api.connect_timeout_secs, 10);
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wcportal.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://portal.example.edu/api/"
refresh_wait_timeout_secs = 20

[credentials]
backend = "file"
path = "/tmp/wcportal-test/credentials.json"

[identity]
priority = ["teacher", "student", "admin"]

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://portal.example.edu/api/");
        assert_eq!(config.api.refresh_wait_timeout_secs, Some(20));
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(
            config.credentials.path,
            PathBuf::from("/tmp/wcportal-test/credentials.json")
        );
        assert_eq!(config.identity.priority[0], IdentityClass::Teacher);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_config_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("save_test.toml");

        let mut config = Config::default();
        config.api.base_url = "http://10.0.0.1:8000/api/".to_string();
        config.identity.priority = vec![IdentityClass::Student];
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.api.base_url, "http://10.0.0.1:8000/api/");
        assert_eq!(reloaded.identity.priority, vec![IdentityClass::Student]);
    }
}
