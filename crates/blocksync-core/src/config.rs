//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/blocksync/config.toml)
//! 3. Environment variables (BLOCKSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// Environment variable prefix
const ENV_PREFIX: &str = "BLOCKSYNC";

pub const DEFAULT_API_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_API_VERSION: &str = "2022-06-28";
pub const DEFAULT_TOKEN_ENV: &str = "NOTION_TOKEN";

/// Keys accepted by [`Config::set_value`]
pub const KEYS: &[&str] = &[
    "api_base_url",
    "api_version",
    "database_id",
    "token_env",
    "token_command",
    "debounce_ms",
    "request_timeout_secs",
    "page_size",
    "debug",
    "data_dir",
    "log_file",
];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base url of the remote API, without trailing slash
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Value of the API version header sent with every request
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Database whose pages are listed and created
    #[serde(default)]
    pub database_id: Option<String>,

    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Shell command printing the API token, used when the variable is unset
    #[serde(default)]
    pub token_command: Option<String>,

    /// Minimum time between two syncs of the same page
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Timeout of a single request attempt
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Pages requested per database query
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Record request timings
    #[serde(default)]
    pub debug: bool,

    /// Directory for local state (debug log)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log file used when BLOCKSYNC_LOG is set (defaults to {data_dir}/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            database_id: None,
            token_env: default_token_env(),
            token_command: None,
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            debug: false,
            data_dir: default_data_dir(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (BLOCKSYNC_DATABASE_ID, BLOCKSYNC_API_BASE_URL, ...)
    /// 2. Config file (~/.config/blocksync/config.toml or BLOCKSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Values that fail to parse are ignored.
    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok();

        if let Some(val) = var("API_BASE_URL") {
            self.api_base_url = val;
        }
        if let Some(val) = var("API_VERSION") {
            self.api_version = val;
        }
        // Empty string clears it
        if let Some(val) = var("DATABASE_ID") {
            self.database_id = optional(&val);
        }
        if let Some(val) = var("TOKEN_ENV") {
            self.token_env = val;
        }
        if let Some(val) = var("TOKEN_COMMAND") {
            self.token_command = optional(&val);
        }
        if let Some(val) = var("DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.debounce_ms = val;
        }
        if let Some(val) = var("REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = val;
        }
        if let Some(val) = var("PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.page_size = val;
        }
        if let Some(val) = var("DEBUG") {
            self.debug = val.eq_ignore_ascii_case("true") || val == "1";
        }
        if let Some(val) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }
    }

    /// Set one key from its string form
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_base_url" => self.api_base_url = value.trim_end_matches('/').to_string(),
            "api_version" => self.api_version = value.to_string(),
            "database_id" => self.database_id = optional(value),
            "token_env" => {
                if value.is_empty() {
                    bail!("token_env cannot be empty");
                }
                self.token_env = value.to_string();
            }
            "token_command" => self.token_command = optional(value),
            "debounce_ms" => {
                self.debounce_ms = value
                    .parse()
                    .context("Invalid value for debounce_ms. Use a number of milliseconds.")?;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
            }
            "page_size" => {
                self.page_size = value
                    .parse()
                    .context("Invalid value for page_size. Use a number from 1 to 100.")?;
            }
            "debug" => {
                self.debug = value
                    .parse()
                    .context("Invalid value for debug. Use 'true' or 'false'.")?;
            }
            "data_dir" => self.data_dir = value.into(),
            "log_file" => self.log_file = optional(value).map(PathBuf::from),
            _ => bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with BLOCKSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blocksync")
            .join("config.toml")
    }

    /// Database id, or `ConfigMissing` when unset
    pub fn require_database_id(&self) -> SyncResult<&str> {
        self.database_id
            .as_deref()
            .ok_or(SyncError::ConfigMissing("database_id"))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Log file path (config.log_file or {data_dir}/debug.log)
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }
}

/// Empty or "none" means unset
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> usize {
    100
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("blocksync")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "BLOCKSYNC_API_BASE_URL",
        "BLOCKSYNC_API_VERSION",
        "BLOCKSYNC_DATABASE_ID",
        "BLOCKSYNC_TOKEN_ENV",
        "BLOCKSYNC_TOKEN_COMMAND",
        "BLOCKSYNC_DEBOUNCE_MS",
        "BLOCKSYNC_REQUEST_TIMEOUT_SECS",
        "BLOCKSYNC_PAGE_SIZE",
        "BLOCKSYNC_DEBUG",
        "BLOCKSYNC_DATA_DIR",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "https://api.notion.com/v1");
        assert_eq!(config.api_version, "2022-06-28");
        assert_eq!(config.token_env, "NOTION_TOKEN");
        assert_eq!(config.debounce(), Duration::from_millis(1000));
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.page_size, 100);
        assert!(config.database_id.is_none());
        assert!(!config.debug);
        assert!(config.data_dir.ends_with("blocksync"));
        assert!(config.log_path().ends_with("debug.log"));
    }

    #[test]
    fn test_require_database_id() {
        let mut config = Config::default();
        assert!(matches!(
            config.require_database_id(),
            Err(SyncError::ConfigMissing("database_id"))
        ));

        config.database_id = Some("db-1".to_string());
        assert_eq!(config.require_database_id().unwrap(), "db-1");
    }

    #[test]
    fn test_env_override_database_id() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("BLOCKSYNC_DATABASE_ID", "db-env");
        config.apply_env_overrides();
        assert_eq!(config.database_id.as_deref(), Some("db-env"));

        // Empty string clears it
        env::set_var("BLOCKSYNC_DATABASE_ID", "");
        config.apply_env_overrides();
        assert!(config.database_id.is_none());
    }

    #[test]
    fn test_env_override_numbers_and_flags() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("BLOCKSYNC_DEBOUNCE_MS", "250");
        env::set_var("BLOCKSYNC_PAGE_SIZE", "not-a-number");
        env::set_var("BLOCKSYNC_DEBUG", "1");
        config.apply_env_overrides();

        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.page_size, 100);
        assert!(config.debug);

        env::set_var("BLOCKSYNC_DEBUG", "false");
        config.apply_env_overrides();
        assert!(!config.debug);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            api_base_url = "http://localhost:9000"
            database_id = "db-42"
            token_command = "pass show notion"
            debounce_ms = 500
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.database_id.as_deref(), Some("db-42"));
        assert_eq!(config.token_command.as_deref(), Some("pass show notion"));
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn test_env_beats_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("BLOCKSYNC_API_BASE_URL", "http://override");
        let config = Config::load_from_str(r#"api_base_url = "http://file""#).unwrap();
        assert_eq!(config.api_base_url, "http://override");
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set_value("database_id", "db-7").unwrap();
        config.set_value("debounce_ms", "2000").unwrap();
        config.set_value("log_file", "/tmp/blocksync.log").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_with_cli_override(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.log_path(), PathBuf::from("/tmp/blocksync.log"));
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();

        config.set_value("api_base_url", "http://localhost:8080/").unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080");

        config.set_value("debug", "true").unwrap();
        assert!(config.debug);

        config.set_value("token_command", "none").unwrap();
        assert!(config.token_command.is_none());

        assert!(config.set_value("debounce_ms", "soon").is_err());
        assert!(config.set_value("token_env", "").is_err());

        let err = config.set_value("colour", "blue").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_serialization() {
        let config = Config {
            database_id: Some("db-1".to_string()),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("database_id"));
        assert!(toml_str.contains("debounce_ms"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
