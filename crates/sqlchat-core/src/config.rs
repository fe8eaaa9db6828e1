use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SqlchatError};

/// Top-level configuration for the sqlchat service.
///
/// Loaded from `~/.sqlchat/config.toml` by default. Every section falls back
/// to its defaults when absent, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlchatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl SqlchatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SqlchatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay values from the process environment.
    ///
    /// Recognised variables: `DB_PATH`, `OPENAI_API_KEY`, `OPENAI_MODEL`,
    /// `OPENAI_BASE_URL`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values using an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty("DB_PATH") {
            self.storage.database_path = path;
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(endpoint) = non_empty("OPENAI_BASE_URL") {
            self.llm.endpoint = endpoint;
        }
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.query.default_limit == 0 {
            return Err(SqlchatError::Config(
                "query.default_limit must be positive".to_string(),
            ));
        }
        if self.llm.provider == "openai"
            && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(SqlchatError::Config(
                "llm.api_key (or OPENAI_API_KEY) is required for the openai provider".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// SQLite settings. The same file holds the dataset tables and the
/// conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "ecommerce.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Text-completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "scripted".
    pub provider: String,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 60,
        }
    }
}

/// Query pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Row limit applied when a request does not carry one.
    pub default_limit: u32,
    /// Number of prior messages replayed to the completion service.
    pub history_turns: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            history_turns: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SqlchatConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.database_path, "ecommerce.db");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 512);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.query.default_limit, 100);
        assert_eq!(config.query.history_turns, 8);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 9000

[storage]
database_path = "/data/olist.db"

[llm]
provider = "openai"
model = "gpt-4o"
api_key = "sk-test"
timeout_secs = 10

[query]
default_limit = 25
history_turns = 4
"#;
        let file = create_temp_config(content);
        let config = SqlchatConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.database_path, "/data/olist.db");
        assert_eq!(config.storage.busy_timeout_ms, 5000);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.timeout_secs, 10);
        assert_eq!(config.query.default_limit, 25);
        assert_eq!(config.query.history_turns, 4);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = SqlchatConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.query.default_limit, 100);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(matches!(
            SqlchatConfig::load(file.path()),
            Err(SqlchatError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SqlchatConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.storage.database_path, "ecommerce.db");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = SqlchatConfig::default();
        config.server.port = 8123;
        config.save(&path).unwrap();

        let reloaded = SqlchatConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 8123);
        assert_eq!(reloaded.llm.model, config.llm.model);
    }

    #[test]
    fn test_apply_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DB_PATH", "../ecommerce.db"),
            ("OPENAI_API_KEY", "sk-env"),
            ("OPENAI_MODEL", "gpt-4.1-mini"),
            ("OPENAI_BASE_URL", "http://localhost:11434"),
        ]
        .into_iter()
        .collect();

        let mut config = SqlchatConfig::default();
        config.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.database_path, "../ecommerce.db");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_apply_env_ignores_blank_values() {
        let mut config = SqlchatConfig::default();
        config.apply_env_from(|k| (k == "OPENAI_MODEL").then(|| "   ".to_string()));
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_validate_requires_api_key_for_openai() {
        let config = SqlchatConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_key"));

        let mut config = SqlchatConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_scripted_provider_needs_no_key() {
        let mut config = SqlchatConfig::default();
        config.llm.provider = "scripted".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_default_limit() {
        let mut config = SqlchatConfig::default();
        config.llm.provider = "scripted".to_string();
        config.query.default_limit = 0;
        assert!(config.validate().is_err());
    }
}
