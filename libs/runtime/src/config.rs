use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Client application configuration: backend endpoint, logging and feature flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub api: ApiConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Feature flags read once at startup.
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL every route path is appended to, e.g. `https://care.example.org`.
    pub base_url: String,
    /// Static bearer token for headless hosts. UI hosts inject a token provider instead.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_page_size() -> u64 {
    100
}

fn default_user_agent() -> String {
    concat!("reqkit/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000".to_string(),
            token: None,
            debounce_ms: default_debounce_ms(),
            page_size: default_page_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/reqkit.log"; empty disables the file sink
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid api.base_url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("api.page_size must be greater than zero")]
    ZeroPageSize,
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: String::new(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            logging: Some(default_logging_config()),
            features: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            api: ApiConfig::default(),
            logging: None,
            features: BTreeMap::new(),
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            // Example: APP__API__BASE_URL=https://care.example.org maps to api.base_url
            .merge(Env::prefixed("APP__").split("__"));

        let config: AppConfig = figment
            .extract()
            .with_context(|| "Failed to extract config from figment".to_string())?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file or fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.api.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.api.base_url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.api.base_url.clone(),
                reason: "not a base URL".to_string(),
            });
        }
        if self.api.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }

    /// Feature flag lookup; unknown flags are off.
    pub fn feature(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) -> Result<(), ConfigError> {
        if let Some(url) = &args.base_url {
            self.api.base_url = url.clone();
        }
        if let Some(token) = &args.token {
            self.api.token = Some(token.clone());
        }

        // Set logging level based on verbose flags for "default" section.
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(), // keep
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
        self.validate()
    }
}

/// Command line arguments structure.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub print_config: bool,
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_structure() {
        let config = AppConfig::default();

        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.api.debounce_ms, 500);
        assert_eq!(config.api.page_size, 100);
        assert!(config.api.user_agent.starts_with("reqkit/"));
        assert!(config.api.token.is_none());

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, "info");
        assert!(config.features.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_layered_from_yaml() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");

        let yaml = r#"
api:
  base_url: "https://care.example.org"
  debounce_ms: 250

logging:
  default:
    console_level: debug
    file: "logs/default.log"

features:
  abdm: true
"#;
        fs::write(&cfg_path, yaml).unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = AppConfig::load_layered(&cfg_path).map_err(|e| e.to_string())?;

            assert_eq!(config.api.base_url, "https://care.example.org");
            assert_eq!(config.api.debounce_ms, 250);
            assert_eq!(config.api.page_size, 100);
            let def = &config.logging.as_ref().unwrap()["default"];
            assert_eq!(def.console_level, "debug");
            assert_eq!(def.file, "logs/default.log");
            assert!(config.feature("abdm"));
            assert!(!config.feature("scribe"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "cfg.yaml",
                r#"
api:
  base_url: "https://care.example.org"
"#,
            )?;
            jail.set_env("APP__API__BASE_URL", "https://staging.example.org");
            jail.set_env("APP__API__PAGE_SIZE", "25");

            let config = AppConfig::load_layered("cfg.yaml").map_err(|e| e.to_string())?;
            assert_eq!(config.api.base_url, "https://staging.example.org");
            assert_eq!(config.api.page_size, 25);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cfg.yaml", "api:\n  base_url: \"not a url\"\n")?;

            let err = AppConfig::load_layered("cfg.yaml").unwrap_err();
            assert!(err.to_string().contains("invalid api.base_url"));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cfg.yaml", "api:\n  base_url: \"http://x.local\"\n  retries: 3\n")?;

            assert!(AppConfig::load_layered("cfg.yaml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            base_url: Some("https://cli.example.org".into()),
            token: Some("t0k".into()),
            verbose: 2,
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args).unwrap();

        assert_eq!(config.api.base_url, "https://cli.example.org");
        assert_eq!(config.api.token.as_deref(), Some("t0k"));
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "trace");
    }

    #[test]
    fn test_to_yaml_roundtrips_base_url() {
        let yaml = AppConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("base_url: http://127.0.0.1:9000"));
    }
}
