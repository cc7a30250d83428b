use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::gate::invoker::DEFAULT_TIMEOUT_SECS;
use crate::gate::types::Mode;

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Route accepting configuration updates
    #[serde(default = "default_config_path")]
    pub config_path: String,
    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            config_path: default_config_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ValidatorConfig {
    /// Validator executable, either a path or a name looked up on PATH
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_subcommand")]
    pub subcommand: String,
    #[serde(default)]
    pub mode: Mode,
    /// Enable security checks
    #[serde(default)]
    pub security: bool,
    /// Enable best-practice checks
    #[serde(default)]
    pub best_practices: bool,
    /// Let `dry_run=true` requests through unvalidated
    #[serde(default = "default_skip_dry_run")]
    pub skip_dry_run: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            subcommand: default_subcommand(),
            mode: Mode::default(),
            security: false,
            best_practices: false,
            skip_dry_run: default_skip_dry_run(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_config_path() -> String {
    "/api/config".to_string()
}

fn default_max_body_bytes() -> usize {
    // 10 MiB
    10 * 1024 * 1024
}

fn default_command() -> String {
    "config-validator".to_string()
}

fn default_subcommand() -> String {
    "validate".to_string()
}

fn default_skip_dry_run() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(String),
    Override(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Override(e) => write!(f, "Invalid config override: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load a TOML, or YAML for `.yaml`/`.yml` paths, config file and apply
    /// `key.path=value` overrides on top
    pub fn load(path: &str, overrides: &[String]) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Read)?;
        let is_yaml = matches!(
            Path::new(path).extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        Self::parse(&content, is_yaml, overrides)
    }

    pub fn parse(content: &str, is_yaml: bool, overrides: &[String]) -> Result<Self, ConfigError> {
        let mut value: Value = if content.trim().is_empty() {
            Value::Object(Default::default())
        } else if is_yaml {
            serde_yaml_ng::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?
        };
        // A YAML document holding only comments parses as null
        if value.is_null() {
            value = Value::Object(Default::default());
        }

        for entry in overrides {
            apply_override(&mut value, entry)?;
        }

        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Render as TOML, used by `init`
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Apply one `a.b.c=value` override. Values are read as JSON scalars when
/// possible (`true`, `5`) and as plain strings otherwise.
fn apply_override(root: &mut Value, entry: &str) -> Result<(), ConfigError> {
    let (key, raw) = entry
        .split_once('=')
        .ok_or_else(|| ConfigError::Override(format!("'{}' is not key=value", entry)))?;
    let key = key.trim();
    if key.is_empty() || key.split('.').any(str::is_empty) {
        return Err(ConfigError::Override(format!("'{}' has an empty key", entry)));
    }

    let parsed = serde_json::from_str::<Value>(raw.trim())
        .ok()
        .filter(|v| !v.is_object() && !v.is_array())
        .unwrap_or_else(|| Value::String(raw.trim().to_string()));

    let mut node = root;
    let segments: Vec<&str> = key.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let Value::Object(map) = node else {
            return Err(ConfigError::Override(format!(
                "'{}' is not a table",
                segments[..i].join(".")
            )));
        };
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), parsed);
            return Ok(());
        }
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = Config::parse("", false, &[]).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.server.config_path, "/api/config");
        assert_eq!(config.validator.command, "config-validator");
        assert_eq!(config.validator.mode, Mode::Strict);
        assert!(config.validator.skip_dry_run);
        assert_eq!(config.validator.timeout_secs, 5);
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::parse(
            r#"
[server]
listen = "0.0.0.0:9000"

[validator]
command = "/usr/local/bin/validator"
mode = "lenient"
security = true
"#,
            false,
            &[],
        )
        .unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.validator.mode, Mode::Lenient);
        assert!(config.validator.security);
        assert!(!config.validator.best_practices);
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::parse(
            "validator:\n  mode: permissive\n  best_practices: true\n",
            true,
            &[],
        )
        .unwrap();
        assert_eq!(config.validator.mode, Mode::Permissive);
        assert!(config.validator.best_practices);

        let config = Config::parse("", true, &[]).unwrap();
        assert_eq!(config.validator.mode, Mode::Strict);
    }

    #[test]
    fn test_overrides() {
        let overrides = vec![
            "validator.mode=lenient".to_string(),
            "validator.timeout_secs=2".to_string(),
            "validator.skip_dry_run=false".to_string(),
            "server.listen=0.0.0.0:1".to_string(),
        ];
        let config = Config::parse("[validator]\nmode = \"strict\"\n", false, &overrides).unwrap();
        assert_eq!(config.validator.mode, Mode::Lenient);
        assert_eq!(config.validator.timeout_secs, 2);
        assert!(!config.validator.skip_dry_run);
        assert_eq!(config.server.listen, "0.0.0.0:1");
    }

    #[test]
    fn test_invalid_overrides() {
        assert!(matches!(
            Config::parse("", false, &["validator.mode".to_string()]),
            Err(ConfigError::Override(_))
        ));
        assert!(matches!(
            Config::parse("", false, &["validator..mode=x".to_string()]),
            Err(ConfigError::Override(_))
        ));
        assert!(matches!(
            Config::parse("", false, &["validator.mode=loose".to_string()]),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let rendered = Config::default().to_toml().unwrap();
        let config = Config::parse(&rendered, false, &[]).unwrap();
        assert_eq!(config.validator.command, "config-validator");
        assert_eq!(config.server.max_body_bytes, 10 * 1024 * 1024);
    }
}
