//! Layered configuration
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `turnscript.toml` in the working directory, or the file named by
//!    `--config` / `TURNSCRIPT_CONFIG_PATH`
//! 3. `TURNSCRIPT_*` environment variables, `__` separating sections
//!    (`TURNSCRIPT_EXECUTOR__MULTI_TARGET_POLICY=reject`)
//! 4. Explicit builder overrides
//!
//! A `.env` file in the working directory is read before the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::executor::ExecutorOptions;

pub const ENV_PREFIX: &str = "TURNSCRIPT";
pub const CONFIG_PATH_ENV: &str = "TURNSCRIPT_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "turnscript.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub executor: ExecutorOptions,
    pub domain: DomainConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// JSON file with intents, entities and records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Render as TOML, as a config file would hold it
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    schema_path: Option<PathBuf>,
    log_level: Option<String>,
    read_env: Option<bool>,
}

impl ConfigBuilder {
    /// Read this file instead of the default location; the file must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn schema_path(mut self, path: Option<PathBuf>) -> Self {
        self.schema_path = path;
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    /// Skip `.env` and `TURNSCRIPT_*` variables
    pub fn without_env(mut self) -> Self {
        self.read_env = Some(false);
        self
    }

    pub fn build(self) -> Result<Config> {
        let read_env = self.read_env.unwrap_or(true);
        if read_env {
            // A missing .env file is fine
            let _ = dotenvy::dotenv();
        }

        let explicit_path = self.config_path.or_else(|| {
            read_env
                .then(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
                .flatten()
        });

        let mut builder = config::Config::builder();
        builder = match &explicit_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                builder.add_source(config::File::from(path.as_path()).required(true))
            }
            None => builder.add_source(
                config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
            ),
        };

        if read_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut loaded: Config = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(path) = self.schema_path {
            loaded.domain.schema_path = Some(path);
        }
        if let Some(level) = self.log_level {
            loaded.log.level = level;
        }

        tracing::debug!(
            path = ?explicit_path,
            policy = %loaded.executor.multi_target_policy,
            "Loaded configuration"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MultiTargetPolicy;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.executor.follow_marker, "#y");
        assert_eq!(config.executor.multi_target_policy, MultiTargetPolicy::MostUpdated);
        assert_eq!(config.log.level, "info");
        assert!(config.domain.schema_path.is_none());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[executor]\nmulti_target_policy = \"reject\"\n\n[domain]\nschema_path = \"alarms.json\""
        )
        .unwrap();

        let config = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .without_env()
            .build()
            .unwrap();

        assert_eq!(config.executor.multi_target_policy, MultiTargetPolicy::Reject);
        assert_eq!(config.executor.follow_marker, "#y");
        assert_eq!(config.domain.schema_path, Some(PathBuf::from("alarms.json")));
    }

    #[test]
    fn test_overrides_win() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[log]\nlevel = \"warn\"").unwrap();

        let config = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .schema_path(Some(PathBuf::from("other.json")))
            .log_level(Some("debug".to_string()))
            .without_env()
            .build()
            .unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.domain.schema_path, Some(PathBuf::from("other.json")));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::builder()
            .config_path(Some(dir.path().join("absent.toml")))
            .without_env()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.executor.multi_target_policy = MultiTargetPolicy::Reject;
        config.domain.schema_path = Some(PathBuf::from("alarms.json"));

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("multi_target_policy = \"reject\""));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
