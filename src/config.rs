//! Optional TOML configuration.
//!
//! ```toml
//! [parsers]
//! aliases = 'iso date-parse-pattern("%Y-%m-%d"), number-parse-pattern'
//!
//! [environment]
//! rate = 0.25
//! greeting = "hello"
//! home = "=Totals"      # a leading '=' stores a reference
//!
//! [logging]
//! filter = "cellscope_engine=debug"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cellscope_core::Workbook;
use cellscope_engine::engine::{Reference, Value, ValueName};
use cellscope_engine::provider::{
    AliasesParserProvider, BuiltinParserProvider, ParserAliasSet, SpreadsheetParserProvider,
};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub parsers: ParsersConfig,
    #[serde(default)]
    pub environment: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParsersConfig {
    /// Alias declarations restricting and renaming the built-in parsers.
    pub aliases: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: Option<String>,
}

impl Config {
    pub fn from_toml(content: &str, path: &Path) -> Result<Config> {
        toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Config> {
        let size = std::fs::metadata(path)?.len();
        if size > MAX_CONFIG_FILE_BYTES {
            return Err(ConfigError::TooLarge {
                path: path.display().to_string(),
                size,
                max: MAX_CONFIG_FILE_BYTES,
            });
        }
        let content = std::fs::read_to_string(path)?;
        Config::from_toml(&content, path)
    }

    /// The configured environment values, converted.
    pub fn environment_values(&self) -> Vec<Result<(String, Value)>> {
        self.environment
            .iter()
            .map(|(name, value)| {
                environment_value(name, value).map(|value| (name.clone(), value))
            })
            .collect()
    }

    /// Add the configured environment values to `workbook`. Values the
    /// workbook already defines are kept. Returns warnings for rejected entries.
    pub fn apply_environment(&self, workbook: &Workbook) -> Vec<String> {
        let mut warnings = Vec::new();
        for entry in self.environment_values() {
            let (name, value) = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warnings.push(err.to_string());
                    continue;
                }
            };
            let already_set = ValueName::new(&name)
                .map(|key| workbook.environment().contains_key(&key))
                .unwrap_or(false);
            if already_set {
                continue;
            }
            if let Err(err) = workbook.set_environment_value(&name, value) {
                warnings.push(format!("Invalid environment value {}: {}", name, err));
            }
        }
        warnings
    }

    /// The built-in parsers, seen through the configured aliases if any.
    pub fn parser_provider(&self) -> (Arc<dyn SpreadsheetParserProvider>, Option<String>) {
        let builtins: Arc<dyn SpreadsheetParserProvider> = Arc::new(BuiltinParserProvider::new());
        let Some(text) = self.parsers.aliases.as_deref() else {
            return (builtins, None);
        };

        let aliased = ParserAliasSet::parse(text)
            .and_then(|aliases| AliasesParserProvider::new(aliases, Arc::clone(&builtins)));
        match aliased {
            Ok(provider) => (Arc::new(provider), None),
            Err(err) => (
                builtins,
                Some(format!(
                    "Ignoring parser aliases: {}; using the built-in parsers",
                    err
                )),
            ),
        }
    }
}

fn environment_value(name: &str, value: &toml::Value) -> Result<Value> {
    let invalid = |message: String| ConfigError::Environment {
        name: name.to_string(),
        message,
    };
    match value {
        toml::Value::Integer(n) => Ok(Value::Number(*n as f64)),
        toml::Value::Float(n) => Ok(Value::Number(*n)),
        toml::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        toml::Value::String(s) => match s.strip_prefix('=') {
            Some(target) => Reference::parse(target)
                .map(Value::Reference)
                .map_err(|err| invalid(err.to_string())),
            None => Ok(Value::Text(s.clone())),
        },
        other => Err(invalid(format!("unsupported {}", other.type_str()))),
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "cellscope")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// Load the explicit config file, or the user's if it exists.
///
/// Problems never abort the run; they are returned as warnings and the
/// defaults are used instead.
pub fn load_config(explicit: Option<&Path>) -> (Config, Vec<String>) {
    let mut warnings = Vec::new();
    let path = explicit.map(Path::to_path_buf).or_else(user_config_path);

    let Some(path) = path else {
        return (Config::default(), warnings);
    };
    if !path.exists() {
        if explicit.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Config::default(), warnings);
    }

    match Config::read(&path) {
        Ok(config) => (config, warnings),
        Err(err) => {
            warnings.push(err.to_string());
            (Config::default(), warnings)
        }
    }
}
