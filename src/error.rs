//! Error types for the cellscope command line

use thiserror::Error;

/// Errors raised while reading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Refusing to read {path}: file too large ({size} bytes, max {max})")]
    TooLarge { path: String, size: u64, max: u64 },

    #[error("Invalid environment value {name}: {message}")]
    Environment { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
