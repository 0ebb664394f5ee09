use thiserror::Error;

/// Errors raised while looking up or running parsers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Unknown parser {0}")]
    UnknownParser(String),

    #[error("Invalid parser name \"{0}\"")]
    InvalidName(String),

    #[error("Invalid parser selector \"{0}\"")]
    InvalidSelector(String),

    #[error("Invalid values for {name}: {message}")]
    InvalidValues { name: String, message: String },

    #[error("Invalid alias \"{0}\"")]
    InvalidAlias(String),

    #[error("Duplicate parser name {0}")]
    DuplicateName(String),

    #[error("Alias {alias} refers to unknown parser {target}")]
    MissingTarget { alias: String, target: String },

    #[error("Invalid parser url \"{0}\"")]
    InvalidUrl(String),

    #[error("{parser} cannot parse \"{text}\": {message}")]
    Parse {
        parser: String,
        text: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ProviderError>;
