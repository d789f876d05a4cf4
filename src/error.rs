use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizerError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid event pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ruleset error: {0}")]
    Ruleset(String),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Record not found: {0}")]
    NotFound(i64),
}

pub type Result<T> = std::result::Result<T, NormalizerError>;
