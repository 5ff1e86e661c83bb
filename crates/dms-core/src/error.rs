//! Error types for the DMS sensor

use std::path::PathBuf;

/// Sensor error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rule already exists: {0}")]
    RuleAlreadyExists(String),

    #[error("Log entry already exists for rule {rule} at {timestamp}")]
    DuplicateLog { rule: String, timestamp: String },

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("No logs recorded for rule: {0}")]
    NoLogs(String),

    #[error("Rule run failed: {0}")]
    RunError(String),

    #[error("User {user} does not have right {right}")]
    RightDenied { user: String, right: String },

    #[error("Unknown user or right: {user}/{right}")]
    RightUnknown { user: String, right: String },

    #[error("Invalid credentials for user {0}")]
    InvalidCredentials(String),

    #[error("Session rejected by the rights service; log in again")]
    SessionRejected,

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Auth service error: {0}")]
    AuthService(String),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for the sensor
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    pub fn run<S: Into<String>>(msg: S) -> Self {
        Error::RunError(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn db<S: Into<String>>(msg: S) -> Self {
        Error::DbError(msg.into())
    }

    /// HTTP status code this error surfaces as on the REST boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::RuleAlreadyExists(_) | Error::DuplicateLog { .. } => 409,
            Error::RuleNotFound(_) | Error::NoLogs(_) => 404,
            Error::RightDenied { .. } | Error::RightUnknown { .. } => 401,
            Error::InvalidCredentials(_) | Error::SessionRejected => 401,
            Error::UserAlreadyExists(_) => 409,
            Error::AuthService(_) => 502,
            _ => 500,
        }
    }

    /// True for both flavours of authorization refusal
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::RightDenied { .. } | Error::RightUnknown { .. })
    }
}
