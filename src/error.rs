use thiserror::Error;

#[derive(Error, Debug)]
pub enum JambiError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
    #[error("Type constraint violated: {0}")]
    TypeConstraint(String),
    #[error("Middleware '{middleware}' failed: {message}")]
    Middleware { middleware: String, message: String },
    #[error("Model '{model}' has no function '{function}'")]
    UnknownFunction { model: String, function: String },
    #[error("Model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, JambiError>;

impl JambiError {
    /// Error raised from inside a middleware's own logic.
    pub fn middleware(name: &str, message: impl Into<String>) -> Self {
        Self::Middleware {
            middleware: name.to_string(),
            message: message.into(),
        }
    }
}

// Helper conversions
impl From<::config::ConfigError> for JambiError {
    fn from(e: ::config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for JambiError {
    fn from(e: serde_json::Error) -> Self { Self::Decode(e.to_string()) }
}
