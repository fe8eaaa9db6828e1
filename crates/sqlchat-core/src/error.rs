use thiserror::Error;

/// Top-level error type for the sqlchat system.
///
/// Subsystem crates define their own error types where the caller needs to
/// tell failures apart and convert into or out of `SqlchatError` so that
/// `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqlchatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The dataset store rejected a statement. Carries the engine's message.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SqlchatError {
    fn from(err: toml::de::Error) -> Self {
        SqlchatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SqlchatError {
    fn from(err: toml::ser::Error) -> Self {
        SqlchatError::Config(err.to_string())
    }
}

/// A specialized `Result` type for sqlchat operations.
pub type Result<T> = std::result::Result<T, SqlchatError>;
