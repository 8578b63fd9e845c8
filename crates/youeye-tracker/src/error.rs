use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("shared tracker already initialized")]
    SharedAlreadyInitialized,
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

/// Opaque failure reported by a tracking session. Never interpreted; it is
/// only logged before the session is restarted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("tracking session failed: {message}")]
pub struct SessionError {
    message: String,
}

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
