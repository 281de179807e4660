use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlugcountError {
    #[error("Sync failed for {repository}: {message}")]
    Sync { repository: String, message: String },

    #[error("Enumeration failed for {repository}: {message}")]
    Enumeration { repository: String, message: String },

    #[error("History store error: {0}")]
    Store(String),

    #[error("Webhook delivery failed: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a failure. The run pipeline reports a skipped
/// repository under the stage its error kind names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Sync,
    Enumeration,
    Store,
    Delivery,
    Config,
    Other,
}

impl PlugcountError {
    pub fn sync(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sync {
            repository: repository.into(),
            message: message.into(),
        }
    }

    pub fn enumeration(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Enumeration {
            repository: repository.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Sync { .. } => ErrorKind::Sync,
            Self::Enumeration { .. } => ErrorKind::Enumeration,
            Self::Store(_) => ErrorKind::Store,
            Self::Delivery(_) => ErrorKind::Delivery,
            Self::Config(_) | Self::TomlDe(_) => ErrorKind::Config,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Other,
        }
    }
}
