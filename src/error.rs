use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a failure, used by callers to decide between
/// rebuilding (corrupt or missing data) and retrying (store unavailable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    NotFound,
    Validation,
    Serialization,
    Config,
    Store,
}

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("Invalid context: {0}")]
    Validation(String),

    #[error("Failed to decode {key}: {message}")]
    Serialization { key: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Object store error: {0}")]
    Store(String),

    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<ContextError>,
    },
}

pub type Result<T, E = ContextError> = std::result::Result<T, E>;

impl ContextError {
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        ContextError::NotFound {
            what,
            name: name.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ContextError::Config(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContextError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap this error with the name of the pipeline stage that produced it
    pub fn in_stage(self, stage: &'static str) -> Self {
        ContextError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Kind of the underlying failure, looking through stage wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContextError::Io { .. } => ErrorKind::Io,
            ContextError::NotFound { .. } => ErrorKind::NotFound,
            ContextError::Validation(_) => ErrorKind::Validation,
            ContextError::Serialization { .. } => ErrorKind::Serialization,
            ContextError::Config(_) => ErrorKind::Config,
            ContextError::Store(_) => ErrorKind::Store,
            ContextError::Stage { source, .. } => source.kind(),
        }
    }

    /// Name of the failing pipeline stage, if any
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            ContextError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
