//! Error types for session store and reaper operations.
//!
//! Storage failures keep the redb error as their source together with a
//! short description of the step that failed (begin, open table, commit).

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Session store errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A stored value could not be decoded into a record.
    #[error("malformed session record: {0}")]
    Decode(#[source] serde_json::Error),

    /// A record could not be encoded.
    #[error("failed to encode session record: {0}")]
    Encode(#[source] serde_json::Error),

    /// The storage engine failed to open, use or commit a transaction.
    #[error("storage error while trying to {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: redb::Error,
    },

    /// A pre-delete hook refused the deletion of a record.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking storage task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(String),
}

impl Error {
    /// Create a storage error with context.
    pub fn storage(context: impl Into<String>, source: impl Into<redb::Error>) -> Self {
        Self::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error comes from a malformed stored value.
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

/// Attaches a step description to redb results, in the spirit of
/// `anyhow::Context`.
pub(crate) trait StorageContext<T> {
    fn storage_context(self, context: &str) -> Result<T>;
}

impl<T, E> StorageContext<T> for std::result::Result<T, E>
where
    E: Into<redb::Error>,
{
    fn storage_context(self, context: &str) -> Result<T> {
        self.map_err(|e| Error::storage(context, e))
    }
}

/// Failure reported by a pre-delete hook.
///
/// The reaper keeps the affected record and moves on to the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pre-delete hook failed: {message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    /// Create a hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message given by the hook.
    pub fn message(&self) -> &str {
        &self.message
    }
}
