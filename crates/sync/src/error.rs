use lettavault_config::ConfigProblem;
use lettavault_remote::RemoteError;
use thiserror::Error;

/// Why [`crate::Bootstrapper::connect`] gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Missing or rejected credential.  Never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The user declined to create or configure a resource.  Never retried.
    #[error("cancelled: {0}")]
    UserCancelled(String),

    /// Configuration the user has to correct.  Never retried.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A remote failure that ended the connect sequence.
    #[error(transparent)]
    Remote(RemoteError),

    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: RemoteError },
}

impl ConnectError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(err) if retryable(err))
    }
}

/// Transient failures are retried, and so is a resource that vanished
/// mid-attempt; the next attempt finds or re-creates it.
pub(crate) fn retryable(err: &RemoteError) -> bool {
    err.is_transient() || matches!(err, RemoteError::NotFound(_))
}

impl From<RemoteError> for ConnectError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Auth { message, .. } => Self::Auth(message),
            RemoteError::Validation { message, .. } => Self::Validation(message),
            other => Self::Remote(other),
        }
    }
}

impl From<ConfigProblem> for ConnectError {
    fn from(problem: ConfigProblem) -> Self {
        match problem {
            ConfigProblem::MissingCredential(_) => Self::Auth(problem.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Failures of file reconciliation and the local store.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ignore pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    #[error("{0} is not a file this vault syncs")]
    NotSyncable(String),

    #[error("{0} has not been uploaded yet")]
    NotUploaded(String),

    #[error("file watcher error: {0}")]
    Watch(String),

    #[error("{failed} file(s) failed to sync")]
    Incomplete { failed: usize },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of the memory block editor.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("block `{0}` is not open")]
    NotOpen(String),

    #[error("block `{0}` is read-only")]
    ReadOnly(String),

    #[error("block `{label}` allows {limit} characters, got {len}")]
    TooLong {
        label: String,
        limit: usize,
        len: usize,
    },
}
