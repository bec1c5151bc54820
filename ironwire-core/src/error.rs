// ironwire-core/src/error.rs
// Driver-wide error taxonomy and Result alias

use thiserror::Error;

/// Unified error type for all driver operations.
///
/// Retry classification lives here: the execution engine asks
/// [`DriverError::is_retryable`] instead of matching variants itself, so the
/// retry policy has exactly one source of truth.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The caller-specified time budget for the logical call ran out.
    /// Terminal: never retried, always surfaced.
    #[error("operation exceeded its time budget")]
    OperationTimeout,

    /// The selected server does not support a requested feature.
    /// Raised before any network attempt.
    #[error("incompatible server: {0}")]
    Compatibility(String),

    /// Server selection found no matching server within its own timeout.
    #[error("no server available: {0}")]
    NoServerAvailable(String),

    /// Connection-level failure while talking to a server.
    #[error("network error talking to {address}: {message}")]
    Network {
        address: String,
        message: String,
        retryable: bool,
    },

    /// The server replied with an error document.
    #[error("server error (code {code}): {message}")]
    Server {
        code: i32,
        message: String,
        retryable: bool,
    },

    /// A cursor configuration method was invoked that the cursor variant
    /// or its current state does not allow. No network involvement.
    #[error("unsupported cursor operation: {0}")]
    UnsupportedCursorOperation(String),

    /// Caller input failed validation before a command could be built.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A reply arrived in a shape the driver cannot interpret.
    #[error("internal error: {0}")]
    Internal(String),

    /// Command document serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DriverError {
    /// Whether the one-retry policy may re-attempt after this error.
    ///
    /// Timeouts are never retryable: the remaining budget is by definition
    /// insufficient for another round trip.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriverError::Network { retryable, .. } => *retryable,
            DriverError::Server { retryable, .. } => *retryable,
            DriverError::NoServerAvailable(_) => true,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::OperationTimeout)
    }
}

/// Result type alias used throughout the driver core.
pub type Result<T> = std::result::Result<T, DriverError>;
