//! Crate-level error types for store dispatch and async operations.

/// Error returned when the store itself cannot process a request.
///
/// These never describe a domain failure: a rejected login or an oversized
/// upload is an [`OperationError`] and is folded into slice state. A
/// `StoreError` means the container could not do its job at all.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Disk I/O failure.
    ///
    /// An underlying storage-backend I/O error occurred while reading or
    /// writing a persisted projection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A projection could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Store actor exited unexpectedly.
    ///
    /// The background actor that owns the state tree has shut down, so
    /// no further actions can be applied.
    #[error("store actor is no longer running")]
    StoreGone,

    /// The spawned operation task panicked before reporting an outcome.
    #[error("operation task panicked")]
    TaskPanicked,
}

/// Failure produced by the body of an async operation.
///
/// Both variants are surfaced to the UI identically: the reason string is
/// stored in the owning slice's `error` field by the `failed` transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// User-supplied data failed validation (bad credentials, oversized or
    /// disallowed file, empty description, non-positive amount).
    #[error("{0}")]
    InvalidInput(String),

    /// Stand-in for any upstream failure.
    #[error("{0}")]
    Simulated(String),
}

impl OperationError {
    /// Build an [`OperationError::InvalidInput`] from anything string-like.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// The human-readable reason stored in slice state.
    pub fn reason(&self) -> &str {
        match self {
            Self::InvalidInput(reason) | Self::Simulated(reason) => reason,
        }
    }
}
