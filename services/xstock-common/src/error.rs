//! Error types for the X-Stock services.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias using the X-Stock error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the screening services.
///
/// Partial failures (some codes unresolved, some funds without holdings)
/// are reported as data on the successful result, never through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing parameters
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Nothing the caller asked for could be resolved
    #[error("Not found: {0}")]
    NotFound(String),

    /// Batch size cap exceeded, rejected before any work started
    #[error("Limit exceeded: {actual} items requested, at most {limit} allowed")]
    LimitExceeded { limit: usize, actual: usize },

    /// Market data provider call failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Provider call did not finish within its deadline
    #[error("Operation timed out")]
    Timeout,

    /// The caller cancelled the request
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Check if this is a batch limit rejection.
    pub fn is_limit_exceeded(&self) -> bool {
        match self {
            Self::LimitExceeded { .. } => true,
            Self::WithContext { source, .. } => source.is_limit_exceeded(),
            _ => false,
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Timeout => 408,
            Self::LimitExceeded { .. } => 413,
            Self::Cancelled => 499,
            Self::Upstream(_) => 502,
            Self::WithContext { source, .. } => source.status_code(),
            _ => 500,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
