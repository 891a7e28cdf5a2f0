//! Error types for URI scheme registration.
//!
//! Every distinct failure condition of the registration engine has its own
//! variant. Store-level failures arrive as [`StoreError`] and are classified by
//! the engine, which knows the scope and the action that was being attempted.

use crate::scope::RegistrationScope;
use crate::store::StoreError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What the engine was doing to the store when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    Read,
    Write,
    Delete,
}

impl fmt::Display for StoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreAction::Read => "read",
            StoreAction::Write => "write",
            StoreAction::Delete => "delete",
        })
    }
}

/// Main error type for scheme registration.
#[derive(Debug, Error)]
pub enum SchemeError {
    // Input validation
    #[error("Invalid argument {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("'{scheme}' is not a valid scheme")]
    MalformedScheme { scheme: String },

    #[error("Couldn't locate file '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("Configuration error: {message}")]
    InvalidConfiguration { message: String },

    // Registration state
    #[error("Scheme '{scheme}' is already registered: {reason}")]
    AlreadyRegistered { scheme: String, reason: String },

    #[error("The scheme '{scheme}' or handler name '{handler}' doesn't exist")]
    NotRegistered { scheme: String, handler: String },

    // Store errors
    #[error(
        "Failed to {action} registry values on {}, check your permissions",
        .scope.description()
    )]
    PermissionDenied {
        action: StoreAction,
        scope: RegistrationScope,
    },

    #[error("Registry key is in use by another registration call: {message}")]
    ConcurrentAccess { message: String },

    #[error("Internal inconsistency: {message}")]
    InternalInconsistency { message: String },

    #[error("Registry store error: {message}")]
    StoreFailure {
        message: String,
        #[source]
        source: Option<StoreError>,
    },
}

/// Result type alias for scheme operations.
pub type Result<T> = std::result::Result<T, SchemeError>;

impl SchemeError {
    /// Create an invalid-argument error for a named field.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        SchemeError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Classify a store failure that happened while performing `action` in `scope`.
    ///
    /// - permission failures become [`SchemeError::PermissionDenied`]
    /// - "in use" and "deleted under an open handle" become [`SchemeError::ConcurrentAccess`]
    /// - everything else becomes [`SchemeError::StoreFailure`]
    pub fn from_store(err: StoreError, scope: RegistrationScope, action: StoreAction) -> Self {
        match err {
            StoreError::PermissionDenied { .. } => SchemeError::PermissionDenied { action, scope },
            StoreError::InUse { .. } | StoreError::KeyDeleted { .. } => {
                SchemeError::ConcurrentAccess {
                    message: format!("error while trying to {} registry values: {}", action, err),
                }
            }
            other => SchemeError::StoreFailure {
                message: other.to_string(),
                source: Some(other),
            },
        }
    }

    /// Stable numeric code for each error kind, for foreign callers and exit codes.
    pub fn to_error_code(&self) -> i32 {
        match self {
            SchemeError::InvalidArgument { .. } => 2,
            SchemeError::MalformedScheme { .. } => 3,
            SchemeError::NotFound(_) => 4,
            SchemeError::InvalidConfiguration { .. } => 5,
            SchemeError::AlreadyRegistered { .. } => 6,
            SchemeError::NotRegistered { .. } => 7,
            SchemeError::PermissionDenied { .. } => 8,
            SchemeError::ConcurrentAccess { .. } => 9,
            SchemeError::InternalInconsistency { .. } => 10,
            SchemeError::StoreFailure { .. } => 11,
        }
    }

    /// Whether repeating the same call later may succeed.
    ///
    /// The engine never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchemeError::ConcurrentAccess { .. })
    }
}
