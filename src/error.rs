//! Error types for the dpsync reconciliation system.
//!
//! The hierarchy mirrors the propagation policy of a device batch:
//! controller-level failures ([`ControllerError`] except `Request`, and
//! [`LockError`]) abort the remaining batch for a device, while item-level
//! failures ([`ItemError`] and `ControllerError::Request`) are recorded
//! against a single descriptor and the batch moves on.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dpsync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors talking to the management controller.
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// Errors scoped to a single resource item.
    #[error("{0}")]
    Item(#[from] ItemError),

    /// Device configuration lock errors.
    #[error("Device lock error: {0}")]
    Lock(#[from] LockError),

    /// Session cache storage errors.
    #[error("Session store error: {0}")]
    Session(#[from] SessionStoreError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The desired-state file was not found.
    #[error("Desired-state file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The desired-state file could not be parsed.
    #[error("Failed to parse desired-state file: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A controller setting is missing or malformed.
    #[error("Invalid controller setting '{field}': {message}")]
    InvalidSetting {
        /// Setting that failed validation.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// The desired-state file is well-formed but not valid.
    #[error("Validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
        /// Path of the offending entry, if known.
        field: Option<String>,
    },

    /// Unknown resource type tag.
    #[error("Unknown resource type: {tag}")]
    UnknownResourceType {
        /// The tag as written by the caller.
        tag: String,
    },
}

/// Errors raised by the session-cached controller client.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Login was rejected, or the session expired again right after re-authentication.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Description of the auth failure.
        message: String,
    },

    /// Network or timeout failure.
    #[error("Connection to controller failed: {message}")]
    Connection {
        /// Description of the network error.
        message: String,
    },

    /// The controller answered with a body that is not the JSON we expect.
    #[error("Malformed controller response: {message}")]
    Protocol {
        /// Description of the response issue.
        message: String,
    },

    /// The controller rejected a specific call.
    #[error("Controller rejected request ({status}): {message}")]
    Request {
        /// HTTP status code.
        status: u16,
        /// Message reported by the controller.
        message: String,
    },
}

/// Errors scoped to one descriptor in a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// A destroy was blocked because a container still references the member.
    #[error("'{member}' is still referenced by {containers:?}")]
    DependencyConflict {
        /// Member that was asked to be destroyed.
        member: String,
        /// Containers still listing the member.
        containers: Vec<String>,
    },

    /// A follow-up call was skipped because the call creating the row failed.
    #[error("'{key}' left incomplete because its create failed")]
    Incomplete {
        /// Resource key.
        key: String,
    },

    /// The addressed resource does not exist on the device.
    #[error("{kind} '{key}' not found on device {device}")]
    ResourceNotFound {
        /// Resource type tag.
        kind: String,
        /// Natural key that failed to resolve.
        key: String,
        /// Device address.
        device: String,
    },

    /// The descriptor is malformed.
    #[error("Invalid descriptor: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
        /// Field that failed validation, if known.
        field: Option<String>,
    },
}

/// Device configuration lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// The controller refused the lock (typically held by another session).
    #[error("Could not lock device {device} after {attempts} attempt(s): {message}")]
    AcquireFailed {
        /// Device address.
        device: String,
        /// Attempts made.
        attempts: u32,
        /// Last failure reported.
        message: String,
    },

    /// The unlock call failed after the locked work completed.
    #[error("Could not release lock on device {device}: {message}")]
    ReleaseFailed {
        /// Device address.
        device: String,
        /// Failure reported.
        message: String,
    },

    /// An operation that needs the device lock was called without it.
    #[error("Device {device} is not locked")]
    NotHeld {
        /// Device address.
        device: String,
    },
}

/// Session cache storage errors.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// A stored session could not be read back.
    #[error("Session entry is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A session could not be written.
    #[error("Failed to persist session: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for dpsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error must abort the remaining batch for a device.
    ///
    /// Item-scoped failures, including a controller rejection of one call,
    /// are not fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Item(_) | Self::Controller(ControllerError::Request { .. })
        )
    }

    /// Returns true if the controller reported an expired or invalid session.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Controller(ControllerError::Authentication { .. }))
    }
}

impl ControllerError {
    /// Creates a request error.
    #[must_use]
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }
}

impl ItemError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }
}

impl ConfigError {
    /// Creates an invalid-setting error.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            message: message.into(),
        }
    }
}
