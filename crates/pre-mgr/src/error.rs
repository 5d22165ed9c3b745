//! Error taxonomy of the resource manager.

use pre_driver::{DriverError, DriverResult, RawHandle};
use thiserror::Error;

use crate::types::ObjectId;

/// Error returned by every manager and table operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreError {
    #[error("Already exists: {what}")]
    AlreadyExists { what: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Invalid argument: {message}")]
    InvalidArg { message: String },

    #[error("Operation not supported: {operation}")]
    NotSupported { operation: String },

    /// Internal state is inconsistent with the hardware layer.
    #[error("Unexpected state: {message}")]
    Unexpected { message: String },

    #[error("Out of resources: {message}")]
    NoResources { message: String },

    /// A driver call failed with a status outside the taxonomy above.
    #[error("Driver call {operation} failed: {source}")]
    Driver {
        operation: &'static str,
        #[source]
        source: DriverError,
    },
}

/// Coarse classification of a [`PreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreErrorKind {
    AlreadyExists,
    NotFound,
    InvalidArg,
    NotSupported,
    Unexpected,
    NoResources,
    Driver,
}

impl PreError {
    pub fn already_exists(what: impl Into<String>) -> Self {
        PreError::AlreadyExists { what: what.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        PreError::NotFound { what: what.into() }
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        PreError::InvalidArg {
            message: message.into(),
        }
    }

    pub fn not_supported(operation: impl Into<String>) -> Self {
        PreError::NotSupported {
            operation: operation.into(),
        }
    }

    /// Creates an Unexpected error and logs it at error level.
    pub fn unexpected(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(message = %message, "PRE state inconsistency");
        PreError::Unexpected { message }
    }

    /// Wraps a failed driver call. Resource exhaustion maps to NoResources.
    pub fn driver(operation: &'static str, source: DriverError) -> Self {
        if source.is_resource_exhausted() {
            PreError::NoResources {
                message: format!("{}: {}", operation, source),
            }
        } else {
            PreError::Driver { operation, source }
        }
    }

    pub fn kind(&self) -> PreErrorKind {
        match self {
            PreError::AlreadyExists { .. } => PreErrorKind::AlreadyExists,
            PreError::NotFound { .. } => PreErrorKind::NotFound,
            PreError::InvalidArg { .. } => PreErrorKind::InvalidArg,
            PreError::NotSupported { .. } => PreErrorKind::NotSupported,
            PreError::Unexpected { .. } => PreErrorKind::Unexpected,
            PreError::NoResources { .. } => PreErrorKind::NoResources,
            PreError::Driver { .. } => PreErrorKind::Driver,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == PreErrorKind::NotFound
    }
}

/// Result type for manager operations.
pub type PreResult<T> = Result<T, PreError>;

/// Attaches the driver operation name to a driver result.
pub trait DriverResultExt<T> {
    fn during(self, operation: &'static str) -> PreResult<T>;
}

impl<T> DriverResultExt<T> for DriverResult<T> {
    fn during(self, operation: &'static str) -> PreResult<T> {
        self.map_err(|e| PreError::driver(operation, e))
    }
}

/// Error type for Directory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("id {0} is already mapped")]
    IdExists(ObjectId),

    #[error("handle {0:#x} is already mapped")]
    HandleExists(RawHandle),

    #[error("id {0} is not mapped")]
    IdNotFound(ObjectId),

    #[error("handle {0:#x} is not mapped")]
    HandleNotFound(RawHandle),
}

impl From<DirectoryError> for PreError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::IdExists(_) | DirectoryError::HandleExists(_) => {
                PreError::already_exists(err.to_string())
            }
            DirectoryError::IdNotFound(_) | DirectoryError::HandleNotFound(_) => {
                PreError::not_found(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pre_driver::PreStatus;

    #[test]
    fn test_resource_exhaustion_maps_to_no_resources() {
        let err = PreError::driver("node_create", DriverError::from_status(PreStatus::TableFull));
        assert_eq!(err.kind(), PreErrorKind::NoResources);

        let err = PreError::driver("node_create", DriverError::from_status(PreStatus::NoMemory));
        assert_eq!(err.kind(), PreErrorKind::NoResources);
    }

    #[test]
    fn test_other_driver_errors_keep_source() {
        let err = PreError::driver(
            "mgrp_destroy",
            DriverError::from_status(PreStatus::HwCommFailure),
        );
        match err {
            PreError::Driver { operation, source } => {
                assert_eq!(operation, "mgrp_destroy");
                assert_eq!(source.status(), PreStatus::HwCommFailure);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_directory_error_conversion() {
        assert_eq!(
            PreError::from(DirectoryError::IdExists(3)).kind(),
            PreErrorKind::AlreadyExists
        );
        assert!(PreError::from(DirectoryError::HandleNotFound(0x10)).is_not_found());
    }

    #[test]
    fn test_during() {
        let res: DriverResult<()> = Err(DriverError::not_found("x"));
        let err = res.during("ecmp_get_first_member").unwrap_err();
        assert_eq!(err.kind(), PreErrorKind::Driver);
        assert!(err.to_string().contains("ecmp_get_first_member"));
    }
}
