//! Driver status codes and the error type every driver primitive returns.

use std::fmt;
use thiserror::Error;

/// Status codes of the PRE driver.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    TableFull = -8,
    ObjectInUse = -9,
    InvalidHandle = -10,
    InvalidPort = -11,
    InvalidDevice = -12,
    SessionBusy = -13,
    HwCommFailure = -14,
}

impl fmt::Display for PreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PreStatus::Success => "PRE_STATUS_SUCCESS",
            PreStatus::Failure => "PRE_STATUS_FAILURE",
            PreStatus::NotSupported => "PRE_STATUS_NOT_SUPPORTED",
            PreStatus::NoMemory => "PRE_STATUS_NO_MEMORY",
            PreStatus::InsufficientResources => "PRE_STATUS_INSUFFICIENT_RESOURCES",
            PreStatus::InvalidParameter => "PRE_STATUS_INVALID_PARAMETER",
            PreStatus::ItemAlreadyExists => "PRE_STATUS_ITEM_ALREADY_EXISTS",
            PreStatus::ItemNotFound => "PRE_STATUS_ITEM_NOT_FOUND",
            PreStatus::TableFull => "PRE_STATUS_TABLE_FULL",
            PreStatus::ObjectInUse => "PRE_STATUS_OBJECT_IN_USE",
            PreStatus::InvalidHandle => "PRE_STATUS_INVALID_HANDLE",
            PreStatus::InvalidPort => "PRE_STATUS_INVALID_PORT",
            PreStatus::InvalidDevice => "PRE_STATUS_INVALID_DEVICE",
            PreStatus::SessionBusy => "PRE_STATUS_SESSION_BUSY",
            PreStatus::HwCommFailure => "PRE_STATUS_HW_COMM_FAILURE",
        };
        write!(f, "{}", s)
    }
}

/// Error type for driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Driver returned an error status with no more specific mapping.
    #[error("PRE driver call failed: {status}")]
    Status { status: PreStatus },

    /// The requested object or member does not exist.
    #[error("Item not found: {item}")]
    NotFound { item: String },

    /// The object or association already exists.
    #[error("Item already exists: {item}")]
    AlreadyExists { item: String },

    /// Invalid parameter passed to the driver.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The primitive is not supported by this driver.
    #[error("Feature not supported: {feature}")]
    NotSupported { feature: String },

    /// Hardware or driver memory is exhausted.
    #[error("Out of resources: {resource}")]
    NoResources { resource: String },

    /// Object is still referenced and cannot be destroyed.
    #[error("Object in use: {object}")]
    ObjectInUse { object: String },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DriverError {
    /// Creates an error from a driver status code.
    pub fn from_status(status: PreStatus) -> Self {
        match status {
            PreStatus::Success => DriverError::Internal {
                message: "from_status called with success status".to_string(),
            },
            PreStatus::NotSupported => DriverError::NotSupported {
                feature: "unknown".to_string(),
            },
            PreStatus::InvalidParameter
            | PreStatus::InvalidHandle
            | PreStatus::InvalidPort
            | PreStatus::InvalidDevice => DriverError::InvalidParameter {
                message: format!("driver returned {}", status),
            },
            PreStatus::ItemNotFound => DriverError::NotFound {
                item: "unknown".to_string(),
            },
            PreStatus::ItemAlreadyExists => DriverError::AlreadyExists {
                item: "unknown".to_string(),
            },
            PreStatus::NoMemory | PreStatus::InsufficientResources | PreStatus::TableFull => {
                DriverError::NoResources {
                    resource: status.to_string(),
                }
            }
            PreStatus::ObjectInUse => DriverError::ObjectInUse {
                object: "unknown".to_string(),
            },
            _ => DriverError::Status { status },
        }
    }

    /// Creates a not found error with an item description.
    pub fn not_found(item: impl Into<String>) -> Self {
        DriverError::NotFound { item: item.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(item: impl Into<String>) -> Self {
        DriverError::AlreadyExists { item: item.into() }
    }

    /// Creates an invalid parameter error with a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        DriverError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates a not supported error with a feature description.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        DriverError::NotSupported {
            feature: feature.into(),
        }
    }

    /// Creates an object in use error.
    pub fn object_in_use(object: impl Into<String>) -> Self {
        DriverError::ObjectInUse {
            object: object.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        DriverError::Internal {
            message: message.into(),
        }
    }

    /// Returns the status code that best describes this error.
    pub fn status(&self) -> PreStatus {
        match self {
            DriverError::Status { status } => *status,
            DriverError::NotFound { .. } => PreStatus::ItemNotFound,
            DriverError::AlreadyExists { .. } => PreStatus::ItemAlreadyExists,
            DriverError::InvalidParameter { .. } => PreStatus::InvalidParameter,
            DriverError::NotSupported { .. } => PreStatus::NotSupported,
            DriverError::NoResources { .. } => PreStatus::InsufficientResources,
            DriverError::ObjectInUse { .. } => PreStatus::ObjectInUse,
            DriverError::Internal { .. } => PreStatus::Failure,
        }
    }

    /// Returns true for the "no such object / no more members" class.
    ///
    /// Iteration primitives use this to report an empty member list.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound { .. })
    }

    /// Returns true if the failure is a resource exhaustion.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, DriverError::NoResources { .. })
    }
}

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
