use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::request::{RequestId, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Validation,
    NotFound,
    InvalidTransition,
    Conflict,
    Deserialization,
    Location,
    LocationPermissionDenied,
    Storage,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Conflict => "CONFLICT",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Location => "LOCATION_ERROR",
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::Storage => "STORAGE_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Location | Self::Storage => {
                ErrorSeverity::Transient
            }

            Self::Validation
            | Self::NotFound
            | Self::InvalidTransition
            | Self::Conflict
            | Self::Deserialization
            | Self::LocationPermissionDenied
            | Self::Configuration => ErrorSeverity::Permanent,
        }
    }

    /// Retry here always means a manual re-trigger; nothing retries on its own.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Location | Self::Storage
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Validation | ErrorKind::Configuration => self.message.clone(),
            ErrorKind::NotFound => {
                "This rescue request no longer exists. The list has been refreshed.".into()
            }
            ErrorKind::InvalidTransition | ErrorKind::Conflict => {
                "This rescue request has already changed. Please review it again.".into()
            }
            ErrorKind::Deserialization => {
                "The server sent data we could not read. Please try again later.".into()
            }
            ErrorKind::Location => {
                "Could not get your current location. Using default location.".into()
            }
            ErrorKind::LocationPermissionDenied => {
                "Location access is denied. Using default location.".into()
            }
            ErrorKind::Storage => "Unable to save your session on this device.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

/// Which store operation hit an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreAction {
    Accept,
    Complete,
}

impl std::fmt::Display for StoreAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Accept => "accept",
            Self::Complete => "complete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("rescue request {id} not found")]
    NotFound { id: RequestId },
    #[error("cannot {action} rescue request {id} while it is {from}")]
    InvalidTransition {
        id: RequestId,
        from: RequestStatus,
        action: StoreAction,
    },
    #[error("rescue request {id} already exists")]
    Duplicate { id: RequestId },
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        let (kind, id) = match &e {
            StoreError::NotFound { id } => (ErrorKind::NotFound, id.clone()),
            StoreError::InvalidTransition { id, .. } => (ErrorKind::InvalidTransition, id.clone()),
            StoreError::Duplicate { id } => (ErrorKind::Conflict, id.clone()),
        };
        AppError::new(kind, e.to_string()).with_context("request_id", id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("server responded with status {status}")]
    Status { status: u16 },
    #[error("response body missing")]
    EmptyBody,
    #[error("could not decode payload: {0}")]
    Decode(String),
    #[error("realtime channel failed: {0}")]
    Channel(String),
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        let kind = match &e {
            TransportError::Request(_) | TransportError::Channel(_) => ErrorKind::Network,
            TransportError::Status { status } if *status == 408 || *status == 504 => {
                ErrorKind::Timeout
            }
            TransportError::Status { .. } => ErrorKind::Network,
            TransportError::EmptyBody | TransportError::Decode(_) => ErrorKind::Deserialization,
        };
        let mut error = AppError::new(kind, e.to_string());
        // Unreachable services are transient from the user's point of view.
        error.severity = ErrorSeverity::Transient;
        error
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {reason}")]
    PositionUnavailable { reason: String },
    #[error("location request timed out")]
    Timeout,
    #[error("geolocation is not supported on this device")]
    Unsupported,
}
