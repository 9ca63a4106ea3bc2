//! Error types for collaborator operations.
//!
//! This module defines the errors a tag emulation backend reports: status
//! codes returned by the underlying stack, parameters it refused and setup
//! failures.

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during tag emulation backend operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Stack returned a non-success status code.
    #[error("Operation rejected with status {code}: {message}")]
    Rejected { code: i32, message: String },

    /// Parameter rejected by the stack (identity or payload).
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Backend setup failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },
}

impl HardwareError {
    /// Create a new rejected-status error.
    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_error() {
        let error = HardwareError::rejected(8, "NRF_ERROR_INVALID_STATE");
        assert!(matches!(error, HardwareError::Rejected { code: 8, .. }));
        assert_eq!(
            error.to_string(),
            "Operation rejected with status 8: NRF_ERROR_INVALID_STATE"
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            HardwareError::invalid_data("identity too long").to_string(),
            "Invalid data: identity too long"
        );
        assert_eq!(
            HardwareError::initialization_failed("no clock").to_string(),
            "Initialization failed: no clock"
        );
    }
}
