use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend operation that an error or failure counter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOperation {
    /// Registering the event callback with the emulation stack.
    Setup,
    /// Writing the identity register.
    Identity,
    /// Handing the record buffer to the emulation stack.
    Payload,
    /// Enabling tag emulation.
    Start,
    /// Disabling tag emulation.
    Stop,
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendOperation::Setup => "setup",
            BackendOperation::Identity => "set_identity",
            BackendOperation::Payload => "set_payload",
            BackendOperation::Start => "start",
            BackendOperation::Stop => "stop",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Credential preparation errors
    #[error("Invalid UID length: {len} bytes (expected 1-{max})")]
    InvalidLength { len: usize, max: usize },

    #[error("URI record needs {required} bytes but the payload buffer holds {capacity}")]
    Encoding { required: usize, capacity: usize },

    // Emulation errors
    #[error("Backend {operation} failed ({failures} consecutive): {reason}")]
    Backend {
        operation: BackendOperation,
        failures: u32,
        reason: String,
    },

    #[error("Tag presentation already pending (state: {state})")]
    Busy { state: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Backend {operation} failed {failures} consecutive times, emulation cannot be trusted")]
    Unrecoverable {
        operation: BackendOperation,
        failures: u32,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for the only condition that should abort the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Unrecoverable { .. })
    }

    /// Create a backend error for the given operation.
    pub fn backend(operation: BackendOperation, failures: u32, reason: impl Into<String>) -> Self {
        Error::Backend {
            operation,
            failures,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
