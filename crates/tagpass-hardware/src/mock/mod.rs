//! Mock collaborator implementations for testing and development.
//!
//! This module provides a simulated emulation backend and a simulated
//! scheduler that can be controlled programmatically without a radio or a
//! real clock.

pub mod backend;
pub mod scheduler;

// Re-export commonly used types
pub use backend::{BackendCall, MockBackend, MockBackendHandle};
pub use scheduler::{SimulatedClock, SimulatedScheduler};
