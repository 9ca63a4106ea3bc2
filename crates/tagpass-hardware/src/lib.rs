//! Collaborator abstraction layer for tag presentation.
//!
//! This crate provides the trait seams between the presentation core and
//! the platform it runs on, plus simulated implementations that make the
//! core drivable in tests without a radio or a real clock.
//!
//! # Collaborators
//!
//! ## Tag Emulation Backend
//!
//! The [`TagEmulationBackend`] trait represents the NFC Type 4 Tag stack:
//!
//! ```no_run
//! use tagpass_core::SizeClass;
//! use tagpass_hardware::traits::TagEmulationBackend;
//! use tagpass_hardware::error::Result;
//!
//! fn restart<B: TagEmulationBackend>(backend: &mut B, uid: &[u8]) -> Result<()> {
//!     backend.stop()?;
//!     // The identity register is lost on stop.
//!     backend.set_identity(uid, SizeClass::Single)?;
//!     backend.start()
//! }
//! ```
//!
//! ## Scheduler
//!
//! The [`Scheduler`] trait represents a one-shot timer facility whose
//! expiries are reported back as messages:
//!
//! ```
//! use std::time::Duration;
//! use tagpass_core::TimerToken;
//! use tagpass_hardware::mock::SimulatedScheduler;
//! use tagpass_hardware::traits::Scheduler;
//!
//! let (mut scheduler, clock) = SimulatedScheduler::new();
//! scheduler.schedule_once(Duration::from_millis(250), TimerToken::AutoStop);
//!
//! let fired = clock.advance(Duration::from_millis(250));
//! assert_eq!(fired[0].token, TimerToken::AutoStop);
//! ```
//!
//! # Error Handling
//!
//! All backend operations return [`Result<T>`][error::Result] which uses the
//! [`HardwareError`] error type.
//!
//! # Mock Implementations
//!
//! The [`mock`] module provides [`MockBackend`](mock::MockBackend) with
//! failure injection and a call log, and
//! [`SimulatedScheduler`](mock::SimulatedScheduler) with a manually
//! advanced clock.
//!
//! [`TagEmulationBackend`]: traits::TagEmulationBackend
//! [`Scheduler`]: traits::Scheduler

pub mod error;
pub mod mock;
pub mod traits;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{EventCallback, Scheduler, TagEmulationBackend, TagEvent};
