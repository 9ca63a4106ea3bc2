//! Tag presentation engine.
//!
//! This crate drives a [`TagEmulationBackend`](tagpass_hardware::TagEmulationBackend)
//! to expose a credential as an NFC Type 4 Tag: the [`EmulationController`]
//! owns the backend and its failure counters, the [`Presenter`] runs timed
//! presentation sessions on a [`Scheduler`](tagpass_hardware::Scheduler),
//! and [`TagService`] hosts a presenter on the tokio runtime.

pub mod config;
pub mod controller;
pub mod presenter;
pub mod service;
pub mod state_machine;

pub use config::{EmulatorConfig, ErrorCounterPolicy};
pub use controller::EmulationController;
pub use presenter::Presenter;
pub use service::{ServiceError, ServiceStatus, TagService, TagServiceHandle, TokioScheduler};
pub use state_machine::{PresentationState, SessionMachine, StateTransition};
