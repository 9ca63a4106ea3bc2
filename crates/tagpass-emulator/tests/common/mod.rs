//! Common test utilities for integration tests.
//!
//! Builds presenters wired to the mock backend and the simulated clock, and
//! drives the clock while feeding every expiry back into the presenter.

#![allow(dead_code)]

use std::time::Duration;

use tagpass_core::Result;
use tagpass_emulator::{EmulationController, EmulatorConfig, Presenter};
use tagpass_hardware::mock::{
    BackendCall, MockBackend, MockBackendHandle, SimulatedClock, SimulatedScheduler,
};

pub type TestPresenter = Presenter<MockBackend, SimulatedScheduler>;

/// Test rig: the presenter plus the handles that observe and drive it.
pub struct Rig {
    pub presenter: TestPresenter,
    pub backend: MockBackendHandle,
    pub clock: SimulatedClock,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(EmulatorConfig::default())
    }

    pub fn with_config(config: EmulatorConfig) -> Self {
        let (backend, handle) = MockBackend::new();
        let (scheduler, clock) = SimulatedScheduler::new();
        let controller = EmulationController::new(backend, config).expect("controller init");
        handle.clear_calls();
        Self {
            presenter: Presenter::new(controller, scheduler),
            backend: handle,
            clock,
        }
    }

    /// Advance simulated time, delivering each expiry in order.
    pub fn advance_ms(&mut self, ms: u64) -> Vec<Result<()>> {
        self.clock
            .advance(Duration::from_millis(ms))
            .into_iter()
            .map(|fired| self.presenter.handle_timer(fired))
            .collect()
    }

    pub fn stop_count(&self) -> usize {
        self.backend.count(|call| *call == BackendCall::Stop)
    }

    pub fn start_count(&self) -> usize {
        self.backend.count(|call| *call == BackendCall::Start)
    }
}

/// Credential of `len` bytes counting up from 1.
pub fn credential(len: usize) -> Vec<u8> {
    (1..=len).map(|b| b as u8).collect()
}
