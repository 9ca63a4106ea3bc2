//! Mock tag emulation backend for testing and development.
//!
//! This module provides a simulated Type 4 Tag stack that records every call
//! it receives and can be told to fail upcoming calls, so the presentation
//! core can be exercised without a radio.

use crate::{
    HardwareError, Result,
    traits::{EventCallback, TagEmulationBackend, TagEvent},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tagpass_core::SizeClass;

/// Call received by a [`MockBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Setup,
    SetIdentity { uid: Vec<u8>, size_class: SizeClass },
    SetPayload { len: usize },
    Start,
    Stop,
}

#[derive(Default)]
struct MockState {
    name: String,
    calls: Vec<BackendCall>,
    running: bool,
    identity: Option<(Vec<u8>, SizeClass)>,
    payload: Option<Vec<u8>>,
    callback: Option<EventCallback>,
    fail_setup: bool,
    start_failures: u32,
    stop_failures: u32,
    identity_failures: u32,
    payload_failures: u32,
}

/// Mock tag emulation backend.
///
/// Returned together with a [`MockBackendHandle`] that shares its state.
/// The backend is handed to the controller; the handle stays with the test.
///
/// Like the real stack, the mock forgets the identity register whenever
/// emulation stops.
///
/// # Examples
///
/// ```
/// use tagpass_core::SizeClass;
/// use tagpass_hardware::mock::{BackendCall, MockBackend};
/// use tagpass_hardware::traits::TagEmulationBackend;
///
/// let (mut backend, handle) = MockBackend::new();
///
/// backend.set_identity(&[0x01, 0x02, 0x03, 0x04], SizeClass::Single).unwrap();
/// backend.start().unwrap();
/// assert!(handle.is_running());
///
/// handle.fail_next_stops(1);
/// assert!(backend.stop().is_err());
/// assert!(handle.is_running());
///
/// assert_eq!(handle.count(|call| matches!(call, BackendCall::Stop)), 1);
/// ```
pub struct MockBackend {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new mock backend with the default name.
    pub fn new() -> (Self, MockBackendHandle) {
        Self::with_name("Mock T4T Backend".to_string())
    }

    /// Create a new mock backend with a custom name.
    pub fn with_name(name: String) -> (Self, MockBackendHandle) {
        let state = Arc::new(Mutex::new(MockState {
            name: name.clone(),
            ..MockState::default()
        }));

        let backend = Self {
            name,
            state: Arc::clone(&state),
        };
        let handle = MockBackendHandle { state };

        (backend, handle)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("name", &self.name)
            .field("running", &self.lock().running)
            .finish()
    }
}

/// Consume one pending failure, if any.
fn take_failure(remaining: &mut u32) -> bool {
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

impl TagEmulationBackend for MockBackend {
    fn setup(&mut self, callback: EventCallback) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Setup);
        if state.fail_setup {
            return Err(HardwareError::initialization_failed("injected setup failure"));
        }
        state.callback = Some(callback);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Start);
        if take_failure(&mut state.start_failures) {
            return Err(HardwareError::rejected(3, "injected start failure"));
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Stop);
        if take_failure(&mut state.stop_failures) {
            return Err(HardwareError::rejected(3, "injected stop failure"));
        }
        state.running = false;
        state.identity = None;
        Ok(())
    }

    fn set_identity(&mut self, uid: &[u8], size_class: SizeClass) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::SetIdentity {
            uid: uid.to_vec(),
            size_class,
        });
        if take_failure(&mut state.identity_failures) {
            return Err(HardwareError::invalid_data("injected identity failure"));
        }
        if uid.len() != size_class.byte_len() {
            return Err(HardwareError::invalid_data(format!(
                "identity is {} bytes, {} expects {}",
                uid.len(),
                size_class,
                size_class.byte_len()
            )));
        }
        state.identity = Some((uid.to_vec(), size_class));
        Ok(())
    }

    fn set_payload(&mut self, buffer: &[u8]) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::SetPayload { len: buffer.len() });
        if take_failure(&mut state.payload_failures) {
            return Err(HardwareError::invalid_data("injected payload failure"));
        }
        state.payload = Some(buffer.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for controlling and inspecting a [`MockBackend`].
#[derive(Clone)]
pub struct MockBackendHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockBackendHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` calls to `start` fail.
    pub fn fail_next_starts(&self, count: u32) {
        self.lock().start_failures = count;
    }

    /// Make the next `count` calls to `stop` fail.
    pub fn fail_next_stops(&self, count: u32) {
        self.lock().stop_failures = count;
    }

    /// Make the next `count` calls to `set_identity` fail.
    pub fn fail_next_identities(&self, count: u32) {
        self.lock().identity_failures = count;
    }

    /// Make the next `count` calls to `set_payload` fail.
    pub fn fail_next_payloads(&self, count: u32) {
        self.lock().payload_failures = count;
    }

    /// Make `setup` fail.
    pub fn fail_setup(&self) {
        self.lock().fail_setup = true;
    }

    /// Whether emulation is currently enabled.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Current identity register contents, `None` after a stop.
    pub fn identity(&self) -> Option<(Vec<u8>, SizeClass)> {
        self.lock().identity.clone()
    }

    /// Last payload buffer accepted.
    pub fn payload(&self) -> Option<Vec<u8>> {
        self.lock().payload.clone()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Deliver an event to the registered callback.
    ///
    /// Returns `false` if `setup` has not registered a callback yet.
    pub fn emit_event(&self, event: TagEvent) -> bool {
        // Released before invoking so the callback may inspect the handle.
        let callback = self.lock().callback.take();
        let Some(mut callback) = callback else {
            return false;
        };
        callback(event);
        self.lock().callback = Some(callback);
        true
    }

    /// Get the backend name.
    pub fn name(&self) -> String {
        self.lock().name.clone()
    }
}

impl std::fmt::Debug for MockBackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackendHandle")
            .field("name", &self.name())
            .finish()
    }
}
