//! Emulation controller.
//!
//! Owns the tag emulation backend and the credential it exposes: the
//! identity register contents, the NDEF file and the emulation on/off state.
//! Start and stop failures are counted separately; once either counter
//! reaches the configured maximum the controller returns
//! [`Error::Unrecoverable`] and refuses every later backend operation.
//!
//! # Examples
//!
//! ```
//! use tagpass_emulator::{EmulationController, EmulatorConfig};
//! use tagpass_hardware::mock::MockBackend;
//!
//! let (backend, handle) = MockBackend::new();
//! let mut controller = EmulationController::new(backend, EmulatorConfig::default()).unwrap();
//!
//! controller.set_uid(&[0xEF, 0xBE, 0xAD, 0xBA]).unwrap();
//! controller.start().unwrap();
//! assert_eq!(handle.identity().unwrap().0, vec![0xBA, 0xAD, 0xBE, 0xEF]);
//!
//! controller.stop().unwrap();
//! assert!(controller.uid().is_zeroed());
//! ```

use tagpass_core::{
    BackendOperation, EmulationState, Error, Result, SizeClass, TagPayload, UidField, UriEncoder,
    constants::MAX_UID_LEN,
};
use tagpass_hardware::{HardwareError, TagEmulationBackend};
use tracing::{debug, error, info, trace, warn};

use crate::config::{EmulatorConfig, ErrorCounterPolicy};

/// Controller for one tag emulation backend.
pub struct EmulationController<B: TagEmulationBackend> {
    backend: B,
    config: EmulatorConfig,
    encoder: UriEncoder,
    state: EmulationState,
    uid: UidField,
    payload: TagPayload,
    start_failures: u32,
    stop_failures: u32,
    /// Set once `Unrecoverable` has been returned.
    fatal: Option<(BackendOperation, u32)>,
}

impl<B: TagEmulationBackend> EmulationController<B> {
    /// Initialise the backend and expose an all-zero identity.
    ///
    /// Registers an event callback that logs tag events, writes a zeroed
    /// single-size identity and applies `config.default_uri` if set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` is invalid, or `Error::Backend`
    /// if any of the initialisation calls fail.
    pub fn new(mut backend: B, config: EmulatorConfig) -> Result<Self> {
        config.validate()?;
        debug!("Initialising emulation controller on {}", backend.name());

        backend
            .setup(Box::new(|event| debug!("Tag event: {}", event)))
            .map_err(|e| Self::one_off_failure(BackendOperation::Setup, &e))?;

        let uid = UidField::zeroed(SizeClass::Single);
        backend
            .set_identity(uid.as_bytes(), uid.size_class())
            .map_err(|e| Self::one_off_failure(BackendOperation::Identity, &e))?;

        let encoder = config.encoder();
        let mut payload = TagPayload::empty(encoder.capacity());
        if let Some(uri) = &config.default_uri {
            let encoded = encoder.encode(uri.as_bytes())?;
            backend
                .set_payload(encoded.as_bytes())
                .map_err(|e| Self::one_off_failure(BackendOperation::Payload, &e))?;
            payload = encoded;
        }

        info!("Emulation controller ready on {}", backend.name());

        Ok(Self {
            backend,
            config,
            encoder,
            state: EmulationState::Stopped,
            uid,
            payload,
            start_failures: 0,
            stop_failures: 0,
            fatal: None,
        })
    }

    /// Replace the URI served to readers.
    ///
    /// If emulation is running it is stopped, the new file is applied and
    /// emulation is restarted with the current identity. The temporary stop
    /// and the restart count towards the stop and start failure counters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` without touching anything if the URI does
    /// not fit. Backend failures propagate; if one leaves emulation stopped
    /// the identity is cleared.
    pub fn set_uri(&mut self, uri: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        let payload = self.encoder.encode(uri)?;
        trace!("Encoded URI into {} byte NDEF message", payload.message_len());

        let was_running = self.is_running();
        if was_running {
            debug!("Stopping emulation to swap the NDEF file");
            self.stop_backend()?;
        }

        let result = self.apply_payload(payload).and_then(|()| {
            if was_running {
                self.start()
            } else {
                Ok(())
            }
        });

        if result.is_err() && was_running && !self.is_running() {
            self.uid.clear();
        }
        result
    }

    /// Store a new credential. It is written to the backend on the next
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLength` if `raw` is empty, or too long under
    /// the reject policy. The stored identity is unchanged on error.
    pub fn set_uid(&mut self, raw: &[u8]) -> Result<()> {
        let uid = UidField::encode_with_policy(raw, self.config.uid_overflow)?;
        if raw.len() > MAX_UID_LEN {
            warn!(
                "Credential of {} bytes truncated to {}",
                raw.len(),
                MAX_UID_LEN
            );
        }
        trace!("Pending identity {}", uid);
        debug!("Identity updated ({})", uid.size_class());
        self.uid = uid;
        Ok(())
    }

    /// Write the identity register and enable emulation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Backend` if the identity write or the start fails,
    /// and `Error::Unrecoverable` once the start counter reaches the limit.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_usable()?;
        trace!("Writing identity {}", self.uid);

        if let Err(e) = self
            .backend
            .set_identity(self.uid.as_bytes(), self.uid.size_class())
        {
            return Err(self.record_failure(BackendOperation::Identity, &e));
        }
        if let Err(e) = self.backend.start() {
            return Err(self.record_failure(BackendOperation::Start, &e));
        }

        self.state = EmulationState::Running;
        if self.config.counter_policy == ErrorCounterPolicy::ResetOnSuccess {
            self.start_failures = 0;
        }
        info!("Tag emulation started ({})", self.uid.size_class());
        Ok(())
    }

    /// Disable emulation and zero the identity.
    ///
    /// # Errors
    ///
    /// Returns `Error::Backend` if the stop fails, and
    /// `Error::Unrecoverable` once the stop counter reaches the limit.
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.stop_backend()?;
        self.uid.clear();
        info!("Tag emulation stopped");
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> EmulationState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == EmulationState::Running
    }

    /// `true` once `Unrecoverable` has been returned.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Identity that the next start writes.
    #[must_use]
    pub fn uid(&self) -> &UidField {
        &self.uid
    }

    /// NDEF file most recently accepted by the backend.
    #[must_use]
    pub fn payload(&self) -> &TagPayload {
        &self.payload
    }

    /// Failures counted for `operation`.
    ///
    /// Identity writes count as start failures; setup and payload failures
    /// are not counted.
    #[must_use]
    pub fn failure_count(&self, operation: BackendOperation) -> u32 {
        match operation {
            BackendOperation::Start | BackendOperation::Identity => self.start_failures,
            BackendOperation::Stop => self.stop_failures,
            BackendOperation::Setup | BackendOperation::Payload => 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.fatal {
            Some((operation, failures)) => Err(Error::Unrecoverable {
                operation,
                failures,
            }),
            None => Ok(()),
        }
    }

    /// Counted backend stop that leaves the identity in place.
    fn stop_backend(&mut self) -> Result<()> {
        if let Err(e) = self.backend.stop() {
            return Err(self.record_failure(BackendOperation::Stop, &e));
        }
        self.state = EmulationState::Stopped;
        if self.config.counter_policy == ErrorCounterPolicy::ResetOnSuccess {
            self.stop_failures = 0;
        }
        Ok(())
    }

    fn apply_payload(&mut self, payload: TagPayload) -> Result<()> {
        self.backend
            .set_payload(payload.as_bytes())
            .map_err(|e| Self::one_off_failure(BackendOperation::Payload, &e))?;
        self.payload = payload;
        debug!("NDEF file updated ({} bytes)", self.payload.message_len());
        Ok(())
    }

    /// Count a start or stop failure and decide whether it is fatal.
    fn record_failure(&mut self, operation: BackendOperation, cause: &HardwareError) -> Error {
        let counter = match operation {
            BackendOperation::Stop => &mut self.stop_failures,
            _ => &mut self.start_failures,
        };
        *counter = counter.saturating_add(1);
        let failures = *counter;

        if failures >= self.config.error_max {
            error!(
                "Backend {} failed {} times, giving up: {}",
                operation, failures, cause
            );
            self.fatal = Some((operation, failures));
            return Error::Unrecoverable {
                operation,
                failures,
            };
        }

        warn!(
            "Backend {} failed ({}/{}): {}",
            operation, failures, self.config.error_max, cause
        );
        Error::backend(operation, failures, cause.to_string())
    }

    fn one_off_failure(operation: BackendOperation, cause: &HardwareError) -> Error {
        warn!("Backend {} failed: {}", operation, cause);
        Error::backend(operation, 1, cause.to_string())
    }
}

impl<B: TagEmulationBackend> std::fmt::Debug for EmulationController<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulationController")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("size_class", &self.uid.size_class())
            .field("start_failures", &self.start_failures)
            .field("stop_failures", &self.stop_failures)
            .field("fatal", &self.fatal.is_some())
            .finish()
    }
}
