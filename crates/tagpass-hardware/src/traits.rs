//! Collaborator trait definitions.
//!
//! This module defines the two seams between the presentation core and the
//! platform: the tag emulation backend that owns the radio, and the timer
//! facility that delivers scheduled callbacks. Both are synchronous. Backend
//! calls are register writes that return immediately, and timer expiry is
//! reported back to the core as a [`TimerFired`] message rather than by
//! invoking core code from inside the scheduler.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagpass_core::{SizeClass, TimerHandle, TimerToken};

use crate::error::Result;

/// Tag interaction reported by the emulation stack.
///
/// The core does not act on these; they are only logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TagEvent {
    /// A reader field was detected.
    FieldOn,

    /// The reader field went away.
    FieldOff,

    /// A reader read the NDEF file.
    NdefRead,

    /// A reader wrote `len` bytes to the NDEF file.
    NdefUpdated { len: usize },

    /// Event code the backend does not classify.
    Other(u32),
}

impl fmt::Display for TagEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldOn => write!(f, "FieldOn"),
            Self::FieldOff => write!(f, "FieldOff"),
            Self::NdefRead => write!(f, "NdefRead"),
            Self::NdefUpdated { len } => write!(f, "NdefUpdated({len} bytes)"),
            Self::Other(code) => write!(f, "Other({code})"),
        }
    }
}

/// Callback the backend invokes for every [`TagEvent`].
pub type EventCallback = Box<dyn FnMut(TagEvent) + Send>;

/// NFC Type 4 Tag emulation backend.
///
/// Represents the RF stack that answers reader anticollision with the
/// identity register and serves the NDEF file from the payload buffer.
///
/// # Identity register
///
/// The identity register does not survive a stop. Callers must write it
/// with [`set_identity`](TagEmulationBackend::set_identity) before every
/// [`start`](TagEmulationBackend::start).
///
/// # Examples
///
/// ```
/// use tagpass_core::SizeClass;
/// use tagpass_hardware::error::Result;
/// use tagpass_hardware::traits::TagEmulationBackend;
///
/// fn expose<B: TagEmulationBackend>(backend: &mut B, uid: &[u8], record: &[u8]) -> Result<()> {
///     backend.set_payload(record)?;
///     backend.set_identity(uid, SizeClass::Single)?;
///     backend.start()
/// }
/// ```
pub trait TagEmulationBackend: Send {
    /// Register the event callback. Must be called once, before anything else.
    ///
    /// # Errors
    ///
    /// Returns an error if the emulation stack cannot be initialised.
    fn setup(&mut self, callback: EventCallback) -> Result<()>;

    /// Enable tag emulation.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack refuses to start, for instance because
    /// emulation is already running.
    fn start(&mut self) -> Result<()>;

    /// Disable tag emulation.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack refuses to stop.
    fn stop(&mut self) -> Result<()>;

    /// Write the identity register.
    ///
    /// `uid` is exactly `size_class.byte_len()` bytes, already in register order.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack rejects the identity.
    fn set_identity(&mut self, uid: &[u8], size_class: SizeClass) -> Result<()>;

    /// Replace the NDEF file served to readers.
    ///
    /// `buffer` is the whole fixed-capacity buffer; the stack reads the
    /// message length from its NLEN prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack rejects the buffer.
    fn set_payload(&mut self, buffer: &[u8]) -> Result<()>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str {
        "tag emulation backend"
    }
}

impl<B: TagEmulationBackend + ?Sized> TagEmulationBackend for Box<B> {
    fn setup(&mut self, callback: EventCallback) -> Result<()> {
        (**self).setup(callback)
    }

    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn set_identity(&mut self, uid: &[u8], size_class: SizeClass) -> Result<()> {
        (**self).set_identity(uid, size_class)
    }

    fn set_payload(&mut self, buffer: &[u8]) -> Result<()> {
        (**self).set_payload(buffer)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One-shot timer facility.
///
/// Expired timers are not executed by the scheduler. The owner of the
/// scheduler receives a [`TimerFired`](tagpass_core::TimerFired) message
/// carrying the handle and token, and feeds it back into the core.
///
/// Implementations must never reuse a handle.
pub trait Scheduler {
    /// Arm a timer that expires after `delay`.
    fn schedule_once(&mut self, delay: Duration, token: TimerToken) -> TimerHandle;

    /// `true` while the timer is armed and has not yet been delivered.
    fn is_pending(&self, handle: TimerHandle) -> bool;

    /// Disarm a timer. Unknown or expired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

impl<S: Scheduler + ?Sized> Scheduler for Box<S> {
    fn schedule_once(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        (**self).schedule_once(delay, token)
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        (**self).is_pending(handle)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        (**self).cancel(handle)
    }
}
