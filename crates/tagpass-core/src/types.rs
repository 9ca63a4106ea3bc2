use crate::constants::{UID_DOUBLE_LEN, UID_SINGLE_LEN, UID_TRIPLE_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity register size class (ISO/IEC 14443-3 UID size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SizeClass {
    Single = 4,
    Double = 7,
    Triple = 10,
}

impl SizeClass {
    /// Smallest size class that holds `len` credential bytes.
    ///
    /// Returns `None` when `len` exceeds the triple size.
    ///
    /// # Examples
    /// ```
    /// use tagpass_core::SizeClass;
    ///
    /// assert_eq!(SizeClass::for_len(4), Some(SizeClass::Single));
    /// assert_eq!(SizeClass::for_len(5), Some(SizeClass::Double));
    /// assert_eq!(SizeClass::for_len(11), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn for_len(len: usize) -> Option<Self> {
        match len {
            0..=UID_SINGLE_LEN => Some(SizeClass::Single),
            n if n <= UID_DOUBLE_LEN => Some(SizeClass::Double),
            n if n <= UID_TRIPLE_LEN => Some(SizeClass::Triple),
            _ => None,
        }
    }

    /// Length of the identity register for this class, in bytes.
    #[inline]
    #[must_use]
    pub fn byte_len(self) -> usize {
        self as usize
    }

    /// Number of anticollision cascade levels a reader runs for this class.
    #[inline]
    #[must_use]
    pub fn cascade_levels(self) -> u8 {
        match self {
            SizeClass::Single => 1,
            SizeClass::Double => 2,
            SizeClass::Triple => 3,
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SizeClass::Single => write!(f, "Single(4)"),
            SizeClass::Double => write!(f, "Double(7)"),
            SizeClass::Triple => write!(f, "Triple(10)"),
        }
    }
}

/// What the UID codec does with a credential longer than the triple size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UidOverflowPolicy {
    /// Fail with `Error::InvalidLength`.
    #[default]
    Reject,
    /// Keep the leading ten bytes and drop the rest.
    Truncate,
}

/// Emulation on/off state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmulationState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for EmulationState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmulationState::Stopped => write!(f, "Stopped"),
            EmulationState::Running => write!(f, "Running"),
        }
    }
}

/// Meaning of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerToken {
    /// End of the exposure window: emulation must stop.
    AutoStop,
    /// End of the dead time after an exposure window.
    CooldownComplete,
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimerToken::AutoStop => write!(f, "AutoStop"),
            TimerToken::CooldownComplete => write!(f, "CooldownComplete"),
        }
    }
}

/// Opaque identifier of one scheduled timer.
///
/// Handles are never reused by a scheduler, so a handle identifies a single
/// scheduling even after the timer fired or was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        TimerHandle(id)
    }

    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Message delivered to the presentation scheduler when a timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerFired {
    pub handle: TimerHandle,
    pub token: TimerToken,
}
