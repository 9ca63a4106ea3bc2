//! Simulated one-shot scheduler with a manually advanced clock.
//!
//! Time only moves when a test calls [`SimulatedClock::advance`] or
//! [`SimulatedClock::fire_next`]. Expired timers come back as
//! [`TimerFired`] messages in expiry order; timers with the same expiry come
//! back in the order they were scheduled.

use crate::traits::Scheduler;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tagpass_core::{TimerFired, TimerHandle, TimerToken};

#[derive(Debug, Default)]
struct ClockState {
    now: Duration,
    next_id: u64,
    scheduled_total: usize,
    /// Keyed by (expiry, handle); handles grow monotonically so ties keep
    /// scheduling order.
    pending: BTreeMap<(Duration, TimerHandle), TimerToken>,
}

impl ClockState {
    fn pop_due(&mut self, deadline: Duration) -> Option<(Duration, TimerFired)> {
        let (&(expiry, handle), _) = self.pending.first_key_value()?;
        if expiry > deadline {
            return None;
        }
        let token = self.pending.remove(&(expiry, handle))?;
        Some((expiry, TimerFired { handle, token }))
    }
}

/// Scheduler half, handed to the presentation scheduler.
#[derive(Debug)]
pub struct SimulatedScheduler {
    state: Arc<Mutex<ClockState>>,
}

impl SimulatedScheduler {
    /// Create a scheduler at time zero and the clock that drives it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tagpass_core::TimerToken;
    /// use tagpass_hardware::mock::SimulatedScheduler;
    /// use tagpass_hardware::traits::Scheduler;
    ///
    /// let (mut scheduler, clock) = SimulatedScheduler::new();
    /// let handle = scheduler.schedule_once(Duration::from_millis(100), TimerToken::AutoStop);
    ///
    /// assert!(clock.advance(Duration::from_millis(99)).is_empty());
    /// let fired = clock.advance(Duration::from_millis(1));
    /// assert_eq!(fired.len(), 1);
    /// assert_eq!(fired[0].handle, handle);
    /// assert!(!scheduler.is_pending(handle));
    /// ```
    pub fn new() -> (Self, SimulatedClock) {
        let state = Arc::new(Mutex::new(ClockState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedClock { state },
        )
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for SimulatedScheduler {
    fn schedule_once(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        let mut state = self.lock();
        state.next_id += 1;
        state.scheduled_total += 1;
        let handle = TimerHandle::new(state.next_id);
        let expiry = state.now + delay;
        state.pending.insert((expiry, handle), token);
        handle
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.lock().pending.keys().any(|(_, pending)| *pending == handle)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.lock().pending.retain(|(_, pending), _| *pending != handle);
    }
}

/// Clock half, kept by the test to move time forward.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    state: Arc<Mutex<ClockState>>,
}

impl SimulatedClock {
    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Move time forward by `by` and return every timer that expired.
    pub fn advance(&self, by: Duration) -> Vec<TimerFired> {
        let mut state = self.lock();
        let deadline = state.now + by;
        let mut fired = Vec::new();
        while let Some((_, timer)) = state.pop_due(deadline) {
            fired.push(timer);
        }
        state.now = deadline;
        fired
    }

    /// Jump to the earliest pending expiry and return that timer.
    pub fn fire_next(&self) -> Option<TimerFired> {
        let mut state = self.lock();
        let (expiry, timer) = state.pop_due(Duration::MAX)?;
        state.now = state.now.max(expiry);
        Some(timer)
    }

    /// Number of armed timers.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Tokens of armed timers with their remaining delay, earliest first.
    pub fn pending(&self) -> Vec<(Duration, TimerToken)> {
        let state = self.lock();
        state
            .pending
            .iter()
            .map(|((expiry, _), token)| (expiry.saturating_sub(state.now), *token))
            .collect()
    }

    /// Number of timers ever scheduled, including fired and cancelled ones.
    pub fn scheduled_total(&self) -> usize {
        self.lock().scheduled_total
    }
}
