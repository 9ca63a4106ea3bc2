//! Timed tag presentation.
//!
//! A [`Presenter`] turns emulation on for a fixed duration, optionally
//! followed by a cooldown during which further presentations are refused.
//! Timers are armed on a [`Scheduler`]; their expiry must be fed back with
//! [`Presenter::handle_timer`] by whoever owns the scheduler's output.
//!
//! ```text
//! present_tag(d, c)      AutoStop (t = d)        CooldownComplete (t = d + c)
//!   Idle ──────────> Presenting ──────────> Cooldown ──────────> Idle
//!                         └──────── c == 0 ────────────────────> Idle
//! ```
//!
//! # Examples
//!
//! ```
//! use tagpass_emulator::{EmulationController, EmulatorConfig, PresentationState, Presenter};
//! use tagpass_hardware::mock::{MockBackend, SimulatedScheduler};
//! use std::time::Duration;
//!
//! let (backend, handle) = MockBackend::new();
//! let (scheduler, clock) = SimulatedScheduler::new();
//! let controller = EmulationController::new(backend, EmulatorConfig::default()).unwrap();
//! let mut presenter = Presenter::new(controller, scheduler);
//!
//! presenter.set_tag_uid(&[0x01, 0x02, 0x03, 0x04]).unwrap();
//! presenter.present_tag(100, 0).unwrap();
//! assert!(handle.is_running());
//!
//! for fired in clock.advance(Duration::from_millis(100)) {
//!     presenter.handle_timer(fired).unwrap();
//! }
//! assert_eq!(presenter.state(), PresentationState::Idle);
//! assert!(!handle.is_running());
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tagpass_core::{Error, Result, TimerFired, TimerHandle, TimerToken};
use tagpass_hardware::{Scheduler, TagEmulationBackend};
use tracing::{debug, info, warn};

use crate::controller::EmulationController;
use crate::state_machine::{PresentationState, SessionMachine, StateTransition};

/// Presentation scheduler over one controller.
#[derive(Debug)]
pub struct Presenter<B: TagEmulationBackend, S: Scheduler> {
    controller: EmulationController<B>,
    scheduler: S,
    machine: SessionMachine,
    auto_stop: Option<TimerHandle>,
    cooldown: Option<TimerHandle>,
}

impl<B: TagEmulationBackend, S: Scheduler> Presenter<B, S> {
    pub fn new(controller: EmulationController<B>, scheduler: S) -> Self {
        Self {
            controller,
            scheduler,
            machine: SessionMachine::new(),
            auto_stop: None,
            cooldown: None,
        }
    }

    /// See [`EmulationController::set_uri`].
    ///
    /// # Errors
    ///
    /// Propagates the controller error.
    pub fn set_tag_uri(&mut self, uri: &[u8]) -> Result<()> {
        self.controller.set_uri(uri)
    }

    /// See [`EmulationController::set_uid`].
    ///
    /// # Errors
    ///
    /// Propagates the controller error.
    pub fn set_tag_uid(&mut self, raw: &[u8]) -> Result<()> {
        self.controller.set_uid(raw)
    }

    /// Turn emulation on with no timers involved.
    ///
    /// # Errors
    ///
    /// Propagates the controller error.
    pub fn start_emulation(&mut self) -> Result<()> {
        self.controller.start()
    }

    /// Turn emulation off, abandoning any pending session.
    ///
    /// Pending timers are cancelled and the session returns to `Idle` only
    /// once the backend has stopped.
    ///
    /// # Errors
    ///
    /// Propagates the controller error. The session and its timers are left
    /// as they were, so the armed auto-stop still runs.
    pub fn stop_emulation(&mut self) -> Result<()> {
        self.controller.stop()?;

        for handle in [self.auto_stop.take(), self.cooldown.take()].into_iter().flatten() {
            self.scheduler.cancel(handle);
        }
        if let Some(transition) = self.machine.reset() {
            info!("Presentation cancelled while {}", transition.from);
        }
        Ok(())
    }

    /// Present the tag for `duration_ms`, then refuse new presentations for
    /// `cooldown_ms`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Busy` without touching anything if a session is
    /// pending. Start failures propagate and leave the session idle.
    pub fn present_tag(&mut self, duration_ms: u16, cooldown_ms: u16) -> Result<()> {
        let state = self.machine.current_state();
        if state.is_busy() {
            warn!("Tag already being presented ({})", state);
            return Err(Error::Busy {
                state: state.to_string(),
            });
        }

        self.controller.start()?;
        self.machine.transition_to(PresentationState::Presenting)?;

        let duration = u32::from(duration_ms);
        self.auto_stop = Some(
            self.scheduler
                .schedule_once(millis(duration), TimerToken::AutoStop),
        );
        if cooldown_ms > 0 {
            let total = duration + u32::from(cooldown_ms);
            self.cooldown = Some(
                self.scheduler
                    .schedule_once(millis(total), TimerToken::CooldownComplete),
            );
        }

        info!(
            "Presenting tag for {}ms (cooldown {}ms)",
            duration_ms, cooldown_ms
        );
        Ok(())
    }

    /// Deliver a timer expiry.
    ///
    /// Fires whose handle is not the one currently armed for that token are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns the controller error if the auto-stop fails. The session
    /// still moves on, to `Cooldown` or `Idle`.
    pub fn handle_timer(&mut self, fired: TimerFired) -> Result<()> {
        let slot = match fired.token {
            TimerToken::AutoStop => &mut self.auto_stop,
            TimerToken::CooldownComplete => &mut self.cooldown,
        };
        if *slot != Some(fired.handle) {
            debug!("Ignoring stale {} timer {}", fired.token, fired.handle);
            return Ok(());
        }
        *slot = None;

        match fired.token {
            TimerToken::AutoStop => {
                let next = if self.cooldown.is_some() {
                    PresentationState::Cooldown
                } else {
                    PresentationState::Idle
                };
                self.machine.transition_to(next)?;
                debug!("Presentation complete, now {}", next);
                self.controller.stop()
            }
            TimerToken::CooldownComplete => {
                self.machine.transition_to(PresentationState::Idle)?;
                debug!("Cooldown complete");
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> PresentationState {
        self.machine.current_state()
    }

    /// Recent session transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        self.machine.history()
    }

    /// Handle of the armed timer for `token`, if any.
    #[must_use]
    pub fn pending_timer(&self, token: TimerToken) -> Option<TimerHandle> {
        match token {
            TimerToken::AutoStop => self.auto_stop,
            TimerToken::CooldownComplete => self.cooldown,
        }
    }

    pub fn controller(&self) -> &EmulationController<B> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut EmulationController<B> {
        &mut self.controller
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn into_parts(self) -> (EmulationController<B>, S) {
        (self.controller, self.scheduler)
    }
}

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmulatorConfig;
    use tagpass_core::{BackendOperation, EmulationState};
    use tagpass_hardware::mock::{
        BackendCall, MockBackend, MockBackendHandle, SimulatedClock, SimulatedScheduler,
    };

    type TestPresenter = Presenter<MockBackend, SimulatedScheduler>;

    fn presenter() -> (TestPresenter, MockBackendHandle, SimulatedClock) {
        let (backend, handle) = MockBackend::new();
        let (scheduler, clock) = SimulatedScheduler::new();
        let controller = EmulationController::new(backend, EmulatorConfig::default()).unwrap();
        handle.clear_calls();
        (Presenter::new(controller, scheduler), handle, clock)
    }

    fn advance(presenter: &mut TestPresenter, clock: &SimulatedClock, ms: u64) -> Vec<Result<()>> {
        clock
            .advance(Duration::from_millis(ms))
            .into_iter()
            .map(|fired| presenter.handle_timer(fired))
            .collect()
    }

    fn stops(handle: &MockBackendHandle) -> usize {
        handle.count(|call| *call == BackendCall::Stop)
    }

    #[test]
    fn test_present_without_cooldown() {
        let (mut presenter, handle, clock) = presenter();

        presenter.present_tag(100, 0).unwrap();
        assert_eq!(presenter.state(), PresentationState::Presenting);
        assert_eq!(clock.pending_count(), 1);

        assert!(advance(&mut presenter, &clock, 99).is_empty());
        assert_eq!(stops(&handle), 0);

        let results = advance(&mut presenter, &clock, 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert_eq!(stops(&handle), 1);
        assert_eq!(presenter.state(), PresentationState::Idle);
    }

    #[test]
    fn test_present_with_cooldown() {
        let (mut presenter, handle, clock) = presenter();

        presenter.present_tag(100, 50).unwrap();
        assert_eq!(
            clock.pending(),
            vec![
                (Duration::from_millis(100), TimerToken::AutoStop),
                (Duration::from_millis(150), TimerToken::CooldownComplete),
            ]
        );

        advance(&mut presenter, &clock, 100);
        assert_eq!(presenter.state(), PresentationState::Cooldown);
        assert!(!handle.is_running());

        advance(&mut presenter, &clock, 49);
        assert_eq!(presenter.state(), PresentationState::Cooldown);

        advance(&mut presenter, &clock, 1);
        assert_eq!(presenter.state(), PresentationState::Idle);
        assert_eq!(stops(&handle), 1);
    }

    #[test]
    fn test_durations_do_not_overflow() {
        let (mut presenter, _handle, clock) = presenter();

        presenter.present_tag(u16::MAX, u16::MAX).unwrap();

        let expected = u64::from(u16::MAX) * 2;
        assert_eq!(
            clock.pending()[1],
            (Duration::from_millis(expected), TimerToken::CooldownComplete)
        );
    }

    #[test]
    fn test_busy_while_presenting_and_cooling_down() {
        let (mut presenter, handle, clock) = presenter();
        presenter.present_tag(100, 50).unwrap();
        let calls = handle.calls().len();

        let result = presenter.present_tag(10, 10);
        assert!(matches!(result, Err(Error::Busy { ref state }) if state == "Presenting"));
        assert_eq!(clock.pending_count(), 2);
        assert_eq!(clock.scheduled_total(), 2);

        advance(&mut presenter, &clock, 100);
        let result = presenter.present_tag(10, 10);
        assert!(matches!(result, Err(Error::Busy { ref state }) if state == "Cooldown"));
        assert_eq!(clock.pending_count(), 1);
        assert_eq!(handle.calls().len(), calls + 1);
    }

    #[test]
    fn test_start_failure_schedules_nothing() {
        let (mut presenter, handle, clock) = presenter();
        handle.fail_next_starts(1);

        let result = presenter.present_tag(100, 0);

        assert!(matches!(
            result,
            Err(Error::Backend {
                operation: BackendOperation::Start,
                ..
            })
        ));
        assert_eq!(presenter.state(), PresentationState::Idle);
        assert_eq!(clock.scheduled_total(), 0);
    }

    #[test]
    fn test_auto_stop_failure_still_leaves_presenting() {
        let (mut presenter, handle, clock) = presenter();
        presenter.present_tag(100, 20).unwrap();
        handle.fail_next_stops(1);

        let results = advance(&mut presenter, &clock, 100);

        assert!(matches!(
            results[0],
            Err(Error::Backend {
                operation: BackendOperation::Stop,
                ..
            })
        ));
        assert_eq!(presenter.state(), PresentationState::Cooldown);
        assert!(handle.is_running());

        advance(&mut presenter, &clock, 20);
        assert_eq!(presenter.state(), PresentationState::Idle);

        presenter.stop_emulation().unwrap();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_stop_emulation_cancels_session() {
        let (mut presenter, handle, clock) = presenter();
        presenter.present_tag(100, 50).unwrap();

        presenter.stop_emulation().unwrap();

        assert_eq!(presenter.state(), PresentationState::Idle);
        assert_eq!(clock.pending_count(), 0);
        assert!(presenter.pending_timer(TimerToken::AutoStop).is_none());
        assert_eq!(stops(&handle), 1);

        assert!(advance(&mut presenter, &clock, 1000).is_empty());
        assert_eq!(stops(&handle), 1);
    }

    #[test]
    fn test_failed_stop_keeps_session_armed() {
        let (mut presenter, handle, clock) = presenter();
        presenter.set_tag_uid(&[0x01, 0x02, 0x03, 0x04]).unwrap();
        presenter.present_tag(100, 0).unwrap();
        handle.fail_next_stops(1);

        let result = presenter.stop_emulation();

        assert!(matches!(
            result,
            Err(Error::Backend {
                operation: BackendOperation::Stop,
                failures: 1,
                ..
            })
        ));
        assert_eq!(presenter.state(), PresentationState::Presenting);
        assert!(presenter.pending_timer(TimerToken::AutoStop).is_some());
        assert!(matches!(
            presenter.present_tag(100, 0),
            Err(Error::Busy { .. })
        ));

        let results = advance(&mut presenter, &clock, 100);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert_eq!(presenter.state(), PresentationState::Idle);
        assert!(!handle.is_running());
        assert!(handle.identity().is_none());
    }

    #[test]
    fn test_stale_fire_is_ignored() {
        let (mut presenter, handle, clock) = presenter();
        presenter.present_tag(100, 0).unwrap();
        let stale = TimerFired {
            handle: presenter.pending_timer(TimerToken::AutoStop).unwrap(),
            token: TimerToken::AutoStop,
        };
        presenter.stop_emulation().unwrap();
        presenter.present_tag(100, 0).unwrap();
        handle.clear_calls();

        presenter.handle_timer(stale).unwrap();

        assert_eq!(presenter.state(), PresentationState::Presenting);
        assert!(handle.calls().is_empty());

        advance(&mut presenter, &clock, 100);
        assert_eq!(presenter.state(), PresentationState::Idle);
    }

    #[test]
    fn test_wrong_token_is_ignored() {
        let (mut presenter, _handle, _clock) = presenter();
        presenter.present_tag(100, 0).unwrap();
        let handle = presenter.pending_timer(TimerToken::AutoStop).unwrap();

        presenter
            .handle_timer(TimerFired {
                handle,
                token: TimerToken::CooldownComplete,
            })
            .unwrap();

        assert_eq!(presenter.state(), PresentationState::Presenting);
    }

    #[test]
    fn test_present_again_after_idle() {
        let (mut presenter, handle, clock) = presenter();
        presenter.set_tag_uid(&[0xAB, 0xCD]).unwrap();

        presenter.present_tag(10, 0).unwrap();
        advance(&mut presenter, &clock, 10);
        presenter.present_tag(10, 0).unwrap();

        // The second start writes the identity zeroed by the first stop.
        let identities: Vec<_> = handle
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::SetIdentity { uid, .. } => Some(uid),
                _ => None,
            })
            .collect();
        assert_eq!(identities, vec![vec![0, 0, 0xCD, 0xAB], vec![0; 4]]);
        assert_eq!(presenter.history().len(), 3);
    }

    #[test]
    fn test_start_emulation_passthrough() {
        let (mut presenter, handle, _clock) = presenter();

        presenter.start_emulation().unwrap();
        assert_eq!(presenter.controller().state(), EmulationState::Running);
        assert_eq!(presenter.state(), PresentationState::Idle);

        presenter.set_tag_uri(b"https://a.io").unwrap();
        assert!(handle.is_running());

        presenter.stop_emulation().unwrap();
        assert!(!handle.is_running());
    }
}
