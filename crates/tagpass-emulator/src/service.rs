//! Tokio runtime service.
//!
//! [`TagService::spawn`] moves a [`Presenter`] into a single task that owns
//! it for the rest of its life. Callers talk to it through a cloneable
//! [`TagServiceHandle`]; each request carries a oneshot reply channel. Timer
//! expiries from the [`TokioScheduler`] arrive on a second channel and are
//! handled by the same task, so no lock is ever taken around the presenter.
//!
//! # Examples
//!
//! ```no_run
//! use tagpass_emulator::{EmulationController, EmulatorConfig, TagService};
//! use tagpass_hardware::mock::MockBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (backend, _handle) = MockBackend::new();
//! let controller = EmulationController::new(backend, EmulatorConfig::default())?;
//! let (service, task) = TagService::spawn(controller);
//!
//! service.set_tag_uid(vec![0x01, 0x02, 0x03, 0x04]).await?;
//! service.present_tag(500, 1000).await?;
//! service.wait_until_idle().await?;
//!
//! service.shutdown().await?;
//! task.await??;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tagpass_core::{BackendOperation, EmulationState, Error, TimerFired, TimerHandle, TimerToken};
use tagpass_hardware::{Scheduler, TagEmulationBackend};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::controller::EmulationController;
use crate::presenter::Presenter;
use crate::state_machine::PresentationState;

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 32;

/// Failure of a service request.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Emulation(#[from] Error),

    #[error("Tag service has stopped")]
    Stopped,
}

impl ServiceError {
    /// `true` if the emulation failure was fatal.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::Emulation(e) if e.is_fatal())
    }
}

/// Snapshot of the service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub presentation: PresentationState,
    pub emulation: EmulationState,
    pub start_failures: u32,
    pub stop_failures: u32,
    pub fatal: bool,
}

impl ServiceStatus {
    fn capture<B: TagEmulationBackend, S: Scheduler>(presenter: &Presenter<B, S>) -> Self {
        let controller = presenter.controller();
        Self {
            presentation: presenter.state(),
            emulation: controller.state(),
            start_failures: controller.failure_count(BackendOperation::Start),
            stop_failures: controller.failure_count(BackendOperation::Stop),
            fatal: controller.is_fatal(),
        }
    }
}

/// [`Scheduler`] backed by `tokio::time::sleep` tasks.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TokioScheduler {
    next_id: u64,
    timers: HashMap<TimerHandle, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its expiries are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            next_id: 0,
            timers: HashMap::new(),
            fired_tx,
        };
        (scheduler, fired_rx)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        self.timers.retain(|_, task| !task.is_finished());

        self.next_id += 1;
        let handle = TimerHandle::new(self.next_id);
        let fired_tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone only when the service is shutting down.
            let _ = fired_tx.send(TimerFired { handle, token });
        });
        self.timers.insert(handle, task);
        handle
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.timers
            .get(&handle)
            .is_some_and(|task| !task.is_finished())
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.timers.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for task in self.timers.values() {
            task.abort();
        }
    }
}

type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
enum Command {
    SetUri {
        uri: Vec<u8>,
        reply: Reply<tagpass_core::Result<()>>,
    },
    SetUid {
        uid: Vec<u8>,
        reply: Reply<tagpass_core::Result<()>>,
    },
    Start {
        reply: Reply<tagpass_core::Result<()>>,
    },
    Stop {
        reply: Reply<tagpass_core::Result<()>>,
    },
    Present {
        duration_ms: u16,
        cooldown_ms: u16,
        reply: Reply<tagpass_core::Result<()>>,
    },
    Status {
        reply: Reply<ServiceStatus>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Entry point for running a presenter on the tokio runtime.
pub struct TagService;

impl TagService {
    /// Spawn the service task.
    ///
    /// The task ends on [`TagServiceHandle::shutdown`], when every handle has
    /// been dropped, or after replying to a request that failed with
    /// `Error::Unrecoverable`. In the last case it resolves to that error.
    pub fn spawn<B>(
        controller: EmulationController<B>,
    ) -> (TagServiceHandle, JoinHandle<tagpass_core::Result<()>>)
    where
        B: TagEmulationBackend + 'static,
    {
        let (scheduler, timers) = TokioScheduler::new();
        let presenter = Presenter::new(controller, scheduler);
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status) = watch::channel(ServiceStatus::capture(&presenter));

        let task = tokio::spawn(run(presenter, commands, timers, status_tx));
        let handle = TagServiceHandle {
            commands: commands_tx,
            status,
        };
        (handle, task)
    }
}

async fn run<B: TagEmulationBackend>(
    mut presenter: Presenter<B, TokioScheduler>,
    mut commands: mpsc::Receiver<Command>,
    mut timers: mpsc::UnboundedReceiver<TimerFired>,
    status: watch::Sender<ServiceStatus>,
) -> tagpass_core::Result<()> {
    info!("Tag service started");

    loop {
        let fatal = tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("All service handles dropped, stopping");
                    return Ok(());
                };
                match dispatch(&mut presenter, command, &status) {
                    Some(fatal) => fatal,
                    None => {
                        info!("Tag service shut down");
                        return Ok(());
                    }
                }
            }
            Some(fired) = timers.recv() => {
                let result = presenter.handle_timer(fired);
                if let Err(e) = &result {
                    warn!("Timer {} handling failed: {}", fired.token, e);
                }
                status.send_replace(ServiceStatus::capture(&presenter));
                fatal_of(&result)
            }
        };

        if let Some(fatal) = fatal {
            error!("Tag service stopping: {}", fatal);
            return Err(fatal);
        }
    }
}

/// Run one command. Returns `None` on shutdown, otherwise the fatal error
/// the command produced, if any.
/// The status is published before the reply is sent.
fn dispatch<B: TagEmulationBackend>(
    presenter: &mut Presenter<B, TokioScheduler>,
    command: Command,
    status: &watch::Sender<ServiceStatus>,
) -> Option<Option<Error>> {
    let (result, reply) = match command {
        Command::SetUri { uri, reply } => (presenter.set_tag_uri(&uri), reply),
        Command::SetUid { uid, reply } => (presenter.set_tag_uid(&uid), reply),
        Command::Start { reply } => (presenter.start_emulation(), reply),
        Command::Stop { reply } => (presenter.stop_emulation(), reply),
        Command::Present {
            duration_ms,
            cooldown_ms,
            reply,
        } => (presenter.present_tag(duration_ms, cooldown_ms), reply),
        Command::Status { reply } => {
            let _ = reply.send(ServiceStatus::capture(presenter));
            return Some(None);
        }
        Command::Shutdown { reply } => {
            let _ = reply.send(());
            return None;
        }
    };

    let fatal = fatal_of(&result);
    status.send_replace(ServiceStatus::capture(presenter));
    if reply.send(result).is_err() {
        debug!("Requester went away before the reply");
    }
    Some(fatal)
}

fn fatal_of(result: &tagpass_core::Result<()>) -> Option<Error> {
    match result {
        Err(Error::Unrecoverable {
            operation,
            failures,
        }) => Some(Error::Unrecoverable {
            operation: *operation,
            failures: *failures,
        }),
        _ => None,
    }
}

/// Cloneable handle to a running [`TagService`].
#[derive(Debug, Clone)]
pub struct TagServiceHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ServiceStatus>,
}

impl TagServiceHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        response.await.map_err(|_| ServiceError::Stopped)
    }

    /// # Errors
    ///
    /// Returns the presenter error, or `ServiceError::Stopped`.
    pub async fn set_tag_uri(&self, uri: impl Into<Vec<u8>>) -> Result<(), ServiceError> {
        let uri = uri.into();
        Ok(self.request(|reply| Command::SetUri { uri, reply }).await??)
    }

    /// # Errors
    ///
    /// Returns the presenter error, or `ServiceError::Stopped`.
    pub async fn set_tag_uid(&self, uid: impl Into<Vec<u8>>) -> Result<(), ServiceError> {
        let uid = uid.into();
        Ok(self.request(|reply| Command::SetUid { uid, reply }).await??)
    }

    /// # Errors
    ///
    /// Returns the presenter error, or `ServiceError::Stopped`.
    pub async fn start_emulation(&self) -> Result<(), ServiceError> {
        Ok(self.request(|reply| Command::Start { reply }).await??)
    }

    /// # Errors
    ///
    /// Returns the presenter error, or `ServiceError::Stopped`.
    pub async fn stop_emulation(&self) -> Result<(), ServiceError> {
        Ok(self.request(|reply| Command::Stop { reply }).await??)
    }

    /// # Errors
    ///
    /// Returns the presenter error, or `ServiceError::Stopped`.
    pub async fn present_tag(
        &self,
        duration_ms: u16,
        cooldown_ms: u16,
    ) -> Result<(), ServiceError> {
        Ok(self
            .request(|reply| Command::Present {
                duration_ms,
                cooldown_ms,
                reply,
            })
            .await??)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Stopped` if the service is gone.
    pub async fn status(&self) -> Result<ServiceStatus, ServiceError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Status updates, published after every request and timer expiry.
    pub fn subscribe(&self) -> watch::Receiver<ServiceStatus> {
        self.status.clone()
    }

    /// Wait until no presentation session is pending.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Stopped` if the service ends first.
    pub async fn wait_until_idle(&self) -> Result<ServiceStatus, ServiceError> {
        let mut status = self.status.clone();
        let current = status
            .wait_for(|s| s.presentation == PresentationState::Idle)
            .await
            .map_err(|_| ServiceError::Stopped)?;
        Ok(*current)
    }

    /// Stop the service task.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Stopped` if it already ended.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_fires() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        let handle = scheduler.schedule_once(Duration::from_millis(100), TimerToken::AutoStop);
        assert!(scheduler.is_pending(handle));

        let timer = fired.recv().await.unwrap();

        assert_eq!(timer.handle, handle);
        assert_eq!(timer.token, TimerToken::AutoStop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        let cancelled = scheduler.schedule_once(Duration::from_millis(10), TimerToken::AutoStop);
        let kept =
            scheduler.schedule_once(Duration::from_millis(20), TimerToken::CooldownComplete);

        scheduler.cancel(cancelled);
        assert!(!scheduler.is_pending(cancelled));

        let timer = fired.recv().await.unwrap();
        assert_eq!(timer.handle, kept);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_expiry_order() {
        let (mut scheduler, mut fired) = TokioScheduler::new();
        scheduler.schedule_once(Duration::from_millis(150), TimerToken::CooldownComplete);
        scheduler.schedule_once(Duration::from_millis(100), TimerToken::AutoStop);

        assert_eq!(fired.recv().await.unwrap().token, TimerToken::AutoStop);
        assert_eq!(
            fired.recv().await.unwrap().token,
            TimerToken::CooldownComplete
        );
    }

    #[test]
    fn test_service_error_fatal() {
        let fatal = ServiceError::from(Error::Unrecoverable {
            operation: BackendOperation::Stop,
            failures: 3,
        });
        assert!(fatal.is_fatal());
        assert!(!ServiceError::Stopped.is_fatal());
        assert_eq!(ServiceError::Stopped.to_string(), "Tag service has stopped");
    }
}
