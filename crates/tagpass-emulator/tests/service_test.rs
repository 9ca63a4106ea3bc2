//! Integration tests for the tokio-hosted tag service.
//!
//! Time is paused, so sleeps complete as soon as every task is idle and the
//! timer tasks fire in deadline order.

use std::time::Duration;

use tagpass_core::{BackendOperation, EmulationState, Error};
use tagpass_emulator::{
    EmulationController, EmulatorConfig, PresentationState, ServiceError, TagService,
};
use tagpass_hardware::mock::{BackendCall, MockBackend, MockBackendHandle};
use tokio::time::sleep;

fn spawn_service(
    config: EmulatorConfig,
) -> (
    tagpass_emulator::TagServiceHandle,
    tokio::task::JoinHandle<tagpass_core::Result<()>>,
    MockBackendHandle,
) {
    let (backend, handle) = MockBackend::new();
    let controller = EmulationController::new(backend, config).unwrap();
    handle.clear_calls();
    let (service, task) = TagService::spawn(controller);
    (service, task, handle)
}

#[tokio::test(start_paused = true)]
async fn test_presentation_with_cooldown() {
    let (service, task, backend) = spawn_service(EmulatorConfig::default());

    service.set_tag_uid(vec![0xEF, 0xBE, 0xAD, 0xBA]).await.unwrap();
    service.present_tag(100, 50).await.unwrap();

    let status = service.status().await.unwrap();
    assert_eq!(status.presentation, PresentationState::Presenting);
    assert_eq!(status.emulation, EmulationState::Running);
    assert!(backend.is_running());

    sleep(Duration::from_millis(120)).await;
    let status = service.status().await.unwrap();
    assert_eq!(status.presentation, PresentationState::Cooldown);
    assert_eq!(status.emulation, EmulationState::Stopped);

    let status = service.wait_until_idle().await.unwrap();
    assert_eq!(status.presentation, PresentationState::Idle);
    assert_eq!(backend.count(|call| *call == BackendCall::Stop), 1);

    service.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_busy_while_presenting() {
    let (service, _task, _backend) = spawn_service(EmulatorConfig::default());

    service.present_tag(1_000, 0).await.unwrap();
    let result = service.present_tag(1_000, 0).await;

    assert!(matches!(
        result,
        Err(ServiceError::Emulation(Error::Busy { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_emulation_cancels_timers() {
    let (service, _task, backend) = spawn_service(EmulatorConfig::default());

    service.present_tag(100, 100).await.unwrap();
    service.stop_emulation().await.unwrap();
    assert_eq!(
        service.status().await.unwrap().presentation,
        PresentationState::Idle
    );

    sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.count(|call| *call == BackendCall::Stop), 1);
}

#[tokio::test(start_paused = true)]
async fn test_set_uri_through_service() {
    let (service, _task, backend) = spawn_service(EmulatorConfig::default());

    service.set_tag_uri("https://tagpass.example").await.unwrap();

    let payload = backend.payload().unwrap();
    assert_eq!(payload.len(), 256);
    assert_eq!(&payload[..2], &[0x00, 0x14]);
}

#[tokio::test(start_paused = true)]
async fn test_unrecoverable_ends_service() {
    let (service, task, backend) =
        spawn_service(EmulatorConfig::default().with_error_max(2));
    backend.fail_next_starts(2);

    let first = service.start_emulation().await;
    assert!(matches!(
        first,
        Err(ServiceError::Emulation(Error::Backend { .. }))
    ));

    let second = service.start_emulation().await;
    assert!(second.as_ref().unwrap_err().is_fatal());

    let outcome = task.await.unwrap();
    assert!(matches!(
        outcome,
        Err(Error::Unrecoverable {
            operation: BackendOperation::Start,
            failures: 2
        })
    ));

    let after = service.status().await;
    assert!(matches!(after, Err(ServiceError::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn test_status_updates_are_published() {
    let (service, _task, _backend) = spawn_service(EmulatorConfig::default());
    let mut updates = service.subscribe();

    service.present_tag(10, 0).await.unwrap();
    updates
        .wait_for(|s| s.presentation == PresentationState::Presenting)
        .await
        .unwrap();

    let idle = updates
        .wait_for(|s| s.presentation == PresentationState::Idle)
        .await
        .unwrap();
    assert_eq!(idle.emulation, EmulationState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_stops_service() {
    let (service, task, _backend) = spawn_service(EmulatorConfig::default());

    drop(service);

    assert!(task.await.unwrap().is_ok());
}
