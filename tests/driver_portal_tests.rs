mod common;

use common::{fixture, job, ScriptedConfirmation};
use fleet_dispatch::clients::memory_gateway::ops;
use fleet_dispatch::clients::InjectedFailure;
use fleet_dispatch::models::{DriverStatus, JobStatus, VehicleStatus};
use fleet_dispatch::services::DriverPortal;
use fleet_dispatch::AppError;

#[tokio::test]
async fn test_declined_emergency_makes_no_call() {
    let f = fixture().await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");
    portal.load().await;
    f.gateway.clear_calls().await;

    let confirm = ScriptedConfirmation::decline();
    assert_eq!(portal.raise_emergency(&confirm).await.unwrap(), None);

    assert_eq!(confirm.prompts(), vec!["REPORT EMERGENCY? This will alert HDQ."]);
    assert!(f.gateway.calls().await.is_empty());
}

#[tokio::test]
async fn test_accepted_emergency_calls_once_and_refreshes() {
    let f = fixture().await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");
    portal.load().await;
    f.gateway.clear_calls().await;

    let state = portal
        .raise_emergency(&ScriptedConfirmation::accept())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(f.gateway.call_count(ops::RAISE_EMERGENCY).await, 1);
    assert!(f.gateway.call_count(ops::LIST_JOBS).await >= 1);
    let profile = state.profile.unwrap();
    assert_eq!(profile.status, Some(DriverStatus::Emergency));
    assert!(!profile.availability);
    assert_eq!(
        f.coordinator.vehicles().await[0].status,
        VehicleStatus::Unavailable
    );
}

#[tokio::test]
async fn test_not_found_state_is_sticky() {
    let f = fixture().await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "ghost");

    let state = portal.load().await;
    assert_eq!(
        state.blocking_error.as_deref(),
        Some("Driver ID 'ghost' not found. Please contact admin.")
    );

    // Sigue bloqueado aunque la siguiente carga falle por otra razón
    f.gateway
        .fail_next(ops::GET_DRIVER, InjectedFailure::Network)
        .await;
    assert!(portal.load().await.is_blocked());
    assert!(portal.load().await.is_blocked());

    f.gateway.seed_driver(common::driver("ghost", "Casper")).await;
    let state = portal.load().await;
    assert!(!state.is_blocked());
    assert_eq!(state.profile.unwrap().name, "Casper");
}

#[tokio::test]
async fn test_transient_failure_keeps_last_profile() {
    let f = fixture().await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");
    portal.load().await;

    f.gateway
        .fail_next(ops::GET_DRIVER, InjectedFailure::status(500, "boom"))
        .await;
    let state = portal.load().await;

    assert!(!state.is_blocked());
    assert_eq!(state.profile.unwrap().id, "d1");
}

#[tokio::test]
async fn test_location_update_uses_active_job_destination() {
    let f = fixture().await;
    f.gateway.seed_job(job("j1", "d1", JobStatus::InProgress)).await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");
    portal.load().await;

    let state = portal.update_location("Beaune").await.unwrap();

    let profile = state.profile.unwrap();
    assert_eq!(profile.location.as_deref(), Some("Beaune"));
    assert_eq!(profile.destination.as_deref(), Some("Dest j1"));
}

#[tokio::test]
async fn test_location_update_without_job_sends_empty_destination() {
    let f = fixture().await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");
    portal.load().await;

    let state = portal.update_location("Beaune").await.unwrap();
    assert_eq!(state.profile.unwrap().destination.as_deref(), Some(""));
}

#[tokio::test]
async fn test_mark_arrival_completes_active_job() {
    let f = fixture().await;
    f.gateway.seed_job(job("j0", "d2", JobStatus::Pending)).await;
    f.gateway.seed_job(job("j1", "d1", JobStatus::Pending)).await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");
    assert_eq!(portal.load().await.active_job.unwrap().id, "j1");

    let state = portal.mark_arrival().await.unwrap();

    assert_eq!(state.active_job, None);
    let stored = f.gateway.stored_jobs().await;
    assert_eq!(stored[0].status, JobStatus::Pending);
    assert_eq!(stored[1].status, JobStatus::Completed);
}

#[tokio::test]
async fn test_mark_arrival_without_active_job() {
    let f = fixture().await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");
    portal.load().await;
    f.gateway.clear_calls().await;

    let err = portal.mark_arrival().await.unwrap_err();

    assert_eq!(err, AppError::NoActiveJob("d1".to_string()));
    assert!(f.gateway.calls().await.is_empty());
}

#[tokio::test]
async fn test_leave_then_available() {
    let f = fixture().await;
    let portal = DriverPortal::for_driver(f.coordinator.clone(), "d1");

    let state = portal.take_leave().await.unwrap();
    assert_eq!(state.profile.unwrap().effective_status(), DriverStatus::OnLeave);

    let state = portal.set_available().await.unwrap();
    let profile = state.profile.unwrap();
    assert!(profile.availability);
    assert_eq!(profile.effective_status(), DriverStatus::Available);
}
