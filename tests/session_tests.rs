mod common;

use common::fixture;
use fleet_dispatch::clients::memory_gateway::ops;
use fleet_dispatch::clients::{FleetGateway, InjectedFailure};
use fleet_dispatch::models::{LoginRequest, UserRole};
use fleet_dispatch::state::{SessionContext, SessionEvent};
use fleet_dispatch::AppError;
use tokio::sync::broadcast::error::TryRecvError;

async fn login_as_admin(f: &common::Fixture) {
    f.gateway
        .add_user("admin", "admin123", UserRole::Admin, None)
        .await;
    let credentials = LoginRequest {
        username: "admin".to_string(),
        password: "admin123".to_string(),
    };
    let response = f.gateway.login(&credentials).await.unwrap();
    f.session
        .begin(SessionContext::from_login("admin", &response))
        .await;
}

#[tokio::test]
async fn test_bearer_is_required_by_backend() {
    let f = fixture().await;
    f.gateway.require_auth(true).await;

    login_as_admin(&f).await;
    let report = f.coordinator.refresh().await;

    assert!(report.failures().is_empty());
    assert_eq!(f.coordinator.vehicles().await.len(), 1);
}

#[tokio::test]
async fn test_rejected_credential_clears_session_once() {
    let f = fixture().await;
    f.gateway.require_auth(true).await;
    login_as_admin(&f).await;
    let mut events = f.session.subscribe();

    f.gateway.revoke_tokens().await;
    let report = f.coordinator.refresh().await;

    // Las tres colecciones fallan pero solo hay una navegación al login
    assert_eq!(report.failures().len(), 3);
    assert!(report
        .failures()
        .iter()
        .all(|(_, e)| e.is_authorization_failure()));
    assert!(!f.session.is_authenticated().await);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoginRequired { status: 401 }
    );
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_each_authorization_failure_after_login_navigates() {
    let f = fixture().await;
    login_as_admin(&f).await;
    let mut events = f.session.subscribe();

    f.gateway
        .fail_next(ops::LIST_JOBS, InjectedFailure::status(403, ""))
        .await;
    let outcome = f.coordinator.refresh_jobs().await;
    assert!(outcome.is_failed());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoginRequired { status: 403 }
    );

    login_as_admin(&f).await;
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedIn { .. }
    ));

    f.gateway
        .fail_next(ops::LIST_DRIVERS, InjectedFailure::status(401, ""))
        .await;
    f.coordinator.refresh_drivers().await;
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoginRequired { status: 401 }
    );
}

#[tokio::test]
async fn test_wrong_password_keeps_logged_out() {
    let f = fixture().await;
    f.gateway
        .add_user("admin", "admin123", UserRole::Admin, None)
        .await;

    let err = f
        .gateway
        .login(&LoginRequest {
            username: "admin".to_string(),
            password: "nope".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.alert(), "Incorrect username or password");
    assert!(!f.session.is_authenticated().await);
}

#[tokio::test]
async fn test_logout_clears_acting_driver() {
    let f = fixture().await;
    f.gateway
        .add_user("alice", "d1", UserRole::Driver, Some("d1"))
        .await;
    let response = f
        .gateway
        .login(&LoginRequest::for_driver("Alice", "d1"))
        .await
        .unwrap();
    f.session
        .begin(SessionContext::from_login("alice", &response))
        .await;
    assert_eq!(f.session.acting_driver().await.as_deref(), Some("d1"));

    f.session.end().await;

    assert_eq!(f.session.acting_driver().await, None);
    assert_eq!(f.session.bearer().await, None);
    assert_eq!(
        fleet_dispatch::services::DriverPortal::open(f.coordinator.clone(), &f.session)
            .await
            .err(),
        Some(AppError::NotLoggedIn)
    );
}
