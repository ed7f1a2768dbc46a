//! Failure paths: silent stations, unreachable stations, forced stops,
//! expiry.

use voltstream_core::config::session::SessionConfig;
use voltstream_core::error::ErrorKind;
use voltstream_core::types::id::StationId;
use voltstream_entity::session::{SessionStatus, StopReason};
use voltstream_gateway::transport::ChannelTransport;
use voltstream_session::{SessionStore, StopSessionRequest};

use crate::helpers::{
    accept_all, available_connector, meter_values_frame, silent, start_request, wait_disconnected,
    wait_for_energy, TestApp,
};

#[tokio::test]
async fn test_authorize_timeout_fails_session_without_leaving_residue() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = silent(station);

    let request = start_request("ST-1", 1);
    let user_id = request.user_id;
    let error = app
        .service
        .start_session(request)
        .await
        .expect_err("start must time out");
    assert_eq!(error.kind, ErrorKind::ProtocolTimeout);

    // The session is terminal in the store, not stuck non-terminal.
    let history = app.store.sessions_for_user(&user_id).await.expect("store");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SessionStatus::Failed);
    assert!(history[0].error_code.is_some());

    // The user and the connector are both free again.
    assert!(app
        .service
        .active_session_for_user(&user_id)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn test_stop_on_unreachable_station_fails_session_terminal() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let script = accept_all(station, 61);

    let request = start_request("ST-1", 1);
    let user_id = request.user_id;
    let session = app.service.start_session(request).await.expect("start");

    script.disconnect();
    wait_disconnected(&app.gateway, &StationId::new("ST-1")).await;

    let error = app
        .service
        .stop_session(&session.id, StopSessionRequest::default())
        .await
        .expect_err("stop must surface the transport failure");
    assert_eq!(error.kind, ErrorKind::StationUnreachable);

    // The failure still terminates the session; nothing stays live.
    let current = app.service.get_session(&session.id).await.expect("get");
    assert_eq!(current.status, SessionStatus::Failed);
    assert!(current.unconfirmed_by_station);
    assert!(app
        .service
        .active_session_for_user(&user_id)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn test_force_stop_on_unreachable_station_terminates_unconfirmed() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let script = accept_all(station, 71);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");
    script
        .to_gateway
        .send(meter_values_frame(1, 71, 3200.0, 11000.0))
        .await
        .expect("send meter values");
    wait_for_energy(&app.service, &session.id, 3.2).await;

    script.disconnect();
    wait_disconnected(&app.gateway, &StationId::new("ST-1")).await;

    let summary = app
        .service
        .stop_session(
            &session.id,
            StopSessionRequest {
                reason: StopReason::UserRequest,
                force_stop: true,
            },
        )
        .await
        .expect("forced stop");
    assert_eq!(summary.status, SessionStatus::Completed);
    assert!(summary.unconfirmed_by_station);
    assert!((summary.energy_delivered_kwh - 3.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_sweep_expires_sessions_on_silent_station() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::with_session_config(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
        SessionConfig {
            expiry_deadline_seconds: 0,
            ..SessionConfig::default()
        },
    )
    .await;
    let script = accept_all(station, 65);

    let request = start_request("ST-1", 1);
    let user_id = request.user_id;
    let session = app.service.start_session(request).await.expect("start");

    script.disconnect();
    wait_disconnected(&app.gateway, &StationId::new("ST-1")).await;

    app.service.sweep().await;

    let current = app.service.get_session(&session.id).await.expect("get");
    assert_eq!(current.status, SessionStatus::Expired);
    assert!(current.unconfirmed_by_station);

    // Indexes released: the user is free, and the store holds the
    // terminal record.
    assert!(app
        .service
        .active_session_for_user(&user_id)
        .await
        .expect("query")
        .is_none());
    let history = app.store.sessions_for_user(&user_id).await.expect("store");
    assert_eq!(history[0].status, SessionStatus::Expired);
}

#[tokio::test]
async fn test_unknown_connector_is_rejected() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 81);

    let error = app
        .service
        .start_session(start_request("ST-1", 4))
        .await
        .expect_err("unknown connector");
    assert_eq!(error.kind, ErrorKind::ConnectorUnavailable);
}
