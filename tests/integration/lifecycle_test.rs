//! Full session lifecycle: start, telemetry, stop, history.

use voltstream_core::types::id::ConnectorId;
use voltstream_entity::connector::ConnectorStatus;
use voltstream_entity::session::{SessionStatus, StopReason};
use voltstream_gateway::transport::ChannelTransport;
use voltstream_session::StopSessionRequest;

use crate::helpers::{
    accept_all, available_connector, meter_values_frame, start_request, wait_for_energy, TestApp,
};

#[tokio::test]
async fn test_start_progress_stop_happy_path() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let script = accept_all(station, 42);

    let request = start_request("ST-1", 1);
    let user_id = request.user_id;
    let session = app.service.start_session(request).await.expect("start");
    assert_eq!(session.status, SessionStatus::Charging);
    assert_eq!(session.provider_transaction_id, Some(42));

    // The connector is marked occupied once charging is confirmed.
    let connector = app
        .service
        .oracle()
        .get(&session.station_id, session.connector_id)
        .await
        .expect("oracle")
        .expect("connector");
    assert_eq!(connector.status, ConnectorStatus::Occupied);

    // Telemetry flows through the real protocol path.
    script
        .to_gateway
        .send(meter_values_frame(1, 42, 5400.0, 11000.0))
        .await
        .expect("send meter values");
    wait_for_energy(&app.service, &session.id, 5.4).await;

    let summary = app
        .service
        .stop_session(&session.id, StopSessionRequest::default())
        .await
        .expect("stop");
    assert_eq!(summary.status, SessionStatus::Completed);
    assert!((summary.energy_delivered_kwh - 5.4).abs() < 1e-9);
    // 5.4 kWh at the default 0.42/kWh tariff.
    assert!((summary.cost_amount.expect("cost") - 2.27).abs() < 1e-9);
    assert!(!summary.unconfirmed_by_station);

    // Connector released, user free to start again.
    let connector = app
        .service
        .oracle()
        .get(&session.station_id, session.connector_id)
        .await
        .expect("oracle")
        .expect("connector");
    assert_eq!(connector.status, ConnectorStatus::Available);
    assert!(app
        .service
        .active_session_for_user(&user_id)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn test_stop_without_energy_is_cancelled() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 7);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");

    let summary = app
        .service
        .stop_session(&session.id, StopSessionRequest::default())
        .await
        .expect("stop");
    assert_eq!(summary.status, SessionStatus::Cancelled);
    assert_eq!(summary.energy_delivered_kwh, 0.0);
    assert!(summary.cost_amount.is_none());
}

#[tokio::test]
async fn test_emergency_stop_cancels_without_cost() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let script = accept_all(station, 8);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");
    script
        .to_gateway
        .send(meter_values_frame(1, 8, 2000.0, 7000.0))
        .await
        .expect("send meter values");
    wait_for_energy(&app.service, &session.id, 2.0).await;

    // An emergency stop cancels even with energy on the meter, and
    // nothing is charged.
    let summary = app
        .service
        .stop_session(
            &session.id,
            StopSessionRequest {
                reason: StopReason::EmergencyStop,
                force_stop: false,
            },
        )
        .await
        .expect("stop");
    assert_eq!(summary.status, SessionStatus::Cancelled);
    assert!((summary.energy_delivered_kwh - 2.0).abs() < 1e-9);
    assert!(summary.cost_amount.is_none());
}

#[tokio::test]
async fn test_double_stop_is_idempotent() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let script = accept_all(station, 9);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");
    script
        .to_gateway
        .send(meter_values_frame(1, 9, 2000.0, 7000.0))
        .await
        .expect("send meter values");
    wait_for_energy(&app.service, &session.id, 2.0).await;

    let first = app
        .service
        .stop_session(&session.id, StopSessionRequest::default())
        .await
        .expect("first stop");
    let second = app
        .service
        .stop_session(&session.id, StopSessionRequest::default())
        .await
        .expect("second stop");

    assert_eq!(second.status, first.status);
    assert_eq!(second.energy_delivered_kwh, first.energy_delivered_kwh);
    assert_eq!(second.cost_amount, first.cost_amount);
    assert_eq!(second.ended_at, first.ended_at);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 11);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");

    let paused = app
        .service
        .pause_session(&session.id)
        .await
        .expect("pause");
    assert_eq!(paused.status, SessionStatus::ChargingPaused);

    let resumed = app
        .service
        .resume_session(&session.id)
        .await
        .expect("resume");
    assert_eq!(resumed.status, SessionStatus::Charging);
}

#[tokio::test]
async fn test_stopped_session_lands_in_history() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 13);

    let request = start_request("ST-1", 1);
    let user_id = request.user_id;
    let session = app.service.start_session(request).await.expect("start");
    app.service
        .stop_session(
            &session.id,
            StopSessionRequest {
                reason: StopReason::VehicleComplete,
                force_stop: false,
            },
        )
        .await
        .expect("stop");

    let history = app
        .service
        .sessions_for_user(&user_id)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, session.id);
    assert!(history[0].is_terminal());
    assert_eq!(history[0].connector_id, ConnectorId::new(1));
}
