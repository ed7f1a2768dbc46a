//! Concurrency and ordering guarantees: one session per connector, one
//! session per user, monotonic energy.

use voltstream_core::error::ErrorKind;
use voltstream_entity::session::{ProgressUpdate, SessionStatus};
use voltstream_gateway::transport::ChannelTransport;

use crate::helpers::{accept_all, available_connector, start_request, TestApp};

#[tokio::test]
async fn test_concurrent_starts_on_one_connector_admit_exactly_one() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 21);

    let (first, second) = tokio::join!(
        app.service.start_session(start_request("ST-1", 1)),
        app.service.start_session(start_request("ST-1", 1)),
    );

    let outcomes = [first, second];
    let won = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, 1, "exactly one start may win the connector");
    let lost = outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .next()
        .expect("one loser");
    assert_eq!(lost.kind, ErrorKind::ConnectorUnavailable);
}

#[tokio::test]
async fn test_user_is_limited_to_one_live_session() {
    let (transport_a, station_a) = ChannelTransport::pair(16);
    let (transport_b, station_b) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1", "ST-2"],
        vec![transport_a, transport_b],
        vec![
            available_connector("ST-1", 1),
            available_connector("ST-2", 1),
        ],
    )
    .await;
    let _script_a = accept_all(station_a, 31);
    let _script_b = accept_all(station_b, 32);

    let mut request = start_request("ST-1", 1);
    let user_id = request.user_id;
    app.service
        .start_session(request.clone())
        .await
        .expect("first start");

    request = start_request("ST-2", 1);
    request.user_id = user_id;
    let error = app
        .service
        .start_session(request)
        .await
        .expect_err("second start must be rejected");
    assert_eq!(error.kind, ErrorKind::UserHasActiveSession);
}

#[tokio::test]
async fn test_concurrent_same_user_starts_admit_exactly_one() {
    let (transport_a, station_a) = ChannelTransport::pair(16);
    let (transport_b, station_b) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1", "ST-2"],
        vec![transport_a, transport_b],
        vec![
            available_connector("ST-1", 1),
            available_connector("ST-2", 1),
        ],
    )
    .await;
    let _script_a = accept_all(station_a, 33);
    let _script_b = accept_all(station_b, 34);

    // Different connectors, so the per-connector guard does not
    // serialize these; the user claim itself must.
    let request_a = start_request("ST-1", 1);
    let mut request_b = start_request("ST-2", 1);
    request_b.user_id = request_a.user_id;

    let (first, second) = tokio::join!(
        app.service.start_session(request_a),
        app.service.start_session(request_b),
    );

    let outcomes = [first, second];
    let won = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, 1, "exactly one start may win the user slot");
    let lost = outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .next()
        .expect("one loser");
    assert_eq!(lost.kind, ErrorKind::UserHasActiveSession);
}

#[tokio::test]
async fn test_energy_regression_is_dropped() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 41);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");

    let applied = app
        .service
        .apply_progress_update(
            &session.id,
            ProgressUpdate {
                energy_delivered_kwh: Some(10.0),
                ..Default::default()
            },
        )
        .await
        .expect("apply");
    assert!(applied.is_some());

    // A late, out-of-order sample must not roll the meter back.
    let stale = app
        .service
        .apply_progress_update(
            &session.id,
            ProgressUpdate {
                energy_delivered_kwh: Some(8.0),
                ..Default::default()
            },
        )
        .await
        .expect("apply stale");
    assert!(stale.is_none());

    let current = app.service.get_session(&session.id).await.expect("get");
    assert_eq!(current.energy_delivered_kwh, 10.0);
    assert_eq!(current.status, SessionStatus::Charging);
}

#[tokio::test]
async fn test_connector_frees_after_stop_for_next_user() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 51);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("first session");
    app.service
        .stop_session(&session.id, Default::default())
        .await
        .expect("stop");

    // Same connector, different user: must be admitted.
    let next = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("second session");
    assert_eq!(next.status, SessionStatus::Charging);
}
