//! Subscription semantics: snapshot-before-stream and topic fan-out.

use voltstream_entity::session::ProgressUpdate;
use voltstream_gateway::transport::ChannelTransport;
use voltstream_realtime::{EventPayload, Topic};
use voltstream_session::StopSessionRequest;

use crate::helpers::{accept_all, available_connector, start_request, TestApp};

#[tokio::test]
async fn test_session_subscription_sees_snapshot_before_events() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 91);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");

    // Subscribe mid-session: current state must arrive before any delta.
    let mut subscription = app
        .broadcaster
        .subscribe(&Topic::Session(session.id))
        .await
        .expect("subscribe");

    app.service
        .apply_progress_update(
            &session.id,
            ProgressUpdate {
                energy_delivered_kwh: Some(1.5),
                current_power_kw: Some(11.0),
                ..Default::default()
            },
        )
        .await
        .expect("progress");

    let first = subscription.recv().await.expect("snapshot frame");
    let json = serde_json::to_value(&first).expect("serialize");
    assert!(matches!(first.event, EventPayload::Snapshot(_)));
    assert_eq!(json["event"]["type"], "session_snapshot");
    assert_eq!(json["event"]["session"]["status"], "CHARGING");

    let second = subscription.recv().await.expect("event frame");
    let json = serde_json::to_value(&second).expect("serialize");
    assert_eq!(json["event"]["type"], "charging_progress");
    assert_eq!(json["event"]["energy_delivered_kwh"], 1.5);
}

#[tokio::test]
async fn test_station_topic_carries_connector_updates_on_stop() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 92);

    let session = app
        .service
        .start_session(start_request("ST-1", 1))
        .await
        .expect("start");

    let mut subscription = app
        .broadcaster
        .subscribe(&Topic::Station(session.station_id.clone()))
        .await
        .expect("subscribe");

    app.service
        .stop_session(&session.id, StopSessionRequest::default())
        .await
        .expect("stop");

    // The stop fans several frames onto the station topic; the connector
    // release must be among them.
    let mut saw_connector_release = false;
    for _ in 0..5 {
        let Some(frame) = subscription.try_recv() else {
            break;
        };
        let json = serde_json::to_value(&frame).expect("serialize");
        if json["event"]["type"] == "connector_status_update"
            && json["event"]["status"] == "available"
        {
            saw_connector_release = true;
        }
    }
    assert!(saw_connector_release);
}

#[tokio::test]
async fn test_user_topic_sees_session_lifecycle() {
    let (transport, station) = ChannelTransport::pair(16);
    let app = TestApp::new(
        &["ST-1"],
        vec![transport],
        vec![available_connector("ST-1", 1)],
    )
    .await;
    let _script = accept_all(station, 93);

    let request = start_request("ST-1", 1);
    let topic = Topic::User(request.user_id);
    let mut subscription = app.broadcaster.subscribe(&topic).await.expect("subscribe");

    app.service.start_session(request).await.expect("start");

    let first = subscription.recv().await.expect("created frame");
    let json = serde_json::to_value(&first).expect("serialize");
    assert_eq!(json["event"]["type"], "session_created");
    assert_eq!(json["topic"], topic.name());
}
