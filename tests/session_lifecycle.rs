//! End-to-end session lifecycle scenarios
//!
//! Drives the public API the way an application would: construct a
//! coordinator over the mock provider and gateway, run a whole meeting from
//! join to teardown, and verify the observable snapshots at each step.

use std::sync::Arc;
use std::time::Duration;

use meeting_core::metadata::{MeetingRecord, MockMeetingGateway};
use meeting_core::transport::mock::MockTransport;
use meeting_core::{
    CoordinatorConfig, DevicePrefs, MediaKind, MeetingCoordinator, SessionState, TransportEvent,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meeting_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn record(channel: &str, creator_id: &str) -> MeetingRecord {
    MeetingRecord {
        channel: channel.to_string(),
        creator_id: creator_id.to_string(),
        creator_name: "Alice".to_string(),
        participant_id: "bob-id".to_string(),
        participant_name: "Bob".to_string(),
    }
}

/// A host runs a full meeting: join with mic, remote joins and publishes,
/// screen share on and off, then ends the meeting for everyone.
#[tokio::test]
async fn host_runs_a_full_meeting() {
    init_tracing();
    let transport = Arc::new(MockTransport::new());
    let gateway = Arc::new(MockMeetingGateway::new());
    gateway.set_record(record("standup", "alice-id"));
    let coordinator = MeetingCoordinator::new(
        transport.clone(),
        gateway.clone(),
        CoordinatorConfig::new("alice-id"),
    );
    let mut updates = coordinator.subscribe();

    coordinator
        .start_session("standup", "tok", DevicePrefs::new(true, true))
        .await
        .unwrap();
    let snapshot = coordinator.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Joined);
    assert!(snapshot.is_host);
    assert_eq!(snapshot.remote_name.as_deref(), Some("Bob"));
    assert!(snapshot.mic_on && snapshot.cam_on);

    // The remote party arrives and turns their camera on
    transport.emit(TransportEvent::ParticipantJoined { uid: 42 });
    transport.emit(TransportEvent::ParticipantPublished {
        uid: 42,
        kind: MediaKind::Video,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = coordinator.snapshot().await;
    assert_eq!(snapshot.participants.len(), 1);
    assert!(snapshot.participants[0].is_publishing(MediaKind::Video));
    assert_eq!(transport.subscriptions(), vec![(42, MediaKind::Video)]);

    // Share the screen, then go back to the camera
    coordinator.toggle_screen_share().await.unwrap();
    assert!(coordinator.snapshot().await.screen_sharing);
    coordinator.toggle_screen_share().await.unwrap();
    assert!(!coordinator.snapshot().await.screen_sharing);

    // End for everyone: the record is closed and nothing stays open
    coordinator.end_for_all().await.unwrap();
    assert_eq!(gateway.close_calls(), 1);
    assert_eq!(transport.open_track_count(), 0);
    assert!(!transport.is_joined());

    // The watch channel converged on the terminal snapshot
    while updates.has_changed().unwrap() {
        updates.borrow_and_update();
    }
    assert_eq!(updates.borrow().state, SessionState::Ended);
}

/// A guest with a broken camera joins, listens, and leaves. The camera
/// failure degrades the capability without touching the rest of the session.
#[tokio::test]
async fn guest_with_denied_camera_joins_and_leaves() {
    init_tracing();
    let transport = Arc::new(MockTransport::new());
    transport.deny_device(meeting_core::TrackKind::Camera);
    transport.add_existing_participant(7, vec![MediaKind::Audio]);
    let gateway = Arc::new(MockMeetingGateway::new());
    gateway.set_record(record("standup", "alice-id"));
    let coordinator = MeetingCoordinator::new(
        transport.clone(),
        gateway.clone(),
        CoordinatorConfig::new("bob-id"),
    );

    coordinator
        .start_session("standup", "tok", DevicePrefs::new(true, true))
        .await
        .unwrap();
    let snapshot = coordinator.snapshot().await;
    assert!(!snapshot.is_host);
    assert_eq!(snapshot.remote_name.as_deref(), Some("Alice"));
    assert!(!snapshot.has_camera);
    assert!(snapshot.mic_on);
    // The host was already in the channel
    assert_eq!(snapshot.participants.len(), 1);

    // Guests cannot end the meeting
    assert!(coordinator.end_for_all().await.is_err());
    assert_eq!(gateway.close_calls(), 0);

    coordinator.leave().await.unwrap();
    assert_eq!(coordinator.state().await, SessionState::Left);
    assert_eq!(transport.open_track_count(), 0);
}

/// A dropped connection fails the session mid-meeting; the same coordinator
/// then starts a fresh session successfully.
#[tokio::test]
async fn coordinator_is_reusable_after_a_connection_loss() {
    init_tracing();
    let transport = Arc::new(MockTransport::new());
    let gateway = Arc::new(MockMeetingGateway::new());
    let coordinator = MeetingCoordinator::new(
        transport.clone(),
        gateway,
        CoordinatorConfig::new("bob-id"),
    );

    coordinator
        .start_session("standup", "tok", DevicePrefs::new(true, false))
        .await
        .unwrap();
    transport.emit(TransportEvent::ConnectionLost {
        reason: "ICE disconnected".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(coordinator.state().await, SessionState::Failed);
    assert_eq!(transport.open_track_count(), 0);

    // Second session on the same instance starts clean
    coordinator
        .start_session("standup", "tok2", DevicePrefs::new(true, false))
        .await
        .unwrap();
    let snapshot = coordinator.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Joined);
    assert!(snapshot.participants.is_empty());
    assert!(snapshot.mic_on);
    assert_eq!(transport.join_calls(), 2);

    coordinator.leave().await.unwrap();
    assert_eq!(coordinator.state().await, SessionState::Left);
}
