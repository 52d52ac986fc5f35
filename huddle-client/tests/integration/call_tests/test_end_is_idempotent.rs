use huddle_client::{AppointmentStatus, CallConfig, CallEvent, NegotiationState, SyntheticDevices};
use huddle_core::{CallError, RoomId};

use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{SpyConnector, TestCaller, wait_for_state};

#[tokio::test]
async fn test_end_twice_emits_nothing_and_releases_everything() {
    init_tracing();

    let rooms = create_test_coordinator();
    let spy = SpyConnector::new(&rooms);
    let config = CallConfig {
        appointment_id: Some("appt-7".to_owned()),
        ..Default::default()
    };
    let mut a = TestCaller::with_devices(&spy, "a", SyntheticDevices::new(), config);
    let mut b = TestCaller::new(&spy, "b");

    a.start("R1").await.unwrap();
    b.start("R1").await.unwrap();
    wait_for_state(&a, "b", NegotiationState::Connected).await.unwrap();
    a.wait_for(|e| matches!(e, CallEvent::RemoteStream { .. })).await.unwrap();

    a.session.end().await;
    a.session.end().await;

    a.expect_quiet().await.unwrap();
    assert!(!a.session.is_active());
    assert!(a.peers.session("b").unwrap().is_closed());
    assert!(a.session.local_media().unwrap().tracks().iter().all(|t| t.is_stopped()));

    match b.wait_for(|e| matches!(e, CallEvent::PeerLeft(_))).await.unwrap() {
        CallEvent::PeerLeft(peer) => assert_eq!(peer.as_str(), "a"),
        _ => unreachable!(),
    }

    assert_eq!(
        a.reporter.reports(),
        vec![
            ("appt-7".to_owned(), AppointmentStatus::InProgress),
            ("appt-7".to_owned(), AppointmentStatus::Completed),
        ]
    );

    let err = a.session.start(RoomId::from("R1")).await.unwrap_err();
    assert_eq!(err, CallError::ChannelClosed);
}

#[tokio::test]
async fn test_end_before_start_is_harmless() {
    init_tracing();

    let rooms = create_test_coordinator();
    let spy = SpyConnector::new(&rooms);
    let mut a = TestCaller::new(&spy, "a");

    a.session.end().await;
    assert!(a.start("R1").await.is_err());
    a.expect_quiet().await.unwrap();
    assert!(spy.sent().is_empty());
    assert!(a.reporter.reports().is_empty());
}

#[tokio::test]
async fn test_start_twice_is_rejected_without_side_effects() {
    init_tracing();

    let rooms = create_test_coordinator();
    let spy = SpyConnector::new(&rooms);
    let mut a = TestCaller::new(&spy, "a");

    a.start("R1").await.unwrap();
    let joins = spy.sent_of_kind("join").len();

    let err = a.start("R2").await.unwrap_err();
    assert!(matches!(err, CallError::InvalidState(_)));
    assert!(a.session.is_active());
    assert_eq!(spy.sent_of_kind("join").len(), joins);
    a.expect_quiet().await.unwrap();

    a.session.end().await;
}
