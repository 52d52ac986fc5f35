use huddle_client::{CallEvent, NegotiationState};
use huddle_core::ParticipantId;
use std::time::{Duration, Instant};

use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{SpyConnector, TestCaller, wait_for_state};

#[tokio::test]
async fn test_stuck_negotiation_does_not_delay_new_peers() {
    init_tracing();

    let rooms = create_test_coordinator();
    let spy = SpyConnector::new(&rooms);
    let mut a = TestCaller::new(&spy, "a");
    let b = TestCaller::new(&spy, "b");
    let c = TestCaller::new(&spy, "c");

    // a's media engine never produces a session towards b.
    a.peers.stall("b");

    a.start("R1").await.unwrap();
    b.start("R1").await.unwrap();
    a.wait_for(|e| matches!(e, CallEvent::PeerJoined(p) if p.as_str() == "b"))
        .await
        .unwrap();
    let mut a_towards_b = a.session.watch_negotiation(&"b".into()).await.unwrap();
    assert_eq!(*a_towards_b.borrow(), NegotiationState::Idle);

    let left_at = Instant::now();
    b.session.end().await;
    a.wait_for(|e| matches!(e, CallEvent::PeerLeft(p) if p.as_str() == "b"))
        .await
        .unwrap();

    c.start("R1").await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(1),
        a.wait_for(|e| matches!(e, CallEvent::PeerJoined(p) if p.as_str() == "c")),
    )
    .await
    .expect("peer-joined(c) held up behind b's teardown")
    .unwrap();
    assert!(left_at.elapsed() < Duration::from_secs(1));

    tokio::time::timeout(
        Duration::from_secs(1),
        a_towards_b.wait_for(|s| *s == NegotiationState::Closed),
    )
    .await
    .expect("stalled negotiator never closed")
    .unwrap();

    wait_for_state(&a, "c", NegotiationState::Connected).await.unwrap();
    assert_eq!(a.peers.sessions_created("b"), 0);
    assert_eq!(a.session.peers().await, vec![ParticipantId::from("c")]);
}
