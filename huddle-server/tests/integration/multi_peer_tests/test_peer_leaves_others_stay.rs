use huddle_core::{IceCandidate, RoomId, SignalMessage};

use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::TestParticipant;

#[tokio::test]
async fn test_remaining_peers_keep_routing_after_a_leave() {
    init_tracing();

    let rooms = create_test_coordinator();
    let mut a = TestParticipant::join(&rooms, "R1", "a").await.unwrap();
    let mut b = TestParticipant::join(&rooms, "R1", "b").await.unwrap();
    let mut c = TestParticipant::join(&rooms, "R1", "c").await.unwrap();
    for _ in 0..2 {
        a.recv().await.unwrap();
        b.recv().await.unwrap();
        c.recv().await.unwrap();
    }

    b.drop_transport();

    assert_eq!(a.recv().await.unwrap(), SignalMessage::peer_left("b".into()));
    assert_eq!(c.recv().await.unwrap(), SignalMessage::peer_left("b".into()));

    c.send(SignalMessage::ice_candidate("c".into(), "a".into(), &IceCandidate::new("c-1")).unwrap())
        .unwrap();
    let msg = a.recv().await.unwrap();
    assert_eq!(msg.sender(), &c.id);

    assert_eq!(
        rooms.members(&RoomId::from("R1")).await,
        vec![a.id.clone(), c.id.clone()]
    );
}
