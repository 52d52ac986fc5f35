use huddle_core::{IceCandidate, SignalMessage};
use huddle_server::CoordinatorConfig;

use crate::integration::init_tracing;
use crate::utils::{spawn_ws_server, wait_for_member, ws_connect, ws_recv, ws_send};

#[tokio::test]
async fn test_ws_participants_discover_each_other_and_route() {
    init_tracing();

    let (service, addr) = spawn_ws_server(CoordinatorConfig::default()).await.unwrap();

    let mut a = ws_connect(addr, "R1", "a").await.unwrap();
    ws_send(&mut a, &SignalMessage::Join { from: "a".into() }).await.unwrap();
    wait_for_member(service.rooms(), "R1", &"a".into()).await.unwrap();

    let mut b = ws_connect(addr, "R1", "b").await.unwrap();
    ws_send(&mut b, &SignalMessage::Join { from: "b".into() }).await.unwrap();

    assert_eq!(ws_recv(&mut a).await.unwrap(), SignalMessage::peer_joined("b".into()));
    assert_eq!(ws_recv(&mut b).await.unwrap(), SignalMessage::peer_present("a".into()));

    let candidate = SignalMessage::ice_candidate("b".into(), "a".into(), &IceCandidate::new("candidate:1")).unwrap();
    ws_send(&mut b, &candidate).await.unwrap();
    assert_eq!(ws_recv(&mut a).await.unwrap(), candidate);

    drop(b);
    assert_eq!(ws_recv(&mut a).await.unwrap(), SignalMessage::peer_left("b".into()));
}
