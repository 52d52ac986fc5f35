use huddle_core::SignalMessage;
use huddle_server::CoordinatorConfig;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{spawn_ws_server, wait_for_member, ws_connect, ws_recv, ws_send};

#[tokio::test]
async fn test_silent_socket_is_evicted_after_pong_wait() {
    init_tracing();

    let config = CoordinatorConfig {
        ping_period: Duration::from_millis(100),
        pong_wait: Duration::from_millis(300),
        ..Default::default()
    };
    let (service, addr) = spawn_ws_server(config).await.unwrap();

    let mut a = ws_connect(addr, "R1", "a").await.unwrap();
    ws_send(&mut a, &SignalMessage::Join { from: "a".into() }).await.unwrap();
    wait_for_member(service.rooms(), "R1", &"a".into()).await.unwrap();

    // b joins and then never reads again, so it never answers a ping.
    let mut b = ws_connect(addr, "R1", "b").await.unwrap();
    ws_send(&mut b, &SignalMessage::Join { from: "b".into() }).await.unwrap();

    // a keeps reading (and so keeps answering pings) while b goes quiet.
    assert_eq!(ws_recv(&mut a).await.unwrap(), SignalMessage::peer_joined("b".into()));
    assert_eq!(ws_recv(&mut a).await.unwrap(), SignalMessage::peer_left("b".into()));

    assert_eq!(service.rooms().members(&"R1".into()).await, vec!["a".into()]);
}
