use huddle_client::{NegotiationState, NegotiatorEventKind, NegotiatorInput, PeerEvent, Role};
use huddle_core::{CallError, SignalMessage};

use crate::integration::{create_negotiator, init_tracing};
use crate::utils::MockPeerFactory;

#[tokio::test]
async fn test_malformed_offer_closes_only_this_negotiator() {
    init_tracing();

    let mut fx = create_negotiator(Role::Responder, MockPeerFactory::new());
    fx.negotiator.handle(NegotiatorInput::Start).await;

    let garbage = SignalMessage::Offer {
        from: "b".into(),
        to: "a".into(),
        data: serde_json::json!("not a description"),
    };
    fx.negotiator.handle(NegotiatorInput::Signal(garbage)).await;

    assert_eq!(fx.negotiator.state(), NegotiationState::Closed);
    assert!(fx.peers.session("b").unwrap().is_closed());
    let event = fx.events.try_recv().unwrap();
    assert!(matches!(
        event.kind,
        NegotiatorEventKind::Failed(CallError::ProtocolViolation(_))
    ));
}

#[tokio::test]
async fn test_media_session_creation_failure() {
    init_tracing();

    let mut fx = create_negotiator(Role::Initiator, MockPeerFactory::failing());
    fx.negotiator.handle(NegotiatorInput::Start).await;

    assert_eq!(fx.negotiator.state(), NegotiationState::Closed);
    assert!(fx.sink.sent().is_empty());
    match fx.events.try_recv().unwrap().kind {
        NegotiatorEventKind::Failed(CallError::NegotiationFailed { peer, .. }) => {
            assert_eq!(peer.as_str(), "b");
        }
        other => panic!("expected negotiation failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_media_path_closes_negotiator() {
    init_tracing();

    let mut fx = create_negotiator(Role::Initiator, MockPeerFactory::new());
    fx.negotiator.handle(NegotiatorInput::Start).await;
    fx.negotiator
        .handle(NegotiatorInput::Peer(PeerEvent::Failed("ice failed".to_owned())))
        .await;

    assert_eq!(fx.negotiator.state(), NegotiationState::Closed);
    assert!(fx.peers.session("b").unwrap().is_closed());
    assert!(matches!(
        fx.events.try_recv().unwrap().kind,
        NegotiatorEventKind::Failed(CallError::NegotiationFailed { .. })
    ));
}
