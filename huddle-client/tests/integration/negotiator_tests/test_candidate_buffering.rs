use huddle_client::{NegotiationState, NegotiatorInput, Role};
use huddle_core::{IceCandidate, SessionDescription, SignalMessage};

use crate::integration::{create_negotiator, init_tracing};
use crate::utils::MockPeerFactory;

fn candidate(text: &str) -> NegotiatorInput {
    NegotiatorInput::Signal(
        SignalMessage::ice_candidate("b".into(), "a".into(), &IceCandidate::new(text)).unwrap(),
    )
}

#[tokio::test]
async fn test_candidates_before_offer_are_applied_in_order() {
    init_tracing();

    let mut fx = create_negotiator(Role::Responder, MockPeerFactory::new());
    fx.negotiator.handle(NegotiatorInput::Start).await;
    assert_eq!(fx.negotiator.state(), NegotiationState::AwaitingOffer);
    assert!(fx.sink.sent().is_empty());

    fx.negotiator.handle(candidate("candidate:1")).await;
    fx.negotiator.handle(candidate("candidate:2")).await;
    assert_eq!(fx.negotiator.pending_candidates(), 2);
    assert!(fx.peers.session("b").unwrap().applied().is_empty());

    let offer = SignalMessage::offer("b".into(), "a".into(), &SessionDescription::offer("v=0 b")).unwrap();
    fx.negotiator.handle(NegotiatorInput::Signal(offer)).await;

    assert_eq!(fx.negotiator.state(), NegotiationState::Connected);
    assert_eq!(fx.negotiator.pending_candidates(), 0);
    assert_eq!(
        fx.peers.session("b").unwrap().applied(),
        vec!["candidate:1", "candidate:2"]
    );
    assert_eq!(fx.sink.kinds(), vec!["answer"]);

    fx.negotiator.handle(candidate("candidate:3")).await;
    assert_eq!(
        fx.peers.session("b").unwrap().applied(),
        vec!["candidate:1", "candidate:2", "candidate:3"]
    );
}

#[tokio::test]
async fn test_initiator_buffers_candidates_until_answer() {
    init_tracing();

    let mut fx = create_negotiator(Role::Initiator, MockPeerFactory::new());
    fx.negotiator.handle(NegotiatorInput::Start).await;
    fx.negotiator.handle(candidate("candidate:early")).await;
    assert_eq!(fx.negotiator.pending_candidates(), 1);

    let answer = SignalMessage::answer("b".into(), "a".into(), &SessionDescription::answer("v=0 b")).unwrap();
    fx.negotiator.handle(NegotiatorInput::Signal(answer)).await;
    assert_eq!(fx.peers.session("b").unwrap().applied(), vec!["candidate:early"]);
}
