//! Relay routing semantics over the in-process transport.

use std::time::Duration;

use gatecall_signaling_core::{
    CallAnswer, CallStart, CandidateOut, ClientSignal, IceCandidate, MemoryRelay,
    SessionDescription, SignalAddress, SignalingTransport, Terminate, TransportError,
    TransportEvent, ServerSignal, UserId,
};
use tokio::sync::broadcast;
use tokio::time::timeout;

async fn recv_signal(rx: &mut broadcast::Receiver<TransportEvent>) -> ServerSignal {
    match timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("timed out waiting for signal")
        .expect("transport channel closed")
    {
        TransportEvent::Signal(signal) => signal,
        TransportEvent::Disconnected => panic!("unexpected disconnect"),
    }
}

#[tokio::test]
async fn call_start_arrives_as_incoming_call_with_sender_token() {
    let relay = MemoryRelay::new();
    let caller = relay.client();
    let callee = relay.client();
    caller.connect().await.unwrap();
    callee.connect().await.unwrap();
    callee.join_user(&UserId::from("u42")).await.unwrap();
    let mut inbound = callee.subscribe();

    caller
        .emit(ClientSignal::CallStart(CallStart {
            to_user_id: UserId::from("u42"),
            offer: SessionDescription::offer("v=0 caller"),
            visitor_name: "Visitor A".into(),
            visitor_phone: "+1555".into(),
        }))
        .await
        .unwrap();

    match recv_signal(&mut inbound).await {
        ServerSignal::IncomingCall(m) => {
            assert_eq!(Some(m.from_socket_id), caller.session_token());
            assert_eq!(m.offer.sdp, "v=0 caller");
            assert_eq!(m.visitor_name, "Visitor A");
            assert_eq!(m.visitor_phone, "+1555");
        }
        other => panic!("expected incoming-call, got {other:?}"),
    }
}

#[tokio::test]
async fn call_answer_arrives_as_call_answered() {
    let relay = MemoryRelay::new();
    let caller = relay.client();
    let callee = relay.client();
    caller.connect().await.unwrap();
    callee.connect().await.unwrap();
    let mut inbound = caller.subscribe();

    let caller_token = caller.session_token().unwrap();
    callee
        .emit(ClientSignal::CallAnswer(CallAnswer {
            to_socket_id: caller_token,
            answer: SessionDescription::answer("v=0 callee"),
        }))
        .await
        .unwrap();

    match recv_signal(&mut inbound).await {
        ServerSignal::CallAnswered(m) => assert_eq!(m.answer.sdp, "v=0 callee"),
        other => panic!("expected call-answered, got {other:?}"),
    }
}

#[tokio::test]
async fn candidates_are_forwarded_in_order() {
    let relay = MemoryRelay::new();
    let a = relay.client();
    let b = relay.client();
    a.connect().await.unwrap();
    b.connect().await.unwrap();
    let mut inbound = b.subscribe();
    let b_token = b.session_token().unwrap();

    for n in 0..3 {
        a.emit(ClientSignal::IceCandidate(CandidateOut::to(
            SignalAddress::Socket(b_token.clone()),
            IceCandidate::new(format!("candidate:{n}")),
        )))
        .await
        .unwrap();
    }

    for n in 0..3 {
        match recv_signal(&mut inbound).await {
            ServerSignal::IceCandidate(m) => {
                assert_eq!(m.candidate.candidate, format!("candidate:{n}"));
                assert_eq!(Some(m.from_socket_id.unwrap()), a.session_token());
            }
            other => panic!("expected ice-candidate, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn empty_room_is_a_routing_failure() {
    let relay = MemoryRelay::new();
    let caller = relay.client();
    caller.connect().await.unwrap();

    let err = caller
        .emit(ClientSignal::CallStart(CallStart {
            to_user_id: UserId::from("nobody-home"),
            offer: SessionDescription::offer("v=0"),
            visitor_name: "Visitor".into(),
            visitor_phone: "+1555".into(),
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Routing { .. }));
}

#[tokio::test]
async fn emitting_to_disconnected_peer_fails() {
    let relay = MemoryRelay::new();
    let a = relay.client();
    let b = relay.client();
    a.connect().await.unwrap();
    b.connect().await.unwrap();
    let b_token = b.session_token().unwrap();
    b.disconnect().await;

    let err = a
        .emit(ClientSignal::CallEnd(Terminate::to(SignalAddress::Socket(
            b_token,
        ))))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Routing { .. }));
    assert_eq!(relay.connected_clients(), 1);
}

#[tokio::test]
async fn disconnect_notifies_subscribers_and_leaves_rooms() {
    let relay = MemoryRelay::new();
    let a = relay.client();
    a.connect().await.unwrap();
    a.join_user(&UserId::from("u1")).await.unwrap();
    let mut inbound = a.subscribe();

    a.disconnect().await;
    match timeout(Duration::from_millis(200), inbound.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
    {
        TransportEvent::Disconnected => {}
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert_eq!(a.session_token(), None);

    // Room-addressed delivery now fails: the only member is gone.
    let b = relay.client();
    b.connect().await.unwrap();
    let err = b
        .emit(ClientSignal::CallStart(CallStart {
            to_user_id: UserId::from("u1"),
            offer: SessionDescription::offer("v=0"),
            visitor_name: "V".into(),
            visitor_phone: "+1".into(),
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Routing { .. }));
}

#[tokio::test]
async fn emit_before_connect_is_rejected() {
    let relay = MemoryRelay::new();
    let a = relay.client();
    let err = a
        .emit(ClientSignal::CallRejected(Terminate::to(
            SignalAddress::User(UserId::from("u1")),
        )))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));
}
