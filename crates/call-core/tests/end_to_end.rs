//! End-to-end call flows: two coordinators wired through the in-process
//! relay, each with its own mock media adapter.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_for_event, wait_for_state, wait_until};
use gatecall_call_core::{
    CallConfig, CallCoordinator, CallEvent, CallState, EndReason, MockMediaAdapter, RemoteAudio,
};
use gatecall_signaling_core::{
    IceCandidate, MemoryRelay, MemoryTransport, SignalingTransport, UserId,
};

type Party = (
    CallCoordinator<MemoryTransport, MockMediaAdapter>,
    MockMediaAdapter,
);

async fn party(relay: &MemoryRelay, join_as: Option<&str>, config: CallConfig) -> Party {
    let transport = relay.client();
    transport.connect().await.expect("connect");
    if let Some(user) = join_as {
        transport
            .join_user(&UserId::from(user))
            .await
            .expect("join room");
    }
    let media = MockMediaAdapter::new();
    let coordinator = CallCoordinator::new(transport, Arc::new(media.clone()), config);
    coordinator.run();
    (coordinator, media)
}

fn no_timeouts() -> CallConfig {
    CallConfig::default()
        .with_dial_timeout(None)
        .with_ring_timeout(None)
}

#[tokio::test]
async fn full_call_flow_connects_exchanges_media_and_hangs_up() {
    let relay = MemoryRelay::new();
    let (visitor, visitor_media) = party(&relay, None, no_timeouts()).await;
    let (resident, resident_media) = party(&relay, Some("u42"), no_timeouts()).await;
    let mut visitor_events = visitor.subscribe();
    let mut resident_events = resident.subscribe();

    // Visitor dials; resident rings.
    visitor
        .start_call(UserId::from("u42"), "Visitor A", "+1555")
        .await
        .unwrap();
    let event =
        wait_for_event(&mut resident_events, |e| matches!(e, CallEvent::IncomingCall { .. }))
            .await;
    match event {
        CallEvent::IncomingCall { peer } => assert_eq!(peer.display_name, "Visitor A"),
        _ => unreachable!(),
    }
    assert_eq!(resident.state().await, CallState::Ringing);

    // Resident accepts; both sides converge on Connected.
    resident.accept_call().await.unwrap();
    wait_for_state(&visitor, CallState::Connected).await;
    wait_for_state(&resident, CallState::Connected).await;

    // Candidates flow in both directions once connected.
    visitor_media.fire_local_candidate(IceCandidate::new("candidate:visitor"));
    let resident_media_for_wait = resident_media.clone();
    wait_until(move || {
        resident_media_for_wait
            .applied_candidates()
            .iter()
            .any(|c| c.candidate == "candidate:visitor")
    })
    .await;

    resident_media.fire_local_candidate(IceCandidate::new("candidate:resident"));
    let visitor_media_for_wait = visitor_media.clone();
    wait_until(move || {
        visitor_media_for_wait
            .applied_candidates()
            .iter()
            .any(|c| c.candidate == "candidate:resident")
    })
    .await;

    // Remote audio surfaces to the visitor's UI.
    visitor_media.fire_remote_track(RemoteAudio {
        id: "resident-audio".into(),
    });
    wait_for_event(&mut visitor_events, |e| {
        matches!(e, CallEvent::RemoteAudioReady { .. })
    })
    .await;

    // Visitor hangs up; resident observes the remote end.
    visitor.end_call().await.unwrap();
    let event =
        wait_for_event(&mut resident_events, |e| matches!(e, CallEvent::CallEnded { .. })).await;
    match event {
        CallEvent::CallEnded { reason } => assert_eq!(reason, EndReason::RemoteEnded),
        _ => unreachable!(),
    }
    wait_for_state(&visitor, CallState::Idle).await;
    wait_for_state(&resident, CallState::Idle).await;

    // Resource release on both sides, exactly once.
    assert_eq!(visitor_media.acquired_count(), 1);
    assert_eq!(visitor_media.stopped_count(), 1);
    assert_eq!(visitor_media.handles_closed(), visitor_media.handles_created());
    assert_eq!(resident_media.acquired_count(), 1);
    assert_eq!(resident_media.stopped_count(), 1);
    assert_eq!(resident_media.handles_closed(), resident_media.handles_created());
}

#[tokio::test]
async fn rejected_call_resets_the_caller() {
    let relay = MemoryRelay::new();
    let (visitor, visitor_media) = party(&relay, None, no_timeouts()).await;
    let (resident, resident_media) = party(&relay, Some("u42"), no_timeouts()).await;
    let mut visitor_events = visitor.subscribe();
    let mut resident_events = resident.subscribe();

    visitor
        .start_call(UserId::from("u42"), "Visitor A", "+1555")
        .await
        .unwrap();
    wait_for_event(&mut resident_events, |e| matches!(e, CallEvent::IncomingCall { .. })).await;

    resident.reject_call().await.unwrap();

    let event =
        wait_for_event(&mut visitor_events, |e| matches!(e, CallEvent::CallEnded { .. })).await;
    match event {
        CallEvent::CallEnded { reason } => assert_eq!(reason, EndReason::RemoteRejected),
        _ => unreachable!(),
    }
    wait_for_state(&visitor, CallState::Idle).await;
    wait_for_state(&resident, CallState::Idle).await;
    assert_eq!(visitor_media.stopped_count(), 1);
    // The resident never acquired anything for a call it declined.
    assert_eq!(resident_media.acquired_count(), 0);
}

#[tokio::test]
async fn cancelled_dial_stops_the_ringing_callee() {
    let relay = MemoryRelay::new();
    let (visitor, _visitor_media) = party(&relay, None, no_timeouts()).await;
    let (resident, _resident_media) = party(&relay, Some("u42"), no_timeouts()).await;
    let mut resident_events = resident.subscribe();

    visitor
        .start_call(UserId::from("u42"), "Visitor A", "+1555")
        .await
        .unwrap();
    wait_for_event(&mut resident_events, |e| matches!(e, CallEvent::IncomingCall { .. })).await;
    assert_eq!(resident.state().await, CallState::Ringing);

    visitor.end_call().await.unwrap();

    let event =
        wait_for_event(&mut resident_events, |e| matches!(e, CallEvent::CallEnded { .. })).await;
    match event {
        CallEvent::CallEnded { reason } => assert_eq!(reason, EndReason::RemoteRejected),
        _ => unreachable!(),
    }
    wait_for_state(&resident, CallState::Idle).await;
}

#[tokio::test]
async fn unanswered_dial_times_out_on_both_sides() {
    let relay = MemoryRelay::new();
    let caller_config = no_timeouts().with_dial_timeout(Some(Duration::from_millis(100)));
    let (visitor, visitor_media) = party(&relay, None, caller_config).await;
    let (resident, _resident_media) = party(&relay, Some("u42"), no_timeouts()).await;
    let mut visitor_events = visitor.subscribe();

    visitor
        .start_call(UserId::from("u42"), "Visitor A", "+1555")
        .await
        .unwrap();

    let event =
        wait_for_event(&mut visitor_events, |e| matches!(e, CallEvent::CallEnded { .. })).await;
    match event {
        CallEvent::CallEnded { reason } => assert_eq!(reason, EndReason::DialTimeout),
        _ => unreachable!(),
    }
    wait_for_state(&visitor, CallState::Idle).await;
    // The timeout cancellation reaches the ringing callee too.
    wait_for_state(&resident, CallState::Idle).await;
    assert_eq!(visitor_media.stopped_count(), 1);
}

#[tokio::test]
async fn second_caller_gets_busy_rejection() {
    let relay = MemoryRelay::new();
    let (first, _first_media) = party(&relay, None, no_timeouts()).await;
    let (second, second_media) = party(&relay, None, no_timeouts()).await;
    let (resident, _resident_media) = party(&relay, Some("u42"), no_timeouts()).await;
    let mut second_events = second.subscribe();
    let mut resident_events = resident.subscribe();

    first
        .start_call(UserId::from("u42"), "Visitor A", "+1555")
        .await
        .unwrap();
    wait_for_event(&mut resident_events, |e| matches!(e, CallEvent::IncomingCall { .. })).await;

    second
        .start_call(UserId::from("u42"), "Visitor B", "+1666")
        .await
        .unwrap();

    // The busy resident turns the second caller away without disturbing the
    // first call attempt.
    let event =
        wait_for_event(&mut second_events, |e| matches!(e, CallEvent::CallEnded { .. })).await;
    match event {
        CallEvent::CallEnded { reason } => assert_eq!(reason, EndReason::RemoteRejected),
        _ => unreachable!(),
    }
    wait_for_state(&second, CallState::Idle).await;
    assert_eq!(second_media.stopped_count(), 1);
    assert_eq!(resident.state().await, CallState::Ringing);
}
