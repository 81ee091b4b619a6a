//! Two in-process parties talking through the in-memory relay: a visitor at
//! the gate dials a resident, the resident accepts, audio "connects", and the
//! visitor hangs up.
//!
//! Run with: cargo run -p gatecall-call-core --example intercom_demo

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use gatecall_call_core::{
    CallConfig, CallCoordinator, CallEvent, MockMediaAdapter, RemoteAudio,
};
use gatecall_signaling_core::{IceCandidate, MemoryRelay, SignalingTransport, UserId};
use tokio::time::sleep;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let relay = MemoryRelay::new();

    // Resident's device: joins their user room and waits.
    let resident_transport = relay.client();
    resident_transport.connect().await?;
    resident_transport.join_user(&UserId::from("resident-42")).await?;
    let resident_media = MockMediaAdapter::new();
    let resident = CallCoordinator::new(
        resident_transport,
        Arc::new(resident_media.clone()),
        CallConfig::default(),
    );
    resident.run();

    // Auto-answer incoming calls on the resident side.
    {
        let resident = resident.clone();
        let mut events = resident.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let CallEvent::IncomingCall { peer } = event {
                    info!(caller = %peer.display_name, phone = %peer.phone, "resident accepting");
                    if let Err(error) = resident.accept_call().await {
                        info!(%error, "accept failed");
                    }
                }
            }
        });
    }

    // Visitor panel at the gate.
    let visitor_transport = relay.client();
    visitor_transport.connect().await?;
    let visitor_media = MockMediaAdapter::new();
    let visitor = CallCoordinator::new(
        visitor_transport,
        Arc::new(visitor_media.clone()),
        CallConfig::default(),
    );
    visitor.run();
    let mut visitor_events = visitor.subscribe();

    visitor
        .start_call(UserId::from("resident-42"), "Visitor at Gate 1", "+1-555-0100")
        .await?;

    // Simulate the media stack doing its thing.
    sleep(Duration::from_millis(100)).await;
    visitor_media.fire_local_candidate(IceCandidate::new("candidate:demo"));
    visitor_media.fire_remote_track(RemoteAudio {
        id: "resident-voice".into(),
    });

    // Watch the visitor's call progress for a moment, then hang up.
    let watcher = tokio::spawn(async move {
        while let Ok(event) = visitor_events.recv().await {
            match event {
                CallEvent::StateChanged { previous, current } => {
                    info!(%previous, %current, "visitor call state");
                }
                CallEvent::RemoteAudioReady { audio } => {
                    info!(track = %audio.id, "visitor hears the resident");
                }
                CallEvent::CallEnded { reason } => {
                    info!(%reason, "visitor call over");
                    break;
                }
                _ => {}
            }
        }
    });

    sleep(Duration::from_millis(300)).await;
    visitor.end_call().await?;
    let _ = watcher.await;

    info!("demo complete");
    Ok(())
}
