//! Shared fixtures for call-core integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use gatecall_call_core::{CallCoordinator, CallEvent, CallState, MediaAdapter};
use gatecall_signaling_core::{
    ClientSignal, SessionToken, SignalingTransport, TransportError, TransportEvent, UserId,
};

/// Transport that records everything emitted and never delivers anywhere.
/// Inbound signals are driven directly through
/// `CallCoordinator::handle_transport_event` by the tests.
pub struct RecordingTransport {
    token: SessionToken,
    sent: Mutex<Vec<ClientSignal>>,
    fail_routing: AtomicBool,
    tx: broadcast::Sender<TransportEvent>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            token: SessionToken::generate(),
            sent: Mutex::new(Vec::new()),
            fail_routing: AtomicBool::new(false),
            tx: broadcast::channel(64).0,
        }
    }

    /// Snapshot of every signal emitted so far, in order.
    pub fn sent(&self) -> Vec<ClientSignal> {
        self.sent.lock().unwrap().clone()
    }

    /// Make every subsequent emit fail as undeliverable.
    pub fn set_fail_routing(&self, fail: bool) {
        self.fail_routing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SignalingTransport for RecordingTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) {
        let _ = self.tx.send(TransportEvent::Disconnected);
    }

    async fn join_user(&self, _user: &UserId) -> Result<(), TransportError> {
        Ok(())
    }

    async fn emit(&self, signal: ClientSignal) -> Result<(), TransportError> {
        if self.fail_routing.load(Ordering::SeqCst) {
            return Err(TransportError::routing("recording transport"));
        }
        self.sent.lock().unwrap().push(signal);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }

    fn session_token(&self) -> Option<SessionToken> {
        Some(self.token.clone())
    }
}

/// Receive the next UI event within a deadline.
pub async fn next_event(rx: &mut broadcast::Receiver<CallEvent>) -> CallEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for call event")
        .expect("event channel closed")
}

/// Skip events until one matches the predicate.
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<CallEvent>,
    mut matches: impl FnMut(&CallEvent) -> bool,
) -> CallEvent {
    loop {
        let event = next_event(rx).await;
        if matches(&event) {
            return event;
        }
    }
}

/// Poll a synchronous condition until it holds or a deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

/// Poll the coordinator until it reaches the target state.
pub async fn wait_for_state<T, M>(coordinator: &CallCoordinator<T, M>, target: CallState)
where
    T: SignalingTransport,
    M: MediaAdapter,
{
    for _ in 0..100 {
        if coordinator.state().await == target {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "coordinator never reached {target}, still {}",
        coordinator.state().await
    );
}
