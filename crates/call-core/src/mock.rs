//! Scripted media adapter for deterministic tests and demos.
//!
//! Records every acquisition, release, close, and applied descriptor or
//! candidate, and can be primed to fail or stall the next operation. No real
//! audio or network is involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::errors::{CapabilityError, NegotiationError};
use crate::media::{LocalAudioHandle, MediaAdapter, NegotiationHandle, RemoteAudio};
use gatecall_signaling_core::{IceCandidate, SessionDescription};

#[derive(Default)]
struct MockShared {
    acquired: AtomicUsize,
    stopped: AtomicUsize,
    handles_created: AtomicUsize,
    handles_closed: AtomicUsize,
    offer_seq: AtomicUsize,
    fail_acquire: Mutex<Option<CapabilityError>>,
    fail_offer: Mutex<Option<NegotiationError>>,
    fail_apply: Mutex<Option<NegotiationError>>,
    fail_candidate: Mutex<Option<NegotiationError>>,
    acquire_gate: Mutex<Option<oneshot::Receiver<()>>>,
    answer_gate: Mutex<Option<oneshot::Receiver<()>>>,
    applied_descriptions: Mutex<Vec<SessionDescription>>,
    applied_candidates: Mutex<Vec<IceCandidate>>,
    candidate_sinks: Mutex<Vec<mpsc::UnboundedSender<IceCandidate>>>,
    track_sinks: Mutex<Vec<mpsc::UnboundedSender<RemoteAudio>>>,
}

/// Deterministic [`MediaAdapter`] implementation.
#[derive(Clone, Default)]
pub struct MockMediaAdapter {
    shared: Arc<MockShared>,
}

impl MockMediaAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- scripting -----

    /// Make the next `acquire_local_audio` fail with the given error.
    pub fn fail_next_acquire(&self, error: CapabilityError) {
        *self.shared.fail_acquire.lock().expect("lock poisoned") = Some(error);
    }

    /// Make the next offer construction fail.
    pub fn fail_next_offer(&self, error: NegotiationError) {
        *self.shared.fail_offer.lock().expect("lock poisoned") = Some(error);
    }

    /// Make the next remote-descriptor application (or answer build) fail.
    pub fn fail_next_apply(&self, error: NegotiationError) {
        *self.shared.fail_apply.lock().expect("lock poisoned") = Some(error);
    }

    /// Make the next candidate application fail.
    pub fn fail_next_candidate(&self, error: NegotiationError) {
        *self.shared.fail_candidate.lock().expect("lock poisoned") = Some(error);
    }

    /// Stall the next `acquire_local_audio` until the returned sender fires
    /// (or is dropped). Lets a test interleave events mid-acquisition.
    pub fn gate_next_acquire(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.shared.acquire_gate.lock().expect("lock poisoned") = Some(rx);
        tx
    }

    /// Stall the next `create_answer` until the returned sender fires (or is
    /// dropped). Lets a test interleave events mid-answer.
    pub fn gate_next_answer(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.shared.answer_gate.lock().expect("lock poisoned") = Some(rx);
        tx
    }

    // ----- adapter-driven callbacks -----

    /// Deliver a locally discovered candidate to every installed sink.
    pub fn fire_local_candidate(&self, candidate: IceCandidate) {
        let sinks = self.shared.candidate_sinks.lock().expect("lock poisoned");
        for sink in sinks.iter() {
            let _ = sink.send(candidate.clone());
        }
    }

    /// Announce remote audio to every installed sink.
    pub fn fire_remote_track(&self, audio: RemoteAudio) {
        let sinks = self.shared.track_sinks.lock().expect("lock poisoned");
        for sink in sinks.iter() {
            let _ = sink.send(audio.clone());
        }
    }

    // ----- assertions -----

    pub fn acquired_count(&self) -> usize {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    pub fn stopped_count(&self) -> usize {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn handles_created(&self) -> usize {
        self.shared.handles_created.load(Ordering::SeqCst)
    }

    pub fn handles_closed(&self) -> usize {
        self.shared.handles_closed.load(Ordering::SeqCst)
    }

    pub fn applied_descriptions(&self) -> Vec<SessionDescription> {
        self.shared
            .applied_descriptions
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.shared
            .applied_candidates
            .lock()
            .expect("lock poisoned")
            .clone()
    }
}

/// Capture handle handed out by the mock.
pub struct MockLocalAudio {
    shared: Arc<MockShared>,
}

impl LocalAudioHandle for MockLocalAudio {
    fn stop(self) {
        self.shared.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Negotiation handle handed out by the mock.
pub struct MockNegotiation {
    shared: Arc<MockShared>,
    closed: bool,
}

impl MockNegotiation {
    fn take_scripted(
        &self,
        slot: &Mutex<Option<NegotiationError>>,
    ) -> Result<(), NegotiationError> {
        if self.closed {
            return Err(NegotiationError::Closed);
        }
        match slot.lock().expect("lock poisoned").take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NegotiationHandle for MockNegotiation {
    async fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError> {
        self.take_scripted(&self.shared.fail_offer)?;
        let n = self.shared.offer_seq.fetch_add(1, Ordering::SeqCst);
        Ok(SessionDescription::offer(format!("v=0 mock-offer-{n}")))
    }

    async fn create_answer(
        &mut self,
        remote_offer: &SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        let gate = self.shared.answer_gate.lock().expect("lock poisoned").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.take_scripted(&self.shared.fail_apply)?;
        self.shared
            .applied_descriptions
            .lock()
            .expect("lock poisoned")
            .push(remote_offer.clone());
        let n = self.shared.offer_seq.fetch_add(1, Ordering::SeqCst);
        Ok(SessionDescription::answer(format!("v=0 mock-answer-{n}")))
    }

    async fn apply_remote_description(
        &mut self,
        descriptor: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.take_scripted(&self.shared.fail_apply)?;
        self.shared
            .applied_descriptions
            .lock()
            .expect("lock poisoned")
            .push(descriptor.clone());
        Ok(())
    }

    async fn add_ice_candidate(
        &mut self,
        candidate: &IceCandidate,
    ) -> Result<(), NegotiationError> {
        self.take_scripted(&self.shared.fail_candidate)?;
        self.shared
            .applied_candidates
            .lock()
            .expect("lock poisoned")
            .push(candidate.clone());
        Ok(())
    }

    fn set_candidate_sink(&mut self, sink: mpsc::UnboundedSender<IceCandidate>) {
        self.shared
            .candidate_sinks
            .lock()
            .expect("lock poisoned")
            .push(sink);
    }

    fn set_remote_track_sink(&mut self, sink: mpsc::UnboundedSender<RemoteAudio>) {
        self.shared
            .track_sinks
            .lock()
            .expect("lock poisoned")
            .push(sink);
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.handles_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl MediaAdapter for MockMediaAdapter {
    type LocalAudio = MockLocalAudio;
    type Negotiation = MockNegotiation;

    async fn acquire_local_audio(&self) -> Result<Self::LocalAudio, CapabilityError> {
        let gate = self.shared.acquire_gate.lock().expect("lock poisoned").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(error) = self.shared.fail_acquire.lock().expect("lock poisoned").take() {
            return Err(error);
        }
        self.shared.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MockLocalAudio {
            shared: Arc::clone(&self.shared),
        })
    }

    async fn create_negotiation(&self) -> Self::Negotiation {
        self.shared.handles_created.fetch_add(1, Ordering::SeqCst);
        MockNegotiation {
            shared: Arc::clone(&self.shared),
            closed: false,
        }
    }
}
