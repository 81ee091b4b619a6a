//! The call session coordinator.
//!
//! Owns the one [`CallSession`] a client may have, validates every transition
//! against the current state, and produces the outbound signaling and media
//! directives for each one. All transitions run to completion under the
//! session lock; the async legs (audio acquisition, offer/answer
//! construction) run outside it with the state already advanced, and
//! re-validate the session generation before applying their results, so a
//! terminal event arriving mid-setup always wins.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::CallConfig;
use crate::errors::{CallError, CallResult, NegotiationError};
use crate::events::CallEvent;
use crate::media::{LocalAudioHandle, MediaAdapter, NegotiationHandle, RemoteAudio};
use crate::session::CallSession;
use crate::types::{CallState, EndReason, PeerInfo};
use gatecall_signaling_core::envelope::{
    CallAnswer, CallAnswered, CallStart, CandidateIn, CandidateOut,
    IncomingCall as IncomingCallSignal, Terminate,
};
use gatecall_signaling_core::{
    ClientSignal, IceCandidate, ServerSignal, SignalAddress, SignalingTransport, TransportEvent,
    UserId,
};

/// Per-client coordinator for a single concurrent audio call.
///
/// Cheap to clone; all clones share the same session.
pub struct CallCoordinator<T, M>
where
    T: SignalingTransport,
    M: MediaAdapter,
{
    inner: Arc<Inner<T, M>>,
}

impl<T, M> Clone for CallCoordinator<T, M>
where
    T: SignalingTransport,
    M: MediaAdapter,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T, M: MediaAdapter> {
    config: CallConfig,
    transport: Arc<T>,
    media: Arc<M>,
    session: Mutex<CallSession<M>>,
    events: broadcast::Sender<CallEvent>,
}

impl<T, M> CallCoordinator<T, M>
where
    T: SignalingTransport,
    M: MediaAdapter,
{
    pub fn new(transport: Arc<T>, media: Arc<M>, config: CallConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                media,
                session: Mutex::new(CallSession::new()),
                events,
            }),
        }
    }

    /// Subscribe to UI-facing call events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.inner.events.subscribe()
    }

    /// Current session state.
    pub async fn state(&self) -> CallState {
        self.inner.session.lock().await.state
    }

    /// Advisory identity of the remote party, while a session exists.
    pub async fn peer(&self) -> Option<PeerInfo> {
        self.inner.session.lock().await.peer.clone()
    }

    /// Reference to the far end's audio, once negotiation has completed.
    pub async fn remote_audio(&self) -> Option<RemoteAudio> {
        self.inner.session.lock().await.remote_audio.clone()
    }

    /// Drive the coordinator off the transport's inbound stream.
    pub fn run(&self) -> JoinHandle<()> {
        let this = self.clone();
        let mut inbound = self.inner.transport.subscribe();
        tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(event) => this.handle_transport_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "inbound signal stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // ===== PUBLIC OPERATIONS =====

    /// Place an outbound call to `target`'s room.
    ///
    /// Enters Dialing immediately; a second `start_call` while any session is
    /// live fails with [`CallError::AlreadyInCall`] and leaves the existing
    /// session untouched.
    pub async fn start_call(
        &self,
        target: UserId,
        caller_name: impl Into<String>,
        caller_phone: impl Into<String>,
    ) -> CallResult<()> {
        let caller_name = caller_name.into();
        let caller_phone = caller_phone.into();

        let generation = {
            let mut s = self.inner.session.lock().await;
            if s.state.is_busy() {
                return Err(CallError::AlreadyInCall(s.state));
            }
            let generation = s.begin(CallState::Dialing);
            s.remote_user = Some(target.clone());
            info!(session_id = %s.session_id, %target, "starting outbound call");
            self.emit_state_change(CallState::Idle, CallState::Dialing);
            generation
        };

        let audio = match self.inner.media.acquire_local_audio().await {
            Ok(audio) => audio,
            Err(error) => {
                warn!(%error, "local audio acquisition failed");
                self.reset_if_generation(generation, EndReason::MediaFailed)
                    .await;
                return Err(error.into());
            }
        };
        let mut negotiation = self.new_negotiation(generation).await;

        let offer = match negotiation.create_offer().await {
            Ok(offer) => offer,
            Err(error) => {
                warn!(%error, "local offer construction failed");
                audio.stop();
                negotiation.close();
                self.reset_if_generation(generation, EndReason::NegotiationFailed)
                    .await;
                return Err(error.into());
            }
        };

        {
            let mut s = self.inner.session.lock().await;
            if s.generation != generation || s.state != CallState::Dialing {
                debug!("call superseded during setup, discarding media resources");
                audio.stop();
                negotiation.close();
                return Ok(());
            }
            s.local_audio = Some(audio);
            s.negotiation = Some(negotiation);
        }

        let signal = ClientSignal::CallStart(CallStart {
            to_user_id: target,
            offer,
            visitor_name: caller_name,
            visitor_phone: caller_phone,
        });
        if let Err(error) = self.inner.transport.emit(signal).await {
            warn!(%error, "call-start undeliverable");
            self.reset_if_generation(generation, EndReason::TransportLost)
                .await;
            return Err(error.into());
        }

        self.arm_timeout(
            generation,
            CallState::Dialing,
            self.inner.config.dial_timeout,
            EndReason::DialTimeout,
        );
        Ok(())
    }

    /// Accept the ringing inbound call.
    pub async fn accept_call(&self) -> CallResult<()> {
        let (generation, offer, token) = {
            let mut s = self.inner.session.lock().await;
            if s.state != CallState::Ringing {
                return Err(CallError::invalid_state("accept_call", s.state));
            }
            let offer = s
                .pending_remote_offer
                .clone()
                .ok_or_else(|| CallError::internal("ringing session has no stored offer"))?;
            let token = s
                .remote_token
                .clone()
                .ok_or_else(|| CallError::internal("ringing session has no remote token"))?;
            s.state = CallState::Connected;
            info!(session_id = %s.session_id, "accepting inbound call");
            self.emit_state_change(CallState::Ringing, CallState::Connected);
            (s.generation, offer, token)
        };

        let audio = match self.inner.media.acquire_local_audio().await {
            Ok(audio) => audio,
            Err(error) => {
                warn!(%error, "local audio acquisition failed");
                self.reset_if_generation(generation, EndReason::MediaFailed)
                    .await;
                return Err(error.into());
            }
        };
        let mut negotiation = self.new_negotiation(generation).await;

        let answer = match negotiation.create_answer(&offer).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, "remote offer could not be answered");
                audio.stop();
                negotiation.close();
                self.reset_if_generation(generation, EndReason::NegotiationFailed)
                    .await;
                return Err(error.into());
            }
        };

        let mut s = self.inner.session.lock().await;
        if s.generation != generation || s.state != CallState::Connected {
            debug!("accept superseded during setup, discarding media resources");
            audio.stop();
            negotiation.close();
            return Ok(());
        }
        s.local_audio = Some(audio);
        s.negotiation = Some(negotiation);
        s.remote_applied = true;
        if let Err(error) = Self::flush_buffered(&mut s).await {
            warn!(%error, "buffered candidate rejected");
            self.reset_locked(&mut s, EndReason::NegotiationFailed);
            return Err(error.into());
        }

        // The answer leaves under the lock: the peer token is only valid
        // while this session instance is, and terminal events queue behind
        // the lock until the emit has happened.
        let signal = ClientSignal::CallAnswer(CallAnswer {
            to_socket_id: token,
            answer,
        });
        if let Err(error) = self.inner.transport.emit(signal).await {
            warn!(%error, "call-answer undeliverable");
            self.reset_locked(&mut s, EndReason::TransportLost);
            return Err(error.into());
        }
        Ok(())
    }

    /// Decline the ringing inbound call.
    pub async fn reject_call(&self) -> CallResult<()> {
        let token = {
            let mut s = self.inner.session.lock().await;
            if s.state != CallState::Ringing {
                return Err(CallError::invalid_state("reject_call", s.state));
            }
            let token = s.remote_token.clone();
            info!(session_id = %s.session_id, "rejecting inbound call");
            self.reset_locked(&mut s, EndReason::LocalRejected);
            token
        };
        if let Some(token) = token {
            let signal = ClientSignal::CallRejected(Terminate::to(SignalAddress::Socket(token)));
            if let Err(error) = self.inner.transport.emit(signal).await {
                debug!(%error, "call-rejected undeliverable (peer already gone)");
            }
        }
        Ok(())
    }

    /// Hang up. In Dialing this cancels the attempt (the peer sees
    /// `call-rejected`); in Connected it terminates the call (`call-end`).
    pub async fn end_call(&self) -> CallResult<()> {
        let outbound = {
            let mut s = self.inner.session.lock().await;
            match s.state {
                CallState::Idle | CallState::Ringing => {
                    return Err(CallError::invalid_state("end_call", s.state));
                }
                CallState::Dialing => {
                    let address = s.peer_address();
                    info!(session_id = %s.session_id, "cancelling outbound call");
                    self.reset_locked(&mut s, EndReason::Cancelled);
                    address.map(|a| ClientSignal::CallRejected(Terminate::to(a)))
                }
                CallState::Connected => {
                    let address = s.peer_address();
                    info!(session_id = %s.session_id, "ending call");
                    self.reset_locked(&mut s, EndReason::LocalHangup);
                    address.map(|a| ClientSignal::CallEnd(Terminate::to(a)))
                }
            }
        };
        if let Some(signal) = outbound {
            if let Err(error) = self.inner.transport.emit(signal).await {
                debug!(%error, "terminal signal undeliverable (peer already gone)");
            }
        }
        Ok(())
    }

    // ===== INBOUND SIGNALS =====

    /// Feed one transport event through the state machine.
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Signal(signal) => self.handle_signal(signal).await,
            TransportEvent::Disconnected => {
                let mut s = self.inner.session.lock().await;
                if s.state.is_busy() {
                    warn!(session_id = %s.session_id, "transport lost mid-call");
                    self.reset_locked(&mut s, EndReason::TransportLost);
                }
            }
        }
    }

    async fn handle_signal(&self, signal: ServerSignal) {
        trace!(event = signal.event(), "inbound signal");
        match signal {
            ServerSignal::IncomingCall(m) => self.on_incoming_call(m).await,
            ServerSignal::CallAnswered(m) => self.on_call_answered(m).await,
            ServerSignal::IceCandidate(m) => self.on_ice_candidate(m).await,
            ServerSignal::CallRejected => self.on_remote_terminal(EndReason::RemoteRejected).await,
            ServerSignal::CallEnded => self.on_remote_terminal(EndReason::RemoteEnded).await,
        }
    }

    async fn on_incoming_call(&self, m: IncomingCallSignal) {
        let busy_reject = {
            let mut s = self.inner.session.lock().await;
            if s.state.is_busy() {
                debug!(state = %s.state, "busy, declining overlapping incoming call");
                Some(m.from_socket_id.clone())
            } else {
                let generation = s.begin(CallState::Ringing);
                let peer = PeerInfo::from(&m);
                s.remote_token = Some(m.from_socket_id);
                s.pending_remote_offer = Some(m.offer);
                s.peer = Some(peer.clone());
                info!(
                    session_id = %s.session_id,
                    caller = %peer.display_name,
                    "incoming call"
                );
                self.emit_event(CallEvent::IncomingCall { peer });
                self.emit_state_change(CallState::Idle, CallState::Ringing);
                self.arm_timeout(
                    generation,
                    CallState::Ringing,
                    self.inner.config.ring_timeout,
                    EndReason::RingTimeout,
                );
                None
            }
        };
        if let Some(token) = busy_reject {
            let signal = ClientSignal::CallRejected(Terminate::to(SignalAddress::Socket(token)));
            if let Err(error) = self.inner.transport.emit(signal).await {
                debug!(%error, "busy rejection undeliverable");
            }
        }
    }

    async fn on_call_answered(&self, m: CallAnswered) {
        let mut s = self.inner.session.lock().await;
        if s.state != CallState::Dialing {
            debug!(state = %s.state, "dropping call-answered outside Dialing");
            return;
        }
        let Some(negotiation) = s.negotiation.as_mut() else {
            warn!("call-answered before local negotiation was ready, resetting");
            self.reset_locked(&mut s, EndReason::NegotiationFailed);
            return;
        };
        if let Err(error) = negotiation.apply_remote_description(&m.answer).await {
            warn!(%error, "remote answer rejected");
            self.reset_locked(&mut s, EndReason::NegotiationFailed);
            return;
        }
        s.remote_applied = true;
        s.state = CallState::Connected;
        info!(session_id = %s.session_id, "call answered");
        self.emit_state_change(CallState::Dialing, CallState::Connected);
        if let Err(error) = Self::flush_buffered(&mut s).await {
            warn!(%error, "buffered candidate rejected");
            self.reset_locked(&mut s, EndReason::NegotiationFailed);
        }
    }

    async fn on_ice_candidate(&self, m: CandidateIn) {
        let max = self.inner.config.max_buffered_candidates;
        let mut s = self.inner.session.lock().await;
        if s.state.is_idle() {
            trace!("dropping candidate with no active session");
            return;
        }
        // The answer payload carries no token, so an outbound call learns the
        // peer's socket here and upgrades from room to token addressing.
        if s.remote_token.is_none() {
            s.remote_token = m.from_socket_id.clone();
        }
        if s.candidates_ready() {
            let Some(negotiation) = s.negotiation.as_mut() else {
                return;
            };
            if let Err(error) = negotiation.add_ice_candidate(&m.candidate).await {
                warn!(%error, "remote candidate rejected");
                self.reset_locked(&mut s, EndReason::NegotiationFailed);
            }
        } else {
            trace!("buffering candidate until negotiation is ready");
            s.buffer_candidate(m.candidate, max);
        }
    }

    async fn on_remote_terminal(&self, reason: EndReason) {
        let mut s = self.inner.session.lock().await;
        if s.state.is_idle() {
            // Duplicate or crossed terminal signals are expected; ignore.
            debug!("terminal signal while Idle, ignoring");
            return;
        }
        info!(session_id = %s.session_id, %reason, "remote terminated call");
        self.reset_locked(&mut s, reason);
    }

    // ===== INTERNALS =====

    /// Construct a fresh negotiation handle with its candidate and remote
    /// track pumps attached under the given generation.
    async fn new_negotiation(&self, generation: u64) -> M::Negotiation {
        let mut negotiation = self.inner.media.create_negotiation().await;
        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();
        negotiation.set_candidate_sink(candidate_tx);
        let (track_tx, track_rx) = mpsc::unbounded_channel();
        negotiation.set_remote_track_sink(track_tx);
        self.spawn_candidate_pump(generation, candidate_rx);
        self.spawn_remote_track_pump(generation, track_rx);
        negotiation
    }

    /// Apply buffered candidates in arrival order. Caller holds the lock and
    /// has just made the negotiation ready.
    async fn flush_buffered(s: &mut CallSession<M>) -> Result<(), NegotiationError> {
        let queued: Vec<IceCandidate> = s.pending_candidates.drain(..).collect();
        if queued.is_empty() {
            return Ok(());
        }
        let Some(negotiation) = s.negotiation.as_mut() else {
            return Ok(());
        };
        debug!(count = queued.len(), "flushing buffered candidates");
        for candidate in &queued {
            negotiation.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    /// Forward locally discovered candidates to the peer for as long as the
    /// generation stays current.
    fn spawn_candidate_pump(
        &self,
        generation: u64,
        mut rx: mpsc::UnboundedReceiver<IceCandidate>,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(candidate) = rx.recv().await {
                let address = {
                    let s = this.inner.session.lock().await;
                    if s.generation != generation {
                        debug!("stale candidate pump exiting");
                        return;
                    }
                    s.peer_address()
                };
                let Some(address) = address else {
                    continue;
                };
                let signal = ClientSignal::IceCandidate(CandidateOut::to(address, candidate));
                if let Err(error) = this.inner.transport.emit(signal).await {
                    debug!(%error, "local candidate undeliverable");
                    this.reset_if_generation(generation, EndReason::TransportLost)
                        .await;
                    return;
                }
            }
        });
    }

    /// Surface remote audio to the UI for as long as the generation stays
    /// current.
    fn spawn_remote_track_pump(
        &self,
        generation: u64,
        mut rx: mpsc::UnboundedReceiver<RemoteAudio>,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(audio) = rx.recv().await {
                let mut s = this.inner.session.lock().await;
                if s.generation != generation {
                    debug!("stale remote track pump exiting");
                    return;
                }
                s.remote_audio = Some(audio.clone());
                info!(session_id = %s.session_id, "remote audio available");
                this.emit_event(CallEvent::RemoteAudioReady { audio });
            }
        });
    }

    /// Auto-terminate a session stuck in `expected` past `duration`. The
    /// timer captures the generation, so it is a no-op once the session has
    /// moved on.
    fn arm_timeout(
        &self,
        generation: u64,
        expected: CallState,
        duration: Option<std::time::Duration>,
        reason: EndReason,
    ) {
        let Some(duration) = duration else { return };
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let address = {
                let mut s = this.inner.session.lock().await;
                if s.generation != generation || s.state != expected {
                    return;
                }
                warn!(session_id = %s.session_id, state = %expected, %reason, "call timed out");
                let address = s.peer_address();
                this.reset_locked(&mut s, reason);
                address
            };
            if let Some(address) = address {
                let signal = ClientSignal::CallRejected(Terminate::to(address));
                if let Err(error) = this.inner.transport.emit(signal).await {
                    debug!(%error, "timeout rejection undeliverable");
                }
            }
        });
    }

    /// Tear down and emit the end-of-call notice followed by the state
    /// change into Idle.
    fn reset_locked(&self, s: &mut CallSession<M>, reason: EndReason) {
        let previous = s.reset();
        debug!(%previous, %reason, "session reset");
        self.emit_event(CallEvent::CallEnded { reason });
        self.emit_state_change(previous, CallState::Idle);
    }

    /// Reset only if the session is still the one the caller was working on.
    async fn reset_if_generation(&self, generation: u64, reason: EndReason) {
        let mut s = self.inner.session.lock().await;
        if s.generation == generation && s.state.is_busy() {
            self.reset_locked(&mut s, reason);
        } else {
            debug!("stale reset discarded");
        }
    }

    fn emit_state_change(&self, previous: CallState, current: CallState) {
        self.emit_event(CallEvent::StateChanged { previous, current });
    }

    fn emit_event(&self, event: CallEvent) {
        // Send fails only when nobody subscribes, which is fine.
        let _ = self.inner.events.send(event);
    }
}
