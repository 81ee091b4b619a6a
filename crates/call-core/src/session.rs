//! Per-client session record.
//!
//! Exactly one of these exists per coordinator, guarded by the coordinator's
//! lock. The generation counter distinguishes successive call attempts: every
//! `begin` and every `reset` advances it, and any async continuation started
//! under an older generation must discard its result.

use std::collections::VecDeque;

use tracing::warn;

use crate::media::{LocalAudioHandle, MediaAdapter, NegotiationHandle, RemoteAudio};
use crate::types::{CallState, PeerInfo, SessionId};
use gatecall_signaling_core::{
    IceCandidate, SessionDescription, SessionToken, SignalAddress, UserId,
};

pub(crate) struct CallSession<M: MediaAdapter> {
    pub state: CallState,
    pub generation: u64,
    pub session_id: SessionId,
    /// Peer's ephemeral signaling token; invalid the moment a terminal event
    /// is processed.
    pub remote_token: Option<SessionToken>,
    /// Callee's user id, for room addressing before the peer reveals a token
    /// (outbound calls only).
    pub remote_user: Option<UserId>,
    pub peer: Option<PeerInfo>,
    /// Remote offer held while Ringing, applied on accept.
    pub pending_remote_offer: Option<SessionDescription>,
    pub local_audio: Option<M::LocalAudio>,
    pub negotiation: Option<M::Negotiation>,
    /// Whether the remote descriptor has been applied to `negotiation`;
    /// candidates are buffered until then.
    pub remote_applied: bool,
    pub pending_candidates: VecDeque<IceCandidate>,
    pub remote_audio: Option<RemoteAudio>,
}

impl<M: MediaAdapter> CallSession<M> {
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
            generation: 0,
            session_id: SessionId::new(),
            remote_token: None,
            remote_user: None,
            peer: None,
            pending_remote_offer: None,
            local_audio: None,
            negotiation: None,
            remote_applied: false,
            pending_candidates: VecDeque::new(),
            remote_audio: None,
        }
    }

    /// Start a new session instance in the given state. Advances the
    /// generation so continuations of any prior instance go stale.
    pub fn begin(&mut self, state: CallState) -> u64 {
        debug_assert!(self.state.is_idle(), "begin() from non-Idle state");
        self.generation += 1;
        self.session_id = SessionId::new();
        self.state = state;
        self.generation
    }

    /// Tear the session down to Idle, releasing every owned resource exactly
    /// once. Returns the state the session was in before the reset.
    pub fn reset(&mut self) -> CallState {
        let previous = self.state;
        if let Some(audio) = self.local_audio.take() {
            audio.stop();
        }
        if let Some(mut negotiation) = self.negotiation.take() {
            negotiation.close();
        }
        self.remote_token = None;
        self.remote_user = None;
        self.peer = None;
        self.pending_remote_offer = None;
        self.remote_applied = false;
        self.pending_candidates.clear();
        self.remote_audio = None;
        self.state = CallState::Idle;
        self.generation += 1;
        previous
    }

    /// Best routable address for the peer: token once known, room otherwise.
    pub fn peer_address(&self) -> Option<SignalAddress> {
        self.remote_token
            .clone()
            .map(SignalAddress::Socket)
            .or_else(|| self.remote_user.clone().map(SignalAddress::User))
    }

    /// Whether inbound candidates can go straight into the negotiation.
    pub fn candidates_ready(&self) -> bool {
        self.remote_applied && self.negotiation.is_some()
    }

    /// Buffer a candidate that arrived ahead of the negotiation handle,
    /// dropping the oldest entry past the bound.
    pub fn buffer_candidate(&mut self, candidate: IceCandidate, max: usize) {
        if self.pending_candidates.len() >= max {
            self.pending_candidates.pop_front();
            warn!(
                session_id = %self.session_id,
                "candidate buffer full, dropping oldest"
            );
        }
        self.pending_candidates.push_back(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMediaAdapter;
    use crate::media::MediaAdapter as _;

    #[tokio::test]
    async fn reset_releases_resources_and_advances_generation() {
        let adapter = MockMediaAdapter::new();
        let mut session: CallSession<MockMediaAdapter> = CallSession::new();
        let generation = session.begin(CallState::Dialing);

        session.local_audio = Some(adapter.acquire_local_audio().await.unwrap());
        session.negotiation = Some(adapter.create_negotiation().await);
        session.pending_candidates.push_back(IceCandidate::new("candidate:1"));

        let previous = session.reset();
        assert_eq!(previous, CallState::Dialing);
        assert_eq!(session.state, CallState::Idle);
        assert!(session.generation > generation);
        assert!(session.pending_candidates.is_empty());
        assert_eq!(adapter.stopped_count(), 1);
        assert_eq!(adapter.handles_closed(), 1);
    }

    #[test]
    fn candidate_buffer_is_bounded() {
        let mut session: CallSession<MockMediaAdapter> = CallSession::new();
        for n in 0..5 {
            session.buffer_candidate(IceCandidate::new(format!("candidate:{n}")), 3);
        }
        assert_eq!(session.pending_candidates.len(), 3);
        // Oldest entries were dropped first.
        assert_eq!(session.pending_candidates[0].candidate, "candidate:2");
        assert_eq!(session.pending_candidates[2].candidate, "candidate:4");
    }

    #[test]
    fn peer_address_prefers_token() {
        let mut session: CallSession<MockMediaAdapter> = CallSession::new();
        session.remote_user = Some(UserId::from("u42"));
        assert_eq!(
            session.peer_address(),
            Some(SignalAddress::User(UserId::from("u42")))
        );
        session.remote_token = Some(SessionToken::from("sock-1"));
        assert_eq!(
            session.peer_address(),
            Some(SignalAddress::Socket(SessionToken::from("sock-1")))
        );
    }
}
