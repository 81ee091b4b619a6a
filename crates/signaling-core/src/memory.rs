//! In-process relay and transport for tests and demos.
//!
//! [`MemoryRelay`] reproduces the hosted relay's routing semantics: a
//! `call-start` addressed to a user room is delivered to the room's members as
//! `incoming-call` carrying the sender's token in `fromSocketId`; a
//! `call-answer` addressed to a socket arrives as `call-answered`; candidates
//! and terminal events are forwarded unchanged. Undeliverable messages fail
//! with a routing error, which is exactly what a disconnected peer looks like
//! to the session layer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::envelope::{
    CandidateIn, ClientSignal, IncomingCall, ServerSignal, SessionToken, SignalAddress, UserId,
};
use crate::error::{TransportError, TransportResult};
use crate::transport::{SignalingTransport, TransportEvent};

const EVENT_CAPACITY: usize = 256;

fn address_of(
    token: &Option<SessionToken>,
    user: &Option<UserId>,
) -> Option<SignalAddress> {
    token
        .clone()
        .map(SignalAddress::Socket)
        .or_else(|| user.clone().map(SignalAddress::User))
}

#[derive(Default)]
struct RelayState {
    /// Live client connections by token.
    clients: DashMap<SessionToken, broadcast::Sender<TransportEvent>>,
    /// Room membership: user id -> tokens joined under that id.
    rooms: DashMap<UserId, HashSet<SessionToken>>,
}

/// An in-process signaling relay.
#[derive(Clone, Default)]
pub struct MemoryRelay {
    state: Arc<RelayState>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport bound to this relay. The transport is not connected
    /// until [`SignalingTransport::connect`] is called.
    pub fn client(&self) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            relay: Arc::clone(&self.state),
            token: Mutex::new(None),
            joined: Mutex::new(Vec::new()),
            tx: broadcast::channel(EVENT_CAPACITY).0,
        })
    }

    /// Number of live client connections, for test assertions.
    pub fn connected_clients(&self) -> usize {
        self.state.clients.len()
    }
}

impl RelayState {
    fn deliver_to_socket(
        &self,
        token: &SessionToken,
        signal: ServerSignal,
    ) -> TransportResult<()> {
        let entry = self
            .clients
            .get(token)
            .ok_or_else(|| TransportError::routing(token))?;
        entry
            .send(TransportEvent::Signal(signal))
            .map(|_| ())
            .map_err(|_| TransportError::routing(token))
    }

    fn deliver_to_room(&self, user: &UserId, signal: ServerSignal) -> TransportResult<()> {
        let members: Vec<SessionToken> = self
            .rooms
            .get(user)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let mut delivered = false;
        for token in &members {
            if self.deliver_to_socket(token, signal.clone()).is_ok() {
                delivered = true;
            }
        }
        if delivered {
            Ok(())
        } else {
            Err(TransportError::routing(user))
        }
    }

    fn deliver(&self, address: &SignalAddress, signal: ServerSignal) -> TransportResult<()> {
        match address {
            SignalAddress::Socket(token) => self.deliver_to_socket(token, signal),
            SignalAddress::User(user) => self.deliver_to_room(user, signal),
        }
    }
}

/// One client connection to a [`MemoryRelay`].
pub struct MemoryTransport {
    relay: Arc<RelayState>,
    token: Mutex<Option<SessionToken>>,
    joined: Mutex<Vec<UserId>>,
    tx: broadcast::Sender<TransportEvent>,
}

impl MemoryTransport {
    fn current_token(&self) -> TransportResult<SessionToken> {
        self.token
            .lock()
            .expect("token lock poisoned")
            .clone()
            .ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl SignalingTransport for MemoryTransport {
    async fn connect(&self) -> TransportResult<()> {
        let mut guard = self.token.lock().expect("token lock poisoned");
        if let Some(token) = guard.as_ref() {
            trace!(%token, "memory transport already connected");
            return Ok(());
        }
        let token = SessionToken::generate();
        self.relay.clients.insert(token.clone(), self.tx.clone());
        debug!(%token, "memory transport connected");
        *guard = Some(token);
        Ok(())
    }

    async fn disconnect(&self) {
        let token = self.token.lock().expect("token lock poisoned").take();
        let Some(token) = token else { return };
        self.relay.clients.remove(&token);
        for user in self.joined.lock().expect("joined lock poisoned").drain(..) {
            if let Some(mut members) = self.relay.rooms.get_mut(&user) {
                members.remove(&token);
            }
        }
        debug!(%token, "memory transport disconnected");
        let _ = self.tx.send(TransportEvent::Disconnected);
    }

    async fn join_user(&self, user: &UserId) -> TransportResult<()> {
        let token = self.current_token()?;
        self.relay
            .rooms
            .entry(user.clone())
            .or_default()
            .insert(token.clone());
        self.joined
            .lock()
            .expect("joined lock poisoned")
            .push(user.clone());
        debug!(%user, %token, "joined user room");
        Ok(())
    }

    async fn emit(&self, signal: ClientSignal) -> TransportResult<()> {
        let from = self.current_token()?;
        trace!(event = signal.event(), %from, "relaying signal");
        match signal {
            ClientSignal::CallStart(m) => {
                let incoming = ServerSignal::IncomingCall(IncomingCall {
                    from_socket_id: from,
                    offer: m.offer,
                    visitor_name: m.visitor_name,
                    visitor_phone: m.visitor_phone,
                });
                self.relay.deliver_to_room(&m.to_user_id, incoming)
            }
            ClientSignal::CallAnswer(m) => self.relay.deliver_to_socket(
                &m.to_socket_id,
                ServerSignal::CallAnswered(crate::envelope::CallAnswered { answer: m.answer }),
            ),
            ClientSignal::IceCandidate(m) => {
                let address = address_of(&m.to_socket_id, &m.to_user_id)
                    .ok_or_else(|| TransportError::routing("unaddressed candidate"))?;
                self.relay.deliver(
                    &address,
                    ServerSignal::IceCandidate(CandidateIn {
                        candidate: m.candidate,
                        from_socket_id: Some(from),
                    }),
                )
            }
            ClientSignal::CallRejected(m) => {
                let address = address_of(&m.to_socket_id, &m.to_user_id)
                    .ok_or_else(|| TransportError::routing("unaddressed call-rejected"))?;
                self.relay.deliver(&address, ServerSignal::CallRejected)
            }
            ClientSignal::CallEnd(m) => {
                let address = address_of(&m.to_socket_id, &m.to_user_id)
                    .ok_or_else(|| TransportError::routing("unaddressed call-end"))?;
                self.relay.deliver(&address, ServerSignal::CallEnded)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }

    fn session_token(&self) -> Option<SessionToken> {
        self.token.lock().expect("token lock poisoned").clone()
    }
}
