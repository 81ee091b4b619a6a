//! Transport capability used by the session layer.
//!
//! The production client owns one relay connection per process. Modeling it
//! as an injected trait (rather than a module-level singleton) is what makes
//! the session state machine testable against [`crate::memory::MemoryRelay`].

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::envelope::{ClientSignal, ServerSignal, SessionToken, UserId};
use crate::error::TransportResult;

/// Something delivered by the transport to its subscribers.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A signal addressed to this client.
    Signal(ServerSignal),
    /// The underlying connection dropped. The session layer treats this as a
    /// routing failure for any in-progress call.
    Disconnected,
}

/// Bidirectional signaling channel to the relay.
///
/// Implementations must be cheap to share (`Arc`) and must deliver inbound
/// events to every active subscriber. Delivery is at most once, best effort;
/// no ordering is guaranteed across distinct senders.
#[async_trait]
pub trait SignalingTransport: Send + Sync + 'static {
    /// Establish the connection. Idempotent.
    async fn connect(&self) -> TransportResult<()>;

    /// Tear the connection down. Subscribers observe
    /// [`TransportEvent::Disconnected`].
    async fn disconnect(&self);

    /// Join this client's user room so room-addressed signals reach it.
    ///
    /// Identity bootstrap is the surrounding application's job; the session
    /// layer only assumes it has happened.
    async fn join_user(&self, user: &UserId) -> TransportResult<()>;

    /// Emit one signal toward the relay. The payload carries its own
    /// addressing; a delivery failure surfaces as
    /// [`crate::TransportError::Routing`].
    async fn emit(&self, signal: ClientSignal) -> TransportResult<()>;

    /// Subscribe to inbound events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// The ephemeral token identifying this client's connection, if connected.
    fn session_token(&self) -> Option<SessionToken>;
}
