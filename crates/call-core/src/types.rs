//! Core types for call session coordination.

use serde::{Deserialize, Serialize};

use gatecall_signaling_core::envelope::IncomingCall;

/// Lifecycle state of the (at most one) call session on this client.
///
/// `Idle` is both the start and the reset state: there is no retained
/// terminal state, so a new call can begin the instant the previous one is
/// torn down. Termination is observable as a transient
/// [`crate::events::CallEvent::CallEnded`] notice instead.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallState {
    /// No call in progress.
    Idle,
    /// Outbound call placed, waiting for the callee to answer.
    Dialing,
    /// Inbound call offered, waiting for the local user to accept or reject.
    Ringing,
    /// Both sides committed; media negotiation completing or complete.
    Connected,
}

impl CallState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CallState::Idle)
    }

    /// Whether a session currently occupies this client (at most one may).
    pub fn is_busy(&self) -> bool {
        !self.is_idle()
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallState::Idle => "Idle",
            CallState::Dialing => "Dialing",
            CallState::Ringing => "Ringing",
            CallState::Connected => "Connected",
        };
        write!(f, "{name}")
    }
}

/// Session ID type
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("call-{}", uuid::Uuid::new_v4()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Advisory identity of the remote party, carried for UI display only.
///
/// Nothing in the signaling layer authenticates these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub display_name: String,
    pub phone: String,
}

impl From<&IncomingCall> for PeerInfo {
    fn from(m: &IncomingCall) -> Self {
        Self {
            display_name: m.visitor_name.clone(),
            phone: m.visitor_phone.clone(),
        }
    }
}

/// Why a session ended. Attached to the transient end-of-call notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Local user hung up a connected call.
    LocalHangup,
    /// Local user declined a ringing call.
    LocalRejected,
    /// Local user cancelled while dialing.
    Cancelled,
    /// Remote side hung up.
    RemoteEnded,
    /// Remote side declined (or cancelled while we were ringing).
    RemoteRejected,
    /// No answer within the dial timeout.
    DialTimeout,
    /// Not accepted within the ring timeout.
    RingTimeout,
    /// Signaling transport lost or peer unreachable.
    TransportLost,
    /// Local audio capture could not be acquired.
    MediaFailed,
    /// Offer, answer, or candidate could not be applied.
    NegotiationFailed,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            EndReason::LocalHangup => "hung up",
            EndReason::LocalRejected => "rejected",
            EndReason::Cancelled => "cancelled",
            EndReason::RemoteEnded => "remote ended",
            EndReason::RemoteRejected => "remote rejected",
            EndReason::DialTimeout => "no answer",
            EndReason::RingTimeout => "ring timeout",
            EndReason::TransportLost => "connection lost",
            EndReason::MediaFailed => "microphone unavailable",
            EndReason::NegotiationFailed => "negotiation failed",
        };
        write!(f, "{text}")
    }
}
