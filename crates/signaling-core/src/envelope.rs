//! Wire envelope types for the call signaling protocol.
//!
//! Every message exchanged with the relay is a named event plus a JSON
//! payload. Outbound payloads embed their own addressing (`toUserId` for room
//! delivery, `toSocketId` once the peer's ephemeral token is known) so the
//! transport can route without any knowledge of call state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

/// Wire event names. These are the relay's contract and never change.
pub mod events {
    pub const JOIN_USER: &str = "join-user";
    pub const CALL_START: &str = "call-start";
    pub const INCOMING_CALL: &str = "incoming-call";
    pub const CALL_ANSWER: &str = "call-answer";
    pub const CALL_ANSWERED: &str = "call-answered";
    pub const ICE_CANDIDATE: &str = "ice-candidate";
    pub const CALL_REJECTED: &str = "call-rejected";
    pub const CALL_END: &str = "call-end";
}

/// User identifier, the key of a delivery room on the relay.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Ephemeral token correlating signaling messages to one peer connection.
///
/// A token is only valid while the peer's socket is up and the call attempt is
/// alive; it must never be stored beyond the end of the session it belongs to.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// Mint a fresh token for a newly connected client.
    pub fn generate() -> Self {
        Self(format!("sock-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionToken {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Where an outbound envelope should be delivered.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum SignalAddress {
    /// Deliver to whichever client has joined this user's room.
    User(UserId),
    /// Deliver to one specific peer connection.
    Socket(SessionToken),
}

impl std::fmt::Display for SignalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAddress::User(u) => write!(f, "user:{u}"),
            SignalAddress::Socket(s) => write!(f, "socket:{s}"),
        }
    }
}

/// Kind discriminator of a media capability descriptor.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A media capability descriptor (offer or answer) produced by negotiation.
///
/// The `type`/`sdp` shape mirrors the browser session-description object so a
/// descriptor can be handed to an unmodified peer unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A connectivity candidate discovered during negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
        }
    }
}

// ===== CLIENT -> RELAY PAYLOADS =====

/// Initiate a call toward a user's room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStart {
    pub to_user_id: UserId,
    pub offer: SessionDescription,
    pub visitor_name: String,
    pub visitor_phone: String,
}

/// Complete call setup by answering a specific peer connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnswer {
    pub to_socket_id: SessionToken,
    pub answer: SessionDescription,
}

/// Forward a locally discovered connectivity candidate to the peer.
///
/// Before the peer has revealed a session token only room addressing is
/// possible; afterwards the token is preferred. Exactly one of the two
/// address fields is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_socket_id: Option<SessionToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_user_id: Option<UserId>,
    pub candidate: IceCandidate,
}

impl CandidateOut {
    pub fn to(address: SignalAddress, candidate: IceCandidate) -> Self {
        match address {
            SignalAddress::Socket(token) => Self {
                to_socket_id: Some(token),
                to_user_id: None,
                candidate,
            },
            SignalAddress::User(user) => Self {
                to_socket_id: None,
                to_user_id: Some(user),
                candidate,
            },
        }
    }
}

/// Payload of the bodyless terminal events (`call-rejected`, `call-end`):
/// addressing only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Terminate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_socket_id: Option<SessionToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_user_id: Option<UserId>,
}

impl Terminate {
    pub fn to(address: SignalAddress) -> Self {
        match address {
            SignalAddress::Socket(token) => Self {
                to_socket_id: Some(token),
                to_user_id: None,
            },
            SignalAddress::User(user) => Self {
                to_socket_id: None,
                to_user_id: Some(user),
            },
        }
    }
}

/// Messages a client emits toward the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientSignal {
    CallStart(CallStart),
    CallAnswer(CallAnswer),
    IceCandidate(CandidateOut),
    CallRejected(Terminate),
    CallEnd(Terminate),
}

impl ClientSignal {
    /// Wire event name this signal is emitted under.
    pub fn event(&self) -> &'static str {
        match self {
            ClientSignal::CallStart(_) => events::CALL_START,
            ClientSignal::CallAnswer(_) => events::CALL_ANSWER,
            ClientSignal::IceCandidate(_) => events::ICE_CANDIDATE,
            ClientSignal::CallRejected(_) => events::CALL_REJECTED,
            ClientSignal::CallEnd(_) => events::CALL_END,
        }
    }

    /// Delivery address carried inside the payload.
    pub fn address(&self) -> Option<SignalAddress> {
        fn from_parts(
            token: &Option<SessionToken>,
            user: &Option<UserId>,
        ) -> Option<SignalAddress> {
            token
                .clone()
                .map(SignalAddress::Socket)
                .or_else(|| user.clone().map(SignalAddress::User))
        }

        match self {
            ClientSignal::CallStart(m) => Some(SignalAddress::User(m.to_user_id.clone())),
            ClientSignal::CallAnswer(m) => Some(SignalAddress::Socket(m.to_socket_id.clone())),
            ClientSignal::IceCandidate(m) => from_parts(&m.to_socket_id, &m.to_user_id),
            ClientSignal::CallRejected(m) => from_parts(&m.to_socket_id, &m.to_user_id),
            ClientSignal::CallEnd(m) => from_parts(&m.to_socket_id, &m.to_user_id),
        }
    }

    /// Serialize the payload to its wire JSON object.
    pub fn to_wire(&self) -> Result<Value, TransportError> {
        let value = match self {
            ClientSignal::CallStart(m) => serde_json::to_value(m),
            ClientSignal::CallAnswer(m) => serde_json::to_value(m),
            ClientSignal::IceCandidate(m) => serde_json::to_value(m),
            ClientSignal::CallRejected(m) => serde_json::to_value(m),
            ClientSignal::CallEnd(m) => serde_json::to_value(m),
        };
        value.map_err(|source| TransportError::Malformed {
            event: self.event().to_string(),
            source,
        })
    }
}

// ===== RELAY -> CLIENT PAYLOADS =====

/// A caller is ringing this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub from_socket_id: SessionToken,
    pub offer: SessionDescription,
    pub visitor_name: String,
    pub visitor_phone: String,
}

/// The callee answered; negotiation can complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnswered {
    pub answer: SessionDescription,
}

/// A connectivity candidate forwarded from the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateIn {
    pub candidate: IceCandidate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_socket_id: Option<SessionToken>,
}

/// Messages the relay delivers to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerSignal {
    IncomingCall(IncomingCall),
    CallAnswered(CallAnswered),
    IceCandidate(CandidateIn),
    CallRejected,
    CallEnded,
}

impl ServerSignal {
    /// Wire event name this signal arrives under.
    pub fn event(&self) -> &'static str {
        match self {
            ServerSignal::IncomingCall(_) => events::INCOMING_CALL,
            ServerSignal::CallAnswered(_) => events::CALL_ANSWERED,
            ServerSignal::IceCandidate(_) => events::ICE_CANDIDATE,
            ServerSignal::CallRejected => events::CALL_REJECTED,
            ServerSignal::CallEnded => events::CALL_END,
        }
    }

    /// Parse an inbound `(event, payload)` pair off the wire.
    pub fn from_wire(event: &str, payload: &Value) -> Result<Self, TransportError> {
        let malformed = |source| TransportError::Malformed {
            event: event.to_string(),
            source,
        };
        match event {
            events::INCOMING_CALL => serde_json::from_value(payload.clone())
                .map(ServerSignal::IncomingCall)
                .map_err(malformed),
            events::CALL_ANSWERED => serde_json::from_value(payload.clone())
                .map(ServerSignal::CallAnswered)
                .map_err(malformed),
            events::ICE_CANDIDATE => serde_json::from_value(payload.clone())
                .map(ServerSignal::IceCandidate)
                .map_err(malformed),
            events::CALL_REJECTED => Ok(ServerSignal::CallRejected),
            events::CALL_END => Ok(ServerSignal::CallEnded),
            other => Err(TransportError::UnknownEvent(other.to_string())),
        }
    }
}
