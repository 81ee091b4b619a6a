//! Signaling layer for gatecall voice sessions.
//!
//! This crate defines the envelope protocol spoken with the signaling relay
//! (the hosted service that forwards call-setup messages between clients) and
//! the [`SignalingTransport`] capability that the session layer uses to emit
//! and receive those envelopes.
//!
//! The wire contract is fixed: event names (`call-start`, `incoming-call`,
//! `call-answer`, `call-answered`, `ice-candidate`, `call-rejected`,
//! `call-end`, `join-user`) and payload field names (`toUserId`, `toSocketId`,
//! `offer`, `answer`, `candidate`, `visitorName`, `visitorPhone`,
//! `fromSocketId`) must match byte for byte so that an unmodified peer
//! implementation interoperates.
//!
//! Two transport implementations matter in practice: the production socket
//! client (out of scope here) and the in-process [`memory::MemoryRelay`] used
//! for deterministic tests and demos.

pub mod envelope;
pub mod error;
pub mod memory;
pub mod transport;

pub use envelope::{
    CallAnswer, CallAnswered, CallStart, CandidateIn, CandidateOut, ClientSignal, IceCandidate,
    IncomingCall, SdpType, ServerSignal, SessionDescription, SessionToken, SignalAddress,
    Terminate, UserId,
};
pub use error::{TransportError, TransportResult};
pub use memory::{MemoryRelay, MemoryTransport};
pub use transport::{SignalingTransport, TransportEvent};
