//! Call session coordination for gatecall.
//!
//! A per-client state machine managing a single concurrent peer-to-peer audio
//! call, mediated by a signaling relay that forwards opaque messages between
//! the two participants. The machine has four observable states
//! (`Idle | Dialing | Ringing | Connected`) and exactly four public
//! operations (`start_call`, `accept_call`, `reject_call`, `end_call`);
//! everything else is driven by inbound signals.
//!
//! Design constraints this crate enforces:
//!
//! - At most one non-Idle session per client. `Idle` is both the start and
//!   the reset state, so a new call can begin the moment the previous one is
//!   torn down.
//! - Local capture and the negotiation handle are exclusively owned by the
//!   active session and released exactly once on every reset.
//! - Signaling delivery is unordered and best effort. Candidates that arrive
//!   ahead of the negotiation handle are buffered (bounded) and replayed in
//!   arrival order; terminal events always win, whatever async work is in
//!   flight.
//! - Every session instance carries a generation counter. Async continuations
//!   capture it at dispatch time and discard their results if it has
//!   advanced, so a stale completion can never resurrect a reset session.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gatecall_call_core::{CallConfig, CallCoordinator, MockMediaAdapter};
//! use gatecall_signaling_core::{MemoryRelay, SignalingTransport, UserId};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let relay = MemoryRelay::new();
//! let transport = relay.client();
//! transport.connect().await?;
//! transport.join_user(&UserId::from("gate-1")).await?;
//!
//! let coordinator = CallCoordinator::new(
//!     transport,
//!     Arc::new(MockMediaAdapter::new()),
//!     CallConfig::default(),
//! );
//! coordinator.run();
//! coordinator
//!     .start_call(UserId::from("u42"), "Visitor A", "+1555")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod media;
pub mod mock;
mod session;
pub mod types;

pub use config::CallConfig;
pub use coordinator::CallCoordinator;
pub use errors::{CallError, CallResult, CapabilityError, NegotiationError};
pub use events::CallEvent;
pub use media::{LocalAudioHandle, MediaAdapter, NegotiationHandle, RemoteAudio};
pub use mock::MockMediaAdapter;
pub use types::{CallState, EndReason, PeerInfo, SessionId};

// The signaling vocabulary callers need alongside this crate.
pub use gatecall_signaling_core as signaling;
pub use gatecall_signaling_core::{SessionToken, UserId};
