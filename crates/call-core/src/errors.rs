//! Error types for call coordination.

use thiserror::Error;

use crate::types::CallState;
use gatecall_signaling_core::TransportError;

/// Result type for call operations.
pub type CallResult<T> = Result<T, CallError>;

/// Local audio capture could not be provided.
///
/// Always user-actionable and recoverable: the session is reset to Idle and
/// the user can retry after fixing the device or permission.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no audio capture device available")]
    DeviceUnavailable,

    #[error("audio capture failed: {0}")]
    Other(String),
}

/// A descriptor or candidate could not be produced or applied.
#[derive(Debug, Clone, Error)]
pub enum NegotiationError {
    #[error("failed to build local descriptor: {0}")]
    LocalDescriptor(String),

    #[error("remote descriptor could not be applied: {0}")]
    RemoteDescriptor(String),

    #[error("connectivity candidate rejected: {0}")]
    Candidate(String),

    #[error("negotiation handle is closed")]
    Closed,
}

/// Errors surfaced by the call coordinator's public operations.
#[derive(Debug, Error)]
pub enum CallError {
    /// At most one non-Idle session may exist per client.
    #[error("a call is already in progress (state: {0})")]
    AlreadyInCall(CallState),

    /// The operation does not apply in the current state.
    #[error("'{operation}' is not valid while {state}")]
    InvalidState {
        operation: &'static str,
        state: CallState,
    },

    /// Local media capture failed.
    #[error("media capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Negotiation failed.
    #[error("negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    /// Signaling could not be delivered.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A session field required by the state machine was missing. Indicates a
    /// bug, not a user condition.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CallError {
    /// Create an invalid-state error for a named operation.
    pub fn invalid_state(operation: &'static str, state: CallState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
