//! Error types for the signaling layer.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while talking to the signaling relay.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has not been connected yet, or was disconnected.
    #[error("transport is not connected")]
    NotConnected,

    /// The relay could not deliver the message (peer gone, room empty).
    #[error("undeliverable signal: no recipient at {recipient}")]
    Routing { recipient: String },

    /// An inbound or outbound payload did not match the wire shape.
    #[error("malformed payload for event '{event}': {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// An inbound event name outside the protocol vocabulary.
    #[error("unknown signal event '{0}'")]
    UnknownEvent(String),

    /// The underlying connection is gone for good.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Create a routing error for an undeliverable recipient.
    pub fn routing(recipient: impl std::fmt::Display) -> Self {
        Self::Routing {
            recipient: recipient.to_string(),
        }
    }
}
