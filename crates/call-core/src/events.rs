//! UI-facing event stream.
//!
//! The UI renders controls off [`crate::types::CallState`] and listens to this
//! stream for the moments a poll of the state cannot catch: the incoming-call
//! notification, the transient end-of-call notice (emitted immediately before
//! the reset to Idle), and remote audio arrival.

use crate::media::RemoteAudio;
use crate::types::{CallState, EndReason, PeerInfo};

/// Events broadcast by the coordinator.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The session moved between states.
    StateChanged {
        previous: CallState,
        current: CallState,
    },

    /// An inbound call is ringing; the UI should offer accept/reject.
    IncomingCall { peer: PeerInfo },

    /// The far end's audio is available for playback.
    RemoteAudioReady { audio: RemoteAudio },

    /// The session ended. Always followed by a `StateChanged` into Idle.
    CallEnded { reason: EndReason },
}
