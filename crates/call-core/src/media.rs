//! Media negotiation adapter contract.
//!
//! The coordinator never touches a concrete media stack. It drives whatever
//! implements [`MediaAdapter`]: in the browser build that is a thin wrapper
//! over the platform peer-connection API, in tests it is
//! [`crate::mock::MockMediaAdapter`].
//!
//! Asynchronous adapter callbacks (local candidate discovery, remote track
//! arrival) are modeled as `mpsc` sinks installed by the coordinator. The
//! coordinator tags the receiving tasks with the session generation, so a
//! sink that outlives its session goes quiet instead of resurrecting it.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::{CapabilityError, NegotiationError};
use gatecall_signaling_core::{IceCandidate, SessionDescription};

/// Opaque reference to the far end's audio once negotiation completes.
///
/// Owned by the media adapter; the session only holds this reference and
/// drops it on reset.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAudio {
    pub id: String,
}

/// Exclusive handle on local audio capture.
///
/// `stop` consumes the handle, so capture is released exactly once by
/// construction: there is no handle left to release twice.
pub trait LocalAudioHandle: Send + 'static {
    fn stop(self);
}

/// One media negotiation attempt. Never reused across sessions.
#[async_trait]
pub trait NegotiationHandle: Send + 'static {
    /// Build the local offer descriptor.
    async fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError>;

    /// Apply the remote offer and build the local answer in one step.
    async fn create_answer(
        &mut self,
        remote_offer: &SessionDescription,
    ) -> Result<SessionDescription, NegotiationError>;

    /// Apply the remote answer (caller side).
    async fn apply_remote_description(
        &mut self,
        descriptor: &SessionDescription,
    ) -> Result<(), NegotiationError>;

    /// Feed a remote connectivity candidate into the negotiation.
    async fn add_ice_candidate(
        &mut self,
        candidate: &IceCandidate,
    ) -> Result<(), NegotiationError>;

    /// Install the sink that receives locally discovered candidates. Fires
    /// zero or more times, asynchronously.
    fn set_candidate_sink(&mut self, sink: mpsc::UnboundedSender<IceCandidate>);

    /// Install the sink notified when the far end's audio becomes available.
    fn set_remote_track_sink(&mut self, sink: mpsc::UnboundedSender<RemoteAudio>);

    /// Release all underlying resources. Idempotent.
    fn close(&mut self);
}

/// Factory for local capture and negotiation handles.
#[async_trait]
pub trait MediaAdapter: Send + Sync + 'static {
    type LocalAudio: LocalAudioHandle;
    type Negotiation: NegotiationHandle;

    /// Acquire the local microphone. Fails with a [`CapabilityError`] when the
    /// device is missing or permission is denied.
    async fn acquire_local_audio(&self) -> Result<Self::LocalAudio, CapabilityError>;

    /// Construct a fresh negotiation handle for a new session.
    async fn create_negotiation(&self) -> Self::Negotiation;
}
