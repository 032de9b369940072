//! Media transport integration
//!
//! This module defines the seam to the external real-time media transport
//! provider: the [`MediaTransport`] trait the provider implements, the
//! [`TransportEvent`] stream it emits, and the [`TransportSession`] wrapper
//! that gives the coordinator a uniform success/failure contract with
//! idempotent publish/unpublish/leave semantics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐
//! │   MeetingCoordinator    │
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │    TransportSession     │ ◄── This module
//! │  join / publish /       │
//! │  subscribe / leave      │
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │  dyn MediaTransport     │
//! │  (provider SDK)         │
//! └─────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::{DeviceError, TransportError};
use crate::media::track::{LocalTrack, TrackId};
use crate::media::MediaKind;

pub mod mock;

/// Identifier the transport provider assigns to a participant
///
/// Unique within a channel, opaque otherwise.
pub type ParticipantUid = u64;

/// Presence and media events emitted by the transport provider
///
/// Delivered in the order received from the transport, with no reordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A remote participant entered the channel
    ParticipantJoined { uid: ParticipantUid },
    /// A remote participant started publishing a media kind
    ParticipantPublished { uid: ParticipantUid, kind: MediaKind },
    /// A remote participant stopped publishing a media kind
    ParticipantUnpublished { uid: ParticipantUid, kind: MediaKind },
    /// A remote participant left the channel
    ParticipantLeft { uid: ParticipantUid },
    /// The transport connection dropped and cannot be recovered
    ConnectionLost { reason: String },
}

/// A remote participant already present in the channel at join time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePresence {
    pub uid: ParticipantUid,
    /// Media kinds this participant is currently publishing
    pub publishing: Vec<MediaKind>,
}

/// Successful result of joining a channel
///
/// Carries the participants already present (so a late joiner never misses
/// them) and the event stream for everything that happens afterwards.
#[derive(Debug)]
pub struct JoinSuccess {
    /// Participants present in the channel at join time
    pub existing_participants: Vec<RemotePresence>,
    /// Subscription to future presence/media events
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Media transport provider trait
///
/// This is the capability surface of the external RTC SDK. Signaling, mixing,
/// encoding and NAT traversal all live behind it; the coordinator only joins,
/// publishes, subscribes and leaves.
#[async_trait::async_trait]
pub trait MediaTransport: Send + Sync + std::fmt::Debug {
    /// Establish the transport connection to a channel
    ///
    /// On failure no partial state is retained by the provider.
    async fn join(&self, channel: &str, token: &str) -> Result<JoinSuccess, TransportError>;

    /// Open a microphone capture track
    async fn create_microphone_track(&self) -> Result<Arc<dyn LocalTrack>, DeviceError>;

    /// Open a camera capture track
    async fn create_camera_track(&self) -> Result<Arc<dyn LocalTrack>, DeviceError>;

    /// Open a screen capture track
    async fn create_screen_track(&self) -> Result<Arc<dyn LocalTrack>, DeviceError>;

    /// Hand local tracks to the transport for distribution
    async fn publish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), TransportError>;

    /// Take local tracks back from the transport
    async fn unpublish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), TransportError>;

    /// Begin receiving a specific remote media kind
    async fn subscribe(&self, uid: ParticipantUid, kind: MediaKind) -> Result<(), TransportError>;

    /// Release the transport connection
    async fn leave(&self) -> Result<(), TransportError>;
}

#[derive(Debug, Default)]
struct TransportShared {
    connected: AtomicBool,
    published: Mutex<HashSet<TrackId>>,
}

/// Transport session wrapper
///
/// Owns the connection state for one coordinator instance and enforces the
/// uniform contract on top of the raw provider: publishing an empty set is a
/// no-op, publish/unpublish are idempotent per track, and `leave` never fails
/// on an already-left connection.
#[derive(Debug, Clone)]
pub struct TransportSession {
    provider: Arc<dyn MediaTransport>,
    shared: Arc<TransportShared>,
}

impl TransportSession {
    /// Create a session wrapper over the given provider
    pub fn new(provider: Arc<dyn MediaTransport>) -> Self {
        Self {
            provider,
            shared: Arc::new(TransportShared::default()),
        }
    }

    /// Whether the transport connection is currently established
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Join a channel
    ///
    /// On failure the session retains no partial state and may be joined
    /// again with a fresh request.
    pub async fn join(&self, channel: &str, token: &str) -> Result<JoinSuccess, TransportError> {
        let success = self.provider.join(channel, token).await?;
        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(success)
    }

    /// Publish local tracks, skipping any already published
    ///
    /// An empty set (after filtering) is a no-op.
    pub async fn publish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let to_publish: Vec<Arc<dyn LocalTrack>> = {
            let published = self.shared.published.lock().unwrap();
            tracks
                .iter()
                .filter(|t| !published.contains(&t.id()))
                .cloned()
                .collect()
        };
        if to_publish.is_empty() {
            return Ok(());
        }
        self.provider.publish(&to_publish).await?;
        let mut published = self.shared.published.lock().unwrap();
        for track in &to_publish {
            published.insert(track.id());
        }
        Ok(())
    }

    /// Unpublish local tracks, skipping any not currently published
    pub async fn unpublish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let to_unpublish: Vec<Arc<dyn LocalTrack>> = {
            let published = self.shared.published.lock().unwrap();
            tracks
                .iter()
                .filter(|t| published.contains(&t.id()))
                .cloned()
                .collect()
        };
        if to_unpublish.is_empty() {
            return Ok(());
        }
        // Forget the tracks first so a provider failure cannot leave them
        // half-published on retry
        {
            let mut published = self.shared.published.lock().unwrap();
            for track in &to_unpublish {
                published.remove(&track.id());
            }
        }
        self.provider.unpublish(&to_unpublish).await
    }

    /// Subscribe to a remote participant's media kind
    pub async fn subscribe(
        &self,
        uid: ParticipantUid,
        kind: MediaKind,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.provider.subscribe(uid, kind).await
    }

    /// Leave the channel
    ///
    /// Idempotent: leaving an already-left session is a no-op. The session is
    /// marked disconnected even when the provider reports a failure, so no
    /// connection is left dangling.
    pub async fn leave(&self) -> Result<(), TransportError> {
        if !self.shared.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.published.lock().unwrap().clear();
        self.provider.leave().await
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use crate::media::TrackKind;

    async fn joined_session() -> (Arc<MockTransport>, TransportSession) {
        let provider = Arc::new(MockTransport::new());
        let session = TransportSession::new(provider.clone());
        session.join("room-1", "token-1").await.unwrap();
        (provider, session)
    }

    #[tokio::test]
    async fn publish_before_join_is_rejected() {
        let provider = Arc::new(MockTransport::new());
        let session = TransportSession::new(provider.clone());
        let track = provider.create_microphone_track().await.unwrap();
        let err = session.publish(&[track]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn publish_is_idempotent_per_track() {
        let (provider, session) = joined_session().await;
        let track = provider.create_microphone_track().await.unwrap();

        session.publish(&[track.clone()]).await.unwrap();
        session.publish(&[track.clone()]).await.unwrap();
        assert_eq!(provider.publish_calls(), 1);

        session.unpublish(&[track.clone()]).await.unwrap();
        session.unpublish(&[track]).await.unwrap();
        assert_eq!(provider.published_track_count(), 0);
    }

    #[tokio::test]
    async fn empty_publish_set_is_a_no_op() {
        let (provider, session) = joined_session().await;
        session.publish(&[]).await.unwrap();
        session.unpublish(&[]).await.unwrap();
        assert_eq!(provider.publish_calls(), 0);
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let (provider, session) = joined_session().await;
        session.leave().await.unwrap();
        session.leave().await.unwrap();
        assert_eq!(provider.leave_calls(), 1);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn join_failure_retains_no_state() {
        let provider = Arc::new(MockTransport::new());
        provider.set_join_failure("token expired");
        let session = TransportSession::new(provider.clone());
        let err = session.join("room-1", "bad").await.unwrap_err();
        assert!(matches!(err, TransportError::JoinFailed { .. }));
        assert!(!session.is_connected());

        provider.clear_join_failure();
        session.join("room-1", "good").await.unwrap();
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn screen_track_creation_goes_through_provider() {
        let (provider, _session) = joined_session().await;
        let screen = provider.create_screen_track().await.unwrap();
        assert_eq!(screen.kind(), TrackKind::Screen);
    }
}
