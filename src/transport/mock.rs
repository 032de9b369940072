//! Mock transport provider
//!
//! In-tree implementation of [`MediaTransport`] used by the test suites. The
//! mock is scriptable: joins can be failed or delayed, devices denied, and
//! remote presence events pushed into the session's event stream.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{DeviceError, TransportError};
use crate::media::track::{LocalTrack, TrackId};
use crate::media::{MediaKind, TrackKind};
use crate::transport::{JoinSuccess, MediaTransport, ParticipantUid, RemotePresence, TransportEvent};

/// Mock local track
#[derive(Debug)]
pub struct MockTrack {
    id: TrackId,
    kind: TrackKind,
    enabled: AtomicBool,
    closed: AtomicBool,
    fail_close: bool,
    open_tracks: Arc<AtomicUsize>,
}

impl MockTrack {
    fn new(kind: TrackKind, fail_close: bool, open_tracks: Arc<AtomicUsize>) -> Self {
        open_tracks.fetch_add(1, Ordering::SeqCst);
        Self {
            id: uuid::Uuid::new_v4(),
            kind,
            enabled: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            fail_close,
            open_tracks,
        }
    }

    /// Whether the track is currently unmuted
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whether the track has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LocalTrack for MockTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DeviceError::new(self.kind, "track is closed"));
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), DeviceError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // The handle is freed either way; a failing close still releases
            // the device, it just reports the error
            self.open_tracks.fetch_sub(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(DeviceError::new(self.kind, "simulated close failure"));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct MockState {
    join_failure: Option<String>,
    join_delay: Option<Duration>,
    publish_failure: Option<String>,
    subscribe_failure: Option<String>,
    denied_devices: HashSet<TrackKind>,
    failing_close_devices: HashSet<TrackKind>,
    existing: Vec<RemotePresence>,
    event_tx: Option<mpsc::UnboundedSender<TransportEvent>>,
    joined: bool,
    join_calls: usize,
    leave_calls: usize,
    publish_calls: usize,
    published: HashSet<TrackId>,
    subscriptions: Vec<(ParticipantUid, MediaKind)>,
    create_calls: HashMap<TrackKind, usize>,
}

/// Scriptable mock media transport provider
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
    open_tracks: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport").finish()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- scripting knobs -----

    /// Make the next joins fail with the given message
    pub fn set_join_failure(&self, message: impl Into<String>) {
        self.state.lock().unwrap().join_failure = Some(message.into());
    }

    /// Let joins succeed again
    pub fn clear_join_failure(&self) {
        self.state.lock().unwrap().join_failure = None;
    }

    /// Delay joins by the given duration before completing
    pub fn set_join_delay(&self, delay: Duration) {
        self.state.lock().unwrap().join_delay = Some(delay);
    }

    /// Make publish calls fail with the given message
    pub fn set_publish_failure(&self, message: impl Into<String>) {
        self.state.lock().unwrap().publish_failure = Some(message.into());
    }

    /// Make subscribe calls fail with the given message
    pub fn set_subscribe_failure(&self, message: impl Into<String>) {
        self.state.lock().unwrap().subscribe_failure = Some(message.into());
    }

    /// Deny acquisition of the given device kind
    pub fn deny_device(&self, kind: TrackKind) {
        self.state.lock().unwrap().denied_devices.insert(kind);
    }

    /// Allow acquisition of a previously denied device kind
    pub fn allow_device(&self, kind: TrackKind) {
        self.state.lock().unwrap().denied_devices.remove(&kind);
    }

    /// Make `close` fail for tracks of the given kind (the handle is still freed)
    pub fn fail_close(&self, kind: TrackKind) {
        self.state.lock().unwrap().failing_close_devices.insert(kind);
    }

    /// Seed a participant as already present at join time
    pub fn add_existing_participant(&self, uid: ParticipantUid, publishing: Vec<MediaKind>) {
        self.state
            .lock()
            .unwrap()
            .existing
            .push(RemotePresence { uid, publishing });
    }

    /// Push an event into the active session's event stream
    ///
    /// Dropped silently when no session is joined.
    pub fn emit(&self, event: TransportEvent) {
        let tx = self.state.lock().unwrap().event_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(event);
        }
    }

    // ----- inspection -----

    pub fn is_joined(&self) -> bool {
        self.state.lock().unwrap().joined
    }

    pub fn join_calls(&self) -> usize {
        self.state.lock().unwrap().join_calls
    }

    pub fn leave_calls(&self) -> usize {
        self.state.lock().unwrap().leave_calls
    }

    pub fn publish_calls(&self) -> usize {
        self.state.lock().unwrap().publish_calls
    }

    pub fn published_track_count(&self) -> usize {
        self.state.lock().unwrap().published.len()
    }

    pub fn create_count(&self, kind: TrackKind) -> usize {
        *self
            .state
            .lock()
            .unwrap()
            .create_calls
            .get(&kind)
            .unwrap_or(&0)
    }

    /// Number of device handles currently open (created and not yet closed)
    pub fn open_track_count(&self) -> usize {
        self.open_tracks.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<(ParticipantUid, MediaKind)> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    fn create_track(&self, kind: TrackKind) -> Result<Arc<dyn LocalTrack>, DeviceError> {
        let mut state = self.state.lock().unwrap();
        *state.create_calls.entry(kind).or_insert(0) += 1;
        if state.denied_devices.contains(&kind) {
            return Err(DeviceError::new(kind, "permission denied"));
        }
        let fail_close = state.failing_close_devices.contains(&kind);
        Ok(Arc::new(MockTrack::new(
            kind,
            fail_close,
            self.open_tracks.clone(),
        )))
    }
}

#[async_trait::async_trait]
impl MediaTransport for MockTransport {
    async fn join(&self, channel: &str, _token: &str) -> Result<JoinSuccess, TransportError> {
        let delay = self.state.lock().unwrap().join_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.join_calls += 1;
        if let Some(message) = &state.join_failure {
            return Err(TransportError::JoinFailed {
                channel: channel.to_string(),
                message: message.clone(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.event_tx = Some(tx);
        state.joined = true;
        Ok(JoinSuccess {
            existing_participants: state.existing.clone(),
            events: rx,
        })
    }

    async fn create_microphone_track(&self) -> Result<Arc<dyn LocalTrack>, DeviceError> {
        self.create_track(TrackKind::Microphone)
    }

    async fn create_camera_track(&self) -> Result<Arc<dyn LocalTrack>, DeviceError> {
        self.create_track(TrackKind::Camera)
    }

    async fn create_screen_track(&self) -> Result<Arc<dyn LocalTrack>, DeviceError> {
        self.create_track(TrackKind::Screen)
    }

    async fn publish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.publish_failure {
            return Err(TransportError::PublishFailed {
                message: message.clone(),
            });
        }
        state.publish_calls += 1;
        for track in tracks {
            state.published.insert(track.id());
        }
        Ok(())
    }

    async fn unpublish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        for track in tracks {
            state.published.remove(&track.id());
        }
        Ok(())
    }

    async fn subscribe(&self, uid: ParticipantUid, kind: MediaKind) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.subscribe_failure {
            return Err(TransportError::SubscribeFailed {
                uid,
                kind,
                message: message.clone(),
            });
        }
        state.subscriptions.push((uid, kind));
        Ok(())
    }

    async fn leave(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.joined {
            state.joined = false;
            state.leave_calls += 1;
            state.event_tx = None;
            state.published.clear();
        }
        Ok(())
    }
}
