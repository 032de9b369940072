//! Session Coordinator
//!
//! The [`MeetingCoordinator`] owns the lifecycle of a single real-time
//! meeting session: it joins the transport channel, acquires and publishes
//! the requested local devices, folds remote presence/media events into the
//! participant registry, exposes the mute/camera/screen-share controls, and
//! tears everything down deterministically on leave, host-initiated end,
//! failure, or disposal.
//!
//! # State machine
//!
//! ```text
//!            start_session            join ok
//!   Idle ──────────────────► Joining ─────────► Joined
//!                               │                  │
//!                       join err│        leave /   │ end_for_all /
//!                               ▼        teardown  ▼ connection lost
//!                            Failed             Leaving ──► Left | Ended | Failed
//! ```
//!
//! `Left`, `Ended` and `Failed` are terminal for a session; the coordinator
//! itself is reusable and accepts a fresh `start_session` afterwards, but at
//! most one non-terminal session ever exists per instance.
//!
//! # Races and cancellation
//!
//! Every asynchronous continuation (the join result, device acquisitions,
//! publishes, event deliveries) is guarded by a monotonically increasing
//! generation counter captured at `start_session` time. Teardown bumps the
//! counter first, so a continuation that resolves afterwards observes a stale
//! generation and is discarded without mutating state or re-publishing
//! released devices.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meeting_core::{CoordinatorConfig, DevicePrefs, MeetingCoordinator};
//! use meeting_core::metadata::MockMeetingGateway;
//! use meeting_core::transport::mock::MockTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(MockTransport::new());
//! let gateway = Arc::new(MockMeetingGateway::new());
//! let coordinator = MeetingCoordinator::new(transport, gateway, CoordinatorConfig::new("user-1"));
//!
//! coordinator
//!     .start_session("room-1", "token-1", DevicePrefs::new(true, false))
//!     .await?;
//! coordinator.toggle_camera().await?;
//! coordinator.leave().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::CoordinatorConfig;
use crate::error::{MeetingError, MeetingResult, TransportError};
use crate::media::manager::EnableOutcome;
use crate::media::{DeviceTrackManager, TrackKind};
use crate::metadata::MeetingGateway;
use crate::registry::ParticipantRegistry;
use crate::transport::{MediaTransport, TransportEvent, TransportSession};

mod controls;
pub mod types;


pub use types::{DevicePrefs, SessionSnapshot, SessionState};

/// The active session's immutable identifiers
struct SessionHandle {
    id: Uuid,
    channel: String,
    started_at: DateTime<Utc>,
}

/// Mutable coordinator state, serialized behind one lock
#[derive(Default)]
struct Inner {
    state: SessionState,
    session: Option<SessionHandle>,
    is_host: bool,
    remote_name: Option<String>,
    registry: ParticipantRegistry,
    screen_sharing: bool,
    last_error: Option<String>,
    event_task: Option<JoinHandle<()>>,
}

/// Meeting session coordinator
///
/// Exclusively owns the local device handles and the transport connection for
/// the lifetime of one session. Multiple independent coordinators can coexist
/// (e.g. in tests); there is no process-wide state.
pub struct MeetingCoordinator {
    gateway: Arc<dyn MeetingGateway>,
    config: CoordinatorConfig,
    devices: Arc<DeviceTrackManager>,
    transport: TransportSession,
    inner: Arc<Mutex<Inner>>,
    generation: Arc<AtomicU64>,
    watch_tx: watch::Sender<SessionSnapshot>,
    watch_rx: watch::Receiver<SessionSnapshot>,
}

impl MeetingCoordinator {
    /// Create a coordinator over the given transport provider and metadata
    /// gateway
    pub fn new(
        provider: Arc<dyn MediaTransport>,
        gateway: Arc<dyn MeetingGateway>,
        config: CoordinatorConfig,
    ) -> Self {
        let (watch_tx, watch_rx) = watch::channel(SessionSnapshot::default());
        Self {
            devices: Arc::new(DeviceTrackManager::new(provider.clone())),
            transport: TransportSession::new(provider),
            gateway,
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
            generation: Arc::new(AtomicU64::new(0)),
            watch_tx,
            watch_rx,
        }
    }

    /// Subscribe to snapshot updates
    ///
    /// The receiver always holds the latest [`SessionSnapshot`]; a new value
    /// is published after every observable change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.watch_rx.clone()
    }

    /// Build a fresh snapshot of the observable state
    pub async fn snapshot(&self) -> SessionSnapshot {
        build_snapshot(&self.inner, &self.devices).await
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Start a new session on the given channel
    ///
    /// Validates the inputs, joins the transport channel, seeds the
    /// participant registry with everyone already present, acquires and
    /// publishes the devices requested in `prefs` (acquisition failures
    /// degrade that device only), and resolves host identity through the
    /// metadata gateway.
    ///
    /// # Errors
    ///
    /// * [`MeetingError::InvalidRequest`] - empty channel/token, or a session
    ///   is already active
    /// * [`MeetingError::Transport`] - the transport join failed; the session
    ///   ends in the `Failed` state and a fresh `start_session` may retry
    pub async fn start_session(
        &self,
        channel: &str,
        token: &str,
        prefs: DevicePrefs,
    ) -> MeetingResult<Uuid> {
        if channel.trim().is_empty() {
            return Err(MeetingError::invalid_request("channel name must not be empty"));
        }
        if token.trim().is_empty() {
            return Err(MeetingError::invalid_request(
                "admission token must not be empty",
            ));
        }

        let (gen, session_id) = {
            let mut guard = self.inner.lock().await;
            if guard.state.is_active() {
                return Err(MeetingError::invalid_request(
                    "a session is already active; leave it before starting a new one",
                ));
            }
            let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let id = Uuid::new_v4();
            *guard = Inner {
                state: SessionState::Joining,
                session: Some(SessionHandle {
                    id,
                    channel: channel.to_string(),
                    started_at: Utc::now(),
                }),
                ..Default::default()
            };
            (gen, id)
        };
        self.publish_snapshot().await;
        tracing::info!("Joining channel '{}'", channel);

        let join_result = match self.config.join_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.transport.join(channel, token)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::JoinFailed {
                        channel: channel.to_string(),
                        message: format!("join timed out after {:?}", timeout),
                    }),
                }
            }
            None => self.transport.join(channel, token).await,
        };

        let success = match join_result {
            Ok(success) => success,
            Err(e) => {
                tracing::error!("Failed to join channel '{}': {}", channel, e);
                let mut guard = self.inner.lock().await;
                if self.generation.load(Ordering::SeqCst) == gen {
                    guard.state = SessionState::Failed;
                    guard.session = None;
                    guard.last_error = Some(e.to_string());
                    drop(guard);
                    self.publish_snapshot().await;
                }
                return Err(e.into());
            }
        };

        {
            let mut guard = self.inner.lock().await;
            if self.generation.load(Ordering::SeqCst) != gen {
                drop(guard);
                // Teardown won the race against the join continuation; the
                // connection that just opened must not outlive it
                tracing::debug!("Discarding join result for channel '{}'", channel);
                if let Err(e) = self.transport.leave().await {
                    tracing::warn!("Failed to leave stale transport connection: {}", e);
                }
                return Err(MeetingError::invalid_request(
                    "session was torn down while joining",
                ));
            }
            guard.state = SessionState::Joined;
            guard.registry.seed(&success.existing_participants);
            guard.event_task = Some(self.spawn_event_loop(success.events, gen));
        }
        self.publish_snapshot().await;
        tracing::info!(
            "Joined channel '{}' ({} participant(s) already present)",
            channel,
            success.existing_participants.len()
        );

        // Initial device setup: failures degrade the device, never the session
        if prefs.mic_on {
            let _ = self.enable_device(TrackKind::Microphone, gen, true).await;
        }
        if prefs.cam_on {
            let _ = self.enable_device(TrackKind::Camera, gen, true).await;
        }
        self.resolve_host(channel, gen).await;
        self.publish_snapshot().await;
        Ok(session_id)
    }

    /// Leave the session
    ///
    /// Unpublishes and releases every local device track and leaves the
    /// transport, regardless of whether individual sub-operations fail.
    /// Idempotent: calling it with no active session is a no-op.
    pub async fn leave(&self) -> MeetingResult<()> {
        {
            let mut guard = self.inner.lock().await;
            match guard.state {
                SessionState::Joining | SessionState::Joined => {
                    guard.state = SessionState::Leaving;
                }
                // Terminal, never-started, or a teardown already in progress
                _ => return Ok(()),
            }
        }
        self.publish_snapshot().await;
        run_teardown(
            &self.inner,
            &self.generation,
            &self.devices,
            &self.transport,
            &self.watch_tx,
            SessionState::Left,
        )
        .await;
        Ok(())
    }

    /// End the meeting for every participant
    ///
    /// Host-only: notifies the metadata gateway that the meeting record
    /// should close (exactly once), then performs the same unconditional
    /// teardown as [`leave`](Self::leave).
    ///
    /// # Errors
    ///
    /// * [`MeetingError::NotAuthorized`] - the local caller is not the host;
    ///   state is left unchanged
    /// * [`MeetingError::InvalidRequest`] - no joined session
    pub async fn end_for_all(&self) -> MeetingResult<()> {
        let channel = {
            let mut guard = self.inner.lock().await;
            if guard.state != SessionState::Joined {
                return Err(MeetingError::invalid_request("no active session to end"));
            }
            if !guard.is_host {
                return Err(MeetingError::NotAuthorized);
            }
            // Claim the teardown under the same lock as the host check so the
            // gateway close runs exactly once
            guard.state = SessionState::Leaving;
            guard
                .session
                .as_ref()
                .map(|s| s.channel.clone())
                .unwrap_or_default()
        };
        self.publish_snapshot().await;

        if let Err(e) = self.gateway.close_meeting(&channel).await {
            tracing::warn!("Failed to close meeting record for '{}': {}", channel, e);
            let mut guard = self.inner.lock().await;
            guard.last_error = Some(e.to_string());
        }
        run_teardown(
            &self.inner,
            &self.generation,
            &self.devices,
            &self.transport,
            &self.watch_tx,
            SessionState::Ended,
        )
        .await;
        Ok(())
    }

    /// Enable a device and, when freshly acquired, publish it
    ///
    /// Acquisition and publish failures are absorbed into the capability
    /// flags and `last_error`, and also returned so interactive callers can
    /// surface them. A stale generation discards the work quietly.
    pub(crate) async fn enable_device(
        &self,
        kind: TrackKind,
        gen: u64,
        publish: bool,
    ) -> MeetingResult<()> {
        match self.devices.set_enabled(kind, true).await {
            EnableOutcome::Unavailable(e) => {
                let err = MeetingError::from(e);
                let mut guard = self.inner.lock().await;
                if self.generation.load(Ordering::SeqCst) == gen {
                    guard.last_error = Some(err.to_string());
                }
                Err(err)
            }
            EnableOutcome::Enabled {
                track,
                newly_acquired,
            } => {
                if self.generation.load(Ordering::SeqCst) != gen {
                    // Teardown won; the handle we just opened must not leak
                    self.devices.release(kind).await;
                    return Ok(());
                }
                if newly_acquired && publish {
                    if let Err(e) = self.transport.publish(&[track]).await {
                        tracing::warn!("Failed to publish {} track: {}", kind, e);
                        self.devices.mark_unavailable(kind).await;
                        let mut guard = self.inner.lock().await;
                        if self.generation.load(Ordering::SeqCst) == gen {
                            guard.last_error = Some(e.to_string());
                        }
                        return Err(e.into());
                    }
                    self.devices.mark_published(kind, true).await;
                }
                Ok(())
            }
            EnableOutcome::Disabled => Ok(()),
        }
    }

    /// Resolve host identity and the remote party's display name
    ///
    /// A lookup failure is non-fatal: the caller simply is not treated as
    /// host and the remote name stays unknown.
    async fn resolve_host(&self, channel: &str, gen: u64) {
        match self.gateway.meeting_by_channel(channel).await {
            Ok(Some(record)) => {
                let mut guard = self.inner.lock().await;
                if self.generation.load(Ordering::SeqCst) != gen {
                    return;
                }
                let is_host = record.creator_id == self.config.local_user_id;
                guard.is_host = is_host;
                guard.remote_name = Some(if is_host {
                    record.participant_name
                } else {
                    record.creator_name
                });
                tracing::debug!("Resolved host identity for '{}' (is_host: {})", channel, is_host);
            }
            Ok(None) => {
                tracing::debug!("No meeting record found for channel '{}'", channel);
            }
            Err(e) => {
                tracing::warn!("Failed to load meeting record for '{}': {}", channel, e);
            }
        }
    }

    fn spawn_event_loop(
        &self,
        events: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
        gen: u64,
    ) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let generation = self.generation.clone();
        let devices = self.devices.clone();
        let transport = self.transport.clone();
        let watch_tx = self.watch_tx.clone();
        tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.recv().await {
                if generation.load(Ordering::SeqCst) != gen {
                    tracing::debug!("Discarding transport event after teardown: {:?}", event);
                    break;
                }

                if let TransportEvent::ConnectionLost { reason } = &event {
                    tracing::error!("Transport connection lost: {}", reason);
                    let proceed = {
                        let mut guard = inner.lock().await;
                        if guard.state.is_terminal() || guard.state == SessionState::Leaving {
                            false
                        } else {
                            guard.state = SessionState::Leaving;
                            guard.last_error = Some(
                                TransportError::ConnectionLost {
                                    message: reason.clone(),
                                }
                                .to_string(),
                            );
                            // This task is the one running the teardown; it
                            // must not abort itself
                            guard.event_task = None;
                            true
                        }
                    };
                    if proceed {
                        run_teardown(
                            &inner,
                            &generation,
                            &devices,
                            &transport,
                            &watch_tx,
                            SessionState::Failed,
                        )
                        .await;
                    }
                    break;
                }

                if let TransportEvent::ParticipantPublished { uid, kind } = &event {
                    // Subscribe before the registry update so a renderer
                    // reacting to the snapshot finds the media flowing
                    if let Err(e) = transport.subscribe(*uid, *kind).await {
                        tracing::warn!("{}", e);
                    }
                    if generation.load(Ordering::SeqCst) != gen {
                        break;
                    }
                }

                {
                    let mut guard = inner.lock().await;
                    guard.registry.apply(&event);
                }
                publish_snapshot(&inner, &devices, &watch_tx).await;
            }
            tracing::debug!("Transport event loop ended");
        })
    }

    async fn publish_snapshot(&self) {
        publish_snapshot(&self.inner, &self.devices, &self.watch_tx).await;
    }
}

impl Drop for MeetingCoordinator {
    fn drop(&mut self) {
        // Disposal before a terminal state: invalidate every in-flight
        // continuation first, then run the same unconditional teardown as
        // `leave()` as a detached task. Drop cannot await, so without a
        // runtime this degrades to invalidating continuations and aborting
        // the event task.
        self.generation.fetch_add(1, Ordering::SeqCst);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = self.inner.clone();
                let generation = self.generation.clone();
                let devices = self.devices.clone();
                let transport = self.transport.clone();
                let watch_tx = self.watch_tx.clone();
                handle.spawn(async move {
                    let claimed = {
                        let mut guard = inner.lock().await;
                        match guard.state {
                            SessionState::Joining | SessionState::Joined => {
                                guard.state = SessionState::Leaving;
                                true
                            }
                            // Terminal, never started, or a teardown is
                            // already running
                            _ => false,
                        }
                    };
                    if claimed {
                        tracing::debug!("Coordinator dropped with an active session; tearing down");
                        run_teardown(
                            &inner,
                            &generation,
                            &devices,
                            &transport,
                            &watch_tx,
                            SessionState::Left,
                        )
                        .await;
                    }
                });
            }
            Err(_) => {
                if let Ok(mut guard) = self.inner.try_lock() {
                    if let Some(task) = guard.event_task.take() {
                        task.abort();
                    }
                }
            }
        }
    }
}

async fn build_snapshot(inner: &Mutex<Inner>, devices: &DeviceTrackManager) -> SessionSnapshot {
    let mic = devices.status(TrackKind::Microphone).await;
    let cam = devices.status(TrackKind::Camera).await;
    let guard = inner.lock().await;
    SessionSnapshot {
        state: guard.state,
        session_id: guard.session.as_ref().map(|s| s.id),
        started_at: guard.session.as_ref().map(|s| s.started_at),
        is_host: guard.is_host,
        mic_on: mic.enabled && mic.acquired,
        cam_on: cam.enabled && cam.acquired,
        screen_sharing: guard.screen_sharing,
        has_mic: mic.available,
        has_camera: cam.available,
        remote_name: guard.remote_name.clone(),
        participants: guard.registry.snapshot(),
        last_error: guard.last_error.clone(),
    }
}

async fn publish_snapshot(
    inner: &Mutex<Inner>,
    devices: &DeviceTrackManager,
    watch_tx: &watch::Sender<SessionSnapshot>,
) {
    let snapshot = build_snapshot(inner, devices).await;
    watch_tx.send_replace(snapshot);
}

/// Unconditional, best-effort, total teardown
///
/// Bumps the generation first so every in-flight continuation becomes stale,
/// then unpublishes all local tracks, releases every device handle and leaves
/// the transport. No step is skipped because an earlier one failed; by the
/// time the final state is set, zero device handles are open and the
/// connection is closed.
async fn run_teardown(
    inner: &Mutex<Inner>,
    generation: &AtomicU64,
    devices: &DeviceTrackManager,
    transport: &TransportSession,
    watch_tx: &watch::Sender<SessionSnapshot>,
    final_state: SessionState,
) {
    generation.fetch_add(1, Ordering::SeqCst);
    let task = {
        let mut guard = inner.lock().await;
        guard.event_task.take()
    };
    if let Some(task) = task {
        task.abort();
    }

    let published = devices.published_tracks().await;
    if !published.is_empty() {
        if let Err(e) = transport.unpublish(&published).await {
            tracing::warn!("Failed to unpublish local tracks during teardown: {}", e);
        }
    }
    devices.release_all().await;
    if let Err(e) = transport.leave().await {
        tracing::warn!("Failed to leave transport during teardown: {}", e);
    }

    {
        let mut guard = inner.lock().await;
        guard.state = final_state;
        guard.session = None;
        guard.screen_sharing = false;
        guard.registry.clear();
    }
    publish_snapshot(inner, devices, watch_tx).await;
    tracing::info!("Session teardown complete (state: {:?})", final_state);
}
