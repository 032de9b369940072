//! Device Track Manager
//!
//! This module provides the DeviceTrackManager that owns every local capture
//! handle (microphone, camera, screen) for a coordinator instance. Devices are
//! acquired lazily on first enable, soft-muted on disable so re-enabling never
//! re-acquires the hardware, and released deterministically on teardown.
//!
//! Every handle acquired here is released here; no other component holds
//! device ownership.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::DeviceError;
use crate::media::track::LocalTrack;
use crate::media::TrackKind;
use crate::transport::MediaTransport;

/// Bookkeeping for one local device kind
#[derive(Default)]
struct TrackSlot {
    /// The open device handle, if acquired
    track: Option<Arc<dyn LocalTrack>>,
    /// False after a failed acquisition
    unavailable: bool,
    /// Soft-mute state; meaningless while unacquired
    enabled: bool,
    /// Whether the track has been handed to the transport
    published: bool,
}

/// Snapshot of one device kind's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackStatus {
    /// Whether a device handle is currently open
    pub acquired: bool,
    /// Whether the device could be acquired (false after a failure)
    pub available: bool,
    /// Whether the track is currently unmuted
    pub enabled: bool,
    /// Whether the track has been handed to the transport
    pub published: bool,
}

impl Default for TrackStatus {
    fn default() -> Self {
        Self {
            acquired: false,
            available: true,
            enabled: false,
            published: false,
        }
    }
}

/// Result of an enable/disable request
#[derive(Debug)]
pub enum EnableOutcome {
    /// The track is now enabled. `newly_acquired` tells the caller whether
    /// the device handle was just opened and still needs publishing.
    Enabled {
        track: Arc<dyn LocalTrack>,
        newly_acquired: bool,
    },
    /// The track is now soft-muted (or was never acquired)
    Disabled,
    /// Acquisition failed; the device is flagged unavailable and the enable
    /// request was a no-op
    Unavailable(DeviceError),
}

/// Device Track Manager
///
/// Exclusive owner of local device handles. Acquisition failures surface as
/// typed results and never panic past this boundary.
pub struct DeviceTrackManager {
    provider: Arc<dyn MediaTransport>,
    slots: RwLock<HashMap<TrackKind, TrackSlot>>,
}

impl DeviceTrackManager {
    /// Create a new device track manager backed by the given provider
    pub fn new(provider: Arc<dyn MediaTransport>) -> Self {
        Self {
            provider,
            slots: RwLock::new(HashMap::new()),
        }
    }

    async fn create(&self, kind: TrackKind) -> Result<Arc<dyn LocalTrack>, DeviceError> {
        match kind {
            TrackKind::Microphone => self.provider.create_microphone_track().await,
            TrackKind::Camera => self.provider.create_camera_track().await,
            TrackKind::Screen => self.provider.create_screen_track().await,
        }
    }

    /// Acquire the device for `kind`, opening it if necessary
    ///
    /// Returns the existing handle when one is already open. On failure the
    /// device is flagged unavailable; a later call may retry.
    pub async fn acquire(&self, kind: TrackKind) -> Result<Arc<dyn LocalTrack>, DeviceError> {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(kind).or_default();
        if let Some(track) = &slot.track {
            return Ok(track.clone());
        }
        match self.create(kind).await {
            Ok(track) => {
                slot.track = Some(track.clone());
                slot.unavailable = false;
                Ok(track)
            }
            Err(e) => {
                tracing::warn!("Failed to acquire {} device: {}", kind, e);
                slot.unavailable = true;
                slot.enabled = false;
                Err(e)
            }
        }
    }

    /// Enable or disable the track for `kind`
    ///
    /// Enabling an unacquired track acquires it first (lazy acquisition);
    /// enabling an acquired track only flips its soft-mute state. Disabling
    /// soft-mutes but keeps the device handle open.
    pub async fn set_enabled(&self, kind: TrackKind, on: bool) -> EnableOutcome {
        if !on {
            let track = {
                let mut slots = self.slots.write().await;
                match slots.get_mut(&kind) {
                    Some(slot) => {
                        slot.enabled = false;
                        slot.track.clone()
                    }
                    None => None,
                }
            };
            if let Some(track) = track {
                if let Err(e) = track.set_enabled(false).await {
                    tracing::warn!("Failed to mute {} track: {}", kind, e);
                }
            }
            return EnableOutcome::Disabled;
        }

        let mut slots = self.slots.write().await;
        let slot = slots.entry(kind).or_default();
        if let Some(track) = slot.track.clone() {
            slot.enabled = true;
            drop(slots);
            if let Err(e) = track.set_enabled(true).await {
                tracing::warn!("Failed to unmute {} track: {}", kind, e);
            }
            return EnableOutcome::Enabled {
                track,
                newly_acquired: false,
            };
        }
        // Lazy acquisition; an earlier failure does not block a retry
        match self.create(kind).await {
            Ok(track) => {
                slot.track = Some(track.clone());
                slot.unavailable = false;
                slot.enabled = true;
                EnableOutcome::Enabled {
                    track,
                    newly_acquired: true,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to acquire {} device: {}", kind, e);
                slot.unavailable = true;
                slot.enabled = false;
                EnableOutcome::Unavailable(e)
            }
        }
    }

    /// Record whether the track for `kind` is handed to the transport
    pub async fn mark_published(&self, kind: TrackKind, published: bool) {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get_mut(&kind) {
            // published implies an open handle
            slot.published = published && slot.track.is_some();
        }
    }

    /// Flag a device as unusable, closing any open handle
    ///
    /// Used when publishing the track failed and the capability is degraded.
    pub async fn mark_unavailable(&self, kind: TrackKind) {
        let track = {
            let mut slots = self.slots.write().await;
            let slot = slots.entry(kind).or_default();
            slot.unavailable = true;
            slot.enabled = false;
            slot.published = false;
            slot.track.take()
        };
        if let Some(track) = track {
            if let Err(e) = track.close().await {
                tracing::warn!("Failed to close {} track: {}", kind, e);
            }
        }
    }

    /// Release the device handle for `kind`
    ///
    /// Idempotent; safe to call on an unacquired or already-released track.
    pub async fn release(&self, kind: TrackKind) {
        let track = {
            let mut slots = self.slots.write().await;
            slots.remove(&kind).and_then(|slot| slot.track)
        };
        if let Some(track) = track {
            if let Err(e) = track.close().await {
                tracing::warn!("Failed to close {} track: {}", kind, e);
            }
        }
    }

    /// Release every open device handle
    ///
    /// Best-effort: a close failure is logged and the remaining handles are
    /// still released.
    pub async fn release_all(&self) {
        let tracks: Vec<(TrackKind, Arc<dyn LocalTrack>)> = {
            let mut slots = self.slots.write().await;
            slots
                .drain()
                .filter_map(|(kind, slot)| slot.track.map(|t| (kind, t)))
                .collect()
        };
        for (kind, track) in tracks {
            if let Err(e) = track.close().await {
                tracing::warn!("Failed to close {} track during teardown: {}", kind, e);
            }
        }
    }

    /// Get the current status of a device kind
    pub async fn status(&self, kind: TrackKind) -> TrackStatus {
        let slots = self.slots.read().await;
        match slots.get(&kind) {
            Some(slot) => TrackStatus {
                acquired: slot.track.is_some(),
                available: !slot.unavailable,
                enabled: slot.enabled,
                published: slot.published,
            },
            None => TrackStatus::default(),
        }
    }

    /// Get the open track handle for `kind`, if any
    pub async fn track(&self, kind: TrackKind) -> Option<Arc<dyn LocalTrack>> {
        let slots = self.slots.read().await;
        slots.get(&kind).and_then(|slot| slot.track.clone())
    }

    /// All tracks currently handed to the transport
    pub async fn published_tracks(&self) -> Vec<Arc<dyn LocalTrack>> {
        let slots = self.slots.read().await;
        slots
            .values()
            .filter(|slot| slot.published)
            .filter_map(|slot| slot.track.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn manager() -> (Arc<MockTransport>, DeviceTrackManager) {
        let provider = Arc::new(MockTransport::new());
        let manager = DeviceTrackManager::new(provider.clone());
        (provider, manager)
    }

    #[tokio::test]
    async fn enable_acquires_device_at_most_once() {
        let (provider, manager) = manager();

        for _ in 0..3 {
            let outcome = manager.set_enabled(TrackKind::Microphone, true).await;
            assert!(matches!(outcome, EnableOutcome::Enabled { .. }));
            let outcome = manager.set_enabled(TrackKind::Microphone, false).await;
            assert!(matches!(outcome, EnableOutcome::Disabled));
        }

        assert_eq!(provider.create_count(TrackKind::Microphone), 1);
        let status = manager.status(TrackKind::Microphone).await;
        assert!(status.acquired);
        assert!(!status.enabled);
    }

    #[tokio::test]
    async fn only_first_enable_reports_newly_acquired() {
        let (_provider, manager) = manager();

        match manager.set_enabled(TrackKind::Camera, true).await {
            EnableOutcome::Enabled { newly_acquired, .. } => assert!(newly_acquired),
            other => panic!("expected Enabled, got {:?}", other),
        }
        manager.set_enabled(TrackKind::Camera, false).await;
        match manager.set_enabled(TrackKind::Camera, true).await {
            EnableOutcome::Enabled { newly_acquired, .. } => assert!(!newly_acquired),
            other => panic!("expected Enabled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_acquisition_marks_device_unavailable() {
        let (provider, manager) = manager();
        provider.deny_device(TrackKind::Camera);

        let outcome = manager.set_enabled(TrackKind::Camera, true).await;
        assert!(matches!(outcome, EnableOutcome::Unavailable(_)));

        let status = manager.status(TrackKind::Camera).await;
        assert!(!status.available);
        assert!(!status.enabled);
        assert!(!status.acquired);
    }

    #[tokio::test]
    async fn acquisition_can_be_retried_after_failure() {
        let (provider, manager) = manager();
        provider.deny_device(TrackKind::Microphone);
        let outcome = manager.set_enabled(TrackKind::Microphone, true).await;
        assert!(matches!(outcome, EnableOutcome::Unavailable(_)));

        provider.allow_device(TrackKind::Microphone);
        match manager.set_enabled(TrackKind::Microphone, true).await {
            EnableOutcome::Enabled { newly_acquired, .. } => assert!(newly_acquired),
            other => panic!("expected Enabled, got {:?}", other),
        }
        assert!(manager.status(TrackKind::Microphone).await.available);
    }

    #[tokio::test]
    async fn release_is_idempotent_and_closes_handles() {
        let (provider, manager) = manager();
        manager.set_enabled(TrackKind::Microphone, true).await;
        manager.set_enabled(TrackKind::Camera, true).await;
        assert_eq!(provider.open_track_count(), 2);

        manager.release(TrackKind::Microphone).await;
        manager.release(TrackKind::Microphone).await;
        manager.release(TrackKind::Screen).await;
        assert_eq!(provider.open_track_count(), 1);

        manager.release_all().await;
        assert_eq!(provider.open_track_count(), 0);
    }

    #[tokio::test]
    async fn publish_flag_requires_open_handle() {
        let (_provider, manager) = manager();
        // No handle yet: marking published must not violate published => acquired
        manager.set_enabled(TrackKind::Microphone, false).await;
        manager.mark_published(TrackKind::Microphone, true).await;
        assert!(!manager.status(TrackKind::Microphone).await.published);

        manager.set_enabled(TrackKind::Microphone, true).await;
        manager.mark_published(TrackKind::Microphone, true).await;
        assert!(manager.status(TrackKind::Microphone).await.published);
        assert_eq!(manager.published_tracks().await.len(), 1);
    }
}
