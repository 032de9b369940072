//! Session controls
//!
//! The mute/camera/screen-share operations available while a session is
//! joined. Toggles delegate to the Device Track Manager: the first enable of
//! a device acquires and publishes it, later toggles only flip the soft-mute
//! state. Screen share swaps the camera out of the published set without
//! releasing it and restores it exactly on stop.

use std::sync::atomic::Ordering;

use crate::error::{MeetingError, MeetingResult};
use crate::media::TrackKind;

use super::{publish_snapshot, MeetingCoordinator, SessionState};

impl MeetingCoordinator {
    /// Toggle the microphone
    ///
    /// The device is acquired lazily on the first enable and published
    /// exactly once; subsequent toggles soft-mute without re-acquiring or
    /// re-publishing. An acquisition failure degrades the microphone
    /// (`has_mic` goes false) but leaves the session usable.
    pub async fn toggle_mic(&self) -> MeetingResult<()> {
        self.toggle_device(TrackKind::Microphone).await
    }

    /// Toggle the camera
    ///
    /// Same contract as [`toggle_mic`](Self::toggle_mic). While a screen
    /// share is active the camera is never published; the toggle only flips
    /// its enabled state, which stopping the share then restores.
    pub async fn toggle_camera(&self) -> MeetingResult<()> {
        self.toggle_device(TrackKind::Camera).await
    }

    async fn toggle_device(&self, kind: TrackKind) -> MeetingResult<()> {
        let (gen, suppress_publish) = {
            let guard = self.inner.lock().await;
            if guard.state != SessionState::Joined {
                return Err(MeetingError::invalid_request("no active session"));
            }
            (
                self.generation.load(Ordering::SeqCst),
                kind == TrackKind::Camera && guard.screen_sharing,
            )
        };
        let target = !self.devices.status(kind).await.enabled;
        tracing::debug!("Toggling {} {}", kind, if target { "on" } else { "off" });

        let result = if target {
            self.enable_device(kind, gen, !suppress_publish).await
        } else {
            self.devices.set_enabled(kind, false).await;
            Ok(())
        };
        publish_snapshot(&self.inner, &self.devices, &self.watch_tx).await;
        result
    }

    /// Start or stop sharing the screen
    ///
    /// Starting unpublishes the camera (without releasing it) and publishes a
    /// freshly acquired screen track in its place; stopping releases the
    /// screen track and republishes the camera with its enabled state intact.
    /// A failure to acquire or publish the screen rolls the camera back.
    pub async fn toggle_screen_share(&self) -> MeetingResult<()> {
        let (gen, sharing) = {
            let guard = self.inner.lock().await;
            if guard.state != SessionState::Joined {
                return Err(MeetingError::invalid_request("no active session"));
            }
            (self.generation.load(Ordering::SeqCst), guard.screen_sharing)
        };
        if sharing {
            self.stop_screen_share(gen).await
        } else {
            self.start_screen_share(gen).await
        }
    }

    async fn start_screen_share(&self, gen: u64) -> MeetingResult<()> {
        // Swap the camera out of the published set first; its handle and
        // enabled state are untouched
        let camera = self.devices.track(TrackKind::Camera).await;
        let camera_was_published = self.devices.status(TrackKind::Camera).await.published;
        if camera_was_published {
            if let Some(cam) = &camera {
                if let Err(e) = self.transport.unpublish(std::slice::from_ref(cam)).await {
                    tracing::warn!("Failed to unpublish camera for screen share: {}", e);
                }
                self.devices.mark_published(TrackKind::Camera, false).await;
            }
        }

        let screen = match self.devices.acquire(TrackKind::Screen).await {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!("Screen share failed: {}", e);
                self.restore_camera(camera_was_published, gen).await;
                let err = MeetingError::from(e);
                {
                    let mut guard = self.inner.lock().await;
                    if self.generation.load(Ordering::SeqCst) == gen {
                        guard.last_error = Some(err.to_string());
                    }
                }
                publish_snapshot(&self.inner, &self.devices, &self.watch_tx).await;
                return Err(err);
            }
        };

        match self.transport.publish(&[screen]).await {
            Ok(()) => {
                self.devices.mark_published(TrackKind::Screen, true).await;
                let mut guard = self.inner.lock().await;
                if self.generation.load(Ordering::SeqCst) != gen {
                    // Teardown won the race; release_all already covers the
                    // screen handle
                    return Ok(());
                }
                guard.screen_sharing = true;
                drop(guard);
                publish_snapshot(&self.inner, &self.devices, &self.watch_tx).await;
                tracing::info!("Screen share started");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to publish screen track: {}", e);
                self.devices.release(TrackKind::Screen).await;
                self.restore_camera(camera_was_published, gen).await;
                {
                    let mut guard = self.inner.lock().await;
                    if self.generation.load(Ordering::SeqCst) == gen {
                        guard.last_error = Some(e.to_string());
                    }
                }
                publish_snapshot(&self.inner, &self.devices, &self.watch_tx).await;
                Err(e.into())
            }
        }
    }

    async fn stop_screen_share(&self, gen: u64) -> MeetingResult<()> {
        if let Some(screen) = self.devices.track(TrackKind::Screen).await {
            if let Err(e) = self.transport.unpublish(&[screen]).await {
                tracing::warn!("Failed to unpublish screen track: {}", e);
            }
        }
        self.devices.release(TrackKind::Screen).await;
        {
            let mut guard = self.inner.lock().await;
            if self.generation.load(Ordering::SeqCst) == gen {
                guard.screen_sharing = false;
            }
        }
        // The camera handle stayed open with its enabled state untouched, so
        // republishing restores it exactly
        self.restore_camera(true, gen).await;
        publish_snapshot(&self.inner, &self.devices, &self.watch_tx).await;
        tracing::info!("Screen share stopped");
        Ok(())
    }

    async fn restore_camera(&self, was_published: bool, gen: u64) {
        if !was_published {
            return;
        }
        let Some(camera) = self.devices.track(TrackKind::Camera).await else {
            return;
        };
        if self.generation.load(Ordering::SeqCst) != gen {
            return;
        }
        match self.transport.publish(&[camera]).await {
            Ok(()) => self.devices.mark_published(TrackKind::Camera, true).await,
            Err(e) => {
                tracing::warn!("Failed to republish camera: {}", e);
            }
        }
    }
}
