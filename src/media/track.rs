//! Local Track Abstraction
//!
//! This module defines the core trait for local capture tracks. The transport
//! provider creates concrete tracks (microphone, camera, screen); the
//! coordinator only ever handles them through this interface.

use crate::error::DeviceError;
use crate::media::TrackKind;

/// Unique identifier for a local track
pub type TrackId = uuid::Uuid;

/// Local capture track trait
///
/// This trait defines the interface that all local tracks must implement.
/// Provider-specific implementations perform the actual device I/O. Every
/// track handle is exclusively owned by the
/// [`DeviceTrackManager`](crate::media::DeviceTrackManager); no other
/// component opens or closes devices directly.
#[async_trait::async_trait]
pub trait LocalTrack: Send + Sync + std::fmt::Debug {
    /// Get the unique identifier of this track
    fn id(&self) -> TrackId;

    /// Get the device kind of this track
    fn kind(&self) -> TrackKind;

    /// Soft-mute or unmute the track
    ///
    /// The device handle stays open either way, so re-enabling is cheap and
    /// does not re-acquire the device.
    async fn set_enabled(&self, enabled: bool) -> Result<(), DeviceError>;

    /// Close the underlying device handle
    ///
    /// Must be idempotent: closing an already-closed track is a no-op.
    async fn close(&self) -> Result<(), DeviceError>;
}
