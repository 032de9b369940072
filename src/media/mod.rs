//! Local media handling
//!
//! This module defines the media kinds exchanged with the transport provider,
//! the [`LocalTrack`](track::LocalTrack) device abstraction, and the
//! [`DeviceTrackManager`](manager::DeviceTrackManager) that owns every local
//! device handle for the lifetime of a session.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod manager;
pub mod track;

pub use manager::{DeviceTrackManager, EnableOutcome, TrackStatus};
pub use track::{LocalTrack, TrackId};

/// Media kind as seen on the wire
///
/// Remote participants publish and unpublish tracks of these kinds; a local
/// screen-share track travels as [`MediaKind::Video`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio media (microphone)
    Audio,
    /// Video media (camera or screen capture)
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Kind of a local capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Microphone capture
    Microphone,
    /// Camera capture
    Camera,
    /// Screen capture
    Screen,
}

impl TrackKind {
    /// The wire-level media kind this device publishes as
    pub fn media_kind(&self) -> MediaKind {
        match self {
            TrackKind::Microphone => MediaKind::Audio,
            TrackKind::Camera | TrackKind::Screen => MediaKind::Video,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Microphone => write!(f, "microphone"),
            TrackKind::Camera => write!(f, "camera"),
            TrackKind::Screen => write!(f, "screen"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_publishes_as_video() {
        assert_eq!(TrackKind::Screen.media_kind(), MediaKind::Video);
        assert_eq!(TrackKind::Camera.media_kind(), MediaKind::Video);
        assert_eq!(TrackKind::Microphone.media_kind(), MediaKind::Audio);
    }
}
