//! Error types for meeting session coordination
//!
//! The taxonomy mirrors how failures propagate through the coordinator:
//! device and single-track publish failures are absorbed into capability
//! flags on the session snapshot, while join and connection-level failures
//! terminate the session with a `Failed` state.

use thiserror::Error;

use crate::media::{MediaKind, TrackKind};

/// Failures reported by the media transport provider
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Joining the channel failed; the session transitions to `Failed`
    #[error("Failed to join channel '{channel}': {message}")]
    JoinFailed { channel: String, message: String },

    /// Publishing one or more local tracks failed; degrades that capability only
    #[error("Failed to publish local track(s): {message}")]
    PublishFailed { message: String },

    /// Subscribing to a remote track failed; degrades that capability only
    #[error("Failed to subscribe to {kind} from participant {uid}: {message}")]
    SubscribeFailed {
        uid: u64,
        kind: MediaKind,
        message: String,
    },

    /// The transport connection dropped; the session transitions to `Failed`
    #[error("Transport connection lost: {message}")]
    ConnectionLost { message: String },

    /// An operation was attempted without an established connection
    #[error("Transport is not connected")]
    NotConnected,
}

/// A local capture device could not be acquired or operated
///
/// Device failures never cross the Device Track Manager boundary as panics;
/// they surface as this typed error and mark the device unavailable.
#[derive(Debug, Clone, Error)]
#[error("{kind} device error: {message}")]
pub struct DeviceError {
    /// Which device failed
    pub kind: TrackKind,
    /// Provider-supplied failure detail
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: TrackKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Failures reported by the meeting-metadata gateway
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The meeting record could not be fetched
    #[error("Meeting lookup failed: {0}")]
    LookupFailed(String),

    /// The meeting record could not be closed
    #[error("Meeting close failed: {0}")]
    CloseFailed(String),
}

/// Top-level error type surfaced to callers of the coordinator
#[derive(Debug, Clone, Error)]
pub enum MeetingError {
    /// Bad input (empty channel/token, no active session, duplicate session).
    /// Local and non-retryable without new input.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A local device could not be acquired; the session continues with
    /// that capability degraded
    #[error("{kind} unavailable: {message}")]
    DeviceUnavailable { kind: TrackKind, message: String },

    /// A transport provider failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A non-host participant attempted a host-only operation
    #[error("Only the host may end the meeting for all participants")]
    NotAuthorized,
}

impl MeetingError {
    pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

impl From<DeviceError> for MeetingError {
    fn from(err: DeviceError) -> Self {
        Self::DeviceUnavailable {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Result type for coordinator operations
pub type MeetingResult<T> = std::result::Result<T, MeetingError>;
