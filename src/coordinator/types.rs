//! Type definitions for the session coordinator
//!
//! Contains the session state machine states, the device preferences callers
//! pass to `start_session`, and the read-only snapshot the coordinator
//! publishes after every observable change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::RemoteParticipant;

/// Lifecycle state of a meeting session
///
/// `Left`, `Ended` and `Failed` are terminal for a given session; starting a
/// new session requires a fresh `start_session` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been started
    Idle,
    /// The transport join is in flight
    Joining,
    /// Connected to the channel; controls are available
    Joined,
    /// Teardown is in progress
    Leaving,
    /// The caller left the session
    Left,
    /// The host ended the session for all participants
    Ended,
    /// The session failed (join failure or lost connection)
    Failed,
}

impl SessionState {
    /// Whether this state ends the session's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Left | SessionState::Ended | SessionState::Failed
        )
    }

    /// Whether a session currently occupies the coordinator
    ///
    /// A new `start_session` is rejected while this is true.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Joining | SessionState::Joined | SessionState::Leaving
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

/// Which devices the caller wants enabled at join time
///
/// Only the requested devices are acquired eagerly; everything else is
/// acquired lazily on first toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePrefs {
    /// Start with the microphone enabled
    pub mic_on: bool,
    /// Start with the camera enabled
    pub cam_on: bool,
}

impl DevicePrefs {
    pub fn new(mic_on: bool, cam_on: bool) -> Self {
        Self { mic_on, cam_on }
    }
}

/// Read-only view of the coordinator's observable state
///
/// Published through a watch channel after every observable change; UI code
/// renders from this and never reaches into the coordinator's internals.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Current lifecycle state
    pub state: SessionState,
    /// Identifier of the active session, `None` outside one
    pub session_id: Option<Uuid>,
    /// When the active session was started
    pub started_at: Option<DateTime<Utc>>,
    /// Whether the local caller created the meeting
    pub is_host: bool,
    /// Whether the microphone track is enabled
    pub mic_on: bool,
    /// Whether the camera track is enabled
    pub cam_on: bool,
    /// Whether a screen share is active
    pub screen_sharing: bool,
    /// Whether the microphone could be acquired
    pub has_mic: bool,
    /// Whether the camera could be acquired
    pub has_camera: bool,
    /// Display name of the remote party, once the meeting record is known
    pub remote_name: Option<String>,
    /// Remote participants, ordered by first-seen time
    pub participants: Vec<RemoteParticipant>,
    /// Most recent absorbed error, if any
    pub last_error: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            session_id: None,
            started_at: None,
            is_host: false,
            mic_on: false,
            cam_on: false,
            screen_sharing: false,
            // Optimistic until an acquisition fails
            has_mic: true,
            has_camera: true,
            remote_name: None,
            participants: Vec::new(),
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_active_states_do_not_overlap() {
        for state in [
            SessionState::Idle,
            SessionState::Joining,
            SessionState::Joined,
            SessionState::Leaving,
            SessionState::Left,
            SessionState::Ended,
            SessionState::Failed,
        ] {
            assert!(!(state.is_terminal() && state.is_active()));
        }
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Idle.is_active());
    }

    #[test]
    fn snapshot_serializes_for_consumers() {
        let snapshot = SessionSnapshot {
            state: SessionState::Joined,
            session_id: Some(Uuid::new_v4()),
            mic_on: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["state"], "joined");
        assert_eq!(value["mic_on"], true);
        assert!(value["session_id"].is_string());
        assert!(value["started_at"].is_null());
    }
}
