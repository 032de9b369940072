//! # Meeting Core
//!
//! Session-coordination layer for two-party real-time audio/video meetings.
//! The crate owns the full lifecycle of a single session — joining the
//! transport channel, acquiring and publishing local capture devices, tracking
//! the remote participant, exposing the in-meeting controls, and tearing
//! everything down deterministically — behind a provider-agnostic transport
//! trait. UI layers render from the published snapshots and never touch
//! transport or device internals directly.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Application / UI                  │
//! └────────────────────────┬─────────────────────────────┘
//! ┌────────────────────────▼─────────────────────────────┐
//! │                 MeetingCoordinator                   │
//! │   state machine · controls · snapshot publication    │
//! ├──────────────┬───────────────────┬───────────────────┤
//! │ DeviceTrack  │   Participant     │   MeetingGateway  │
//! │ Manager      │   Registry        │   (metadata)      │
//! ├──────────────┴───────────────────┴───────────────────┤
//! │            MediaTransport (provider trait)           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
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
//! let coordinator =
//!     MeetingCoordinator::new(transport, gateway, CoordinatorConfig::new("user-1"));
//!
//! // Join with the microphone live and the camera off
//! coordinator
//!     .start_session("room-1", "token-1", DevicePrefs::new(true, false))
//!     .await?;
//!
//! // Watch snapshots for rendering
//! let mut updates = coordinator.subscribe();
//! tokio::spawn(async move {
//!     while updates.changed().await.is_ok() {
//!         let snapshot = updates.borrow().clone();
//!         println!("state: {:?}, remotes: {}", snapshot.state, snapshot.participants.len());
//!     }
//! });
//!
//! coordinator.toggle_camera().await?;
//! coordinator.leave().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod media;
pub mod metadata;
pub mod registry;
pub mod transport;

pub use config::CoordinatorConfig;
pub use coordinator::{DevicePrefs, MeetingCoordinator, SessionSnapshot, SessionState};
pub use error::{DeviceError, GatewayError, MeetingError, MeetingResult, TransportError};
pub use media::{DeviceTrackManager, LocalTrack, MediaKind, TrackId, TrackKind};
pub use metadata::{MeetingGateway, MeetingRecord};
pub use registry::{ParticipantRegistry, RemoteParticipant};
pub use transport::{
    JoinSuccess, MediaTransport, ParticipantUid, RemotePresence, TransportEvent, TransportSession,
};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
