//! Participant Registry
//!
//! Pure state container over remote presence/media events. The registry owns
//! the set of remote participants exclusively; the coordinator only reads
//! snapshots. Events may arrive out of order: a publish for an unseen uid
//! implicitly creates the participant, and a leave for an unknown uid is a
//! no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::MediaKind;
use crate::transport::{ParticipantUid, RemotePresence, TransportEvent};

/// A remote participant currently present in the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParticipant {
    /// Provider-issued identifier, unique within the channel
    pub uid: ParticipantUid,
    /// Media kinds this participant is currently publishing
    pub publishing: Vec<MediaKind>,
    /// When this participant was first observed
    pub first_seen: DateTime<Utc>,
}

impl RemoteParticipant {
    fn new(uid: ParticipantUid) -> Self {
        Self {
            uid,
            publishing: Vec::new(),
            first_seen: Utc::now(),
        }
    }

    /// Whether this participant currently publishes the given kind
    pub fn is_publishing(&self, kind: MediaKind) -> bool {
        self.publishing.contains(&kind)
    }
}

/// Registry of remote participants, ordered by first-seen time
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Vec<RemoteParticipant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, uid: ParticipantUid) -> &mut RemoteParticipant {
        let idx = match self.participants.iter().position(|p| p.uid == uid) {
            Some(idx) => idx,
            None => {
                self.participants.push(RemoteParticipant::new(uid));
                self.participants.len() - 1
            }
        };
        &mut self.participants[idx]
    }

    /// Seed the registry from the join-time participant list
    pub fn seed(&mut self, existing: &[RemotePresence]) {
        for presence in existing {
            let participant = self.ensure(presence.uid);
            for kind in &presence.publishing {
                if !participant.publishing.contains(kind) {
                    participant.publishing.push(*kind);
                }
            }
        }
    }

    /// Fold one transport event into the registry
    ///
    /// Tolerates any event order; connection-level events are ignored here.
    pub fn apply(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::ParticipantJoined { uid } => {
                self.ensure(*uid);
            }
            TransportEvent::ParticipantPublished { uid, kind } => {
                // A publish may arrive before the join; create implicitly
                let participant = self.ensure(*uid);
                if !participant.publishing.contains(kind) {
                    participant.publishing.push(*kind);
                }
            }
            TransportEvent::ParticipantUnpublished { uid, kind } => {
                if let Some(participant) =
                    self.participants.iter_mut().find(|p| p.uid == *uid)
                {
                    participant.publishing.retain(|k| k != kind);
                }
            }
            TransportEvent::ParticipantLeft { uid } => {
                self.participants.retain(|p| p.uid != *uid);
            }
            TransportEvent::ConnectionLost { .. } => {}
        }
    }

    /// Remove every participant
    pub fn clear(&mut self) {
        self.participants.clear();
    }

    /// Read-only snapshot, ordered by first-seen time
    pub fn snapshot(&self) -> Vec<RemoteParticipant> {
        self.participants.clone()
    }

    /// Total number of remote participants present
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Look up a participant by uid
    pub fn get(&self, uid: ParticipantUid) -> Option<&RemoteParticipant> {
        self.participants.iter().find(|p| p.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_before_join_creates_participant() {
        let mut registry = ParticipantRegistry::new();
        registry.apply(&TransportEvent::ParticipantPublished {
            uid: 7,
            kind: MediaKind::Video,
        });
        assert_eq!(registry.len(), 1);
        assert!(registry.get(7).unwrap().is_publishing(MediaKind::Video));

        // The late join must not duplicate the entry
        registry.apply(&TransportEvent::ParticipantJoined { uid: 7 });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn out_of_order_join_after_publish_then_leave_removes_entry() {
        let mut registry = ParticipantRegistry::new();
        registry.apply(&TransportEvent::ParticipantPublished {
            uid: 7,
            kind: MediaKind::Video,
        });
        registry.apply(&TransportEvent::ParticipantJoined { uid: 7 });
        registry.apply(&TransportEvent::ParticipantLeft { uid: 7 });
        assert!(registry.is_empty());
        assert!(registry.get(7).is_none());
    }

    #[test]
    fn leave_for_unknown_uid_is_a_no_op() {
        let mut registry = ParticipantRegistry::new();
        registry.apply(&TransportEvent::ParticipantLeft { uid: 42 });
        assert!(registry.is_empty());

        registry.apply(&TransportEvent::ParticipantUnpublished {
            uid: 42,
            kind: MediaKind::Audio,
        });
        assert!(registry.is_empty());
    }

    #[test]
    fn unpublish_removes_only_that_kind() {
        let mut registry = ParticipantRegistry::new();
        registry.apply(&TransportEvent::ParticipantPublished {
            uid: 1,
            kind: MediaKind::Audio,
        });
        registry.apply(&TransportEvent::ParticipantPublished {
            uid: 1,
            kind: MediaKind::Video,
        });
        registry.apply(&TransportEvent::ParticipantUnpublished {
            uid: 1,
            kind: MediaKind::Video,
        });

        let participant = registry.get(1).unwrap();
        assert!(participant.is_publishing(MediaKind::Audio));
        assert!(!participant.is_publishing(MediaKind::Video));
    }

    #[test]
    fn snapshot_preserves_first_seen_order() {
        let mut registry = ParticipantRegistry::new();
        registry.apply(&TransportEvent::ParticipantJoined { uid: 3 });
        registry.apply(&TransportEvent::ParticipantJoined { uid: 1 });
        registry.apply(&TransportEvent::ParticipantPublished {
            uid: 3,
            kind: MediaKind::Audio,
        });
        registry.apply(&TransportEvent::ParticipantJoined { uid: 2 });

        let uids: Vec<_> = registry.snapshot().iter().map(|p| p.uid).collect();
        assert_eq!(uids, vec![3, 1, 2]);
    }

    #[test]
    fn seed_from_join_time_list() {
        let mut registry = ParticipantRegistry::new();
        registry.seed(&[
            RemotePresence {
                uid: 5,
                publishing: vec![MediaKind::Audio, MediaKind::Video],
            },
            RemotePresence {
                uid: 6,
                publishing: vec![],
            },
        ]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(5).unwrap().is_publishing(MediaKind::Video));
        assert!(!registry.get(6).unwrap().is_publishing(MediaKind::Audio));
    }
}
