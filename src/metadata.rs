//! Meeting-metadata gateway
//!
//! Thin adapter boundary to the meeting-record service. The coordinator only
//! needs two things from it: who created the meeting (to resolve host
//! identity after join) and a way to close the record when the host ends the
//! session for everyone. Record CRUD, auth and token issuance live elsewhere.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Meeting record as served by the metadata service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    /// Channel name the meeting rendezvouses on
    pub channel: String,
    /// User id of the meeting creator (the host)
    pub creator_id: String,
    /// Display name of the creator
    pub creator_name: String,
    /// User id of the invited participant
    pub participant_id: String,
    /// Display name of the invited participant
    pub participant_name: String,
}

/// Meeting-metadata gateway trait
#[async_trait::async_trait]
pub trait MeetingGateway: Send + Sync + std::fmt::Debug {
    /// Fetch the meeting record for a channel, if one exists
    async fn meeting_by_channel(&self, channel: &str)
        -> Result<Option<MeetingRecord>, GatewayError>;

    /// Close the meeting record for a channel
    async fn close_meeting(&self, channel: &str) -> Result<(), GatewayError>;
}

/// In-memory gateway used by the test suites
#[derive(Debug, Default)]
pub struct MockMeetingGateway {
    record: Mutex<Option<MeetingRecord>>,
    fail_lookup: Mutex<Option<String>>,
    fail_close: Mutex<Option<String>>,
    close_calls: AtomicUsize,
}

impl MockMeetingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the given record for its channel
    pub fn set_record(&self, record: MeetingRecord) {
        *self.record.lock().unwrap() = Some(record);
    }

    /// Make lookups fail with the given message
    pub fn set_lookup_failure(&self, message: impl Into<String>) {
        *self.fail_lookup.lock().unwrap() = Some(message.into());
    }

    /// Make closes fail with the given message
    pub fn set_close_failure(&self, message: impl Into<String>) {
        *self.fail_close.lock().unwrap() = Some(message.into());
    }

    /// How many times `close_meeting` has been called
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MeetingGateway for MockMeetingGateway {
    async fn meeting_by_channel(
        &self,
        channel: &str,
    ) -> Result<Option<MeetingRecord>, GatewayError> {
        if let Some(message) = self.fail_lookup.lock().unwrap().clone() {
            return Err(GatewayError::LookupFailed(message));
        }
        let record = self.record.lock().unwrap().clone();
        Ok(record.filter(|r| r.channel == channel))
    }

    async fn close_meeting(&self, channel: &str) -> Result<(), GatewayError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_close.lock().unwrap().clone() {
            return Err(GatewayError::CloseFailed(message));
        }
        let mut record = self.record.lock().unwrap();
        if record.as_ref().is_some_and(|r| r.channel == channel) {
            *record = None;
        }
        Ok(())
    }
}
