//! Coordinator configuration
//!
//! Session-independent settings supplied once when constructing a
//! [`MeetingCoordinator`](crate::coordinator::MeetingCoordinator).

use std::time::Duration;

/// Configuration for a meeting coordinator instance
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// User id of the local caller, compared against the meeting record's
    /// creator to resolve host identity
    pub local_user_id: String,
    /// Optional cap on how long a join may stay in flight. `None` (the
    /// default) means a slow join is only visible as a prolonged `Joining`
    /// state and is never auto-failed.
    pub join_timeout: Option<Duration>,
}

impl CoordinatorConfig {
    /// Create a configuration for the given local user
    pub fn new(local_user_id: impl Into<String>) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            join_timeout: None,
        }
    }

    /// Fail joins that outlive the given duration
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_join_timeout() {
        let config = CoordinatorConfig::new("user-1");
        assert_eq!(config.local_user_id, "user-1");
        assert!(config.join_timeout.is_none());
    }

    #[test]
    fn builder_sets_join_timeout() {
        let config =
            CoordinatorConfig::new("user-1").with_join_timeout(Duration::from_secs(10));
        assert_eq!(config.join_timeout, Some(Duration::from_secs(10)));
    }
}
