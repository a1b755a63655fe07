//! `StoryConfig` — a draft story before publication (§3, GLOSSARY "Draft").

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::value_objects::{StoryConfigId, StoryConfigStatus, UserId};

#[derive(Debug, Clone)]
pub struct StoryConfig {
    pub id: StoryConfigId,
    pub user_id: UserId,
    pub user_input: String,
    pub config_json: Option<Value>,
    pub status: StoryConfigStatus,
    pub error_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoryConfig {
    pub fn new(user_id: UserId, user_input: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: StoryConfigId::new(),
            user_id,
            user_input: user_input.into(),
            config_json: None,
            status: StoryConfigStatus::Pending,
            error_details: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: StoryConfigStatus) -> Self {
        self.status = status;
        self
    }

    /// TD dispatch of the initial `narrator` task, or §7 retry endpoint
    /// `retry_initial_generation`: moves `pending`/`error` to
    /// `generating` and clears any prior error.
    pub fn begin_generation(&mut self) {
        self.status = StoryConfigStatus::Generating;
        self.error_details = None;
        self.updated_at = Utc::now();
    }

    /// §4.2 `narrator`/`narrator_reviser` success path.
    pub fn mark_ready(&mut self, config_json: Value) {
        self.config_json = Some(config_json);
        self.status = StoryConfigStatus::Ready;
        self.error_details = None;
        self.updated_at = Utc::now();
    }

    /// §4.2 "on error payloads: set the owning aggregate to `error`".
    pub fn mark_error(&mut self, details: impl Into<String>) {
        self.status = StoryConfigStatus::Error;
        self.error_details = Some(details.into());
        self.updated_at = Utc::now();
    }

    /// §4.2 idempotency: "status transitions from a terminal state are
    /// no-ops."
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            StoryConfigStatus::Ready | StoryConfigStatus::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_ready_clears_prior_error() {
        let mut cfg = StoryConfig::new(UserId::new(), "a forest adventure");
        cfg.mark_error("boom");
        cfg.mark_ready(serde_json::json!({"title": "The Forest"}));
        assert_eq!(cfg.status, StoryConfigStatus::Ready);
        assert!(cfg.error_details.is_none());
    }

    #[test]
    fn begin_generation_clears_error_and_retries() {
        let mut cfg = StoryConfig::new(UserId::new(), "x");
        cfg.mark_error("boom");
        cfg.begin_generation();
        assert_eq!(cfg.status, StoryConfigStatus::Generating);
        assert!(cfg.error_details.is_none());
    }

    #[test]
    fn terminal_statuses_are_ready_and_error_only() {
        let mut cfg = StoryConfig::new(UserId::new(), "x");
        assert!(!cfg.is_terminal());
        cfg.status = StoryConfigStatus::Generating;
        assert!(!cfg.is_terminal());
        cfg.status = StoryConfigStatus::Error;
        assert!(cfg.is_terminal());
    }
}
