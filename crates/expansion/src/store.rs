//! Store ports consumed by the engine.

use async_trait::async_trait;
use chrono::NaiveDate;
use quest_core::{NewQuest, QuestId, Rule, RuleId, ValidationError};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by rule and quest stores.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Backend unreachable or failing.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// A quest for this rule and date already exists.
    #[error("quest for rule {rule_id} on {date} already exists")]
    Duplicate { rule_id: RuleId, date: NaiveDate },
    /// Call did not complete within the engine's bound.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// Stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// A conditional rule write found the rule changed or gone.
    #[error("rule {0} changed concurrently")]
    Conflict(RuleId),
    /// Record refused before writing.
    #[error("rejected record: {0}")]
    Rejected(#[from] ValidationError),
}

impl StoreError {
    pub fn unavailable(message: impl ToString) -> Self {
        Self::Unavailable(message.to_string())
    }

    pub fn corrupt(message: impl ToString) -> Self {
        Self::Corrupt(message.to_string())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Persistent recurrence rules.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Every rule the engine should consider.
    async fn list_active_rules(&self) -> Result<Vec<Rule>, StoreError>;
    async fn get(&self, id: &RuleId) -> Result<Option<Rule>, StoreError>;
    /// Insert or replace by id.
    async fn save(&self, rule: &Rule) -> Result<(), StoreError>;
    /// Replace the stored rule with `next` only while it still equals
    /// `current`. Returns `false` when it changed or is gone.
    async fn compare_and_save(&self, current: &Rule, next: &Rule) -> Result<bool, StoreError>;
    /// Returns whether a rule was removed.
    async fn delete(&self, id: &RuleId) -> Result<bool, StoreError>;
}

/// Persistent quest instances.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestStore: Send + Sync {
    /// Whether a quest generated by `rule_id` is due on `date`.
    async fn exists_for(&self, rule_id: &RuleId, date: NaiveDate) -> Result<bool, StoreError>;
    /// Must fail with [`StoreError::Duplicate`] when `quest.source_rule` already
    /// has a quest on `quest.due_date`.
    async fn create_quest(&self, quest: NewQuest) -> Result<QuestId, StoreError>;
    /// Number of stored quests generated by `rule_id`.
    async fn count_generated(&self, rule_id: &RuleId) -> Result<u64, StoreError>;
    /// Remove quests generated by `rule_id` that are due on or after `from`.
    async fn delete_generated_from(
        &self,
        rule_id: &RuleId,
        from: NaiveDate,
    ) -> Result<u64, StoreError>;
}
