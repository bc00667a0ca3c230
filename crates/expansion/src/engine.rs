//! Expansion engine: turns due rules into quest instances for a date.

use crate::report::{CreatedQuest, FailedRule, RunReport, SkipReason, SkippedRule};
use crate::store::{QuestStore, RuleStore, StoreError};
use chrono::{Local, NaiveDate};
use quest_core::{validate_date, validate_rule, NewQuest, QuestId, Rule};
use recurrence::{fires_on, is_exhausted};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine configuration parameters.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Bound on each store call; exceeding it fails the rule, not the run.
    pub store_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Batch-level failures. Per-rule problems are reported in [`RunReport`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid target date {input:?}: {reason}")]
    InvalidTargetDate { input: String, reason: String },
    #[error("rule store unavailable: {0}")]
    RuleStore(#[source] StoreError),
}

/// Parse a `YYYY-MM-DD` run target.
pub fn parse_target_date(input: &str) -> Result<NaiveDate, EngineError> {
    let invalid = |reason: String| EngineError::InvalidTargetDate {
        input: input.to_string(),
        reason,
    };
    let date =
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|e| invalid(e.to_string()))?;
    validate_date(date).map_err(|e| invalid(e.to_string()))?;
    Ok(date)
}

enum Outcome {
    Created(QuestId),
    Skipped(SkipReason),
    NotDue,
    Failed(StoreError),
}

/// Generates quest instances from recurrence rules.
pub struct ExpansionEngine {
    rules: Arc<dyn RuleStore>,
    quests: Arc<dyn QuestStore>,
    config: EngineConfig,
}

impl ExpansionEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        quests: Arc<dyn QuestStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rules,
            quests,
            config,
        }
    }

    /// Expand for `target`, defaulting to today's local date.
    pub async fn run_expansion(&self, target: Option<NaiveDate>) -> Result<RunReport, EngineError> {
        let target = target.unwrap_or_else(|| Local::now().date_naive());
        self.run(target, &CancellationToken::new()).await
    }

    /// Expand every rule for `target`, in rule-id order.
    ///
    /// Running twice for the same date creates nothing the second time.
    /// Cancellation is checked between rules; a rule already started is
    /// finished first.
    pub async fn run(
        &self,
        target: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        validate_date(target).map_err(|e| EngineError::InvalidTargetDate {
            input: target.to_string(),
            reason: e.to_string(),
        })?;
        let mut rules = self
            .bounded(self.rules.list_active_rules())
            .await
            .map_err(EngineError::RuleStore)?;
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        info!(target_date = %target, rules = rules.len(), "starting expansion run");

        let mut report = RunReport::new(target);
        for rule in rules {
            if cancel.is_cancelled() {
                warn!(target_date = %target, "expansion run cancelled");
                report.cancelled = true;
                break;
            }
            let rule_id = rule.id.clone();
            match self.expand_rule(rule, target).await {
                Outcome::Created(quest_id) => {
                    info!(rule_id = %rule_id, quest_id = %quest_id, "quest created");
                    report.created.push(CreatedQuest { rule_id, quest_id });
                }
                Outcome::Skipped(reason) => {
                    debug!(rule_id = %rule_id, ?reason, "rule skipped");
                    report.skipped.push(SkippedRule { rule_id, reason });
                }
                Outcome::NotDue => {}
                Outcome::Failed(err) => {
                    warn!(rule_id = %rule_id, error = %err, "rule expansion failed");
                    report.failed.push(FailedRule {
                        rule_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            target_date = %target,
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "expansion run finished"
        );
        Ok(report)
    }

    async fn expand_rule(&self, stored: Rule, target: NaiveDate) -> Outcome {
        if let Err(e) = validate_rule(&stored) {
            return Outcome::Skipped(SkipReason::Invalid(e.to_string()));
        }
        // Generated quests bound the firing count from below.
        let produced = match self.bounded(self.quests.count_generated(&stored.id)).await {
            Ok(n) => u32::try_from(n).unwrap_or(u32::MAX),
            Err(e) => return Outcome::Failed(e),
        };
        let mut rule = stored.clone();
        rule.fired_count = rule.fired_count.max(produced);

        if is_exhausted(&rule, target) {
            return Outcome::Skipped(SkipReason::Exhausted);
        }
        if !fires_on(&rule, target) {
            return Outcome::NotDue;
        }
        if rule.last_fired_date == Some(target) {
            return Outcome::Skipped(SkipReason::Duplicate);
        }
        match self.bounded(self.quests.exists_for(&rule.id, target)).await {
            Ok(true) => {
                // The quest is already counted in `produced`; only the date lags.
                rule.last_fired_date = rule.last_fired_date.max(Some(target));
                if let Err(e) = self.replace(&stored, &rule).await {
                    return Outcome::Failed(e);
                }
                return Outcome::Skipped(SkipReason::Duplicate);
            }
            Ok(false) => {}
            Err(e) => return Outcome::Failed(e),
        }

        // Reserve the firing first: a quest never exists without being counted.
        let unreserved = rule.clone();
        rule.record_firing(target);
        if let Err(e) = self.replace(&stored, &rule).await {
            return Outcome::Failed(e);
        }

        let quest = NewQuest::from_rule(&rule, target);
        match self.bounded(self.quests.create_quest(quest)).await {
            Ok(quest_id) => Outcome::Created(quest_id),
            Err(e) if e.is_duplicate() => Outcome::Skipped(SkipReason::Duplicate),
            Err(e @ StoreError::Timeout(_)) => {
                // The insert may still land; keep the reservation.
                warn!(rule_id = %rule.id, "quest creation timed out, firing stays reserved");
                Outcome::Failed(e)
            }
            Err(e) => {
                if let Err(undo) = self.replace(&rule, &unreserved).await {
                    error!(
                        rule_id = %rule.id,
                        error = %undo,
                        "quest not created and reserved firing not released"
                    );
                }
                Outcome::Failed(e)
            }
        }
    }

    /// Write `next` over `current`; fails with [`StoreError::Conflict`] when
    /// another writer changed the rule since it was read.
    async fn replace(&self, current: &Rule, next: &Rule) -> Result<(), StoreError> {
        if current == next {
            return Ok(());
        }
        if self.bounded(self.rules.compare_and_save(current, next)).await? {
            Ok(())
        } else {
            Err(StoreError::Conflict(current.id.clone()))
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.store_timeout)),
        }
    }
}
