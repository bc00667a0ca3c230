//! Per-run outcome aggregation.

use chrono::NaiveDate;
use quest_core::{QuestId, RuleId};
use serde::Serialize;

/// Why a rule produced no quest although it was considered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// End condition reached.
    Exhausted,
    /// A quest for this rule and date already exists.
    Duplicate,
    /// The rule failed validation.
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatedQuest {
    pub rule_id: RuleId,
    pub quest_id: QuestId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub rule_id: RuleId,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedRule {
    pub rule_id: RuleId,
    pub error: String,
}

/// Result of one expansion run.
///
/// Rules that simply do not fire on the target date appear nowhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub target_date: NaiveDate,
    pub created: Vec<CreatedQuest>,
    pub skipped: Vec<SkippedRule>,
    pub failed: Vec<FailedRule>,
    /// The run stopped early; rules after the last listed one were not seen.
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(target_date: NaiveDate) -> Self {
        Self {
            target_date,
            created: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        }
    }

    pub fn created_ids(&self) -> Vec<QuestId> {
        self.created.iter().map(|c| c.quest_id.clone()).collect()
    }

    pub fn failed_ids(&self) -> Vec<RuleId> {
        self.failed.iter().map(|f| f.rule_id.clone()).collect()
    }

    /// Rules skipped for exactly `reason`.
    pub fn skipped_for(&self, reason: &SkipReason) -> Vec<RuleId> {
        self.skipped
            .iter()
            .filter(|s| &s.reason == reason)
            .map(|s| s.rule_id.clone())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let mut report = RunReport::new(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        report.skipped.push(SkippedRule {
            rule_id: RuleId("r1".to_string()),
            reason: SkipReason::Invalid("interval must be >= 1".to_string()),
        });
        report.skipped.push(SkippedRule {
            rule_id: RuleId("r2".to_string()),
            reason: SkipReason::Duplicate,
        });
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["target_date"], "2025-06-02");
        assert_eq!(v["skipped"][0]["reason"], "invalid");
        assert_eq!(v["skipped"][0]["detail"], "interval must be >= 1");
        assert_eq!(v["skipped"][1]["reason"], "duplicate");
        assert_eq!(
            report.skipped_for(&SkipReason::Duplicate),
            vec![RuleId("r2".to_string())]
        );
        assert!(report.is_clean());
    }
}
