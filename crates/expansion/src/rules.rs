//! Rule lifecycle: creation, edits and deletion.

use crate::store::{QuestStore, RuleStore, StoreError};
use chrono::NaiveDate;
use quest_core::{validate_rule, Rule, RuleDraft, RuleId, ValidationError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RuleServiceError {
    #[error("invalid rule: {0}")]
    Invalid(#[from] ValidationError),
    #[error("rule not found: {0}")]
    NotFound(RuleId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a rule deletion also removes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteScope {
    /// Only the rule; generated quests stay.
    #[default]
    RuleOnly,
    /// The rule and its generated quests due today or later.
    WithFutureInstances,
}

/// Outcome of [`RuleService::delete`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deleted {
    pub removed_quests: u64,
}

/// Validating front door for rule changes.
pub struct RuleService {
    rules: Arc<dyn RuleStore>,
    quests: Arc<dyn QuestStore>,
}

impl RuleService {
    pub fn new(rules: Arc<dyn RuleStore>, quests: Arc<dyn QuestStore>) -> Self {
        Self { rules, quests }
    }

    /// Validate and store a new rule. The anchor defaults to `today`.
    pub async fn create(&self, draft: RuleDraft, today: NaiveDate) -> Result<Rule, RuleServiceError> {
        let rule = draft.into_rule(RuleId::generate(), today);
        validate_rule(&rule)?;
        self.rules.save(&rule).await?;
        info!(rule_id = %rule.id, frequency = %rule.frequency, "rule created");
        Ok(rule)
    }

    /// Replace a rule's definition, keeping its id and firing history.
    pub async fn update(&self, id: &RuleId, draft: RuleDraft) -> Result<Rule, RuleServiceError> {
        let existing = self
            .rules
            .get(id)
            .await?
            .ok_or_else(|| RuleServiceError::NotFound(id.clone()))?;
        let anchor = existing.anchor_date;
        let mut rule = draft.into_rule(id.clone(), anchor);
        rule.last_fired_date = existing.last_fired_date;
        rule.fired_count = existing.fired_count;
        validate_rule(&rule)?;
        self.rules.save(&rule).await?;
        info!(rule_id = %rule.id, "rule updated");
        Ok(rule)
    }

    /// Delete a rule. Quests dated before `today` are never touched.
    pub async fn delete(
        &self,
        id: &RuleId,
        scope: DeleteScope,
        today: NaiveDate,
    ) -> Result<Deleted, RuleServiceError> {
        // Quests are only removed once the rule can no longer fire.
        if !self.rules.delete(id).await? {
            return Err(RuleServiceError::NotFound(id.clone()));
        }
        let removed_quests = match scope {
            DeleteScope::RuleOnly => 0,
            DeleteScope::WithFutureInstances => {
                self.quests.delete_generated_from(id, today).await?
            }
        };
        info!(rule_id = %id, removed_quests, "rule deleted");
        Ok(Deleted { removed_quests })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use quest_core::{EndCondition, Frequency, NewQuest, QuestRank, QuestStatus, WeekdaySet};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(name: &str) -> RuleDraft {
        RuleDraft {
            task_name: name.to_string(),
            quest_rank: QuestRank::Legendary,
            frequency: Frequency::Daily,
            interval: 1,
            days: WeekdaySet::new(),
            monthly: None,
            ends: EndCondition::Never,
            status: QuestStatus::Pending,
            anchor_date: None,
        }
    }

    fn service(store: &Arc<MemoryStore>) -> RuleService {
        RuleService::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn create_assigns_id_and_anchor() {
        let store = Arc::new(MemoryStore::new());
        let rule = service(&store)
            .create(draft("Meditate"), date(2025, 6, 2))
            .await
            .unwrap();
        assert_eq!(rule.anchor_date, date(2025, 6, 2));
        assert_eq!(rule.fired_count, 0);
        assert_eq!(store.get(&rule.id).await.unwrap(), Some(rule));
    }

    #[tokio::test]
    async fn create_rejects_invalid_rule() {
        let store = Arc::new(MemoryStore::new());
        let mut d = draft("Meditate");
        d.interval = 0;
        let err = service(&store).create(d, date(2025, 6, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            RuleServiceError::Invalid(ValidationError::ZeroInterval)
        ));
        assert!(store.list_active_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_history() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let mut rule = svc.create(draft("Run"), date(2025, 6, 1)).await.unwrap();
        rule.record_firing(date(2025, 6, 1));
        store.save(&rule).await.unwrap();

        let mut d = draft("Run 5k");
        d.quest_rank = QuestRank::Epic;
        let updated = svc.update(&rule.id, d).await.unwrap();
        assert_eq!(updated.task_name, "Run 5k");
        assert_eq!(updated.fired_count, 1);
        assert_eq!(updated.anchor_date, date(2025, 6, 1));

        let missing = svc.update(&RuleId("nope".to_string()), draft("x")).await;
        assert!(matches!(missing, Err(RuleServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_scopes() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let rule = svc.create(draft("Read"), date(2025, 6, 1)).await.unwrap();
        for d in 1..=5 {
            store
                .create_quest(NewQuest::from_rule(&rule, date(2025, 6, d)))
                .await
                .unwrap();
        }

        let deleted = svc
            .delete(&rule.id, DeleteScope::WithFutureInstances, date(2025, 6, 4))
            .await
            .unwrap();
        assert_eq!(deleted.removed_quests, 2);
        assert_eq!(store.quests_for(&rule.id).await.len(), 3);
        assert_eq!(store.get(&rule.id).await.unwrap(), None);

        let again = svc
            .delete(&rule.id, DeleteScope::RuleOnly, date(2025, 6, 4))
            .await;
        assert!(matches!(again, Err(RuleServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_rule_delete_keeps_future_quests() {
        use crate::store::MockRuleStore;

        let quests = Arc::new(MemoryStore::new());
        let rule = draft("Read").into_rule(RuleId("r".to_string()), date(2025, 6, 1));
        for d in 3..=5 {
            quests
                .create_quest(NewQuest::from_rule(&rule, date(2025, 6, d)))
                .await
                .unwrap();
        }
        let mut rules = MockRuleStore::new();
        rules
            .expect_delete()
            .returning(|_| Err(StoreError::unavailable("locked")));
        let svc = RuleService::new(Arc::new(rules), quests.clone());

        let err = svc
            .delete(&rule.id, DeleteScope::WithFutureInstances, date(2025, 6, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, RuleServiceError::Store(_)));
        assert_eq!(quests.quests().await.len(), 3);
    }

    #[tokio::test]
    async fn rule_only_delete_leaves_quests() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let rule = svc.create(draft("Read"), date(2025, 6, 1)).await.unwrap();
        store
            .create_quest(NewQuest::from_rule(&rule, date(2025, 6, 9)))
            .await
            .unwrap();
        let deleted = svc
            .delete(&rule.id, DeleteScope::default(), date(2025, 6, 4))
            .await
            .unwrap();
        assert_eq!(deleted.removed_quests, 0);
        assert_eq!(store.quests().await.len(), 1);
    }
}
