//! In-memory stores for development and testing.
//!
//! Nothing is persisted. Quest uniqueness per (rule, date) is enforced the
//! same way the SQLite store enforces it.

use crate::store::{QuestStore, RuleStore, StoreError};
use async_trait::async_trait;
use chrono::NaiveDate;
use quest_core::{validate_new_quest, NewQuest, Quest, QuestId, Rule, RuleId};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Rule and quest store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    rules: RwLock<BTreeMap<RuleId, Rule>>,
    quests: RwLock<Vec<Quest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let map = rules.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            rules: RwLock::new(map),
            quests: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of all quests, in creation order.
    pub async fn quests(&self) -> Vec<Quest> {
        self.quests.read().await.clone()
    }

    /// Quests generated by one rule, in creation order.
    pub async fn quests_for(&self, rule_id: &RuleId) -> Vec<Quest> {
        self.quests
            .read()
            .await
            .iter()
            .filter(|q| q.source_rule.as_ref() == Some(rule_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_active_rules(&self) -> Result<Vec<Rule>, StoreError> {
        Ok(self.rules.read().await.values().cloned().collect())
    }

    async fn get(&self, id: &RuleId) -> Result<Option<Rule>, StoreError> {
        Ok(self.rules.read().await.get(id).cloned())
    }

    async fn save(&self, rule: &Rule) -> Result<(), StoreError> {
        self.rules
            .write()
            .await
            .insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn compare_and_save(&self, current: &Rule, next: &Rule) -> Result<bool, StoreError> {
        let mut rules = self.rules.write().await;
        match rules.get_mut(&current.id) {
            Some(stored) if stored == current => {
                *stored = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &RuleId) -> Result<bool, StoreError> {
        Ok(self.rules.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl QuestStore for MemoryStore {
    async fn exists_for(&self, rule_id: &RuleId, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self
            .quests
            .read()
            .await
            .iter()
            .any(|q| q.due_date == date && q.source_rule.as_ref() == Some(rule_id)))
    }

    async fn create_quest(&self, quest: NewQuest) -> Result<QuestId, StoreError> {
        validate_new_quest(&quest)?;
        let mut quests = self.quests.write().await;
        if let Some(rule_id) = &quest.source_rule {
            let taken = quests
                .iter()
                .any(|q| q.due_date == quest.due_date && q.source_rule.as_ref() == Some(rule_id));
            if taken {
                return Err(StoreError::Duplicate {
                    rule_id: rule_id.clone(),
                    date: quest.due_date,
                });
            }
        }
        let id = QuestId::generate();
        quests.push(quest.into_quest(id.clone()));
        Ok(id)
    }

    async fn count_generated(&self, rule_id: &RuleId) -> Result<u64, StoreError> {
        Ok(self
            .quests
            .read()
            .await
            .iter()
            .filter(|q| q.source_rule.as_ref() == Some(rule_id))
            .count() as u64)
    }

    async fn delete_generated_from(
        &self,
        rule_id: &RuleId,
        from: NaiveDate,
    ) -> Result<u64, StoreError> {
        let mut quests = self.quests.write().await;
        let before = quests.len();
        quests.retain(|q| !(q.source_rule.as_ref() == Some(rule_id) && q.due_date >= from));
        Ok((before - quests.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_core::{QuestRank, QuestStatus};

    fn new_quest(rule: &str, d: u32) -> NewQuest {
        NewQuest {
            quest_name: "Water plants".to_string(),
            quest_rank: QuestRank::Common,
            due_date: NaiveDate::from_ymd_opt(2025, 6, d).unwrap(),
            due_time: None,
            duration_minutes: None,
            status: QuestStatus::Pending,
            source_rule: Some(RuleId(rule.to_string())),
        }
    }

    #[tokio::test]
    async fn rejects_second_quest_for_same_rule_and_date() {
        let store = MemoryStore::new();
        store.create_quest(new_quest("a", 1)).await.unwrap();
        let err = store.create_quest(new_quest("a", 1)).await.unwrap_err();
        assert!(err.is_duplicate());
        store.create_quest(new_quest("b", 1)).await.unwrap();
        store.create_quest(new_quest("a", 2)).await.unwrap();
        assert_eq!(store.quests().await.len(), 3);
    }

    #[tokio::test]
    async fn compare_and_save_needs_current_value() {
        let rule = Rule {
            id: RuleId("a".to_string()),
            task_name: "Water plants".to_string(),
            quest_rank: QuestRank::Common,
            frequency: quest_core::Frequency::Daily,
            interval: 1,
            days: quest_core::WeekdaySet::new(),
            monthly: None,
            ends: quest_core::EndCondition::Never,
            status: QuestStatus::Pending,
            anchor_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            last_fired_date: None,
            fired_count: 0,
        };
        let store = MemoryStore::with_rules([rule.clone()]);
        let mut fired = rule.clone();
        fired.record_firing(rule.anchor_date);

        assert!(store.compare_and_save(&rule, &fired).await.unwrap());
        // `rule` is stale now.
        assert!(!store.compare_and_save(&rule, &fired).await.unwrap());
        assert_eq!(store.get(&rule.id).await.unwrap(), Some(fired.clone()));

        store.delete(&rule.id).await.unwrap();
        assert!(!store.compare_and_save(&fired, &rule).await.unwrap());
        assert_eq!(store.get(&rule.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn counts_generated_quests_per_rule() {
        let store = MemoryStore::new();
        for d in 1..=3 {
            store.create_quest(new_quest("a", d)).await.unwrap();
        }
        store.create_quest(new_quest("b", 1)).await.unwrap();
        assert_eq!(store.count_generated(&RuleId("a".to_string())).await.unwrap(), 3);
        assert_eq!(store.count_generated(&RuleId("c".to_string())).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejects_invalid_quest() {
        let store = MemoryStore::new();
        let mut q = new_quest("a", 1);
        q.quest_name = "  ".to_string();
        let err = store.create_quest(q).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(store.quests().await.is_empty());
    }

    #[tokio::test]
    async fn cascade_keeps_earlier_quests() {
        let store = MemoryStore::new();
        for d in 1..=5 {
            store.create_quest(new_quest("a", d)).await.unwrap();
        }
        store.create_quest(new_quest("b", 4)).await.unwrap();
        let rule = RuleId("a".to_string());
        let removed = store
            .delete_generated_from(&rule, NaiveDate::from_ymd_opt(2025, 6, 3).unwrap())
            .await
            .unwrap();
        assert_eq!(removed, 3);
        let left: Vec<u32> = store
            .quests_for(&rule)
            .await
            .iter()
            .map(|q| chrono::Datelike::day(&q.due_date))
            .collect();
        assert_eq!(left, vec![1, 2]);
        assert_eq!(store.quests().await.len(), 3);
    }
}
