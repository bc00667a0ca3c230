//! End conditions: has a rule used up its firings?

use chrono::NaiveDate;
use quest_core::{EndCondition, Rule};

/// Whether `rule` may no longer fire for `candidate`.
///
/// Checked before a firing is counted, so `after N` stops once `fired_count`
/// reaches `N` and `on_date` allows the until date itself.
pub fn is_exhausted(rule: &Rule, candidate: NaiveDate) -> bool {
    match rule.ends {
        EndCondition::Never => false,
        EndCondition::OnDate { until_date } => candidate > until_date,
        EndCondition::After { count } => rule.fired_count >= count,
    }
}

/// Firings left under an `after` condition; `None` when unbounded by count.
pub fn remaining_firings(rule: &Rule) -> Option<u32> {
    match rule.ends {
        EndCondition::After { count } => Some(count.saturating_sub(rule.fired_count)),
        EndCondition::Never | EndCondition::OnDate { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_core::{Frequency, QuestRank, QuestStatus, RuleId, WeekdaySet};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(ends: EndCondition, fired_count: u32) -> Rule {
        Rule {
            id: RuleId("r".to_string()),
            task_name: "Task".to_string(),
            quest_rank: QuestRank::Common,
            frequency: Frequency::Daily,
            interval: 1,
            days: WeekdaySet::new(),
            monthly: None,
            ends,
            status: QuestStatus::Pending,
            anchor_date: date(2025, 1, 1),
            last_fired_date: None,
            fired_count,
        }
    }

    #[test]
    fn never_is_never_exhausted() {
        let r = rule(EndCondition::Never, 10_000);
        assert!(!is_exhausted(&r, date(2100, 12, 31)));
        assert_eq!(remaining_firings(&r), None);
    }

    #[test]
    fn until_date_is_inclusive() {
        let r = rule(
            EndCondition::OnDate {
                until_date: date(2025, 6, 1),
            },
            0,
        );
        assert!(!is_exhausted(&r, date(2025, 6, 1)));
        assert!(is_exhausted(&r, date(2025, 6, 2)));
    }

    #[test]
    fn after_count_compares_fired_count() {
        let ends = EndCondition::After { count: 3 };
        assert!(!is_exhausted(&rule(ends, 2), date(2025, 1, 1)));
        assert!(is_exhausted(&rule(ends, 3), date(2025, 1, 1)));
        assert_eq!(remaining_firings(&rule(ends, 1)), Some(2));
        assert_eq!(remaining_firings(&rule(ends, 5)), Some(0));
    }
}
