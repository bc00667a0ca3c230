//! Upcoming firing dates, for calendar previews.

use crate::end_condition::is_exhausted;
use crate::occurrence::fires_on;
use chrono::{Duration, NaiveDate};
use quest_core::{EndCondition, Rule};

/// Days scanned ahead before giving up on finding another firing.
pub const PREVIEW_HORIZON_DAYS: i64 = 366 * 30;

/// The next `limit` dates on or after `from` on which `rule` would fire,
/// honoring its end condition as if each listed date had fired.
///
/// Dates up to and including `last_fired_date` are never listed.
pub fn upcoming(rule: &Rule, from: NaiveDate, limit: usize) -> Vec<NaiveDate> {
    let mut sim = rule.clone();
    let mut start = from.max(rule.anchor_date);
    if let Some(last) = rule.last_fired_date {
        if last >= start {
            start = last + Duration::days(1);
        }
    }

    let mut out = Vec::with_capacity(limit.min(64));
    let mut day = start;
    let end = start + Duration::days(PREVIEW_HORIZON_DAYS);
    while out.len() < limit && day <= end {
        if is_exhausted(&sim, day) {
            break;
        }
        if fires_on(&sim, day) {
            out.push(day);
            sim.record_firing(day);
        }
        day += Duration::days(1);
    }
    out
}

/// Last date the rule can fire on, when its end condition bounds it.
pub fn final_firing(rule: &Rule) -> Option<NaiveDate> {
    match rule.ends {
        EndCondition::Never => None,
        EndCondition::OnDate { until_date } => {
            let mut day = until_date;
            while day >= rule.anchor_date {
                if fires_on(rule, day) {
                    return Some(day);
                }
                day -= Duration::days(1);
            }
            None
        }
        EndCondition::After { count } => {
            let mut fresh = rule.clone();
            fresh.fired_count = 0;
            fresh.last_fired_date = None;
            upcoming(&fresh, rule.anchor_date, count as usize)
                .last()
                .copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_core::{Frequency, MonthlySpec, QuestRank, QuestStatus, RuleId, WeekdaySet};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_31(ends: EndCondition) -> Rule {
        Rule {
            id: RuleId("r".to_string()),
            task_name: "Budget review".to_string(),
            quest_rank: QuestRank::Epic,
            frequency: Frequency::Monthly,
            interval: 1,
            days: WeekdaySet::new(),
            monthly: Some(MonthlySpec::Date { on_date: 31 }),
            ends,
            status: QuestStatus::Pending,
            anchor_date: date(2025, 1, 1),
            last_fired_date: None,
            fired_count: 0,
        }
    }

    #[test]
    fn upcoming_respects_count() {
        let r = monthly_31(EndCondition::After { count: 2 });
        assert_eq!(
            upcoming(&r, date(2025, 1, 1), 10),
            vec![date(2025, 1, 31), date(2025, 2, 28)]
        );
        assert_eq!(final_firing(&r), Some(date(2025, 2, 28)));
    }

    #[test]
    fn upcoming_respects_until_date() {
        let r = monthly_31(EndCondition::OnDate {
            until_date: date(2025, 4, 15),
        });
        assert_eq!(
            upcoming(&r, date(2025, 1, 1), 10),
            vec![date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]
        );
        assert_eq!(final_firing(&r), Some(date(2025, 3, 31)));
    }

    #[test]
    fn upcoming_skips_already_fired() {
        let mut r = monthly_31(EndCondition::Never);
        r.record_firing(date(2025, 1, 31));
        assert_eq!(
            upcoming(&r, date(2025, 1, 1), 2),
            vec![date(2025, 2, 28), date(2025, 3, 31)]
        );
        assert_eq!(final_firing(&r), None);
    }
}
