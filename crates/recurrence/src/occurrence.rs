//! Occurrence rules: does a rule fire on a given date?

use crate::calendar::{
    clamp_day, is_weekday, months_between, nth_weekday_of_month, weeks_between, years_between,
};
use chrono::{Datelike, NaiveDate};
use quest_core::{Frequency, MonthlySpec, Rule};

/// Whether `rule` fires on `date`.
///
/// Pure and deterministic: only the rule's pattern and anchor are consulted,
/// never its bookkeeping. A rule never fires before its anchor date.
/// Intervals count whole units from the anchor (days, Monday-based weeks,
/// calendar months or years) and fire when the count is a multiple of the
/// interval.
pub fn fires_on(rule: &Rule, date: NaiveDate) -> bool {
    let anchor = rule.anchor_date;
    if date < anchor {
        return false;
    }
    let interval = i64::from(rule.interval.max(1));
    match rule.frequency {
        Frequency::Daily => (date - anchor).num_days() % interval == 0,
        Frequency::Weekly => {
            let on_day = if rule.days.is_empty() {
                date.weekday() == anchor.weekday()
            } else {
                rule.days.contains(date.weekday())
            };
            on_day && weeks_between(anchor, date) % interval == 0
        }
        Frequency::Weekdays => is_weekday(date),
        Frequency::Monthly => {
            months_between(anchor, date) % interval == 0
                && resolve_monthly_day(rule, date.year(), date.month()) == Some(date)
        }
        Frequency::Annual => {
            years_between(anchor, date) % interval == 0
                && annual_date(anchor, date.year()) == Some(date)
        }
    }
}

/// The date a monthly rule targets in the given month, ignoring interval and
/// anchor. `None` when the pattern has no match that month (a missing fifth
/// weekday).
pub fn resolve_monthly_day(rule: &Rule, year: i32, month: u32) -> Option<NaiveDate> {
    match rule.monthly {
        None => clamp_day(year, month, rule.anchor_date.day()),
        Some(MonthlySpec::Date { on_date }) => clamp_day(year, month, u32::from(on_date)),
        Some(MonthlySpec::Weekday {
            week_index,
            weekday,
        }) => nth_weekday_of_month(year, month, weekday, week_index),
    }
}

/// Anniversary of `anchor` in `year`; Feb 29 falls back to Feb 28.
pub fn annual_date(anchor: NaiveDate, year: i32) -> Option<NaiveDate> {
    clamp_day(year, anchor.month(), anchor.day())
}
