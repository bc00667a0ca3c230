//! Calendar arithmetic shared by the occurrence rules.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use quest_core::WeekIndex;

/// Number of days in the given month, or 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 0,
    }
}

/// `day` in the given month, clamped to the month's last day.
///
/// Example: day 31 in February 2025 resolves to 2025-02-28.
pub fn clamp_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month);
    if last == 0 || day == 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

/// The `index`-th `weekday` of the month; `None` when the month has no such
/// occurrence (e.g. a fifth Monday).
pub fn nth_weekday_of_month(
    year: i32,
    month: u32,
    weekday: Weekday,
    index: WeekIndex,
) -> Option<NaiveDate> {
    let last_day = days_in_month(year, month);
    if last_day == 0 {
        return None;
    }
    let target = weekday.num_days_from_monday();
    match index.ordinal() {
        Some(n) => {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            let offset = (7 + target - first.weekday().num_days_from_monday()) % 7;
            let day = 1 + offset + 7 * (n - 1);
            if day > last_day {
                return None;
            }
            NaiveDate::from_ymd_opt(year, month, day)
        }
        None => {
            let last = NaiveDate::from_ymd_opt(year, month, last_day)?;
            let back = (7 + last.weekday().num_days_from_monday() - target) % 7;
            NaiveDate::from_ymd_opt(year, month, last_day - back)
        }
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Whole Monday-based weeks from `from` to `to`, rounded down.
pub fn weeks_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (week_start(to) - week_start(from)).num_days().div_euclid(7)
}

/// Calendar months from `from`'s month to `to`'s month.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

pub fn years_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year())
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2025, 1), 31);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 4), 30);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 13), 0);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
    }

    #[test]
    fn clamp_to_month_end() {
        assert_eq!(clamp_day(2025, 2, 31), Some(date(2025, 2, 28)));
        assert_eq!(clamp_day(2024, 2, 30), Some(date(2024, 2, 29)));
        assert_eq!(clamp_day(2025, 4, 31), Some(date(2025, 4, 30)));
        assert_eq!(clamp_day(2025, 5, 15), Some(date(2025, 5, 15)));
        assert_eq!(clamp_day(2025, 5, 0), None);
    }

    #[test]
    fn nth_and_last_weekday() {
        // June 2025 starts on a Sunday.
        assert_eq!(
            nth_weekday_of_month(2025, 6, Weekday::Mon, WeekIndex::First),
            Some(date(2025, 6, 2))
        );
        assert_eq!(
            nth_weekday_of_month(2025, 6, Weekday::Sun, WeekIndex::First),
            Some(date(2025, 6, 1))
        );
        assert_eq!(
            nth_weekday_of_month(2025, 6, Weekday::Sun, WeekIndex::Fifth),
            Some(date(2025, 6, 29))
        );
        assert_eq!(
            nth_weekday_of_month(2025, 6, Weekday::Mon, WeekIndex::Fifth),
            Some(date(2025, 6, 30))
        );
        assert_eq!(
            nth_weekday_of_month(2025, 6, Weekday::Tue, WeekIndex::Fifth),
            None
        );
        assert_eq!(
            nth_weekday_of_month(2025, 6, Weekday::Fri, WeekIndex::Last),
            Some(date(2025, 6, 27))
        );
        assert_eq!(
            nth_weekday_of_month(2025, 5, Weekday::Sat, WeekIndex::Last),
            Some(date(2025, 5, 31))
        );
    }

    #[test]
    fn unit_distances() {
        // Sunday to the following Monday is one week apart.
        assert_eq!(weeks_between(date(2025, 6, 1), date(2025, 6, 2)), 1);
        assert_eq!(weeks_between(date(2025, 6, 2), date(2025, 6, 8)), 0);
        assert_eq!(weeks_between(date(2025, 6, 2), date(2025, 6, 16)), 2);
        assert_eq!(months_between(date(2024, 11, 30), date(2025, 1, 1)), 2);
        assert_eq!(years_between(date(2024, 2, 29), date(2025, 2, 28)), 1);
    }
}
