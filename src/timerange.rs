//! Relative date expressions (`7_days_ago`, `this_week`, `last_month`...)
//! resolved to absolute calendar dates around a reference instant.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone};
use regex::Regex;

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_(days|weeks|months)_ago$").expect("static regex is valid")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid date {0:?}: expected today, yesterday, N_days_ago, this_week, last_week, N_weeks_ago, this_month, last_month, N_months_ago or YYYY-MM-DD")]
    Invalid(String),
    #[error("date {0:?} is out of range")]
    OutOfRange(String),
}

/// Which end of a window an expression is resolved for. Week and month
/// expressions yield their first day for `Start` and their last day for `End`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Absolute `[start, end]` calendar dates, read in the local day of the
/// instant they were resolved against. `start <= end` is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Days,
    Weeks,
    Months,
}

/// Resolve a start and an end expression independently against `now`.
pub fn resolve<Tz: TimeZone>(now: &DateTime<Tz>, start: &str, end: &str) -> Result<DateRange, DateError> {
    let base = now.date_naive();
    Ok(DateRange {
        start: resolve_date(base, start, Bound::Start)?,
        end: resolve_date(base, end, Bound::End)?,
    })
}

/// Resolve a single expression against a base date.
pub fn resolve_date(base: NaiveDate, expr: &str, bound: Bound) -> Result<NaiveDate, DateError> {
    let (count, period) = match expr {
        "today" => (0, Period::Days),
        "yesterday" => (1, Period::Days),
        "this_week" => (0, Period::Weeks),
        "last_week" => (1, Period::Weeks),
        "this_month" => (0, Period::Months),
        "last_month" => (1, Period::Months),
        _ => match parse_relative(expr)? {
            Some(relative) => relative,
            None => {
                return NaiveDate::parse_from_str(expr, "%Y-%m-%d")
                    .map_err(|_| DateError::Invalid(expr.to_string()));
            }
        },
    };

    let resolved = match period {
        Period::Days => base.checked_sub_days(Days::new(count)),
        Period::Weeks => week_bound(base, count, bound),
        Period::Months => month_bound(base, count, bound),
    };
    resolved.ok_or_else(|| DateError::OutOfRange(expr.to_string()))
}

fn parse_relative(expr: &str) -> Result<Option<(u64, Period)>, DateError> {
    let Some(caps) = RELATIVE.captures(expr) else {
        return Ok(None);
    };

    let count = caps[1]
        .parse::<u64>()
        .map_err(|_| DateError::OutOfRange(expr.to_string()))?;
    let period = match &caps[2] {
        "days" => Period::Days,
        "weeks" => Period::Weeks,
        _ => Period::Months,
    };
    Ok(Some((count, period)))
}

/// Monday..Sunday window `weeks_ago` weeks before the one containing `base`.
fn week_bound(base: NaiveDate, weeks_ago: u64, bound: Bound) -> Option<NaiveDate> {
    let monday = base.checked_sub_days(Days::new(base.weekday().num_days_from_monday() as u64))?;
    let monday = monday.checked_sub_days(Days::new(weeks_ago.checked_mul(7)?))?;
    match bound {
        Bound::Start => Some(monday),
        Bound::End => monday.checked_add_days(Days::new(6)),
    }
}

/// First or last calendar day of the month `months_ago` months before `base`.
fn month_bound(base: NaiveDate, months_ago: u64, bound: Bound) -> Option<NaiveDate> {
    let months = u32::try_from(months_ago).ok()?;
    let first = NaiveDate::from_ymd_opt(base.year(), base.month(), 1)?
        .checked_sub_months(Months::new(months))?;
    match bound {
        Bound::Start => Some(first),
        Bound::End => first
            .checked_add_months(Months::new(1))?
            .checked_sub_days(Days::new(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 15, 30, 0).unwrap()
    }

    #[test]
    fn yesterday_is_one_day_back_for_both_bounds() {
        let range = resolve(&at(2019, 3, 27), "yesterday", "yesterday").unwrap();
        assert_eq!(range.start, date(2019, 3, 26));
        assert_eq!(range.end, date(2019, 3, 26));
    }

    #[test]
    fn this_month_spans_first_to_last_day() {
        let range = resolve(&at(2019, 1, 27), "this_month", "this_month").unwrap();
        assert_eq!(range.start, date(2019, 1, 1));
        assert_eq!(range.end, date(2019, 1, 31));
    }

    #[test]
    fn this_week_is_monday_to_sunday() {
        let range = resolve(&at(2019, 3, 14), "this_week", "this_week").unwrap();
        assert_eq!(range.start, date(2019, 3, 11));
        assert_eq!(range.end, date(2019, 3, 17));
    }

    #[test]
    fn sunday_closes_the_previous_monday_week() {
        let range = resolve(&at(2019, 3, 17), "this_week", "this_week").unwrap();
        assert_eq!(range.start, date(2019, 3, 11));
        assert_eq!(range.end, date(2019, 3, 17));
    }

    #[test]
    fn weeks_ago_shift_whole_windows() {
        let range = resolve(&at(2019, 3, 14), "last_week", "2_weeks_ago").unwrap();
        assert_eq!(range.start, date(2019, 3, 4));
        assert_eq!(range.end, date(2019, 3, 3));
    }

    #[test]
    fn months_ago_handle_year_boundaries_and_leap_years() {
        let base = date(2020, 3, 31);
        assert_eq!(resolve_date(base, "last_month", Bound::Start).unwrap(), date(2020, 2, 1));
        assert_eq!(resolve_date(base, "last_month", Bound::End).unwrap(), date(2020, 2, 29));
        assert_eq!(resolve_date(base, "4_months_ago", Bound::Start).unwrap(), date(2019, 11, 1));
        assert_eq!(resolve_date(base, "4_months_ago", Bound::End).unwrap(), date(2019, 11, 30));
    }

    #[test]
    fn days_ago_and_absolute_dates() {
        let base = date(2019, 3, 1);
        assert_eq!(resolve_date(base, "today", Bound::Start).unwrap(), base);
        assert_eq!(resolve_date(base, "7_days_ago", Bound::End).unwrap(), date(2019, 2, 22));
        assert_eq!(resolve_date(base, "2018-12-25", Bound::Start).unwrap(), date(2018, 12, 25));
    }

    #[test]
    fn unparseable_expressions_carry_the_raw_string() {
        let err = resolve_date(date(2019, 3, 1), "next_tuesday", Bound::Start).unwrap_err();
        assert_eq!(err, DateError::Invalid("next_tuesday".to_string()));
        assert!(err.to_string().contains("next_tuesday"));

        // Aliases are case-sensitive.
        assert!(resolve_date(date(2019, 3, 1), "Today", Bound::Start).is_err());
    }

    #[test]
    fn overflowing_counts_are_errors() {
        let err = resolve_date(date(2019, 3, 1), "99999999999_days_ago", Bound::Start).unwrap_err();
        assert!(matches!(err, DateError::OutOfRange(_)));
    }

    #[test]
    fn reversed_ranges_pass_through() {
        let range = resolve(&at(2019, 3, 14), "today", "7_days_ago").unwrap();
        assert_eq!(range.start, date(2019, 3, 14));
        assert_eq!(range.end, date(2019, 3, 7));
    }

    #[test]
    fn base_date_is_taken_in_its_own_time_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tokyo.with_ymd_and_hms(2019, 3, 27, 1, 0, 0).unwrap();
        let range = resolve(&now, "today", "today").unwrap();
        assert_eq!(range.start, date(2019, 3, 27));
    }
}
