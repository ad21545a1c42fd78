use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use thiserror::Error;

/// How far back the evaluator searches before giving up
///
/// One full Gregorian cycle: 400 years is a whole number of weeks, so every
/// date lands on every weekday inside it. Date and weekday combinations such
/// as `0 0 29 2 */7` can go 40 years between firings
const MAX_LOOKBACK_DAYS: i64 = 146_097;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A schedule expression that cannot be used to compute expected runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("unknown nickname `{0}`")]
    UnknownNickname(String),

    #[error("invalid {field} field `{value}`: {reason}")]
    InvalidField {
        field: Field,
        value: String,
        reason: String,
    },

    #[error("expression never fires")]
    NeverFires,

    #[error("no matching instant found before {0}")]
    NoMatch(DateTime<Utc>),
}

/// The five positional fields of a cron expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl Field {
    fn bounds(self) -> (u32, u32) {
        match self {
            Field::Minute => (0, 59),
            Field::Hour => (0, 23),
            Field::DayOfMonth => (1, 31),
            Field::Month => (1, 12),
            // 7 is an alias for Sunday and is folded into 0 after parsing.
            Field::DayOfWeek => (0, 7),
        }
    }

    fn names(self) -> &'static [&'static str] {
        match self {
            Field::Month => &MONTH_NAMES,
            Field::DayOfWeek => &WEEKDAY_NAMES,
            _ => &[],
        }
    }

    /// Value of the first entry in `names()`
    fn name_offset(self) -> u32 {
        match self {
            Field::Month => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::DayOfMonth => "day-of-month",
            Field::Month => "month",
            Field::DayOfWeek => "day-of-week",
        };
        write!(f, "{s}")
    }
}

/// Set of allowed values for one field, bit `n` set when `n` is allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ValueSet(u64);

impl ValueSet {
    fn insert(&mut self, value: u32) {
        self.0 |= 1 << value;
    }

    fn contains(self, value: u32) -> bool {
        self.0 & (1 << value) != 0
    }
}

/// A parsed 5-field cron expression, evaluated in UTC at minute resolution
///
/// Day matching follows Vixie cron: if either day field starts with `*` both
/// must match, otherwise either may. `1-31` counts as restricted, so
/// `0 0 1-31 * 1` fires every day while `0 0 */2 * 1` needs an odd-dated Monday
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minutes: ValueSet,
    hours: ValueSet,
    days_of_month: ValueSet,
    months: ValueSet,
    days_of_week: ValueSet,
    // Set when the day field starts with `*`; controls AND/OR day matching.
    dom_unrestricted: bool,
    dow_unrestricted: bool,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let expr = expr.trim();
        let expanded = if expr.starts_with('@') {
            expand_nickname(expr)?
        } else {
            expr
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }

        let mut days_of_week = parse_field(fields[4], Field::DayOfWeek)?;
        if days_of_week.contains(7) {
            days_of_week.0 &= !(1 << 7);
            days_of_week.insert(0);
        }

        let cron = Self {
            minutes: parse_field(fields[0], Field::Minute)?,
            hours: parse_field(fields[1], Field::Hour)?,
            days_of_month: parse_field(fields[2], Field::DayOfMonth)?,
            months: parse_field(fields[3], Field::Month)?,
            days_of_week,
            dom_unrestricted: fields[2].starts_with('*'),
            dow_unrestricted: fields[4].starts_with('*'),
        };

        if !cron.can_fire() {
            return Err(ScheduleError::NeverFires);
        }
        Ok(cron)
    }

    /// Latest whole-minute instant `<= reference` at which the expression fires
    pub fn previous_at_or_before(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let start = floor_to_minute(reference.naive_utc());
        let limit = start - Duration::days(MAX_LOOKBACK_DAYS);
        let mut t = start;

        while t >= limit {
            let date = t.date();

            if !self.months.contains(date.month()) {
                t = start_of_day(first_of_month(date)) - Duration::minutes(1);
                continue;
            }
            if !self.day_matches(date) {
                t = start_of_day(date) - Duration::minutes(1);
                continue;
            }
            if !self.hours.contains(t.hour()) {
                t = start_of_day(date) + Duration::hours(i64::from(t.hour())) - Duration::minutes(1);
                continue;
            }
            if !self.minutes.contains(t.minute()) {
                t -= Duration::minutes(1);
                continue;
            }
            return Ok(Utc.from_utc_datetime(&t));
        }

        Err(ScheduleError::NoMatch(reference))
    }

    /// Whether `instant` (truncated to the minute) is a firing instant
    #[cfg(test)]
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        let t = instant.naive_utc();
        self.months.contains(t.month())
            && self.day_matches(t.date())
            && self.hours.contains(t.hour())
            && self.minutes.contains(t.minute())
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());

        if self.dom_unrestricted || self.dow_unrestricted {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// Rule out day-of-month/month combinations that never exist (`0 0 30 2 *`)
    ///
    /// Only relevant when the weekday field cannot rescue them
    fn can_fire(&self) -> bool {
        if !self.dom_unrestricted && !self.dow_unrestricted {
            return true;
        }
        (1..=12).filter(|m| self.months.contains(*m)).any(|month| {
            let longest = match month {
                2 => 29,
                4 | 6 | 9 | 11 => 30,
                _ => 31,
            };
            (1..=longest).any(|day| self.days_of_month.contains(day))
        })
    }
}

impl FromStr for CronExpr {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The most recent instant at or before `reference` at which `expr` fires
pub fn previous_scheduled_instant(
    expr: &str,
    reference: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    CronExpr::parse(expr)?.previous_at_or_before(reference)
}

fn expand_nickname(expr: &str) -> Result<&'static str, ScheduleError> {
    match expr.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        "@monthly" => Ok("0 0 1 * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@hourly" => Ok("0 * * * *"),
        _ => Err(ScheduleError::UnknownNickname(expr.to_string())),
    }
}

fn parse_field(raw: &str, field: Field) -> Result<ValueSet, ScheduleError> {
    let invalid = |reason: String| ScheduleError::InvalidField {
        field,
        value: raw.to_string(),
        reason,
    };
    let (min, max) = field.bounds();
    let mut set = ValueSet::default();

    for item in raw.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| invalid(format!("bad step `{step}`")))?;
                if step == 0 {
                    return Err(invalid("step must be positive".to_string()));
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            let lo = parse_value(lo, field).map_err(&invalid)?;
            let hi = parse_value(hi, field).map_err(&invalid)?;
            if lo > hi {
                return Err(invalid(format!("range {lo}-{hi} is inverted")));
            }
            (lo, hi)
        } else {
            let value = parse_value(range, field).map_err(&invalid)?;
            // `N/S` runs from N to the end of the field.
            if step.is_some() {
                (value, max)
            } else {
                (value, value)
            }
        };

        if start < min || end > max {
            return Err(invalid(format!("values must be within {min}-{max}")));
        }

        let step = step.unwrap_or(1);
        for value in (start..=end).step_by(step as usize) {
            set.insert(value);
        }
    }

    Ok(set)
}

fn parse_value(token: &str, field: Field) -> Result<u32, String> {
    if token.is_empty() {
        return Err("empty value".to_string());
    }
    if let Ok(value) = token.parse::<u32>() {
        return Ok(value);
    }
    field
        .names()
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .map(|index| index as u32 + field.name_offset())
        .ok_or_else(|| format!("`{token}` is not a number"))
}

fn floor_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    start_of_day(t.date())
        + Duration::hours(i64::from(t.hour()))
        + Duration::minutes(i64::from(t.minute()))
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[rstest]
    #[case("0 * * * *", at(2024, 5, 10, 14, 37, 12), at(2024, 5, 10, 14, 0, 0))]
    #[case("*/15 * * * *", at(2024, 5, 10, 14, 37, 0), at(2024, 5, 10, 14, 30, 0))]
    #[case("30 2 * * *", at(2024, 5, 10, 1, 0, 0), at(2024, 5, 9, 2, 30, 0))]
    #[case("0 0 1 * *", at(2024, 3, 1, 0, 0, 0), at(2024, 3, 1, 0, 0, 0))]
    #[case("0 0 1 * *", at(2024, 2, 29, 23, 59, 59), at(2024, 2, 1, 0, 0, 0))]
    #[case("0 0 1 1 *", at(2024, 6, 1, 0, 0, 0), at(2024, 1, 1, 0, 0, 0))]
    #[case("0 0 29 2 *", at(2025, 6, 1, 0, 0, 0), at(2024, 2, 29, 0, 0, 0))]
    #[case("0 9 * * 1-5", at(2024, 5, 12, 12, 0, 0), at(2024, 5, 10, 9, 0, 0))]
    #[case("0 9 * * MON-FRI", at(2024, 5, 12, 12, 0, 0), at(2024, 5, 10, 9, 0, 0))]
    #[case("0 0 * * 7", at(2024, 5, 15, 0, 0, 0), at(2024, 5, 12, 0, 0, 0))]
    #[case("0 0 * JAN,jul *", at(2024, 5, 15, 0, 0, 0), at(2024, 1, 31, 0, 0, 0))]
    #[case("5-10/5 3 * * *", at(2024, 5, 15, 3, 9, 0), at(2024, 5, 15, 3, 5, 0))]
    #[case("@hourly", at(2024, 5, 15, 3, 9, 0), at(2024, 5, 15, 3, 0, 0))]
    #[case("@weekly", at(2024, 5, 15, 3, 9, 0), at(2024, 5, 12, 0, 0, 0))]
    #[case("0 0 29 2 */5", at(2024, 6, 1, 0, 0, 0), at(2008, 2, 29, 0, 0, 0))]
    #[case("0 0 29 2 */7", at(2720, 1, 1, 0, 0, 0), at(2680, 2, 29, 0, 0, 0))]
    fn finds_previous_instant(
        #[case] expr: &str,
        #[case] reference: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        assert_eq!(previous_scheduled_instant(expr, reference).unwrap(), expected);
    }

    #[test]
    fn restricted_day_fields_match_either() {
        // 2024-05-13 is a Monday; the 15th is a Wednesday.
        let cron = CronExpr::parse("0 0 15 * 1").unwrap();
        assert!(cron.matches(at(2024, 5, 13, 0, 0, 0)));
        assert!(cron.matches(at(2024, 5, 15, 0, 0, 0)));
        assert!(!cron.matches(at(2024, 5, 14, 0, 0, 0)));

        let prev = cron.previous_at_or_before(at(2024, 5, 14, 12, 0, 0)).unwrap();
        assert_eq!(prev, at(2024, 5, 13, 0, 0, 0));
    }

    #[test]
    fn starred_day_field_requires_both() {
        // `*/2` starts with a star, so the weekday restriction must also hold.
        let cron = CronExpr::parse("0 0 */2 * 1").unwrap();
        assert!(cron.matches(at(2024, 5, 13, 0, 0, 0))); // Monday the 13th
        assert!(!cron.matches(at(2024, 5, 20, 0, 0, 0))); // Monday the 20th
        assert!(!cron.matches(at(2024, 5, 15, 0, 0, 0))); // Wednesday the 15th
    }

    #[test]
    fn full_range_day_field_counts_as_restricted() {
        let cron = CronExpr::parse("0 0 1-31 * 1").unwrap();
        assert!(cron.matches(at(2024, 5, 13, 0, 0, 0))); // Monday
        assert!(cron.matches(at(2024, 5, 14, 0, 0, 0))); // Tuesday
        assert!(cron.matches(at(2024, 5, 18, 0, 0, 0))); // Saturday
    }

    #[rstest]
    #[case("not-a-cron")]
    #[case("* * * *")]
    #[case("* * * * * *")]
    #[case("60 * * * *")]
    #[case("* 24 * * *")]
    #[case("* * 0 * *")]
    #[case("* * * 13 *")]
    #[case("* * * * 8")]
    #[case("*/0 * * * *")]
    #[case("10-5 * * * *")]
    #[case("1,,2 * * * *")]
    #[case("* * * FOO *")]
    #[case("@fortnightly")]
    #[case("0 0 30 2 *")]
    #[case("0 0 31 4,6 *")]
    fn rejects_invalid_expressions(#[case] expr: &str) {
        assert!(CronExpr::parse(expr).is_err(), "{expr} should not parse");
    }

    #[test]
    fn impossible_dates_are_fine_when_weekday_is_restricted() {
        // Day-of-month never matches but the weekday does.
        assert!(CronExpr::parse("0 0 30 2 1").is_ok());
    }

    #[test]
    fn reports_field_in_error() {
        let err = CronExpr::parse("0 25 * * *").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidField { field: Field::Hour, .. }));
        assert!(err.to_string().contains("hour"));
    }

    #[rstest]
    #[case("0 * * * *")]
    #[case("*/7 3-17 * * *")]
    #[case("15 4 1,15 * 2")]
    #[case("0 12 * * SAT,SUN")]
    #[case("45 23 28-31 * *")]
    fn result_is_the_most_recent_match(#[case] expr: &str) {
        let cron = CronExpr::parse(expr).unwrap();
        let reference = at(2024, 3, 3, 10, 17, 42);
        let prev = cron.previous_at_or_before(reference).unwrap();

        assert!(prev <= reference);
        assert!(cron.matches(prev));

        let mut t = prev + Duration::minutes(1);
        while t <= reference {
            assert!(!cron.matches(t), "{expr} also fires at {t}, after {prev}");
            t += Duration::minutes(1);
        }
    }
}
