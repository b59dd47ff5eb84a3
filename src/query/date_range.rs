//! Resolves `startDate`/`endDate` request values into date clauses and bucket plans.

use serde::Serialize;
use time::{Date, Month, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    query::predicate::{Condition, FieldPath, Predicate},
    transaction::DATE_FIELD,
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// Ranges spanning at least this many days are bucketed by month instead of by day.
const MONTHLY_BUCKET_THRESHOLD_DAYS: i64 = 366;

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// The first day of the range.
    pub start: Date,
    /// The last day of the range.
    pub end: Date,
}

impl DateRange {
    /// The number of calendar days in the range, counting both ends.
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).whole_days() + 1
    }
}

/// The date restriction requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// No date parameters were given.
    Unbounded,
    /// Only `startDate` was given: match that exact day.
    Day(Date),
    /// Both dates were given.
    Range(DateRange),
    /// Only `endDate` was given: match everything up to the end of that day.
    Until(Date),
}

impl DateFilter {
    /// Add the clauses for this filter to `predicate`.
    pub fn apply(&self, predicate: &mut Predicate) {
        let field = || FieldPath::new(DATE_FIELD);

        match self {
            DateFilter::Unbounded => {}
            DateFilter::Day(day) => predicate.push(field(), Condition::DayEquals(day.to_string())),
            DateFilter::Range(range) => {
                predicate.push(field(), Condition::RangeGte(start_of_day(range.start)));
                predicate.push(field(), Condition::RangeLte(end_of_day(range.end)));
            }
            DateFilter::Until(end) => predicate.push(field(), Condition::RangeLte(end_of_day(*end))),
        }
    }

    /// The complete range of days covered by the filter, if it has one.
    pub fn range(&self) -> Option<DateRange> {
        match self {
            DateFilter::Day(day) => Some(DateRange {
                start: *day,
                end: *day,
            }),
            DateFilter::Range(range) => Some(*range),
            DateFilter::Unbounded | DateFilter::Until(_) => None,
        }
    }
}

/// Parse the optional `startDate` and `endDate` request values.
///
/// Only the first 10 characters are read, so both `2024-01-05` and
/// `2024-01-05T10:00:00Z` name the same day.
///
/// # Errors
/// Returns [Error::InvalidDate] if a value is not a calendar date, or
/// [Error::InvalidDateRange] if `end_date` is before `start_date`.
pub fn resolve_date_filter(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<DateFilter, Error> {
    let start = start_date.map(parse_date).transpose()?;
    let end = end_date.map(parse_date).transpose()?;

    match (start, end) {
        (None, None) => Ok(DateFilter::Unbounded),
        (Some(day), None) => Ok(DateFilter::Day(day)),
        (None, Some(end)) => Ok(DateFilter::Until(end)),
        (Some(start), Some(end)) if end < start => Err(Error::InvalidDateRange { start, end }),
        (Some(start), Some(end)) => Ok(DateFilter::Range(DateRange { start, end })),
    }
}

/// Parse the calendar day at the start of an ISO-like date string.
pub fn parse_date(raw: &str) -> Result<Date, Error> {
    let trimmed = raw.trim();

    trimmed
        .get(..10)
        .and_then(|day| Date::parse(day, DATE_FORMAT).ok())
        .ok_or_else(|| Error::InvalidDate(trimmed.to_owned()))
}

fn start_of_day(day: Date) -> String {
    // A bare day sorts before every timestamp on that day.
    day.to_string()
}

fn end_of_day(day: Date) -> String {
    format!("{day} 23:59:59.999")
}

/// The calendar period used to group a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketSize {
    /// Group by `YYYY-MM-DD`.
    Day,
    /// Group by `YYYY-MM`.
    Month,
}

impl BucketSize {
    /// The number of leading characters of a `tran_date` value that form the bucket key.
    pub fn key_length(&self) -> usize {
        match self {
            BucketSize::Day => 10,
            BucketSize::Month => 7,
        }
    }
}

/// Every bucket key of a date range, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPlan {
    range: DateRange,
    size: BucketSize,
    keys: Vec<String>,
}

impl BucketPlan {
    /// Plan the buckets of `range`.
    ///
    /// Ranges of 366 days or more are grouped by month, shorter ranges by day.
    /// The keys are generated from the calendar, so periods without any records still get a
    /// bucket.
    pub fn for_range(range: DateRange) -> Self {
        if range.total_days() >= MONTHLY_BUCKET_THRESHOLD_DAYS {
            Self {
                range,
                size: BucketSize::Month,
                keys: month_keys(range),
            }
        } else {
            Self {
                range,
                size: BucketSize::Day,
                keys: day_keys(range),
            }
        }
    }

    /// The range the plan covers.
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// The size of each bucket.
    pub fn size(&self) -> BucketSize {
        self.size
    }

    /// The bucket keys in ascending order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

fn day_keys(range: DateRange) -> Vec<String> {
    let mut keys = Vec::with_capacity(range.total_days().max(0) as usize);
    let mut day = Some(range.start);

    while let Some(current) = day.filter(|current| *current <= range.end) {
        keys.push(current.to_string());
        day = current.next_day();
    }

    keys
}

fn month_keys(range: DateRange) -> Vec<String> {
    let mut keys = Vec::new();
    let (mut year, mut month) = (range.start.year(), range.start.month());
    let (end_year, end_month) = (range.end.year(), range.end.month());

    while (year, month as u8) <= (end_year, end_month as u8) {
        keys.push(format!("{year:04}-{:02}", month as u8));

        if month == Month::December {
            year += 1;
        }
        month = month.next();
    }

    keys
}

/// The description of the planned date range that is sent with every report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateInfo {
    /// The first day of the range.
    pub start_date: Option<String>,
    /// The last day of the range.
    pub end_date: Option<String>,
    /// The number of days in the range.
    pub total_days: Option<i64>,
    /// Whether the series is grouped by day or by month.
    pub bucket: Option<BucketSize>,
}

impl DateInfo {
    /// Describe `plan`, or an empty description if there is no plan.
    pub fn from_plan(plan: Option<&BucketPlan>) -> Self {
        match plan {
            Some(plan) => Self {
                start_date: Some(plan.range.start.to_string()),
                end_date: Some(plan.range.end.to_string()),
                total_days: Some(plan.range.total_days()),
                bucket: Some(plan.size),
            },
            None => Self {
                start_date: None,
                end_date: None,
                total_days: None,
                bucket: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Error,
        query::predicate::{Condition, Predicate},
    };

    use super::{BucketPlan, BucketSize, DateFilter, DateRange, parse_date, resolve_date_filter};

    #[test]
    fn no_dates_is_unbounded() {
        let filter = resolve_date_filter(None, None).unwrap();

        assert_eq!(filter, DateFilter::Unbounded);

        let mut predicate = Predicate::new();
        filter.apply(&mut predicate);
        assert!(predicate.is_empty());
    }

    #[test]
    fn start_date_only_matches_exact_day() {
        let filter = resolve_date_filter(Some("2024-03-09T12:00:00Z"), None).unwrap();

        let mut predicate = Predicate::new();
        filter.apply(&mut predicate);

        assert_eq!(filter, DateFilter::Day(date!(2024 - 03 - 09)));
        assert_eq!(
            predicate.clauses()[0].condition,
            Condition::DayEquals("2024-03-09".to_owned())
        );
    }

    #[test]
    fn both_dates_give_inclusive_range() {
        let filter = resolve_date_filter(Some("2024-01-01"), Some("2024-01-03")).unwrap();

        let mut predicate = Predicate::new();
        filter.apply(&mut predicate);

        let conditions: Vec<_> = predicate
            .clauses()
            .iter()
            .map(|clause| clause.condition.clone())
            .collect();
        assert_eq!(
            conditions,
            vec![
                Condition::RangeGte("2024-01-01".to_owned()),
                Condition::RangeLte("2024-01-03 23:59:59.999".to_owned()),
            ]
        );
    }

    #[test]
    fn end_before_start_is_rejected() {
        let result = resolve_date_filter(Some("2024-02-01"), Some("2024-01-31"));

        assert_eq!(
            result,
            Err(Error::InvalidDateRange {
                start: date!(2024 - 02 - 01),
                end: date!(2024 - 01 - 31),
            })
        );
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for raw in ["", "2024-1-1", "yesterday", "2024-13-01", "2024-02-30"] {
            assert!(
                matches!(parse_date(raw), Err(Error::InvalidDate(_))),
                "{raw:?} should not parse"
            );
        }
    }

    #[test]
    fn daily_plan_includes_every_day() {
        let plan = BucketPlan::for_range(DateRange {
            start: date!(2024 - 02 - 27),
            end: date!(2024 - 03 - 02),
        });

        assert_eq!(plan.size(), BucketSize::Day);
        assert_eq!(
            plan.keys(),
            [
                "2024-02-27",
                "2024-02-28",
                "2024-02-29",
                "2024-03-01",
                "2024-03-02"
            ]
        );
    }

    #[test]
    fn a_year_minus_one_day_is_still_daily() {
        let range = DateRange {
            start: date!(2023 - 01 - 01),
            end: date!(2023 - 12 - 31),
        };

        let plan = BucketPlan::for_range(range);

        assert_eq!(range.total_days(), 365);
        assert_eq!(plan.size(), BucketSize::Day);
        assert_eq!(plan.keys().len(), 365);
    }

    #[test]
    fn spans_of_366_days_are_monthly() {
        let plan = BucketPlan::for_range(DateRange {
            start: date!(2023 - 11 - 15),
            end: date!(2024 - 11 - 14),
        });

        assert_eq!(plan.size(), BucketSize::Month);
        assert_eq!(plan.keys().first().unwrap(), "2023-11");
        assert_eq!(plan.keys().last().unwrap(), "2024-11");
        assert_eq!(plan.keys().len(), 13);
    }
}
