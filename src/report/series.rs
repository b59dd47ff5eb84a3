//! Zero-filled time series over a bucket plan.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error,
    query::{BucketPlan, Predicate, ResolvedQuery},
    report::BucketTotals,
    transaction::store::{bucket_totals, matching_day_bounds},
};

/// The all-records and sales totals of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DailyMetric {
    pub date: String,
    pub total_count: u64,
    pub total_amount: f64,
    pub sales_count: u64,
    pub sales_amount: f64,
}

/// Pick the bucket plan for a request.
///
/// A request with a complete date range uses that range. Otherwise the plan spans the first to
/// the last day with a matching record, and there is no plan if nothing matches.
pub(super) fn plan_series(
    resolved: &ResolvedQuery,
    connection: &Connection,
) -> Result<Option<BucketPlan>, Error> {
    if let Some(plan) = resolved.requested_plan() {
        return Ok(Some(plan));
    }

    let bounds = matching_day_bounds(&resolved.predicate, connection)?;

    Ok(bounds.map(BucketPlan::for_range))
}

/// Query the totals of `predicate` per bucket and fill the gaps with zeros.
///
/// Without a plan the series is empty.
pub(super) fn query_series(
    predicate: &Predicate,
    plan: Option<&BucketPlan>,
    connection: &Connection,
) -> Result<Vec<BucketTotals>, Error> {
    let Some(plan) = plan else {
        return Ok(Vec::new());
    };

    let rows = bucket_totals(predicate, plan.size(), connection)?;

    Ok(fill_series(plan, rows))
}

/// Left join the aggregated `rows` onto every key of `plan`.
///
/// Keys without a row get zero count and amount. Rows outside the plan are dropped.
pub(super) fn fill_series(plan: &BucketPlan, rows: Vec<BucketTotals>) -> Vec<BucketTotals> {
    let mut rows_by_key: HashMap<String, BucketTotals> = rows
        .into_iter()
        .map(|row| (row.date.clone(), row))
        .collect();

    plan.keys()
        .iter()
        .map(|key| {
            rows_by_key.remove(key).unwrap_or_else(|| BucketTotals {
                date: key.clone(),
                count: 0,
                amount: 0.0,
            })
        })
        .collect()
}

/// Combine two series filled from the same plan.
pub(super) fn daily_metrics(all: &[BucketTotals], sales: &[BucketTotals]) -> Vec<DailyMetric> {
    all.iter()
        .zip(sales)
        .map(|(all, sales)| DailyMetric {
            date: all.date.clone(),
            total_count: all.count,
            total_amount: all.amount,
            sales_count: sales.count,
            sales_amount: sales.amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        query::{BucketPlan, DateRange},
        report::BucketTotals,
    };

    use super::{daily_metrics, fill_series};

    fn bucket(date: &str, count: u64, amount: f64) -> BucketTotals {
        BucketTotals {
            date: date.to_owned(),
            count,
            amount,
        }
    }

    #[test]
    fn gaps_are_zero_filled() {
        let plan = BucketPlan::for_range(DateRange {
            start: date!(2024 - 01 - 01),
            end: date!(2024 - 01 - 03),
        });

        let series = fill_series(
            &plan,
            vec![bucket("2024-01-01", 1, 100.0), bucket("2024-01-03", 1, 50.0)],
        );

        assert_eq!(
            series,
            vec![
                bucket("2024-01-01", 1, 100.0),
                bucket("2024-01-02", 0, 0.0),
                bucket("2024-01-03", 1, 50.0),
            ]
        );
    }

    #[test]
    fn rows_outside_the_plan_are_dropped() {
        let plan = BucketPlan::for_range(DateRange {
            start: date!(2024 - 03 - 01),
            end: date!(2024 - 03 - 01),
        });

        let series = fill_series(&plan, vec![bucket("2024-02-29", 4, 10.0)]);

        assert_eq!(series, vec![bucket("2024-03-01", 0, 0.0)]);
    }

    #[test]
    fn long_ranges_fill_months() {
        let plan = BucketPlan::for_range(DateRange {
            start: date!(2023 - 01 - 15),
            end: date!(2024 - 01 - 15),
        });

        let series = fill_series(&plan, vec![bucket("2023-06", 2, 30.0)]);

        assert_eq!(series.len(), 13);
        assert_eq!(series[0], bucket("2023-01", 0, 0.0));
        assert_eq!(series[5], bucket("2023-06", 2, 30.0));
        assert_eq!(series[12], bucket("2024-01", 0, 0.0));
    }

    #[test]
    fn metrics_pair_all_and_sales_buckets() {
        let metrics = daily_metrics(
            &[bucket("2024-01-01", 3, 120.0), bucket("2024-01-02", 0, 0.0)],
            &[bucket("2024-01-01", 1, 100.0), bucket("2024-01-02", 0, 0.0)],
        );

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].total_count, 3);
        assert_eq!(metrics[0].sales_amount, 100.0);
        assert_eq!(metrics[1].sales_count, 0);
    }
}
