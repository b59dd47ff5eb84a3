//! Product rankings with an "Other" rollup, shaped for charts and tables.

use std::cmp::Ordering;

use serde::Serialize;

use crate::report::{OTHER_PRODUCTS_LABEL, ProductTotals, TOP_PRODUCT_COUNT, round_to_cents};

/// What to rank products by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Ranking {
    Amount,
    Count,
}

impl Ranking {
    fn compare(&self, a: &ProductTotals, b: &ProductTotals) -> Ordering {
        let by_value = match self {
            Ranking::Amount => b.amount.total_cmp(&a.amount),
            Ranking::Count => b.count.cmp(&a.count),
        };

        by_value.then_with(|| a.name.cmp(&b.name))
    }
}

/// One ranked row and its share of the overall total for the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(super) struct ProductShare {
    pub name: String,
    pub amount: f64,
    pub count: u64,
    pub percentage: f64,
}

/// The top products by amount and by count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TopProducts {
    pub by_amount: Vec<ProductShare>,
    pub by_count: Vec<ProductShare>,
}

impl TopProducts {
    pub fn new(products: &[ProductTotals]) -> Self {
        Self {
            by_amount: top_with_other(products, Ranking::Amount),
            by_count: top_with_other(products, Ranking::Count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(super) struct PieSlice<T> {
    pub name: String,
    pub value: T,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(super) struct BarChart {
    pub labels: Vec<String>,
    pub amounts: Vec<f64>,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TableRow {
    pub rank: usize,
    pub name: String,
    pub amount: f64,
    pub count: u64,
    pub amount_percentage: f64,
    pub count_percentage: f64,
}

/// The chart and table data of the top-products report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ChartData {
    pub pie_chart_amount: Vec<PieSlice<f64>>,
    pub pie_chart_count: Vec<PieSlice<u64>>,
    pub bar_chart: BarChart,
    /// Every product ranked by amount, without a rollup.
    pub table_data: Vec<TableRow>,
}

impl ChartData {
    pub fn new(products: &[ProductTotals]) -> Self {
        let top = TopProducts::new(products);
        let (total_count, total_amount) = grand_totals(products);

        let pie_chart_amount = top
            .by_amount
            .iter()
            .map(|share| PieSlice {
                name: share.name.clone(),
                value: share.amount,
                percentage: share.percentage,
            })
            .collect();

        let pie_chart_count = top
            .by_count
            .iter()
            .map(|share| PieSlice {
                name: share.name.clone(),
                value: share.count,
                percentage: share.percentage,
            })
            .collect();

        let bar_chart = BarChart {
            labels: top.by_amount.iter().map(|share| share.name.clone()).collect(),
            amounts: top.by_amount.iter().map(|share| share.amount).collect(),
            counts: top.by_amount.iter().map(|share| share.count).collect(),
        };

        let table_data = rank(products, Ranking::Amount)
            .into_iter()
            .enumerate()
            .map(|(index, product)| TableRow {
                rank: index + 1,
                amount_percentage: percentage_of(product.amount, total_amount),
                count_percentage: percentage_of(product.count as f64, total_count as f64),
                name: product.name,
                amount: product.amount,
                count: product.count,
            })
            .collect();

        Self {
            pie_chart_amount,
            pie_chart_count,
            bar_chart,
            table_data,
        }
    }
}

/// Sort a copy of `products` by `ranking`, ties broken by name.
pub(super) fn rank(products: &[ProductTotals], ranking: Ranking) -> Vec<ProductTotals> {
    let mut ranked = products.to_vec();
    ranked.sort_by(|a, b| ranking.compare(a, b));
    ranked
}

/// Keep the top ranked products and collapse the rest into one [OTHER_PRODUCTS_LABEL] row.
///
/// The "Other" row is only added when at least one product was left out. Percentages are
/// shares of the total over every product, so all rows add up to 100 (give or take rounding).
pub(super) fn top_with_other(products: &[ProductTotals], ranking: Ranking) -> Vec<ProductShare> {
    let (total_count, total_amount) = grand_totals(products);
    let ranked = rank(products, ranking);

    let share = |product: &ProductTotals| {
        let percentage = match ranking {
            Ranking::Amount => percentage_of(product.amount, total_amount),
            Ranking::Count => percentage_of(product.count as f64, total_count as f64),
        };

        ProductShare {
            name: product.name.clone(),
            amount: product.amount,
            count: product.count,
            percentage,
        }
    };

    let mut shares: Vec<ProductShare> = ranked.iter().take(TOP_PRODUCT_COUNT).map(share).collect();

    let rest = &ranked[shares.len()..];
    if !rest.is_empty() {
        let (rest_count, rest_amount) = grand_totals(rest);
        shares.push(share(&ProductTotals {
            name: OTHER_PRODUCTS_LABEL.to_owned(),
            count: rest_count,
            amount: rest_amount,
        }));
    }

    shares
}

fn grand_totals(products: &[ProductTotals]) -> (u64, f64) {
    products.iter().fold((0, 0.0), |(count, amount), product| {
        (count + product.count, amount + product.amount)
    })
}

fn percentage_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        round_to_cents(part / whole * 100.0)
    }
}
