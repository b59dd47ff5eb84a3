//! Report HTTP handlers.
//!
//! Every handler parses the query string with the shared query builder, so the same filter
//! keys work on every report.

use axum::{
    Json,
    extract::{RawQuery, State},
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::MutexGuard;

use crate::{
    Error,
    query::{DateFilter, DateInfo, ResolvedQuery, params_from_query, resolve_query},
    report::{
        BucketTotals, ReportState, Totals,
        products::{ChartData, TopProducts},
        series::{DailyMetric, daily_metrics, plan_series, query_series},
    },
    transaction::{
        TransactionRecord,
        store::{find_page, product_totals, sum_matching},
    },
};

/// A page of transactions with totals over the whole matching set.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    success: bool,
    total_count: u64,
    total_sell_count: u64,
    total_amount: f64,
    total_sales_amount: f64,
    current_page: u64,
    total_pages: u64,
    transactions: Vec<TransactionRecord>,
    /// The zero-filled series, only present when the request filtered by date.
    daily_sales: Option<Vec<BucketTotals>>,
}

/// Totals of all records and of sales.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SalesSummary {
    total_count: u64,
    total_amount: f64,
    total_sell_count: u64,
    total_sales_amount: f64,
}

/// The sales summary and the daily sales series.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    success: bool,
    date_info: DateInfo,
    summary: SalesSummary,
    daily_stats: Vec<BucketTotals>,
}

/// All-records and sales totals per bucket.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStats {
    success: bool,
    date_info: DateInfo,
    daily_metrics: Vec<DailyMetric>,
}

/// Every report over the same predicate in one response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesFacets {
    success: bool,
    date_info: DateInfo,
    totals: Totals,
    sales: Totals,
    series: Vec<BucketTotals>,
    top_products: TopProducts,
}

/// The product breakdown shaped for charts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProductsReport {
    success: bool,
    date_info: DateInfo,
    chart_data: ChartData,
}

/// List a page of transactions matching the query string, with totals and, when the request
/// filters by date, the series of the whole matching set.
pub async fn get_filtered_transactions(
    State(state): State<ReportState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<FilterResponse>, Error> {
    let resolved = resolve_request(raw_query.as_deref(), &state)?;
    let connection = lock_connection(&state)?;

    let transactions = find_page(
        &resolved.predicate,
        &resolved.sort,
        resolved.page,
        &connection,
    )?;
    let totals = sum_matching(&resolved.predicate, &connection)?;
    let sales = sum_matching(&resolved.predicate.sales(), &connection)?;

    let daily_sales = match resolved.date_filter {
        DateFilter::Unbounded => None,
        _ => {
            let plan = plan_series(&resolved, &connection)?;
            Some(query_series(&resolved.predicate, plan.as_ref(), &connection)?)
        }
    };

    tracing::debug!(
        "filter matched {} transactions, returning page {}",
        totals.count,
        resolved.page.page
    );

    Ok(Json(FilterResponse {
        success: true,
        total_count: totals.count,
        total_sell_count: sales.count,
        total_amount: totals.amount,
        total_sales_amount: sales.amount,
        current_page: resolved.page.page,
        total_pages: resolved.page.total_pages(totals.count),
        transactions,
        daily_sales,
    }))
}

/// Summarise all records and sales, with the series of sales.
pub async fn get_sales_report(
    State(state): State<ReportState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<SalesReport>, Error> {
    let resolved = resolve_request(raw_query.as_deref(), &state)?;
    let connection = lock_connection(&state)?;

    let sales_predicate = resolved.predicate.sales();
    let totals = sum_matching(&resolved.predicate, &connection)?;
    let sales = sum_matching(&sales_predicate, &connection)?;
    let plan = plan_series(&resolved, &connection)?;
    let daily_stats = query_series(&sales_predicate, plan.as_ref(), &connection)?;

    Ok(Json(SalesReport {
        success: true,
        date_info: DateInfo::from_plan(plan.as_ref()),
        summary: SalesSummary {
            total_count: totals.count,
            total_amount: totals.amount,
            total_sell_count: sales.count,
            total_sales_amount: sales.amount,
        },
        daily_stats,
    }))
}

/// The per-bucket totals of all records and of sales.
pub async fn get_sales_stats(
    State(state): State<ReportState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<SalesStats>, Error> {
    let resolved = resolve_request(raw_query.as_deref(), &state)?;
    let connection = lock_connection(&state)?;

    let plan = plan_series(&resolved, &connection)?;
    let all = query_series(&resolved.predicate, plan.as_ref(), &connection)?;
    let sales = query_series(&resolved.predicate.sales(), plan.as_ref(), &connection)?;

    Ok(Json(SalesStats {
        success: true,
        date_info: DateInfo::from_plan(plan.as_ref()),
        daily_metrics: daily_metrics(&all, &sales),
    }))
}

/// Totals, sales, the series and the top products in one response.
pub async fn get_sales_facets(
    State(state): State<ReportState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<SalesFacets>, Error> {
    let resolved = resolve_request(raw_query.as_deref(), &state)?;
    let connection = lock_connection(&state)?;

    let totals = sum_matching(&resolved.predicate, &connection)?;
    let sales = sum_matching(&resolved.predicate.sales(), &connection)?;
    let plan = plan_series(&resolved, &connection)?;
    let series = query_series(&resolved.predicate, plan.as_ref(), &connection)?;
    let products = product_totals(&resolved.predicate, &connection)?;

    Ok(Json(SalesFacets {
        success: true,
        date_info: DateInfo::from_plan(plan.as_ref()),
        totals,
        sales,
        series,
        top_products: TopProducts::new(&products),
    }))
}

/// The top products by amount and count, for pie and bar charts and a ranked table.
pub async fn get_top_products(
    State(state): State<ReportState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<TopProductsReport>, Error> {
    let resolved = resolve_request(raw_query.as_deref(), &state)?;
    let connection = lock_connection(&state)?;

    let plan = plan_series(&resolved, &connection)?;
    let products = product_totals(&resolved.predicate, &connection)?;

    if products.is_empty() {
        tracing::debug!("no products matched the query");
    }

    Ok(Json(TopProductsReport {
        success: true,
        date_info: DateInfo::from_plan(plan.as_ref()),
        chart_data: ChartData::new(&products),
    }))
}

fn resolve_request(raw_query: Option<&str>, state: &ReportState) -> Result<ResolvedQuery, Error> {
    let params = params_from_query(raw_query)?;

    resolve_query(&params, &state.pagination_config)
}

fn lock_connection(state: &ReportState) -> Result<MutexGuard<'_, Connection>, Error> {
    state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::StoreUnavailable)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        PaginationConfig, endpoints,
        report::ReportState,
        test_utils::{get_test_connection, insert_documents},
    };

    use super::{
        get_filtered_transactions, get_sales_facets, get_sales_report, get_sales_stats,
        get_top_products,
    };

    fn get_test_state(documents: &[Value]) -> ReportState {
        let connection = get_test_connection();
        insert_documents(&connection, documents);

        ReportState {
            db_connection: Arc::new(Mutex::new(connection)),
            pagination_config: PaginationConfig::default(),
        }
    }

    fn example_documents() -> Vec<Value> {
        vec![
            json!({"tran_id": "T1", "status": "VALID", "currency_amount": 100, "ProductName": "Physics", "tran_date": "2024-01-01 10:00:00"}),
            json!({"tran_id": "T2", "status": "VALID", "currency_amount": 50, "ProductName": "Chemistry", "tran_date": "2024-01-03 12:30:00"}),
        ]
    }

    fn mixed_documents() -> Vec<Value> {
        vec![
            json!({"tran_id": "A1", "status": "VALID", "currency_amount": 400, "ProductName": "Biology", "tran_date": "2024-03-01 08:00:00", "Name": "Rahim"}),
            json!({"tran_id": "A2", "status": "FAILED", "currency_amount": 100, "ProductName": "Chemistry", "tran_date": "2024-03-01 09:00:00", "Name": "Karim"}),
            json!({"tran_id": "A3", "status": "VALID", "currency_amount": 300, "ProductName": "Physics", "tran_date": "2024-03-02 10:00:00", "Name": "Rahima"}),
            json!({"tran_id": "A4", "status": "VALIDATED", "currency_amount": 150, "ProductName": "Math", "tran_date": "2024-03-04 11:00:00", "Name": "Jamal"}),
            json!({"tran_id": "A5", "status": "VALID", "currency_amount": 50, "tran_date": "2024-03-04 12:00:00", "Name": "Rahim"}),
        ]
    }

    fn test_server(state: ReportState) -> TestServer {
        let app = Router::new()
            .route(endpoints::FILTER, get(get_filtered_transactions))
            .route(endpoints::SALES, get(get_sales_report))
            .route(endpoints::SALES_STATS, get(get_sales_stats))
            .route(endpoints::SALES_FACETS, get(get_sales_facets))
            .route(endpoints::TOP_PRODUCTS, get(get_top_products))
            .with_state(state);

        TestServer::new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn filter_returns_zero_filled_series_for_date_range() {
        let server = test_server(get_test_state(&example_documents()));

        let body = server
            .get(&format!(
                "{}?startDate=2024-01-01&endDate=2024-01-03",
                endpoints::FILTER
            ))
            .await
            .json::<Value>();

        assert_eq!(body["success"], json!(true));
        assert_eq!(body["totalCount"], json!(2));
        assert_eq!(body["totalAmount"], json!(150.0));
        assert_eq!(body["totalSellCount"], json!(2));
        assert_eq!(body["currentPage"], json!(1));
        assert_eq!(body["totalPages"], json!(1));
        assert_eq!(
            body["dailySales"],
            json!([
                {"date": "2024-01-01", "count": 1, "amount": 100.0},
                {"date": "2024-01-02", "count": 0, "amount": 0.0},
                {"date": "2024-01-03", "count": 1, "amount": 50.0},
            ])
        );
    }

    #[tokio::test]
    async fn filter_pages_newest_first_without_series() {
        let server = test_server(get_test_state(&mixed_documents()));

        let body = server
            .get(&format!("{}?page=2&limit=2", endpoints::FILTER))
            .await
            .json::<Value>();

        let ids: Vec<_> = body["transactions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|transaction| transaction["tran_id"].as_str().unwrap().to_owned())
            .collect();

        assert_eq!(ids, ["A3", "A2"]);
        assert_eq!(body["totalCount"], json!(5));
        assert_eq!(body["totalPages"], json!(3));
        assert_eq!(body["totalSellCount"], json!(3));
        assert_eq!(body["totalSalesAmount"], json!(750.0));
        assert_eq!(body["dailySales"], Value::Null);
    }

    #[tokio::test]
    async fn filter_applies_substring_and_status_filters() {
        let server = test_server(get_test_state(&mixed_documents()));

        let by_name = server
            .get(&format!("{}?Name=rahim", endpoints::FILTER))
            .await
            .json::<Value>();
        let validated = server
            .get(&format!("{}?isValidated=true", endpoints::FILTER))
            .await
            .json::<Value>();

        assert_eq!(by_name["totalCount"], json!(3));
        assert_eq!(validated["totalCount"], json!(4));
    }

    #[tokio::test]
    async fn filter_rejects_reversed_dates() {
        let server = test_server(get_test_state(&example_documents()));

        let response = server
            .get(&format!(
                "{}?startDate=2024-01-03&endDate=2024-01-01",
                endpoints::FILTER
            ))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["success"], json!(false));
    }

    #[tokio::test]
    async fn filter_rejects_unparseable_dates() {
        let server = test_server(get_test_state(&example_documents()));

        server
            .get(&format!("{}?startDate=yesterday", endpoints::FILTER))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn filter_on_unaddressable_key_matches_nothing() {
        let server = test_server(get_test_state(&example_documents()));

        let filtered = server.get(&format!("{}?x%5C=1", endpoints::FILTER)).await;
        let sorted = server
            .get(&format!("{}?sort=a%22b%5C", endpoints::FILTER))
            .await;

        filtered.assert_status_ok();
        assert_eq!(filtered.json::<Value>()["totalCount"], json!(0));
        sorted.assert_status_ok();
        assert_eq!(sorted.json::<Value>()["totalCount"], json!(2));
    }

    #[tokio::test]
    async fn filter_substring_match_folds_unicode_case() {
        let server = test_server(get_test_state(&[
            json!({"tran_id": "U1", "Name": "Émile", "tran_date": "2024-01-01 10:00:00"}),
            json!({"tran_id": "U2", "Name": "Emil", "tran_date": "2024-01-01 11:00:00"}),
        ]));

        let body = server
            .get(&format!("{}?Name=%C3%A9mile", endpoints::FILTER))
            .await
            .json::<Value>();

        assert_eq!(body["totalCount"], json!(1));
        assert_eq!(body["transactions"][0]["tran_id"], json!("U1"));
    }

    #[tokio::test]
    async fn filter_matches_numbers_stored_as_text() {
        let server = test_server(get_test_state(&[
            json!({"tran_id": "D1", "discount_percentage": "10"}),
            json!({"tran_id": "D2", "discount_percentage": 10}),
            json!({"tran_id": "D3", "discount_percentage": "15"}),
        ]));

        let body = server
            .get(&format!("{}?discount_percentage=10", endpoints::FILTER))
            .await
            .json::<Value>();

        assert_eq!(body["totalCount"], json!(2));
    }

    #[tokio::test]
    async fn sales_report_series_covers_sales_only() {
        let server = test_server(get_test_state(&mixed_documents()));

        let body = server
            .get(&format!(
                "{}?startDate=2024-03-01&endDate=2024-03-02",
                endpoints::SALES
            ))
            .await
            .json::<Value>();

        assert_eq!(
            body["dateInfo"],
            json!({"startDate": "2024-03-01", "endDate": "2024-03-02", "totalDays": 2, "bucket": "day"})
        );
        assert_eq!(
            body["summary"],
            json!({"totalCount": 3, "totalAmount": 800.0, "totalSellCount": 2, "totalSalesAmount": 700.0})
        );
        assert_eq!(
            body["dailyStats"],
            json!([
                {"date": "2024-03-01", "count": 1, "amount": 400.0},
                {"date": "2024-03-02", "count": 1, "amount": 300.0},
            ])
        );
    }

    #[tokio::test]
    async fn sales_stats_plan_spans_matching_records_without_dates() {
        let server = test_server(get_test_state(&mixed_documents()));

        let body = server.get(endpoints::SALES_STATS).await.json::<Value>();

        assert_eq!(body["dateInfo"]["startDate"], json!("2024-03-01"));
        assert_eq!(body["dateInfo"]["endDate"], json!("2024-03-04"));
        assert_eq!(
            body["dailyMetrics"][0],
            json!({"date": "2024-03-01", "totalCount": 2, "totalAmount": 500.0, "salesCount": 1, "salesAmount": 400.0})
        );
        assert_eq!(
            body["dailyMetrics"][2],
            json!({"date": "2024-03-03", "totalCount": 0, "totalAmount": 0.0, "salesCount": 0, "salesAmount": 0.0})
        );
        assert_eq!(body["dailyMetrics"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn sales_stats_plan_ignores_dates_that_are_not_days() {
        let mut documents = mixed_documents();
        documents.push(json!({"tran_id": "A6", "status": "VALID", "currency_amount": 5, "tran_date": "unknown"}));
        let server = test_server(get_test_state(&documents));

        let body = server.get(endpoints::SALES_STATS).await.json::<Value>();

        assert_eq!(body["dateInfo"]["startDate"], json!("2024-03-01"));
        assert_eq!(body["dateInfo"]["endDate"], json!("2024-03-04"));
        assert_eq!(body["dailyMetrics"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn empty_store_reports_zeros_and_no_plan() {
        let server = test_server(get_test_state(&[]));

        let body = server.get(endpoints::SALES_FACETS).await.json::<Value>();

        assert_eq!(body["totals"], json!({"count": 0, "amount": 0.0}));
        assert_eq!(body["sales"], json!({"count": 0, "amount": 0.0}));
        assert_eq!(body["series"], json!([]));
        assert_eq!(body["dateInfo"]["bucket"], Value::Null);
        assert_eq!(body["topProducts"]["byAmount"], json!([]));
    }

    #[tokio::test]
    async fn facets_combine_every_report() {
        let server = test_server(get_test_state(&mixed_documents()));

        let body = server.get(endpoints::SALES_FACETS).await.json::<Value>();

        assert_eq!(body["totals"], json!({"count": 5, "amount": 1000.0}));
        assert_eq!(body["sales"], json!({"count": 3, "amount": 750.0}));
        assert_eq!(body["series"].as_array().unwrap().len(), 4);
        assert_eq!(body["topProducts"]["byAmount"][0]["name"], json!("Biology"));
        assert_eq!(body["topProducts"]["byAmount"][3]["name"], json!("Other"));
        assert_eq!(body["topProducts"]["byAmount"][3]["amount"], json!(150.0));
    }

    #[tokio::test]
    async fn top_products_rows_sum_to_total() {
        let server = test_server(get_test_state(&mixed_documents()));

        let body = server.get(endpoints::TOP_PRODUCTS).await.json::<Value>();

        let chart_data = &body["chartData"];
        let pie_total: f64 = chart_data["pieChartAmount"]
            .as_array()
            .unwrap()
            .iter()
            .map(|slice| slice["value"].as_f64().unwrap())
            .sum();

        assert_eq!(pie_total, 1000.0);
        assert_eq!(chart_data["tableData"].as_array().unwrap().len(), 5);
        assert_eq!(chart_data["tableData"][4]["name"], json!("Unknown"));
        assert_eq!(
            chart_data["barChart"]["labels"],
            json!(["Biology", "Physics", "Math", "Other"])
        );
    }
}
