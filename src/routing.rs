//! Application router configuration.

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    auth::post_auth,
    endpoints,
    export::export_csv,
    not_found::get_404_not_found,
    register_user::create_user_endpoint,
    report::{
        get_filtered_transactions, get_sales_facets, get_sales_report, get_sales_stats,
        get_top_products,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route(endpoints::AUTH, post(post_auth))
        .route(endpoints::CREATE_USER, post(create_user_endpoint));

    let report_routes = Router::new()
        .route(endpoints::FILTER, get(get_filtered_transactions))
        .route(endpoints::SALES, get(get_sales_report))
        .route(endpoints::SALES_STATS, get(get_sales_stats))
        .route(endpoints::SALES_FACETS, get(get_sales_facets))
        .route(endpoints::TOP_PRODUCTS, get(get_top_products))
        .route(endpoints::EXPORT_CSV, get(export_csv));

    user_routes
        .merge(report_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}
