use axum::{
    Json, Router,
    extract::{Query, State},
    response::Response,
    routing::get,
};

use crate::{
    dto::reports::{
        DailySalesReport, InventoryExportQuery, InventoryReport, MonthlySalesQuery,
        PerformanceExportQuery, PerformanceQuery, PerformanceReport, PerformanceVariant,
        SalesRangeQuery, SalesReport, SalesSeries,
    },
    error::AppResult,
    export::attachment_response,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::report_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", get(sales))
        .route("/sales/daily", get(daily_sales))
        .route("/sales/monthly", get(monthly_sales))
        .route("/sales/yearly", get(yearly_sales))
        .route("/inventory", get(inventory))
        .route("/products", get(product_performance))
        .route("/export/sales", get(export_sales_csv))
        .route("/export/sales/sheet", get(export_sales_sheet))
        .route("/export/inventory", get(export_inventory_csv))
        .route("/export/products", get(export_performance_csv))
}

#[utoipa::path(
    get,
    path = "/api/reports/sales",
    params(
        ("start_date" = Option<String>, Query, description = "Inclusive start date (YYYY-MM-DD)"),
        ("end_date" = Option<String>, Query, description = "Inclusive end date (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Completed-order revenue over the range", body = ApiResponse<SalesReport>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn sales(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SalesRangeQuery>,
) -> AppResult<Json<ApiResponse<SalesReport>>> {
    let resp = report_service::sales_report(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/reports/sales/daily", security(("bearer_auth" = [])), tag = "Reports")]
pub async fn daily_sales(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<DailySalesReport>>> {
    let resp = report_service::daily_sales(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reports/sales/monthly",
    params(("year" = Option<i32>, Query, description = "Calendar year, defaults to current")),
    responses((status = 200, body = ApiResponse<SalesSeries>)),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn monthly_sales(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<MonthlySalesQuery>,
) -> AppResult<Json<ApiResponse<SalesSeries>>> {
    let resp = report_service::monthly_sales(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/reports/sales/yearly", security(("bearer_auth" = [])), tag = "Reports")]
pub async fn yearly_sales(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<SalesSeries>>> {
    let resp = report_service::yearly_sales(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/reports/inventory", security(("bearer_auth" = [])), tag = "Reports")]
pub async fn inventory(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<InventoryReport>>> {
    let resp = report_service::inventory_report(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reports/products",
    params(("variant" = Option<String>, Query, description = "performance | top | low")),
    responses((status = 200, body = ApiResponse<PerformanceReport>)),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn product_performance(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PerformanceQuery>,
) -> AppResult<Json<ApiResponse<PerformanceReport>>> {
    let variant = query.variant.unwrap_or(PerformanceVariant::Performance);
    let resp = report_service::product_performance(&state, variant).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/reports/export/sales", security(("bearer_auth" = [])), tag = "Reports")]
pub async fn export_sales_csv(State(state): State<AppState>, _user: AuthUser) -> AppResult<Response> {
    let (filename, bytes) = report_service::export_sales_csv(&state).await?;
    Ok(attachment_response(&filename, "text/csv", bytes))
}

#[utoipa::path(get, path = "/api/reports/export/sales/sheet", security(("bearer_auth" = [])), tag = "Reports")]
pub async fn export_sales_sheet(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Response> {
    let (filename, bytes) = report_service::export_sales_sheet(&state).await?;
    let content_type = state.documents.content_type();
    Ok(attachment_response(&filename, content_type, bytes))
}

#[utoipa::path(
    get,
    path = "/api/reports/export/inventory",
    params(("type" = Option<String>, Query, description = "low_stock | out_of_stock")),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn export_inventory_csv(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<InventoryExportQuery>,
) -> AppResult<Response> {
    let kind = query
        .kind
        .unwrap_or(crate::dto::reports::InventoryExportKind::LowStock);
    let (filename, bytes) = report_service::export_inventory_csv(&state, kind).await?;
    Ok(attachment_response(&filename, "text/csv", bytes))
}

#[utoipa::path(
    get,
    path = "/api/reports/export/products",
    params(("type" = Option<String>, Query, description = "performance | top | low")),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn export_performance_csv(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PerformanceExportQuery>,
) -> AppResult<Response> {
    let variant = query.variant.unwrap_or(PerformanceVariant::Performance);
    let (filename, bytes) = report_service::export_performance_csv(&state, variant).await?;
    Ok(attachment_response(&filename, "text/csv", bytes))
}
