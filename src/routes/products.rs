use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::products::{BarcodeLookup, CreateProductRequest, ProductList, UpdateProductRequest},
    error::AppResult,
    export::attachment_response,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::ProductQuery,
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/export", get(export_catalog))
        .route("/barcode/{code}", get(lookup_by_barcode))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/barcode", post(regenerate_barcode))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search in name and barcode"),
        ("category_id" = Option<Uuid>, Query, description = "Filter by category"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Barcode already in use"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::create_product(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/products/{id}", security(("bearer_auth" = [])), tag = "Products")]
pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(put, path = "/api/products/{id}", request_body = UpdateProductRequest, security(("bearer_auth" = [])), tag = "Products")]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(delete, path = "/api/products/{id}", security(("bearer_auth" = [])), tag = "Products")]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = catalog_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/barcode/{code}",
    responses(
        (status = 200, description = "Product matching the scanned barcode", body = ApiResponse<BarcodeLookup>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn lookup_by_barcode(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(code): Path<String>,
) -> AppResult<Json<ApiResponse<BarcodeLookup>>> {
    let resp = catalog_service::lookup_by_barcode(&state, &code).await?;
    Ok(Json(resp))
}

#[utoipa::path(post, path = "/api/products/{id}/barcode", security(("bearer_auth" = [])), tag = "Products")]
pub async fn regenerate_barcode(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::regenerate_barcode_image(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/products/export", security(("bearer_auth" = [])), tag = "Products")]
pub async fn export_catalog(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Response> {
    let (filename, bytes) = catalog_service::export_catalog(&state).await?;
    Ok(attachment_response(&filename, "text/csv", bytes))
}
