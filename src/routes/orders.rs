use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{AddItemRequest, CreateOrderRequest, OrderList, OrderWithItems},
    error::AppResult,
    export::attachment_response,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/items", post(add_item))
        .route("/{id}/items/{item_id}", delete(remove_item))
        .route("/{id}/complete", post(complete_order))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/invoice", get(invoice))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Create a pending order", body = ApiResponse<Order>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::create_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
    ),
    responses(
        (status = 200, description = "List orders", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/orders/{id}", security(("bearer_auth" = [])), tag = "Orders")]
pub async fn get_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Item added, stock decremented", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Quantity exceeds stock or order not pending"),
        (status = 404, description = "Order or product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::add_item(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}/items/{item_id}",
    responses(
        (status = 200, description = "Item removed, stock restored", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Item does not belong to the order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::remove_item(&state, &user, id, item_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(post, path = "/api/orders/{id}/complete", security(("bearer_auth" = [])), tag = "Orders")]
pub async fn complete_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::complete_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(post, path = "/api/orders/{id}/cancel", security(("bearer_auth" = [])), tag = "Orders")]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = order_service::cancel_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/orders/{id}/invoice", security(("bearer_auth" = [])), tag = "Orders")]
pub async fn invoice(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let (filename, bytes) = order_service::invoice(&state, id).await?;
    let content_type = state.documents.content_type();
    Ok(attachment_response(&filename, content_type, bytes))
}
