use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use shared::{Order, OrderStatus, PageRequest, Paginated};
use tracing::info;
use uuid::Uuid;

use super::extract::{AdminUser, ApiJson, ApiPath, ApiQuery, AuthUser};
use super::{ok, ok_with};
use crate::checkout::{Checkout, CheckoutRequest};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::OrderFilter;

const IDEMPOTENCY_HEADER: &str = "idempotency-key";
const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

#[derive(Debug, Deserialize)]
pub struct MyOrdersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AllOrdersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| AppError::bad_request("Invalid Idempotency-Key header"))?
        .trim();

    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::bad_request("Invalid Idempotency-Key header"));
    }
    Ok(Some(key.to_string()))
}

/// The checkout body is optional; an empty body means no shipping details.
fn checkout_request(body: &[u8]) -> Result<CheckoutRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CheckoutRequest::default());
    }
    let request: CheckoutRequest = serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("Invalid request body: {err}")))?;

    if let Some(address) = &request.shipping_address {
        address.validate().map_err(AppError::BadRequest)?;
    }
    Ok(request)
}

pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let key = idempotency_key(&headers)?;
    let request = checkout_request(&body)?;

    let placed = Checkout::new(state.store())
        .place_order(user.id, request, key.as_deref())
        .await?;

    let message = if placed.replayed {
        "Order already placed"
    } else {
        "Order created successfully"
    };
    Ok((
        StatusCode::CREATED,
        ok_with(message, OrderResponse { order: placed.order }),
    ))
}

pub async fn my_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<MyOrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(query.page, query.limit, 10, 50);
    let filter = OrderFilter {
        user_id: Some(user.id),
        status: None,
        page,
    };

    let (items, total) = state.store().list_orders(&filter).await?;
    Ok(ok(Paginated::new(items, page, total)))
}

pub async fn all_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<AllOrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(query.page, query.limit, 20, 100);
    let filter = OrderFilter {
        user_id: None,
        status: query.status,
        page,
    };

    let (items, total) = state.store().list_orders(&filter).await?;
    Ok(ok(Paginated::new(items, page, total)))
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status: OrderStatus = request
        .status
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid status: {}", request.status)))?;

    let order = state
        .store()
        .set_order_status(id, status)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    info!(
        order_number = %order.order_number,
        status = %status,
        admin = %admin.email,
        "Order status updated"
    );
    Ok(ok_with("Order status updated successfully", OrderResponse { order }))
}
