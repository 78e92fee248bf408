use axum::{extract::State, response::IntoResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{CartLine, CartSummary, VariantSelection};
use tracing::info;
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, AuthUser};
use super::{ok, ok_with};
use crate::error::AppError;
use crate::state::AppState;

fn default_qty() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_qty")]
    pub qty: i32,
    #[serde(default)]
    pub variant: VariantSelection,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub qty: i32,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: CartSummary,
}

async fn current_cart(state: &AppState, user_id: Uuid) -> Result<CartResponse, AppError> {
    let lines = state.store().cart_lines(user_id).await?;
    Ok(CartResponse {
        cart: CartSummary::from_lines(lines),
    })
}

pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(current_cart(&state, user.id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(request): ApiJson<AddItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.qty < 1 {
        return Err(AppError::bad_request("Quantity must be at least 1"));
    }

    let product = state
        .store()
        .find_product(request.product_id)
        .await?
        .filter(|product| product.is_active)
        .ok_or_else(|| AppError::not_found("Product not found or inactive"))?;

    let lines = state.store().cart_lines(user.id).await?;
    let now = Utc::now();
    let line = match lines
        .into_iter()
        .find(|line| line.matches(product.id, &request.variant))
    {
        Some(mut existing) => {
            existing.qty = existing
                .qty
                .checked_add(request.qty)
                .ok_or_else(|| AppError::bad_request("Insufficient stock for requested quantity"))?;
            existing.updated_at = now;
            existing
        }
        None => CartLine {
            id: Uuid::new_v4(),
            user_id: user.id,
            product_id: product.id,
            title: product.title.clone(),
            price_snapshot: product.price.clone(),
            variant: request.variant,
            qty: request.qty,
            created_at: now,
            updated_at: now,
        },
    };

    if product.stock < line.qty {
        return Err(AppError::bad_request("Insufficient stock for requested quantity"));
    }
    state.store().upsert_cart_line(&line).await?;
    info!(user_id = %user.id, product_id = %product.id, qty = line.qty, "Item added to cart");

    Ok(ok_with("Item added to cart", current_cart(&state, user.id).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(line_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.qty < 0 {
        return Err(AppError::bad_request("Quantity cannot be negative"));
    }

    let mut line = state
        .store()
        .cart_lines(user.id)
        .await?
        .into_iter()
        .find(|line| line.id == line_id)
        .ok_or_else(|| AppError::not_found("Cart item not found"))?;

    if request.qty == 0 {
        state.store().remove_cart_line(user.id, line_id).await?;
        return Ok(ok_with("Item removed from cart", current_cart(&state, user.id).await?));
    }

    match state.store().find_product(line.product_id).await? {
        Some(product) if product.stock >= request.qty => {}
        _ => return Err(AppError::bad_request("Insufficient stock")),
    }

    line.qty = request.qty;
    line.updated_at = Utc::now();
    state.store().upsert_cart_line(&line).await?;

    Ok(ok_with("Cart item updated", current_cart(&state, user.id).await?))
}

pub async fn remove_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(line_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store().remove_cart_line(user.id, line_id).await? {
        return Err(AppError::not_found("Cart item not found"));
    }
    Ok(ok_with("Item removed from cart", current_cart(&state, user.id).await?))
}
