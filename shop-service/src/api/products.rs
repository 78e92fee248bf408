use axum::{extract::State, http::StatusCode, response::IntoResponse};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::catalog::{discount_percent, is_valid_slug, slugify};
use shared::{money, PageRequest, Paginated, Product, ProductSort, Variant};
use tracing::info;
use uuid::Uuid;

use super::extract::{AdminUser, ApiJson, ApiPath, ApiQuery};
use super::{ok, ok_with};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::ProductFilter;

const DEFAULT_LIMIT: i64 = 12;
const MAX_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<ProductSort>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub images: Vec<String>,
    #[serde(with = "money")]
    pub price: BigDecimal,
    #[serde(with = "money::option", default)]
    pub compare_at_price: Option<BigDecimal>,
    pub category: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub variants: Vec<Variant>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    #[serde(with = "money::option", default)]
    pub price: Option<BigDecimal>,
    #[serde(with = "money::option", default)]
    pub compare_at_price: Option<BigDecimal>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub variants: Option<Vec<Variant>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub product: Product,
}

/// Field rules shared by create and update, applied to the resulting product.
fn validate(product: &Product) -> Result<(), AppError> {
    let title_len = product.title.chars().count();
    if !(2..=100).contains(&title_len) {
        return Err(AppError::bad_request("Title must be between 2 and 100 characters"));
    }
    if !is_valid_slug(&product.slug) {
        return Err(AppError::bad_request(
            "Slug can only contain lowercase letters, numbers, and hyphens",
        ));
    }
    let description_len = product.description.chars().count();
    if !(10..=2000).contains(&description_len) {
        return Err(AppError::bad_request(
            "Description must be between 10 and 2000 characters",
        ));
    }
    if product.images.is_empty() || product.images.iter().any(|url| url.trim().is_empty()) {
        return Err(AppError::bad_request("At least one image is required"));
    }
    if product.price < BigDecimal::from(0) {
        return Err(AppError::bad_request("Price must be a positive number"));
    }
    if !money::is_storable(&product.price) {
        return Err(AppError::bad_request(
            "Price must have at most two decimal places and be below 10000000000",
        ));
    }
    if let Some(compare_at) = &product.compare_at_price {
        if !money::is_storable(compare_at) {
            return Err(AppError::bad_request(
                "Compare at price must have at most two decimal places and be below 10000000000",
            ));
        }
        if compare_at <= &product.price {
            return Err(AppError::bad_request(
                "Compare at price must be greater than regular price",
            ));
        }
    }
    if product.category.is_empty() {
        return Err(AppError::bad_request("Category is required"));
    }
    if product.stock < 0 {
        return Err(AppError::bad_request("Stock must be a non-negative integer"));
    }
    Ok(())
}

fn refresh_discount(product: &mut Product) {
    product.discount_percent = product
        .compare_at_price
        .as_ref()
        .and_then(|compare_at| discount_percent(&product.price, compare_at));
}

pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let filter = ProductFilter {
        active_only: true,
        category: query.category.filter(|c| !c.trim().is_empty()),
        search: query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        sort: query.sort.unwrap_or_default(),
        page,
    };

    let (items, total) = state.store().list_products(&filter).await?;
    Ok(ok(Paginated::new(items, page, total)))
}

pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .store()
        .find_product_by_slug(&slug)
        .await?
        .filter(|product| product.is_active)
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(ok(ProductResponse { product }))
}

pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let title = request.title.trim().to_string();
    let slug = match request.slug {
        Some(slug) => slug.trim().to_string(),
        None => slugify(&title),
    };
    let now = Utc::now();

    let mut product = Product {
        id: Uuid::new_v4(),
        title,
        slug,
        description: request.description.trim().to_string(),
        images: request.images,
        price: request.price,
        compare_at_price: request.compare_at_price,
        discount_percent: None,
        category: request.category.trim().to_string(),
        stock: request.stock,
        variants: request.variants,
        is_active: request.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    validate(&product)?;
    refresh_discount(&mut product);

    state.store().insert_product(&product).await?;
    info!(product_id = %product.id, slug = %product.slug, admin = %admin.email, "Product created");

    Ok((
        StatusCode::CREATED,
        ok_with("Product created successfully", ProductResponse { product }),
    ))
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid product id"))
}

pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    let mut product = state
        .store()
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    let reprice = request.price.is_some() || request.compare_at_price.is_some();
    if let Some(title) = request.title {
        product.title = title.trim().to_string();
    }
    if let Some(slug) = request.slug {
        product.slug = slug.trim().to_string();
    }
    if let Some(description) = request.description {
        product.description = description.trim().to_string();
    }
    if let Some(images) = request.images {
        product.images = images;
    }
    if let Some(price) = request.price {
        product.price = price;
    }
    if let Some(compare_at) = request.compare_at_price {
        product.compare_at_price = Some(compare_at);
    }
    if let Some(category) = request.category {
        product.category = category.trim().to_string();
    }
    if let Some(variants) = request.variants {
        product.variants = variants;
    }
    if let Some(is_active) = request.is_active {
        product.is_active = is_active;
    }

    if let Some(stock) = request.stock {
        if stock < 0 {
            return Err(AppError::bad_request("Stock must be a non-negative integer"));
        }
    }

    validate(&product)?;
    if reprice {
        refresh_discount(&mut product);
    }
    product.updated_at = Utc::now();

    let product = state
        .store()
        .update_product(&product, request.stock)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;
    info!(product_id = %product.id, admin = %admin.email, "Product updated");

    Ok(ok_with("Product updated successfully", ProductResponse { product }))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id)?;
    if !state.store().delete_product(id).await? {
        return Err(AppError::not_found("Product not found"));
    }
    info!(product_id = %id, admin = %admin.email, "Product deleted");

    Ok(ok_with("Product deleted successfully", serde_json::Value::Null))
}
