use anyhow::{anyhow, Context};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::{
    CartLine, Order, OrderItem, OrderStatus, Product, Provider, Role, ShippingAddress,
    VariantSelection,
};
use uuid::Uuid;

use crate::store::User;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub provider: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub images: Vec<String>,
    pub price: BigDecimal,
    pub compare_at_price: Option<BigDecimal>,
    pub discount_percent: Option<i32>,
    pub category: String,
    pub stock: i32,
    pub variants: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every editable product column except `stock`, which only moves through
/// explicit stock writes.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::products)]
#[diesel(treat_none_as_null = true)]
pub struct ProductChanges {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub images: Vec<String>,
    pub price: BigDecimal,
    pub compare_at_price: Option<BigDecimal>,
    pub discount_percent: Option<i32>,
    pub category: String,
    pub variants: serde_json::Value,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub price_snapshot: BigDecimal,
    pub variant: serde_json::Value,
    pub qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub subtotal: BigDecimal,
    pub discount_total: BigDecimal,
    pub grand_total: BigDecimal,
    pub status: String,
    pub shipping_address: Option<serde_json::Value>,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub position: i32,
    pub product_id: Uuid,
    pub title: String,
    pub price_at_purchase: BigDecimal,
    pub qty: i32,
    pub variant: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::checkout_requests)]
pub struct CheckoutRequestRow {
    pub user_id: Uuid,
    pub idempotency_key: String,
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role.as_str().to_string(),
            provider: user.provider.as_str().to_string(),
            avatar: user.avatar.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| anyhow!("unknown role {}", row.role))?;
        let provider = Provider::parse(&row.provider)
            .ok_or_else(|| anyhow!("unknown provider {}", row.provider))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            provider,
            avatar: row.avatar,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<&Product> for ProductRow {
    type Error = anyhow::Error;

    fn try_from(product: &Product) -> Result<Self, Self::Error> {
        Ok(Self {
            id: product.id,
            title: product.title.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            images: product.images.clone(),
            price: product.price.clone(),
            compare_at_price: product.compare_at_price.clone(),
            discount_percent: product.discount_percent,
            category: product.category.clone(),
            stock: product.stock,
            variants: serde_json::to_value(&product.variants)?,
            is_active: product.is_active,
            created_at: product.created_at,
            updated_at: product.updated_at,
        })
    }
}

impl TryFrom<&Product> for ProductChanges {
    type Error = anyhow::Error;

    fn try_from(product: &Product) -> Result<Self, Self::Error> {
        Ok(Self {
            title: product.title.clone(),
            slug: product.slug.clone(),
            description: product.description.clone(),
            images: product.images.clone(),
            price: product.price.clone(),
            compare_at_price: product.compare_at_price.clone(),
            discount_percent: product.discount_percent,
            category: product.category.clone(),
            variants: serde_json::to_value(&product.variants)?,
            is_active: product.is_active,
            updated_at: product.updated_at,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = anyhow::Error;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let variants = serde_json::from_value(row.variants)
            .with_context(|| format!("bad variants on product {}", row.id))?;

        Ok(Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            description: row.description,
            images: row.images,
            price: row.price,
            compare_at_price: row.compare_at_price,
            discount_percent: row.discount_percent,
            category: row.category,
            stock: row.stock,
            variants,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<&CartLine> for CartItemRow {
    type Error = anyhow::Error;

    fn try_from(line: &CartLine) -> Result<Self, Self::Error> {
        Ok(Self {
            id: line.id,
            user_id: line.user_id,
            product_id: line.product_id,
            title: line.title.clone(),
            price_snapshot: line.price_snapshot.clone(),
            variant: serde_json::to_value(&line.variant)?,
            qty: line.qty,
            created_at: line.created_at,
            updated_at: line.updated_at,
        })
    }
}

impl TryFrom<CartItemRow> for CartLine {
    type Error = anyhow::Error;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            title: row.title,
            price_snapshot: row.price_snapshot,
            variant: variant_from_json(row.variant)?,
            qty: row.qty,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<&Order> for OrderRow {
    type Error = anyhow::Error;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        let shipping_address = order
            .shipping_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        Ok(Self {
            id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            subtotal: order.subtotal.clone(),
            discount_total: order.discount_total.clone(),
            grand_total: order.grand_total.clone(),
            status: order.status.as_str().to_string(),
            shipping_address,
            payment_ref: order.payment_ref.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }
}

pub fn order_item_rows(order: &Order) -> anyhow::Result<Vec<OrderItemRow>> {
    order
        .items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            Ok(OrderItemRow {
                id: Uuid::new_v4(),
                order_id: order.id,
                position: i32::try_from(position)?,
                product_id: item.product_id,
                title: item.title.clone(),
                price_at_purchase: item.price_at_purchase.clone(),
                qty: item.qty,
                variant: serde_json::to_value(&item.variant)?,
            })
        })
        .collect()
}

/// Reassembles an order from its row and its item rows (already sorted by position).
pub fn into_order(row: OrderRow, items: Vec<OrderItemRow>) -> anyhow::Result<Order> {
    let status: OrderStatus = row.status.parse()?;
    let shipping_address: Option<ShippingAddress> = row
        .shipping_address
        .map(serde_json::from_value)
        .transpose()
        .with_context(|| format!("bad shipping address on order {}", row.order_number))?;

    let items = items
        .into_iter()
        .map(|item| {
            Ok(OrderItem {
                product_id: item.product_id,
                title: item.title,
                price_at_purchase: item.price_at_purchase,
                qty: item.qty,
                variant: variant_from_json(item.variant)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Order {
        id: row.id,
        order_number: row.order_number,
        user_id: row.user_id,
        items,
        subtotal: row.subtotal,
        discount_total: row.discount_total,
        grand_total: row.grand_total,
        status,
        shipping_address,
        payment_ref: row.payment_ref,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn variant_from_json(value: serde_json::Value) -> anyhow::Result<VariantSelection> {
    if value.is_null() {
        return Ok(VariantSelection::new());
    }
    Ok(serde_json::from_value(value)?)
}
