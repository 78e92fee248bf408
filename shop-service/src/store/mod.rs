pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    CartLine, Order, OrderStatus, PageRequest, Product, ProductSort, Provider, Role, UserProfile,
};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field (`"email"`, `"slug"`) collided with an existing record.
    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("order number already taken")]
    OrderNumberTaken,

    #[error("idempotency key already used")]
    IdempotencyKeyUsed,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A user account as persisted, including the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub provider: Provider,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn local(name: String, email: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash: Some(password_hash),
            role,
            provider: Provider::Local,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub active_only: bool,
    pub category: Option<String>,
    /// Case-insensitive substring over title, description and category.
    pub search: Option<String>,
    pub sort: ProductSort,
    pub page: PageRequest,
}

#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub page: PageRequest,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with `Duplicate("email")` when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Fails with `Duplicate("slug")` when the slug is taken.
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    /// Overwrites every field of an existing product except stock, which is
    /// only written when `stock` is given. Returns the stored product, or
    /// `None` if it is gone.
    async fn update_product(
        &self,
        product: &Product,
        stock: Option<i32>,
    ) -> StoreResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>>;
    /// One page of matching products plus the total match count.
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<(Vec<Product>, i64)>;

    /// Atomically decrements stock by `qty` if the product is active and has
    /// at least `qty` left. Returns whether the decrement happened.
    async fn take_stock(&self, product_id: Uuid, qty: i32) -> StoreResult<bool>;
    /// Gives back stock taken by [`Store::take_stock`].
    async fn restore_stock(&self, product_id: Uuid, qty: i32) -> StoreResult<()>;

    /// The user's cart lines, oldest first.
    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<CartLine>>;
    /// Inserts the line, or updates quantity and timestamp if its id exists.
    async fn upsert_cart_line(&self, line: &CartLine) -> StoreResult<()>;
    async fn remove_cart_line(&self, user_id: Uuid, line_id: Uuid) -> StoreResult<bool>;
    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()>;

    /// Writes the order with its lines, and the idempotency record when a key
    /// is given, as one unit.
    async fn insert_order(&self, order: &Order, idempotency_key: Option<&str>) -> StoreResult<()>;
    async fn find_order_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Order>>;
    /// One page of matching orders, newest first, plus the total match count.
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<(Vec<Order>, i64)>;
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>>;
}
