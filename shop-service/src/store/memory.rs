use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use shared::{CartLine, Order, OrderStatus, Product, ProductSort};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{OrderFilter, ProductFilter, Store, StoreError, StoreResult, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    cart: Vec<CartLine>,
    /// Insertion order; newest last.
    orders: Vec<Order>,
    checkout_requests: HashMap<(Uuid, String), Uuid>,
}

/// In-process store with the same uniqueness and stock rules as Postgres.
/// A single lock guards every table, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T: Clone>(matches: Vec<&T>, filter_page: &shared::PageRequest) -> Vec<T> {
    let offset = usize::try_from(filter_page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(filter_page.limit).unwrap_or(0);
    matches
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect()
}

fn product_matches(product: &Product, filter: &ProductFilter) -> bool {
    if filter.active_only && !product.is_active {
        return false;
    }
    if let Some(category) = &filter.category {
        if &product.category != category {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let found = [&product.title, &product.description, &product.category]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
        if !found {
            return false;
        }
    }
    true
}

fn compare_products(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    let primary = match sort {
        ProductSort::Newest => b.created_at.cmp(&a.created_at),
        ProductSort::Oldest => a.created_at.cmp(&b.created_at),
        ProductSort::PriceAsc => a.price.cmp(&b.price),
        ProductSort::PriceDesc => b.price.cmp(&a.price),
        ProductSort::TitleAsc => a.title.cmp(&b.title),
        ProductSort::TitleDesc => b.title.cmp(&a.title),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.products.values().any(|p| p.slug == product.slug) {
            return Err(StoreError::Duplicate("slug"));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(
        &self,
        product: &Product,
        stock: Option<i32>,
    ) -> StoreResult<Option<Product>> {
        let mut tables = self.tables.lock().await;
        if tables
            .products
            .values()
            .any(|p| p.id != product.id && p.slug == product.slug)
        {
            return Err(StoreError::Duplicate("slug"));
        }
        let Some(stored) = tables.products.get_mut(&product.id) else {
            return Ok(None);
        };
        let current_stock = stored.stock;
        *stored = product.clone();
        stored.stock = stock.unwrap_or(current_stock);
        Ok(Some(stored.clone()))
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().await.products.remove(&id).is_some())
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables.products.values().find(|p| p.slug == slug).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<(Vec<Product>, i64)> {
        let tables = self.tables.lock().await;
        let mut matches: Vec<&Product> = tables
            .products
            .values()
            .filter(|p| product_matches(p, filter))
            .collect();
        matches.sort_by(|a, b| compare_products(a, b, filter.sort));

        let total = matches.len() as i64;
        Ok((page(matches, &filter.page), total))
    }

    async fn take_stock(&self, product_id: Uuid, qty: i32) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.products.get_mut(&product_id) {
            Some(product) if product.can_fulfil(qty) => {
                product.stock -= qty;
                product.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_stock(&self, product_id: Uuid, qty: i32) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(product) = tables.products.get_mut(&product_id) {
            product.stock += qty;
            product.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<CartLine>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .cart
            .iter()
            .filter(|line| line.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_cart_line(&self, line: &CartLine) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.cart.iter_mut().find(|existing| existing.id == line.id) {
            Some(existing) => {
                existing.qty = line.qty;
                existing.updated_at = line.updated_at;
            }
            None => tables.cart.push(line.clone()),
        }
        Ok(())
    }

    async fn remove_cart_line(&self, user_id: Uuid, line_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.cart.len();
        tables
            .cart
            .retain(|line| !(line.id == line_id && line.user_id == user_id));
        Ok(tables.cart.len() < before)
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.cart.retain(|line| line.user_id != user_id);
        Ok(())
    }

    async fn insert_order(&self, order: &Order, idempotency_key: Option<&str>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .orders
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::OrderNumberTaken);
        }
        if let Some(key) = idempotency_key {
            let request = (order.user_id, key.to_string());
            if tables.checkout_requests.contains_key(&request) {
                return Err(StoreError::IdempotencyKeyUsed);
            }
            tables.checkout_requests.insert(request, order.id);
        }
        tables.orders.push(order.clone());
        Ok(())
    }

    async fn find_order_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Order>> {
        let tables = self.tables.lock().await;
        let Some(order_id) = tables.checkout_requests.get(&(user_id, key.to_string())) else {
            return Ok(None);
        };
        Ok(tables.orders.iter().find(|o| o.id == *order_id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<(Vec<Order>, i64)> {
        let tables = self.tables.lock().await;
        let matches: Vec<&Order> = tables
            .orders
            .iter()
            .rev()
            .filter(|o| filter.user_id.map_or(true, |user_id| o.user_id == user_id))
            .filter(|o| filter.status.map_or(true, |status| o.status == status))
            .collect();

        let total = matches.len() as i64;
        Ok((page(matches, &filter.page), total))
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }
}
