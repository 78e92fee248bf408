use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{CartLine, Order, OrderStatus, Product, ProductSort};
use uuid::Uuid;

use super::{OrderFilter, ProductFilter, Store, StoreError, StoreResult, User};
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;
type PooledConnection<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &err {
            match info.constraint_name() {
                Some("users_email_key") => return StoreError::Duplicate("email"),
                Some("products_slug_key") => return StoreError::Duplicate("slug"),
                Some("orders_order_number_key") => return StoreError::OrderNumberTaken,
                Some("checkout_requests_pkey") => return StoreError::IdempotencyKeyUsed,
                _ => {}
            }
        }
        StoreError::Backend(err.into())
    }
}

impl From<bb8::RunError<PoolError>> for StoreError {
    fn from(err: bb8::RunError<PoolError>) -> Self {
        StoreError::Backend(anyhow!("database pool: {err}"))
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<PooledConnection<'_>> {
        Ok(self.pool.get().await?)
    }

    async fn load_items(
        conn: &mut AsyncPgConnection,
        order_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<OrderItemRow>>> {
        let rows = order_items::table
            .filter(order_items::order_id.eq_any(order_ids))
            .order((order_items::order_id.asc(), order_items::position.asc()))
            .select(OrderItemRow::as_select())
            .load::<OrderItemRow>(conn)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn load_order(conn: &mut AsyncPgConnection, id: Uuid) -> StoreResult<Option<Order>> {
        let row = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first::<OrderRow>(conn)
            .await
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = Self::load_items(conn, &[row.id])
            .await?
            .remove(&row.id)
            .unwrap_or_default();
        Ok(Some(into_order(row, items)?))
    }
}

/// Escapes LIKE metacharacters so user search text matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn filtered_products(filter: &ProductFilter) -> products::BoxedQuery<'static, Pg> {
    let mut query = products::table.into_boxed();

    if filter.active_only {
        query = query.filter(products::is_active.eq(true));
    }
    if let Some(category) = &filter.category {
        query = query.filter(products::category.eq(category.clone()));
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        query = query.filter(
            products::title
                .ilike(pattern.clone())
                .or(products::description.ilike(pattern.clone()))
                .or(products::category.ilike(pattern)),
        );
    }
    query
}

fn filtered_orders(filter: &OrderFilter) -> orders::BoxedQuery<'static, Pg> {
    let mut query = orders::table.into_boxed();

    if let Some(user_id) = filter.user_id {
        query = query.filter(orders::user_id.eq(user_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(orders::status.eq(status.as_str()));
    }
    query
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::insert_into(users::table)
            .values(UserRow::from(user))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        let row = users::table
            .find(id)
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        let row = users::table
            .filter(users::email.eq(email))
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let row = ProductRow::try_from(product)?;
        let mut conn = self.conn().await?;
        diesel::insert_into(products::table)
            .values(&row)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn update_product(
        &self,
        product: &Product,
        stock: Option<i32>,
    ) -> StoreResult<Option<Product>> {
        let id = product.id;
        let changes = ProductChanges::try_from(product)?;
        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, StoreError, _>(|conn| {
            Box::pin(async move {
                let updated = diesel::update(products::table.find(id))
                    .set(&changes)
                    .execute(conn)
                    .await?;
                if updated == 0 {
                    return Ok(None);
                }

                if let Some(stock) = stock {
                    diesel::update(products::table.find(id))
                        .set(products::stock.eq(stock))
                        .execute(conn)
                        .await?;
                }

                let row = products::table
                    .find(id)
                    .select(ProductRow::as_select())
                    .first::<ProductRow>(conn)
                    .await?;
                Ok(Some(Product::try_from(row)?))
            })
        })
        .await
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(products::table.find(id))
            .execute(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let mut conn = self.conn().await?;
        let row = products::table
            .find(id)
            .select(ProductRow::as_select())
            .first::<ProductRow>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Product::try_from).transpose()?)
    }

    async fn find_product_by_slug(&self, slug: &str) -> StoreResult<Option<Product>> {
        let mut conn = self.conn().await?;
        let row = products::table
            .filter(products::slug.eq(slug))
            .select(ProductRow::as_select())
            .first::<ProductRow>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Product::try_from).transpose()?)
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<(Vec<Product>, i64)> {
        let mut conn = self.conn().await?;

        let total = filtered_products(filter)
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        let query = filtered_products(filter);
        let query = match filter.sort {
            ProductSort::Newest => query.order(products::created_at.desc()),
            ProductSort::Oldest => query.order(products::created_at.asc()),
            ProductSort::PriceAsc => query.order(products::price.asc()),
            ProductSort::PriceDesc => query.order(products::price.desc()),
            ProductSort::TitleAsc => query.order(products::title.asc()),
            ProductSort::TitleDesc => query.order(products::title.desc()),
        };

        let rows = query
            .then_order_by(products::id.asc())
            .offset(filter.page.offset())
            .limit(filter.page.limit)
            .select(ProductRow::as_select())
            .load::<ProductRow>(&mut conn)
            .await?;

        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn take_stock(&self, product_id: Uuid, qty: i32) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            products::table
                .filter(products::id.eq(product_id))
                .filter(products::is_active.eq(true))
                .filter(products::stock.ge(qty)),
        )
        .set((
            products::stock.eq(products::stock - qty),
            products::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;
        Ok(updated == 1)
    }

    async fn restore_stock(&self, product_id: Uuid, qty: i32) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::update(products::table.find(product_id))
            .set((
                products::stock.eq(products::stock + qty),
                products::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<CartLine>> {
        let mut conn = self.conn().await?;
        let rows = cart_items::table
            .filter(cart_items::user_id.eq(user_id))
            .order((cart_items::created_at.asc(), cart_items::id.asc()))
            .select(CartItemRow::as_select())
            .load::<CartItemRow>(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(CartLine::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    async fn upsert_cart_line(&self, line: &CartLine) -> StoreResult<()> {
        let row = CartItemRow::try_from(line)?;
        let mut conn = self.conn().await?;
        diesel::insert_into(cart_items::table)
            .values(&row)
            .on_conflict(cart_items::id)
            .do_update()
            .set((
                cart_items::qty.eq(row.qty),
                cart_items::updated_at.eq(row.updated_at),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_cart_line(&self, user_id: Uuid, line_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(
            cart_items::table
                .filter(cart_items::id.eq(line_id))
                .filter(cart_items::user_id.eq(user_id)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted == 1)
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user_id)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn insert_order(&self, order: &Order, idempotency_key: Option<&str>) -> StoreResult<()> {
        let order_row = OrderRow::try_from(order)?;
        let item_rows = order_item_rows(order)?;
        let request_row = idempotency_key.map(|key| CheckoutRequestRow {
            user_id: order.user_id,
            idempotency_key: key.to_string(),
            order_id: order.id,
            created_at: order.created_at,
        });

        let mut pooled = self.conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, StoreError, _>(|conn| {
            Box::pin(async move {
                diesel::insert_into(orders::table)
                    .values(&order_row)
                    .execute(conn)
                    .await?;

                diesel::insert_into(order_items::table)
                    .values(&item_rows)
                    .execute(conn)
                    .await?;

                if let Some(request_row) = request_row {
                    diesel::insert_into(checkout_requests::table)
                        .values(&request_row)
                        .execute(conn)
                        .await?;
                }

                Ok(())
            })
        })
        .await
    }

    async fn find_order_by_idempotency_key(
        &self,
        user_id: Uuid,
        key: &str,
    ) -> StoreResult<Option<Order>> {
        let mut conn = self.conn().await?;
        let order_id = checkout_requests::table
            .filter(checkout_requests::user_id.eq(user_id))
            .filter(checkout_requests::idempotency_key.eq(key))
            .select(checkout_requests::order_id)
            .first::<Uuid>(&mut conn)
            .await
            .optional()?;

        match order_id {
            Some(order_id) => Self::load_order(&mut conn, order_id).await,
            None => Ok(None),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<(Vec<Order>, i64)> {
        let mut conn = self.conn().await?;

        let total = filtered_orders(filter)
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        let rows = filtered_orders(filter)
            .order((orders::created_at.desc(), orders::id.desc()))
            .offset(filter.page.offset())
            .limit(filter.page.limit)
            .select(OrderRow::as_select())
            .load::<OrderRow>(&mut conn)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut items = Self::load_items(&mut conn, &ids).await?;

        let orders = rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                into_order(row, lines)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((orders, total))
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(orders::table.find(id))
            .set((
                orders::status.eq(status.as_str()),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        if updated == 0 {
            return Ok(None);
        }
        Self::load_order(&mut conn, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("tee"), "tee");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }
}
