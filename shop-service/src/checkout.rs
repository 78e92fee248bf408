use serde::Deserialize;
use shared::order::new_order_number;
use shared::{CartLine, Order, OrderItem, ShippingAddress, StockLedger};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{Store, StoreError};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: Option<ShippingAddress>,
    pub payment_ref: Option<String>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product {0} is no longer available")]
    Unavailable(String),

    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct PlacedOrder {
    pub order: Order,
    /// True when the order was found under the caller's idempotency key
    /// rather than placed by this call.
    pub replayed: bool,
}

type NumberSource<'a> = Box<dyn Fn() -> String + Send + Sync + 'a>;

/// Turns a cart into an order. Stock taken for earlier lines is given back
/// when a later line or the insert fails.
pub struct Checkout<'a> {
    store: &'a dyn Store,
    next_number: NumberSource<'a>,
}

impl<'a> Checkout<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            next_number: Box::new(new_order_number),
        }
    }

    #[cfg(test)]
    fn with_numbers(store: &'a dyn Store, next_number: impl Fn() -> String + Send + Sync + 'a) -> Self {
        Self {
            store,
            next_number: Box::new(next_number),
        }
    }

    pub async fn place_order(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
        idempotency_key: Option<&str>,
    ) -> Result<PlacedOrder, CheckoutError> {
        if let Some(key) = idempotency_key {
            if let Some(order) = self.store.find_order_by_idempotency_key(user_id, key).await? {
                info!(order_number = %order.order_number, "Replaying checkout for idempotency key");
                return Ok(PlacedOrder { order, replayed: true });
            }
        }

        let lines = self.store.cart_lines(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut ledger = StockLedger::new();
        let items = match self.take_stock(&lines, &mut ledger).await {
            Ok(items) => items,
            Err(err) => {
                self.compensate(&mut ledger).await;
                return Err(err);
            }
        };

        let order = match self.insert_order(user_id, items, request, idempotency_key).await {
            Ok(order) => order,
            Err(StoreError::IdempotencyKeyUsed) => {
                // A concurrent request with the same key won the insert.
                self.compensate(&mut ledger).await;
                let key = idempotency_key.unwrap_or_default();
                return match self.store.find_order_by_idempotency_key(user_id, key).await? {
                    Some(order) => Ok(PlacedOrder { order, replayed: true }),
                    None => Err(StoreError::IdempotencyKeyUsed.into()),
                };
            }
            Err(err) => {
                self.compensate(&mut ledger).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self.store.clear_cart(user_id).await {
            warn!(order_number = %order.order_number, "Order placed but cart was not cleared: {}", err);
        }

        info!(
            order_number = %order.order_number,
            grand_total = %order.grand_total,
            lines = order.items.len(),
            "Order placed"
        );
        Ok(PlacedOrder {
            order,
            replayed: false,
        })
    }

    async fn take_stock(
        &self,
        lines: &[CartLine],
        ledger: &mut StockLedger,
    ) -> Result<Vec<OrderItem>, CheckoutError> {
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            let product = match self.store.find_product(line.product_id).await? {
                Some(product) if product.is_active => product,
                _ => return Err(CheckoutError::Unavailable(line.title.clone())),
            };

            if !self.store.take_stock(line.product_id, line.qty).await? {
                return Err(CheckoutError::InsufficientStock(line.title.clone()));
            }
            ledger.record(line.product_id, line.qty);

            items.push(OrderItem {
                product_id: product.id,
                title: product.title,
                price_at_purchase: product.price,
                qty: line.qty,
                variant: line.variant.clone(),
            });
        }

        Ok(items)
    }

    async fn insert_order(
        &self,
        user_id: Uuid,
        items: Vec<OrderItem>,
        request: CheckoutRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Order, StoreError> {
        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let order = Order::place(
                user_id,
                (self.next_number)(),
                items.clone(),
                request.shipping_address.clone(),
                request.payment_ref.clone(),
            );

            match self.store.insert_order(&order, idempotency_key).await {
                Ok(()) => return Ok(order),
                Err(StoreError::OrderNumberTaken) => {
                    warn!(attempt, order_number = %order.order_number, "Order number collision, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::OrderNumberTaken)
    }

    async fn compensate(&self, ledger: &mut StockLedger) {
        for take in ledger.drain_compensations() {
            if let Err(err) = self.store.restore_stock(take.product_id, take.qty).await {
                error!(
                    product_id = %take.product_id,
                    qty = take.qty,
                    "Failed to restore stock: {}",
                    err
                );
            }
        }
    }
}
