use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::VariantSelection;
use crate::money;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub title: String,
    #[serde(with = "money")]
    pub price_at_purchase: BigDecimal,
    pub qty: i32,
    #[serde(default)]
    pub variant: VariantSelection,
}

impl OrderItem {
    pub fn line_total(&self) -> BigDecimal {
        &self.price_at_purchase * &BigDecimal::from(self.qty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "US".to_string()
}

impl ShippingAddress {
    /// Returns the message for the first blank field, if any.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("name", &self.name),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zip", &self.zip),
            ("country", &self.country),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(format!("Shipping {field} is required")),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    pub subtotal: BigDecimal,
    pub discount_total: BigDecimal,
    pub grand_total: BigDecimal,
}

impl OrderTotals {
    /// Discounts are not implemented, so `discount_total` is always zero.
    pub fn from_items(items: &[OrderItem]) -> Self {
        let subtotal = items
            .iter()
            .fold(BigDecimal::from(0), |sum, item| sum + item.line_total());
        let discount_total = BigDecimal::from(0);
        let grand_total = &subtotal - &discount_total;

        Self {
            subtotal,
            discount_total,
            grand_total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    #[serde(with = "money")]
    pub subtotal: BigDecimal,
    #[serde(with = "money")]
    pub discount_total: BigDecimal,
    #[serde(with = "money")]
    pub grand_total: BigDecimal,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a fresh pending order; totals are computed from the items.
    pub fn place(
        user_id: Uuid,
        order_number: String,
        items: Vec<OrderItem>,
        shipping_address: Option<ShippingAddress>,
        payment_ref: Option<String>,
    ) -> Self {
        let totals = OrderTotals::from_items(&items);
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            order_number,
            user_id,
            items,
            subtotal: totals.subtotal,
            discount_total: totals.discount_total,
            grand_total: totals.grand_total,
            status: OrderStatus::Pending,
            shipping_address,
            payment_ref,
            created_at: now,
            updated_at: now,
        }
    }
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}

/// `ORD-<millis in base 36>-<5 random base-36 chars>`, uppercased.
pub fn generate_order_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("ORD-{}-{}", to_base36(millis), suffix).to_uppercase()
}

pub fn new_order_number() -> String {
    generate_order_number(Utc::now(), &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn item(price: &str, qty: i32) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            title: "Tee".to_string(),
            price_at_purchase: BigDecimal::from_str(price).unwrap(),
            qty,
            variant: VariantSelection::new(),
        }
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert_eq!(
            "refunded".parse::<OrderStatus>(),
            Err(UnknownStatus("refunded".to_string()))
        );
    }

    #[test]
    fn test_status_rejects_values_outside_the_enum() {
        assert!(serde_json::from_str::<OrderStatus>(r#""shipped""#).is_ok());
        assert!(serde_json::from_str::<OrderStatus>(r#""Shipped""#).is_err());
        assert!(serde_json::from_str::<OrderStatus>(r#""lost""#).is_err());
    }

    #[test]
    fn test_totals() {
        let totals = OrderTotals::from_items(&[item("29.99", 2), item("0.01", 1)]);
        assert_eq!(totals.subtotal, BigDecimal::from_str("59.99").unwrap());
        assert_eq!(totals.discount_total, BigDecimal::from(0));
        assert_eq!(totals.grand_total, totals.subtotal);
    }

    #[test]
    fn test_placed_order_is_pending_with_computed_totals() {
        let order = Order::place(
            Uuid::new_v4(),
            "ORD-1-AAAAA".to_string(),
            vec![item("29.99", 2)],
            None,
            Some("mock_123".to_string()),
        );
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.grand_total, BigDecimal::from_str("59.98").unwrap());
    }

    #[test]
    fn test_shipping_address_validation() {
        let mut address = ShippingAddress {
            name: "Test User".to_string(),
            street: "123 Test St".to_string(),
            city: "Test City".to_string(),
            state: "TS".to_string(),
            zip: "12345".to_string(),
            country: "US".to_string(),
        };
        assert_eq!(address.validate(), Ok(()));

        address.city = "   ".to_string();
        assert_eq!(address.validate(), Err("Shipping city is required".to_string()));
    }

    #[test]
    fn test_shipping_country_defaults_to_us() {
        let address: ShippingAddress = serde_json::from_str(
            r#"{"name":"A","street":"B","city":"C","state":"D","zip":"E"}"#,
        )
        .unwrap();
        assert_eq!(address.country, "US");
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let number = generate_order_number(now, &mut rng);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], "LOYW3V28");
        assert_eq!(parts[2].len(), 5);
        assert_eq!(number, number.to_uppercase());
    }

    #[test]
    fn test_order_numbers_are_unique() {
        let numbers: HashSet<String> = (0..100).map(|_| new_order_number()).collect();
        assert_eq!(numbers.len(), 100);
    }
}
