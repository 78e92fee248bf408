use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money;

/// Chosen option per variant axis, e.g. `{"size": "M", "color": "black"}`.
/// An empty map means "no variant".
pub type VariantSelection = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    #[serde(with = "money")]
    pub price_snapshot: BigDecimal,
    #[serde(default)]
    pub variant: VariantSelection,
    pub qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    pub fn line_total(&self) -> BigDecimal {
        &self.price_snapshot * &BigDecimal::from(self.qty)
    }

    /// Lines are merged when both the product and the variant selection match.
    pub fn matches(&self, product_id: Uuid, variant: &VariantSelection) -> bool {
        self.product_id == product_id && &self.variant == variant
    }
}

/// The cart as returned to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    #[serde(with = "money")]
    pub subtotal: BigDecimal,
    pub item_count: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartSummary {
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let subtotal = items
            .iter()
            .fold(BigDecimal::from(0), |sum, line| sum + line.line_total());
        let item_count = items.iter().map(|line| i64::from(line.qty)).sum();
        let updated_at = items.iter().map(|line| line.updated_at).max();

        Self {
            items,
            subtotal,
            item_count,
            updated_at,
        }
    }
}
