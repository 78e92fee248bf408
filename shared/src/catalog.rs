use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub images: Vec<String>,
    #[serde(with = "money")]
    pub price: BigDecimal,
    #[serde(with = "money::option", default, skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<BigDecimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<i32>,
    pub category: String,
    pub stock: i32,
    #[serde(default)]
    pub variants: Vec<Variant>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product can be sold in the given quantity right now.
    pub fn can_fulfil(&self, qty: i32) -> bool {
        self.is_active && self.stock >= qty
    }
}

/// Sort orders accepted by the public product listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductSort {
    #[default]
    #[serde(rename = "-createdAt")]
    Newest,
    #[serde(rename = "createdAt")]
    Oldest,
    #[serde(rename = "price")]
    PriceAsc,
    #[serde(rename = "-price")]
    PriceDesc,
    #[serde(rename = "title")]
    TitleAsc,
    #[serde(rename = "-title")]
    TitleDesc,
}

/// Derives a URL slug from a product title.
///
/// Lowercases, drops anything that is not `[a-z0-9]`, whitespace or `-`, and
/// collapses whitespace runs into single hyphens.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches('-')
        .to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Percentage saved relative to `compare_at`, rounded to the nearest whole
/// percent. `None` unless `compare_at` is above `price`.
pub fn discount_percent(price: &BigDecimal, compare_at: &BigDecimal) -> Option<i32> {
    if compare_at <= price {
        return None;
    }
    let saved = (compare_at - price) / compare_at;
    (saved.to_f64()? * 100.0).round().to_i32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Classic Logo Tee"), "classic-logo-tee");
        assert_eq!(slugify("  Hoodie (Black) 2.0! "), "hoodie-black-20");
        assert_eq!(slugify("Mug -- Large"), "mug----large");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("classic-logo-tee"));
        assert!(is_valid_slug("tee-2"));
        assert!(!is_valid_slug("Classic"));
        assert!(!is_valid_slug("tee_2"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(discount_percent(&dec("30"), &dec("40")), Some(25));
        assert_eq!(discount_percent(&dec("29.99"), &dec("39.99")), Some(25));
        assert_eq!(discount_percent(&dec("10"), &dec("10")), None);
        assert_eq!(discount_percent(&dec("12"), &dec("10")), None);
    }

    #[test]
    fn test_sort_names_match_query_values() {
        let sort: ProductSort = serde_json::from_str(r#""-price""#).unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert_eq!(ProductSort::default(), ProductSort::Newest);
        assert!(serde_json::from_str::<ProductSort>(r#""popularity""#).is_err());
    }
}
