use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    fn parse(self) -> Result<BigDecimal, bigdecimal::ParseBigDecimalError> {
        match self {
            // f64's Display is the shortest round-trip form, so 29.99 stays 29.99
            RawAmount::Number(n) => BigDecimal::from_str(&n.to_string()),
            RawAmount::Text(s) => BigDecimal::from_str(s.trim()),
        }
    }
}

/// Digits kept after the decimal point by the `NUMERIC(12, 2)` columns.
pub const MAX_SCALE: i64 = 2;

/// Whether the amount fits a `NUMERIC(12, 2)` column without rounding:
/// at most two decimals and an absolute value below `10^10`.
pub fn is_storable(value: &BigDecimal) -> bool {
    let (_, scale) = value.normalized().as_bigint_and_exponent();
    scale <= MAX_SCALE && value.abs() < BigDecimal::from(10_000_000_000_i64)
}

pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // nearest f64 to the exact decimal text
    let number = value
        .to_string()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| S::Error::custom(format!("amount {value} is out of range")))?;
    serializer.serialize_f64(number)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    RawAmount::deserialize(deserializer)?
        .parse()
        .map_err(D::Error::custom)
}

/// Same as the parent module, for optional amounts.
pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<BigDecimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(amount) => super::serialize(amount, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RawAmount>::deserialize(deserializer)?
            .map(RawAmount::parse)
            .transpose()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Priced {
        #[serde(with = "crate::money")]
        price: BigDecimal,
        #[serde(with = "crate::money::option", default)]
        compare_at: Option<BigDecimal>,
    }

    #[test]
    fn test_amount_serializes_as_json_number() {
        let priced = Priced {
            price: BigDecimal::from_str("59.98").unwrap(),
            compare_at: None,
        };
        let json = serde_json::to_value(&priced).unwrap();
        assert_eq!(json["price"], serde_json::json!(59.98));
        assert!(json["compare_at"].is_null());
    }

    #[test]
    fn test_amount_accepts_numbers_and_strings() {
        let from_number: Priced = serde_json::from_str(r#"{"price": 29.99}"#).unwrap();
        let from_text: Priced =
            serde_json::from_str(r#"{"price": "29.99", "compare_at": "39.99"}"#).unwrap();

        assert_eq!(from_number.price, BigDecimal::from_str("29.99").unwrap());
        assert_eq!(from_text.price, from_number.price);
        assert_eq!(
            from_text.compare_at,
            Some(BigDecimal::from_str("39.99").unwrap())
        );
    }

    #[test]
    fn test_storable_amounts() {
        for ok in ["0", "19.99", "19.990", "100", "9999999999.99"] {
            assert!(is_storable(&BigDecimal::from_str(ok).unwrap()), "{ok}");
        }
        for bad in ["19.999", "0.001", "10000000000", "1e12"] {
            assert!(!is_storable(&BigDecimal::from_str(bad).unwrap()), "{bad}");
        }
    }

    #[test]
    fn test_garbage_amount_is_rejected() {
        let result = serde_json::from_str::<Priced>(r#"{"price": "twelve"}"#);
        assert!(result.is_err());
    }
}
