use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Currency assumed when a listing doesn't state one
pub const DEFAULT_CURRENCY: &str = "ZAR";

/// Price of a listing
///
/// Scraped data arrives in several shapes: a `{current, currency, original}`
/// object, a bare number, or display text such as `"R 1 299.99"`. All of them
/// deserialize into this struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Price {
    pub current: Option<f64>,
    pub currency: String,
    pub original: Option<f64>,
}

impl Price {
    pub fn new(current: f64, currency: impl Into<String>) -> Self {
        Self {
            current: Some(current),
            currency: currency.into(),
            original: None,
        }
    }

    pub fn with_original(mut self, original: Option<f64>) -> Self {
        self.original = original;
        self
    }

    /// Interprets an arbitrary JSON value as a price
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(map) => Some(Self {
                current: map.get("current").and_then(amount_from_value),
                currency: map
                    .get("currency")
                    .and_then(Value::as_str)
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or(DEFAULT_CURRENCY)
                    .to_string(),
                original: map.get("original").and_then(amount_from_value),
            }),
            other => amount_from_value(other).map(|amount| Self::new(amount, DEFAULT_CURRENCY)),
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Price::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised price: {}", value)))
    }
}

/// Reads an amount from a JSON number or price text
pub fn amount_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price_text(s),
        _ => None,
    }
}

/// Parses display text like `"R 1,299.99"` into an amount
///
/// Every character other than digits and `.` is dropped before parsing.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Deserializes an optional amount given as a number, text, or null
pub(crate) fn flexible_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(amount_from_value(&value))
}
