//! Pure field normalizers for PTR table cells.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A disclosed dollar range.
///
/// `"Over $X"` ranges have only a lower bound. When nothing parses, all
/// three fields are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub midpoint: Option<f64>,
}

impl AmountRange {
    fn bounded(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            midpoint: Some((min + max) / 2.0),
        }
    }
}

/// Parses amount text such as `"$1,001 - $15,000"`, `"Over $1,000,000"` or
/// `"$5,000"`. Never fails; unparseable input yields an empty range.
pub fn parse_amount_range(raw: &str) -> AmountRange {
    let s = raw.trim();
    if s.is_empty() {
        return AmountRange::default();
    }

    let lower = s.to_ascii_lowercase();
    if lower.starts_with("over") {
        return match parse_money(&s[4..]) {
            Some(min) => AmountRange {
                min: Some(min),
                max: None,
                midpoint: None,
            },
            None => AmountRange::default(),
        };
    }

    if let Some((low, high)) = s.split_once('-') {
        return match (parse_money(low), parse_money(high)) {
            (Some(min), Some(max)) => AmountRange::bounded(min, max),
            _ => AmountRange::default(),
        };
    }

    match parse_money(s) {
        Some(value) => AmountRange::bounded(value, value),
        None => AmountRange::default(),
    }
}

fn parse_money(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Canonical transaction direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    Buy,
    Sell,
    Exchange,
    /// Unmapped label, kept verbatim (trimmed).
    Other(String),
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Exchange => "EXCHANGE",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads back a stored value. Only the canonical names map to variants.
impl From<String> for TransactionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            "EXCHANGE" => Self::Exchange,
            _ => Self::Other(value),
        }
    }
}

impl From<TransactionType> for String {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Other(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

/// Maps a raw label from the "Type" column.
///
/// Matching is case-insensitive: `purchase` or exactly `p` is a buy, `sale`
/// or exactly `s` is a sell, `exchange` is an exchange. Anything else is
/// passed through. Blank input has no type.
pub fn normalize_transaction_type(raw: &str) -> Option<TransactionType> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let text = trimmed.to_lowercase();
    let kind = if text.contains("purchase") || text == "p" {
        TransactionType::Buy
    } else if text.contains("sale") || text == "s" {
        TransactionType::Sell
    } else if text.contains("exchange") {
        TransactionType::Exchange
    } else {
        TransactionType::Other(trimmed.to_string())
    };
    Some(kind)
}
