//! The canonical trade record and its natural key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::normalize::TransactionType;
use crate::report::ReportType;

/// One transaction line from a PTR, plus enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub legislator_name: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub chamber: String,
    pub report_id: Option<String>,
    pub report_type: ReportType,
    pub report_format: Option<String>,
    pub report_url: String,
    pub filing_date: NaiveDate,
    pub transaction_date: Option<NaiveDate>,
    pub owner: Option<String>,
    pub ticker: String,
    pub asset_name: Option<String>,
    pub asset_type: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub transaction_type_raw: String,
    pub amount_range_raw: Option<String>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub amount_midpoint: Option<f64>,
    pub comment: Option<String>,
    pub price_at_transaction: Option<f64>,
    pub current_price: Option<f64>,
}

/// Identity of a disclosed transaction: legislator, ticker, transaction
/// date and amount bounds. Filing date and report id are not part of it,
/// so an amendment repeating a trade verbatim collapses onto the original.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradeKey {
    pub legislator_name: String,
    pub ticker: String,
    pub transaction_date: Option<NaiveDate>,
    amount_min_bits: Option<u64>,
    amount_max_bits: Option<u64>,
}

impl TradeRecord {
    pub fn natural_key(&self) -> TradeKey {
        TradeKey {
            legislator_name: self.legislator_name.clone(),
            ticker: self.ticker.clone(),
            transaction_date: self.transaction_date,
            amount_min_bits: self.amount_min.map(f64::to_bits),
            amount_max_bits: self.amount_max.map(f64::to_bits),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A fully populated record for store and pipeline tests.
    pub fn sample_trade(ticker: &str, day: u32) -> TradeRecord {
        TradeRecord {
            legislator_name: "John Boozman".into(),
            first_name: "John".into(),
            last_name: "Boozman".into(),
            display_name: "Boozman, John (Senator)".into(),
            chamber: "Senate".into(),
            report_id: Some("6f1c2e1a".into()),
            report_type: ReportType::Ptr,
            report_format: Some("ptr".into()),
            report_url: "https://efdsearch.senate.gov/search/view/ptr/6f1c2e1a/".into(),
            filing_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            transaction_date: NaiveDate::from_ymd_opt(2026, 1, day),
            owner: Some("Spouse".into()),
            ticker: ticker.into(),
            asset_name: Some(format!("{ticker} Common Stock")),
            asset_type: Some("Stock".into()),
            transaction_type: Some(TransactionType::Buy),
            transaction_type_raw: "Purchase".into(),
            amount_range_raw: Some("$1,001 - $15,000".into()),
            amount_min: Some(1001.0),
            amount_max: Some(15000.0),
            amount_midpoint: Some(8000.5),
            comment: None,
            price_at_transaction: None,
            current_price: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_trade;

    #[test]
    fn key_ignores_provenance_and_comment() {
        let a = sample_trade("AAPL", 5);
        let mut b = a.clone();
        b.comment = Some("amended".into());
        b.report_id = Some("other".into());
        b.filing_date = chrono::NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn key_distinguishes_amounts_and_dates() {
        let a = sample_trade("AAPL", 5);
        let mut b = a.clone();
        b.amount_max = Some(50000.0);
        assert_ne!(a.natural_key(), b.natural_key());

        let c = sample_trade("AAPL", 6);
        assert_ne!(a.natural_key(), c.natural_key());
    }
}
