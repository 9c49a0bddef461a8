//! Yahoo Finance backed price source.

use chrono::NaiveDate;
use time::OffsetDateTime;

use crate::prices::{DailyClose, PriceError, PriceSource};

/// Convert chrono::NaiveDate to time::OffsetDateTime at UTC midnight.
pub fn date_to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, PriceError> {
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| PriceError::InvalidDate(date.to_string()))?;
    let timestamp = datetime.and_utc().timestamp();
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| PriceError::InvalidDate(date.to_string()))
}

/// Convert a unix timestamp (seconds) to its UTC calendar date.
pub fn timestamp_to_date(timestamp: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

/// Maps a portal ticker to a Yahoo symbol: `brk.b` becomes `BRK-B`.
pub fn yahoo_symbol(ticker: &str) -> String {
    ticker.trim().to_uppercase().replace('.', "-")
}

/// Whether an upstream error detail describes an HTTP 429 answer.
pub fn is_rate_limit_detail(detail: &str) -> bool {
    detail.contains("429") || detail.to_lowercase().contains("too many requests")
}

fn classify_upstream(err: yahoo_finance_api::YahooError) -> PriceError {
    if is_rate_limit_detail(&format!("{err:?}")) {
        PriceError::RateLimited
    } else {
        PriceError::Upstream(err)
    }
}

pub struct YahooPriceSource {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooPriceSource {
    pub fn new() -> Result<Self, PriceError> {
        Ok(Self {
            connector: yahoo_finance_api::YahooConnector::new()?,
        })
    }
}

impl PriceSource for YahooPriceSource {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, PriceError> {
        let symbol = yahoo_symbol(ticker);
        let from = date_to_offset_datetime(start)?;
        // Yahoo treats the end bound as exclusive.
        let next_day = end
            .succ_opt()
            .ok_or_else(|| PriceError::InvalidDate(end.to_string()))?;
        let to = date_to_offset_datetime(next_day)?;

        let response = self
            .connector
            .get_quote_history(&symbol, from, to)
            .await
            .map_err(classify_upstream)?;
        let quotes = response.quotes().map_err(classify_upstream)?;

        let closes: Vec<DailyClose> = quotes
            .iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .filter_map(|q| {
                let date = timestamp_to_date(q.timestamp as i64)?;
                (date >= start && date <= end).then_some(DailyClose {
                    date,
                    close: q.close,
                })
            })
            .collect();
        tracing::debug!(
            "Yahoo returned {} closes for {} ({}..{})",
            closes.len(),
            symbol,
            start,
            end
        );
        if closes.is_empty() {
            return Err(PriceError::NoData(symbol));
        }
        Ok(closes)
    }
}
