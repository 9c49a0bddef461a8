//! Price enrichment: a SQLite-backed cache in front of an external daily
//! close source.

use chrono::NaiveDate;
use dashmap::DashMap;

use crate::config::{lookback_start, MAX_LOOKBACK_DAYS};
use crate::db::{Db, DbError};
use crate::error::IngestError;

/// Errors from an external price source.
#[derive(thiserror::Error, Debug)]
pub enum PriceError {
    #[error("Rate limited by price source")]
    RateLimited,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("No price data for {0}")]
    NoData(String),
    #[error(transparent)]
    Upstream(#[from] yahoo_finance_api::YahooError),
}

/// One trading day's closing price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// A source of daily closes for `ticker` between `start` and `end`, inclusive.
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, PriceError>;
}

/// Cache-first price lookups for one run.
///
/// Persistent hits come from `price_cache`; misses fetch a window of daily
/// closes, store them all, and re-query. Resolved lookups (including
/// misses) are memoized for the lifetime of the value, so a failed fetch
/// is not retried within a run.
pub struct PriceCache<'a, S> {
    db: &'a Db,
    source: &'a S,
    window_days: i64,
    latest_max_age_days: i64,
    today: NaiveDate,
    on_or_before: DashMap<(String, NaiveDate), Option<f64>>,
    latest: DashMap<String, Option<f64>>,
}

impl<'a, S: PriceSource> PriceCache<'a, S> {
    pub fn new(
        db: &'a Db,
        source: &'a S,
        window_days: i64,
        latest_max_age_days: i64,
        today: NaiveDate,
    ) -> Self {
        Self {
            db,
            source,
            window_days: window_days.clamp(1, MAX_LOOKBACK_DAYS),
            latest_max_age_days: latest_max_age_days.clamp(0, MAX_LOOKBACK_DAYS),
            today,
            on_or_before: DashMap::new(),
            latest: DashMap::new(),
        }
    }

    /// Closing price on `date` or the closest earlier trading day within
    /// the window. `Ok(None)` when the source has nothing; only store
    /// errors are returned as `Err`.
    pub async fn price_on_or_before(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<f64>, DbError> {
        let key = (ticker.to_string(), date);
        if let Some(memo) = self.on_or_before.get(&key) {
            return Ok(*memo);
        }

        let earliest = days_before(date, self.window_days);
        let price = match self.db.cached_price_on_or_before(ticker, date, earliest)? {
            Some((_, price)) => Some(price),
            None => {
                if self.backfill(ticker, earliest, date).await? {
                    self.db
                        .cached_price_on_or_before(ticker, date, earliest)?
                        .map(|(_, price)| price)
                } else {
                    None
                }
            }
        };
        if price.is_none() {
            tracing::warn!("No price for {} on or before {}", ticker, date);
        }
        self.on_or_before.insert(key, price);
        Ok(price)
    }

    /// Most recent close, accepting a cached value no older than the
    /// configured maximum age before fetching.
    pub async fn latest_price(&self, ticker: &str) -> Result<Option<f64>, DbError> {
        if let Some(memo) = self.latest.get(ticker) {
            return Ok(*memo);
        }

        let freshest_allowed = days_before(self.today, self.latest_max_age_days);
        let cached = self
            .db
            .latest_cached_price(ticker)?
            .filter(|(date, _)| *date >= freshest_allowed);

        let price = match cached {
            Some((_, price)) => Some(price),
            None => {
                let earliest = days_before(self.today, self.window_days);
                if self.backfill(ticker, earliest, self.today).await? {
                    self.db
                        .latest_cached_price(ticker)?
                        .filter(|(date, _)| *date >= earliest)
                        .map(|(_, price)| price)
                } else {
                    None
                }
            }
        };
        if price.is_none() {
            tracing::warn!("No current price for {}", ticker);
        }
        self.latest.insert(ticker.to_string(), price);
        Ok(price)
    }

    /// Fetches and stores closes for the window. Returns whether anything was stored.
    async fn backfill(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, DbError> {
        match self.source.daily_closes(ticker, start, end).await {
            Ok(closes) if closes.is_empty() => {
                tracing::warn!("Price source returned no data for {} {}..{}", ticker, start, end);
                Ok(false)
            }
            Ok(closes) => {
                let written = self.db.store_prices(ticker, &closes, self.today)?;
                tracing::debug!("Cached {} closes for {} {}..{}", written, ticker, start, end);
                Ok(true)
            }
            Err(PriceError::RateLimited) => {
                tracing::warn!(
                    "Price source rate limited {} {}..{}; leaving price empty for this run",
                    ticker,
                    start,
                    end
                );
                Ok(false)
            }
            Err(e) => {
                let failure = IngestError::PriceLookup(e);
                tracing::warn!("{} ({} {}..{})", failure, ticker, start, end);
                Ok(false)
            }
        }
    }
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    lookback_start(date, days).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// In-memory price source counting calls.
    pub struct FakePrices {
        pub closes: Vec<(String, DailyClose)>,
        pub fail: bool,
        pub calls: Cell<usize>,
        pub requests: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
    }

    impl FakePrices {
        pub fn new(closes: Vec<(&str, NaiveDate, f64)>) -> Self {
            Self {
                closes: closes
                    .into_iter()
                    .map(|(t, date, close)| (t.to_string(), DailyClose { date, close }))
                    .collect(),
                fail: false,
                calls: Cell::new(0),
                requests: RefCell::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            let mut fake = Self::new(Vec::new());
            fake.fail = true;
            fake
        }
    }

    impl PriceSource for FakePrices {
        async fn daily_closes(
            &self,
            ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyClose>, PriceError> {
            self.calls.set(self.calls.get() + 1);
            self.requests
                .borrow_mut()
                .push((ticker.to_string(), start, end));
            if self.fail {
                return Err(PriceError::RateLimited);
            }
            Ok(self
                .closes
                .iter()
                .filter(|(t, c)| t == ticker && c.date >= start && c.date <= end)
                .map(|(_, c)| *c)
                .collect())
        }
    }
}
