//! SQLite storage for PTR trades and the price cache.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};

use crate::prices::DailyClose;
use crate::trade::{TradeKey, TradeRecord};

const SCHEMA_VERSION: i32 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("date parse error: {0}")]
    Date(#[from] chrono::ParseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Connection-level failures worth retrying: busy, locked, or not yet openable.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
            ),
            _ => false,
        }
    }
}

/// A stored trade that is still missing at least one price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBackfillRow {
    pub id: i64,
    pub ticker: String,
    pub transaction_date: Option<NaiveDate>,
    pub price_at_transaction: Option<f64>,
    pub current_price: Option<f64>,
}

pub struct Db {
    conn: Connection,
}

impl Db {
    /// Opens (creating if needed) the database file and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    #[doc(hidden)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Inserts trades not already stored, returning how many were inserted.
    ///
    /// Repeats within `trades` are dropped first, then each remaining record
    /// is checked against the store by natural key. Everything runs in one
    /// transaction. The table's unique constraint backs up the check for
    /// rows with a full key; NULL dates or amounts rely on the check alone.
    pub fn upsert_trades(&mut self, trades: &[TradeRecord]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let mut seen: HashSet<TradeKey> = HashSet::with_capacity(trades.len());
        let mut inserted = 0usize;
        let mut duplicates = 0usize;
        let mut existing = 0usize;

        for trade in trades {
            if !seen.insert(trade.natural_key()) {
                duplicates += 1;
                continue;
            }
            if trade_exists(&tx, trade)? {
                existing += 1;
                continue;
            }
            inserted += insert_trade(&tx, trade)?;
        }
        tx.commit()?;

        tracing::debug!(
            "Upsert: {} inserted, {} in-batch duplicates, {} already stored",
            inserted,
            duplicates,
            existing
        );
        Ok(inserted)
    }

    pub fn count_trades(&self) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent cached close for `ticker` within `[earliest, date]`.
    pub fn cached_price_on_or_before(
        &self,
        ticker: &str,
        date: NaiveDate,
        earliest: NaiveDate,
    ) -> Result<Option<(NaiveDate, f64)>, DbError> {
        let row: Option<(String, f64)> = self
            .conn
            .query_row(
                "SELECT date, price FROM price_cache
                 WHERE ticker = ?1 AND date <= ?2 AND date >= ?3
                 ORDER BY date DESC
                 LIMIT 1",
                params![ticker, date.to_string(), earliest.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(d, p)| parse_date(&d).map(|date| (date, p)))
            .transpose()
    }

    /// Most recent cached close for `ticker`, if any.
    pub fn latest_cached_price(&self, ticker: &str) -> Result<Option<(NaiveDate, f64)>, DbError> {
        let row: Option<(String, f64)> = self
            .conn
            .query_row(
                "SELECT date, price FROM price_cache
                 WHERE ticker = ?1
                 ORDER BY date DESC
                 LIMIT 1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(d, p)| parse_date(&d).map(|date| (date, p)))
            .transpose()
    }

    /// Writes daily closes, replacing the price of any existing (ticker, date).
    pub fn store_prices(
        &self,
        ticker: &str,
        closes: &[DailyClose],
        updated: NaiveDate,
    ) -> Result<usize, DbError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO price_cache (ticker, date, price, last_updated)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(ticker, date) DO UPDATE SET
                   price = excluded.price,
                   last_updated = excluded.last_updated",
            )?;
            for close in closes {
                written += stmt.execute(params![
                    ticker,
                    close.date.to_string(),
                    close.close,
                    updated.to_string()
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn count_cached_prices(&self, ticker: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM price_cache WHERE ticker = ?1",
            params![ticker],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Trades with a ticker that lack a transaction price (and have a date
    /// to look one up for) or lack a current price.
    pub fn trades_missing_prices(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<PriceBackfillRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ticker, transaction_date, price_at_transaction, current_price
             FROM trades
             WHERE ticker <> ''
               AND ((price_at_transaction IS NULL AND transaction_date IS NOT NULL)
                    OR current_price IS NULL)
             ORDER BY id
             LIMIT ?1",
        )?;
        let raw = stmt
            .query_map(params![limit.unwrap_or(-1)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, ticker, date, price_at_transaction, current_price)| {
                Ok::<_, DbError>(PriceBackfillRow {
                    id,
                    ticker,
                    transaction_date: date.as_deref().map(parse_date).transpose()?,
                    price_at_transaction,
                    current_price,
                })
            })
            .collect()
    }

    /// Fills missing prices on one trade. Existing values are kept.
    pub fn update_trade_prices(
        &self,
        id: i64,
        price_at_transaction: Option<f64>,
        current_price: Option<f64>,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE trades
             SET price_at_transaction = COALESCE(price_at_transaction, ?1),
                 current_price = COALESCE(current_price, ?2)
             WHERE id = ?3",
            params![price_at_transaction, current_price, id],
        )?;
        Ok(changed)
    }
}

fn trade_exists(tx: &Transaction<'_>, trade: &TradeRecord) -> Result<bool, DbError> {
    let found: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM trades
             WHERE legislator_name = ?1
               AND ticker = ?2
               AND transaction_date IS ?3
               AND amount_min IS ?4
               AND amount_max IS ?5
             LIMIT 1",
            params![
                trade.legislator_name,
                trade.ticker,
                trade.transaction_date.map(|d| d.to_string()),
                trade.amount_min,
                trade.amount_max
            ],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert_trade(tx: &Transaction<'_>, t: &TradeRecord) -> Result<usize, DbError> {
    let changed = tx.execute(
        "INSERT INTO trades (
            legislator_name, first_name, last_name, display_name, chamber,
            report_id, report_type, report_format, report_url, filing_date,
            transaction_date, owner, ticker, asset_name, asset_type,
            transaction_type, transaction_type_raw, amount_range_raw,
            amount_min, amount_max, amount_midpoint, comment,
            price_at_transaction, current_price
         ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
            ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
         )
         ON CONFLICT DO NOTHING",
        params![
            t.legislator_name,
            t.first_name,
            t.last_name,
            t.display_name,
            t.chamber,
            t.report_id,
            t.report_type.as_str(),
            t.report_format,
            t.report_url,
            t.filing_date.to_string(),
            t.transaction_date.map(|d| d.to_string()),
            t.owner,
            t.ticker,
            t.asset_name,
            t.asset_type,
            t.transaction_type.as_ref().map(|k| k.as_str().to_string()),
            t.transaction_type_raw,
            t.amount_range_raw,
            t.amount_min,
            t.amount_max,
            t.amount_midpoint,
            t.comment,
            t.price_at_transaction,
            t.current_price,
        ],
    )?;
    Ok(changed)
}

fn parse_date(s: &str) -> Result<NaiveDate, DbError> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
}
