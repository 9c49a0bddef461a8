//! Ingestion core for Senate Periodic Transaction Reports.
//!
//! Parses eFD listing rows and detail pages into typed trade records,
//! normalizes amounts and transaction types, enriches trades with cached
//! market prices, and persists them exactly once in SQLite.

pub mod config;
pub mod db;
pub mod error;
pub mod markup;
pub mod normalize;
pub mod pipeline;
pub mod prices;
pub mod report;
pub mod retry;
pub mod trade;
pub mod yahoo;

pub use efdsearch_api;

pub use config::{lookback_start, IngestConfig, RetryPolicy};
pub use db::{Db, DbError, PriceBackfillRow};
pub use error::IngestError;
pub use markup::{classify_detail_page, PageClass, PtrDocument};
pub use normalize::{normalize_transaction_type, parse_amount_range, AmountRange, TransactionType};
pub use pipeline::{
    backfill_prices, enrich_trades, fetch_filing_trades, run_ingest, search_filings,
    BackfillSummary, FilingSearch, IngestSummary,
};
pub use prices::{DailyClose, PriceCache, PriceError, PriceSource};
pub use report::{parse_report_row, FilingRecord, ReportType};
pub use retry::with_store_retry;
pub use trade::{TradeKey, TradeRecord};
pub use yahoo::YahooPriceSource;
