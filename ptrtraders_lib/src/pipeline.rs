//! The batch ingestion run: session, listing, detail pages, enrichment, upsert.

use chrono::NaiveDate;
use efdsearch_api::types::FetchedPage;
use efdsearch_api::{search_all_reports, Client, ReportSearchQuery, Session};
use serde::Serialize;
use tokio::time::sleep;

use crate::config::IngestConfig;
use crate::db::{Db, DbError, PriceBackfillRow};
use crate::error::IngestError;
use crate::markup::{PageClass, PtrDocument};
use crate::prices::{PriceCache, PriceSource};
use crate::report::{parse_report_row, FilingRecord};
use crate::trade::TradeRecord;

/// What one ingestion run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Listing rows returned by the portal.
    pub filings_found: usize,
    /// Electronic PTR filings whose detail pages were fetched.
    pub ptr_filings: usize,
    /// PTR filings dropped for a missing table, redirect or fetch failure.
    pub filings_skipped: usize,
    pub rows_malformed: usize,
    pub trades_parsed: usize,
    pub trades_inserted: usize,
}

/// Parsed listing for a date range.
#[derive(Debug, Clone, Default)]
pub struct FilingSearch {
    pub rows_found: usize,
    pub rows_malformed: usize,
    pub filings: Vec<FilingRecord>,
}

/// Lists every filing submitted in `[start, end]` and parses the rows.
/// Malformed rows are logged and counted, not returned.
pub async fn search_filings(
    session: &Session,
    config: &IngestConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<FilingSearch, IngestError> {
    let query = ReportSearchQuery::new(start)
        .with_end_date(end)
        .with_page_size(config.page_size);
    let listing = search_all_reports(session, &query).await?;
    tracing::info!(
        "Listing returned {} rows ({} filtered) in {} pages",
        listing.rows.len(),
        listing.records_filtered,
        listing.pages_fetched
    );

    let mut search = FilingSearch {
        rows_found: listing.rows.len(),
        ..Default::default()
    };
    for row in &listing.rows {
        match parse_report_row(row, &config.base_url) {
            Ok(filing) => search.filings.push(filing),
            Err(e) => {
                tracing::warn!("Skipping listing row: {}", e);
                search.rows_malformed += 1;
            }
        }
    }
    Ok(search)
}

/// Fetches one filing's detail page and parses its transactions.
pub async fn fetch_filing_trades(
    session: &Session,
    filing: &FilingRecord,
) -> Result<Vec<TradeRecord>, IngestError> {
    let page = session.fetch_page(&filing.report_url).await?;
    parse_detail_page(&page, filing)
}

fn parse_detail_page(
    page: &FetchedPage,
    filing: &FilingRecord,
) -> Result<Vec<TradeRecord>, IngestError> {
    let doc = PtrDocument::parse(&page.body);
    tracing::debug!(
        "Detail page status={} final_url={} title={}",
        page.status,
        page.final_url,
        doc.title().as_deref().unwrap_or("<no title>")
    );
    match doc.classify(&page.final_url) {
        PageClass::Redirected => Err(IngestError::TableNotFound {
            url: filing.report_url.clone(),
            reason: format!("session bounced to landing page ({})", page.final_url),
        }),
        PageClass::Authenticated | PageClass::Unknown => doc.parse_trades(filing),
    }
}

/// Fills `price_at_transaction` and `current_price` on each trade.
///
/// Trades without a transaction date only get a current price. Returns the
/// number of price fields filled. Only store errors fail.
pub async fn enrich_trades<S: PriceSource>(
    trades: &mut [TradeRecord],
    cache: &PriceCache<'_, S>,
) -> Result<usize, DbError> {
    let mut filled = 0usize;
    for trade in trades.iter_mut() {
        if let Some(date) = trade.transaction_date {
            trade.price_at_transaction = cache.price_on_or_before(&trade.ticker, date).await?;
            filled += usize::from(trade.price_at_transaction.is_some());
        }
        trade.current_price = cache.latest_price(&trade.ticker).await?;
        filled += usize::from(trade.current_price.is_some());
    }
    Ok(filled)
}

/// What one price backfill pass over stored trades did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub candidates: usize,
    /// Trades that received at least one price.
    pub updated: usize,
    pub transaction_prices: usize,
    pub current_prices: usize,
    pub unresolved: usize,
}

/// Fills missing prices on stored trades.
///
/// Only fields that are still empty are looked up, and the store update
/// never overwrites a present value. `on_row` runs after each row.
pub async fn backfill_prices<S, F>(
    db: &Db,
    cache: &PriceCache<'_, S>,
    rows: &[PriceBackfillRow],
    mut on_row: F,
) -> Result<BackfillSummary, DbError>
where
    S: PriceSource,
    F: FnMut(&BackfillSummary),
{
    let mut summary = BackfillSummary {
        candidates: rows.len(),
        ..Default::default()
    };
    for row in rows {
        let price_at_transaction = match (row.price_at_transaction, row.transaction_date) {
            (None, Some(date)) => cache.price_on_or_before(&row.ticker, date).await?,
            _ => None,
        };
        let current_price = match row.current_price {
            None => cache.latest_price(&row.ticker).await?,
            Some(_) => None,
        };

        if price_at_transaction.is_some() || current_price.is_some() {
            db.update_trade_prices(row.id, price_at_transaction, current_price)?;
            summary.updated += 1;
            summary.transaction_prices += usize::from(price_at_transaction.is_some());
            summary.current_prices += usize::from(current_price.is_some());
        } else {
            tracing::debug!("No price resolved for {} (trade {})", row.ticker, row.id);
            summary.unresolved += 1;
        }
        on_row(&summary);
    }
    Ok(summary)
}

/// Runs the full pipeline for filings submitted in `[start, end]`.
///
/// Opens one session and uses it sequentially. Auth and store failures end
/// the run; a filing without a usable transactions table is skipped. All
/// trades are enriched, then upserted in one transaction. Freshness of
/// current prices is measured from `end`.
pub async fn run_ingest<S: PriceSource>(
    config: &IngestConfig,
    db: &mut Db,
    prices: &S,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<IngestSummary, IngestError> {
    let session = Client::with_base_url(&config.base_url)
        .open_session()
        .await?;
    tracing::info!("Session established, listing filings {} to {}", start, end);

    let search = search_filings(&session, config, start, end).await?;
    let mut summary = IngestSummary {
        start: Some(start),
        end: Some(end),
        filings_found: search.rows_found,
        rows_malformed: search.rows_malformed,
        ..Default::default()
    };

    let ptr_filings: Vec<&FilingRecord> = search
        .filings
        .iter()
        .filter(|f| f.is_electronic_ptr())
        .collect();
    summary.ptr_filings = ptr_filings.len();
    tracing::info!(
        "{} of {} filings are electronic PTRs",
        ptr_filings.len(),
        search.filings.len()
    );

    let mut trades: Vec<TradeRecord> = Vec::new();
    for (i, filing) in ptr_filings.iter().enumerate() {
        if i > 0 && !config.detail_delay.is_zero() {
            sleep(config.detail_delay).await;
        }
        match fetch_filing_trades(&session, filing).await {
            Ok(parsed) => {
                tracing::debug!(
                    "{} trades from {} ({})",
                    parsed.len(),
                    filing.legislator_name(),
                    filing.report_url
                );
                trades.extend(parsed);
            }
            Err(e @ IngestError::Auth(_)) => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping filing {}: {}", filing.report_url, e);
                summary.filings_skipped += 1;
            }
        }
    }
    summary.trades_parsed = trades.len();

    {
        let cache = PriceCache::new(
            &*db,
            prices,
            config.price_window_days,
            config.latest_max_age_days,
            end,
        );
        let filled = enrich_trades(&mut trades, &cache).await?;
        tracing::info!("Filled {} price fields across {} trades", filled, trades.len());
    }

    summary.trades_inserted = db.upsert_trades(&trades)?;
    tracing::info!(
        "Inserted {} of {} parsed trades",
        summary.trades_inserted,
        summary.trades_parsed
    );
    Ok(summary)
}
