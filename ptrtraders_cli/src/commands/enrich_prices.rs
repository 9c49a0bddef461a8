//! The `enrich-prices` subcommand: backfill prices on stored trades.
//!
//! Resolves each missing field through the same cache the ingest run uses.
//! Lookups are memoized per (ticker, date) and per ticker, so repeated
//! tickers cost one external fetch at most. Stored prices are never
//! overwritten.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use ptrtraders_lib::{backfill_prices, IngestConfig, PriceCache, YahooPriceSource};

use crate::commands::open_store;
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct EnrichPricesArgs {
    /// SQLite database path (overrides PTR_DB)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Maximum trades to process per run (default: all)
    #[arg(long)]
    pub limit: Option<i64>,
}

pub async fn run(args: &EnrichPricesArgs, format: &OutputFormat) -> Result<()> {
    let mut config = IngestConfig::from_env();
    if let Some(path) = &args.db {
        config.db_path = path.clone();
    }

    let db = open_store(&config).await?;
    let rows = db.trades_missing_prices(args.limit)?;
    if rows.is_empty() {
        eprintln!("No trades need price enrichment");
        return Ok(());
    }
    eprintln!("Backfilling prices for {} trades", rows.len());

    let source =
        YahooPriceSource::new().map_err(|e| anyhow!("Failed to create Yahoo client: {}", e))?;
    let today = Local::now().date_naive();
    let cache = PriceCache::new(
        &db,
        &source,
        config.price_window_days,
        config.latest_max_age_days,
        today,
    );

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({eta}) {msg}",
    )?);
    pb.set_message("fetching prices...");

    let summary = backfill_prices(&db, &cache, &rows, |progress| {
        pb.set_message(format!(
            "{} updated, {} unresolved",
            progress.updated, progress.unresolved
        ));
        pb.inc(1);
    })
    .await?;
    pb.finish_with_message(format!(
        "done: {} updated, {} unresolved",
        summary.updated, summary.unresolved
    ));

    if let OutputFormat::Json = format {
        print_json(&summary);
    }
    eprintln!(
        "Price backfill complete: {} trades updated ({} transaction prices, {} current prices), {} unresolved",
        summary.updated, summary.transaction_prices, summary.current_prices, summary.unresolved
    );
    Ok(())
}
