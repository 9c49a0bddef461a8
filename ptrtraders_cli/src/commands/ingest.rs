//! The `ingest` subcommand: run the full pipeline over a lookback window.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use clap::Args;
use ptrtraders_lib::{lookback_start, run_ingest, IngestConfig, YahooPriceSource};

use crate::commands::open_store;
use crate::output::{print_json, print_summary_table, OutputFormat};

#[derive(Args)]
pub struct IngestArgs {
    /// Lookback window in days, ending today
    #[arg(long, default_value = "90")]
    pub days: i64,

    /// SQLite database path (overrides PTR_DB)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub async fn run(args: &IngestArgs, format: &OutputFormat) -> Result<()> {
    if args.days <= 0 {
        bail!("--days must be positive, got {}", args.days);
    }
    let mut config = IngestConfig::from_env();
    if let Some(path) = &args.db {
        config.db_path = path.clone();
    }

    let end = Local::now().date_naive();
    let start = lookback_start(end, args.days)
        .ok_or_else(|| anyhow!("--days {} reaches past the earliest supported date", args.days))?;
    eprintln!(
        "Ingesting filings {} to {} into {}",
        start,
        end,
        config.db_path.display()
    );

    let mut db = open_store(&config).await?;
    let prices =
        YahooPriceSource::new().map_err(|e| anyhow!("Failed to create Yahoo client: {}", e))?;

    let summary = run_ingest(&config, &mut db, &prices, start, end).await?;

    match format {
        OutputFormat::Table => print_summary_table(&summary),
        OutputFormat::Json => print_json(&summary),
    }
    eprintln!(
        "Ingest complete: {} new trades of {} parsed",
        summary.trades_inserted, summary.trades_parsed
    );
    Ok(())
}
