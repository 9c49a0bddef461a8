//! The `reports` subcommand: list filings for a window, no persistence.

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use clap::Args;
use ptrtraders_lib::efdsearch_api::Client;
use ptrtraders_lib::{lookback_start, search_filings, IngestConfig};

use crate::output::{print_filings_table, print_json, OutputFormat};

#[derive(Args)]
pub struct ReportsArgs {
    /// Lookback window in days, ending today
    #[arg(long, default_value = "30")]
    pub days: i64,

    /// Only show electronic Periodic Transaction Reports
    #[arg(long)]
    pub ptr_only: bool,
}

pub async fn run(args: &ReportsArgs, format: &OutputFormat) -> Result<()> {
    if args.days <= 0 {
        bail!("--days must be positive, got {}", args.days);
    }
    let config = IngestConfig::from_env();
    let end = Local::now().date_naive();
    let start = lookback_start(end, args.days)
        .ok_or_else(|| anyhow!("--days {} reaches past the earliest supported date", args.days))?;

    let session = Client::with_base_url(&config.base_url).open_session().await?;
    let search = search_filings(&session, &config, start, end).await?;

    let filings: Vec<_> = search
        .filings
        .into_iter()
        .filter(|f| !args.ptr_only || f.is_electronic_ptr())
        .collect();

    match format {
        OutputFormat::Table => print_filings_table(&filings),
        OutputFormat::Json => print_json(&filings),
    }
    eprintln!(
        "{} rows found, {} shown, {} malformed ({} to {})",
        search.rows_found,
        filings.len(),
        search.rows_malformed,
        start,
        end
    );
    Ok(())
}
