mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "ptrtraders")]
#[command(about = "Ingest Senate Periodic Transaction Reports into SQLite")]
struct Cli {
    /// Output format: table or json
    #[arg(long, default_value = "table", global = true)]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, parse, enrich and store PTR trades for a lookback window
    Ingest(commands::ingest::IngestArgs),
    /// List filings from the eFD search without storing anything
    Reports(commands::reports::ReportsArgs),
    /// Backfill missing prices on stored trades
    EnrichPrices(commands::enrich_prices::EnrichPricesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ptrtraders=info".parse()?)
                .add_directive("efdsearch_api=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };

    match &cli.command {
        Commands::Ingest(args) => commands::ingest::run(args, &format).await?,
        Commands::Reports(args) => commands::reports::run(args, &format).await?,
        Commands::EnrichPrices(args) => commands::enrich_prices::run(args, &format).await?,
    }

    Ok(())
}
