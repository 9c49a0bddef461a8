//! CLI subcommand implementations.

pub mod enrich_prices;
pub mod ingest;
pub mod reports;

use anyhow::Result;
use ptrtraders_lib::{with_store_retry, Db, IngestConfig};

/// Opens and initializes the store, retrying transient connection failures.
pub(crate) async fn open_store(config: &IngestConfig) -> Result<Db> {
    let db = with_store_retry(&config.store_retry, || {
        let db = Db::open(&config.db_path)?;
        db.init()?;
        Ok(db)
    })
    .await?;
    Ok(db)
}
