//! Error taxonomy for an ingestion run.

use crate::db::DbError;
use crate::prices::PriceError;

/// Errors produced while ingesting filings.
///
/// `Auth`, `TransientStore`, `Store` and `Request` end the run.
/// `MalformedRow` and `TableNotFound` are scoped to one listing row or one
/// filing and are logged and skipped by the pipeline. `PriceLookup` is only
/// ever recorded as a missing price.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    /// The portal rejected the session or its CSRF token.
    #[error("authentication failed: {0}")]
    Auth(#[source] efdsearch_api::Error),
    /// A non-auth request failure against the portal.
    #[error("request failed: {0}")]
    Request(#[source] efdsearch_api::Error),
    #[error("malformed report row: {0}")]
    MalformedRow(String),
    #[error("no transactions table at {url}: {reason}")]
    TableNotFound { url: String, reason: String },
    /// The store could not be reached after the retry ceiling.
    #[error("store unavailable after {attempts} attempts: {source}")]
    TransientStore {
        attempts: usize,
        #[source]
        source: DbError,
    },
    #[error("store error: {0}")]
    Store(#[from] DbError),
    #[error("price lookup failed: {0}")]
    PriceLookup(#[from] PriceError),
}

impl From<efdsearch_api::Error> for IngestError {
    fn from(e: efdsearch_api::Error) -> Self {
        if e.is_auth() {
            Self::Auth(e)
        } else {
            Self::Request(e)
        }
    }
}

impl IngestError {
    /// True when the pipeline should skip the current row, filing or price and keep going.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::MalformedRow(_) | Self::TableNotFound { .. } | Self::PriceLookup(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_split_by_auth() {
        let auth: IngestError = efdsearch_api::Error::Forbidden.into();
        assert!(matches!(auth, IngestError::Auth(_)));
        assert!(!auth.is_skippable());

        let other: IngestError = efdsearch_api::Error::RequestFailed.into();
        assert!(matches!(other, IngestError::Request(_)));
    }

    #[test]
    fn row_and_filing_errors_are_skippable() {
        assert!(IngestError::MalformedRow("short row".into()).is_skippable());
        let missing = IngestError::TableNotFound {
            url: "https://efdsearch.senate.gov/search/view/ptr/x/".into(),
            reason: "landing page".into(),
        };
        assert!(missing.is_skippable());
        assert!(missing.to_string().contains("landing page"));
    }

    #[test]
    fn price_failures_never_end_the_run() {
        let limited: IngestError = PriceError::RateLimited.into();
        assert!(matches!(limited, IngestError::PriceLookup(PriceError::RateLimited)));
        assert!(limited.is_skippable());
        assert!(limited.to_string().starts_with("price lookup failed"));
    }
}
