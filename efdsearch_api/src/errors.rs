//! Error types for the eFD client.

/// Errors that can occur when talking to the eFD search portal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed (network error, timeout, or client construction).
    #[error("Request failed")]
    RequestFailed,
    /// The portal returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The portal rejected the session's CSRF token or cookie (HTTP 403).
    #[error("Request rejected with status 403: session token not accepted")]
    Forbidden,
    /// The landing page no longer carries the CSRF form input.
    #[error("CSRF token not found on the landing page")]
    TokenNotFound,
    /// The terms-of-use acknowledgment POST was not accepted.
    #[error("Terms of use acknowledgment rejected with status {status}")]
    AgreementRejected { status: u16 },
    /// The listing endpoint returned a body that is not the expected JSON.
    #[error("Failed to parse response: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures that mean the session cannot be trusted for further requests.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Error::Forbidden | Error::TokenNotFound | Error::AgreementRejected { .. }
        )
    }
}
