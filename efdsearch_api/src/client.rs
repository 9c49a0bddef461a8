//! Entry point for talking to the eFD search portal.

use crate::{Error, Session};

const DEFAULT_BASE_URL: &str = "https://efdsearch.senate.gov";

/// Client for the Senate eFD search portal.
///
/// The portal gates every search behind a terms-of-use acknowledgment, so
/// the client itself only carries the base URL; all requests go through a
/// [`Session`] opened from it.
pub struct Client {
    /// Base URL for the portal. Defaults to `https://efdsearch.senate.gov`.
    base_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a new client pointing at the production eFD portal.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Opens a fresh authenticated session.
    pub async fn open_session(&self) -> Result<Session, Error> {
        Session::open(&self.base_url).await
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = Client::with_base_url("http://127.0.0.1:8080/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
        assert_eq!(Client::new().base_url(), "https://efdsearch.senate.gov");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let short = "short body";
        assert_eq!(truncate_body(short), short);

        let long = "é".repeat(1500);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.len() < long.len());
    }
}
