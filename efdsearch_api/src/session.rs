//! Authenticated, cookie-bearing session against the eFD portal.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::StatusCode;
use scraper::{Html, Selector};
use url::Url;

use crate::client::truncate_body;
use crate::search::ReportSearchQuery;
use crate::types::{FetchedPage, ReportSearchPage};
use crate::user_agent::get_user_agent;
use crate::Error;

pub(crate) const HOME_PATH: &str = "/search/home/";
pub(crate) const SEARCH_PATH: &str = "/search/";
pub(crate) const REPORT_DATA_PATH: &str = "/search/report/data/";

const CSRF_COOKIE: &str = "csrftoken";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An eFD session that has passed the terms-of-use gate.
///
/// Holds the cookie jar shared with the HTTP client so the CSRF cookie the
/// portal sets can be echoed back as the `x-csrftoken` header on listing
/// requests. A session is meant to be used sequentially; the portal scopes
/// its token to the cookie pair.
pub struct Session {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    /// Token from the landing page form, used if the cookie is unavailable.
    form_token: String,
}

impl Session {
    /// Bootstraps a session: loads the landing page, extracts the CSRF form
    /// token, and posts the acknowledgment that unlocks search.
    ///
    /// No retry happens here; callers decide whether to open a new session.
    pub async fn open(base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url).map_err(|e| {
            tracing::error!("Invalid base URL {}: {}", base_url, e);
            Error::RequestFailed
        })?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .cookie_provider(Arc::clone(&jar))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;

        let home_url = join(&base_url, HOME_PATH)?;
        let landing = http
            .get(home_url.clone())
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "en-US,en;q=0.9")
            .header("referer", home_url.as_str())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to load landing page: {}", e);
                Error::RequestFailed
            })?;
        let status = landing.status();
        let body = landing.text().await.map_err(|e| {
            tracing::error!("Failed to read landing page body: {}", e);
            Error::RequestFailed
        })?;
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let form_token = extract_csrf_token(&body).ok_or_else(|| {
            tracing::error!("Landing page has no csrfmiddlewaretoken input");
            Error::TokenNotFound
        })?;

        let resp = http
            .post(home_url.clone())
            .header("referer", home_url.as_str())
            .form(&[
                ("csrfmiddlewaretoken", form_token.as_str()),
                ("prohibition_agreement", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to post acknowledgment: {}", e);
                Error::RequestFailed
            })?;
        if !resp.status().is_success() {
            tracing::error!("Acknowledgment rejected with status {}", resp.status());
            return Err(Error::AgreementRejected {
                status: resp.status().as_u16(),
            });
        }

        tracing::debug!("eFD session established against {}", base_url);
        Ok(Self {
            http,
            jar,
            base_url,
            form_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The CSRF token to send as `x-csrftoken`: the cookie value when the
    /// portal has set one, otherwise the landing page form token.
    pub fn csrf_token(&self) -> String {
        self.jar
            .cookies(&self.base_url)
            .and_then(|header| header.to_str().ok().map(str::to_string))
            .and_then(|cookies| cookie_value(&cookies, CSRF_COOKIE))
            .unwrap_or_else(|| self.form_token.clone())
    }

    /// Issues one listing request.
    pub async fn search_page(&self, query: &ReportSearchQuery) -> Result<ReportSearchPage, Error> {
        let url = join(&self.base_url, REPORT_DATA_PATH)?;
        let referer = join(&self.base_url, SEARCH_PATH)?;
        let resp = self
            .http
            .post(url)
            .header("accept", "application/json, text/javascript, */*; q=0.01")
            .header("accept-language", "en-US,en;q=0.9")
            .header("x-csrftoken", self.csrf_token())
            .header("x-requested-with", "XMLHttpRequest")
            .header("referer", referer.as_str())
            .header("sec-fetch-dest", "empty")
            .header("sec-fetch-mode", "cors")
            .header("sec-fetch-site", "same-origin")
            .form(&query.to_form())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch report listing: {}", e);
                Error::RequestFailed
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read listing body: {}", e);
            Error::RequestFailed
        })?;

        if status == StatusCode::FORBIDDEN {
            tracing::error!("Listing request returned 403; CSRF header does not match session");
            return Err(Error::Forbidden);
        }
        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Listing request failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                "Failed to parse listing: {} | body: {}",
                e,
                truncate_body(&body)
            );
            Error::Json(e)
        })
    }

    /// Fetches an HTML page through the session, following redirects.
    ///
    /// A 200 here does not prove the page is the one requested; the portal
    /// answers stale sessions with its landing page. Callers inspect
    /// `final_url` and the body.
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, Error> {
        let resp = self
            .http
            .get(url)
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "en-US,en;q=0.9")
            .header("referer", join(&self.base_url, SEARCH_PATH)?.as_str())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch {}: {}", url, e);
                Error::RequestFailed
            })?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read body of {}: {}", url, e);
            Error::RequestFailed
        })?;
        tracing::debug!("GET {} -> {} (final url {})", url, status, final_url);

        if status == StatusCode::FORBIDDEN {
            return Err(Error::Forbidden);
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(FetchedPage {
            status: status.as_u16(),
            final_url,
            body,
        })
    }
}

fn join(base: &Url, path: &str) -> Result<Url, Error> {
    base.join(path).map_err(|e| {
        tracing::error!("Invalid URL constructed from {}{}: {}", base, path, e);
        Error::RequestFailed
    })
}

pub(crate) fn extract_csrf_token(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(r#"input[name="csrfmiddlewaretoken"]"#).ok()?;
    doc.select(&selector)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
