//! Listing rows to filing metadata.

use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::markup::clean_text;

pub const SENATE: &str = "Senate";

/// Report category derived from the listing link text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "PTR")]
    Ptr,
    Annual,
    Extension,
    Other,
}

impl ReportType {
    /// Classifies by case-insensitive substring, first match wins.
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_lowercase();
        if lower.contains("periodic transaction report") {
            Self::Ptr
        } else if lower.contains("annual report") {
            Self::Annual
        } else if lower.contains("extension") {
            Self::Extension
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ptr => "PTR",
            Self::Annual => "Annual",
            Self::Extension => "Extension",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One listing search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub chamber: String,
    pub report_type: ReportType,
    /// `ptr` for electronic filings, `paper` for scanned ones.
    pub report_format: Option<String>,
    pub report_id: Option<String>,
    pub report_url: String,
    pub report_title: String,
    pub filing_date: NaiveDate,
    pub is_ptr: bool,
}

impl FilingRecord {
    pub fn legislator_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Electronic PTRs are the only filings with a transactions table.
    pub fn is_electronic_ptr(&self) -> bool {
        self.is_ptr && self.report_format.as_deref() == Some("ptr")
    }
}

/// Parses `[first_name, last_name, role_text, link_html, filed_date]`.
///
/// Relative links are resolved against `base_url`. A link path that is not
/// `/search/view/{format}/{id}/` leaves format and id empty; a missing link
/// or an unparseable filing date rejects the row.
pub fn parse_report_row(row: &[String], base_url: &str) -> Result<FilingRecord, IngestError> {
    if row.len() < 5 {
        return Err(IngestError::MalformedRow(format!(
            "expected 5 fields, got {}: {:?}",
            row.len(),
            row
        )));
    }
    let (first_name, last_name, role, link_html, filed) =
        (&row[0], &row[1], &row[2], &row[3], &row[4]);

    let (href, title) = parse_link(link_html).ok_or_else(|| {
        IngestError::MalformedRow(format!("no <a href> in link markup: {}", link_html))
    })?;

    let report_url = if href.starts_with("http://") || href.starts_with("https://") {
        href.clone()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    };

    let (report_format, report_id) = split_view_path(&href);

    let filing_date = NaiveDate::parse_from_str(filed.trim(), "%m/%d/%Y").map_err(|e| {
        IngestError::MalformedRow(format!("bad filing date {:?}: {}", filed, e))
    })?;

    let report_type = ReportType::from_title(&title);
    Ok(FilingRecord {
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        display_name: role.trim().to_string(),
        chamber: SENATE.to_string(),
        report_type,
        report_format,
        report_id,
        report_url,
        report_title: title,
        filing_date,
        is_ptr: report_type == ReportType::Ptr,
    })
}

fn parse_link(link_html: &str) -> Option<(String, String)> {
    let fragment = Html::parse_fragment(link_html);
    let selector = Selector::parse("a[href]").ok()?;
    let anchor = fragment.select(&selector).next()?;
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let title = clean_text(&anchor.text().collect::<String>());
    Some((href.to_string(), title))
}

/// Extracts `(format, id)` from a path or URL shaped `.../search/view/{format}/{id}/`.
fn split_view_path(href: &str) -> (Option<String>, Option<String>) {
    let path = match href.find("://") {
        Some(scheme_end) => {
            let rest = &href[scheme_end + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("")
        }
        None => href,
    };
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
    match parts.as_slice() {
        ["search", "view", format, id, ..] if !format.is_empty() && !id.is_empty() => {
            (Some(format.to_string()), Some(id.to_string()))
        }
        _ => (None, None),
    }
}
