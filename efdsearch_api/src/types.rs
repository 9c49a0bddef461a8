//! Wire types returned by the eFD portal.

use serde::{Deserialize, Serialize};

/// One listing row: `[first_name, last_name, role_text, link_html, filed_date]`.
pub type RawReportRow = Vec<String>;

/// One page of the DataTables-style listing response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSearchPage {
    #[serde(default)]
    pub records_total: Option<usize>,
    #[serde(default)]
    pub records_filtered: Option<usize>,
    #[serde(default)]
    pub data: Vec<RawReportRow>,
}

/// All pages of a listing query, accumulated in source order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSearchResult {
    pub records_total: usize,
    pub records_filtered: usize,
    pub rows: Vec<RawReportRow>,
    /// Number of listing requests issued.
    pub pages_fetched: usize,
}

/// A fetched HTML page after redirects were followed.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    /// URL of the last hop, used to spot redirects back to the landing page.
    pub final_url: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_listing_page() {
        let body = r#"{
            "draw": 1,
            "recordsTotal": 2,
            "recordsFiltered": 2,
            "data": [
                ["John", "Boozman", "Boozman, John (Senator)",
                 "<a href=\"/search/view/ptr/abc/\" target=\"_blank\">Periodic Transaction Report for 01/13/2026</a>",
                 "01/13/2026"],
                ["Jane", "Doe", "Doe, Jane (Senator)",
                 "<a href=\"/search/view/annual/def/\">Annual Report for CY 2025</a>",
                 "01/14/2026"]
            ],
            "result": "ok"
        }"#;
        let page: ReportSearchPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.records_total, Some(2));
        assert_eq!(page.records_filtered, Some(2));
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0][1], "Boozman");
    }

    #[test]
    fn deserialize_missing_counts() {
        let page: ReportSearchPage = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert_eq!(page.records_total, None);
        assert_eq!(page.records_filtered, None);
        assert!(page.data.is_empty());
    }
}
