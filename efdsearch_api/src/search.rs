//! Filing search: DataTables form payload and the paginated listing loop.

use chrono::NaiveDate;

use crate::types::{ReportSearchPage, ReportSearchResult};
use crate::{Error, Session};

pub const DEFAULT_PAGE_SIZE: usize = 100;
const COLUMN_COUNT: usize = 5;

/// A submitted-date range query against the report listing endpoint.
///
/// Serialized as the form body the portal's DataTables widget posts: fixed
/// column descriptors, sort by last name then first name, and the filters.
#[derive(Debug, Clone)]
pub struct ReportSearchQuery {
    pub submitted_start: NaiveDate,
    pub submitted_end: Option<NaiveDate>,
    pub first_name: String,
    pub last_name: String,
    /// Row offset of the page to fetch.
    pub start: usize,
    /// Page length.
    pub length: usize,
}

impl ReportSearchQuery {
    pub fn new(submitted_start: NaiveDate) -> Self {
        Self {
            submitted_start,
            submitted_end: None,
            first_name: String::new(),
            last_name: String::new(),
            start: 0,
            length: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_end_date(mut self, end: NaiveDate) -> Self {
        self.submitted_end = Some(end);
        self
    }

    pub fn with_first_name(mut self, first_name: &str) -> Self {
        self.first_name = first_name.to_string();
        self
    }

    pub fn with_last_name(mut self, last_name: &str) -> Self {
        self.last_name = last_name.to_string();
        self
    }

    /// Sets the page length. Zero is bumped to one so pagination always advances.
    pub fn with_page_size(mut self, length: usize) -> Self {
        self.length = length.max(1);
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Form fields for the listing POST, in the order the browser sends them.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = Vec::with_capacity(64);
        let mut push = |k: &str, v: &str| form.push((k.to_string(), v.to_string()));

        push("draw", "1");
        for i in 0..COLUMN_COUNT {
            let idx = i.to_string();
            push(&format!("columns[{i}][data]"), &idx);
            push(&format!("columns[{i}][name]"), "");
            push(&format!("columns[{i}][searchable]"), "true");
            push(&format!("columns[{i}][orderable]"), "true");
            push(&format!("columns[{i}][search][value]"), "");
            push(&format!("columns[{i}][search][regex]"), "false");
        }
        push("order[0][column]", "1");
        push("order[0][dir]", "asc");
        push("order[1][column]", "0");
        push("order[1][dir]", "asc");
        push("search[value]", "");
        push("search[regex]", "false");
        push("report_types", "[]");
        push("filer_types", "[]");
        push("candidate_state", "");
        push("senator_state", "");
        push("office_id", "");
        push("start", &self.start.to_string());
        push("length", &self.length.to_string());
        push(
            "submitted_start_date",
            &format_query_date(self.submitted_start),
        );
        let end = self.submitted_end.map(format_query_date).unwrap_or_default();
        push("submitted_end_date", &end);
        push("first_name", &self.first_name);
        push("last_name", &self.last_name);
        form
    }
}

fn format_query_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y 00:00:00").to_string()
}

/// Anything that can return one page of the report listing.
///
/// [`Session`] is the real implementation; tests substitute fakes.
#[allow(async_fn_in_trait)]
pub trait ReportPageSource {
    async fn fetch_report_page(&self, query: &ReportSearchQuery) -> Result<ReportSearchPage, Error>;
}

impl ReportPageSource for Session {
    async fn fetch_report_page(&self, query: &ReportSearchQuery) -> Result<ReportSearchPage, Error> {
        self.search_page(query).await
    }
}

/// Fetches every page of a listing query.
///
/// Stops once the accumulated row count reaches `recordsFiltered`, or at the
/// first empty page, since the portal sometimes over-reports its own total.
/// Rows are returned in source order.
pub async fn search_all_reports<S: ReportPageSource>(
    source: &S,
    query: &ReportSearchQuery,
) -> Result<ReportSearchResult, Error> {
    let mut page_query = query.clone().with_start(0);
    let first = source.fetch_report_page(&page_query).await?;
    let mut pages_fetched = 1;

    let mut rows = first.data;
    let records_filtered = first.records_filtered.unwrap_or(rows.len());
    let records_total = first.records_total.unwrap_or(records_filtered);
    tracing::debug!(
        "Listing page 1: {} rows of {} filtered",
        rows.len(),
        records_filtered
    );

    while rows.len() < records_filtered {
        page_query.start += page_query.length;
        let page = source.fetch_report_page(&page_query).await?;
        pages_fetched += 1;
        if page.data.is_empty() {
            tracing::warn!(
                "Listing ended early at offset {} with {} of {} rows",
                page_query.start,
                rows.len(),
                records_filtered
            );
            break;
        }
        tracing::debug!(
            "Listing page {}: {} rows at offset {}",
            pages_fetched,
            page.data.len(),
            page_query.start
        );
        rows.extend(page.data);
    }

    Ok(ReportSearchResult {
        records_total,
        records_filtered,
        rows,
        pages_fetched,
    })
}
