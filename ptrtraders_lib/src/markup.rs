//! Detail page markup: session-redirect detection, transactions table
//! location, and row extraction.
//!
//! Every assumption about the portal's HTML lives here and is pinned by the
//! fixture documents under `tests/fixtures/`.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::error::IngestError;
use crate::normalize::{normalize_transaction_type, parse_amount_range};
use crate::report::FilingRecord;
use crate::trade::TradeRecord;

const MIN_CELLS: usize = 9;
const PLACEHOLDER_TICKERS: [&str; 3] = ["", "-", "--"];
const AGREEMENT_MARKER: &str = "prohibition_agreement";

/// What a fetched detail page turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    /// A report view for an authenticated session.
    Authenticated,
    /// The landing or search page, served with HTTP 200 to a stale session.
    Redirected,
    /// Neither marker matched.
    Unknown,
}

/// Collapses runs of whitespace to single spaces and trims.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &str, url: &str) -> Result<Selector, IngestError> {
    Selector::parse(css).map_err(|e| IngestError::TableNotFound {
        url: url.to_string(),
        reason: format!("invalid selector {css}: {e}"),
    })
}

/// Classifies a detail page by its final URL and markup.
pub fn classify_detail_page(final_url: &str, html: &str) -> PageClass {
    PtrDocument::parse(html).classify(final_url)
}

/// A parsed PTR detail page.
pub struct PtrDocument {
    html: Html,
}

impl PtrDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn title(&self) -> Option<String> {
        let sel = Selector::parse("title").ok()?;
        self.html
            .select(&sel)
            .next()
            .map(|t| clean_text(&t.text().collect::<String>()))
    }

    pub fn classify(&self, final_url: &str) -> PageClass {
        let path = url_path(final_url);
        if path == "/search/home/" || path == "/search/home" || path == "/search/" || path == "/search"
        {
            return PageClass::Redirected;
        }
        if self.has_agreement_form() {
            return PageClass::Redirected;
        }
        if self.captioned_table().is_some() || path.starts_with("/search/view/") {
            return PageClass::Authenticated;
        }
        PageClass::Unknown
    }

    fn has_agreement_form(&self) -> bool {
        self.html.html().contains(AGREEMENT_MARKER)
    }

    fn captioned_table(&self) -> Option<ElementRef<'_>> {
        let tables = Selector::parse("table").ok()?;
        let caption = Selector::parse("caption").ok()?;
        self.html.select(&tables).find(|table| {
            table.select(&caption).next().is_some_and(|c| {
                c.text()
                    .collect::<String>()
                    .to_lowercase()
                    .contains("transaction")
            })
        })
    }

    /// The table whose caption mentions transactions, else the first
    /// `table.table`.
    pub fn transactions_table(&self, url: &str) -> Result<ElementRef<'_>, IngestError> {
        if let Some(table) = self.captioned_table() {
            return Ok(table);
        }
        let fallback = selector("table.table", url)?;
        self.html
            .select(&fallback)
            .next()
            .ok_or_else(|| IngestError::TableNotFound {
                url: url.to_string(),
                reason: "no captioned or default-class table".to_string(),
            })
    }

    /// Parses every usable transaction row for `filing`.
    ///
    /// Rows with fewer than nine cells and rows whose ticker is a
    /// placeholder are dropped. An unparseable transaction date becomes
    /// `None` without dropping the row.
    pub fn parse_trades(&self, filing: &FilingRecord) -> Result<Vec<TradeRecord>, IngestError> {
        let table = self.transactions_table(&filing.report_url)?;
        let rows = selector("tbody > tr", &filing.report_url)?;
        let link = selector("a", &filing.report_url)?;

        let mut trades = Vec::new();
        for tr in table.select(&rows) {
            let cells: Vec<ElementRef<'_>> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "td")
                .collect();
            if cells.len() < MIN_CELLS {
                tracing::debug!("Skipping row with {} cells in {}", cells.len(), filing.report_url);
                continue;
            }

            let ticker = match cells[3].select(&link).next() {
                Some(a) => cell_text(a),
                None => cell_text(cells[3]),
            };
            if PLACEHOLDER_TICKERS.contains(&ticker.as_str()) {
                continue;
            }

            let date_raw = cell_text(cells[1]);
            let transaction_date = NaiveDate::parse_from_str(&date_raw, "%m/%d/%Y").ok();
            if transaction_date.is_none() {
                tracing::debug!("Unparseable transaction date {:?} for {}", date_raw, ticker);
            }

            let transaction_type_raw = cell_text(cells[6]);
            let amount_range_raw = non_empty(cell_text(cells[7]));
            let amount = amount_range_raw
                .as_deref()
                .map(parse_amount_range)
                .unwrap_or_default();
            let comment = match cell_text(cells[8]) {
                c if c.is_empty() || c == "--" => None,
                c => Some(c),
            };

            trades.push(TradeRecord {
                legislator_name: filing.legislator_name(),
                first_name: filing.first_name.clone(),
                last_name: filing.last_name.clone(),
                display_name: filing.display_name.clone(),
                chamber: filing.chamber.clone(),
                report_id: filing.report_id.clone(),
                report_type: filing.report_type,
                report_format: filing.report_format.clone(),
                report_url: filing.report_url.clone(),
                filing_date: filing.filing_date,
                transaction_date,
                owner: non_empty(cell_text(cells[2])),
                ticker,
                asset_name: non_empty(cell_text(cells[4])),
                asset_type: non_empty(cell_text(cells[5])),
                transaction_type: normalize_transaction_type(&transaction_type_raw),
                transaction_type_raw,
                amount_range_raw,
                amount_min: amount.min,
                amount_max: amount.max,
                amount_midpoint: amount.midpoint,
                comment,
                price_at_transaction: None,
                current_price: None,
            });
        }
        Ok(trades)
    }
}

fn cell_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn url_path(url: &str) -> &str {
    let without_scheme = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => return url.split(['?', '#']).next().unwrap_or(url),
    };
    let path = without_scheme
        .find('/')
        .map(|i| &without_scheme[i..])
        .unwrap_or("/");
    path.split(['?', '#']).next().unwrap_or(path)
}
