use ptrtraders_lib::{FilingRecord, IngestSummary};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Tabled)]
struct FilingRow {
    #[tabled(rename = "Filed")]
    filed: String,
    #[tabled(rename = "Legislator")]
    legislator: String,
    #[tabled(rename = "Type")]
    report_type: String,
    #[tabled(rename = "Format")]
    format: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "URL")]
    url: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn build_filing_rows(filings: &[FilingRecord]) -> Vec<FilingRow> {
    filings
        .iter()
        .map(|f| FilingRow {
            filed: f.filing_date.to_string(),
            legislator: f.legislator_name(),
            report_type: f.report_type.to_string(),
            format: f.report_format.clone().unwrap_or_else(|| "-".to_string()),
            title: f.report_title.clone(),
            url: f.report_url.clone(),
        })
        .collect()
}

fn build_summary_rows(summary: &IngestSummary) -> Vec<SummaryRow> {
    let range = match (summary.start, summary.end) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        _ => "-".to_string(),
    };
    vec![
        SummaryRow { metric: "Range", value: range },
        SummaryRow { metric: "Filings found", value: summary.filings_found.to_string() },
        SummaryRow { metric: "PTR filings", value: summary.ptr_filings.to_string() },
        SummaryRow { metric: "Filings skipped", value: summary.filings_skipped.to_string() },
        SummaryRow { metric: "Malformed rows", value: summary.rows_malformed.to_string() },
        SummaryRow { metric: "Trades parsed", value: summary.trades_parsed.to_string() },
        SummaryRow { metric: "Trades inserted", value: summary.trades_inserted.to_string() },
    ]
}

// -- Table output --

pub fn print_filings_table(filings: &[FilingRecord]) {
    let mut table = Table::new(build_filing_rows(filings));
    table.with(Style::markdown());
    println!("{}", table);
}

pub fn print_summary_table(summary: &IngestSummary) {
    let mut table = Table::new(build_summary_rows(summary));
    table.with(Style::markdown());
    println!("{}", table);
}

// -- JSON output --

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}
