use std::cell::Cell;
use std::time::Duration;

use chrono::NaiveDate;
use ptrtraders_lib::{run_ingest, DailyClose, Db, IngestConfig, PriceError, PriceSource};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, day).unwrap()
}

/// Returns a flat close for every weekday in the requested range, except
/// for tickers it does not know.
struct FlatPrices {
    calls: Cell<usize>,
}

impl PriceSource for FlatPrices {
    async fn daily_closes(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>, PriceError> {
        self.calls.set(self.calls.get() + 1);
        let close = match ticker {
            "AAPL" => 240.0,
            "MSFT" => 410.0,
            _ => return Err(PriceError::NoData(ticker.to_string())),
        };
        Ok(start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| chrono::Datelike::weekday(day).number_from_monday() <= 5)
            .map(|date| DailyClose { date, close })
            .collect())
    }
}

fn link(path: &str, title: &str) -> String {
    format!(r#"<a href="{path}" target="_blank">{title}</a>"#)
}

async fn mount_portal(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search/home/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(load_fixture("landing.html"))
                .insert_header("set-cookie", "csrftoken=tok123; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/search/home/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    let listing = json!({
        "draw": 1,
        "recordsTotal": 5,
        "recordsFiltered": 5,
        "data": [
            ["John", "Boozman", "Boozman, John (Senator)",
             link("/search/view/ptr/aaa/", "Periodic Transaction Report for 01/13/2026"), "01/13/2026"],
            ["Jane", "Doe", "Doe, Jane (Senator)",
             link("/search/view/ptr/bbb/", "Periodic Transaction Report for 01/14/2026"), "01/14/2026"],
            ["Shelley M", "Capito", "Capito, Shelley M (Senator)",
             link("/search/view/paper/ccc/", "Periodic Transaction Report (Paper)"), "01/15/2026"],
            ["Jane", "Doe", "Doe, Jane (Senator)",
             link("/search/view/annual/ddd/", "Annual Report for CY 2025"), "01/16/2026"],
            ["Broken", "Row", "Row, Broken"]
        ]
    });
    Mock::given(method("POST"))
        .and(path("/search/report/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/view/ptr/aaa/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("ptr_detail.html")))
        .mount(server)
        .await;

    // Stale session: bounced back to the landing page with a 200.
    Mock::given(method("GET"))
        .and(path("/search/view/ptr/bbb/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/search/home/"))
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> IngestConfig {
    IngestConfig {
        base_url: server.uri(),
        detail_delay: Duration::ZERO,
        ..IngestConfig::default()
    }
}

#[tokio::test]
async fn ingest_is_idempotent_across_runs() {
    let mock_server = MockServer::start().await;
    mount_portal(&mock_server).await;

    let mut db = Db::open_in_memory().unwrap();
    db.init().unwrap();
    let prices = FlatPrices { calls: Cell::new(0) };
    let cfg = config(&mock_server);

    let summary = run_ingest(&cfg, &mut db, &prices, d(1, 1), d(1, 31))
        .await
        .unwrap();
    assert_eq!(summary.filings_found, 5);
    assert_eq!(summary.rows_malformed, 1);
    assert_eq!(summary.ptr_filings, 2);
    assert_eq!(summary.filings_skipped, 1);
    assert_eq!(summary.trades_parsed, 3);
    assert_eq!(summary.trades_inserted, 3);
    assert_eq!(db.count_trades().unwrap(), 3);

    let (price, current): (Option<f64>, Option<f64>) = db
        .conn()
        .query_row(
            "SELECT price_at_transaction, current_price FROM trades WHERE ticker = 'AAPL'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((price, current), (Some(240.0), Some(240.0)));

    let (brk_price, brk_current): (Option<f64>, Option<f64>) = db
        .conn()
        .query_row(
            "SELECT price_at_transaction, current_price FROM trades WHERE ticker = 'BRK.B'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((brk_price, brk_current), (None, None));

    let second = run_ingest(&cfg, &mut db, &prices, d(1, 1), d(1, 31))
        .await
        .unwrap();
    assert_eq!(second.trades_parsed, 3);
    assert_eq!(second.trades_inserted, 0);
    assert_eq!(db.count_trades().unwrap(), 3);
}

#[tokio::test]
async fn forbidden_listing_aborts_run() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/home/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("landing.html")))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search/home/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search/report/data/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let mut db = Db::open_in_memory().unwrap();
    db.init().unwrap();
    let prices = FlatPrices { calls: Cell::new(0) };

    let result = run_ingest(&config(&mock_server), &mut db, &prices, d(1, 1), d(1, 31)).await;
    assert!(matches!(result, Err(ptrtraders_lib::IngestError::Auth(_))));
    assert_eq!(db.count_trades().unwrap(), 0);
    assert_eq!(prices.calls.get(), 0);
}
