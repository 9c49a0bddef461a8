use chrono::NaiveDate;
use efdsearch_api::{search_all_reports, Client, Error, ReportSearchQuery};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

async fn mount_landing(server: &MockServer, set_cookie: Option<&str>) {
    let mut template = ResponseTemplate::new(200)
        .set_body_string(load_fixture("landing.html"))
        .insert_header("content-type", "text/html; charset=utf-8");
    if let Some(cookie) = set_cookie {
        template = template.insert_header("set-cookie", cookie);
    }
    Mock::given(method("GET"))
        .and(path("/search/home/"))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn mount_agreement(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/search/home/"))
        .and(body_string_contains("csrfmiddlewaretoken=tok123"))
        .and(body_string_contains("prohibition_agreement=1"))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

fn query() -> ReportSearchQuery {
    ReportSearchQuery::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
        .with_end_date(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
}

#[tokio::test]
async fn session_echoes_cookie_token_on_search() {
    let mock_server = MockServer::start().await;
    mount_landing(&mock_server, Some("csrftoken=cookietok; Path=/")).await;
    mount_agreement(&mock_server, 200).await;

    Mock::given(method("POST"))
        .and(path("/search/report/data/"))
        .and(header("x-csrftoken", "cookietok"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(body_string_contains("submitted_start_date=01%2F01%2F2026+00%3A00%3A00"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("listing.json")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let session = client.open_session().await.unwrap();
    assert_eq!(session.csrf_token(), "cookietok");

    let result = search_all_reports(&session, &query()).await.unwrap();
    assert_eq!(result.records_filtered, 2);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.pages_fetched, 1);
    assert_eq!(result.rows[0][1], "Boozman");
}

#[tokio::test]
async fn form_token_used_without_cookie() {
    let mock_server = MockServer::start().await;
    mount_landing(&mock_server, None).await;
    mount_agreement(&mock_server, 200).await;

    Mock::given(method("POST"))
        .and(path("/search/report/data/"))
        .and(header("x-csrftoken", "tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("listing.json")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let session = client.open_session().await.unwrap();
    let page = session.search_page(&query()).await.unwrap();
    assert_eq!(page.data.len(), 2);
}

#[tokio::test]
async fn missing_token_fails_bootstrap() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/home/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Down for maintenance</body></html>"),
        )
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let result = client.open_session().await;
    assert!(matches!(result, Err(Error::TokenNotFound)));
}

#[tokio::test]
async fn rejected_agreement_fails_bootstrap() {
    let mock_server = MockServer::start().await;
    mount_landing(&mock_server, Some("csrftoken=tok123; Path=/")).await;
    mount_agreement(&mock_server, 400).await;

    let client = Client::with_base_url(&mock_server.uri());
    let err = client.open_session().await.err().unwrap();
    assert!(matches!(err, Error::AgreementRejected { status: 400 }));
    assert!(err.is_auth());
}

#[tokio::test]
async fn search_forbidden_is_auth_error() {
    let mock_server = MockServer::start().await;
    mount_landing(&mock_server, Some("csrftoken=tok123; Path=/")).await;
    mount_agreement(&mock_server, 200).await;

    Mock::given(method("POST"))
        .and(path("/search/report/data/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("CSRF verification failed"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let session = client.open_session().await.unwrap();
    let err = search_all_reports(&session, &query()).await.err().unwrap();
    assert!(matches!(err, Error::Forbidden));
    assert!(err.is_auth());
}

#[tokio::test]
async fn search_server_error_keeps_snippet() {
    let mock_server = MockServer::start().await;
    mount_landing(&mock_server, Some("csrftoken=tok123; Path=/")).await;
    mount_agreement(&mock_server, 200).await;

    Mock::given(method("POST"))
        .and(path("/search/report/data/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let session = client.open_session().await.unwrap();
    match session.search_page(&query()).await {
        Err(Error::HttpStatus { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, "Bad Gateway");
        }
        other => panic!("expected HttpStatus, got {:?}", other.map(|p| p.data.len())),
    }
}

#[tokio::test]
async fn fetch_page_reports_redirect_target() {
    let mock_server = MockServer::start().await;
    mount_landing(&mock_server, Some("csrftoken=tok123; Path=/")).await;
    mount_agreement(&mock_server, 200).await;

    Mock::given(method("GET"))
        .and(path("/search/view/ptr/abc/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/search/home/"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let session = client.open_session().await.unwrap();
    let page = session
        .fetch_page(&format!("{}/search/view/ptr/abc/", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(page.status, 200);
    assert!(page.final_url.ends_with("/search/home/"));
    assert!(page.body.contains("prohibition_agreement"));
}
