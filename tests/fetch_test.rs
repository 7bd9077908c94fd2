//! Listing fetches against a local HTTP server

use chrono::NaiveDate;
use class_action_finder::config::Config;
use class_action_finder::eligibility::{Lexicon, ProofClassifier};
use class_action_finder::finder::{Finder, SourceStatus};
use class_action_finder::scrapers::{build_client, ClaimDepot, LawsuitUpdateCenter, SourceAdapter, TopClassActions};
use class_action_finder::FinderError;
use reqwest::Client;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

#[derive(Clone)]
enum Route {
    Page(String),
    Status(u16, &'static str),
    Redirect(&'static str),
    /// Accept the connection and never answer
    Hang,
}

async fn serve(routes: Vec<(&'static str, Route)>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<HashMap<String, Route>> =
        Arc::new(routes.into_iter().map(|(path, route)| (path.to_string(), route)).collect());

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move { handle(stream, &routes).await });
        }
    });
    addr
}

async fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

    let response = match routes.get(&path) {
        Some(Route::Page(body)) => reply("200 OK", "Content-Type: text/html; charset=utf-8\r\n", body),
        Some(Route::Status(code, reason)) => reply(&format!("{} {}", code, reason), "", ""),
        Some(Route::Redirect(to)) => reply("302 Found", &format!("Location: {}\r\n", to), ""),
        Some(Route::Hang) => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            return;
        }
        None => reply("404 Not Found", "", ""),
    };

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn reply(status: &str, headers: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        headers,
        body.len(),
        body
    )
}

fn client(timeout: Duration) -> Client {
    // Local server; keep any ambient proxy out of the way
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    build_client(timeout).unwrap()
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path)).unwrap()
}

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{}", name)).expect("Failed to read fixture")
}

#[tokio::test]
async fn test_extract_reads_served_listing() {
    let addr = serve(vec![("/settlements", Route::Page(fixture("claim_depot.html")))]).await;
    let adapter = ClaimDepot::new(url(addr, "/settlements"));

    let harvest = adapter.extract(&client(Duration::from_secs(5))).await.unwrap();
    assert_eq!(harvest.candidates.len(), 3);
    assert_eq!(harvest.skipped, 1);

    let echo = harvest
        .candidates
        .iter()
        .find(|c| c.settlement.title.starts_with("Echo"))
        .unwrap();
    assert_eq!(echo.settlement.claim_url, url(addr, "/settlements/echo-airline"));
}

#[tokio::test]
async fn test_error_status_is_unavailable() {
    let addr = serve(vec![("/list", Route::Status(503, "Service Unavailable"))]).await;
    let adapter = LawsuitUpdateCenter::new(url(addr, "/list"));

    let err = adapter.extract(&client(Duration::from_secs(5))).await.unwrap_err();
    match err {
        FinderError::SourceUnavailable { reason, .. } => assert_eq!(reason, "HTTP 503 (server error)"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_hung_source_is_cut_off_by_timeout() {
    let addr = serve(vec![("/list", Route::Hang)]).await;
    let adapter = ClaimDepot::new(url(addr, "/list"));

    let started = std::time::Instant::now();
    let err = adapter.extract(&client(Duration::from_millis(300))).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    match err {
        FinderError::SourceUnavailable { reason, .. } => assert!(reason.starts_with("timeout"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_relative_links_resolve_against_redirect_target() {
    let page = r#"
        <article class="settlement-card">
          <h2 class="settlement-title">Acme Cereal Settlement</h2>
          <div class="settlement-description">No proof required.</div>
          <a class="settlement-link" href="acme-cereal/">Read more</a>
        </article>"#;
    let addr = serve(vec![
        ("/old", Route::Redirect("/open-settlements/")),
        ("/open-settlements/", Route::Page(page.to_string())),
    ])
    .await;
    let adapter = TopClassActions::new(url(addr, "/old"));

    let harvest = adapter.extract(&client(Duration::from_secs(5))).await.unwrap();
    assert_eq!(harvest.candidates.len(), 1);
    assert_eq!(
        harvest.candidates[0].settlement.claim_url,
        url(addr, "/open-settlements/acme-cereal/")
    );
}

#[tokio::test]
async fn test_run_reports_each_live_source() {
    let addr = serve(vec![
        ("/tca", Route::Page(fixture("top_class_actions.html"))),
        ("/luc", Route::Status(503, "Service Unavailable")),
        ("/cd", Route::Hang),
    ])
    .await;
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(TopClassActions::new(url(addr, "/tca"))),
        Arc::new(LawsuitUpdateCenter::new(url(addr, "/luc"))),
        Arc::new(ClaimDepot::new(url(addr, "/cd"))),
    ];

    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path());
    let classifier = ProofClassifier::new(&Lexicon::builtin()).unwrap();
    let finder = Finder::new(adapters, classifier, client(Duration::from_millis(500)), &config);

    let outcome = finder
        .run_on(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap())
        .await
        .unwrap();

    let titles: Vec<&str> = outcome.new_records.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Acme Cereal False Advertising Settlement", "Sunny Juice Labeling Settlement"]
    );

    let sources = &outcome.stats.sources;
    assert_eq!(sources[0].status, SourceStatus::Ok);
    assert_eq!(sources[0].found, 4);
    assert_eq!(sources[1].status, SourceStatus::Unavailable("HTTP 503 (server error)".to_string()));
    assert!(matches!(&sources[2].status, SourceStatus::Unavailable(r) if r.starts_with("timeout")));
    assert!(config.store_path.exists());
}
