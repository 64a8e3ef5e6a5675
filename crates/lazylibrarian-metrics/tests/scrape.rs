use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use lazylibrarian_client::{ApiClient, TargetConfig};
use lazylibrarian_metrics::{ExporterState, exporter_router};
use tower::ServiceExt;

type Replies = Arc<Mutex<HashMap<String, (StatusCode, String)>>>;

/// Stand-in for a LazyLibrarian instance, answering per `cmd`.
struct StubLibrarian {
    replies: Replies,
}

impl StubLibrarian {
    async fn start() -> (Self, String) {
        let replies: Replies = Arc::default();
        let app = Router::new()
            .route("/api", get(stub_api))
            .with_state(Arc::clone(&replies));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let stub = Self { replies };
        stub.reply("getVersion", StatusCode::OK, r#"{"current_version": "1.7.2"}"#);
        (stub, format!("http://{addr}/api"))
    }

    fn reply(&self, cmd: &str, status: StatusCode, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(cmd.to_string(), (status, body.to_string()));
    }

    fn happy_path(&self) {
        self.reply("getSnatched", StatusCode::OK, r#"{"snatched": ["a", "b", "c"]}"#);
        self.reply("getWanted", StatusCode::OK, r#"{"books": ["x", "y"]}"#);
        self.reply(
            "getStats",
            StatusCode::OK,
            r#"{"stats": {"total_books": 1000, "have": 800}}"#,
        );
        self.reply("getJobs", StatusCode::OK, r#"{"jobs": ["j1"]}"#);
    }
}

async fn stub_api(
    State(replies): State<Replies>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("apikey").map(String::as_str) != Some("test-key") {
        return (StatusCode::UNAUTHORIZED, "{}").into_response();
    }

    let reply = params
        .get("cmd")
        .and_then(|cmd| replies.lock().unwrap().get(cmd).cloned());
    match reply {
        Some((status, body)) => (status, body).into_response(),
        None => (StatusCode::NOT_FOUND, "{}").into_response(),
    }
}

fn exporter(base_url: &str, metrics_path: &str) -> Router {
    let client = ApiClient::new(TargetConfig::new(base_url, "test-key")).unwrap();
    let state = ExporterState::new(Arc::new(client), metrics_path).unwrap();
    exporter_router(Arc::new(state))
}

async fn get_body(app: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn scrape(app: &Router) -> String {
    let (status, _, body) = get_body(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn sample(body: &str, series: &str) -> Option<f64> {
    body.lines()
        .find_map(|line| line.strip_prefix(series)?.strip_prefix(' '))
        .and_then(|value| value.parse().ok())
}

#[tokio::test]
async fn healthy_target_populates_every_metric() {
    let (stub, base_url) = StubLibrarian::start().await;
    stub.happy_path();
    let app = exporter(&base_url, "/metrics");

    let (status, content_type, body) = get_body(&app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content_type.as_deref(),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );
    assert_eq!(sample(&body, "lazylibrarian_up"), Some(1.0));
    assert_eq!(sample(&body, "lazylibrarian_exporter_scrapes_total"), Some(1.0));
    assert_eq!(
        sample(&body, r#"lazylibrarian_downloads_total{status="snatched"}"#),
        Some(3.0)
    );
    assert_eq!(
        sample(&body, r#"lazylibrarian_books_by_status{status="wanted"}"#),
        Some(2.0)
    );
    assert_eq!(sample(&body, "lazylibrarian_books_total"), Some(1000.0));
    assert_eq!(
        sample(&body, r#"lazylibrarian_books_by_status{status="have"}"#),
        Some(800.0)
    );
    assert_eq!(sample(&body, "lazylibrarian_active_jobs"), Some(1.0));
    assert_eq!(sample(&body, "lazylibrarian_authors_total"), None);
    for collector in ["server_info", "library_stats", "jobs_info"] {
        let series =
            format!(r#"lazylibrarian_exporter_scrape_errors_total{{collector="{collector}"}}"#);
        assert_eq!(sample(&body, &series), Some(0.0));
    }
    assert!(sample(&body, "lazylibrarian_exporter_scrape_duration_seconds").is_some());
    assert!(body.contains("# TYPE lazylibrarian_downloads_total counter\n"));
    assert!(body.contains("# TYPE lazylibrarian_books_by_status gauge\n"));
}

#[tokio::test]
async fn wanted_failure_marks_down_without_rollback() {
    let (stub, base_url) = StubLibrarian::start().await;
    stub.happy_path();
    let app = exporter(&base_url, "/metrics");
    scrape(&app).await;

    stub.reply("getWanted", StatusCode::INTERNAL_SERVER_ERROR, "oops");
    stub.reply("getJobs", StatusCode::OK, r#"{"jobs": ["j1", "j2", "j3"]}"#);
    let body = scrape(&app).await;

    assert_eq!(sample(&body, "lazylibrarian_up"), Some(0.0));
    assert_eq!(
        sample(
            &body,
            r#"lazylibrarian_exporter_scrape_errors_total{collector="library_stats"}"#
        ),
        Some(1.0)
    );
    // getJobs is never reached, so the previous cycle's value stays.
    assert_eq!(sample(&body, "lazylibrarian_active_jobs"), Some(1.0));
    assert_eq!(
        sample(&body, r#"lazylibrarian_downloads_total{status="snatched"}"#),
        Some(6.0)
    );
    assert_eq!(
        sample(&body, r#"lazylibrarian_books_by_status{status="wanted"}"#),
        Some(2.0)
    );
    assert_eq!(sample(&body, "lazylibrarian_exporter_scrapes_total"), Some(2.0));
}

#[tokio::test]
async fn jobs_failure_counts_against_jobs_info() {
    let (stub, base_url) = StubLibrarian::start().await;
    stub.happy_path();
    stub.reply("getJobs", StatusCode::BAD_GATEWAY, "");
    let app = exporter(&base_url, "/metrics");

    let body = scrape(&app).await;

    assert_eq!(sample(&body, "lazylibrarian_up"), Some(0.0));
    assert_eq!(
        sample(
            &body,
            r#"lazylibrarian_exporter_scrape_errors_total{collector="jobs_info"}"#
        ),
        Some(1.0)
    );
    assert_eq!(sample(&body, "lazylibrarian_books_total"), Some(1000.0));
    assert_eq!(sample(&body, "lazylibrarian_active_jobs"), None);
}

#[tokio::test]
async fn unreachable_target_still_serves_metrics() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let app = exporter(&format!("http://{addr}/api"), "/metrics");

    let body = scrape(&app).await;

    assert_eq!(sample(&body, "lazylibrarian_up"), Some(0.0));
    assert_eq!(
        sample(
            &body,
            r#"lazylibrarian_exporter_scrape_errors_total{collector="server_info"}"#
        ),
        Some(1.0)
    );
    assert!(!body.contains("test-key"));
}

#[tokio::test]
async fn stale_fields_keep_previous_values_and_wanted_is_overwritten() {
    let (stub, base_url) = StubLibrarian::start().await;
    stub.happy_path();
    let app = exporter(&base_url, "/metrics");
    scrape(&app).await;

    stub.reply("getWanted", StatusCode::OK, r#"{"books": ["x"]}"#);
    stub.reply("getStats", StatusCode::OK, r#"{"stats": {"have": 801}}"#);
    let body = scrape(&app).await;

    assert_eq!(sample(&body, "lazylibrarian_up"), Some(1.0));
    assert_eq!(sample(&body, "lazylibrarian_books_total"), Some(1000.0));
    assert_eq!(
        sample(&body, r#"lazylibrarian_books_by_status{status="have"}"#),
        Some(801.0)
    );
    assert_eq!(
        sample(&body, r#"lazylibrarian_books_by_status{status="wanted"}"#),
        Some(1.0)
    );
}

#[tokio::test]
async fn landing_page_links_to_custom_metrics_path() {
    let (stub, base_url) = StubLibrarian::start().await;
    stub.happy_path();
    let app = exporter(&base_url, "/exporter/metrics");

    let (status, content_type, body) = get_body(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap_or_default().starts_with("text/html"));
    assert!(body.contains(r#"<a href="/exporter/metrics">"#));

    let (status, _, body) = get_body(&app, "/exporter/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sample(&body, "lazylibrarian_up"), Some(1.0));

    let (status, _, _) = get_body(&app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
