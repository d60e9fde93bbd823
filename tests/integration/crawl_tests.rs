//! Integration tests for the crawler
//!
//! These tests use wiremock to serve both the crawled website and the
//! model API, and run the full crawl cycle end-to-end.

use gleaner::config::{load_config, Settings};
use gleaner::crawler::{crawl, CrawlServices, Coordinator};
use gleaner::output::{read_jsonl, RunSummary};
use gleaner::state::TaskState;
use gleaner::storage::{MemoryRequestQueue, RequestQueue, SqliteRequestQueue};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a configuration file pointing at the mock servers and loads it
fn create_test_settings(
    dir: &TempDir,
    site: &MockServer,
    api: &MockServer,
    crawl_extra: &str,
    model_extra: &str,
) -> Settings {
    let storage = dir.path().join("storage");
    let toml = format!(
        r#"
[crawl]
start-urls = ["{site}/"]
link-selector = "a[href]"
include-url-globs = ["{site}/**"]
{crawl_extra}

[model]
name = "gpt-3.5-turbo"
api-key = "sk-test"
base-url = "{api}"
instructions = "Get the title of the page"
{model_extra}

[crawler]
min-concurrency = 1
max-concurrency = 3
max-request-retries = 1

[output]
storage-dir = "{storage}"
dataset-path = "{dataset}"
queue-path = "{queue}"
public-base-url = "https://files.example.com"
"#,
        site = site.uri(),
        api = api.uri(),
        crawl_extra = crawl_extra,
        model_extra = model_extra,
        storage = storage.display(),
        dataset = storage.join("dataset.jsonl").display(),
        queue = storage.join("queue.db").display(),
    );

    let config_path = dir.path().join("gleaner.toml");
    std::fs::write(&config_path, toml).expect("Failed to write config");

    let config = load_config(&config_path).expect("Failed to load config");
    Settings::resolve(config).expect("Failed to resolve settings")
}

/// Serves an HTML page at `page_path`
async fn mount_page(server: &MockServer, page_path: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

fn page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!(
        "<html><head><title>{0}</title></head><body><h1>{0}</h1><p>About {0}.</p>{1}</body></html>",
        title, anchors
    )
}

fn chat_answer(content: &str) -> Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 50, "completion_tokens": 5, "total_tokens": 55 }
    })
}

async fn run_crawl(settings: Settings, queue: Arc<dyn RequestQueue>) -> RunSummary {
    crawl(settings, queue, true).await.expect("Crawl failed")
}

fn records(settings: &Settings) -> Vec<Value> {
    read_jsonl(Path::new(&settings.config.output.dataset_path)).expect("Failed to read dataset")
}

#[tokio::test]
async fn test_full_crawl_with_structured_output() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_page(&site, "/", page("Home", &["/page1", "/page2"])).await;
    mount_page(&site, "/page1", page("Page 1", &["/"])).await;
    mount_page(&site, "/page2", page("Page 2", &["/page1"])).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("extract_function"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": {
                "role": "assistant",
                "content": null,
                "function_call": { "name": "extract_function", "arguments": "{\"title\":\"Some page\"}" }
            }}],
            "usage": { "prompt_tokens": 80, "completion_tokens": 10, "total_tokens": 90 }
        })))
        .expect(3)
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = create_test_settings(
        &dir,
        &site,
        &api,
        "",
        r#"use-structured-output = true
schema = '{"type": "object", "properties": {"title": {"type": "string"}}, "required": ["title"]}'
schema-description = "The page title""#,
    );
    let queue = Arc::new(
        SqliteRequestQueue::open(Path::new(&settings.config.output.queue_path)).unwrap(),
    );

    let summary = run_crawl(settings.clone(), queue.clone()).await;

    assert_eq!(summary.pages_opened, 3);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.usage.api_calls_count, 3);
    assert_eq!(summary.usage.total_tokens, 270);
    assert_eq!(queue.count_by_state(TaskState::Handled).unwrap(), 3);

    let records = records(&settings);
    assert_eq!(records.len(), 3);

    let mut urls: Vec<&str> = records.iter().map(|r| r["url"].as_str().unwrap()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            format!("{}/", site.uri()),
            format!("{}/page1", site.uri()),
            format!("{}/page2", site.uri()),
        ]
    );

    for record in &records {
        assert_eq!(record["jsonAnswer"], json!({ "title": "Some page" }));
        assert!(!record["answer"].as_str().unwrap().is_empty());
        assert_eq!(record["#debug"]["modelName"], json!("gpt-3.5-turbo"));

        let snapshot_url = record["htmlSnapshotUrl"].as_str().unwrap();
        assert!(snapshot_url.starts_with("https://files.example.com/"));
        assert!(snapshot_url.ends_with(".html"));
        let key = snapshot_url.trim_start_matches("https://files.example.com/");
        assert!(Path::new(&settings.config.output.storage_dir).join(key).exists());

        assert!(record["sentContentUrl"].is_string());
        assert!(record.get("screenshotUrl").is_none());
    }
}

#[tokio::test]
async fn test_crawl_respects_page_budget() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_page(&site, "/", page("Home", &["/a", "/b", "/c"])).await;
    mount_page(&site, "/a", page("A", &[])).await;
    mount_page(&site, "/b", page("B", &[])).await;
    mount_page(&site, "/c", page("C", &[])).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("A title")))
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = create_test_settings(&dir, &site, &api, "max-pages-per-crawl = 2", "");

    let summary = run_crawl(settings.clone(), Arc::new(MemoryRequestQueue::new())).await;

    assert_eq!(summary.pages_opened, 2);
    assert_eq!(summary.page_limit, Some(2));
    assert_eq!(summary.records, 2);

    let records = records(&settings);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.get("#error").is_none()));
    assert!(records.iter().all(|r| r["jsonAnswer"].is_null()));
}

#[tokio::test]
async fn test_crawl_respects_depth_limit() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_page(&site, "/", page("Home", &["/level1"])).await;
    mount_page(&site, "/level1", page("Level 1", &["/level2"])).await;
    mount_page(&site, "/level2", page("Level 2", &["/level3"])).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("A title")))
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = create_test_settings(&dir, &site, &api, "max-crawling-depth = 1", "");

    let summary = run_crawl(settings.clone(), Arc::new(MemoryRequestQueue::new())).await;

    assert_eq!(summary.records, 2);
    let urls: Vec<String> = records(&settings)
        .iter()
        .map(|r| r["url"].as_str().unwrap().to_string())
        .collect();
    assert!(!urls.contains(&format!("{}/level2", site.uri())));
}

#[tokio::test]
async fn test_skip_phrase_answers_are_not_recorded() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_page(&site, "/", page("Home", &["/private"])).await;
    mount_page(&site, "/private", page("Members only", &[])).await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Members only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("Skip this page.")))
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("Home")))
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = create_test_settings(&dir, &site, &api, "", "");

    let summary = run_crawl(settings.clone(), Arc::new(MemoryRequestQueue::new())).await;

    assert_eq!(summary.pages_opened, 2);
    assert_eq!(summary.records, 1);
    assert_eq!(summary.skipped, 1);

    let records = records(&settings);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["url"], json!(format!("{}/", site.uri())));
    assert_eq!(records[0]["answer"], json!("Home"));
}

#[tokio::test]
async fn test_unusable_pages_become_error_answers() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_page(&site, "/", page("Home", &["/missing", "/report.pdf"])).await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&site)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("Home")))
        .expect(1)
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = create_test_settings(&dir, &site, &api, "", "");

    let summary = run_crawl(settings.clone(), Arc::new(MemoryRequestQueue::new())).await;

    assert_eq!(summary.records, 1);
    assert_eq!(summary.soft_errors, 2);
    assert_eq!(summary.failures, 0);

    let records = records(&settings);
    let answer_for = |suffix: &str| {
        records
            .iter()
            .find(|r| r["url"].as_str().unwrap().ends_with(suffix))
            .map(|r| r["answer"].as_str().unwrap().to_string())
            .unwrap()
    };

    assert_eq!(
        answer_for("/missing"),
        format!("ERROR: Page {}/missing returned HTTP status 404", site.uri())
    );
    assert!(answer_for("/report.pdf").starts_with("ERROR: Page"));
    assert!(answer_for("/report.pdf").contains("is not an HTML page"));
}

#[tokio::test]
async fn test_blocked_pages_are_retried_then_reported() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_page(&site, "/", page("Home", &["/guarded"])).await;
    Mock::given(method("GET"))
        .and(path("/guarded"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&site)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_answer("Home")))
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = create_test_settings(&dir, &site, &api, "", "");

    let summary = run_crawl(settings.clone(), Arc::new(MemoryRequestQueue::new())).await;

    assert_eq!(summary.records, 1);
    assert_eq!(summary.failures, 1);

    let records = records(&settings);
    let failure = records.iter().find(|r| r.get("#error").is_some()).unwrap();
    assert_eq!(failure["#error"], json!(true));
    assert_eq!(failure["#debug"]["url"], json!(format!("{}/guarded", site.uri())));
    assert_eq!(failure["#debug"]["retryCount"], json!(1));
    assert_eq!(
        failure["#debug"]["errorMessages"],
        json!([
            "Blocked. Response status code: 403",
            "Blocked. Response status code: 403"
        ])
    );
}

#[tokio::test]
async fn test_invalid_api_key_aborts_the_run() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_page(&site, "/", page("Home", &[])).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
        })))
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = create_test_settings(&dir, &site, &api, "", "");

    let services = CrawlServices::standard(&settings, Arc::new(MemoryRequestQueue::new()), true)
        .await
        .unwrap();
    let result = Coordinator::new(Arc::new(settings), services).run().await;

    assert!(matches!(result, Err(gleaner::GleanError::RunAborted(_))));
}
