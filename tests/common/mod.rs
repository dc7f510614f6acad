//! Common test utilities for search-batch integration tests

use std::path::{Path, PathBuf};
use std::time::Duration;

use search_batch::{Config, Credentials};
use serde_json::{Value, json};
use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "changeme";
pub const JOBS_PATH: &str = "/servicesNS/admin/search/search/jobs";

/// Config pointing at plain-HTTP mock servers, with no delay between cycles
pub fn test_config(dir: &Path, ceiling: usize) -> Config {
    let mut config = Config::default();
    config.service.scheme = "http".to_string();
    config.dispatch.max_concurrent_searches = ceiling;
    config.dispatch.poll_interval = Duration::ZERO;
    config.output.progress_file = dir.join("Reports").join("progress.csv");
    config.output.render_progress = false;
    config.credentials = Credentials::new(USERNAME, PASSWORD);
    config
}

/// Write a job list CSV and return its path
pub fn write_job_list(dir: &Path, rows: &[[&str; 6]]) -> PathBuf {
    let path = dir.join("queries.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record(["title", "host", "app", "query", "output", "earliest"])
        .unwrap();
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Job status payload in the service's `entry[0].content` shape
pub fn status_body(state: &str, done: bool, progress: f64, events: u64, runtime: f64) -> Value {
    json!({
        "entry": [{
            "content": {
                "dispatchState": state,
                "isDone": done,
                "doneProgress": progress,
                "eventCount": events,
                "runDuration": runtime
            }
        }]
    })
}

/// Accept submissions whose form body contains `marker`
pub async fn mount_submit(server: &MockServer, marker: &str, sid: &str) {
    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .and(basic_auth(USERNAME, PASSWORD))
        .and(body_string_contains(marker))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sid": sid })))
        .expect(1)
        .mount(server)
        .await;
}

/// Reject submissions whose form body contains `marker`
pub async fn mount_reject(server: &MockServer, marker: &str) {
    Mock::given(method("POST"))
        .and(path(JOBS_PATH))
        .and(body_string_contains(marker))
        .respond_with(ResponseTemplate::new(400).set_body_string("Unknown search command 'serch'"))
        .expect(1)
        .mount(server)
        .await;
}

/// Answer the first `times` polls of `sid` with `body`, ahead of any default
pub async fn mount_poll_once(server: &MockServer, sid: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{JOBS_PATH}/{sid}")))
        .and(query_param("output_mode", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(times)
        .with_priority(1)
        .mount(server)
        .await;
}

/// Answer every remaining poll of `sid` with `body`
pub async fn mount_poll(server: &MockServer, sid: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{JOBS_PATH}/{sid}")))
        .and(query_param("output_mode", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve the result set of `sid`; must be requested exactly once
pub async fn mount_results(server: &MockServer, sid: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("{JOBS_PATH}/{sid}/results")))
        .and(query_param("count", "0"))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

/// Read a CSV file into rows of cells, header included
pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect()
}
