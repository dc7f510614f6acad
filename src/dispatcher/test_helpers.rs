//! Scripted search service and fixtures for dispatcher tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::Config;
use crate::error::ServiceError;
use crate::service::SearchService;
use crate::types::{DEFAULT_APP, Job, JobSpec, ResultRow, ResultSet, SearchId, StatusSnapshot};

/// In-memory service whose answers are scripted per job title.
///
/// Each title's poll script is consumed front to back; the last snapshot
/// repeats forever. Titles without a script finish on their first poll with
/// no results.
#[derive(Default)]
pub(crate) struct FakeSearchService {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    rejected: HashSet<String>,
    poll_errors: HashSet<String>,
    fetch_errors: HashSet<String>,
    scripts: HashMap<String, VecDeque<StatusSnapshot>>,
    results: HashMap<String, ResultSet>,
    submitted: Vec<String>,
    polls: HashMap<String, u32>,
    fetches: HashMap<String, u32>,
}

impl FakeSearchService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reject the submission of `title`
    pub(crate) fn reject(self, title: &str) -> Self {
        self.state.lock().unwrap().rejected.insert(title.to_string());
        self
    }

    /// Fail every poll of `title`
    pub(crate) fn poll_error(self, title: &str) -> Self {
        self.state.lock().unwrap().poll_errors.insert(title.to_string());
        self
    }

    /// Fail the result fetch of `title`
    pub(crate) fn fetch_error(self, title: &str) -> Self {
        self.state.lock().unwrap().fetch_errors.insert(title.to_string());
        self
    }

    /// Poll answers for `title`, in order
    pub(crate) fn script(self, title: &str, snapshots: Vec<StatusSnapshot>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(title.to_string(), snapshots.into());
        self
    }

    /// Result set returned when `title` is fetched
    pub(crate) fn results(self, title: &str, results: ResultSet) -> Self {
        self.state
            .lock()
            .unwrap()
            .results
            .insert(title.to_string(), results);
        self
    }

    pub(crate) fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub(crate) fn poll_count(&self, title: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .polls
            .get(title)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn fetch_count(&self, title: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .fetches
            .get(title)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl SearchService for FakeSearchService {
    async fn submit(&self, job: &Job) -> Result<SearchId, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(job.title.clone());
        if state.rejected.contains(&job.title) {
            return Err(ServiceError::SubmissionFailed {
                title: job.title.clone(),
                reason: "HTTP 400 Bad Request".to_string(),
            });
        }
        Ok(SearchId::new(format!("sid-{}", job.title)))
    }

    async fn poll(&self, job: &Job, sid: &SearchId) -> Result<StatusSnapshot, ServiceError> {
        let mut state = self.state.lock().unwrap();
        *state.polls.entry(job.title.clone()).or_default() += 1;
        if state.poll_errors.contains(&job.title) {
            return Err(ServiceError::PollFailed {
                sid: sid.clone(),
                reason: "HTTP 503 Service Unavailable".to_string(),
            });
        }
        let snapshot = match state.scripts.get_mut(&job.title) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };
        Ok(snapshot.unwrap_or_else(|| done(0, 0.0)))
    }

    async fn fetch_results(&self, job: &Job, sid: &SearchId) -> Result<ResultSet, ServiceError> {
        let mut state = self.state.lock().unwrap();
        *state.fetches.entry(job.title.clone()).or_default() += 1;
        if state.fetch_errors.contains(&job.title) {
            return Err(ServiceError::FetchFailed {
                sid: sid.clone(),
                reason: "HTTP 500 Internal Server Error".to_string(),
            });
        }
        Ok(state
            .results
            .get(&job.title)
            .cloned()
            .unwrap_or(ResultSet::Empty))
    }
}

pub(crate) fn running(state: &str, fraction: f64) -> StatusSnapshot {
    StatusSnapshot {
        dispatch_state: state.to_string(),
        is_done: false,
        done_progress: fraction,
        event_count: 10,
        run_duration: 1.0,
    }
}

pub(crate) fn done(events: u64, runtime: f64) -> StatusSnapshot {
    StatusSnapshot {
        dispatch_state: "DONE".to_string(),
        is_done: true,
        done_progress: 1.0,
        event_count: events,
        run_duration: runtime,
    }
}

pub(crate) fn remote_failure() -> StatusSnapshot {
    StatusSnapshot {
        dispatch_state: "FAILED".to_string(),
        is_done: false,
        done_progress: 0.4,
        event_count: 0,
        run_duration: 0.2,
    }
}

pub(crate) fn rows(values: serde_json::Value) -> ResultSet {
    let rows: Vec<ResultRow> = serde_json::from_value(values).unwrap();
    ResultSet::Rows(rows)
}

/// Job writing its results under `dir`
pub(crate) fn spec(title: &str, dir: &Path) -> JobSpec {
    JobSpec {
        title: title.to_string(),
        host: "sh1.example.com".to_string(),
        app: DEFAULT_APP.to_string(),
        query: format!("index=main sourcetype={title}"),
        output: dir.join("out").join(format!("{title}.csv")),
        earliest: None,
        latest: None,
    }
}

pub(crate) fn specs(titles: &[&str], dir: &Path) -> Vec<JobSpec> {
    titles.iter().map(|t| spec(t, dir)).collect()
}

/// Config with no delay between cycles and the progress file under `dir`
pub(crate) fn test_config(dir: &Path, ceiling: usize) -> Config {
    let mut config = Config::default();
    config.dispatch.max_concurrent_searches = ceiling;
    config.dispatch.poll_interval = Duration::ZERO;
    config.output.progress_file = dir.join("Reports").join("progress.csv");
    config.output.render_progress = false;
    config
}
