//! Core types for search-batch

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

/// Default application namespace used when a job does not name one
pub const DEFAULT_APP: &str = "search";

/// Remote search job identifier (the service's `sid`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchId(pub String);

impl SearchId {
    /// Create a new SearchId
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting in the pending queue, not yet submitted
    Pending,
    /// Accepted by the service, not yet observed running
    Created,
    /// Observed in a non-terminal dispatch state (queued, parsing, running, ...)
    Running,
    /// Finished on the service side; results have been (or are being) fetched
    Done,
    /// Submission rejected, polling failed, or the service reported failure
    Failed,
    /// Exceeded the configured poll count or wall-clock deadline
    TimedOut,
}

impl Status {
    /// `Done`, `Failed` and `TimedOut` admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::TimedOut)
    }

    /// Whether a job in this state holds one of the dispatcher's active slots
    pub fn occupies_slot(&self) -> bool {
        matches!(self, Status::Created | Status::Running)
    }

    /// Check whether moving from `self` to `next` is a legal lifecycle step
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (Status::Pending, Status::Created | Status::Failed) => true,
            (
                Status::Created | Status::Running,
                Status::Running | Status::Done | Status::Failed | Status::TimedOut,
            ) => true,
            _ => false,
        }
    }

    /// Label shown in the progress table for this state
    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Created => "CREATED",
            Status::Running => "RUNNING",
            Status::Done => "DONE",
            Status::Failed => "FAILED",
            Status::TimedOut => "TIMED_OUT",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the job list, before the time window is resolved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique title, used as the job's key
    pub title: String,
    /// Search head host name (optionally `host:port`)
    pub host: String,
    /// Application namespace
    pub app: String,
    /// Raw query text
    pub query: String,
    /// Destination CSV for the job's results
    pub output: PathBuf,
    /// Per-job earliest time override
    pub earliest: Option<String>,
    /// Per-job latest time override
    pub latest: Option<String>,
}

/// A search job tracked by the dispatcher
#[derive(Clone, Debug)]
pub struct Job {
    /// Unique title
    pub title: String,
    /// Search head host name
    pub host: String,
    /// Application namespace
    pub app: String,
    /// Raw query text as supplied by the job list
    pub query: String,
    /// Destination CSV for the job's results
    pub output: PathBuf,
    /// Earliest time bound sent with the submission
    pub earliest: String,
    /// Latest time bound sent with the submission
    pub latest: String,
    /// Remote id, present only after a successful submission
    pub search_id: Option<SearchId>,
    /// Current lifecycle state
    pub status: Status,
    /// Number of status polls issued so far
    pub polls: u32,
    /// When the service accepted the job
    pub submitted_at: Option<Instant>,
    /// Set once results have been requested; never cleared
    pub results_fetched: bool,
}

impl Job {
    /// Build a pending job, filling the time range from the default window
    /// unless the job list row overrides it.
    pub fn from_spec(spec: JobSpec, earliest: &str, latest: &str) -> Self {
        Self {
            title: spec.title,
            host: spec.host,
            app: spec.app,
            query: spec.query,
            output: spec.output,
            earliest: spec.earliest.unwrap_or_else(|| earliest.to_string()),
            latest: spec.latest.unwrap_or_else(|| latest.to_string()),
            search_id: None,
            status: Status::Pending,
            polls: 0,
            submitted_at: None,
            results_fetched: false,
        }
    }
}

/// Per-job row of the progress table.
///
/// Field names double as the progress snapshot CSV header.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressRecord {
    /// Job title
    #[serde(rename = "Title")]
    pub title: String,
    /// Status label (raw dispatch state while running)
    #[serde(rename = "Status")]
    pub status: String,
    /// Completion percentage, 0-100
    #[serde(rename = "Progress (%)")]
    pub progress_percent: f64,
    /// Events scanned so far
    #[serde(rename = "Events")]
    pub events: u64,
    /// Remote run duration in seconds
    #[serde(rename = "Runtime (s)")]
    pub runtime_secs: f64,
}

impl ProgressRecord {
    /// Fresh record for a job that has not reported any progress
    pub fn new(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: status.into(),
            progress_percent: 0.0,
            events: 0,
            runtime_secs: 0.0,
        }
    }
}

/// Status payload returned by a poll
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Raw dispatch state (`QUEUED`, `PARSING`, `RUNNING`, `FINALIZING`, `DONE`, `FAILED`, ...)
    #[serde(default)]
    pub dispatch_state: String,
    /// Whether the service considers the job finished
    #[serde(default)]
    pub is_done: bool,
    /// Fractional progress, 0.0-1.0
    #[serde(default)]
    pub done_progress: f64,
    /// Number of events scanned
    #[serde(default)]
    pub event_count: u64,
    /// Run duration in seconds
    #[serde(default)]
    pub run_duration: f64,
}

impl StatusSnapshot {
    /// Service-side failure marker in `dispatch_state`
    pub const FAILED_STATE: &'static str = "FAILED";

    /// Whether the service reported the job as failed
    pub fn is_remote_failure(&self) -> bool {
        self.dispatch_state.eq_ignore_ascii_case(Self::FAILED_STATE)
    }

    /// Progress as a percentage rounded to two decimals
    pub fn percent(&self) -> f64 {
        round_to(self.done_progress.clamp(0.0, 1.0) * 100.0, 2)
    }

    /// Run duration rounded to one decimal
    pub fn runtime_secs(&self) -> f64 {
        round_to(self.run_duration.max(0.0), 1)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// A single result row: field name to value. Field sets may vary row to row.
pub type ResultRow = BTreeMap<String, serde_json::Value>;

/// Outcome of a successful result fetch
#[derive(Clone, Debug, PartialEq)]
pub enum ResultSet {
    /// The service returned a blank body
    Empty,
    /// Rows in the order the service returned them
    Rows(Vec<ResultRow>),
}

impl ResultSet {
    /// Number of rows fetched
    pub fn len(&self) -> usize {
        match self {
            ResultSet::Empty => 0,
            ResultSet::Rows(rows) => rows.len(),
        }
    }

    /// Whether there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-batch outcome counts returned when the dispatcher finishes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Jobs that completed and had their results handled
    pub done: usize,
    /// Jobs that failed at submission, poll, or fetch
    pub failed: usize,
    /// Jobs abandoned after the poll limit or deadline
    pub timed_out: usize,
}

impl BatchSummary {
    /// Total number of jobs that reached a terminal state
    pub fn total(&self) -> usize {
        self.done + self.failed + self.timed_out
    }
}

/// Event emitted during a batch run
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The service accepted a job
    Submitted {
        /// Job title
        title: String,
        /// Remote search id
        sid: SearchId,
    },

    /// The service rejected a job
    SubmissionFailed {
        /// Job title
        title: String,
        /// Error message
        error: String,
    },

    /// A poll returned fresh progress
    Progress {
        /// Job title
        title: String,
        /// Dispatch state label
        status: String,
        /// Progress percentage (0.0 to 100.0)
        percent: f64,
        /// Events scanned so far
        events: u64,
    },

    /// A job finished and its results were handled
    Completed {
        /// Job title
        title: String,
        /// Number of result rows fetched
        rows: usize,
        /// Output file, if any rows were written
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
    },

    /// A submitted job failed
    Failed {
        /// Job title
        title: String,
        /// Error message
        error: String,
    },

    /// A job exceeded its poll limit or deadline
    TimedOut {
        /// Job title
        title: String,
        /// Polls issued before giving up
        polls: u32,
    },

    /// Both the pending queue and active set drained
    BatchComplete {
        /// Final outcome counts
        summary: BatchSummary,
    },
}
