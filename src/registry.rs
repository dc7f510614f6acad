//! In-memory ledger of every job in a batch, keyed by title.
//!
//! Each entry pairs the [`Job`] with its [`ProgressRecord`]; both are created
//! together on insert and never duplicated. The registry has no internal
//! locking: it is owned and mutated by the dispatcher alone.

use std::collections::HashMap;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::types::{BatchSummary, Job, ProgressRecord, SearchId, Status, StatusSnapshot};

/// Status fields applied to a progress record in one step
#[derive(Clone, Debug, PartialEq)]
pub struct StatusUpdate {
    /// Raw dispatch state label
    pub label: String,
    /// Completion percentage, 0-100
    pub progress_percent: f64,
    /// Events scanned
    pub events: u64,
    /// Run duration in seconds
    pub runtime_secs: f64,
}

impl From<&StatusSnapshot> for StatusUpdate {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            label: snapshot.dispatch_state.clone(),
            progress_percent: snapshot.percent(),
            events: snapshot.event_count,
            runtime_secs: snapshot.runtime_secs(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    job: Job,
    progress: ProgressRecord,
    /// Set when a finished job's results could not be fetched or written
    result_error: Option<String>,
}

/// Insertion-ordered map from title to job and progress record
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job together with a fresh progress record
    ///
    /// # Errors
    /// Returns [`Error::Duplicate`] if the title is already registered
    pub fn insert(&mut self, job: Job) -> Result<()> {
        if self.index.contains_key(&job.title) {
            return Err(Error::Duplicate(job.title));
        }
        let progress = ProgressRecord::new(job.title.clone(), job.status.label());
        self.index.insert(job.title.clone(), self.entries.len());
        self.entries.push(Entry {
            job,
            progress,
            result_error: None,
        });
        Ok(())
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no jobs are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a job by title
    pub fn get(&self, title: &str) -> Option<&Job> {
        self.entry(title).map(|e| &e.job)
    }

    /// Look up a job's progress record by title
    pub fn progress(&self, title: &str) -> Option<&ProgressRecord> {
        self.entry(title).map(|e| &e.progress)
    }

    /// Titles in insertion order
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.job.title.as_str())
    }

    /// Replace the status fields of a job's progress record.
    ///
    /// Progress never moves backwards while the job is in flight.
    ///
    /// # Errors
    /// Fails if the title is unknown or the job is already terminal
    pub fn update_status_fields(&mut self, title: &str, update: StatusUpdate) -> Result<()> {
        let entry = self.entry_mut(title)?;
        if entry.job.status.is_terminal() {
            return Err(Error::InvalidTransition {
                title: title.to_string(),
                from: entry.job.status,
                to: Status::Running,
            });
        }

        let previous = entry.progress.progress_percent;
        entry.progress = ProgressRecord {
            title: entry.progress.title.clone(),
            status: update.label,
            progress_percent: update.progress_percent.max(previous),
            events: update.events,
            runtime_secs: update.runtime_secs,
        };
        Ok(())
    }

    /// Move a job to a new lifecycle state.
    ///
    /// Every state except `Running` also replaces the progress label, since
    /// only a running job shows the service's own dispatch state.
    ///
    /// # Errors
    /// Fails if the title is unknown or the move is not a legal lifecycle step
    pub fn transition(&mut self, title: &str, next: Status) -> Result<()> {
        let entry = self.entry_mut(title)?;
        let current = entry.job.status;
        if !current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                title: title.to_string(),
                from: current,
                to: next,
            });
        }

        entry.job.status = next;
        if next != Status::Running {
            entry.progress.status = next.label().to_string();
        }
        Ok(())
    }

    /// Record a successful submission: store the remote id and move to `Created`
    pub fn record_submission(&mut self, title: &str, sid: SearchId) -> Result<()> {
        self.transition(title, Status::Created)?;
        let entry = self.entry_mut(title)?;
        entry.job.search_id = Some(sid);
        entry.job.submitted_at = Some(Instant::now());
        Ok(())
    }

    /// Count one more status poll; returns the new total
    pub fn record_poll(&mut self, title: &str) -> Result<u32> {
        let entry = self.entry_mut(title)?;
        entry.job.polls += 1;
        Ok(entry.job.polls)
    }

    /// Claim the single result fetch for a finished job.
    ///
    /// Returns `true` exactly once per job, and only once it is `Done`.
    pub fn claim_result_fetch(&mut self, title: &str) -> Result<bool> {
        let entry = self.entry_mut(title)?;
        if entry.job.status != Status::Done || entry.job.results_fetched {
            return Ok(false);
        }
        entry.job.results_fetched = true;
        Ok(true)
    }

    /// Mark a finished job whose results were lost, relabelling its record
    pub fn record_result_error(&mut self, title: &str, reason: impl Into<String>) -> Result<()> {
        let entry = self.entry_mut(title)?;
        entry.result_error = Some(reason.into());
        entry.progress.status = RESULTS_FAILED_LABEL.to_string();
        Ok(())
    }

    /// Error recorded for a finished job's results, if any
    pub fn result_error(&self, title: &str) -> Option<&str> {
        self.entry(title).and_then(|e| e.result_error.as_deref())
    }

    /// Point-in-time copy of every progress record, in insertion order
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.entries.iter().map(|e| e.progress.clone()).collect()
    }

    /// Outcome counts over all terminal jobs
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for entry in &self.entries {
            match entry.job.status {
                Status::Done if entry.result_error.is_none() => summary.done += 1,
                Status::Done | Status::Failed => summary.failed += 1,
                Status::TimedOut => summary.timed_out += 1,
                Status::Pending | Status::Created | Status::Running => {}
            }
        }
        summary
    }

    fn entry(&self, title: &str) -> Option<&Entry> {
        self.index.get(title).map(|&i| &self.entries[i])
    }

    fn entry_mut(&mut self, title: &str) -> Result<&mut Entry> {
        match self.index.get(title) {
            Some(&i) => Ok(&mut self.entries[i]),
            None => Err(Error::NotFound(title.to_string())),
        }
    }
}

/// Progress label for a finished job whose results could not be saved
pub const RESULTS_FAILED_LABEL: &str = "RESULTS_FAILED";
