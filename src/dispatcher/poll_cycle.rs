//! Poll cycle: refresh every active job and act on what the service reports.

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::Dispatcher;
use crate::export;
use crate::registry::StatusUpdate;
use crate::types::{Event, ResultSet, Status, StatusSnapshot};

impl Dispatcher {
    /// Poll every job in the active set once.
    ///
    /// Works over a copy of the active set taken at the start, so jobs evicted
    /// mid-cycle do not disturb iteration. Up to `poll_concurrency` polls are
    /// in flight at once; outcomes are applied in active-set order.
    pub async fn poll_active(&mut self) {
        let titles = self.active.clone();
        if titles.is_empty() {
            return;
        }

        let concurrency = self.config.dispatch.poll_concurrency.max(1);
        let service = &self.service;
        let registry = &self.registry;

        let outcomes: Vec<(String, Result<StatusSnapshot, String>)> = stream::iter(titles)
            .map(|title| async move {
                let outcome = match registry.get(&title) {
                    Some(job) => match job.search_id.as_ref() {
                        Some(sid) => service.poll(job, sid).await.map_err(|e| e.to_string()),
                        None => Err("job has no search id".to_string()),
                    },
                    None => Err("job is not registered".to_string()),
                };
                (title, outcome)
            })
            .buffered(concurrency)
            .collect()
            .await;

        for (title, outcome) in outcomes {
            self.apply_poll(&title, outcome).await;
        }
    }

    async fn apply_poll(&mut self, title: &str, outcome: Result<StatusSnapshot, String>) {
        let polls = match self.registry.record_poll(title) {
            Ok(polls) => polls,
            Err(e) => {
                warn!(title = %title, error = %e, "poll outcome for unknown job");
                return;
            }
        };

        let snapshot = match outcome {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                warn!(title = %title, error = %reason, "status poll failed");
                self.fail(title, reason);
                return;
            }
        };

        if let Err(e) = self
            .registry
            .update_status_fields(title, StatusUpdate::from(&snapshot))
        {
            warn!(title = %title, error = %e, "status update rejected");
            return;
        }
        if let Some(progress) = self.registry.progress(title) {
            debug!(
                title = %title,
                state = %progress.status,
                percent = progress.progress_percent,
                events = progress.events,
                "search progress"
            );
            self.emit_event(Event::Progress {
                title: title.to_string(),
                status: progress.status.clone(),
                percent: progress.progress_percent,
                events: progress.events,
            });
        }

        // The done flag wins; whatever the service produced is still fetched
        if snapshot.is_done {
            self.complete(title).await;
            return;
        }

        if snapshot.is_remote_failure() {
            warn!(title = %title, "search failed on the service");
            self.fail(
                title,
                format!("service reported dispatch state {}", snapshot.dispatch_state),
            );
            return;
        }

        if let Err(e) = self.registry.transition(title, Status::Running) {
            warn!(title = %title, error = %e, "rejected status change");
            return;
        }

        if self.deadline_passed(title, polls) {
            warn!(title = %title, polls, "search timed out");
            self.finish(title, Status::TimedOut);
            self.emit_event(Event::TimedOut {
                title: title.to_string(),
                polls,
            });
        }
    }

    /// Mark a finished job done, fetch its results once and write them out
    async fn complete(&mut self, title: &str) {
        if let Err(e) = self.registry.transition(title, Status::Done) {
            warn!(title = %title, error = %e, "rejected status change");
            self.release(title);
            return;
        }
        match self.registry.claim_result_fetch(title) {
            Ok(true) => {}
            Ok(false) => {
                debug!(title = %title, "results already fetched");
                self.release(title);
                return;
            }
            Err(e) => {
                warn!(title = %title, error = %e, "cannot fetch results");
                self.release(title);
                return;
            }
        }

        let Some(job) = self.registry.get(title) else {
            return;
        };
        let output = job.output.clone();
        let fetched = match job.search_id.as_ref() {
            Some(sid) => self
                .service
                .fetch_results(job, sid)
                .await
                .map_err(|e| e.to_string()),
            None => Err("job has no search id".to_string()),
        };

        let saved = fetched.and_then(|results: ResultSet| {
            export::write_results(&output, &results)
                .map(|written| (results.len(), written))
                .map_err(|e| format!("failed to write {}: {e}", output.display()))
        });

        match saved {
            Ok((rows, written)) => {
                info!(
                    title = %title,
                    rows,
                    output = %output.display(),
                    written,
                    "search complete"
                );
                self.release(title);
                self.emit_event(Event::Completed {
                    title: title.to_string(),
                    rows,
                    output: written.then_some(output),
                });
            }
            Err(reason) => {
                error!(title = %title, error = %reason, "search finished but results were lost");
                if let Err(e) = self.registry.record_result_error(title, reason.clone()) {
                    warn!(title = %title, error = %e, "could not record result error");
                }
                self.release(title);
                self.emit_event(Event::Failed {
                    title: title.to_string(),
                    error: reason,
                });
            }
        }
    }

    fn fail(&mut self, title: &str, reason: String) {
        self.finish(title, Status::Failed);
        self.emit_event(Event::Failed {
            title: title.to_string(),
            error: reason,
        });
    }

    fn deadline_passed(&self, title: &str, polls: u32) -> bool {
        let dispatch = &self.config.dispatch;
        if dispatch.max_polls.is_some_and(|max| polls >= max) {
            return true;
        }
        match (
            dispatch.job_timeout,
            self.registry.get(title).and_then(|job| job.submitted_at),
        ) {
            (Some(timeout), Some(submitted_at)) => submitted_at.elapsed() >= timeout,
            _ => false,
        }
    }
}
