//! Admission: fill free slots from the front of the pending queue.

use tracing::{info, warn};

use super::Dispatcher;
use crate::types::{Event, Status};

impl Dispatcher {
    /// Submit pending jobs while the active set is below the ceiling.
    ///
    /// A rejected submission is terminal: the job is marked failed with zero
    /// progress and its slot is immediately offered to the next pending job.
    /// Returns the number of jobs that entered the active set.
    pub async fn admit_pending(&mut self) -> usize {
        let ceiling = self.config.dispatch.max_concurrent_searches;
        let mut admitted = 0;

        while self.active.len() < ceiling {
            let Some(title) = self.pending.pop_front() else {
                break;
            };
            let Some(job) = self.registry.get(&title) else {
                warn!(title = %title, "pending title has no registered job");
                continue;
            };

            let submitted = self.service.submit(job).await;
            match submitted {
                Ok(sid) => {
                    if let Err(e) = self.registry.record_submission(&title, sid.clone()) {
                        warn!(title = %title, error = %e, "could not record submission");
                        continue;
                    }
                    info!(title = %title, sid = %sid, "search submitted");
                    self.active.push(title.clone());
                    admitted += 1;
                    self.emit_event(Event::Submitted { title, sid });
                }
                Err(e) => {
                    warn!(title = %title, error = %e, "search submission failed");
                    self.finish(&title, Status::Failed);
                    self.emit_event(Event::SubmissionFailed {
                        title,
                        error: e.to_string(),
                    });
                }
            }
        }

        admitted
    }
}
