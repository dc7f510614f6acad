//! Remote search service client.
//!
//! The dispatcher talks to the service only through the [`SearchService`]
//! trait, which lets tests swap in a scripted fake. [`RestSearchClient`] is
//! the production implementation over the service's REST management API.

mod rest;


pub use rest::RestSearchClient;

use crate::error::ServiceError;
use crate::types::{Job, ResultSet, SearchId, StatusSnapshot};

/// The three operations the dispatcher needs from a search service
#[async_trait::async_trait]
pub trait SearchService: Send + Sync {
    /// Create a search job; returns the id assigned by the service
    async fn submit(&self, job: &Job) -> Result<SearchId, ServiceError>;

    /// Fetch the current status of a submitted job
    async fn poll(&self, job: &Job, sid: &SearchId) -> Result<StatusSnapshot, ServiceError>;

    /// Retrieve the complete result set of a finished job
    async fn fetch_results(&self, job: &Job, sid: &SearchId) -> Result<ResultSet, ServiceError>;
}

/// Prefix a raw filter expression with the `search` command.
///
/// Queries that already begin with a pipe (generating commands such as
/// `| tstats` or `| inputlookup`) are sent unchanged.
pub fn normalize_query(raw: &str) -> String {
    let query = raw.trim();
    if query.starts_with('|') {
        query.to_string()
    } else {
        format!("search {query}")
    }
}
