//! REST implementation of [`SearchService`].

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{SearchService, normalize_query};
use crate::config::{Credentials, ServiceConfig};
use crate::error::{Result, ServiceError};
use crate::types::{Job, ResultRow, ResultSet, SearchId, StatusSnapshot};

/// Longest response body excerpt kept in error messages
const MAX_ERROR_BODY: usize = 200;

#[derive(Deserialize)]
struct SubmitResponse {
    sid: String,
}

#[derive(Deserialize)]
struct JobEntries {
    #[serde(default)]
    entry: Vec<JobEntry>,
}

#[derive(Deserialize)]
struct JobEntry {
    content: StatusSnapshot,
}

#[derive(Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    results: Vec<ResultRow>,
}

/// Search service client speaking the `servicesNS/{user}/{app}/search/jobs`
/// REST API with HTTP basic authentication.
pub struct RestSearchClient {
    http: reqwest::Client,
    config: ServiceConfig,
    credentials: Credentials,
}

impl RestSearchClient {
    /// Build a client. Certificate verification stays on unless
    /// `accept_invalid_certs` is set.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &ServiceConfig, credentials: Credentials) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for the search service");
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("search-batch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
            credentials,
        })
    }

    /// `{scheme}://{host}:{port}/servicesNS/{user}/{app}/search/jobs`, with
    /// optional trailing segments. Hosts that already carry a port are used
    /// as given.
    pub(super) fn jobs_url(&self, job: &Job, segments: &[&str]) -> std::result::Result<Url, String> {
        let mut raw = format!(
            "{}://{}/servicesNS/{}/{}/search/jobs",
            self.config.scheme,
            authority(&job.host, self.config.port),
            urlencoding::encode(&self.credentials.username),
            urlencoding::encode(&job.app),
        );
        for segment in segments {
            raw.push('/');
            raw.push_str(&urlencoding::encode(segment));
        }

        Url::parse(&raw).map_err(|e| format!("invalid service URL '{raw}': {e}"))
    }

    /// Attach credentials and ask for JSON output
    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .basic_auth(
                &self.credentials.username,
                Some(self.credentials.password.expose_secret()),
            )
            .query(&[("output_mode", "json")])
    }
}

/// `host:port`, keeping a port the host already names. IPv6 literals are
/// bracketed; only a `:` after the closing bracket counts as a port.
fn authority(host: &str, port: u16) -> String {
    match host.rsplit_once(']') {
        Some((_, rest)) if rest.starts_with(':') => host.to_string(),
        Some(_) => format!("{host}:{port}"),
        None if host.matches(':').count() > 1 => format!("[{host}]:{port}"),
        None if host.contains(':') => host.to_string(),
        None => format!("{host}:{port}"),
    }
}

/// Render a non-success response as `HTTP <status>: <body excerpt>`
async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("HTTP {status}: {excerpt}")
    }
}

#[async_trait::async_trait]
impl SearchService for RestSearchClient {
    async fn submit(&self, job: &Job) -> std::result::Result<SearchId, ServiceError> {
        let fail = |reason: String| ServiceError::SubmissionFailed {
            title: job.title.clone(),
            reason,
        };

        let url = self.jobs_url(job, &[]).map_err(fail)?;
        let query = normalize_query(&job.query);
        debug!(title = %job.title, url = %url, "submitting search");

        let response = self
            .authorized(self.http.post(url))
            .form(&[
                ("search", query.as_str()),
                ("earliest_time", job.earliest.as_str()),
                ("latest_time", job.latest.as_str()),
            ])
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;

        if response.status() != StatusCode::CREATED {
            return Err(fail(describe_failure(response).await));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| fail(format!("unreadable response body: {e}")))?;

        Ok(SearchId(body.sid))
    }

    async fn poll(
        &self,
        job: &Job,
        sid: &SearchId,
    ) -> std::result::Result<StatusSnapshot, ServiceError> {
        let fail = |reason: String| ServiceError::PollFailed {
            sid: sid.clone(),
            reason,
        };

        let url = self.jobs_url(job, &[sid.as_str()]).map_err(fail)?;
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(fail(describe_failure(response).await));
        }

        let entries: JobEntries = response
            .json()
            .await
            .map_err(|e| fail(format!("unreadable response body: {e}")))?;

        entries
            .entry
            .into_iter()
            .next()
            .map(|entry| entry.content)
            .ok_or_else(|| fail("response contained no job entry".to_string()))
    }

    async fn fetch_results(
        &self,
        job: &Job,
        sid: &SearchId,
    ) -> std::result::Result<ResultSet, ServiceError> {
        let fail = |reason: String| ServiceError::FetchFailed {
            sid: sid.clone(),
            reason,
        };

        let url = self.jobs_url(job, &[sid.as_str(), "results"]).map_err(fail)?;
        // count=0 asks for every row rather than the service's default page
        let response = self
            .authorized(self.http.get(url))
            .query(&[("count", "0")])
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(fail(describe_failure(response).await));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fail(format!("failed to read response body: {e}")))?;
        if body.trim().is_empty() {
            return Ok(ResultSet::Empty);
        }

        let parsed: ResultsResponse = serde_json::from_str(&body)
            .map_err(|e| fail(format!("unreadable response body: {e}")))?;

        debug!(title = %job.title, sid = %sid, rows = parsed.results.len(), "fetched results");
        Ok(ResultSet::Rows(parsed.results))
    }
}
