//! Job list loading.
//!
//! The job list is a CSV file with a header row. Recognised columns are
//! `title`, `host`, `app`, `query`, `output`, and optionally `earliest` and
//! `latest`; unknown columns are ignored. Rows with an empty query are
//! skipped, which lets operators comment out a job by blanking its query.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{DEFAULT_APP, JobSpec};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobRow {
    title: Option<String>,
    host: Option<String>,
    app: Option<String>,
    query: Option<String>,
    output: Option<String>,
    earliest: Option<String>,
    latest: Option<String>,
}

/// Load the job list at `path`
///
/// # Errors
/// Returns error if the file cannot be read, a row lacks a required field,
/// or two rows share a title
pub fn load_jobs(path: &Path) -> Result<Vec<JobSpec>> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::config(
            format!("cannot open job list {}: {}", path.display(), e),
            "query_file",
        )
    })?;
    let jobs = read_jobs(file)?;
    debug!(path = %path.display(), jobs = jobs.len(), "loaded job list");
    Ok(jobs)
}

/// Parse a job list from any reader
pub fn read_jobs<R: Read>(reader: R) -> Result<Vec<JobSpec>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut jobs = Vec::new();
    let mut seen = HashSet::new();
    for (index, row) in reader.deserialize::<JobRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = row?;

        let Some(query) = non_empty(row.query) else {
            debug!(line, "skipping job row without a query");
            continue;
        };
        let title = required(row.title, "title", line)?;
        let host = required(row.host, "host", line)?;
        let output = required(row.output, "output", line)?;

        if !seen.insert(title.clone()) {
            return Err(Error::Duplicate(title));
        }

        jobs.push(JobSpec {
            title,
            host,
            app: non_empty(row.app).unwrap_or_else(|| DEFAULT_APP.to_string()),
            query,
            output: PathBuf::from(output),
            earliest: non_empty(row.earliest),
            latest: non_empty(row.latest),
        });
    }

    Ok(jobs)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str, line: usize) -> Result<String> {
    non_empty(value).ok_or_else(|| {
        Error::config(format!("job list line {line}: missing '{field}'"), field)
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(text: &str) -> Result<Vec<JobSpec>> {
        read_jobs(text.as_bytes())
    }

    #[test]
    fn reads_rows_in_order_with_defaults() {
        let jobs = parse(
            "title,host,app,query,output\n\
             errors, sh1.example.com ,,index=web status>=500,out/errors.csv\n\
             logins,sh2.example.com,security,| tstats count where index=auth,out/logins.csv\n",
        )
        .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title, "errors");
        assert_eq!(jobs[0].host, "sh1.example.com");
        assert_eq!(jobs[0].app, DEFAULT_APP);
        assert_eq!(jobs[0].output, PathBuf::from("out/errors.csv"));
        assert_eq!(jobs[0].earliest, None);
        assert_eq!(jobs[1].app, "security");
        assert_eq!(jobs[1].query, "| tstats count where index=auth");
    }

    #[test]
    fn rows_without_query_are_skipped() {
        let jobs = parse(
            "title,host,app,query,output\n\
             disabled,sh1,search,,out/a.csv\n\
             blank,sh1,search,   ,out/b.csv\n\
             active,sh1,search,index=main,out/c.csv\n",
        )
        .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "active");
    }

    #[test]
    fn optional_time_columns_override_window() {
        let jobs = parse(
            "title,host,query,output,earliest,latest,owner\n\
             recent,sh1,index=main,out/r.csv,-24h,now,ops\n\
             default,sh1,index=main,out/d.csv,,,ops\n",
        )
        .unwrap();

        assert_eq!(jobs[0].earliest.as_deref(), Some("-24h"));
        assert_eq!(jobs[0].latest.as_deref(), Some("now"));
        assert_eq!(jobs[1].earliest, None);
        assert_eq!(jobs[1].latest, None);
    }

    #[test]
    fn missing_required_field_names_line_and_field() {
        let err = parse(
            "title,host,app,query,output\n\
             ok,sh1,search,index=main,out/a.csv\n\
             broken,,search,index=main,out/b.csv\n",
        )
        .unwrap_err();

        match err {
            Error::Config { message, key } => {
                assert_eq!(key.as_deref(), Some("host"));
                assert!(message.contains("line 3"), "{message}");
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_titles_are_rejected() {
        let err = parse(
            "title,host,app,query,output\n\
             same,sh1,search,index=a,out/a.csv\n\
             same,sh2,search,index=b,out/b.csv\n",
        )
        .unwrap_err();

        assert!(matches!(err, Error::Duplicate(t) if t == "same"));
    }

    #[test]
    fn load_jobs_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title,host,app,query,output").unwrap();
        writeln!(file, "\"a, quoted\",sh1,search,\"index=main \"\"x\"\"\",out/a.csv").unwrap();

        let jobs = load_jobs(file.path()).unwrap();

        assert_eq!(jobs[0].title, "a, quoted");
        assert_eq!(jobs[0].query, "index=main \"x\"");
    }

    #[test]
    fn load_jobs_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_jobs(&dir.path().join("nope.csv")).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("query_file")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
