//! CSV writers for result sets and the progress snapshot.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::report::PROGRESS_HEADER;
use crate::types::{ProgressRecord, ResultRow, ResultSet};

/// Write a job's result rows to `path`.
///
/// The header is the sorted union of field names across all rows; fields a
/// row lacks are left blank. Returns `false` without touching the file system
/// when there is nothing to write.
///
/// # Errors
/// Returns error if the file or its parent directory cannot be written
pub fn write_results(path: &Path, results: &ResultSet) -> Result<bool> {
    let rows = match results {
        ResultSet::Rows(rows) if !rows.is_empty() => rows,
        _ => return Ok(false),
    };

    let header: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(header.iter().map(|field| cell(row, field)))?;
    }
    writer.flush()?;
    Ok(true)
}

/// Overwrite `path` with the full progress snapshot.
///
/// Written to a sibling temp file first, then renamed into place, so readers
/// never observe a half-written snapshot.
///
/// # Errors
/// Returns error if the snapshot cannot be written
pub fn write_progress(path: &Path, records: &[ProgressRecord]) -> Result<()> {
    ensure_parent(path)?;
    let staging = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&staging)?;
        writer.write_record(PROGRESS_HEADER)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn cell(row: &ResultRow, field: &str) -> String {
    row.get(field).map(render_value).unwrap_or_default()
}

/// Multi-value fields arrive as arrays; they are joined one value per line.
fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> ResultRow {
        serde_json::from_value(value).unwrap()
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    #[test]
    fn heterogeneous_rows_share_a_sorted_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/results.csv");
        let results = ResultSet::Rows(vec![
            row(json!({ "host": "web01", "count": "12" })),
            row(json!({ "status": "503", "host": "web02" })),
        ]);

        assert!(write_results(&path, &results).unwrap());

        assert_eq!(
            read_csv(&path),
            vec![
                vec!["count", "host", "status"],
                vec!["12", "web01", ""],
                vec!["", "web02", "503"],
            ]
        );
    }

    #[test]
    fn empty_results_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/empty.csv");

        assert!(!write_results(&path, &ResultSet::Empty).unwrap());
        assert!(!write_results(&path, &ResultSet::Rows(vec![])).unwrap());
        assert!(!path.exists());
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn cells_render_json_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.csv");
        let results = ResultSet::Rows(vec![row(json!({
            "multi": ["a", "b"],
            "missing": null,
            "n": 3,
            "ok": true
        }))]);

        write_results(&path, &results).unwrap();

        let rows = read_csv(&path);
        assert_eq!(rows[0], vec!["missing", "multi", "n", "ok"]);
        assert_eq!(rows[1], vec!["", "a\nb", "3", "true"]);
    }

    #[test]
    fn progress_snapshot_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Reports/progress.csv");
        let mut done = ProgressRecord::new("errors", "DONE");
        done.progress_percent = 100.0;
        done.events = 42;
        done.runtime_secs = 3.7;

        write_progress(&path, &[ProgressRecord::new("stale", "PENDING")]).unwrap();
        write_progress(&path, &[done, ProgressRecord::new("later", "FAILED")]).unwrap();

        let rows = read_csv(&path);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], PROGRESS_HEADER.to_vec());
        assert_eq!(rows[1], vec!["errors", "DONE", "100.0", "42", "3.7"]);
        assert_eq!(rows[2][0], "later");
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn empty_progress_snapshot_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.csv");

        write_progress(&path, &[]).unwrap();

        assert_eq!(read_csv(&path), vec![PROGRESS_HEADER.to_vec()]);
    }
}
