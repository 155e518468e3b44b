//! CSV reading with header validation against a destination table.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::schema::TableDef;

/// Open `path` and deserialize every record into `T`, after checking that
/// the trimmed header set matches `table`'s column set exactly. Column
/// order in the file may differ from the table's; strays, duplicates, and
/// absences are hard errors.
pub fn rows<T: DeserializeOwned>(path: &Path, table: &TableDef) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|source| PipelineError::SourceFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .from_reader(BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();
    validate_columns(path, &headers, table)?;

    let mut records = Vec::new();
    for record in reader.deserialize::<T>() {
        let record = record.map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(record);
    }
    debug!(path = %path.display(), rows = records.len(), "parsed source file");
    Ok(records)
}

fn validate_columns(path: &Path, headers: &[String], table: &TableDef) -> Result<()> {
    let expected = table.column_names();
    let mut missing: Vec<String> = expected
        .iter()
        .filter(|column| !headers.iter().any(|header| header.as_str() == **column))
        .map(|column| column.to_string())
        .collect();
    let mut extra: Vec<String> = headers
        .iter()
        .filter(|header| !expected.iter().any(|column| *column == header.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() && extra.is_empty() {
        if headers.len() == expected.len() {
            return Ok(());
        }
        // same set, wrong multiplicity: report the duplicated headers
        extra = duplicated(headers);
    }
    missing.sort();
    extra.sort();
    Err(PipelineError::ColumnMismatch {
        path: path.to_path_buf(),
        missing,
        extra,
    })
}

fn duplicated(headers: &[String]) -> Vec<String> {
    let mut seen: Vec<&String> = Vec::new();
    let mut duplicates = Vec::new();
    for header in headers {
        if seen.contains(&header) {
            if !duplicates.contains(header) {
                duplicates.push(header.clone());
            }
        } else {
            seen.push(header);
        }
    }
    duplicates
}
