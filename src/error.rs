//! Error taxonomy for the load pipeline.
//!
//! Every variant is fatal to the run; the one lenient path (timestamp
//! coercion) is handled as a counted warning in `load::coerce`, not here.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required environment variable is unset or empty.
    #[error("missing required configuration: {name}")]
    MissingConfiguration { name: &'static str },

    /// An optional environment variable is set to something unusable.
    #[error("invalid configuration value for {name}: {value:?}")]
    InvalidConfiguration { name: &'static str, value: String },

    /// TCP-level failure reaching the server.
    #[error("tcp connect to {addr} failed: {source}")]
    Tcp {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS or login failure while establishing the database session.
    #[error("connecting to {host} failed: {source}")]
    Connection {
        host: String,
        #[source]
        source: tiberius::error::Error,
    },

    /// The connection attempt did not complete within the configured bound.
    #[error("connection to {host} timed out after {timeout:?}")]
    ConnectTimeout { host: String, timeout: Duration },

    /// DDL was rejected while creating or widening a table.
    #[error("schema reconciliation of {table} failed: {source}")]
    SchemaReconciliation {
        table: &'static str,
        #[source]
        source: tiberius::error::Error,
    },

    /// A source file is missing or unreadable.
    #[error("cannot read source file {}: {source}", .path.display())]
    SourceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV: ragged row, bad quoting, invalid UTF-8.
    #[error("csv error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Header set does not match the destination table's column set.
    #[error("{}: column set mismatch; missing {missing:?}, unexpected {extra:?}", .path.display())]
    ColumnMismatch {
        path: PathBuf,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// A non-timestamp value failed strict parsing. `line` counts data
    /// rows from 1, excluding the header.
    #[error("{} data row {line}, column {column}: cannot parse {value:?} as {expected}", .path.display())]
    ValueParse {
        path: PathBuf,
        line: u64,
        column: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Truncate, bulk insert, or commit failed; the transaction was rolled
    /// back and the table keeps its previous contents.
    #[error("bulk insert into {table} failed during {phase}: {source}")]
    BulkInsert {
        table: &'static str,
        phase: &'static str,
        #[source]
        source: tiberius::error::Error,
    },

    /// A post-load verification query failed. The load itself is already
    /// committed when this fires.
    #[error("verification query failed: {source}")]
    Verification {
        #[source]
        source: tiberius::error::Error,
    },
}
