//! Error taxonomy for ingestion, persistence, and KPI computation.
//!
//! Row-level variants ([`KpiError::MalformedIdentifier`],
//! [`KpiError::MissingJoinKey`], [`KpiError::InvalidField`],
//! [`KpiError::InvalidTimestamp`]) are absorbed by the caller and counted.
//! [`KpiError::InvalidAmount`] fails a single KPI. The remaining variants
//! abort the stage that raised them.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KpiError {
    #[error("store at {path:?} is unreachable: {source}")]
    ConnectionFailure {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("identifier '{raw}' for {field} contains no usable digits")]
    MalformedIdentifier { field: &'static str, raw: String },
    #[error("{kind} row {row} has no mobile_number")]
    MissingJoinKey { kind: &'static str, row: usize },
    #[error("order {order_id} has non-numeric total_amount '{raw}'")]
    InvalidAmount { order_id: i64, raw: String },
    #[error("order {order_id} has unparseable order_date_time '{raw}'")]
    InvalidTimestamp { order_id: i64, raw: String },
    #[error("{field} value '{raw}' is not valid")]
    InvalidField { field: &'static str, raw: String },
    #[error("no input file found (tried {})", display_candidates(.candidates))]
    NoInputFile { candidates: Vec<PathBuf> },
    #[error("required column '{column}' missing from {path:?}")]
    MissingColumn { column: &'static str, path: PathBuf },
    #[error("store query failed: {0}")]
    Store(#[from] rusqlite::Error),
}

impl KpiError {
    /// Short, stable label used when tallying row rejections.
    pub fn reason(&self) -> &'static str {
        match self {
            KpiError::ConnectionFailure { .. } => "connection_failure",
            KpiError::MalformedIdentifier { .. } => "malformed_identifier",
            KpiError::MissingJoinKey { .. } => "missing_join_key",
            KpiError::InvalidAmount { .. } => "invalid_amount",
            KpiError::InvalidTimestamp { .. } => "invalid_timestamp",
            KpiError::InvalidField { .. } => "invalid_field",
            KpiError::NoInputFile { .. } => "no_input_file",
            KpiError::MissingColumn { .. } => "missing_column",
            KpiError::Store(_) => "store",
        }
    }
}

fn display_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| format!("{p:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}
