//! Unified error handling for crash-trajectory linkage.
//!
//! Per-point and per-trip failures are recovered locally by the callers
//! (skip and continue) so one malformed record never aborts a batch run.
//! Only startup configuration problems (missing input table, empty crash
//! set) are treated as fatal.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for linkage operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors produced while linking trajectories to crashes.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A token in an encoded path/time/speed/acceleration sequence could
    /// not be parsed. The affected point is skipped, not the trip.
    #[error("failed to parse {field} token '{token}' at position {position}")]
    Parse {
        field: &'static str,
        token: String,
        position: usize,
    },

    /// Longitude/latitude outside valid WGS84 ranges. The point is dropped.
    #[error("coordinate out of range: lon {longitude}, lat {latitude}")]
    InvalidCoordinate { longitude: f64, latitude: f64 },

    /// A trip produced no usable query batch for the spatial index.
    /// The trip is skipped and logged.
    #[error("index query failed for trip '{trip_id}': {reason}")]
    IndexQuery { trip_id: String, reason: String },

    /// A crash id referenced by a match is not present in the crash store.
    #[error("unknown crash id '{crash_id}'")]
    UnknownCrash { crash_id: String },

    /// The crash set is empty. Fatal at startup.
    #[error("crash set is empty")]
    EmptyCrashSet,

    /// A required input file is missing. Fatal at startup.
    #[error("missing input file: {path}")]
    MissingInput { path: PathBuf },

    /// A required column is absent from an input table.
    #[error("input table {path} is missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("checkpoint serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extension trait for ergonomic Option-to-error conversion.
pub trait OptionExt<T> {
    /// Convert `None` into [`LinkError::UnknownCrash`] for the given id.
    fn ok_or_unknown_crash(self, crash_id: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unknown_crash(self, crash_id: &str) -> Result<T> {
        self.ok_or_else(|| LinkError::UnknownCrash {
            crash_id: crash_id.to_string(),
        })
    }
}
