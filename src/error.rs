use thiserror::Error;

/// Terminal states a single dashboard pass can end in. All of these are
/// reported to the user and leave the session ready for the next selection;
/// none of them abort the process.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Statistics POST failed (transport error or non-200 status).
    #[error("statistics query failed: {reason}")]
    FetchFailed { reason: String },

    /// Geometry download or parse failed.
    #[error("geometry source failed: {reason}")]
    GeometryFetchFailed { reason: String },

    /// A required indicator column is absent from the fetched table.
    #[error("indicator table is missing column `{column}`")]
    MissingColumn { column: String },

    /// The join produced zero rows: name mismatch between sources.
    #[error("no county names matched between statistics and geometry")]
    ReconciliationEmpty,

    /// The join succeeded but nothing plottable remains for the selection.
    #[error("no plottable data for year {year}")]
    NoDataForYear { year: i32 },
}

/// How loudly a terminal state should be reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl PipelineError {
    /// `NoDataForYear` is an expected outcome of a sparse selection, not a
    /// fault; everything else is an error.
    pub fn severity(&self) -> Severity {
        match self {
            PipelineError::NoDataForYear { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
