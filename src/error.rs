use thiserror::Error;

pub type Result<T> = std::result::Result<T, PresenceError>;

/// Fatal errors. Per-row problems are reported as [`crate::models::ParseIssue`] instead.
#[derive(Error, Debug)]
pub enum PresenceError {
    /// Required input columns are absent from the table header.
    #[error("input is missing required fields: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Unrecognized or out-of-range configuration option.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A grouping field that is neither an event field nor a hierarchy level.
    #[error("unknown grouping field: {0}")]
    UnknownField(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
