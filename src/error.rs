use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type covering the failure cases between upload and final answer.
///
/// Analytic tools never surface this type: they degrade to report strings at
/// their own boundary. `AgentError` travels only through the loader, the
/// archive service and the reasoning engine, and is converted to a
/// user-facing message at the orchestration boundary.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Archive entry whose path would land outside the extraction root.
    #[error("unsafe archive entry: {0}")]
    UnsafeArchiveEntry(String),

    /// Workbook without a readable first sheet.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// No uploaded file matched the marker for this dataset.
    #[error("required dataset not found: no file name contains '{0}'")]
    MissingDataset(&'static str),

    /// The reasoning engine replied with something the loop cannot use.
    #[error("reasoning engine error: {0}")]
    Engine(String),
}
