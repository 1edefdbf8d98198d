use thiserror::Error;

/// Errors raised while loading, filtering, aggregating or exporting a dashboard
///
/// Every library operation returns this type. The web layer turns it into a
/// JSON error body and the binaries print it, so the `Display` text is what
/// the user eventually sees.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("XLSX export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error("Email failed: {0}")]
    Mail(String),

    /// The guard clause: expected columns are absent from the uploaded table.
    #[error("Missing expected columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Invalid number {value:?} in column {column:?} (row {row})")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File is empty")]
    EmptyFile,

    #[error("Nothing to plot for chart {0:?}")]
    EmptySeries(String),

    #[error("Unknown dashboard profile: {0}")]
    UnknownProfile(String),

    #[error("Unknown chart: {0}")]
    UnknownChart(String),

    #[error("No data loaded for this session")]
    NoSession,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
