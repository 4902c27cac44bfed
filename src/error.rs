// Error types for statement ingestion
use chrono::NaiveDate;
use std::time::Duration;

/// Document-level failures. Any of these aborts the whole upload.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no usable text could be extracted from {filename}")]
    ExtractionFailure { filename: String },

    #[error("processing budget of {budget:?} exceeded at {stage} after {elapsed:?}")]
    TimeoutExceeded {
        stage: &'static str,
        elapsed: Duration,
        budget: Duration,
    },

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    OversizedInput { size: usize, limit: usize },

    #[error("statement period {raw:?} could not be parsed; cannot check it against the fiscal period")]
    StatementPeriodUnparseable { raw: Option<String> },

    #[error(
        "statement period {statement_start} to {statement_end} does not overlap fiscal period \
         {fiscal_start} to {fiscal_end}"
    )]
    FiscalPeriodOverlapMismatch {
        statement_start: NaiveDate,
        statement_end: NaiveDate,
        fiscal_start: NaiveDate,
        fiscal_end: NaiveDate,
    },

    #[error("fiscal period {period_id} not found for company {company_id}")]
    UnknownFiscalPeriod { company_id: i64, period_id: i64 },

    #[error("failed to persist transaction: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure while rendering a single page in-process.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("could not load document for rendering: {0}")]
    Load(String),

    #[error("page {0} not found")]
    MissingPage(usize),

    #[error("font resolution failed on page {page}: {detail}")]
    FontResolution { page: usize, detail: String },

    #[error("could not decode page {page} image: {detail}")]
    Decode { page: usize, detail: String },
}

/// Message fragments that identify a defect in the rendering subsystem itself,
/// as opposed to a single unreadable page.
const SUBSYSTEM_DEFECT_MARKERS: &[&str] = &[
    "font resolution",
    "missing font",
    "glyph",
    "cmap",
];

impl RenderError {
    /// True when the renderer cannot be trusted for the rest of the document.
    pub fn is_subsystem_defect(&self) -> bool {
        if matches!(self, RenderError::FontResolution { .. }) {
            return true;
        }
        let message = self.to_string().to_lowercase();
        SUBSYSTEM_DEFECT_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

/// Failure of the external rasterizer subprocess.
#[derive(Debug, thiserror::Error)]
pub enum RasterizeError {
    #[error("external rasterizer {0} is not available on this host")]
    ExternalToolUnavailable(String),

    #[error("external rasterizer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("external rasterizer failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single line that a format parser claimed but could not turn into a
/// transaction. Recorded and skipped; never aborts the document.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line_number} ({parser}): {message}")]
pub struct ParserError {
    pub line_number: usize,
    pub parser: &'static str,
    pub line: String,
    pub message: String,
}

impl ParserError {
    pub fn new(parser: &'static str, line: &str, message: impl Into<String>) -> Self {
        Self {
            line_number: 0,
            parser,
            line: line.to_string(),
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line_number: usize) -> Self {
        self.line_number = line_number;
        self
    }
}
