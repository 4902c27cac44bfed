// Bank statement ingestion: hybrid PDF text/OCR extraction and transaction parsing
pub mod config;
pub mod error;
pub mod ingestion;
pub mod parsers;
pub mod patterns;
pub mod pdf_extraction;
pub mod statement_period;
pub mod types;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use ingestion::{IngestRequest, LedgerServices, StatementIngestor};
pub use pdf_extraction::{DocumentExtractor, ExtractionResult};
pub use statement_period::parse_statement_period;
