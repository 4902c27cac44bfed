// PDF extraction module
pub mod budget;
pub mod document_processor;
pub mod extraction_router;
pub mod lopdf_helper;
pub mod metadata;
pub mod ocr_engine;
pub mod ocr_pipeline;
pub mod page_renderer;
pub mod reconstruct;
pub mod system_pdf_renderer;

pub use budget::TimeBudget;
pub use document_processor::{DocumentExtractor, ExtractionResult};
pub use extraction_router::{determine_route, OcrReason, QualityMetrics, Route};
pub use lopdf_helper::{LopdfTextReader, TextLayerReader};
pub use metadata::MetadataAccumulator;
pub use ocr_engine::{OcrEngine, TesseractOcr};
pub use ocr_pipeline::{OcrOutput, OcrPipeline};
pub use page_renderer::{EmbeddedImageRenderer, PageRenderer, RenderSession};
pub use reconstruct::{is_transaction, reconstruct_lines};
pub use system_pdf_renderer::{ExternalRasterizer, SystemPdfRenderer};
