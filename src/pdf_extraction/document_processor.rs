// Hybrid text-layer / OCR extraction for one statement document
use serde::Serialize;
use tracing::{debug, info, warn};

use super::budget::TimeBudget;
use super::extraction_router::{
    determine_route, reconstruction_acceptable, OcrReason, QualityMetrics, Route,
};
use super::lopdf_helper::{LopdfTextReader, TextLayerReader};
use super::metadata::MetadataAccumulator;
use super::ocr_engine::TesseractOcr;
use super::ocr_pipeline::OcrPipeline;
use super::page_renderer::EmbeddedImageRenderer;
use super::reconstruct::reconstruct_lines;
use super::system_pdf_renderer::SystemPdfRenderer;
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::types::{ExtractionStrategy, RawDocument};

/// Everything one `parse_document` call learned about a document. Metadata
/// lives here rather than on the extractor so nothing carries over between
/// documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub lines: Vec<String>,
    pub strategy: ExtractionStrategy,
    /// Metrics of the text layer, absent when the text layer could not be read.
    pub metrics: Option<QualityMetrics>,
    pub ocr_reason: Option<OcrReason>,
    pub ocr_truncated: bool,
    pub account_number: Option<String>,
    pub statement_period: Option<String>,
}

impl ExtractionResult {
    pub fn ocr_reason_text(&self) -> Option<&'static str> {
        self.ocr_reason.map(|r| r.describe())
    }
}

pub struct DocumentExtractor {
    config: IngestConfig,
    text_reader: Box<dyn TextLayerReader>,
    ocr: OcrPipeline,
}

impl DocumentExtractor {
    pub fn new(config: IngestConfig, text_reader: Box<dyn TextLayerReader>, ocr: OcrPipeline) -> Self {
        Self {
            config,
            text_reader,
            ocr,
        }
    }

    /// lopdf text layer, in-process image renderer, tesseract and the
    /// configured external rasterizer.
    pub fn from_config(config: &IngestConfig) -> Self {
        let ocr = OcrPipeline::new(
            Box::new(EmbeddedImageRenderer),
            Box::new(TesseractOcr::new(&config.ocr_command, &config.ocr_language)),
            Box::new(SystemPdfRenderer::new(
                &config.external_tool,
                config.external_tool_timeout(),
            )),
            config.ocr_dpi,
            config.ocr_min_line_len,
        );
        Self::new(config.clone(), Box::new(LopdfTextReader), ocr)
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Extract ordered, trimmed, non-empty lines with a fresh time budget.
    pub fn parse_document(&self, document: &RawDocument) -> Result<ExtractionResult> {
        self.parse_document_within(document, &TimeBudget::start(self.config.time_budget()))
    }

    /// Same as [`parse_document`](Self::parse_document) but charged against a
    /// budget the caller already started.
    pub fn parse_document_within(
        &self,
        document: &RawDocument,
        budget: &TimeBudget,
    ) -> Result<ExtractionResult> {
        info!("extracting {} ({} bytes)", document.filename, document.len());

        let text_layer = match self.text_reader.extract_text(document) {
            Ok(text) => Some(non_empty_lines(&text)),
            Err(e) => {
                warn!("text layer unreadable for {}: {:#}", document.filename, e);
                None
            }
        };
        budget.check("text layer")?;

        let (route, metrics) = match &text_layer {
            Some(lines) => {
                let metrics = QualityMetrics::measure(lines, self.config.short_line_len);
                debug!(?metrics, "text layer quality");
                (determine_route(&metrics, &self.config), Some(metrics))
            }
            None => (Route::ForceOcr(OcrReason::TextLayerError), None),
        };
        let text_layer = text_layer.unwrap_or_default();

        let (lines, strategy, ocr_reason) = match route {
            Route::UseTextLayer => {
                info!("using text layer ({} lines)", text_layer.len());
                (text_layer.clone(), ExtractionStrategy::TextLayer, None)
            }
            Route::Reconstruct => {
                let rebuilt = reconstruct_lines(&text_layer, self.config.max_fragment_len);
                if reconstruction_acceptable(text_layer.len(), rebuilt.len(), &self.config) {
                    info!(
                        "reconstructed {} fragments into {} lines",
                        text_layer.len(),
                        rebuilt.len()
                    );
                    (rebuilt, ExtractionStrategy::Reconstructed, None)
                } else {
                    (Vec::new(), ExtractionStrategy::Ocr, Some(OcrReason::ReconstructionFailed))
                }
            }
            Route::ForceOcr(reason) => (Vec::new(), ExtractionStrategy::Ocr, Some(reason)),
        };

        let mut metadata = MetadataAccumulator::new();
        let mut ocr_truncated = false;
        let lines = match ocr_reason {
            None => {
                metadata.observe_all(&text_layer);
                lines
            }
            Some(reason) => {
                info!("forcing OCR for {}: {}", document.filename, reason.describe());
                let output = self.ocr.extract_with_ocr(document, budget)?;
                if output.truncated && output.lines.is_empty() {
                    return Err(IngestError::TimeoutExceeded {
                        stage: "ocr",
                        elapsed: budget.elapsed(),
                        budget: budget.limit(),
                    });
                }
                ocr_truncated = output.truncated;
                metadata.observe_all(&output.lines);
                output.lines
            }
        };

        if lines.is_empty() {
            return Err(IngestError::ExtractionFailure {
                filename: document.filename.clone(),
            });
        }

        let (account_number, statement_period) = metadata.into_parts();
        Ok(ExtractionResult {
            lines,
            strategy,
            metrics,
            ocr_reason,
            ocr_truncated,
            account_number,
            statement_period,
        })
    }
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
