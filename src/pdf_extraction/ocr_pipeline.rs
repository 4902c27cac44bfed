// Page-by-page OCR with an external rasterizer fallback
use std::path::Path;

use tracing::{debug, info, warn};

use super::budget::TimeBudget;
use super::ocr_engine::{clean_ocr_text, OcrEngine};
use super::page_renderer::PageRenderer;
use super::system_pdf_renderer::ExternalRasterizer;
use crate::error::{RasterizeError, Result};
use crate::types::RawDocument;

/// Lines recovered by OCR. `truncated` is set when the time budget ran out
/// after OCR had started; the lines from earlier pages are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    pub lines: Vec<String>,
    pub truncated: bool,
    pub used_external_rasterizer: bool,
}

pub struct OcrPipeline {
    renderer: Box<dyn PageRenderer>,
    engine: Box<dyn OcrEngine>,
    rasterizer: Box<dyn ExternalRasterizer>,
    dpi: u32,
    min_line_len: usize,
}

impl OcrPipeline {
    pub fn new(
        renderer: Box<dyn PageRenderer>,
        engine: Box<dyn OcrEngine>,
        rasterizer: Box<dyn ExternalRasterizer>,
        dpi: u32,
        min_line_len: usize,
    ) -> Self {
        Self {
            renderer,
            engine,
            rasterizer,
            dpi,
            min_line_len,
        }
    }

    /// OCR every page in order. Only an exhausted budget before any page is
    /// attempted is an error; everything else degrades to fewer lines.
    pub fn extract_with_ocr(&self, document: &RawDocument, budget: &TimeBudget) -> Result<OcrOutput> {
        budget.check("ocr start")?;

        let session = match self.renderer.open(document) {
            Ok(session) => session,
            Err(e) => {
                warn!("renderer failed to initialise ({}), trying external rasterizer", e);
                return Ok(self.external_fallback(document, budget, OcrOutput::default()));
            }
        };

        let mut output = OcrOutput::default();
        let page_count = session.page_count();
        for index in 0..page_count {
            if budget.is_exhausted() {
                warn!(page = index + 1, page_count, "time budget exhausted during OCR");
                output.truncated = true;
                break;
            }
            debug!(page = index + 1, page_count, "rendering page");
            let image = match session.render_page(index, self.dpi) {
                Ok(image) => image,
                Err(e) if e.is_subsystem_defect() => {
                    warn!("renderer defect on page {} ({}), switching to external rasterizer", index + 1, e);
                    return Ok(self.external_fallback(document, budget, output));
                }
                Err(e) => {
                    warn!("skipping page {}: {}", index + 1, e);
                    continue;
                }
            };
            self.recognize_into(&image, index + 1, &mut output.lines);
        }

        info!(lines = output.lines.len(), pages = page_count, "OCR finished");
        Ok(output)
    }

    fn recognize_into(&self, image: &image::DynamicImage, page: usize, lines: &mut Vec<String>) {
        match self.engine.recognize(image) {
            Ok(text) => lines.extend(clean_ocr_text(&text, self.min_line_len)),
            Err(e) => warn!("OCR failed on page {}: {:#}", page, e),
        }
    }

    /// Rasterize with the external tool and OCR its images. If that cannot
    /// run, whatever `collected` holds is returned unchanged.
    fn external_fallback(
        &self,
        document: &RawDocument,
        budget: &TimeBudget,
        collected: OcrOutput,
    ) -> OcrOutput {
        // Dropping the TempDir removes every image written below.
        let workdir = match tempfile::Builder::new().prefix("statement-raster-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("cannot create rasterizer workspace: {}", e);
                return collected;
            }
        };

        match self.rasterize_and_recognize(document, workdir.path(), budget) {
            Ok(output) => output,
            Err(RasterizeError::ExternalToolUnavailable(tool)) => {
                warn!("external rasterizer {} unavailable, keeping {} OCR lines", tool, collected.lines.len());
                collected
            }
            Err(e) => {
                warn!("external rasterizer failed: {}", e);
                collected
            }
        }
    }

    fn rasterize_and_recognize(
        &self,
        document: &RawDocument,
        workdir: &Path,
        budget: &TimeBudget,
    ) -> std::result::Result<OcrOutput, RasterizeError> {
        let input = workdir.join("statement.pdf");
        std::fs::write(&input, &document.bytes)?;
        let pages = self.rasterizer.rasterize(&input, &workdir.join("page"), self.dpi)?;

        let mut output = OcrOutput {
            used_external_rasterizer: true,
            ..OcrOutput::default()
        };
        for (index, path) in pages.iter().enumerate() {
            if budget.is_exhausted() {
                warn!(page = index + 1, "time budget exhausted during external OCR");
                output.truncated = true;
                break;
            }
            match image::open(path) {
                Ok(image) => self.recognize_into(&image, index + 1, &mut output.lines),
                Err(e) => warn!("cannot read rasterized page {}: {}", path.display(), e),
            }
        }
        info!(lines = output.lines.len(), pages = pages.len(), "external OCR finished");
        Ok(output)
    }
}
