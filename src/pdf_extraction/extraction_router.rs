// Quality-driven routing between the text layer, line reconstruction and OCR
use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::patterns::{self, contains_word};

/// Words that show up on the text layer of a real statement. A layer that has
/// none of these is usually a watermark or a scanned page with a header.
const FINANCIAL_TERMS: &[&str] = &[
    "balance", "payment", "deposit", "withdrawal", "transfer", "fee", "interest",
    "debit", "credit", "account", "statement", "charge", "salary", "atm", "eft",
];

/// Counts over a candidate line set. Computed per extraction attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_lines: usize,
    pub short_lines: usize,
    pub date_hits: usize,
    pub amount_hits: usize,
    pub financial_term_hits: usize,
}

impl QualityMetrics {
    pub fn measure<S: AsRef<str>>(lines: &[S], short_line_len: usize) -> Self {
        let mut metrics = Self::default();
        for line in lines.iter().map(|l| l.as_ref().trim()).filter(|l| !l.is_empty()) {
            metrics.total_lines += 1;
            if line.chars().count() < short_line_len {
                metrics.short_lines += 1;
            }
            if patterns::starts_with_date(line) {
                metrics.date_hits += 1;
            }
            if patterns::AMOUNT.is_match(line) {
                metrics.amount_hits += 1;
            }
            let lower = line.to_lowercase();
            if FINANCIAL_TERMS.iter().any(|term| contains_word(&lower, term)) {
                metrics.financial_term_hits += 1;
            }
        }
        metrics
    }

    pub fn short_line_ratio(&self) -> f64 {
        if self.total_lines == 0 {
            return 0.0;
        }
        self.short_lines as f64 / self.total_lines as f64
    }
}

/// What to do with a text layer after measuring it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    UseTextLayer,
    Reconstruct,
    ForceOcr(OcrReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrReason {
    NoText,
    LikelyImageBased,
    InsufficientFinancialContent,
    ReconstructionFailed,
    TextLayerError,
}

impl OcrReason {
    pub fn describe(&self) -> &'static str {
        match self {
            OcrReason::NoText => "no text extracted",
            OcrReason::LikelyImageBased => "likely image-based",
            OcrReason::InsufficientFinancialContent => "insufficient financial content",
            OcrReason::ReconstructionFailed => "reconstruction failed to improve quality",
            OcrReason::TextLayerError => "text layer extraction failed",
        }
    }
}

/// First matching rule wins.
pub fn determine_route(metrics: &QualityMetrics, config: &IngestConfig) -> Route {
    if metrics.total_lines == 0 {
        return Route::ForceOcr(OcrReason::NoText);
    }
    let ratio = metrics.short_line_ratio();
    if ratio > config.short_line_ratio_ocr {
        return Route::ForceOcr(OcrReason::LikelyImageBased);
    }
    if metrics.amount_hits < config.min_amount_hits
        && metrics.financial_term_hits < config.min_financial_term_hits
    {
        return Route::ForceOcr(OcrReason::InsufficientFinancialContent);
    }
    if ratio > config.short_line_ratio_reconstruct {
        return Route::Reconstruct;
    }
    Route::UseTextLayer
}

/// Whether a reconstructed line set kept enough of the original content.
pub fn reconstruction_acceptable(
    original_lines: usize,
    reconstructed_lines: usize,
    config: &IngestConfig,
) -> bool {
    reconstructed_lines as f64 >= config.reconstruction_min_retention * original_lines as f64
}
