// Configuration for statement ingestion
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::{IngestError, Result};

/// Tuned thresholds and tool locations for one ingestion pipeline.
///
/// The quality thresholds were tuned by hand against a small set of bank
/// statements and are kept here so they can be recalibrated without touching
/// the routing code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Short-line ratio above which the text layer is treated as image-based.
    pub short_line_ratio_ocr: f64,
    /// Short-line ratio above which line reconstruction is attempted.
    pub short_line_ratio_reconstruct: f64,
    pub min_amount_hits: usize,
    pub min_financial_term_hits: usize,
    /// Reconstructed lines must keep at least this share of the original lines.
    pub reconstruction_min_retention: f64,
    /// Lines shorter than this (in chars) count as short.
    pub short_line_len: usize,
    /// Fragments longer than this are treated as complete lines.
    pub max_fragment_len: usize,
    /// OCR lines of this length or less are dropped.
    pub ocr_min_line_len: usize,
    pub ocr_dpi: u32,
    pub time_budget_secs: u64,
    pub max_upload_bytes: usize,
    pub external_tool: String,
    pub external_tool_timeout_secs: u64,
    pub ocr_command: String,
    pub ocr_language: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            short_line_ratio_ocr: 0.8,
            short_line_ratio_reconstruct: 0.6,
            min_amount_hits: 5,
            min_financial_term_hits: 3,
            reconstruction_min_retention: 0.5,
            short_line_len: 20,
            max_fragment_len: 80,
            ocr_min_line_len: 3,
            ocr_dpi: 200,
            time_budget_secs: 240,
            max_upload_bytes: 10 * 1024 * 1024,
            external_tool: "pdftoppm".to_string(),
            external_tool_timeout_secs: 120,
            ocr_command: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
        }
    }
}

impl IngestConfig {
    /// Defaults, then an optional TOML file, then `STATEMENT_INGEST_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw).map_err(|e| {
                    IngestError::Config(format!("{}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(secs) = env_number("STATEMENT_INGEST_TIME_BUDGET_SECS")? {
            self.time_budget_secs = secs;
        }
        if let Some(bytes) = env_number("STATEMENT_INGEST_MAX_UPLOAD_BYTES")? {
            self.max_upload_bytes = bytes as usize;
        }
        if let Some(dpi) = env_number("STATEMENT_INGEST_OCR_DPI")? {
            self.ocr_dpi = dpi as u32;
        }
        if let Ok(tool) = env::var("STATEMENT_INGEST_EXTERNAL_TOOL") {
            self.external_tool = tool;
        }
        if let Ok(cmd) = env::var("STATEMENT_INGEST_OCR_COMMAND") {
            self.ocr_command = cmd;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("short_line_ratio_ocr", self.short_line_ratio_ocr),
            ("short_line_ratio_reconstruct", self.short_line_ratio_reconstruct),
            ("reconstruction_min_retention", self.reconstruction_min_retention),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(IngestError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.short_line_ratio_reconstruct > self.short_line_ratio_ocr {
            return Err(IngestError::Config(
                "short_line_ratio_reconstruct must not exceed short_line_ratio_ocr".to_string(),
            ));
        }
        if self.ocr_dpi == 0 {
            return Err(IngestError::Config("ocr_dpi must be positive".to_string()));
        }
        Ok(())
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    pub fn external_tool_timeout(&self) -> Duration {
        Duration::from_secs(self.external_tool_timeout_secs)
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| IngestError::Config(format!("{} is not a number: {}", key, raw))),
        Err(_) => Ok(None),
    }
}
