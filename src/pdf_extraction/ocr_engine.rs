// OCR engine backends and OCR text clean-up
use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::process::Command;

/// Turns a rendered page into text.
pub trait OcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// OCR through the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let input = tempfile::Builder::new()
            .prefix("statement-page-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .context("failed to write page image for OCR")?;

        let output = match Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
        {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                bail!("OCR engine {} is not installed", self.command)
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} failed: {}", self.command, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

static NUMBER_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(zero|one|two|three|four|five|six|seven|eight|nine)\b")
        .expect("number word regex")
});

static DASHED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*[\u{2013}\u{2014}]\s*(\d)").expect("dashed date regex"));

/// Split raw OCR output into corrected lines, dropping fragments of
/// `min_len` characters or fewer.
pub fn clean_ocr_text(raw: &str, min_len: usize) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > min_len)
        .map(correct_ocr_line)
        .collect()
}

/// Fix the substitutions OCR makes most often on statements.
pub fn correct_ocr_line(line: &str) -> String {
    let line = DASHED_DATE.replace_all(line, "$1/$2");
    let line = NUMBER_WORD.replace_all(&line, |caps: &regex::Captures| {
        digit_for(&caps[1]).to_string()
    });
    line.split(' ')
        .map(correct_numeric_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn digit_for(word: &str) -> char {
    match word.to_lowercase().as_str() {
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        _ => '9',
    }
}

/// Letters that look like digits are only replaced inside tokens that are
/// mostly numeric, so words like "Interest" survive.
fn correct_numeric_token(token: &str) -> String {
    let digits = token.chars().filter(char::is_ascii_digit).count();
    let lookalikes = token.chars().filter(|c| matches!(c, 'I' | 'l' | 'O')).count();
    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    if digits == 0 || letters > lookalikes {
        return token.to_string();
    }
    token
        .chars()
        .map(|c| match c {
            'I' | 'l' => '1',
            'O' => '0',
            other => other,
        })
        .collect()
}
