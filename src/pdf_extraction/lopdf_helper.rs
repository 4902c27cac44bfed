// lopdf helper - text layer reading and object resolution
use anyhow::{Context, Result};
use lopdf::{Document, Object};

use crate::types::RawDocument;

/// Reads the embedded text layer of a PDF.
pub trait TextLayerReader {
    fn extract_text(&self, document: &RawDocument) -> Result<String>;
}

/// Text-layer reader backed by lopdf's content-stream text extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextReader;

impl TextLayerReader for LopdfTextReader {
    fn extract_text(&self, document: &RawDocument) -> Result<String> {
        let pdf = load_document(document)?;
        let mut text = String::new();
        for page_number in pdf.get_pages().keys() {
            let page_text = pdf
                .extract_text(&[*page_number])
                .with_context(|| format!("failed to read text layer of page {}", page_number))?;
            text.push_str(&page_text);
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }
        Ok(text)
    }
}

/// Load a PDF from the uploaded bytes
pub fn load_document(document: &RawDocument) -> Result<Document> {
    Document::load_mem(&document.bytes)
        .with_context(|| format!("{} is not a readable PDF", document.filename))
}

/// Follow a reference to the object it points at; other objects pass through.
pub fn resolve<'a>(pdf: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => pdf.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Numeric value of a dictionary entry, following references.
pub fn number(pdf: &Document, object: &Object) -> Option<f32> {
    match resolve(pdf, object)? {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_text_layer() {
        let bytes = fixtures::text_pdf(&["01/02/2024 Payment to ABC 100.00 500.00", "Closing"]);
        let text = LopdfTextReader
            .extract_text(&RawDocument::new("fixture.pdf", bytes))
            .unwrap();
        assert!(text.contains("Payment to ABC"));
        assert!(text.contains("100.00"));
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let result = LopdfTextReader.extract_text(&RawDocument::new("notes.txt", b"hello".to_vec()));
        assert!(result.is_err());
    }
}
