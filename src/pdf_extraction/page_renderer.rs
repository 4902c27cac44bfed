// In-process page rendering from embedded page images
use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::lopdf_helper::{number, resolve};
use crate::error::RenderError;
use crate::types::RawDocument;

/// Rasterizes pages of a document. `open` failing means the renderer could
/// not initialise for this document at all.
pub trait PageRenderer {
    fn open(&self, document: &RawDocument) -> Result<Box<dyn RenderSession>, RenderError>;
}

pub trait RenderSession {
    fn page_count(&self) -> usize;
    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, RenderError>;
}

/// Renders scanned statements by decoding the page's own raster image.
///
/// Scanned PDFs carry one full-page image per page, so decoding it is
/// enough. Pages drawn with fonts and vector operators need real glyph
/// rasterization, which this renderer reports as a font-resolution failure
/// so callers can hand the document to an external rasterizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedImageRenderer;

impl PageRenderer for EmbeddedImageRenderer {
    fn open(&self, document: &RawDocument) -> Result<Box<dyn RenderSession>, RenderError> {
        let pdf = Document::load_mem(&document.bytes)
            .map_err(|e| RenderError::Load(format!("{}: {}", document.filename, e)))?;
        let pages = pdf.get_pages().into_values().collect();
        Ok(Box::new(EmbeddedImageSession { pdf, pages }))
    }
}

struct EmbeddedImageSession {
    pdf: Document,
    pages: Vec<ObjectId>,
}

impl RenderSession for EmbeddedImageSession {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, RenderError> {
        let page_id = *self.pages.get(index).ok_or(RenderError::MissingPage(index))?;
        let page = self
            .pdf
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| RenderError::Decode { page: index, detail: e.to_string() })?;

        let Some(stream) = largest_image(&self.pdf, page) else {
            let content = self.pdf.get_page_content(page_id).unwrap_or_default();
            if content.iter().any(|b| !b.is_ascii_whitespace()) {
                return Err(RenderError::FontResolution {
                    page: index,
                    detail: "page content needs glyph rasterization".to_string(),
                });
            }
            return Err(RenderError::Decode {
                page: index,
                detail: "page is blank".to_string(),
            });
        };

        let image = decode_image(stream).map_err(|detail| RenderError::Decode { page: index, detail })?;
        Ok(scale_to_dpi(image, page_width_points(&self.pdf, page), dpi))
    }
}

/// Page attributes such as Resources and MediaBox may live on an ancestor.
fn inherited<'a>(pdf: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..32 {
        if let Ok(object) = current.get(key) {
            return resolve(pdf, object);
        }
        let parent = current.get(b"Parent").ok()?;
        current = resolve(pdf, parent)?.as_dict().ok()?;
    }
    None
}

fn page_width_points(pdf: &Document, page: &Dictionary) -> f32 {
    let bounds: Vec<f32> = match inherited(pdf, page, b"MediaBox") {
        Some(Object::Array(values)) => values.iter().filter_map(|v| number(pdf, v)).collect(),
        _ => Vec::new(),
    };
    if bounds.len() == 4 {
        (bounds[2] - bounds[0]).abs()
    } else {
        // US Letter
        612.0
    }
}

fn largest_image<'a>(pdf: &'a Document, page: &'a Dictionary) -> Option<&'a Stream> {
    let resources = inherited(pdf, page, b"Resources")?.as_dict().ok()?;
    let xobjects = resolve(pdf, resources.get(b"XObject").ok()?)?.as_dict().ok()?;

    xobjects
        .iter()
        .filter_map(|(_, object)| match resolve(pdf, object)? {
            Object::Stream(stream) => Some(stream),
            _ => None,
        })
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|name| name == b"Image")
                .unwrap_or(false)
        })
        .max_by_key(|stream| {
            let width = stream.dict.get(b"Width").ok().and_then(|o| number(pdf, o)).unwrap_or(0.0);
            let height = stream.dict.get(b"Height").ok().and_then(|o| number(pdf, o)).unwrap_or(0.0);
            (width * height) as u64
        })
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(names)) => names
            .iter()
            .filter_map(|n| n.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image(stream: &Stream) -> Result<DynamicImage, String> {
    let filters = filters(stream);
    match filters.as_slice() {
        [only] if only.as_slice() == b"DCTDecode" => {
            image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| e.to_string())
        }
        [] => raw_pixels(stream, stream.content.clone()),
        [only] if only.as_slice() == b"FlateDecode" => {
            let data = stream.decompressed_content().map_err(|e| e.to_string())?;
            raw_pixels(stream, data)
        }
        other => {
            let names: Vec<String> = other
                .iter()
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .collect();
            Err(format!("unsupported image filter {}", names.join("+")))
        }
    }
}

fn raw_pixels(stream: &Stream, data: Vec<u8>) -> Result<DynamicImage, String> {
    let dimension = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .and_then(Object::as_i64)
            .ok()
            .filter(|v| *v > 0)
            .map(|v| v as u32)
            .ok_or_else(|| format!("image has no valid {}", String::from_utf8_lossy(key)))
    };
    let width = dimension(b"Width")?;
    let height = dimension(b"Height")?;
    let bits = stream.dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    if bits != 8 {
        return Err(format!("{} bits per component is not supported", bits));
    }

    let pixels = (width as usize) * (height as usize);
    if data.len() == pixels {
        GrayImage::from_raw(width, height, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "gray image buffer size mismatch".to_string())
    } else if data.len() == pixels * 3 {
        RgbImage::from_raw(width, height, data)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "rgb image buffer size mismatch".to_string())
    } else {
        Err(format!(
            "{} bytes of pixel data for a {}x{} image",
            data.len(),
            width,
            height
        ))
    }
}

fn scale_to_dpi(image: DynamicImage, page_width_points: f32, dpi: u32) -> DynamicImage {
    let target_width = ((page_width_points / 72.0) * dpi as f32).round().max(1.0) as u32;
    if image.width() == target_width {
        return image;
    }
    let target_height =
        ((image.height() as f32) * (target_width as f32) / (image.width() as f32)).round().max(1.0) as u32;
    image.resize_exact(target_width, target_height, FilterType::Triangle)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_extraction::lopdf_helper::fixtures::text_pdf;

    #[test]
    fn test_renders_embedded_image_at_target_dpi() {
        let doc = RawDocument::new("scan.pdf", fixtures::scanned_pdf(40, 20));
        let session = EmbeddedImageRenderer.open(&doc).unwrap();
        assert_eq!(session.page_count(), 1);

        let image = session.render_page(0, 200).unwrap();
        assert_eq!(image.width(), 200);
        assert_eq!(image.height(), 100);
    }

    #[test]
    fn test_text_only_page_reports_font_resolution() {
        let doc = RawDocument::new("text.pdf", text_pdf(&["Opening balance 100.00"]));
        let session = EmbeddedImageRenderer.open(&doc).unwrap();
        let err = session.render_page(0, 200).unwrap_err();
        assert!(err.is_subsystem_defect());
    }

    #[test]
    fn test_missing_page() {
        let doc = RawDocument::new("scan.pdf", fixtures::scanned_pdf(10, 10));
        let session = EmbeddedImageRenderer.open(&doc).unwrap();
        assert!(matches!(session.render_page(3, 200), Err(RenderError::MissingPage(3))));
    }

    #[test]
    fn test_open_fails_for_garbage() {
        let doc = RawDocument::new("bad.pdf", b"%PDF-garbage".to_vec());
        assert!(matches!(EmbeddedImageRenderer.open(&doc), Err(RenderError::Load(_))));
    }
}
