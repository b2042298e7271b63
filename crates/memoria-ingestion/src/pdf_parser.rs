//! lopdf-based page counting and content extraction from in-memory PDFs.

use lopdf::{Dictionary, Document as PdfDoc, Object, ObjectId};
use tracing::{debug, warn};

use memoria_common::{MemoriaError, Result};

/// A raster image found in a page's resources.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub name: String,
    pub width: i64,
    pub height: i64,
    pub filter: Option<String>,
    pub byte_len: usize,
}

/// Text and images of every page, in page order. `images[i]` is `None`
/// when page `i` has no raster image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub pages: Vec<String>,
    pub images: Vec<Option<Vec<PageImage>>>,
}

impl ExtractedContent {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.iter().flatten().map(Vec::len).sum()
    }
}

fn load(buffer: &[u8]) -> Result<PdfDoc> {
    PdfDoc::load_mem(buffer).map_err(|e| MemoriaError::Pdf(e.to_string()))
}

/// Number of pages in the PDF held by `buffer`.
pub fn count_pages(buffer: &[u8]) -> Result<usize> {
    Ok(load(buffer)?.get_pages().len())
}

/// Extract the text of each page and the raster images it references.
/// A buffer lopdf cannot parse yields an empty result and a warning.
pub fn extract_content(buffer: &[u8]) -> ExtractedContent {
    let pdf = match load(buffer) {
        Ok(pdf) => pdf,
        Err(e) => {
            warn!(error = %e, "Could not parse PDF content");
            return ExtractedContent::default();
        }
    };

    let mut content = ExtractedContent::default();
    for (page_num, page_id) in pdf.get_pages() {
        let text = match pdf.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                debug!(page = page_num, error = %e, "No extractable text on page");
                String::new()
            }
        };
        let images = page_images(&pdf, page_id);

        content.pages.push(text);
        content.images.push(if images.is_empty() { None } else { Some(images) });
    }

    debug!(pages = content.page_count(), images = content.image_count(), "PDF content extracted");
    content
}

/// Image XObjects reachable from the page's resources, including
/// resources inherited from parent page-tree nodes.
fn page_images(pdf: &PdfDoc, page_id: ObjectId) -> Vec<PageImage> {
    let mut images = Vec::new();
    let mut node = pdf.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = node {
        if let Some(xobjects) = resource_dict(pdf, dict, b"XObject") {
            for (name, obj) in xobjects.iter() {
                let name = String::from_utf8_lossy(name).into_owned();
                if images.iter().any(|img: &PageImage| img.name == name) {
                    continue;
                }
                if let Some(image) = as_image(pdf, name, obj) {
                    images.push(image);
                }
            }
        }

        depth += 1;
        if depth > 32 {
            break;
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| pdf.get_dictionary(id))
            .ok();
    }

    images
}

fn resource_dict<'a>(pdf: &'a PdfDoc, node: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let resources = node.get(b"Resources").ok()?;
    let (_, resources) = pdf.dereference(resources).ok()?;
    let entry = resources.as_dict().ok()?.get(key).ok()?;
    let (_, entry) = pdf.dereference(entry).ok()?;
    entry.as_dict().ok()
}

fn as_image(pdf: &PdfDoc, name: String, obj: &Object) -> Option<PageImage> {
    let (_, obj) = pdf.dereference(obj).ok()?;
    let stream = obj.as_stream().ok()?;
    let dict = &stream.dict;

    let subtype = dict.get(b"Subtype").and_then(Object::as_name).ok()?;
    if subtype != b"Image" {
        return None;
    }

    let int = |key: &[u8]| dict.get(key).and_then(Object::as_i64).unwrap_or(0);
    let filter = dict
        .get(b"Filter")
        .and_then(Object::as_name)
        .ok()
        .map(|f| String::from_utf8_lossy(f).into_owned());

    Some(PageImage {
        name,
        width: int(b"Width"),
        height: int(b"Height"),
        filter,
        byte_len: stream.content.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_not_a_pdf() {
        let err = count_pages(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, MemoriaError::Pdf(_)));
    }

    #[test]
    fn test_extract_garbage_degrades_to_empty() {
        let content = extract_content(b"%PDF-1.4 truncated");
        assert_eq!(content, ExtractedContent::default());
        assert_eq!(content.image_count(), 0);
    }

    #[test]
    fn test_image_count_sums_pages() {
        let img = PageImage {
            name: "Im1".to_string(),
            width: 1,
            height: 1,
            filter: None,
            byte_len: 1,
        };
        let content = ExtractedContent {
            pages: vec![String::new(), String::new(), String::new()],
            images: vec![Some(vec![img.clone(), img.clone()]), None, Some(vec![img])],
        };
        assert_eq!(content.page_count(), 3);
        assert_eq!(content.image_count(), 3);
    }
}
