//! PDF metadata extraction

use std::path::Path;
use lopdf::{Document, Object};
use crate::error::{Error, Result};

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
fn count_pages_from_catalog(doc: &Document) -> std::result::Result<usize, String> {
    let catalog_ref = doc.trailer.get(b"Root")
        .map_err(|_| "No Root in trailer".to_string())?;

    let catalog_id = match catalog_ref {
        Object::Reference(id) => *id,
        _ => return Err("Root is not a reference".to_string()),
    };

    let catalog_dict = doc.get_dictionary(catalog_id)
        .map_err(|e| format!("Catalog: {}", e))?;

    let pages_id = match catalog_dict.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        Ok(_) => return Err("Pages is not a reference".to_string()),
        Err(_) => return Err("No Pages in catalog".to_string()),
    };

    let pages_dict = doc.get_dictionary(pages_id)
        .map_err(|e| format!("Pages: {}", e))?;

    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) if *n >= 0 => Ok(*n as usize),
        Ok(_) => Err("Count is not a non-negative integer".to_string()),
        Err(_) => Err("No Count in Pages".to_string()),
    }
}

fn load_for_inspection(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(Error::unreadable(path, "file not found"));
    }
    Document::load(path).map_err(|e| Error::unreadable(path, e))
}

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    let doc = load_for_inspection(path)?;
    let page_count = checked_count(&doc, path)?;

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    let text_field = |key: &[u8]| {
        info.and_then(|dict| dict.get(key).ok())
            .and_then(|obj| obj.as_str().ok())
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
    };

    Ok(PdfMetadata {
        page_count,
        title: text_field(b"Title"),
        author: text_field(b"Author"),
    })
}

fn checked_count(doc: &Document, path: &Path) -> Result<usize> {
    let page_count = count_pages_from_catalog(doc).map_err(|e| Error::unreadable(path, e))?;
    if page_count == 0 {
        return Err(Error::unreadable(path, "document has no pages"));
    }
    Ok(page_count)
}

/// Count the number of pages in a PDF file
///
/// Reads the Count field from the Pages dictionary. A missing file, an
/// unparsable document and a zero count are all reported as
/// [`Error::ArtifactUnreadable`]; a rendered document always has a page.
pub fn count_pages(path: &Path) -> Result<usize> {
    let doc = load_for_inspection(path)?;
    checked_count(&doc, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PaperSize;
    use crate::pdf::create_blank_pdf;
    use tempfile::TempDir;

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::ArtifactUnreadable { .. }));
    }

    #[test]
    fn test_extract_metadata_nonexistent_file() {
        let result = extract_metadata(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::ArtifactUnreadable { .. }));
    }

    #[test]
    fn test_count_pages_garbage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(count_pages(&path).unwrap_err(), Error::ArtifactUnreadable { .. }));
    }

    #[test]
    fn test_count_pages_generated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("three.pdf");
        create_blank_pdf(&path, PaperSize::A4, 3).unwrap();
        assert_eq!(count_pages(&path).unwrap(), 3);

        let metadata = extract_metadata(&path).unwrap();
        assert_eq!(metadata.page_count, 3);
        assert!(metadata.author.is_none());
    }
}
