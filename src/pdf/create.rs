//! PDF creation with lopdf
//!
//! Builds small documents from scratch: blank padding pages, and the
//! single-font text pages used by the native rendering backend.

use std::path::Path;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use crate::error::Result;
use crate::layout::{PageDimensions, PaperSize};

/// Font resource name used by generated text pages
pub const TEXT_FONT: &str = "F1";

/// Helvetica digit width, in 1/1000ths of the font size
pub const HELVETICA_DIGIT_WIDTH: f32 = 0.556;

/// Average Helvetica glyph width for mixed text, in 1/1000ths of the font size
pub const HELVETICA_AVERAGE_WIDTH: f32 = 0.52;

/// A document under construction whose pages hang off one Pages node
pub struct DocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    font_id: Option<ObjectId>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            font_id: None,
        }
    }

    /// Access the underlying document, e.g. to import objects
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Helvetica (standard PDF font, nothing to embed)
    pub fn helvetica(&mut self) -> ObjectId {
        if let Some(id) = self.font_id {
            return id;
        }
        let id = self.doc.add_object(helvetica_font());
        self.font_id = Some(id);
        id
    }

    /// Append a page of `size` with the given content stream and resources
    pub fn add_page(&mut self, size: PageDimensions, content: String, resources: Dictionary) -> ObjectId {
        let (width, height) = size.points();
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(self.pages_id));
        page.set("MediaBox", Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width),
            Object::Real(height),
        ]));
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));

        let page_id = self.doc.add_object(page);
        self.page_ids.push(page_id);
        page_id
    }

    /// Append a page showing `content`, with Helvetica bound to [`TEXT_FONT`]
    pub fn add_text_page(&mut self, size: PageDimensions, content: String) -> ObjectId {
        let font_id = self.helvetica();
        let mut fonts = Dictionary::new();
        fonts.set(TEXT_FONT, Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));
        self.add_page(size, content, resources)
    }

    /// Write the Pages tree and catalog, then save to `output`
    pub fn save(mut self, output: &Path) -> Result<()> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| Object::Reference(id)).collect();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(self.page_ids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        self.doc.compress();
        self.doc.save(output)?;
        Ok(())
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn helvetica_font() -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

/// Create a PDF of `pages` empty pages at the given paper size
///
/// Used for parity padding (one page) and ToC front-matter padding.
pub fn create_blank_pdf(output: &Path, paper: PaperSize, pages: usize) -> Result<()> {
    let mut builder = DocumentBuilder::new();
    for _ in 0..pages {
        builder.add_page(paper.dimensions(), String::new(), Dictionary::new());
    }
    builder.save(output)
}

/// Byte for `c` in WinAnsiEncoding, the encoding of every font this crate writes
pub fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{00}'..='\u{7F}' | '\u{A0}'..='\u{FF}' => c as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Body of a PDF literal string showing `s` in a WinAnsi font
///
/// Delimiters are escaped and bytes outside printable ASCII are written as
/// octal escapes. Characters WinAnsi cannot encode become `?`.
pub fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => match win_ansi_byte(c) {
                Some(byte) => out.push_str(&format!("\\{:03o}", byte)),
                None => out.push('?'),
            },
        }
    }
    out
}

/// Estimate the width of `text` set in Helvetica
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .map(|c| if c.is_ascii_digit() { HELVETICA_DIGIT_WIDTH } else { HELVETICA_AVERAGE_WIDTH })
        .sum::<f32>()
        * font_size
}

/// Content operators showing one line of text at `(x, y)`
pub fn text_line(text: &str, font_size: f32, x: f32, y: f32) -> String {
    format!(
        "BT\n/{} {} Tf\n1 0 0 1 {:.2} {:.2} Tm\n({}) Tj\nET\n",
        TEXT_FONT,
        font_size,
        x,
        y,
        escape_pdf_string(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::count_pages;
    use tempfile::TempDir;

    #[test]
    fn test_create_blank_pdf_page_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.pdf");
        create_blank_pdf(&path, PaperSize::Letter, 2).unwrap();
        assert_eq!(count_pages(&path).unwrap(), 2);
    }

    #[test]
    fn test_blank_page_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.pdf");
        create_blank_pdf(&path, PaperSize::Letter, 1).unwrap();

        let doc = Document::load(&path).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let media_box = doc.get_dictionary(page_id).unwrap().get(b"MediaBox").unwrap().as_array().unwrap().clone();
        assert_eq!(media_box[2].as_float().unwrap(), 612.0);
        assert_eq!(media_box[3].as_float().unwrap(), 792.0);
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(escape_pdf_string("a(b)c\\"), "a\\(b\\)c\\\\");
    }

    #[test]
    fn test_escape_transcodes_to_win_ansi() {
        assert_eq!(escape_pdf_string("Einführung"), "Einf\\374hrung");
        assert_eq!(escape_pdf_string("5 €"), "5 \\200");
        assert_eq!(escape_pdf_string("a\nb"), "a\\012b");
        assert_eq!(escape_pdf_string("日本"), "??");
    }

    #[test]
    fn test_text_line_escapes() {
        let ops = text_line("Q&A (part 1)", 12.0, 10.0, 20.0);
        assert!(ops.contains("(Q&A \\(part 1\\)) Tj"));
        assert!(ops.contains("/F1 12 Tf"));
    }

    #[test]
    fn test_estimate_digit_width() {
        assert!((estimate_text_width("10", 10.0) - 11.12).abs() < 0.01);
    }
}
