//! Page number stamping for double-sided output
//!
//! Every page gets a footer with its final page number. The number sits on
//! the outer edge of the leaf: right-aligned on odd (recto) pages and
//! left-aligned on even (verso) pages.
//!
//! Pages produced by other tools often start their content stream with an
//! unbalanced `cm` (Google Docs and pdfjam both do this), which would move
//! anything appended afterwards. The original content is therefore bracketed
//! in `q … Q` before the footer is added, so the footer is always drawn in
//! default user space.

use std::path::Path;
use lopdf::{Document, Object, ObjectId, Dictionary, Stream};
use crate::error::{Error, Result};
use crate::pdf::create::{estimate_text_width, escape_pdf_string, HELVETICA_DIGIT_WIDTH};

/// Resource name of the footer font, chosen to avoid clashing with page fonts
const FOOTER_FONT: &str = "FPageNo";

/// Which edge a footer is aligned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterSide {
    Left,
    Right,
}

impl FooterSide {
    /// Outer edge of a double-sided leaf
    pub fn outer_edge(page_number: usize) -> Self {
        if page_number % 2 == 1 {
            FooterSide::Right
        } else {
            FooterSide::Left
        }
    }
}

/// Options for stamping page numbers
#[derive(Debug, Clone)]
pub struct StampOptions {
    /// Footer template; `{page}` and `{total}` are substituted
    pub template: String,
    /// Footer font size in points
    pub font_size: f32,
    /// Distance from the page edge to the footer, in points
    pub margin: f32,
    /// Baseline height above the bottom edge, in points
    pub baseline: f32,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            template: "{page}".to_string(),
            font_size: 10.0,
            margin: 40.0,
            baseline: 24.0,
        }
    }
}

impl StampOptions {
    /// Footer text for one page
    pub fn footer_text(&self, page: usize, total: usize) -> String {
        self.template
            .replace("{page}", &page.to_string())
            .replace("{total}", &total.to_string())
    }
}

/// Stamp page numbers on every page of `input` and write the result to `output`
///
/// The page count is unchanged. Any failure is reported as [`Error::Stamp`].
pub fn stamp_page_numbers(input: &Path, output: &Path, options: &StampOptions) -> Result<()> {
    stamp_inner(input, output, options).map_err(|e| match e {
        stamp @ Error::Stamp { .. } => stamp,
        other => Error::Stamp {
            path: input.to_path_buf(),
            detail: other.to_string(),
        },
    })
}

fn stamp_inner(input: &Path, output: &Path, options: &StampOptions) -> Result<()> {
    let mut doc = Document::load(input)?;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let total = pages.len();

    let font_id = doc.add_object(footer_font());

    for (i, page_id) in pages.into_iter().enumerate() {
        let page_number = i + 1;
        let (x0, y0, width) = page_box(&doc, page_id);

        let text = options.footer_text(page_number, total);
        let text_width = footer_width(&text, options.font_size);
        let x = match FooterSide::outer_edge(page_number) {
            FooterSide::Right => x0 + width - options.margin - text_width,
            FooterSide::Left => x0 + options.margin,
        };
        let y = y0 + options.baseline;

        let footer = format!(
            "BT\n0 g\n/{} {} Tf\n1 0 0 1 {:.2} {:.2} Tm\n({}) Tj\nET\n",
            FOOTER_FONT,
            options.font_size,
            x,
            y,
            escape_pdf_string(&text)
        );

        isolate_page_content(&mut doc, page_id)?;
        add_font_to_page_resources(&mut doc, page_id, font_id)?;
        let footer_id = doc.add_object(Stream::new(Dictionary::new(), footer.into_bytes()));
        append_content_to_page(&mut doc, page_id, footer_id)?;
    }

    doc.compress();
    doc.save(output)?;

    Ok(())
}

fn footer_font() -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    font
}

/// Width of footer text; page numbers are all digits and Helvetica digits share one width
fn footer_width(text: &str, font_size: f32) -> f32 {
    if text.chars().all(|c| c.is_ascii_digit()) {
        text.len() as f32 * HELVETICA_DIGIT_WIDTH * font_size
    } else {
        estimate_text_width(text, font_size)
    }
}

/// Lower-left corner and width of the page's MediaBox (US Letter if absent)
fn page_box(doc: &Document, page_id: ObjectId) -> (f32, f32, f32) {
    let media_box = doc
        .get_dictionary(page_id)
        .and_then(|page| page.get(b"MediaBox"))
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_object(*id),
            other => Ok(other),
        })
        .and_then(Object::as_array)
        .ok()
        .filter(|arr| arr.len() == 4)
        .map(|arr| arr.iter().map(|o| o.as_float().unwrap_or(0.0)).collect::<Vec<f32>>());

    match media_box {
        Some(b) => (b[0], b[1], b[2] - b[0]),
        None => (0.0, 0.0, 612.0),
    }
}

/// Bracket a page's existing content streams in `q` / `Q`
fn isolate_page_content(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let existing = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(arr)) => arr.clone(),
        _ => return Ok(()),
    };

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(restore_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));

    Ok(())
}

/// Add the footer font to the page's Resources dictionary
///
/// Resources held by reference are copied onto the page first, so shared
/// resource dictionaries are left untouched.
fn add_font_to_page_resources(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let mut resources = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };
    fonts.set(FOOTER_FONT, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));

    Ok(())
}

/// Append a content stream to a page's Contents
///
/// Appended after the original content so the footer is drawn on top.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

    let contents = match page.get(b"Contents").ok().cloned() {
        Some(Object::Reference(content_id)) => vec![
            Object::Reference(content_id),
            Object::Reference(new_content_id),
        ],
        Some(Object::Array(mut content_array)) => {
            content_array.push(Object::Reference(new_content_id));
            content_array
        }
        _ => vec![Object::Reference(new_content_id)],
    };
    page.set("Contents", Object::Array(contents));

    Ok(())
}
