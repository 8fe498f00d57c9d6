//! In-process backend built on lopdf
//!
//! Draws title and ToC pages with the standard Helvetica font and lays out
//! content by turning source pages into Form XObjects placed on a grid.

use std::collections::HashMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::artifact::ArtifactRegistry;
use crate::config::SectionSpec;
use crate::error::{Error, Result};
use crate::layout::{fit_into, grid_cells, PaperSize};
use crate::pdf::create::{estimate_text_width, text_line, DocumentBuilder};
use crate::pdf::xobject::{page_to_xobject, CopyCache};
use crate::toc::TocEntry;
use crate::toolchain::Toolchain;

/// Page margin on every side, in points (one inch)
const MARGIN: f32 = 72.0;

const TITLE_FONT_SIZE: f32 = 36.0;
const TITLE_MIN_FONT_SIZE: f32 = 12.0;

const HEADING_FONT_SIZE: f32 = 20.0;
const ENTRY_FONT_SIZE: f32 = 12.0;
const ENTRY_LEADING: f32 = 20.0;

/// lopdf backend, needs no external programs
#[derive(Debug, Clone)]
pub struct NativeToolchain {
    paper: PaperSize,
}

impl NativeToolchain {
    pub fn new(paper: PaperSize) -> Self {
        Self { paper }
    }
}

impl Toolchain for NativeToolchain {
    fn name(&self) -> &'static str {
        "native"
    }

    fn render_title(&self, title: &str, output: &Path, _scratch: &mut ArtifactRegistry) -> Result<()> {
        let size = self.paper.dimensions();
        let (width, height) = size.points();
        let lines: Vec<&str> = title.lines().filter(|l| !l.trim().is_empty()).collect();

        // Shrink until the widest line fits between the margins
        let widest = lines.iter().map(|l| estimate_text_width(l, 1.0)).fold(0.0, f32::max);
        let font_size = if widest > 0.0 {
            ((width - 2.0 * MARGIN) / widest).clamp(TITLE_MIN_FONT_SIZE, TITLE_FONT_SIZE)
        } else {
            TITLE_FONT_SIZE
        };
        let leading = font_size * 1.25;

        let block = leading * lines.len().saturating_sub(1) as f32;
        let mut y = height / 2.0 + block / 2.0 - font_size / 3.0;
        let mut content = String::new();
        for line in &lines {
            let x = (width - estimate_text_width(line, font_size)) / 2.0;
            content.push_str(&text_line(line, font_size, x.max(MARGIN / 2.0), y));
            y -= leading;
        }

        let mut builder = DocumentBuilder::new();
        builder.add_text_page(size, content);
        builder
            .save(output)
            .map_err(|e| Error::render(format!("title page '{}'", title), e))
    }

    fn render_toc(
        &self,
        heading: &str,
        entries: &[TocEntry],
        output: &Path,
        _scratch: &mut ArtifactRegistry,
    ) -> Result<()> {
        let size = self.paper.dimensions();
        let (width, height) = size.points();
        let right = width - MARGIN;
        let top = height - MARGIN;

        let mut pages = vec![text_line(heading, HEADING_FONT_SIZE, MARGIN, top - HEADING_FONT_SIZE)];
        let mut y = top - HEADING_FONT_SIZE - 2.0 * ENTRY_LEADING;

        for entry in entries {
            if y < MARGIN {
                pages.push(String::new());
                y = top - ENTRY_FONT_SIZE;
            }
            let number = entry.page.to_string();
            let number_x = right - estimate_text_width(&number, ENTRY_FONT_SIZE);
            let line = leader_line(&entry.title.replace('\n', " "), number_x - MARGIN, ENTRY_FONT_SIZE);

            if let Some(page) = pages.last_mut() {
                page.push_str(&text_line(&line, ENTRY_FONT_SIZE, MARGIN, y));
                page.push_str(&text_line(&number, ENTRY_FONT_SIZE, number_x, y));
            }
            y -= ENTRY_LEADING;
        }

        let mut builder = DocumentBuilder::new();
        for content in pages {
            builder.add_text_page(size, content);
        }
        builder
            .save(output)
            .map_err(|e| Error::render("table of contents", e))
    }

    fn render_content(&self, section: &SectionSpec, output: &Path, _scratch: &mut ArtifactRegistry) -> Result<()> {
        let what = format!("section '{}' ({})", section.title, section.file.display());
        if !section.source.exists() {
            return Err(Error::render(what, format!("source not found: {}", section.source.display())));
        }

        let source = Document::load(&section.source).map_err(|e| Error::render(&what, e))?;
        let pages = source.get_pages();
        let page_count = pages.len() as u32;

        let mut cells = Vec::new();
        for selector in &section.slides {
            cells.extend(selector.resolve(page_count).map_err(|e| Error::render(&what, e))?);
        }

        let mut sheet_size = self.paper.dimensions();
        if section.landscape {
            sheet_size = sheet_size.landscape();
        }
        let grid = grid_cells(sheet_size.points(), section.format);

        let mut builder = DocumentBuilder::new();
        let mut cache = CopyCache::new();
        let mut placed: HashMap<u32, (ObjectId, [f32; 4])> = HashMap::new();

        for sheet in cells.chunks(grid.len()) {
            let mut content = String::new();
            let mut xobjects = Dictionary::new();

            for (index, (cell, page)) in grid.iter().zip(sheet).enumerate() {
                let Some(page) = page else { continue };

                let (xobject_id, [x0, y0, w, h]) = match placed.get(page) {
                    Some(&found) => found,
                    None => {
                        let page_id = *pages
                            .get(page)
                            .ok_or_else(|| Error::render(&what, format!("page {} is missing", page)))?;
                        let found = page_to_xobject(builder.document_mut(), &source, page_id, &mut cache)
                            .map_err(|e| Error::render(&what, e))?;
                        placed.insert(*page, found);
                        found
                    }
                };

                let name = format!("P{}", index);
                let (scale, x, y) = fit_into((w, h), cell);
                content.push_str(&format!(
                    "q {s:.4} 0 0 {s:.4} {tx:.2} {ty:.2} cm /{name} Do Q\n",
                    s = scale,
                    tx = x - x0 * scale,
                    ty = y - y0 * scale,
                    name = name,
                ));
                xobjects.set(name, Object::Reference(xobject_id));
            }

            let mut resources = Dictionary::new();
            resources.set("XObject", Object::Dictionary(xobjects));
            builder.add_page(sheet_size, content, resources);
        }

        debug!(
            section = %section.title,
            cells = cells.len(),
            sheets = cells.len().div_ceil(grid.len()),
            "laid out content"
        );
        builder.save(output).map_err(|e| Error::render(what, e))
    }
}

/// `title . . . .` padded with dots to `available` points
pub fn leader_line(title: &str, available: f32, font_size: f32) -> String {
    let dot = estimate_text_width(" .", font_size);
    let used = estimate_text_width(title, font_size) + dot;
    let dots = ((available - used) / dot).floor().max(0.0) as usize;
    let mut line = String::with_capacity(title.len() + dots * 2);
    line.push_str(title);
    line.push(' ');
    for _ in 0..dots {
        line.push_str(" .");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelector;
    use crate::layout::LayoutFormat;
    use crate::pdf::{count_pages, create_blank_pdf};
    use std::path::PathBuf;

    fn page_text(path: &Path, page: u32) -> String {
        let doc = Document::load(path).unwrap();
        let pages = doc.get_pages();
        String::from_utf8_lossy(&doc.get_page_content(pages[&page]).unwrap()).into_owned()
    }

    fn section(source: PathBuf, format: LayoutFormat, slides: Vec<PageSelector>) -> SectionSpec {
        SectionSpec {
            title: "Deck".to_string(),
            file: PathBuf::from("deck.pdf"),
            source,
            format,
            slides,
            landscape: false,
        }
    }

    #[test]
    fn test_title_page() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let out = registry.allocate("title.pdf");
        NativeToolchain::new(PaperSize::A4)
            .render_title("Intro", &out, &mut registry)
            .unwrap();

        assert_eq!(count_pages(&out).unwrap(), 1);
        assert!(page_text(&out, 1).contains("(Intro) Tj"));
        registry.sweep();
    }

    #[test]
    fn test_accented_title_is_win_ansi() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let out = registry.allocate("title.pdf");
        NativeToolchain::new(PaperSize::A4)
            .render_title("Einführung", &out, &mut registry)
            .unwrap();

        let doc = Document::load(&out).unwrap();
        let page_id = doc.get_pages()[&1];
        let content = doc.get_page_content(page_id).unwrap();
        // ü is 0xFC in WinAnsiEncoding, never its two UTF-8 bytes
        assert!(page_text(&out, 1).contains("(Einf\\374hrung) Tj"));
        assert!(!content.windows(2).any(|w| w == "ü".as_bytes()));
        registry.sweep();
    }

    #[test]
    fn test_long_title_is_shrunk() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let out = registry.allocate("title.pdf");
        let title = "A very long section title that cannot possibly fit at full size";
        NativeToolchain::new(PaperSize::A4)
            .render_title(title, &out, &mut registry)
            .unwrap();

        let text = page_text(&out, 1);
        assert!(!text.contains(&format!("/F1 {} Tf", TITLE_FONT_SIZE)));
        registry.sweep();
    }

    #[test]
    fn test_toc_lists_entries() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let out = registry.allocate("toc.pdf");
        let entries = vec![
            TocEntry { title: "Intro".to_string(), page: 3 },
            TocEntry { title: "Advanced".to_string(), page: 7 },
        ];
        NativeToolchain::new(PaperSize::A4)
            .render_toc("Contents", &entries, &out, &mut registry)
            .unwrap();

        let text = page_text(&out, 1);
        assert!(text.contains("(Contents) Tj"));
        assert!(text.contains("(3) Tj"));
        assert!(text.contains("(7) Tj"));
        assert!(text.find("Intro").unwrap() < text.find("Advanced").unwrap());
        registry.sweep();
    }

    #[test]
    fn test_empty_toc_has_one_page() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let out = registry.allocate("toc.pdf");
        NativeToolchain::new(PaperSize::A4)
            .render_toc("Contents", &[], &out, &mut registry)
            .unwrap();
        assert_eq!(count_pages(&out).unwrap(), 1);
        registry.sweep();
    }

    #[test]
    fn test_long_toc_spills_onto_more_pages() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let out = registry.allocate("toc.pdf");
        let entries: Vec<TocEntry> = (0..80)
            .map(|i| TocEntry { title: format!("Section {}", i), page: 3 + 2 * i })
            .collect();
        NativeToolchain::new(PaperSize::A4)
            .render_toc("Contents", &entries, &out, &mut registry)
            .unwrap();
        assert!(count_pages(&out).unwrap() >= 2);
        registry.sweep();
    }

    #[test]
    fn test_content_nup() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let source = registry.allocate("deck.pdf");
        create_blank_pdf(&source, PaperSize::Letter, 5).unwrap();
        let out = registry.allocate("content.pdf");

        let spec = section(
            source,
            LayoutFormat { cols: 2, rows: 1 },
            vec![PageSelector::Range { start: 1, end: None }],
        );
        NativeToolchain::new(PaperSize::A4)
            .render_content(&spec, &out, &mut registry)
            .unwrap();

        // 5 pages, 2 per sheet
        assert_eq!(count_pages(&out).unwrap(), 3);
        assert!(page_text(&out, 1).contains("/P1 Do"));
        assert!(!page_text(&out, 3).contains("/P1 Do"));
        registry.sweep();
    }

    #[test]
    fn test_content_blank_cells() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let source = registry.allocate("deck.pdf");
        create_blank_pdf(&source, PaperSize::Letter, 2).unwrap();
        let out = registry.allocate("content.pdf");

        let spec = section(
            source,
            LayoutFormat { cols: 1, rows: 2 },
            vec![PageSelector::Page(1), PageSelector::Blank, PageSelector::Page(2)],
        );
        NativeToolchain::new(PaperSize::A4)
            .render_content(&spec, &out, &mut registry)
            .unwrap();

        assert_eq!(count_pages(&out).unwrap(), 2);
        let first = page_text(&out, 1);
        assert!(first.contains("/P0 Do"));
        assert!(!first.contains("/P1 Do"));
        registry.sweep();
    }

    #[test]
    fn test_selector_out_of_range() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let source = registry.allocate("deck.pdf");
        create_blank_pdf(&source, PaperSize::Letter, 2).unwrap();
        let out = registry.allocate("content.pdf");

        let spec = section(source, LayoutFormat { cols: 1, rows: 1 }, vec![PageSelector::Page(9)]);
        let err = NativeToolchain::new(PaperSize::A4)
            .render_content(&spec, &out, &mut registry)
            .unwrap_err();

        assert!(matches!(err, Error::Render { .. }));
        assert!(err.to_string().contains("Deck"));
        assert!(!out.exists());
        registry.sweep();
    }

    #[test]
    fn test_leader_line_fills_width() {
        let short = leader_line("Intro", 300.0, 12.0);
        let long = leader_line("Intro", 400.0, 12.0);
        assert!(short.starts_with("Intro  ."));
        assert!(long.len() > short.len());
        assert!(estimate_text_width(&long, 12.0) <= 400.0);
    }
}
