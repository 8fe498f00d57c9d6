//! Table of contents
//!
//! The ToC is rendered after every section is laid out, from the page numbers
//! recorded while the sections were rendered. It always occupies pages
//! `1..start_page`; if it turns out longer than that, all entries move back
//! and the listing is rendered again.

use tracing::{debug, info};

use crate::artifact::{ArtifactRegistry, RenderedDocument};
use crate::error::{Error, Result};
use crate::layout::PaperSize;
use crate::parity::{normalize_for, placement};
use crate::pdf::{create_blank_pdf, merge_pdfs, MergeOptions};
use crate::toolchain::Toolchain;

/// Render attempts before a ToC that keeps growing is given up on
pub const MAX_TOC_PASSES: usize = 4;

/// A section title and the page its title page lands on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub page: u32,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, page: u32) -> Self {
        Self { title: title.into(), page }
    }

    /// Same entry, `delta` pages later
    pub fn shifted(&self, delta: u32) -> Result<Self> {
        let page = self.page.checked_add(delta).ok_or_else(|| {
            Error::Assembly(format!("page number overflow shifting '{}' by {}", self.title, delta))
        })?;
        Ok(Self {
            title: self.title.clone(),
            page,
        })
    }
}

/// Render `entries` under `heading` and normalize to an even page count
///
/// The page after the returned document is therefore odd.
pub fn build_toc(
    entries: &[TocEntry],
    toolchain: &dyn Toolchain,
    registry: &mut ArtifactRegistry,
    paper: PaperSize,
    heading: &str,
) -> Result<RenderedDocument> {
    let path = registry.allocate("toc.pdf");
    toolchain.render_toc(heading, entries, &path, registry)?;
    let toc = RenderedDocument::new(path);
    normalize_for(&toc, placement::TOC, registry, paper)?;
    Ok(toc)
}

/// A ToC whose length matches the pages reserved for it
#[derive(Debug)]
pub struct ReconciledToc {
    pub document: RenderedDocument,
    /// Entries as printed, after any shift
    pub entries: Vec<TocEntry>,
    /// Pages every entry moved back by; the first title lands on `start_page + shift`
    pub shift: u32,
}

/// Build the ToC so it fills exactly the pages before the first section
///
/// `entries` were computed assuming the first title lands on `start_page`.
/// A shorter ToC is padded with blank pages; a longer one shifts every entry
/// and is rendered again.
pub fn build_reconciled_toc(
    mut entries: Vec<TocEntry>,
    start_page: u32,
    toolchain: &dyn Toolchain,
    registry: &mut ArtifactRegistry,
    paper: PaperSize,
    heading: &str,
) -> Result<ReconciledToc> {
    let mut shift = 0;

    for pass in 1..=MAX_TOC_PASSES {
        let document = build_toc(&entries, toolchain, registry, paper, heading)?;
        let pages = document.page_count()? as u32;
        let reserved = start_page
            .checked_sub(1)
            .and_then(|front| front.checked_add(shift))
            .ok_or_else(|| Error::Assembly(format!("cannot reserve {} + {} ToC pages", start_page, shift)))?;
        debug!(pass, pages, reserved, "built table of contents");

        if pages <= reserved {
            if pages < reserved {
                pad_front_matter(&document, (reserved - pages) as usize, registry, paper)?;
            }
            return Ok(ReconciledToc { document, entries, shift });
        }

        let delta = pages - reserved;
        info!(pages, reserved, delta, "table of contents longer than reserved, shifting entries");
        entries = entries.iter().map(|e| e.shifted(delta)).collect::<Result<_>>()?;
        shift += delta;
    }

    Err(Error::render(
        "table of contents",
        format!("page count did not settle after {} passes", MAX_TOC_PASSES),
    ))
}

/// Append `blanks` empty pages to the ToC in place
fn pad_front_matter(
    toc: &RenderedDocument,
    blanks: usize,
    registry: &mut ArtifactRegistry,
    paper: PaperSize,
) -> Result<()> {
    let blank = registry.allocate("front-matter.pdf");
    create_blank_pdf(&blank, paper, blanks).map_err(|e| Error::render("front matter", e))?;

    let padded = registry.allocate("toc-padded.pdf");
    merge_pdfs(&MergeOptions {
        input_paths: vec![toc.path().to_path_buf(), blank],
        output_path: padded.clone(),
    })?;
    std::fs::rename(&padded, toc.path())?;
    debug!(blanks, "padded table of contents");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionSpec;
    use crate::error::ErrorKind;
    use crate::pdf::create_blank_pdf;
    use crate::toolchain::NativeToolchain;
    use std::cell::Cell;
    use std::path::Path;

    /// Renders a ToC two pages longer on every call, so it never fits
    struct GrowingToc {
        calls: Cell<usize>,
    }

    impl Toolchain for GrowingToc {
        fn name(&self) -> &'static str {
            "growing"
        }

        fn render_title(&self, title: &str, _output: &Path, _scratch: &mut ArtifactRegistry) -> Result<()> {
            Err(Error::render(title, "not supported"))
        }

        fn render_toc(
            &self,
            _heading: &str,
            _entries: &[TocEntry],
            output: &Path,
            _scratch: &mut ArtifactRegistry,
        ) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            create_blank_pdf(output, PaperSize::A4, 2 * self.calls.get() + 2)
        }

        fn render_content(&self, section: &SectionSpec, _output: &Path, _scratch: &mut ArtifactRegistry) -> Result<()> {
            Err(Error::render(&section.title, "not supported"))
        }
    }

    fn entries(n: u32) -> Vec<TocEntry> {
        (0..n).map(|i| TocEntry::new(format!("Section {}", i + 1), 3 + 2 * i)).collect()
    }

    #[test]
    fn test_toc_page_count_is_even() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toolchain = NativeToolchain::new(PaperSize::A4);
        let toc = build_toc(&entries(2), &toolchain, &mut registry, PaperSize::A4, "Contents").unwrap();
        assert_eq!(toc.page_count().unwrap(), 2);
        registry.sweep();
    }

    #[test]
    fn test_empty_toc_is_two_pages() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toolchain = NativeToolchain::new(PaperSize::A4);
        let toc = build_toc(&[], &toolchain, &mut registry, PaperSize::A4, "Contents").unwrap();
        assert_eq!(toc.page_count().unwrap(), 2);
        registry.sweep();
    }

    #[test]
    fn test_short_toc_is_padded_to_start_page() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toolchain = NativeToolchain::new(PaperSize::A4);
        let toc = build_reconciled_toc(entries(2), 7, &toolchain, &mut registry, PaperSize::A4, "Contents").unwrap();

        assert_eq!(toc.document.page_count().unwrap(), 6);
        assert_eq!(toc.shift, 0);
        assert_eq!(toc.entries, entries(2));
        registry.sweep();
    }

    #[test]
    fn test_long_toc_shifts_entries() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toolchain = NativeToolchain::new(PaperSize::A4);
        let original = entries(80);
        let toc = build_reconciled_toc(original.clone(), 3, &toolchain, &mut registry, PaperSize::A4, "Contents")
            .unwrap();

        let pages = toc.document.page_count().unwrap() as u32;
        assert!(pages > 2);
        assert_eq!(pages % 2, 0);
        assert_eq!(toc.shift, pages - 2);
        assert_eq!(toc.entries[0].page, pages + 1);
        for (printed, planned) in toc.entries.iter().zip(&original) {
            assert_eq!(printed.page, planned.page + toc.shift);
        }
        registry.sweep();
    }

    #[test]
    fn test_growing_toc_gives_up() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toolchain = GrowingToc { calls: Cell::new(0) };
        let err = build_reconciled_toc(entries(3), 3, &toolchain, &mut registry, PaperSize::A4, "Contents")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Render);
        assert!(err.to_string().contains("did not settle"), "{}", err);
        assert_eq!(toolchain.calls.get(), MAX_TOC_PASSES);
        registry.sweep();
    }

    #[test]
    fn test_shifted() {
        let entry = TocEntry::new("Intro", 3);
        assert_eq!(entry.shifted(4).unwrap(), TocEntry::new("Intro", 7));
        assert!(TocEntry::new("Intro", u32::MAX).shifted(1).is_err());
    }
}
