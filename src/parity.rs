//! Parity normalization
//!
//! Double-sided printing needs every section to begin on a right-hand
//! (odd) page. That is achieved by padding individual documents with at most
//! one blank page so that the page *after* each document has the parity the
//! next document needs.

use std::fs;

use tracing::debug;

use crate::artifact::{ArtifactRegistry, RenderedDocument};
use crate::error::{Error, Result};
use crate::layout::PaperSize;
use crate::pdf::{create_blank_pdf, merge_pdfs, MergeOptions};

/// Odd or even, for page numbers and page counts alike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    pub fn of(n: usize) -> Self {
        if n % 2 == 1 {
            Parity::Odd
        } else {
            Parity::Even
        }
    }

    /// Page-count parity a document needs so that, starting on a page of
    /// parity `starts_on`, the page following it has parity `following`
    pub fn count_for(starts_on: Parity, following: Parity) -> Self {
        if starts_on == following {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// Where each kind of document sits on the leaf
pub mod placement {
    use super::Parity;

    /// The ToC starts on page 1 and the first section title must follow on an odd page
    pub const TOC: (Parity, Parity) = (Parity::Odd, Parity::Odd);
    /// A title page is a recto; its content starts on the verso behind it
    pub const TITLE: (Parity, Parity) = (Parity::Odd, Parity::Even);
    /// Content starts on a verso and the next section title must be a recto
    pub const CONTENT: (Parity, Parity) = (Parity::Even, Parity::Odd);
}

/// What [`normalize`] did to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOutcome {
    pub before: usize,
    pub after: usize,
}

impl NormalizeOutcome {
    pub fn padded(&self) -> bool {
        self.after != self.before
    }
}

/// Pad `doc` with one blank page unless its page count already has `target` parity
///
/// The padded document replaces `doc`'s file in place. The blank page and the
/// concatenation are registry artifacts.
pub fn normalize(
    doc: &RenderedDocument,
    target: Parity,
    registry: &mut ArtifactRegistry,
    paper: PaperSize,
) -> Result<NormalizeOutcome> {
    let before = doc.page_count()?;
    if Parity::of(before) == target {
        return Ok(NormalizeOutcome { before, after: before });
    }

    let blank = registry.allocate("blank.pdf");
    create_blank_pdf(&blank, paper, 1).map_err(|e| Error::render("blank page", e))?;

    let padded = registry.allocate("padded.pdf");
    merge_pdfs(&MergeOptions {
        input_paths: vec![doc.path().to_path_buf(), blank],
        output_path: padded.clone(),
    })?;
    fs::rename(&padded, doc.path())?;

    let after = doc.page_count()?;
    debug!(path = %doc.path().display(), before, after, "added blank page");
    Ok(NormalizeOutcome { before, after })
}

/// Pad `doc` so the page after it has parity `following`, given it starts on `starts_on`
pub fn normalize_for(
    doc: &RenderedDocument,
    (starts_on, following): (Parity, Parity),
    registry: &mut ArtifactRegistry,
    paper: PaperSize,
) -> Result<NormalizeOutcome> {
    normalize(doc, Parity::count_for(starts_on, following), registry, paper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(registry: &mut ArtifactRegistry, pages: usize) -> RenderedDocument {
        let path = registry.allocate("doc.pdf");
        create_blank_pdf(&path, PaperSize::A4, pages).unwrap();
        RenderedDocument::new(path)
    }

    #[test]
    fn test_count_for_table() {
        assert_eq!(Parity::count_for(placement::TOC.0, placement::TOC.1), Parity::Even);
        assert_eq!(Parity::count_for(placement::TITLE.0, placement::TITLE.1), Parity::Odd);
        assert_eq!(Parity::count_for(placement::CONTENT.0, placement::CONTENT.1), Parity::Odd);
    }

    #[test]
    fn test_normalize_adds_at_most_one_page() {
        let mut registry = ArtifactRegistry::new().unwrap();
        for n in 1..=6 {
            for target in [Parity::Odd, Parity::Even] {
                let doc = document(&mut registry, n);
                let outcome = normalize(&doc, target, &mut registry, PaperSize::A4).unwrap();
                let count = doc.page_count().unwrap();
                assert_eq!(Parity::of(count), target, "n={} target={:?}", n, target);
                assert!(count == n || count == n + 1);
                assert_eq!(outcome.after, count);
                assert_eq!(outcome.before, n);
            }
        }
        registry.sweep();
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let doc = document(&mut registry, 4);

        let first = normalize(&doc, Parity::Odd, &mut registry, PaperSize::A4).unwrap();
        assert!(first.padded());
        let second = normalize(&doc, Parity::Odd, &mut registry, PaperSize::A4).unwrap();
        assert!(!second.padded());
        assert_eq!(doc.page_count().unwrap(), 5);
        registry.sweep();
    }

    #[test]
    fn test_matching_parity_leaves_file_untouched() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let doc = document(&mut registry, 3);
        let bytes = fs::read(doc.path()).unwrap();
        let members = registry.members().len();

        let outcome = normalize(&doc, Parity::Odd, &mut registry, PaperSize::A4).unwrap();

        assert!(!outcome.padded());
        assert_eq!(fs::read(doc.path()).unwrap(), bytes);
        assert_eq!(registry.members().len(), members);
        registry.sweep();
    }

    #[test]
    fn test_alternating_targets_toggle() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let doc = document(&mut registry, 1);
        normalize(&doc, Parity::Even, &mut registry, PaperSize::A4).unwrap();
        normalize(&doc, Parity::Odd, &mut registry, PaperSize::A4).unwrap();
        assert_eq!(doc.page_count().unwrap(), 3);
        registry.sweep();
    }

    #[test]
    fn test_toc_placement_leaves_next_page_odd() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toc = document(&mut registry, 1);
        normalize_for(&toc, placement::TOC, &mut registry, PaperSize::A4).unwrap();
        let next_page = toc.page_count().unwrap() + 1;
        assert_eq!(Parity::of(next_page), Parity::Odd);
        registry.sweep();
    }
}
