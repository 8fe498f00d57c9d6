//! Rendering one configured section

use tracing::debug;

use crate::artifact::{ArtifactRegistry, RenderedDocument};
use crate::config::SectionSpec;
use crate::error::Result;
use crate::layout::PaperSize;
use crate::parity::{normalize_for, placement};
use crate::toolchain::Toolchain;

/// Title page and laid-out content of one section, both parity-normalized
#[derive(Debug)]
pub struct RenderedSection {
    pub title: RenderedDocument,
    pub content: RenderedDocument,
}

impl RenderedSection {
    /// Pages the section occupies in the final document
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.title.page_count()? + self.content.page_count()?)
    }
}

/// Render the title page and the content block of `spec`
///
/// The title is padded so its content starts on an even page, and the
/// content so the next section starts on an odd one.
pub fn render_section(
    spec: &SectionSpec,
    toolchain: &dyn Toolchain,
    registry: &mut ArtifactRegistry,
    paper: PaperSize,
) -> Result<RenderedSection> {
    let title_path = registry.allocate("title.pdf");
    toolchain.render_title(&spec.title, &title_path, registry)?;
    let title = RenderedDocument::new(title_path);
    normalize_for(&title, placement::TITLE, registry, paper)?;

    let content_path = registry.allocate("content.pdf");
    toolchain.render_content(spec, &content_path, registry)?;
    let content = RenderedDocument::new(content_path);
    let outcome = normalize_for(&content, placement::CONTENT, registry, paper)?;

    debug!(
        section = %spec.title,
        content_pages = outcome.after,
        padded = outcome.padded(),
        "rendered section"
    );
    Ok(RenderedSection { title, content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelector;
    use crate::layout::LayoutFormat;
    use crate::parity::Parity;
    use crate::pdf::create_blank_pdf;
    use crate::toolchain::NativeToolchain;
    use std::path::PathBuf;

    fn spec(source: PathBuf, pages: u32) -> SectionSpec {
        SectionSpec {
            title: "Intro".to_string(),
            file: PathBuf::from("intro.pdf"),
            source,
            format: LayoutFormat { cols: 1, rows: 1 },
            slides: vec![PageSelector::Range { start: 1, end: Some(pages) }],
            landscape: false,
        }
    }

    #[test]
    fn test_section_parities() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toolchain = NativeToolchain::new(PaperSize::A4);

        for pages in 1..=4 {
            let source = registry.allocate("deck.pdf");
            create_blank_pdf(&source, PaperSize::A4, pages as usize).unwrap();

            let section = render_section(&spec(source, pages), &toolchain, &mut registry, PaperSize::A4).unwrap();
            assert_eq!(Parity::of(section.title.page_count().unwrap()), Parity::Odd);
            assert_eq!(Parity::of(section.content.page_count().unwrap()), Parity::Odd);
            // An odd title plus odd content keeps the next title on a recto
            assert_eq!(section.page_count().unwrap() % 2, 0);
        }
        registry.sweep();
    }

    #[test]
    fn test_missing_source_names_section() {
        let mut registry = ArtifactRegistry::new().unwrap();
        let toolchain = NativeToolchain::new(PaperSize::A4);
        let err = render_section(
            &spec(PathBuf::from("no/such/intro.pdf"), 1),
            &toolchain,
            &mut registry,
            PaperSize::A4,
        )
        .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Render);
        assert!(err.to_string().contains("Intro"));
        assert!(err.to_string().contains("intro.pdf"));
        registry.sweep();
    }
}
