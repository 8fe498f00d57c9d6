//! Pipeline driver
//!
//! Runs the stages strictly in order:
//!
//! ```text
//! Init -> RenderingSections -> BuildingToc -> Assembling -> Stamping -> CleaningUp -> Done
//! ```
//!
//! Any stage may fail, which moves the driver to `Failed`. Every file the run
//! creates is allocated through one [`ArtifactRegistry`], and the registry is
//! swept on success and (unless configured otherwise) on failure.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactRegistry, RenderedDocument};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pagination::PaginationTracker;
use crate::pdf::{count_pages, merge_pdfs, stamp_page_numbers, MergeOptions, StampOptions};
use crate::section::render_section;
use crate::toc::{build_reconciled_toc, TocEntry};
use crate::toolchain::Toolchain;

/// Where the driver is in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    RenderingSections,
    BuildingToc,
    Assembling,
    Stamping,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::RenderingSections => "rendering sections",
            PipelineState::BuildingToc => "building table of contents",
            PipelineState::Assembling => "assembling",
            PipelineState::Stamping => "stamping",
            PipelineState::CleaningUp => "cleaning up",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One rendered section, in configuration order
///
/// The same ordered list produces the ToC entries and feeds the assembler,
/// so the two can never disagree about section order.
#[derive(Debug)]
pub struct SectionRecord {
    pub title: String,
    /// Page the title page lands on, assuming the ToC fills `1..start_page`
    pub toc_page: u32,
    pub title_doc: RenderedDocument,
    pub content_doc: RenderedDocument,
}

/// Per-run switches that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Leave the scratch directory on disk, whatever the outcome
    pub keep_artifacts: bool,
    /// Create the scratch directory here instead of the system temp dir
    pub scratch_parent: Option<PathBuf>,
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: PathBuf,
    /// ToC entries as printed
    pub toc: Vec<TocEntry>,
    pub total_pages: usize,
    pub artifacts_removed: usize,
    /// Scratch directory, when it was kept
    pub kept_artifacts: Option<PathBuf>,
}

/// Drives one course pack build
pub struct Pipeline<'a> {
    config: &'a Config,
    toolchain: &'a dyn Toolchain,
    options: RunOptions,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, toolchain: &'a dyn Toolchain) -> Self {
        Self {
            config,
            toolchain,
            options: RunOptions::default(),
            state: PipelineState::Init,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }

    /// Build the course pack and write it to `output`
    ///
    /// On failure the error is tagged with the state it happened in and the
    /// output path is left untouched.
    pub fn run(&mut self, output: &Path) -> Result<RunReport> {
        info!(
            sections = self.config.sections.len(),
            backend = self.toolchain.name(),
            output = %output.display(),
            "building course pack"
        );

        let registry = match &self.options.scratch_parent {
            Some(parent) => ArtifactRegistry::new_in(parent),
            None => ArtifactRegistry::new(),
        };
        let mut registry = registry.map_err(|e| {
            self.transition(PipelineState::Failed);
            e.in_stage(PipelineState::Init)
        })?;

        match self.execute(&mut registry, output) {
            Ok((toc, total_pages)) => {
                self.transition(PipelineState::CleaningUp);
                let (artifacts_removed, kept_artifacts) = if self.options.keep_artifacts {
                    let kept = registry.keep();
                    info!(scratch = %kept.display(), "kept intermediate artifacts");
                    (0, Some(kept))
                } else {
                    (registry.sweep(), None)
                };
                self.transition(PipelineState::Done);
                info!(pages = total_pages, output = %output.display(), "course pack written");

                Ok(RunReport {
                    output: output.to_path_buf(),
                    toc,
                    total_pages,
                    artifacts_removed,
                    kept_artifacts,
                })
            }
            Err(e) => {
                let err = e.in_stage(self.state);
                self.transition(PipelineState::Failed);
                if self.config.cleanup_on_failure && !self.options.keep_artifacts {
                    registry.sweep();
                } else {
                    let kept = registry.keep();
                    warn!(scratch = %kept.display(), "left intermediate artifacts for inspection");
                }
                Err(err)
            }
        }
    }

    fn execute(&mut self, registry: &mut ArtifactRegistry, output: &Path) -> Result<(Vec<TocEntry>, usize)> {
        let config = self.config;

        self.transition(PipelineState::RenderingSections);
        let mut tracker = PaginationTracker::new(config.start_page);
        let mut records = Vec::with_capacity(config.sections.len());

        for spec in &config.sections {
            let toc_page = tracker.advance(0)?;
            let rendered = render_section(spec, self.toolchain, registry, config.paper)?;
            let pages = rendered.page_count()? as u32;
            tracker.advance(pages)?;
            info!(section = %spec.title, page = toc_page, pages, "section ready");

            records.push(SectionRecord {
                title: spec.title.clone(),
                toc_page,
                title_doc: rendered.title,
                content_doc: rendered.content,
            });
        }

        self.transition(PipelineState::BuildingToc);
        let entries = records
            .iter()
            .map(|r| TocEntry::new(r.title.clone(), r.toc_page))
            .collect();
        let toc = build_reconciled_toc(
            entries,
            config.start_page,
            self.toolchain,
            registry,
            config.paper,
            &config.toc_title,
        )?;

        self.transition(PipelineState::Assembling);
        let assembled = assemble(toc.document, records, registry)?;

        self.transition(PipelineState::Stamping);
        let stamped = registry.allocate("stamped.pdf");
        let options = StampOptions {
            template: config.footer.clone(),
            ..StampOptions::default()
        };
        stamp_page_numbers(assembled.path(), &stamped, &options)?;
        let total_pages = count_pages(&stamped)?;

        publish(&stamped, output)?;
        Ok((toc.entries, total_pages))
    }
}

/// Concatenate the ToC, then each section's title and content, in record order
///
/// The result is checked against the sum of its parts.
pub fn assemble(
    toc: RenderedDocument,
    sections: Vec<SectionRecord>,
    registry: &mut ArtifactRegistry,
) -> Result<RenderedDocument> {
    let mut expected = toc.page_count()?;
    let mut inputs = vec![toc.path().to_path_buf()];
    for record in &sections {
        expected += record.title_doc.page_count()? + record.content_doc.page_count()?;
        inputs.push(record.title_doc.path().to_path_buf());
        inputs.push(record.content_doc.path().to_path_buf());
    }

    let output = registry.allocate("assembled.pdf");
    merge_pdfs(&MergeOptions {
        input_paths: inputs,
        output_path: output.clone(),
    })?;

    let assembled = RenderedDocument::new(output);
    let actual = assembled.page_count()?;
    if actual != expected {
        return Err(Error::Assembly(format!(
            "assembled document has {} pages, expected {}",
            actual, expected
        )));
    }
    debug!(pages = actual, sections = sections.len(), "assembled");
    Ok(assembled)
}

/// Move the finished document into place without exposing a partial file
fn publish(finished: &Path, output: &Path) -> Result<()> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let staged = NamedTempFile::new_in(parent)?;
    fs::copy(finished, staged.path())?;
    staged.persist(output).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
