//! `pdflatex` + `pdfjam` backend
//!
//! Title and ToC pages are typeset by `pdflatex` from generated sources;
//! content blocks are laid out by `pdfjam --nup`. Each invocation runs in its
//! own scratch subdirectory so `.aux`/`.log` files never collide.

use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use crate::artifact::ArtifactRegistry;
use crate::config::{join_selectors, SectionSpec};
use crate::error::{Error, Result};
use crate::layout::PaperSize;
use crate::toc::TocEntry;
use crate::toolchain::process::run_tool;
use crate::toolchain::Toolchain;

/// Subprocess backend
#[derive(Debug, Clone)]
pub struct LatexToolchain {
    paper: PaperSize,
    timeout: Duration,
    pdflatex: OsString,
    pdfjam: OsString,
}

impl LatexToolchain {
    pub fn new(paper: PaperSize, timeout: Duration) -> Self {
        Self {
            paper,
            timeout,
            pdflatex: "pdflatex".into(),
            pdfjam: "pdfjam".into(),
        }
    }

    /// Use different executables (e.g. absolute paths)
    pub fn with_programs(mut self, pdflatex: impl Into<OsString>, pdfjam: impl Into<OsString>) -> Self {
        self.pdflatex = pdflatex.into();
        self.pdfjam = pdfjam.into();
        self
    }

    /// Typeset `source` with pdflatex and move the PDF to `output`
    fn typeset(&self, what: &str, source: &str, output: &Path, scratch: &mut ArtifactRegistry) -> Result<()> {
        let workdir = scratch.allocate_dir("latex")?;
        let tex = workdir.join("doc.tex");
        fs::write(&tex, source)?;

        run_tool(
            Command::new(&self.pdflatex)
                .arg("-interaction=nonstopmode")
                .arg("-halt-on-error")
                .arg("-output-directory")
                .arg(&workdir)
                .arg(&tex)
                .current_dir(&workdir),
            self.timeout,
        )
        .map_err(|e| Error::render(what, e))?;

        let pdf = workdir.join("doc.pdf");
        if !pdf.exists() {
            return Err(Error::render(what, "pdflatex reported success but wrote no PDF"));
        }
        fs::rename(&pdf, output)?;
        debug!(what, output = %output.display(), "typeset");
        Ok(())
    }
}

impl Toolchain for LatexToolchain {
    fn name(&self) -> &'static str {
        "latex"
    }

    fn render_title(&self, title: &str, output: &Path, scratch: &mut ArtifactRegistry) -> Result<()> {
        let source = title_source(title, self.paper);
        self.typeset(&format!("title page '{}'", title), &source, output, scratch)
    }

    fn render_toc(
        &self,
        heading: &str,
        entries: &[TocEntry],
        output: &Path,
        scratch: &mut ArtifactRegistry,
    ) -> Result<()> {
        let source = toc_source(heading, entries, self.paper);
        self.typeset("table of contents", &source, output, scratch)
    }

    fn render_content(&self, section: &SectionSpec, output: &Path, _scratch: &mut ArtifactRegistry) -> Result<()> {
        let what = format!("section '{}' ({})", section.title, section.file.display());
        if !section.source.exists() {
            return Err(Error::render(what, format!("source not found: {}", section.source.display())));
        }

        run_tool(
            Command::new(&self.pdfjam).args(pdfjam_args(section, self.paper, output)),
            self.timeout,
        )
        .map_err(|e| Error::render(what, e))?;
        Ok(())
    }
}

/// Arguments for laying out one section with pdfjam
pub fn pdfjam_args(section: &SectionSpec, paper: PaperSize, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--outfile".into(),
        output.into(),
        "--nup".into(),
        section.format.to_string().into(),
        format!("--{}", paper.latex_name()).into(),
    ];
    if section.landscape {
        args.push("--landscape".into());
    }
    args.push("--".into());
    args.push(section.source.clone().into());
    args.push(join_selectors(&section.slides).into());
    args
}

fn preamble(paper: PaperSize) -> String {
    format!(
        "\\documentclass{{article}}\n\
         \\usepackage[utf8]{{inputenc}}\n\
         \\usepackage[T1]{{fontenc}}\n\
         \\usepackage[{}, margin=1in]{{geometry}}\n\
         \\pagestyle{{empty}}\n",
        paper.latex_name()
    )
}

/// LaTeX source for a title page
pub fn title_source(title: &str, paper: PaperSize) -> String {
    let lines: Vec<String> = title.lines().map(escape_latex).collect();
    format!(
        "{}\\begin{{document}}\n\
         \\centering\n\
         \\vspace*{{\\fill}}\n\
         {{\\Huge {}\\par}}\n\
         \\vspace*{{\\fill}}\n\
         \\end{{document}}\n",
        preamble(paper),
        lines.join("\\\\\n")
    )
}

/// LaTeX source for the ToC listing
pub fn toc_source(heading: &str, entries: &[TocEntry], paper: PaperSize) -> String {
    let mut body = String::new();
    for entry in entries {
        body.push_str(&format!(
            "\\noindent {}\\dotfill {}\\par\\smallskip\n",
            escape_latex(&entry.title.replace('\n', " ")),
            entry.page
        ));
    }
    if entries.is_empty() {
        // An empty document would produce no page at all
        body.push_str("\\mbox{}\n");
    }
    format!(
        "{}\\begin{{document}}\n\
         \\section*{{{}}}\n\
         {}\
         \\end{{document}}\n",
        preamble(paper),
        escape_latex(heading),
        body
    )
}

/// Escape characters with special meaning in LaTeX text
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '%' | '#' | '_' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}
