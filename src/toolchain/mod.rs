//! Rendering backends
//!
//! Everything that turns text or a source deck into a new PDF goes through
//! the [`Toolchain`] trait. Two backends implement it:
//!
//! - [`LatexToolchain`] runs `pdflatex` and `pdfjam` as subprocesses, each call
//!   bounded by a timeout.
//! - [`NativeToolchain`] draws the same documents in-process with lopdf.

pub mod latex;
pub mod native;
pub mod process;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::artifact::ArtifactRegistry;
use crate::config::SectionSpec;
use crate::error::{Error, Result};
use crate::toc::TocEntry;

pub use latex::LatexToolchain;
pub use native::NativeToolchain;

/// A renderer for title pages, ToC listings and laid-out content
///
/// Every method writes a complete PDF to `output`. Side files go into the
/// scratch directory through `scratch`, never next to the output.
pub trait Toolchain {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// A single page with `title` centered in large type
    fn render_title(&self, title: &str, output: &Path, scratch: &mut ArtifactRegistry) -> Result<()>;

    /// A listing of `entries` under `heading`: title, dot leader, page number
    fn render_toc(
        &self,
        heading: &str,
        entries: &[TocEntry],
        output: &Path,
        scratch: &mut ArtifactRegistry,
    ) -> Result<()>;

    /// The section's selected source pages, arranged `cols × rows` per sheet
    fn render_content(&self, section: &SectionSpec, output: &Path, scratch: &mut ArtifactRegistry) -> Result<()>;
}

/// Which [`Toolchain`] to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Latex,
    Native,
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "latex" => Ok(Backend::Latex),
            "native" => Ok(Backend::Native),
            other => Err(Error::Config(format!("Unknown backend '{}', expected 'latex' or 'native'", other))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Latex => f.write_str("latex"),
            Backend::Native => f.write_str("native"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("LaTeX".parse::<Backend>().unwrap(), Backend::Latex);
        assert_eq!("native".parse::<Backend>().unwrap(), Backend::Native);
        assert!("word".parse::<Backend>().is_err());
    }
}
