//! YAML run configuration
//!
//! A configuration lists the slide decks to bind together, in order, under a
//! `files` key. Everything else is optional and has a default:
//!
//! ```yaml
//! paper: a4
//! start_page: 3
//! files:
//!   - title: Intro
//!     file: intro.pdf
//!     format: 2x1
//!     slides: [1, 2, "4-6"]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::layout::{LayoutFormat, PaperSize};

/// Page the first section's title lands on when the ToC fills pages 1 and 2
pub const DEFAULT_START_PAGE: u32 = 3;

/// Largest accepted `start_page`; front matter beyond this is a typo
pub const MAX_START_PAGE: u32 = 9_999;

/// Default deadline for one external tool invocation
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// One selector in a section's `slides` list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    /// A single 1-based page
    Page(u32),
    /// Inclusive range; `None` as the end means "to the last page"
    Range { start: u32, end: Option<u32> },
    /// An empty cell
    Blank,
}

impl PageSelector {
    /// Expand into 1-based page numbers (`None` for a blank cell)
    pub fn resolve(&self, page_count: u32) -> std::result::Result<Vec<Option<u32>>, String> {
        let check = |page: u32| {
            if page > page_count {
                Err(format!("page {} is out of range (document has {} pages)", page, page_count))
            } else {
                Ok(page)
            }
        };

        match *self {
            PageSelector::Page(n) => Ok(vec![Some(check(n)?)]),
            PageSelector::Range { start, end } => {
                let end = check(end.unwrap_or(page_count))?;
                check(start)?;
                Ok((start..=end).map(Some).collect())
            }
            PageSelector::Blank => Ok(vec![None]),
        }
    }
}

impl FromStr for PageSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        let invalid = || Error::Config(format!("Malformed page selector '{}'", s));
        let page = |t: &str| -> Result<u32> {
            match t.trim().parse::<u32>() {
                Ok(0) | Err(_) => Err(invalid()),
                Ok(n) => Ok(n),
            }
        };

        if token == "{}" {
            return Ok(PageSelector::Blank);
        }

        match token.split_once('-') {
            None => Ok(PageSelector::Page(page(token)?)),
            Some((start, end)) => {
                let start = if start.trim().is_empty() { 1 } else { page(start)? };
                let end = if end.trim().is_empty() { None } else { Some(page(end)?) };
                if start == 1 && end.is_none() && token.trim() == "-" {
                    return Err(invalid());
                }
                if let Some(end) = end {
                    if end < start {
                        return Err(invalid());
                    }
                }
                Ok(PageSelector::Range { start, end })
            }
        }
    }
}

impl fmt::Display for PageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelector::Page(n) => write!(f, "{}", n),
            PageSelector::Range { start, end: Some(end) } => write!(f, "{}-{}", start, end),
            PageSelector::Range { start, end: None } => write!(f, "{}-", start),
            PageSelector::Blank => f.write_str("{}"),
        }
    }
}

/// Comma-joined selector list, the form `pdfjam` takes
pub fn join_selectors(selectors: &[PageSelector]) -> String {
    selectors
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// One configured input deck
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    pub title: String,
    /// Source file as written in the configuration
    pub file: PathBuf,
    /// Source PDF, resolved against the input directory
    pub source: PathBuf,
    pub format: LayoutFormat,
    pub slides: Vec<PageSelector>,
    pub landscape: bool,
}

/// Validated run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub sections: Vec<SectionSpec>,
    pub input_dir: PathBuf,
    pub paper: PaperSize,
    pub start_page: u32,
    pub toc_title: String,
    pub footer: String,
    pub cleanup_on_failure: bool,
    pub tool_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    files: Option<Vec<RawSection>>,
    input_dir: Option<PathBuf>,
    #[serde(default)]
    paper: PaperSize,
    start_page: Option<u32>,
    toc_title: Option<String>,
    footer: Option<String>,
    cleanup_on_failure: Option<bool>,
    tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSection {
    title: Option<String>,
    file: Option<String>,
    name: Option<String>,
    format: Option<String>,
    slides: Option<Vec<RawSelector>>,
    #[serde(default)]
    landscape: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Number(i64),
    Text(String),
}

impl RawSelector {
    fn parse(&self) -> Result<PageSelector> {
        match self {
            RawSelector::Number(n) if *n >= 1 && *n <= u32::MAX as i64 => {
                Ok(PageSelector::Page(*n as u32))
            }
            RawSelector::Number(n) => Err(Error::Config(format!("Malformed page selector '{}'", n))),
            RawSelector::Text(s) => s.parse(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// A relative `input_dir` is resolved against the directory holding the
    /// configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_yaml(&text, base)
    }

    /// Parse and validate configuration text, resolving paths against `base`
    pub fn from_yaml(text: &str, base: &Path) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("Invalid YAML: {}", e)))?;

        let input_dir = base.join(raw.input_dir.unwrap_or_else(|| PathBuf::from("input")));

        let start_page = raw.start_page.unwrap_or(DEFAULT_START_PAGE);
        if start_page > MAX_START_PAGE {
            return Err(Error::Config(format!(
                "start_page must be at most {}, got {}",
                MAX_START_PAGE, start_page
            )));
        }
        if start_page % 2 == 0 {
            return Err(Error::Config(format!(
                "start_page must be odd so sections begin on a right-hand page, got {}",
                start_page
            )));
        }

        let timeout_secs = raw.tool_timeout_secs.unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config("tool_timeout_secs must be positive".to_string()));
        }

        let files = raw
            .files
            .ok_or_else(|| Error::Config("Missing required key 'files'".to_string()))?;

        let sections = files
            .into_iter()
            .enumerate()
            .map(|(i, section)| section.validate(i + 1, &input_dir))
            .collect::<Result<Vec<_>>>()?;

        Ok(Config {
            sections,
            input_dir,
            paper: raw.paper,
            start_page,
            toc_title: raw.toc_title.unwrap_or_else(|| "Table of Contents".to_string()),
            footer: raw.footer.unwrap_or_else(|| "{page}".to_string()),
            cleanup_on_failure: raw.cleanup_on_failure.unwrap_or(true),
            tool_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Point every section at a different input directory
    pub fn with_input_dir(mut self, input_dir: PathBuf) -> Self {
        for section in &mut self.sections {
            section.source = input_dir.join(&section.file);
        }
        self.input_dir = input_dir;
        self
    }
}

impl RawSection {
    fn validate(self, index: usize, input_dir: &Path) -> Result<SectionSpec> {
        let missing = |key: &str| Error::Config(format!("files[{}]: missing required key '{}'", index, key));

        let title = self.title.ok_or_else(|| missing("title"))?;
        if title.trim().is_empty() {
            return Err(Error::Config(format!("files[{}]: title is empty", index)));
        }

        let file = match (self.file, self.name) {
            (Some(file), None) | (None, Some(file)) => PathBuf::from(file),
            (Some(_), Some(_)) => {
                return Err(Error::Config(format!(
                    "files[{}] ('{}'): give either 'file' or 'name', not both",
                    index, title
                )))
            }
            (None, None) => return Err(missing("file")),
        };

        let format: LayoutFormat = self
            .format
            .ok_or_else(|| missing("format"))?
            .parse()
            .map_err(|e| Error::Config(format!("files[{}] ('{}'): {}", index, title, root_message(e))))?;

        let slides = self
            .slides
            .ok_or_else(|| missing("slides"))?
            .iter()
            .map(RawSelector::parse)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::Config(format!("files[{}] ('{}'): {}", index, title, root_message(e))))?;
        if slides.is_empty() {
            return Err(Error::Config(format!("files[{}] ('{}'): slides is empty", index, title)));
        }

        Ok(SectionSpec {
            title,
            source: input_dir.join(&file),
            file,
            format,
            slides,
            landscape: self.landscape,
        })
    }
}

fn root_message(err: Error) -> String {
    match err {
        Error::Config(msg) => msg,
        other => other.to_string(),
    }
}
