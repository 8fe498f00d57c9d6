//! Error types for the course pack builder

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineState;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the course pack builder
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Title, ToC or content rendering failed
    #[error("Render failed for {what}: {detail}")]
    Render { what: String, detail: String },

    /// Page count could not be determined
    #[error("Cannot read page count of {}: {detail}", .path.display())]
    ArtifactUnreadable { path: PathBuf, detail: String },

    /// Concatenation failed
    #[error("Assembly failed: {0}")]
    Assembly(String),

    /// Footer stamping failed
    #[error("Stamping failed for {}: {detail}", .path.display())]
    Stamp { path: PathBuf, detail: String },

    /// External tool could not be run or exited unsuccessfully
    #[error("{program}: {reason}")]
    Tool { program: String, reason: String },

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure tagged with the pipeline state it happened in
    #[error("{stage}: {source}")]
    Stage {
        stage: PipelineState,
        #[source]
        source: Box<Error>,
    },
}

/// Coarse classification of an [`Error`], used for exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Render,
    ArtifactUnreadable,
    Assembly,
    Stamp,
    Other,
}

impl ErrorKind {
    /// Process exit code for this kind of failure
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Config => 2,
            ErrorKind::Render => 3,
            ErrorKind::ArtifactUnreadable => 4,
            ErrorKind::Assembly => 5,
            ErrorKind::Stamp => 6,
            ErrorKind::Other => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Render => "RenderFailure",
            ErrorKind::ArtifactUnreadable => "ArtifactUnreadable",
            ErrorKind::Assembly => "AssemblyFailure",
            ErrorKind::Stamp => "StampFailure",
            ErrorKind::Other => "Error",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Build a render failure for the named item
    pub fn render(what: impl Into<String>, detail: impl fmt::Display) -> Self {
        Error::Render {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    /// Build an unreadable-artifact failure
    pub fn unreadable(path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        Error::ArtifactUnreadable {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// Tag this error with the pipeline state it surfaced in.
    ///
    /// An error that already carries a tag keeps its original one.
    pub fn in_stage(self, stage: PipelineState) -> Self {
        match self {
            tagged @ Error::Stage { .. } => tagged,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The untagged error underneath any stage tags
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Pipeline state recorded on this error, if any
    pub fn stage(&self) -> Option<PipelineState> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Classify the originating failure
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Error::Config(_) => ErrorKind::Config,
            Error::Render { .. } | Error::Tool { .. } => ErrorKind::Render,
            Error::ArtifactUnreadable { .. } => ErrorKind::ArtifactUnreadable,
            Error::Assembly(_) => ErrorKind::Assembly,
            Error::Stamp { .. } => ErrorKind::Stamp,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tag_keeps_kind() {
        let err = Error::render("Intro", "boom").in_stage(PipelineState::RenderingSections);
        assert_eq!(err.kind(), ErrorKind::Render);
        assert_eq!(err.stage(), Some(PipelineState::RenderingSections));
        assert!(matches!(err.root(), Error::Render { .. }));
    }

    #[test]
    fn test_first_stage_tag_wins() {
        let err = Error::Assembly("missing".into())
            .in_stage(PipelineState::Assembling)
            .in_stage(PipelineState::Failed);
        assert_eq!(err.stage(), Some(PipelineState::Assembling));
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::Config,
            ErrorKind::Render,
            ErrorKind::ArtifactUnreadable,
            ErrorKind::Assembly,
            ErrorKind::Stamp,
            ErrorKind::Other,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn test_display_mentions_stage_and_item() {
        let err = Error::render("Intro", "missing source").in_stage(PipelineState::RenderingSections);
        let msg = err.to_string();
        assert!(msg.contains("rendering sections"), "{}", msg);
        assert!(msg.contains("Intro"), "{}", msg);
    }
}
