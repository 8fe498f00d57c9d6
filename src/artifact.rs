//! Intermediate artifacts of one run
//!
//! Every file a run creates lives in one scratch directory owned by an
//! [`ArtifactRegistry`]. Files are allocated through the registry so the
//! registry knows all of them; cleanup is a single sweep over that list.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pdf::count_pages;

/// An owned handle to a rendered PDF in the scratch directory
///
/// Deliberately not `Clone`: stages take the handle by value, so a stage
/// that hands a document on cannot keep using it.
#[derive(Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    path: PathBuf,
}

impl RenderedDocument {
    /// Wrap a path produced by a renderer
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current page count, re-read from disk on every call
    pub fn page_count(&self) -> Result<usize> {
        count_pages(&self.path)
    }
}

/// The set of all intermediate files created during a run
#[derive(Debug)]
pub struct ArtifactRegistry {
    dir: Option<TempDir>,
    root: PathBuf,
    members: Vec<PathBuf>,
}

impl ArtifactRegistry {
    /// Create a fresh scratch directory under the system temp directory
    pub fn new() -> Result<Self> {
        Self::from_dir(tempfile::Builder::new().prefix("coursepack-").tempdir()?)
    }

    /// Create a fresh scratch directory inside `parent`
    pub fn new_in(parent: &Path) -> Result<Self> {
        Self::from_dir(tempfile::Builder::new().prefix("coursepack-").tempdir_in(parent)?)
    }

    fn from_dir(dir: TempDir) -> Result<Self> {
        let root = dir.path().to_path_buf();
        debug!(scratch = %root.display(), "created scratch directory");
        Ok(Self {
            dir: Some(dir),
            root,
            members: Vec::new(),
        })
    }

    /// Scratch directory of this run
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a path for a new artifact and record it
    ///
    /// Names are prefixed with a sequence number so two allocations never
    /// collide, whatever `name` is.
    pub fn allocate(&mut self, name: &str) -> PathBuf {
        let path = self.root.join(format!("{:03}-{}", self.members.len(), name));
        self.members.push(path.clone());
        path
    }

    /// Reserve a directory for tools that write side files
    pub fn allocate_dir(&mut self, name: &str) -> Result<PathBuf> {
        let path = self.allocate(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Every artifact allocated so far, in allocation order
    pub fn members(&self) -> &[PathBuf] {
        &self.members
    }

    /// Remove every member once, then the scratch directory itself
    ///
    /// Members that no longer exist (renamed over another artifact, or never
    /// written because their stage failed) are skipped. Returns the number of
    /// artifacts actually removed.
    pub fn sweep(mut self) -> usize {
        let mut removed = 0;
        for member in self.members.drain(..) {
            let result = if member.is_dir() {
                fs::remove_dir_all(&member)
            } else {
                fs::remove_file(&member)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %member.display(), error = %e, "could not remove artifact"),
            }
        }

        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(scratch = %self.root.display(), error = %e, "could not remove scratch directory");
            }
        }

        debug!(removed, "swept intermediate artifacts");
        removed
    }

    /// Leave the scratch directory and its contents on disk, returning its path
    #[allow(deprecated)]
    pub fn keep(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.into_path();
        }
        self.root.clone()
    }
}
