//! PDF Course Pack Library
//!
//! Builds a printable, double-sided course pack from a YAML list of slide
//! decks. This library provides functionality to:
//! - Render a title page and an n-up layout of selected slides per deck
//! - Pad every document so each section starts on a right-hand page
//! - Build a table of contents whose page numbers match the final document
//! - Merge everything and stamp page numbers on the outer edge
//! - Clean up every intermediate file, whether the run succeeds or fails
//!
//! # Example
//!
//! ```no_run
//! use pdf_coursepack::config::Config;
//! use pdf_coursepack::pipeline::Pipeline;
//! use pdf_coursepack::toolchain::NativeToolchain;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("coursepack.yaml")).expect("invalid config");
//! let toolchain = NativeToolchain::new(config.paper);
//! let report = Pipeline::new(&config, &toolchain)
//!     .run(Path::new("coursepack.pdf"))
//!     .expect("build failed");
//! println!("{} pages", report.total_pages);
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod layout;
pub mod pagination;
pub mod parity;
pub mod pdf;
pub mod pipeline;
pub mod section;
pub mod toc;
pub mod toolchain;

// Re-export commonly used items
pub use error::{Error, ErrorKind, Result};
