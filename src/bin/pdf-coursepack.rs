//! PDF Course Pack CLI tool
//!
//! A command-line tool for assembling slide decks into a double-sided course pack.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pdf_coursepack::config::{join_selectors, Config};
use pdf_coursepack::pdf::extract_metadata;
use pdf_coursepack::pipeline::{Pipeline, RunOptions};
use pdf_coursepack::toolchain::{Backend, LatexToolchain, NativeToolchain, Toolchain};
use pdf_coursepack::Error;

/// PDF Course Pack - Title pages, table of contents and page numbers for slide decks
#[derive(Parser)]
#[command(name = "pdf-coursepack")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Build with pdflatex and pdfjam
    pdf-coursepack build coursepack.yaml -o coursepack.pdf

    # Build without a TeX installation
    pdf-coursepack build coursepack.yaml -o coursepack.pdf --backend native

    # Keep intermediate files for inspection
    pdf-coursepack build coursepack.yaml -o coursepack.pdf --keep-artifacts -v

    # Validate a configuration
    pdf-coursepack check coursepack.yaml")]
struct Cli {
    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a course pack from a configuration file
    Build {
        /// YAML configuration file
        config: PathBuf,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        /// Directory holding the source decks (overrides input_dir)
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Rendering backend: "latex" (pdflatex + pdfjam) or "native"
        #[arg(long, default_value = "latex", value_parser = parse_backend)]
        backend: Backend,

        /// Leave the scratch directory on disk
        #[arg(long)]
        keep_artifacts: bool,

        /// Seconds each external tool may run (overrides tool_timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },

    /// Validate a configuration file and list its sections
    Check {
        /// YAML configuration file
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build {
            config, output, input_dir, backend, keep_artifacts, timeout, open,
        } => {
            cmd_build(config, output, input_dir, backend, keep_artifacts, timeout, open)
        }
        Commands::Info { input } => {
            cmd_info(input)
        }
        Commands::Check { config } => {
            cmd_check(config)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<Error>()
            .map(|err| err.kind().exit_code())
            .unwrap_or(1);
        process::exit(code);
    }
}

fn parse_backend(s: &str) -> Result<Backend, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

/// Open a file with the system default application
fn open_file(path: &Path) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Build the course pack described by `config_path`
fn cmd_build(
    config_path: PathBuf,
    output: PathBuf,
    input_dir: Option<PathBuf>,
    backend: Backend,
    keep_artifacts: bool,
    timeout: Option<u64>,
    open: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load(&config_path)?;
    if let Some(dir) = input_dir {
        config = config.with_input_dir(dir);
    }
    if let Some(secs) = timeout {
        if secs == 0 {
            return Err(Error::Config("--timeout must be positive".to_string()).into());
        }
        config.tool_timeout = Duration::from_secs(secs);
    }

    let toolchain: Box<dyn Toolchain> = match backend {
        Backend::Latex => Box::new(LatexToolchain::new(config.paper, config.tool_timeout)),
        Backend::Native => Box::new(NativeToolchain::new(config.paper)),
    };

    let report = Pipeline::new(&config, toolchain.as_ref())
        .with_options(RunOptions {
            keep_artifacts,
            ..RunOptions::default()
        })
        .run(&output)?;

    for entry in &report.toc {
        eprintln!("  {:>4}  {}", entry.page, entry.title);
    }
    eprintln!("Output: {} ({} pages)", report.output.display(), report.total_pages);
    if let Some(scratch) = &report.kept_artifacts {
        eprintln!("Artifacts: {}", scratch.display());
    }

    if open {
        open_file(&output).context("Could not open the output file")?;
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> anyhow::Result<()> {
    let metadata = extract_metadata(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);
    if let Some(title) = &metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = &metadata.author {
        println!("Author: {}", author);
    }

    Ok(())
}

/// Load a configuration and print what it would build
fn cmd_check(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load(&config_path)?;

    println!("Input directory: {}", config.input_dir.display());
    println!("Paper: {}", config.paper);
    println!("First section on page {}", config.start_page);
    for (i, section) in config.sections.iter().enumerate() {
        let status = if section.source.exists() { "" } else { "  (missing)" };
        println!(
            "{:>3}. {} <- {} [{}{}] slides {}{}",
            i + 1,
            section.title,
            section.file.display(),
            section.format,
            if section.landscape { ", landscape" } else { "" },
            join_selectors(&section.slides),
            status,
        );
    }

    Ok(())
}
