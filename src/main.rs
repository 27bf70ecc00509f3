//! podsite: build a static documentation site from a Pod-style corpus.
//!
//! `podsite build <SOURCE> <OUTPUT>` parses every `.rakudoc` / `.pod6` file
//! under SOURCE, extracts documentables into a global registry, resolves
//! cross-references against it and writes HTML (or markdown) pages, a
//! search index and a diagnostics report to OUTPUT.

mod anchor;
mod build;
mod classify;
mod config;
mod diagnostics;
mod extract;
mod loader;
mod model;
mod parser;
mod registry;
mod render;
mod resolve;
mod search;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "podsite",
    version,
    about = "Generate a cross-linked documentation site from Pod-style markup"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site
    Build {
        /// Root directory of the markup corpus
        source: PathBuf,

        /// Output directory (created if missing)
        output: PathBuf,

        /// Configuration file. Defaults to SOURCE/podsite.toml when present.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format: html (default) or markdown
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Worker threads (defaults to one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build {
            source,
            output,
            config,
            format,
            jobs,
        } => {
            let summary = build::run(&build::BuildOptions {
                source,
                output: output.clone(),
                config,
                format,
                jobs,
            })?;
            println!(
                "built {} pages ({} documentables) into {}; {} diagnostics",
                summary.pages,
                summary.documentables,
                output.display(),
                summary.report.total()
            );
        }
    }
    Ok(())
}
