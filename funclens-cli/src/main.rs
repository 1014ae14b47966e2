//! Funclens CLI - inspect and apply build-snapshot decisions for compiler calls

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use funclens_core::{apply, find_store, resolve_source, scan_source, watch_store};
use funclens_core::{Decision, DecisionKind, Disk, WatchOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "funclens")]
#[command(about = "Correlates declarative compiler calls with persisted build snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract compiler calls from a source file and print their patterns
    Scan {
        /// Path to a TypeScript/JavaScript source file
        file: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Run one resolution pass for a source file against the snapshot store
    Resolve {
        /// Path to a TypeScript/JavaScript source file
        file: PathBuf,

        /// Path to the snapshot store (discovered under --root when omitted)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Workspace root to discover the store under
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Insert the generated code of a ready decision into the source file
    Apply {
        /// Path to a TypeScript/JavaScript source file
        file: PathBuf,

        /// Path to the snapshot store (discovered under --root when omitted)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Workspace root to discover the store under
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Which ready decision to apply, in source order
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
    /// Watch the snapshot store and re-resolve files on every change
    Watch {
        /// Workspace root to discover the store under
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Source files to re-resolve on each store update
        files: Vec<PathBuf>,

        /// Seconds between discovery attempts while no store exists
        #[arg(long, default_value_t = 5)]
        backoff: u64,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { file, format } => {
            let source = read_source(&file)?;
            let calls = scan_source(&source, &file.to_string_lossy())?;

            match format {
                OutputFormat::Text => {
                    for call in &calls {
                        println!("chunk:       {}", call.chunk.as_str());
                        println!("description: {}", call.description.as_str());
                    }
                    println!("{} call(s)", calls.len());
                }
                OutputFormat::Json => {
                    let patterns: Vec<serde_json::Value> = calls
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "chunk": call.chunk.as_str(),
                                "description": call.description.as_str(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&patterns)?);
                }
            }
        }
        Commands::Resolve {
            file,
            store,
            root,
            format,
        } => {
            let disk = load_disk(store, &root)?;
            let source = read_source(&file)?;
            let decisions = resolve_source(&source, &file.to_string_lossy(), &disk)?;
            print_decisions(&decisions, format)?;
        }
        Commands::Apply {
            file,
            store,
            root,
            index,
        } => {
            let disk = load_disk(store, &root)?;
            let source = read_source(&file)?;
            let decisions = resolve_source(&source, &file.to_string_lossy(), &disk)?;

            let ready: Vec<(usize, &str)> = decisions
                .iter()
                .filter_map(|decision| match &decision.kind {
                    DecisionKind::Ready { insert_at, code } => {
                        Some((*insert_at, code.as_str()))
                    }
                    _ => None,
                })
                .collect();

            let (insert_at, code) = match ready.get(index) {
                Some(&entry) => entry,
                None => bail!(
                    "no ready decision at index {} ({} available)",
                    index,
                    ready.len()
                ),
            };

            let patched = apply::insert_at(&source, insert_at, code)?;
            std::fs::write(&file, patched)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            println!("inserted generated code into {}", file.display());
        }
        Commands::Watch {
            root,
            files,
            backoff,
            format,
        } => {
            if files.is_empty() {
                bail!("watch requires at least one source file");
            }
            let options = WatchOptions {
                backoff: Duration::from_secs(backoff),
            };
            watch_store(&root, &options, |disk| {
                for file in &files {
                    if let Err(err) = resolve_and_print(file, &disk, format) {
                        log::warn!("{}: {:#}", file.display(), err);
                    }
                }
            })?;
        }
    }

    Ok(())
}

/// Load the store from an explicit path, or discover it under the root
fn load_disk(store: Option<PathBuf>, root: &Path) -> Result<Disk> {
    let path = match store {
        Some(path) => path,
        None => find_store(root)?,
    };
    Disk::load(&path)
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read source file: {}", file.display()))
}

/// One pass for one file, reading the current text fresh from disk
fn resolve_and_print(file: &Path, disk: &Disk, format: OutputFormat) -> Result<()> {
    let source = read_source(file)?;
    let decisions = resolve_source(&source, &file.to_string_lossy(), disk)?;
    println!("{}:", file.display());
    print_decisions(&decisions, format)
}

fn print_decisions(decisions: &[Decision], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for decision in decisions {
                let range = format!("{}..{}", decision.anchor_start, decision.anchor_end);
                match &decision.kind {
                    DecisionKind::Pending => println!("{:<12} {}", "pending", range),
                    DecisionKind::InProgress => println!("{:<12} {}", "in-progress", range),
                    DecisionKind::Failed { error } => {
                        println!("{:<12} {} {}", "failed", range, error)
                    }
                    DecisionKind::Ready { insert_at, code } => {
                        println!("{:<12} {} insert@{} {}", "ready", range, insert_at, code)
                    }
                }
            }
            println!("{} decision(s)", decisions.len());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(decisions)?);
        }
    }
    Ok(())
}
