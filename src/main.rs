pub mod analyzer;
pub mod resolver;
pub mod risk;
pub mod usage;
pub mod utils;
pub mod visitor;

use crate::analyzer::{FileAnalysis, RiskAnalyzer};
use crate::risk::RiskLevel;
use crate::usage::{build_usage_index, IndexOutcome, IndexStatus, UsageIndex};
use anyhow::Result;
use clap::Parser;
use colored::*;
use serde::Serialize;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Command line interface configuration using `clap`.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Python file or directory to analyze.
    /// A directory is scanned recursively for .py files; a cross-file usage
    /// index is built over the batch before each file is classified.
    path: PathBuf,

    /// Skip building the cross-file usage index in directory mode.
    /// Every function is then scored as if its name were defined once.
    #[arg(long)]
    no_index: bool,

    /// Output raw JSON.
    /// Emits the serialized reports for machine parsing instead of the
    /// human-readable listing.
    #[arg(long)]
    json: bool,
}

/// Everything the directory mode produces: per-file reports plus the index
/// build outcomes, so skipped files stay observable.
#[derive(Serialize)]
struct BatchReport {
    files: Vec<FileAnalysis>,
    index_outcomes: Vec<IndexOutcome>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let analyzer = RiskAnalyzer::default();

    if cli.path.is_dir() {
        // Collect the batch up front; the same file list feeds both the
        // usage index and the per-file analysis passes.
        let files: Vec<PathBuf> = WalkDir::new(&cli.path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "py"))
            .map(|e| e.path().to_path_buf())
            .collect();

        let (index, outcomes): (Option<UsageIndex>, Vec<IndexOutcome>) = if cli.no_index {
            (None, Vec::new())
        } else {
            let build = build_usage_index(&files);
            (Some(build.index), build.outcomes)
        };

        let mut reports = Vec::new();
        for file in &files {
            match analyzer.analyze_file_with_index(file, index.as_ref()) {
                Ok(report) => reports.push(report),
                Err(err) => eprintln!("{} {err}", "warning:".yellow()),
            }
        }

        if cli.json {
            let batch = BatchReport {
                files: reports,
                index_outcomes: outcomes,
            };
            println!("{}", serde_json::to_string_pretty(&batch)?);
        } else {
            for report in &reports {
                print_report(report);
            }
            print_outcomes(&outcomes);
        }
    } else {
        let report = analyzer.analyze_file(&cli.path)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
    }

    Ok(())
}

/// Prints the human-readable listing for one file.
fn print_report(report: &FileAnalysis) {
    println!("\n{}", report.file_path.display().to_string().bold());

    if let Some(error) = &report.error {
        println!("  {} {error}", "parse failed:".red());
        return;
    }

    if !report.imports.is_empty() {
        println!("  Imports: {}", report.imports.len());
    }
    if !report.file_dependencies.is_empty() {
        println!("  Local dependencies:");
        for dep in &report.file_dependencies {
            println!("    └─ {}", dep.display());
        }
    }

    for func in &report.functions {
        let Some(risk) = &func.risk else { continue };
        let level = match risk.level {
            RiskLevel::High => "HIGH".red().bold(),
            RiskLevel::Medium => "MEDIUM".yellow(),
            RiskLevel::Low => "LOW".green(),
        };
        let marker = if func.is_async { "async def" } else { "def" };
        println!(
            "  [{level}] {marker} {} (line {}) - {}",
            func.name, func.line, risk.reason
        );
    }
}

/// Prints skipped index inputs so batch failures stay visible.
fn print_outcomes(outcomes: &[IndexOutcome]) {
    let skipped: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| match &outcome.status {
            IndexStatus::Skipped { reason } => Some((outcome.path.as_path(), reason)),
            IndexStatus::Succeeded => None,
        })
        .collect();

    if !skipped.is_empty() {
        println!("\n{}", "Skipped during index build:".yellow());
        for (path, reason) in skipped {
            println!("  {} ({reason})", path.display());
        }
    }
}
