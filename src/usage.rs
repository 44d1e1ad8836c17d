use crate::utils::LineIndex;
use crate::visitor::ExtractVisitor;
use rayon::prelude::*;
use rustpython_parser::{parse, Mode};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Batch-built map from function name to the number of files that *define*
/// a function with that name.
///
/// A file defining the same name twice still counts once. The index is a
/// signal, not ground truth: it is built purely from static definition
/// counts, never from call sites, and is never persisted across batches.
/// Once built it is immutable and safe to share by reference.
#[derive(Debug, Default, Clone, Serialize)]
pub struct UsageIndex {
    counts: HashMap<String, usize>,
}

impl UsageIndex {
    /// Number of files in the batch defining `name`. Names the batch never
    /// saw count as singleton usage.
    pub fn definition_count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(1)
    }

    /// Folds one file's distinct defined names into the counts. Summation
    /// commutes, so aggregation order does not matter.
    pub fn record_file_definitions<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        let distinct: BTreeSet<String> = names.into_iter().collect();
        for name in distinct {
            *self.counts.entry(name).or_insert(0) += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Per-input outcome of an index build. Failures are recorded, not
/// swallowed: a bad file skips with a reason instead of aborting the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStatus {
    Succeeded,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub path: PathBuf,
    pub status: IndexStatus,
}

/// The index plus the per-file build report, in input order.
#[derive(Debug, Serialize)]
pub struct UsageIndexBuild {
    pub index: UsageIndex,
    pub outcomes: Vec<IndexOutcome>,
}

/// Builds a fresh `UsageIndex` over a batch of candidate paths.
///
/// Per-file parses are independent and run in parallel; any per-file failure
/// (missing file, wrong extension, non-UTF-8 bytes, syntax error) becomes a
/// `Skipped` outcome and the batch continues.
pub fn build_usage_index(paths: &[PathBuf]) -> UsageIndexBuild {
    let per_file: Vec<(IndexOutcome, Option<BTreeSet<String>>)> = paths
        .par_iter()
        .map(|path| match defined_names(path) {
            Ok(names) => (
                IndexOutcome {
                    path: path.clone(),
                    status: IndexStatus::Succeeded,
                },
                Some(names),
            ),
            Err(reason) => (
                IndexOutcome {
                    path: path.clone(),
                    status: IndexStatus::Skipped { reason },
                },
                None,
            ),
        })
        .collect();

    let mut index = UsageIndex::default();
    let mut outcomes = Vec::with_capacity(per_file.len());
    for (outcome, names) in per_file {
        if let Some(names) = names {
            index.record_file_definitions(names);
        }
        outcomes.push(outcome);
    }

    UsageIndexBuild { index, outcomes }
}

/// Distinct function names defined in one file, or the reason it was skipped.
fn defined_names(path: &Path) -> Result<BTreeSet<String>, String> {
    if !path.is_file() {
        return Err("file not found".to_string());
    }
    if path.extension().map_or(true, |ext| ext != "py") {
        return Err("not a Python source file".to_string());
    }

    let bytes = fs::read(path).map_err(|err| format!("read failed: {err}"))?;
    let source = String::from_utf8(bytes).map_err(|_| "not valid UTF-8".to_string())?;

    let tree = parse(&source, Mode::Module, &path.to_string_lossy())
        .map_err(|err| format!("syntax error: {err}"))?;

    let line_index = LineIndex::new(&source);
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut visitor = ExtractVisitor::new(base_dir, &line_index);
    if let rustpython_ast::Mod::Module(module) = &tree {
        for stmt in &module.body {
            visitor.visit_stmt(stmt);
        }
    }

    Ok(visitor
        .functions
        .into_iter()
        .map(|func| func.name)
        .collect())
}
