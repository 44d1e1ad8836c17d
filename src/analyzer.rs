use crate::risk::RiskClassifier;
use crate::usage::UsageIndex;
use crate::utils::LineIndex;
use crate::visitor::{ExtractVisitor, FunctionRecord, ImportRecord};
use rustpython_parser::{parse, Mode};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures surfaced to the caller of a single-file analysis.
///
/// A syntax failure is deliberately absent: the parser rejecting a file is
/// recovered locally into a degenerate [`FileAnalysis`] and never propagates
/// past the analysis boundary.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("file not found: {0}")]
    InputNotFound(PathBuf),
    #[error("not a Python source file (.py): {0}")]
    InvalidInputKind(PathBuf),
    #[error("file is not valid UTF-8: {0}")]
    EncodingFailure(PathBuf),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The complete structured report for one analyzed file.
///
/// Flat, acyclic, fully serializable, and free of raw source text: this is
/// the hard contract toward downstream consumers (display layers, external
/// summarizers), which only ever see these structured fields.
///
/// If `error` is present the file failed to parse and every collection is
/// empty.
#[derive(Debug, Serialize)]
pub struct FileAnalysis {
    pub file_path: PathBuf,
    pub imports: Vec<ImportRecord>,
    pub functions: Vec<FunctionRecord>,
    /// Resolved local-dependency paths, absolute and sorted.
    pub file_dependencies: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileAnalysis {
    fn parse_failure(path: &Path, diagnostic: String) -> Self {
        Self {
            file_path: path.to_path_buf(),
            imports: Vec::new(),
            functions: Vec::new(),
            file_dependencies: Vec::new(),
            error: Some(diagnostic),
        }
    }
}

/// The analysis orchestrator: parse -> extract -> classify -> report.
///
/// Holds only the classifier configuration; every analysis call builds fresh
/// state, so one instance can serve any number of sequential or concurrent
/// calls without leaking results between them.
#[derive(Default)]
pub struct RiskAnalyzer {
    classifier: RiskClassifier,
}

impl RiskAnalyzer {
    pub fn new(classifier: RiskClassifier) -> Self {
        Self { classifier }
    }

    /// Analyzes a single Python file with singleton usage assumed.
    pub fn analyze_file(&self, path: &Path) -> Result<FileAnalysis, AnalyzeError> {
        self.analyze_file_with_index(path, None)
    }

    /// Analyzes a single Python file, consulting a batch usage index for
    /// duplicate-definition scoring when one is supplied.
    pub fn analyze_file_with_index(
        &self,
        path: &Path,
        usage: Option<&UsageIndex>,
    ) -> Result<FileAnalysis, AnalyzeError> {
        if !path.exists() {
            return Err(AnalyzeError::InputNotFound(path.to_path_buf()));
        }
        if path.extension().map_or(true, |ext| ext != "py") {
            return Err(AnalyzeError::InvalidInputKind(path.to_path_buf()));
        }

        let bytes = fs::read(path).map_err(|source| AnalyzeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = String::from_utf8(bytes)
            .map_err(|_| AnalyzeError::EncodingFailure(path.to_path_buf()))?;

        let tree = match parse(&source, Mode::Module, &path.to_string_lossy()) {
            Ok(tree) => tree,
            Err(err) => {
                return Ok(FileAnalysis::parse_failure(
                    path,
                    format!("syntax error: {err}"),
                ))
            }
        };

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

        let imports = visitor.imports;
        let mut functions = visitor.functions;
        for func in &mut functions {
            let verdict = self.classifier.classify(func, &imports, usage);
            func.risk = Some(verdict);
        }

        Ok(FileAnalysis {
            file_path: path.to_path_buf(),
            imports,
            functions,
            file_dependencies: visitor.dependencies.into_iter().collect(),
            error: None,
        })
    }

    /// Convenience wrapper returning the report as pretty-printed JSON.
    pub fn analyze_file_to_json(&self, path: &Path) -> anyhow::Result<String> {
        let analysis = self.analyze_file(path)?;
        Ok(serde_json::to_string_pretty(&analysis)?)
    }
}
