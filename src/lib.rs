// Lib file to expose modules for testing and external usage.
// This file serves as the root for the library crate.

/// Module containing the analysis orchestrator.
/// This includes the `RiskAnalyzer` struct, the `FileAnalysis` report, and
/// the error taxonomy for single-file analysis.
pub mod analyzer;

/// Module containing the AST extraction visitor.
/// This is responsible for the single forward pass over the Python AST that
/// collects imports, function records, and call sites.
pub mod visitor;

/// Module containing the risk classification cascade.
/// This includes the `RiskClassifier` and its registries of API module
/// prefixes, API verbs, and helper naming patterns.
pub mod risk;

/// Module containing the cross-file usage index builder.
/// This counts function definitions across a batch of files in parallel.
pub mod usage;

/// Module containing the local-dependency resolver.
/// This heuristically maps import names onto same-directory or
/// parent-directory source files.
pub mod resolver;

/// Module containing utility functions.
/// This includes line number mapping and source-equivalent expression
/// rendering for annotations and decorators.
pub mod utils;
