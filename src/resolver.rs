use std::path::{Path, PathBuf};

/// Heuristically resolves an imported module name to local source files.
///
/// Given `import target` in a file living at `<dir>/analyzed.py`, this probes
/// the filesystem for a `.py` file the import plausibly refers to:
///
/// - A dotted name (`pkg.mod`) or an underscore-prefixed name is translated
///   to a relative path and probed under `dir` only.
/// - A plain name is probed both in `dir` and in its parent directory, which
///   covers the common "file imports a sibling-package module one level up"
///   layout.
///
/// Only paths that exist at resolution time are returned, canonicalized to
/// absolute form. This is a best-effort heuristic, not module-resolution
/// semantics: it knows nothing about sys.path, packages, or namespace
/// packages, and is not meant to.
pub fn resolve_local(module: &str, base_dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if module.is_empty() {
        return found;
    }

    if module.contains('.') || module.starts_with('_') {
        let relative: PathBuf = module.split('.').collect();
        probe(base_dir.join(relative.with_extension("py")), &mut found);
    } else {
        probe(base_dir.join(format!("{module}.py")), &mut found);
        if let Some(parent) = base_dir.parent() {
            probe(parent.join(format!("{module}.py")), &mut found);
        }
    }

    found
}

fn probe(candidate: PathBuf, found: &mut Vec<PathBuf>) {
    if candidate.is_file() {
        if let Ok(absolute) = candidate.canonicalize() {
            found.push(absolute);
        }
    }
}
