//! Source analyzer: parses Rust files into type declarations.
//!
//! Each file is analyzed on its own, so analysis runs file-parallel with
//! rayon. A file that fails to parse yields a single `ParseFailure`
//! diagnostic and no declarations; the other files are unaffected.

mod impls;
mod items;
mod signature;

pub use impls::{ImplFacts, ImplKind};
pub(crate) use impls::attach;
pub(crate) use signature::return_shape;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::model::{SourceLocation, TypeDeclaration, TypeRef};
use crate::observability::context::{increment_processed, set_current_file};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// `type Name = Target;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeAlias {
    pub name: String,
    pub module_path: Vec<String>,
    pub target: TypeRef,
}

/// Everything recovered from one file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub module_path: Vec<String>,
    pub declarations: Vec<TypeDeclaration>,
    /// Impl blocks whose self type is declared elsewhere.
    pub impls: Vec<ImplFacts>,
    pub aliases: Vec<TypeAlias>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileAnalysis {
    pub fn failed(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.kind == DiagnosticKind::ParseFailure)
    }
}

/// A file to analyze and the module it defines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    pub path: PathBuf,
    pub module_path: Vec<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, module_path: Vec<String>) -> Self {
        Self {
            path: path.into(),
            module_path,
        }
    }

    /// Derive the module path from the file's position under `root`.
    pub fn under_root(root: &Path, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let module_path = module_path_for(root, &path);
        Self { path, module_path }
    }
}

/// Module path of a file relative to the crate source root.
///
/// `src/lib.rs` and `src/main.rs` are the crate root, `src/a/mod.rs` is
/// `a`, `src/a/b.rs` is `a::b`. Files outside `root` are treated as
/// top-level modules named after their stem. A relative path and an
/// absolute root are compared after canonicalization.
pub fn module_path_for(root: &Path, path: &Path) -> Vec<String> {
    let relative = match path.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => canonical_relative(root, path).unwrap_or_else(|| {
            path.file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| path.to_path_buf())
        }),
    };
    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let Some(last) = segments.pop() else {
        return segments;
    };
    let stem = Path::new(&last)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(last);
    let is_root_file = segments.is_empty() && (stem == "lib" || stem == "main");
    if stem != "mod" && !is_root_file {
        segments.push(stem);
    }
    segments
}

fn canonical_relative(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

/// Analyze one file's contents.
pub fn analyze_source(path: &Path, content: &str, module_path: &[String]) -> FileAnalysis {
    let mut analysis = FileAnalysis {
        path: path.to_path_buf(),
        module_path: module_path.to_vec(),
        ..FileAnalysis::default()
    };

    let file = match syn::parse_file(content) {
        Ok(file) => file,
        Err(error) => {
            let start = error.span().start();
            tracing::debug!(file = %path.display(), "parse failed: {}", error);
            analysis.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::ParseFailure,
                    format!("failed to parse: {}", error),
                )
                .at(&SourceLocation::new(path, start.line.max(1), start.column + 1)),
            );
            return analysis;
        }
    };

    let mut walker = items::ModuleWalker {
        file: path,
        analysis: &mut analysis,
    };
    walker.walk(&file.items, module_path);

    tracing::debug!(
        file = %path.display(),
        declarations = analysis.declarations.len(),
        pending_impls = analysis.impls.len(),
        "file analyzed"
    );
    analysis
}

/// Read and analyze one file. I/O errors become a `ParseFailure`.
pub fn analyze_file(source: &SourceFile) -> FileAnalysis {
    let _file = set_current_file(&source.path);
    let analysis = match std::fs::read_to_string(&source.path) {
        Ok(content) => analyze_source(&source.path, &content, &source.module_path),
        Err(error) => FileAnalysis {
            path: source.path.clone(),
            module_path: source.module_path.clone(),
            diagnostics: vec![Diagnostic::error(
                DiagnosticKind::ParseFailure,
                format!("failed to read file: {}", error),
            )
            .in_file(&source.path)],
            ..FileAnalysis::default()
        },
    };
    increment_processed();
    analysis
}

/// Analyze files in parallel. Results keep the input order.
pub fn analyze_files(sources: &[SourceFile]) -> Vec<FileAnalysis> {
    sources.par_iter().map(analyze_file).collect()
}
