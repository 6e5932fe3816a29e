//! Generation pipeline: analyze, merge, flatten, emit, write.
//!
//! Files are analyzed in parallel, merged into one symbol table on the
//! calling thread, then flattened and emitted per type in parallel. Writing
//! is sequential in file-name order. Problems with individual files or
//! types end up in [`GenerationReport::diagnostics`]; only failures that
//! stop the whole run are returned as errors.

pub mod stages;

use crate::analyzer::{analyze_files, SourceFile};
use crate::codegen::{emit, render_mod_file, EmittedUnit};
use crate::config::Config;
use crate::diagnostics::{sort_diagnostics, Diagnostic, DiagnosticCounts, DiagnosticKind};
use crate::errors::{Error, Result};
use crate::flatten::{flatten, SymbolTable};
use crate::io::{content_hash, ensure_dir, write_if_changed, WriteStatus};
use crate::observability::{set_current_type, set_phase, set_progress, GenerationPhase};
use rayon::prelude::*;
use serde::Serialize;
use stages::{assign_module_names, select_types, TypeFilter};
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn};

pub const MOD_FILE_NAME: &str = "mod.rs";

/// Inputs of one generation run.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Resolved `.rs` files.
    pub sources: Vec<PathBuf>,
    /// Directory module paths are derived from (`src`).
    pub source_root: PathBuf,
    /// Where generated files go; `None` renders without writing.
    pub output_dir: Option<PathBuf>,
    pub config: Config,
}

/// A file the run wrote or left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub path: PathBuf,
    /// xxh64 of the content.
    pub hash: u64,
    pub status: WriteStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    /// Emitted mocks in file-name order.
    pub units: Vec<EmittedUnit>,
    /// Content of the generated `mod.rs`; `None` when nothing was emitted.
    pub mod_file: Option<String>,
    pub files: Vec<OutputFile>,
    pub written: usize,
    pub unchanged: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerationReport {
    pub fn counts(&self) -> DiagnosticCounts {
        DiagnosticCounts::of(&self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn unit(&self, type_path: &str) -> Option<&EmittedUnit> {
        self.units.iter().find(|unit| unit.type_path == type_path)
    }
}

/// Run generation for `request`.
pub fn generate(request: &GenerateRequest) -> Result<GenerationReport> {
    let span = info_span!(
        "generate",
        root = %request.source_root.display(),
        sources = request.sources.len(),
    );
    let _guard = span.enter();

    request.config.validate()?;
    let filter = TypeFilter::new(&request.config.include, &request.config.exclude)?;
    let options = request.config.emit_options();

    let sources = {
        let _phase = set_phase(GenerationPhase::Discovery);
        source_files(request)
    };

    let analyses = {
        let _phase = set_phase(GenerationPhase::Analysis);
        let _span = info_span!("analysis").entered();
        set_progress(0, sources.len());
        analyze_files(&sources)
    };
    let failed = analyses.iter().filter(|analysis| analysis.failed()).count();
    if failed > 0 {
        warn!(failed, "some files could not be parsed");
    }

    let (table, selected) = {
        let _phase = set_phase(GenerationPhase::Merge);
        let _span = info_span!("merge").entered();
        let table = SymbolTable::merge(analyses);
        let selected = select_types(table.declarations(), &filter);
        (table, selected)
    };
    info!(
        declarations = table.len(),
        selected = selected.len(),
        "symbol table ready"
    );

    let outcomes: Vec<(Option<EmittedUnit>, Vec<Diagnostic>)> = {
        let _span = info_span!("emission", types = selected.len()).entered();
        selected
            .par_iter()
            .map(|full_path| generate_one(&table, full_path, &options))
            .collect()
    };

    let mut diagnostics = table.diagnostics().to_vec();
    let mut units = Vec::new();
    for (unit, found) in outcomes {
        diagnostics.extend(found);
        units.extend(unit);
    }
    assign_module_names(&mut units);
    units.sort_by(|a, b| a.module_name.cmp(&b.module_name));

    let mut report = GenerationReport {
        mod_file: (!units.is_empty())
            .then(|| render_mod_file(&units, request.config.header.as_deref())),
        units,
        ..GenerationReport::default()
    };

    if let Some(output_dir) = &request.output_dir {
        let _phase = set_phase(GenerationPhase::Writing);
        let _span = info_span!("writing", dir = %output_dir.display()).entered();
        write_outputs(output_dir, &mut report, &mut diagnostics)?;
    }

    sort_diagnostics(&mut diagnostics);
    report.diagnostics = diagnostics;
    info!(
        units = report.units.len(),
        written = report.written,
        unchanged = report.unchanged,
        errors = report.counts().errors,
        "generation finished"
    );
    Ok(report)
}

/// Sources with their module paths, minus anything inside the output
/// directory.
fn source_files(request: &GenerateRequest) -> Vec<SourceFile> {
    request
        .sources
        .iter()
        .filter(|path| match &request.output_dir {
            Some(output_dir) if path.starts_with(output_dir) => {
                tracing::debug!(file = %path.display(), "skipping generated file");
                false
            }
            _ => true,
        })
        .map(|path| SourceFile::under_root(&request.source_root, path.clone()))
        .collect()
}

/// Flatten and emit one type; failures become diagnostics.
fn generate_one(
    table: &SymbolTable,
    full_path: &str,
    options: &crate::codegen::EmitOptions,
) -> (Option<EmittedUnit>, Vec<Diagnostic>) {
    let _type = set_current_type(full_path);
    let mockable = {
        let _phase = set_phase(GenerationPhase::Flattening);
        match flatten(table, full_path) {
            Ok(mockable) => mockable,
            Err(diagnostics) => return (None, diagnostics),
        }
    };

    let _phase = set_phase(GenerationPhase::Emission);
    let mut diagnostics = mockable.warnings.clone();
    match emit(&mockable, options) {
        Ok(unit) => {
            diagnostics.extend(unit.warnings.iter().cloned());
            (Some(unit), diagnostics)
        }
        Err(diagnostic) => {
            diagnostics.push(diagnostic);
            (None, diagnostics)
        }
    }
}

fn write_outputs(
    output_dir: &Path,
    report: &mut GenerationReport,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<()> {
    if output_dir.is_file() {
        return Err(Error::OutputDirectory {
            message: "a file with this name exists".to_string(),
            path: output_dir.to_path_buf(),
        });
    }
    ensure_dir(output_dir)?;

    let mut files: Vec<(PathBuf, &str)> = report
        .units
        .iter()
        .map(|unit| (output_dir.join(unit.file_name()), unit.content.as_str()))
        .collect();
    if let Some(mod_file) = &report.mod_file {
        files.push((output_dir.join(MOD_FILE_NAME), mod_file.as_str()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut outputs = Vec::with_capacity(files.len());
    for (path, content) in files {
        match write_if_changed(&path, content) {
            Ok(status) => outputs.push(OutputFile {
                hash: content_hash(content),
                path,
                status,
            }),
            Err(error) => diagnostics.push(
                Diagnostic::error(DiagnosticKind::OutputFailure, error.to_string()).in_file(&path),
            ),
        }
    }

    report.written = count(&outputs, WriteStatus::Written);
    report.unchanged = count(&outputs, WriteStatus::Unchanged);
    report.files = outputs;
    Ok(())
}

fn count(outputs: &[OutputFile], status: WriteStatus) -> usize {
    outputs.iter().filter(|output| output.status == status).count()
}
