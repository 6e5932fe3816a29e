use crate::cli::args::{GenerateArgs, ReportFormat};
use crate::cli::setup::{apply_overrides, configure_thread_pool, resolve_config, resolve_source_root};
use crate::codegen::SelectorConstant;
use crate::diagnostics::{Diagnostic, DiagnosticCounts};
use crate::io::FileWalker;
use crate::pipeline::{generate, GenerateRequest, GenerationReport, OutputFile};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// What `--format json` prints: the report without file contents.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    units: Vec<JsonUnit<'a>>,
    files: &'a [OutputFile],
    written: usize,
    unchanged: usize,
    counts: DiagnosticCounts,
    diagnostics: &'a [Diagnostic],
}

#[derive(Debug, Serialize)]
struct JsonUnit<'a> {
    type_path: &'a str,
    mock_name: &'a str,
    file: String,
    selectors: &'a [SelectorConstant],
}

impl<'a> JsonReport<'a> {
    fn new(report: &'a GenerationReport) -> Self {
        Self {
            units: report
                .units
                .iter()
                .map(|unit| JsonUnit {
                    type_path: &unit.type_path,
                    mock_name: &unit.mock_name,
                    file: unit.file_name(),
                    selectors: &unit.selectors,
                })
                .collect(),
            files: &report.files,
            written: report.written,
            unchanged: report.unchanged,
            counts: report.counts(),
            diagnostics: &report.diagnostics,
        }
    }
}

pub fn handle_generate_command(args: GenerateArgs) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("cannot determine the working directory")?;
    let mut loaded = resolve_config(&args, &cwd)?;
    apply_overrides(&mut loaded, &args);
    configure_thread_pool(loaded.config.jobs.unwrap_or(0));

    let source_root = resolve_source_root(&args, &loaded);
    let output_dir: Option<PathBuf> = if args.dry_run {
        None
    } else {
        args.output.clone()
    };

    let mut walker = FileWalker::new(args.inputs.clone()).with_ignore_patterns(&args.ignore)?;
    if let Some(dir) = &output_dir {
        walker = walker.skip_dir(dir);
    }
    let sources = walker.walk()?;
    tracing::info!(
        files = sources.len(),
        root = %source_root.display(),
        config = ?loaded.path,
        "starting generation"
    );

    let report = generate(&GenerateRequest {
        sources,
        source_root,
        output_dir,
        config: loaded.config,
    })?;

    match args.format {
        ReportFormat::Text => print_text_report(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&JsonReport::new(&report))?),
    }

    let counts = report.counts();
    let failed = counts.errors > 0 || (args.deny_warnings && counts.warnings > 0);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_text_report(report: &GenerationReport) {
    for diagnostic in &report.diagnostics {
        eprintln!("{}", diagnostic);
    }
    let counts = report.counts();
    eprintln!(
        "generated {} mock{} ({} written, {} unchanged); {} error{}, {} warning{}",
        report.units.len(),
        plural(report.units.len()),
        report.written,
        report.unchanged,
        counts.errors,
        plural(counts.errors),
        counts.warnings,
        plural(counts.warnings),
    );
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
