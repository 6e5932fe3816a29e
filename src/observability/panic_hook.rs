//! Panic hook that says what mocksmith was doing when it crashed.
//!
//! Runtime panics raised by generated mocks (`UnmatchedInvocation`) happen
//! inside the user's tests, which install their own hook; this one is only
//! installed by the `mocksmith` binary.

use super::context::{get_current_context, get_progress, GenerationContext};
use std::panic::PanicHookInfo;
use tracing::Span;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the crash-report hook. Call early in `main`.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!();
        eprint!("{}", crash_report(info, &get_current_context(), get_progress()));
    }));
}

fn crash_report(
    info: &PanicHookInfo<'_>,
    context: &GenerationContext,
    (processed, total): (usize, usize),
) -> String {
    let mut report = String::new();
    report.push_str(&format!(
        "mocksmith {} crashed on {}\n",
        VERSION,
        std::env::consts::OS
    ));
    report.push_str(&format!("  panic: {}\n", extract_panic_message(info)));
    if let Some(location) = info.location() {
        report.push_str(&format!(
            "  at: {}:{}:{}\n",
            location.file(),
            location.line(),
            location.column()
        ));
    }
    report.push_str(&describe_context(context, processed, total));

    if let Some(metadata) = Span::current().metadata() {
        report.push_str(&format!("  span: {}\n", metadata.name()));
    }

    if std::env::var_os("RUST_BACKTRACE").is_some() {
        report.push_str(&format!("\n{}\n", std::backtrace::Backtrace::capture()));
    } else {
        report.push_str("  set RUST_BACKTRACE=1 to include a backtrace\n");
    }
    report
}

fn describe_context(context: &GenerationContext, processed: usize, total: usize) -> String {
    let mut lines = String::new();
    match &context.phase {
        Some(phase) => lines.push_str(&format!("  phase: {}\n", phase)),
        None => lines.push_str("  phase: (not set, crash occurred before generation started)\n"),
    }
    if let Some(file) = &context.current_file {
        lines.push_str(&format!("  file: {}\n", file.display()));
    }
    if let Some(ty) = &context.current_type {
        lines.push_str(&format!("  type: {}\n", ty));
    }
    if total > 0 {
        lines.push_str(&format!("  progress: {} / {} files\n", processed, total));
    }
    lines
}

fn extract_panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_owned())
}
