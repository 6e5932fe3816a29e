//! Structured diagnostics produced during generation.
//!
//! The library never prints; every problem found while analyzing, flattening
//! or emitting becomes a [`Diagnostic`] that the caller can render or
//! serialize.

use crate::model::SourceLocation;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    ParseFailure,
    UnsupportedDeclaration,
    SignatureCollision,
    EmissionError,
    InheritanceCycle,
    DuplicateDefinition,
    UnresolvedReference,
    OutputFailure,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ParseFailure => "parse-failure",
            DiagnosticKind::UnsupportedDeclaration => "unsupported-declaration",
            DiagnosticKind::SignatureCollision => "signature-collision",
            DiagnosticKind::EmissionError => "emission-error",
            DiagnosticKind::InheritanceCycle => "inheritance-cycle",
            DiagnosticKind::DuplicateDefinition => "duplicate-definition",
            DiagnosticKind::UnresolvedReference => "unresolved-reference",
            DiagnosticKind::OutputFailure => "output-failure",
        }
    }
}

/// One problem found during generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    /// Full path of the type the diagnostic concerns.
    pub type_name: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            file: None,
            line: None,
            column: None,
            type_name: None,
            message: message.into(),
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    pub fn note(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Note, kind, message)
    }

    /// Attach a source location. Locations without a line only set the file.
    pub fn at(mut self, location: &SourceLocation) -> Self {
        if !location.file.as_os_str().is_empty() {
            self.file = Some(location.file.clone());
        }
        if location.line > 0 {
            self.line = Some(location.line);
            self.column = Some(location.column);
        }
        self
    }

    pub fn in_file(mut self, file: &Path) -> Self {
        self.file = Some(file.to_path_buf());
        self
    }

    pub fn for_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.severity, self.kind.as_str())?;
        if let Some(file) = &self.file {
            write!(f, " {}", file.display())?;
            if let (Some(line), Some(column)) = (self.line, self.column) {
                write!(f, ":{}:{}", line, column)?;
            }
        }
        if let Some(type_name) = &self.type_name {
            write!(f, " ({})", type_name)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Order used when reporting: by file, position, then kind.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        (&a.file, a.line, a.column, a.kind, &a.type_name, &a.message).cmp(&(
            &b.file,
            b.line,
            b.column,
            b.kind,
            &b.type_name,
            &b.message,
        ))
    });
}

/// Counts by severity for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticCounts {
    pub errors: usize,
    pub warnings: usize,
    pub notes: usize,
}

impl DiagnosticCounts {
    pub fn of(diagnostics: &[Diagnostic]) -> Self {
        diagnostics
            .iter()
            .fold(Self::default(), |mut counts, diagnostic| {
                match diagnostic.severity {
                    Severity::Error => counts.errors += 1,
                    Severity::Warning => counts.warnings += 1,
                    Severity::Note => counts.notes += 1,
                }
                counts
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location_and_type() {
        let diagnostic = Diagnostic::error(DiagnosticKind::SignatureCollision, "`get(u32)` declared twice")
            .at(&SourceLocation::new("src/store.rs", 4, 5))
            .for_type("crate::store::Store");
        assert_eq!(
            diagnostic.to_string(),
            "error[signature-collision] src/store.rs:4:5 (crate::store::Store): `get(u32)` declared twice"
        );
    }

    #[test]
    fn test_serializes_kind_in_kebab_case() {
        let diagnostic = Diagnostic::warning(DiagnosticKind::InheritanceCycle, "cycle");
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["kind"], "inheritance-cycle");
        assert_eq!(json["severity"], "warning");
        assert!(json["file"].is_null());
    }

    #[test]
    fn test_sort_is_by_file_then_line() {
        let mut diagnostics = vec![
            Diagnostic::error(DiagnosticKind::ParseFailure, "b").at(&SourceLocation::new("b.rs", 1, 1)),
            Diagnostic::error(DiagnosticKind::ParseFailure, "a2").at(&SourceLocation::new("a.rs", 9, 1)),
            Diagnostic::error(DiagnosticKind::ParseFailure, "a1").at(&SourceLocation::new("a.rs", 2, 1)),
        ];
        sort_diagnostics(&mut diagnostics);
        let order: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b"]);
        assert_eq!(DiagnosticCounts::of(&diagnostics).errors, 3);
    }
}
