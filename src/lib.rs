//! mocksmith: mock generation for Rust traits and structs, plus the runtime
//! engine generated mocks link against.
//!
//! Generation runs analyzer → flatten → codegen, orchestrated by
//! [`pipeline::generate`]. Generated code only depends on [`runtime`].

// Generator
pub mod analyzer;
pub mod codegen;
pub mod flatten;
pub mod model;
pub mod pipeline;

// Runtime engine used by generated mocks
pub mod runtime;

// Ambient
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod io;
pub mod observability;

pub use crate::codegen::{emit, EmitOptions, EmittedUnit};
pub use crate::config::Config;
pub use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use crate::errors::{Error, Result};
pub use crate::flatten::{flatten, SymbolTable};
pub use crate::model::MockableType;
pub use crate::pipeline::{generate, GenerateRequest, GenerationReport};
