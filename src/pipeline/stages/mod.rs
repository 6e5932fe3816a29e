//! Pure stages of a generation run.
//!
//! Each function here transforms data without touching the file system, so
//! the orchestration in [`generate`](super::generate) stays thin.

pub mod filtering;
pub mod layout;

pub use filtering::{is_candidate, select_types, TypeFilter};
pub use layout::assign_module_names;
