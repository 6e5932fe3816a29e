//! Logging setup, crash reports and per-thread generation context.
//!
//! Track context during generation:
//!
//! ```ignore
//! use mocksmith::observability::{set_phase, set_current_file, GenerationPhase};
//!
//! let _phase = set_phase(GenerationPhase::Analysis);
//! for file in files {
//!     let _file = set_current_file(&file);
//!     // a panic here reports the phase and the file
//! }
//! ```

pub mod context;
pub mod logging;
pub mod panic_hook;

pub use context::{
    get_current_context, get_progress, increment_processed, set_current_file, set_current_type,
    set_phase, set_progress, ContextGuard, GenerationContext, GenerationPhase,
};
pub use logging::{init_logging, level_for_verbosity, LOG_ENV};
pub use panic_hook::install_panic_hook;
