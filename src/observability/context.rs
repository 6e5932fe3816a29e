//! Per-thread record of what generation is doing, read back by the panic
//! hook when a worker crashes.
//!
//! Phase, file and type live in a thread local so each rayon worker
//! reports its own position. The file counters are shared by every worker.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

struct FileProgress {
    done: AtomicUsize,
    of: AtomicUsize,
}

static PROGRESS: FileProgress = FileProgress {
    done: AtomicUsize::new(0),
    of: AtomicUsize::new(0),
};

thread_local! {
    static ACTIVE: RefCell<GenerationContext> = const { RefCell::new(GenerationContext::new()) };
}

/// What this thread was doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    pub phase: Option<GenerationPhase>,
    pub current_file: Option<PathBuf>,
    /// Full path of the type being flattened or emitted.
    pub current_type: Option<String>,
}

impl GenerationContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: None,
            current_file: None,
            current_type: None,
        }
    }
}

/// Stages of a generation run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GenerationPhase {
    /// Expanding inputs into source files
    Discovery,
    /// Parsing files into declarations
    Analysis,
    /// Building the symbol table
    Merge,
    /// Flattening inheritance and conformances
    Flattening,
    /// Rendering mock sources
    Emission,
    /// Writing generated files
    Writing,
}

impl std::fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Discovery => "discovery",
            Self::Analysis => "analysis",
            Self::Merge => "merge",
            Self::Flattening => "flattening",
            Self::Emission => "emission",
            Self::Writing => "writing",
        })
    }
}

/// Scope handle returned by the `set_*` functions. Dropping it puts back
/// whatever the thread was doing before.
#[must_use = "the context is restored as soon as the guard is dropped"]
pub struct ContextGuard {
    saved: GenerationContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let saved = std::mem::take(&mut self.saved);
        ACTIVE.with(|slot| slot.replace(saved));
    }
}

fn scoped(change: impl FnOnce(&mut GenerationContext)) -> ContextGuard {
    ACTIVE.with(|slot| {
        let mut next = slot.borrow().clone();
        change(&mut next);
        ContextGuard {
            saved: slot.replace(next),
        }
    })
}

pub fn set_phase(phase: GenerationPhase) -> ContextGuard {
    scoped(|ctx| ctx.phase = Some(phase))
}

/// Marks `path` as the file under analysis for the guard's lifetime.
pub fn set_current_file(path: impl Into<PathBuf>) -> ContextGuard {
    let path = path.into();
    scoped(|ctx| ctx.current_file = Some(path))
}

pub fn set_current_type(full_path: impl Into<String>) -> ContextGuard {
    let full_path = full_path.into();
    scoped(|ctx| ctx.current_type = Some(full_path))
}

pub fn set_progress(done: usize, of: usize) {
    PROGRESS.done.store(done, Ordering::Relaxed);
    PROGRESS.of.store(of, Ordering::Relaxed);
}

/// Counts one more analyzed file. Safe to call from any worker.
pub fn increment_processed() {
    PROGRESS.done.fetch_add(1, Ordering::Relaxed);
}

#[must_use]
pub fn get_current_context() -> GenerationContext {
    ACTIVE.with(|slot| slot.borrow().clone())
}

/// Files analyzed so far and files discovered, in that order.
#[must_use]
pub fn get_progress() -> (usize, usize) {
    let done = PROGRESS.done.load(Ordering::Relaxed);
    (done, PROGRESS.of.load(Ordering::Relaxed))
}

#[cfg(test)]
pub(crate) fn reset_context() {
    ACTIVE.with(|slot| slot.take());
}
