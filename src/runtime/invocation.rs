use super::arg::Arg;
use super::selector::Selector;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of one mock instance. Clones of a mock share their identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock#{}", self.0)
    }
}

/// Immutable record of one call made against a mock instance.
#[derive(Debug, Clone)]
pub struct Invocation {
    selector: Selector,
    arguments: Arc<[Arg]>,
    sequence: u64,
    instance: InstanceId,
}

impl Invocation {
    pub(crate) fn new(
        selector: Selector,
        arguments: Arc<[Arg]>,
        sequence: u64,
        instance: InstanceId,
    ) -> Self {
        Self {
            selector,
            arguments,
            sequence,
            instance,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.arguments
    }

    /// Sequence number, strictly increasing per instance.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Typed access to a captured argument, for use in custom stub closures.
    pub fn arg<T: 'static>(&self, index: usize) -> Option<&T> {
        self.arguments.get(index)?.downcast_ref::<T>()
    }

    pub(crate) fn describe_arguments(&self) -> String {
        self.arguments
            .iter()
            .map(Arg::descriptor)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} with ({})",
            self.sequence,
            self.selector,
            self.describe_arguments()
        )
    }
}
