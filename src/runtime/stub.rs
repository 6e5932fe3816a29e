//! Stubbed behaviors and their consumption policies.

use super::invocation::Invocation;
use super::matcher::Matcher;
use super::selector::Selector;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Produces a type-erased value for an invocation.
pub type Producer = Arc<dyn Fn(&Invocation) -> Box<dyn Any + Send> + Send + Sync>;

/// What a matched stub does.
#[derive(Clone)]
pub enum Behavior {
    /// Return a value. Optional members also accept the unwrapped value,
    /// fallible members also accept the `Ok` value.
    Return(Producer),
    /// Raise an error from a fallible member.
    Throw(Producer),
    /// Run the real implementation.
    CallThrough,
    /// Run a closure over the invocation and return its result.
    Invoke(Producer),
}

impl Behavior {
    pub fn returning<T>(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::Return(Arc::new(move |_: &Invocation| Box::new(value.clone()) as Box<dyn Any + Send>))
    }

    pub fn throwing<E>(error: E) -> Self
    where
        E: Clone + Send + Sync + 'static,
    {
        Self::Throw(Arc::new(move |_: &Invocation| Box::new(error.clone()) as Box<dyn Any + Send>))
    }

    pub fn call_through() -> Self {
        Self::CallThrough
    }

    pub fn invoking<R, F>(body: F) -> Self
    where
        R: Send + 'static,
        F: Fn(&Invocation) -> R + Send + Sync + 'static,
    {
        Self::Invoke(Arc::new(move |invocation: &Invocation| {
            Box::new(body(invocation)) as Box<dyn Any + Send>
        }))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Return(_) => "return",
            Self::Throw(_) => "throw",
            Self::CallThrough => "call-through",
            Self::Invoke(_) => "invoke",
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How often a stub applies before it is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    Once,
    Times(u32),
    #[default]
    Forever,
}

impl Policy {
    pub(crate) fn remaining(self) -> Option<u32> {
        match self {
            Self::Once => Some(1),
            Self::Times(count) => Some(count),
            Self::Forever => None,
        }
    }
}

/// Handle to a registered stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StubId(pub(crate) u64);

#[derive(Debug, Clone)]
pub(crate) struct Stub {
    pub(crate) id: StubId,
    pub(crate) selector: Selector,
    pub(crate) matcher: Matcher,
    pub(crate) behavior: Behavior,
    /// `None` for stubs that never run out.
    pub(crate) remaining: Option<u32>,
}

impl Stub {
    /// A `Times(0)` stub is registered but never answers.
    pub(crate) fn is_spent(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Decrement the remaining count. Returns true when the stub is used up.
    pub(crate) fn consume(&mut self) -> bool {
        match self.remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        }
    }
}
