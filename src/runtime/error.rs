use super::invocation::{InstanceId, Invocation};
use super::selector::Selector;
use thiserror::Error;

/// Why a call could not be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// No stub matched and the member has no permitted default.
    NoStub,
    /// A call-through stub matched but no real implementation exists.
    NoRealImplementation,
    /// The stub produced a value of the wrong type.
    ReturnTypeMismatch { expected: &'static str },
    /// A throwing stub matched a member that cannot fail.
    NotThrowing,
}

impl std::fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStub => f.write_str("no stub matched and no default value is permitted"),
            Self::NoRealImplementation => {
                f.write_str("call-through requested but there is no real implementation")
            }
            Self::ReturnTypeMismatch { expected } => {
                write!(f, "stubbed value does not have the return type `{}`", expected)
            }
            Self::NotThrowing => f.write_str("throwing stub registered for a member that cannot fail"),
        }
    }
}

/// A runtime call that no stub or default could answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unmatched invocation of `{selector}` on {type_name} ({instance}) with ({arguments}) at #{sequence}: {reason}")]
pub struct UnmatchedInvocation {
    pub instance: InstanceId,
    pub type_name: &'static str,
    pub selector: Selector,
    pub arguments: String,
    pub sequence: u64,
    pub reason: UnmatchedReason,
}

impl UnmatchedInvocation {
    pub(crate) fn new(type_name: &'static str, invocation: &Invocation, reason: UnmatchedReason) -> Self {
        Self {
            instance: invocation.instance(),
            type_name,
            selector: invocation.selector().clone(),
            arguments: invocation.describe_arguments(),
            sequence: invocation.sequence(),
            reason,
        }
    }
}

/// Note produced while resolving a call, e.g. a wildcard fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDiagnostic {
    pub instance: InstanceId,
    pub selector: Selector,
    pub sequence: u64,
    pub message: String,
}
