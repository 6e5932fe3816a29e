use std::borrow::Cow;
use std::fmt;

/// Runtime identity of a mocked member.
///
/// A selector is the canonical rendering of a member signature,
/// `name<arity>(T1, T2)`, with the generic arity omitted when it is zero.
/// Generated mocks expose one selector constant per member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(Cow<'static, str>);

impl Selector {
    pub const fn new(signature: &'static str) -> Self {
        Self(Cow::Borrowed(signature))
    }

    pub fn owned(signature: impl Into<String>) -> Self {
        Self(Cow::Owned(signature.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Member name without generic arity or parameter list.
    pub fn name(&self) -> &str {
        let end = self.0.find(['<', '(']).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
