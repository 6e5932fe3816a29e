//! Argument matchers shared by stub selection and verification filtering.

use super::arg::{Arg, Comparison};
use std::fmt;
use std::sync::Arc;

type ArgPredicate = Arc<dyn Fn(&Arg) -> Option<bool> + Send + Sync>;

/// Predicate over a single argument position.
#[derive(Clone)]
pub enum ArgMatcher {
    /// Wildcard.
    Any,
    /// Exact equality against an expected snapshot.
    Eq(Arg),
    /// User-supplied predicate. `None` means the argument could not be inspected.
    Predicate {
        description: String,
        test: ArgPredicate,
    },
}

/// Wildcard matcher for one position.
pub fn any() -> ArgMatcher {
    ArgMatcher::Any
}

/// Exact-equality matcher for one position.
pub fn eq<T>(expected: T) -> ArgMatcher
where
    T: PartialEq + fmt::Debug + Send + Sync + 'static,
{
    ArgMatcher::Eq(Arg::value(expected))
}

/// Typed predicate matcher. Fails to match arguments that were not captured as `T`.
pub fn matching<T, F>(description: impl Into<String>, predicate: F) -> ArgMatcher
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    ArgMatcher::Predicate {
        description: description.into(),
        test: Arc::new(move |arg: &Arg| arg.downcast_ref::<T>().map(&predicate)),
    }
}

impl fmt::Debug for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Eq(expected) => write!(f, "eq({})", expected),
            Self::Predicate { description, .. } => write!(f, "matching({})", description),
        }
    }
}

/// Positional composition of argument matchers.
#[derive(Clone, Debug)]
pub enum Matcher {
    /// Accepts any argument list, whatever its length.
    AnyArguments,
    /// One matcher per parameter; the lengths must agree.
    Positional(Vec<ArgMatcher>),
}

/// Outcome of evaluating a matcher, with notes about degraded positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub matched: bool,
    pub notes: Vec<String>,
}

impl Matcher {
    pub fn any() -> Self {
        Self::AnyArguments
    }

    pub fn args(matchers: impl IntoIterator<Item = ArgMatcher>) -> Self {
        Self::Positional(matchers.into_iter().collect())
    }

    /// Matcher for members without parameters.
    pub fn no_args() -> Self {
        Self::Positional(Vec::new())
    }

    pub fn evaluate(&self, arguments: &[Arg]) -> MatchOutcome {
        let matchers = match self {
            Self::AnyArguments => {
                return MatchOutcome {
                    matched: true,
                    notes: Vec::new(),
                }
            }
            Self::Positional(matchers) => matchers,
        };

        if matchers.len() != arguments.len() {
            return MatchOutcome::default();
        }

        let mut notes = Vec::new();
        let matched = matchers
            .iter()
            .zip(arguments)
            .enumerate()
            .all(|(position, (matcher, argument))| {
                evaluate_position(position, matcher, argument, &mut notes)
            });

        MatchOutcome { matched, notes }
    }

    pub fn matches(&self, arguments: &[Arg]) -> bool {
        self.evaluate(arguments).matched
    }
}

fn evaluate_position(
    position: usize,
    matcher: &ArgMatcher,
    argument: &Arg,
    notes: &mut Vec<String>,
) -> bool {
    match matcher {
        ArgMatcher::Any => true,
        ArgMatcher::Eq(expected) => match argument.compare(expected) {
            Comparison::Equal => true,
            Comparison::Different => false,
            Comparison::Incomparable => {
                notes.push(format!(
                    "argument {} of type `{}` has no usable comparison; treated as wildcard",
                    position,
                    argument.type_name()
                ));
                true
            }
        },
        ArgMatcher::Predicate { description, test } => match test(argument) {
            Some(accepted) => accepted,
            None => {
                notes.push(format!(
                    "predicate `{}` cannot inspect argument {} of type `{}`",
                    description,
                    position,
                    argument.type_name()
                ));
                false
            }
        },
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyArguments => f.write_str("(..)"),
            Self::Positional(matchers) => {
                let rendered: Vec<String> =
                    matchers.iter().map(|matcher| format!("{:?}", matcher)).collect();
                write!(f, "({})", rendered.join(", "))
            }
        }
    }
}
