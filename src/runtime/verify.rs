//! Post-hoc verification over an instance's invocation log.
//!
//! Verification never mutates the log and never panics on its own: a failed
//! check is returned as a [`VerificationResult`] whose `Display` output is a
//! complete diagnostic. [`VerificationResult::assert`] is the test-facing
//! shortcut that turns a failure into a panic.
//!
//! Relative order uses sequence numbers only. `X` is *before* `Y` when some
//! matched `X` call has a smaller sequence number than some matched `Y` call,
//! which is the same subsequence rule [`in_order`] applies to longer chains.

use super::invocation::{InstanceId, Invocation};
use super::matcher::Matcher;
use super::selector::Selector;
use std::fmt;

/// Expected count or relative order of matching invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    /// Inclusive range.
    Between(usize, usize),
    Never,
    Before {
        other: Selector,
        sequences: Vec<u64>,
    },
    After {
        other: Selector,
        sequences: Vec<u64>,
    },
}

impl Constraint {
    pub fn once() -> Self {
        Self::Exactly(1)
    }

    pub fn before(other: &VerificationResult) -> Self {
        Self::Before {
            other: other.selector.clone(),
            sequences: other.sequences(),
        }
    }

    pub fn after(other: &VerificationResult) -> Self {
        Self::After {
            other: other.selector.clone(),
            sequences: other.sequences(),
        }
    }

    fn is_satisfied_by(&self, sequences: &[u64]) -> bool {
        let count = sequences.len();
        match self {
            Self::Exactly(expected) => count == *expected,
            Self::AtLeast(minimum) => count >= *minimum,
            Self::AtMost(maximum) => count <= *maximum,
            Self::Between(minimum, maximum) => (*minimum..=*maximum).contains(&count),
            Self::Never => count == 0,
            Self::Before { sequences: other, .. } => {
                match (sequences.iter().min(), other.iter().max()) {
                    (Some(first), Some(last_other)) => first < last_other,
                    _ => false,
                }
            }
            Self::After { sequences: other, .. } => {
                match (sequences.iter().max(), other.iter().min()) {
                    (Some(last), Some(first_other)) => last > first_other,
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(count) => write!(f, "exactly {}", plural_times(*count)),
            Self::AtLeast(count) => write!(f, "at least {}", plural_times(*count)),
            Self::AtMost(count) => write!(f, "at most {}", plural_times(*count)),
            Self::Between(minimum, maximum) => {
                write!(f, "between {} and {}", minimum, plural_times(*maximum))
            }
            Self::Never => f.write_str("never"),
            Self::Before { other, sequences } => {
                write!(f, "before `{}` {}", other, render_sequences(sequences))
            }
            Self::After { other, sequences } => {
                write!(f, "after `{}` {}", other, render_sequences(sequences))
            }
        }
    }
}

fn plural_times(count: usize) -> String {
    if count == 1 {
        "1 time".to_string()
    } else {
        format!("{} times", count)
    }
}

fn render_sequences(sequences: &[u64]) -> String {
    let rendered: Vec<String> = sequences.iter().map(|seq| format!("#{}", seq)).collect();
    format!("[{}]", rendered.join(", "))
}

/// Expected and actual data of a failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationFailure {
    pub instance: InstanceId,
    pub selector: Selector,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "verification failed for `{}` on {}: expected {}, but {}",
            self.selector, self.instance, self.expected, self.actual
        )
    }
}

/// Outcome of one verification query.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    instance: InstanceId,
    selector: Selector,
    matcher: String,
    constraint: Constraint,
    matches: Vec<Invocation>,
    passed: bool,
    notes: Vec<String>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Invocations that satisfied the selector and matcher.
    pub fn matches(&self) -> &[Invocation] {
        &self.matches
    }

    pub fn count(&self) -> usize {
        self.matches.len()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.matches.iter().map(Invocation::sequence).collect()
    }

    /// Notes about argument positions that could only be wildcard-matched.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn failure(&self) -> Option<VerificationFailure> {
        if self.passed {
            return None;
        }
        let actual = match &self.constraint {
            Constraint::Before { .. } | Constraint::After { .. } => {
                format!("matching calls had sequence {}", render_sequences(&self.sequences()))
            }
            _ => {
                let mut actual = format!("it was called {}", plural_times(self.matches.len()));
                if !self.matches.is_empty() {
                    let calls: Vec<String> = self.matches.iter().map(ToString::to_string).collect();
                    actual.push_str(&format!(": {}", calls.join("; ")));
                }
                actual
            }
        };
        Some(VerificationFailure {
            instance: self.instance,
            selector: self.selector.clone(),
            expected: format!("a call matching {} {}", self.matcher, self.constraint),
            actual,
        })
    }

    /// Panic with the failure diagnostic unless the verification passed.
    #[track_caller]
    pub fn assert(&self) {
        if let Some(failure) = self.failure() {
            panic!("{}", failure);
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure() {
            Some(failure) => write!(f, "{}", failure),
            None => write!(
                f,
                "verified `{}` on {} {} ({})",
                self.selector,
                self.instance,
                self.constraint,
                plural_times(self.matches.len())
            ),
        }
    }
}

pub(crate) fn evaluate(
    instance: InstanceId,
    log: &[Invocation],
    selector: &Selector,
    matcher: &Matcher,
    constraint: Constraint,
) -> VerificationResult {
    let mut notes = Vec::new();
    let matches: Vec<Invocation> = log
        .iter()
        .filter(|invocation| invocation.selector() == selector)
        .filter(|invocation| {
            let outcome = matcher.evaluate(invocation.arguments());
            notes.extend(outcome.notes);
            outcome.matched
        })
        .cloned()
        .collect();

    let sequences: Vec<u64> = matches.iter().map(Invocation::sequence).collect();
    let passed = constraint.is_satisfied_by(&sequences);

    VerificationResult {
        instance,
        selector: selector.clone(),
        matcher: matcher.to_string(),
        constraint,
        matches,
        passed,
        notes,
    }
}

/// Result of checking that several verifications happened in sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCheck {
    pub passed: bool,
    pub selectors: Vec<Selector>,
    /// Sequence number chosen for each step, `None` from the first break on.
    pub chain: Vec<Option<u64>>,
}

impl fmt::Display for OrderCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self
            .selectors
            .iter()
            .zip(&self.chain)
            .map(|(selector, sequence)| match sequence {
                Some(sequence) => format!("`{}` #{}", selector, sequence),
                None => format!("`{}` (no later call)", selector),
            })
            .collect();
        let verdict = if self.passed { "in order" } else { "out of order" };
        write!(f, "{}: {}", verdict, steps.join(" -> "))
    }
}

/// Check that the matched calls of `results` form an increasing chain.
pub fn in_order(results: &[&VerificationResult]) -> OrderCheck {
    let mut previous: Option<u64> = None;
    let mut broken = false;
    let mut chain = Vec::with_capacity(results.len());

    for result in results {
        let next = if broken {
            None
        } else {
            result
                .matches
                .iter()
                .map(Invocation::sequence)
                .filter(|sequence| previous.map_or(true, |prev| *sequence > prev))
                .min()
        };
        if next.is_none() {
            broken = true;
        }
        previous = next.or(previous);
        chain.push(next);
    }

    OrderCheck {
        passed: !broken,
        selectors: results.iter().map(|result| result.selector.clone()).collect(),
        chain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::arg::Arg;
    use std::sync::Arc;

    fn log() -> Vec<Invocation> {
        let instance = InstanceId::next();
        vec![
            Invocation::new(Selector::new("open()"), Arc::from(vec![]), 0, instance),
            Invocation::new(Selector::new("write(u8)"), Arc::from(vec![Arg::value(1_u8)]), 1, instance),
            Invocation::new(Selector::new("write(u8)"), Arc::from(vec![Arg::value(2_u8)]), 2, instance),
            Invocation::new(Selector::new("close()"), Arc::from(vec![]), 3, instance),
        ]
    }

    fn check(selector: &'static str, constraint: Constraint) -> VerificationResult {
        let log = log();
        evaluate(
            log[0].instance(),
            &log,
            &Selector::new(selector),
            &Matcher::any(),
            constraint,
        )
    }

    #[test]
    fn test_count_constraints() {
        assert!(check("write(u8)", Constraint::Exactly(2)).passed());
        assert!(check("write(u8)", Constraint::AtLeast(1)).passed());
        assert!(!check("write(u8)", Constraint::AtMost(1)).passed());
        assert!(check("write(u8)", Constraint::Between(1, 3)).passed());
        assert!(check("flush()", Constraint::Never).passed());
    }

    #[test]
    fn test_failure_reports_actual_calls() {
        let result = check("write(u8)", Constraint::once());
        let failure = result.failure().expect("should fail");
        assert!(failure.actual.contains("called 2 times"));
        assert!(failure.actual.contains("#1 write(u8) with (1)"));
    }

    #[test]
    fn test_order_constraint_compares_sequences() {
        let open = check("open()", Constraint::AtLeast(1));
        let close = check("close()", Constraint::AtLeast(1));
        assert!(check("open()", Constraint::before(&close)).passed());
        let reversed = check("close()", Constraint::before(&open));
        assert!(!reversed.passed());
        let failure = reversed.failure().expect("should fail");
        assert!(failure.expected.contains("before `open()` [#0]"));
        assert!(failure.actual.contains("[#3]"));
    }

    #[test]
    fn test_in_order_chain() {
        let open = check("open()", Constraint::AtLeast(1));
        let write = check("write(u8)", Constraint::AtLeast(1));
        let close = check("close()", Constraint::AtLeast(1));
        assert!(in_order(&[&open, &write, &close]).passed);
        let reversed = in_order(&[&close, &open]);
        assert!(!reversed.passed);
        assert_eq!(reversed.chain, vec![Some(3), None]);
    }
}
