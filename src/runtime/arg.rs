//! Argument snapshots captured at call time.
//!
//! Every argument of a recorded call is stored as an [`Arg`]. Which flavour a
//! parameter gets is decided at generation time from its comparison class:
//!
//! - **Value**: an owned copy that supports typed equality
//! - **Structural**: only a `Debug` descriptor is kept, compared textually
//! - **Opaque**: nothing comparable is available (closures, trait objects)

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

trait SnapshotValue: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn equals(&self, other: &dyn Any) -> Option<bool>;
}

struct Snapshot<T>(T);

impl<T> SnapshotValue for Snapshot<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn equals(&self, other: &dyn Any) -> Option<bool> {
        other.downcast_ref::<T>().map(|other| *other == self.0)
    }
}

#[derive(Clone)]
enum Repr {
    Value(Arc<dyn SnapshotValue>),
    Structural,
    Opaque,
}

/// How much of an argument could be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Value,
    Structural,
    Opaque,
}

/// Result of comparing a recorded argument against an expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Different,
    /// Neither typed equality nor a descriptor is available.
    Incomparable,
}

/// Immutable snapshot of one call argument.
#[derive(Clone)]
pub struct Arg {
    type_name: &'static str,
    descriptor: String,
    repr: Repr,
}

impl Arg {
    /// Snapshot an owned, comparable value.
    pub fn value<T>(value: T) -> Self
    where
        T: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            descriptor: format!("{:?}", value),
            repr: Repr::Value(Arc::new(Snapshot(value))),
        }
    }

    /// Snapshot only the `Debug` rendering of a value.
    pub fn structural<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        Self {
            type_name: type_name::<T>(),
            descriptor: format!("{:?}", value),
            repr: Repr::Structural,
        }
    }

    /// Record that an argument was passed without capturing it.
    pub fn opaque<T: ?Sized>(_value: &T) -> Self {
        let type_name = type_name::<T>();
        Self {
            type_name,
            descriptor: format!("<{}>", type_name),
            repr: Repr::Opaque,
        }
    }

    pub fn kind(&self) -> ArgKind {
        match self.repr {
            Repr::Value(_) => ArgKind::Value,
            Repr::Structural => ArgKind::Structural,
            Repr::Opaque => ArgKind::Opaque,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Borrow the captured value when it was snapshotted as `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match &self.repr {
            Repr::Value(value) => value.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Compare a recorded argument (`self`) with an expected one.
    ///
    /// Typed equality is used when both sides hold values of the same type.
    /// Differing types (`&str` against `String`) and structural snapshots
    /// fall back to the `Debug` descriptors.
    pub fn compare(&self, expected: &Arg) -> Comparison {
        match (&self.repr, &expected.repr) {
            (Repr::Opaque, _) | (_, Repr::Opaque) => Comparison::Incomparable,
            (Repr::Value(actual), Repr::Value(wanted)) => {
                match actual.equals(wanted.as_any()) {
                    Some(true) => Comparison::Equal,
                    Some(false) => Comparison::Different,
                    None => self.compare_descriptors(expected),
                }
            }
            _ => self.compare_descriptors(expected),
        }
    }

    fn compare_descriptors(&self, expected: &Arg) -> Comparison {
        if self.descriptor == expected.descriptor {
            Comparison::Equal
        } else {
            Comparison::Different
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Config {
        retries: u32,
    }

    #[test]
    fn test_values_of_same_type_use_typed_equality() {
        assert_eq!(Arg::value(3_u32).compare(&Arg::value(3_u32)), Comparison::Equal);
        assert_eq!(Arg::value(3_u32).compare(&Arg::value(4_u32)), Comparison::Different);
    }

    #[test]
    fn test_string_matches_str_through_descriptor() {
        let recorded = Arg::value(String::from("bob"));
        assert_eq!(recorded.compare(&Arg::value("bob")), Comparison::Equal);
        assert_eq!(recorded.compare(&Arg::value("alice")), Comparison::Different);
    }

    #[test]
    fn test_structural_compares_debug_output() {
        let recorded = Arg::structural(&Config { retries: 2 });
        let expected = Arg::structural(&Config { retries: 2 });
        assert_eq!(recorded.compare(&expected), Comparison::Equal);
        assert_eq!(recorded.descriptor(), "Config { retries: 2 }");
    }

    #[test]
    fn test_opaque_is_incomparable() {
        let callback = |x: u32| x + 1;
        let recorded = Arg::opaque(&callback);
        assert_eq!(recorded.kind(), ArgKind::Opaque);
        assert_eq!(recorded.compare(&Arg::value(1_u32)), Comparison::Incomparable);
    }

    #[test]
    fn test_downcast_only_for_values() {
        assert_eq!(Arg::value(7_i64).downcast_ref::<i64>(), Some(&7));
        assert!(Arg::structural(&7_i64).downcast_ref::<i64>().is_none());
    }
}
