//! Runtime engine linked into generated mocks.
//!
//! Generated members call [`MockState::record`] and one of the `answer*`
//! helpers; tests register stubs with [`MockState::given`] or
//! [`MockState::stub`] and check call patterns with [`MockState::verify`].
//!
//! ```
//! use mocksmith::runtime::{eq, Arg, Constraint, Matcher, MockState, Selector};
//!
//! const SEND: Selector = Selector::new("send(&str)");
//!
//! let state = MockState::new("Mailer");
//! state.record(SEND, vec![Arg::value(String::from("hello"))]);
//!
//! let result = state.verify(SEND, Matcher::args([eq("hello")]), Constraint::once());
//! assert!(result.passed());
//! ```

pub mod arg;
pub mod error;
pub mod invocation;
pub mod matcher;
pub mod real;
pub mod selector;
pub mod state;
pub mod stub;
pub mod verify;

pub use arg::{Arg, ArgKind, Comparison};
pub use error::{RuntimeDiagnostic, UnmatchedInvocation, UnmatchedReason};
pub use invocation::{InstanceId, Invocation};
pub use matcher::{any, eq, matching, ArgMatcher, MatchOutcome, Matcher};
pub use real::RealSlot;
pub use selector::Selector;
pub use state::{Answer, DefaultPolicy, MockState, StubBuilder};
pub use stub::{Behavior, Policy, Producer, StubId};
pub use verify::{in_order, Constraint, OrderCheck, VerificationFailure, VerificationResult};
