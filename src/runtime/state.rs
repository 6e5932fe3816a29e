//! Per-instance recorder and stub registry.
//!
//! Every generated mock owns one [`MockState`]. The invocation log and the stub
//! list live behind a single `parking_lot::Mutex`; `record`, the consuming half
//! of `resolve`, and `reset` are the only operations that take it, and none of
//! them runs user code while holding it.

use super::arg::Arg;
use super::error::{RuntimeDiagnostic, UnmatchedInvocation, UnmatchedReason};
use super::invocation::{InstanceId, Invocation};
use super::matcher::{ArgMatcher, Matcher};
use super::selector::Selector;
use super::stub::{Behavior, Policy, Stub, StubId};
use super::verify::{self, Constraint, VerificationResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What an unstubbed member may do instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultPolicy {
    /// Every unstubbed member with a return value fails with `UnmatchedInvocation`.
    #[default]
    Strict,
    /// Non-throwing members whose return type implements `Default` return
    /// that default; optional members return `None`.
    TypeDefaults,
}

/// How a generated member should continue after a call was recorded.
#[derive(Debug)]
pub enum Answer<R> {
    Value(R),
    CallThrough,
    Unstubbed,
}

#[derive(Default)]
struct Book {
    next_sequence: u64,
    next_stub: u64,
    log: Vec<Invocation>,
    stubs: Vec<Stub>,
    diagnostics: Vec<RuntimeDiagnostic>,
    failures: Vec<UnmatchedInvocation>,
}

struct Inner {
    id: InstanceId,
    type_name: &'static str,
    type_defaults: AtomicBool,
    book: Mutex<Book>,
}

/// Invocation log and stubs of one mock instance.
///
/// Cloning shares the state: clones have the same identity and log.
#[derive(Clone)]
pub struct MockState {
    inner: Arc<Inner>,
}

impl MockState {
    pub fn new(type_name: &'static str) -> Self {
        Self::with_policy(type_name, DefaultPolicy::Strict)
    }

    pub fn with_policy(type_name: &'static str, policy: DefaultPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: InstanceId::next(),
                type_name,
                type_defaults: AtomicBool::new(policy == DefaultPolicy::TypeDefaults),
                book: Mutex::new(Book::default()),
            }),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    pub fn default_policy(&self) -> DefaultPolicy {
        if self.type_defaults() {
            DefaultPolicy::TypeDefaults
        } else {
            DefaultPolicy::Strict
        }
    }

    pub fn set_default_policy(&self, policy: DefaultPolicy) {
        self.inner
            .type_defaults
            .store(policy == DefaultPolicy::TypeDefaults, Ordering::SeqCst);
    }

    /// Whether unstubbed members may fall back to type defaults.
    pub fn type_defaults(&self) -> bool {
        self.inner.type_defaults.load(Ordering::SeqCst)
    }

    /// Append an invocation to the log and assign its sequence number.
    pub fn record(&self, selector: Selector, arguments: Vec<Arg>) -> Invocation {
        let arguments: Arc<[Arg]> = arguments.into();
        let mut book = self.inner.book.lock();
        let sequence = book.next_sequence;
        book.next_sequence += 1;
        let invocation = Invocation::new(selector, arguments, sequence, self.inner.id);
        book.log.push(invocation.clone());
        invocation
    }

    /// Register a stub. Later stubs take precedence over earlier ones.
    pub fn stub(
        &self,
        selector: Selector,
        matcher: Matcher,
        behavior: Behavior,
        policy: Policy,
    ) -> StubId {
        let mut book = self.inner.book.lock();
        let id = StubId(book.next_stub);
        book.next_stub += 1;
        book.stubs.push(Stub {
            id,
            selector,
            matcher,
            behavior,
            remaining: policy.remaining(),
        });
        id
    }

    /// Start a fluent stub registration for `selector`.
    pub fn given(&self, selector: Selector) -> StubBuilder<'_> {
        StubBuilder {
            state: self,
            selector,
            matcher: Matcher::any(),
            policy: Policy::Forever,
        }
    }

    /// Remove a single stub. Returns false if it was already consumed or removed.
    pub fn remove_stub(&self, id: StubId) -> bool {
        let mut book = self.inner.book.lock();
        let before = book.stubs.len();
        book.stubs.retain(|stub| stub.id != id);
        book.stubs.len() != before
    }

    /// Find the behavior for an invocation, most recent stub first.
    ///
    /// Matchers are evaluated on a snapshot outside the lock. The winning stub
    /// is then consumed under the lock; if another thread used it up in the
    /// meantime, resolution starts over.
    pub fn resolve(&self, invocation: &Invocation) -> Option<Behavior> {
        loop {
            let candidates: Vec<(StubId, Matcher, Behavior)> = {
                let book = self.inner.book.lock();
                book.stubs
                    .iter()
                    .rev()
                    .filter(|stub| stub.selector == *invocation.selector() && !stub.is_spent())
                    .map(|stub| (stub.id, stub.matcher.clone(), stub.behavior.clone()))
                    .collect()
            };

            let mut notes = Vec::new();
            let winner = candidates.into_iter().find(|(_, matcher, _)| {
                let outcome = matcher.evaluate(invocation.arguments());
                notes.extend(outcome.notes);
                outcome.matched
            });
            self.note(invocation, notes);

            let (id, _, behavior) = winner?;
            if self.consume(id) {
                return Some(behavior);
            }
        }
    }

    fn consume(&self, id: StubId) -> bool {
        let mut book = self.inner.book.lock();
        let Some(index) = book.stubs.iter().position(|stub| stub.id == id) else {
            return false;
        };
        if book.stubs[index].consume() {
            book.stubs.remove(index);
        }
        true
    }

    fn note(&self, invocation: &Invocation, notes: Vec<String>) {
        if notes.is_empty() {
            return;
        }
        for message in &notes {
            tracing::warn!(
                instance = %self.inner.id,
                selector = %invocation.selector(),
                "{}",
                message
            );
        }
        let mut book = self.inner.book.lock();
        book.diagnostics
            .extend(notes.into_iter().map(|message| RuntimeDiagnostic {
                instance: self.inner.id,
                selector: invocation.selector().clone(),
                sequence: invocation.sequence(),
                message,
            }));
    }

    /// Clear the log and every stub atomically with respect to `record`.
    pub fn reset(&self) {
        let mut book = self.inner.book.lock();
        book.log.clear();
        book.stubs.clear();
        book.diagnostics.clear();
        book.failures.clear();
    }

    pub fn clear_invocations(&self) {
        self.inner.book.lock().log.clear();
    }

    pub fn clear_stubs(&self) {
        self.inner.book.lock().stubs.clear();
    }

    /// Snapshot of the log in sequence order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.inner.book.lock().log.clone()
    }

    pub fn invocations_for(&self, selector: &Selector) -> Vec<Invocation> {
        self.inner
            .book
            .lock()
            .log
            .iter()
            .filter(|invocation| invocation.selector() == selector)
            .cloned()
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<RuntimeDiagnostic> {
        self.inner.book.lock().diagnostics.clone()
    }

    /// Unmatched invocations raised by generated members so far.
    pub fn failures(&self) -> Vec<UnmatchedInvocation> {
        self.inner.book.lock().failures.clone()
    }

    /// Evaluate a verification query against a snapshot of the log.
    pub fn verify(
        &self,
        selector: Selector,
        matcher: Matcher,
        constraint: Constraint,
    ) -> VerificationResult {
        let log = self.invocations();
        verify::evaluate(self.inner.id, &log, &selector, &matcher, constraint)
    }

    /// Resolve a call for a member returning `R`.
    pub fn answer<R: 'static>(&self, invocation: &Invocation) -> Answer<R> {
        match self.resolve(invocation) {
            None => Answer::Unstubbed,
            Some(Behavior::CallThrough) => Answer::CallThrough,
            Some(Behavior::Throw(_)) => self.raise(invocation, UnmatchedReason::NotThrowing),
            Some(Behavior::Return(produce)) | Some(Behavior::Invoke(produce)) => {
                match produce(invocation).downcast::<R>() {
                    Ok(value) => Answer::Value(*value),
                    Err(_) => self.mismatch::<R>(invocation),
                }
            }
        }
    }

    /// Resolve a call for a member returning `Option<T>`; stubs may supply `T` or `Option<T>`.
    pub fn answer_optional<T: 'static>(&self, invocation: &Invocation) -> Answer<Option<T>> {
        match self.resolve(invocation) {
            None => Answer::Unstubbed,
            Some(Behavior::CallThrough) => Answer::CallThrough,
            Some(Behavior::Throw(_)) => self.raise(invocation, UnmatchedReason::NotThrowing),
            Some(Behavior::Return(produce)) | Some(Behavior::Invoke(produce)) => {
                match downcast_either::<Option<T>, T>(produce(invocation), Some) {
                    Some(value) => Answer::Value(value),
                    None => self.mismatch::<Option<T>>(invocation),
                }
            }
        }
    }

    /// Resolve a call for a member returning `Result<T, E>`; stubs may supply
    /// `T` or `Result<T, E>`, throwing stubs supply `E`.
    pub fn answer_fallible<T: 'static, E: 'static>(
        &self,
        invocation: &Invocation,
    ) -> Answer<Result<T, E>> {
        match self.resolve(invocation) {
            None => Answer::Unstubbed,
            Some(Behavior::CallThrough) => Answer::CallThrough,
            Some(Behavior::Throw(produce)) => match produce(invocation).downcast::<E>() {
                Ok(error) => Answer::Value(Err(*error)),
                Err(_) => self.mismatch::<E>(invocation),
            },
            Some(Behavior::Return(produce)) | Some(Behavior::Invoke(produce)) => {
                match downcast_either::<Result<T, E>, T>(produce(invocation), Ok) {
                    Some(value) => Answer::Value(value),
                    None => self.mismatch::<Result<T, E>>(invocation),
                }
            }
        }
    }

    fn mismatch<R>(&self, invocation: &Invocation) -> ! {
        self.raise(
            invocation,
            UnmatchedReason::ReturnTypeMismatch {
                expected: type_name::<R>(),
            },
        )
    }

    /// Build the unmatched-invocation error for a call without recording it.
    pub fn unmatched(&self, invocation: &Invocation, reason: UnmatchedReason) -> UnmatchedInvocation {
        UnmatchedInvocation::new(self.inner.type_name, invocation, reason)
    }

    /// Record an unmatched invocation and fail the calling test.
    #[track_caller]
    pub fn raise(&self, invocation: &Invocation, reason: UnmatchedReason) -> ! {
        let failure = self.unmatched(invocation, reason);
        tracing::error!(instance = %self.inner.id, "{}", failure);
        self.inner.book.lock().failures.push(failure.clone());
        panic!("{}", failure)
    }

    /// Shorthand for members that have no stub and no permitted default.
    #[track_caller]
    pub fn raise_unstubbed(&self, invocation: &Invocation) -> ! {
        self.raise(invocation, UnmatchedReason::NoStub)
    }
}

fn downcast_either<Full: 'static, Part: 'static>(
    produced: Box<dyn Any + Send>,
    wrap: impl FnOnce(Part) -> Full,
) -> Option<Full> {
    match produced.downcast::<Full>() {
        Ok(full) => Some(*full),
        Err(produced) => produced.downcast::<Part>().ok().map(|part| wrap(*part)),
    }
}

impl fmt::Debug for MockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let book = self.inner.book.lock();
        f.debug_struct("MockState")
            .field("id", &self.inner.id)
            .field("type_name", &self.inner.type_name)
            .field("invocations", &book.log.len())
            .field("stubs", &book.stubs.len())
            .finish()
    }
}

/// Fluent stub registration, see [`MockState::given`].
#[must_use = "a stub is only registered by one of the `will_*` methods"]
pub struct StubBuilder<'a> {
    state: &'a MockState,
    selector: Selector,
    matcher: Matcher,
    policy: Policy,
}

impl StubBuilder<'_> {
    pub fn with(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_args(self, matchers: impl IntoIterator<Item = ArgMatcher>) -> Self {
        self.with(Matcher::args(matchers))
    }

    pub fn once(mut self) -> Self {
        self.policy = Policy::Once;
        self
    }

    pub fn times(mut self, count: u32) -> Self {
        self.policy = Policy::Times(count);
        self
    }

    pub fn will(self, behavior: Behavior) -> StubId {
        self.state
            .stub(self.selector, self.matcher, behavior, self.policy)
    }

    pub fn will_return<T: Clone + Send + Sync + 'static>(self, value: T) -> StubId {
        self.will(Behavior::returning(value))
    }

    pub fn will_throw<E: Clone + Send + Sync + 'static>(self, error: E) -> StubId {
        self.will(Behavior::throwing(error))
    }

    pub fn will_call_through(self) -> StubId {
        self.will(Behavior::call_through())
    }

    pub fn will_invoke<R, F>(self, body: F) -> StubId
    where
        R: Send + 'static,
        F: Fn(&Invocation) -> R + Send + Sync + 'static,
    {
        self.will(Behavior::invoking(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::matcher::{any, eq};

    const GREET: Selector = Selector::new("greet(&str)");

    fn call(state: &MockState, name: &str) -> Invocation {
        state.record(GREET, vec![Arg::value(name.to_owned())])
    }

    #[test]
    fn test_record_assigns_increasing_sequences() {
        let state = MockState::new("Greeter");
        let first = call(&state, "a");
        let second = call(&state, "b");
        assert!(first.sequence() < second.sequence());
        assert_eq!(state.invocations().len(), 2);
    }

    #[test]
    fn test_latest_stub_wins() {
        let state = MockState::new("Greeter");
        state.given(GREET).will_return(String::from("first"));
        state.given(GREET).will_return(String::from("second"));
        let invocation = call(&state, "x");
        match state.answer::<String>(&invocation) {
            Answer::Value(value) => assert_eq!(value, "second"),
            other => panic!("unexpected answer {:?}", other),
        }
    }

    #[test]
    fn test_once_stub_reverts_to_previous() {
        let state = MockState::new("Greeter");
        state.given(GREET).will_return(String::from("always"));
        state.given(GREET).once().will_return(String::from("once"));
        let answers: Vec<String> = (0..3)
            .map(|_| match state.answer::<String>(&call(&state, "x")) {
                Answer::Value(value) => value,
                other => panic!("unexpected answer {:?}", other),
            })
            .collect();
        assert_eq!(answers, vec!["once", "always", "always"]);
    }

    #[test]
    fn test_matcher_filters_stubs() {
        let state = MockState::new("Greeter");
        state
            .given(GREET)
            .with_args([eq("bob")])
            .will_return(String::from("hi bob"));
        assert!(matches!(state.answer::<String>(&call(&state, "alice")), Answer::Unstubbed));
        assert!(matches!(state.answer::<String>(&call(&state, "bob")), Answer::Value(_)));
    }

    #[test]
    fn test_optional_accepts_unwrapped_value() {
        let state = MockState::new("Cache");
        let selector = Selector::new("get(u32)");
        state.given(selector.clone()).will_return(5_u32);
        let invocation = state.record(selector, vec![Arg::value(1_u32)]);
        assert!(matches!(state.answer_optional::<u32>(&invocation), Answer::Value(Some(5))));
    }

    #[test]
    fn test_fallible_throw_and_ok() {
        let state = MockState::new("Store");
        let selector = Selector::new("load()");
        state.given(selector.clone()).once().will_throw(String::from("disk"));
        state.given(selector.clone()).with(Matcher::no_args()).once().will_return(9_i32);
        let first = state.record(selector.clone(), vec![]);
        let second = state.record(selector, vec![]);
        assert!(matches!(
            state.answer_fallible::<i32, String>(&first),
            Answer::Value(Ok(9))
        ));
        match state.answer_fallible::<i32, String>(&second) {
            Answer::Value(Err(error)) => assert_eq!(error, "disk"),
            other => panic!("unexpected answer {:?}", other),
        }
    }

    #[test]
    fn test_invoke_reads_arguments() {
        let state = MockState::new("Greeter");
        state.given(GREET).will_invoke(|invocation: &Invocation| {
            format!("hello {}", invocation.arg::<String>(0).cloned().unwrap_or_default())
        });
        match state.answer::<String>(&call(&state, "eve")) {
            Answer::Value(value) => assert_eq!(value, "hello eve"),
            other => panic!("unexpected answer {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_stub_type_raises() {
        let state = MockState::new("Greeter");
        state.given(GREET).will_return(1_u8);
        let invocation = call(&state, "x");
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = state.answer::<String>(&invocation);
        }));
        assert!(outcome.is_err());
        let failures = state.failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0].reason,
            UnmatchedReason::ReturnTypeMismatch { .. }
        ));
    }

    #[test]
    fn test_opaque_argument_records_diagnostic() {
        let state = MockState::new("Runner");
        let selector = Selector::new("run(F)");
        state
            .given(selector.clone())
            .with_args([eq(1_u8)])
            .will_return(true);
        let callback = || 1;
        let invocation = state.record(selector, vec![Arg::opaque(&callback)]);
        assert!(matches!(state.answer::<bool>(&invocation), Answer::Value(true)));
        assert_eq!(state.diagnostics().len(), 1);
    }

    #[test]
    fn test_reset_forgets_calls_and_stubs() {
        let state = MockState::new("Greeter");
        state.given(GREET).with_args([any()]).will_return(String::from("hi"));
        call(&state, "a");
        state.reset();
        assert!(state.invocations().is_empty());
        assert!(matches!(state.answer::<String>(&call(&state, "a")), Answer::Unstubbed));
    }

    #[test]
    fn test_clones_share_identity() {
        let state = MockState::new("Greeter");
        let clone = state.clone();
        call(&clone, "a");
        assert_eq!(state.id(), clone.id());
        assert_eq!(state.invocations().len(), 1);
    }

    #[test]
    fn test_default_policy_is_switchable() {
        let state = MockState::new("Greeter");
        assert_eq!(state.default_policy(), DefaultPolicy::Strict);
        state.set_default_policy(DefaultPolicy::TypeDefaults);
        assert!(state.type_defaults());
    }
}
