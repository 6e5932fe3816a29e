use mocksmith::runtime::{
    any, eq, in_order, matching, Answer, Arg, Behavior, Constraint, DefaultPolicy, Matcher,
    MockState, Policy, Selector, UnmatchedReason,
};
use pretty_assertions::assert_eq;
use std::panic::{catch_unwind, AssertUnwindSafe};

const OPEN: Selector = Selector::new("open(String)");
const READ: Selector = Selector::new("read(u32)");
const CLOSE: Selector = Selector::new("close()");
const FLUSH: Selector = Selector::new("flush()");

fn call_read(state: &MockState, len: u32) -> Answer<Vec<u8>> {
    let invocation = state.record(READ, vec![Arg::value(len)]);
    state.answer(&invocation)
}

fn value<R>(answer: Answer<R>) -> R {
    match answer {
        Answer::Value(value) => value,
        Answer::CallThrough => panic!("unexpected call-through"),
        Answer::Unstubbed => panic!("unexpected unstubbed answer"),
    }
}

#[test]
fn test_latest_matching_stub_wins() {
    let state = MockState::new("File");
    state.given(READ).will_return(vec![0u8]);
    state.given(READ).with_args([eq(4u32)]).will_return(vec![4u8; 4]);

    assert_eq!(value(call_read(&state, 4)), vec![4u8; 4]);
    assert_eq!(value(call_read(&state, 2)), vec![0u8]);

    // A later catch-all shadows the specific stub.
    state.given(READ).will_return(vec![9u8]);
    assert_eq!(value(call_read(&state, 4)), vec![9u8]);
}

#[test]
fn test_limited_stubs_are_consumed_then_fall_through() {
    let state = MockState::new("File");
    state.given(READ).will_return(vec![1u8]);
    state.given(READ).times(2).will_return(vec![2u8]);
    state.given(READ).once().will_return(vec![3u8]);

    let answers: Vec<Vec<u8>> = (0..5).map(|_| value(call_read(&state, 1))).collect();
    assert_eq!(
        answers,
        vec![vec![3u8], vec![2u8], vec![2u8], vec![1u8], vec![1u8]]
    );
}

#[test]
fn test_zero_times_stub_never_answers() {
    let state = MockState::new("File");
    state.given(READ).will_return(vec![1u8]);
    state.given(READ).times(0).will_return(vec![5u8]);
    assert_eq!(value(call_read(&state, 1)), vec![1u8]);

    let bare = MockState::new("File");
    bare.given(READ).times(0).will_return(vec![5u8]);
    assert!(matches!(call_read(&bare, 1), Answer::Unstubbed));
}

#[test]
fn test_invoking_stub_sees_the_arguments() {
    let state = MockState::new("File");
    state
        .given(READ)
        .will_invoke(|invocation| vec![0u8; *invocation.arg::<u32>(0).unwrap() as usize]);
    assert_eq!(value(call_read(&state, 3)).len(), 3);
}

#[test]
fn test_removed_stub_no_longer_answers() {
    let state = MockState::new("File");
    let id = state.given(READ).will_return(vec![1u8]);
    assert!(state.remove_stub(id));
    assert!(!state.remove_stub(id));
    assert!(matches!(call_read(&state, 1), Answer::Unstubbed));
}

#[test]
fn test_optional_and_fallible_answers_accept_unwrapped_values() {
    let state = MockState::new("Store");
    let get = Selector::new("get(&str)");
    let put = Selector::new("put(String)");

    state.given(get.clone()).will_return(String::from("v"));
    let invocation = state.record(get.clone(), vec![Arg::value(String::from("k"))]);
    assert_eq!(value(state.answer_optional::<String>(&invocation)), Some("v".to_string()));

    state.given(put.clone()).once().will_return(7u64);
    state.given(put.clone()).once().will_throw(String::from("full"));
    let first = state.record(put.clone(), vec![Arg::value(String::from("a"))]);
    assert_eq!(
        value(state.answer_fallible::<u64, String>(&first)),
        Err("full".to_string())
    );
    let second = state.record(put, vec![Arg::value(String::from("b"))]);
    assert_eq!(value(state.answer_fallible::<u64, String>(&second)), Ok(7));
}

#[test]
fn test_unstubbed_call_fails_with_full_diagnostic() {
    let state = MockState::new("File");
    state.record(OPEN, vec![Arg::value(String::from("a.txt"))]);
    let invocation = state.record(READ, vec![Arg::value(16u32)]);

    let panic = catch_unwind(AssertUnwindSafe(|| state.raise_unstubbed(&invocation)))
        .expect_err("unstubbed calls fail");
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(message.contains("read(u32)"), "{}", message);
    assert!(message.contains("File"), "{}", message);
    assert!(message.contains("16"), "{}", message);
    assert!(message.contains("#1"), "{}", message);

    let failures = state.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason, UnmatchedReason::NoStub);
    assert_eq!(failures[0].sequence, 1);
    assert_eq!(failures[0].arguments, "16");
}

#[test]
fn test_wrong_return_type_is_reported() {
    let state = MockState::new("File");
    state.given(READ).will_return(String::from("not bytes"));
    let invocation = state.record(READ, vec![Arg::value(1u32)]);
    let result = catch_unwind(AssertUnwindSafe(|| {
        state.answer::<Vec<u8>>(&invocation);
    }));
    assert!(result.is_err());
    assert!(matches!(
        state.failures()[0].reason,
        UnmatchedReason::ReturnTypeMismatch { .. }
    ));
}

#[test]
fn test_throwing_stub_on_infallible_member_fails() {
    let state = MockState::new("File");
    state.stub(CLOSE, Matcher::no_args(), Behavior::throwing(5i32), Policy::Forever);
    let invocation = state.record(CLOSE, Vec::new());
    let result = catch_unwind(AssertUnwindSafe(|| {
        state.answer::<()>(&invocation);
    }));
    assert!(result.is_err());
    assert_eq!(state.failures()[0].reason, UnmatchedReason::NotThrowing);
}

#[test]
fn test_count_constraints() {
    let state = MockState::new("File");
    for len in [1u32, 2, 3] {
        state.record(READ, vec![Arg::value(len)]);
    }

    assert!(state.verify(READ, Matcher::any(), Constraint::Exactly(3)).passed());
    assert!(state.verify(READ, Matcher::any(), Constraint::AtLeast(2)).passed());
    assert!(state.verify(READ, Matcher::any(), Constraint::AtMost(3)).passed());
    assert!(!state.verify(READ, Matcher::any(), Constraint::Between(1, 2)).passed());
    assert!(state.verify(CLOSE, Matcher::any(), Constraint::Never).passed());

    let small = state.verify(
        READ,
        Matcher::args([matching::<u32, _>("less than 3", |len| *len < 3)]),
        Constraint::Exactly(2),
    );
    assert!(small.passed());
    assert_eq!(small.sequences(), vec![0, 1]);

    let failed = state.verify(READ, Matcher::args([eq(7u32)]), Constraint::once());
    assert!(!failed.passed());
    let rendered = failed.to_string();
    assert!(rendered.contains("read(u32)"), "{}", rendered);
    assert!(rendered.contains("exactly 1 time"), "{}", rendered);
}

#[test]
fn test_relative_order() {
    let state = MockState::new("File");
    state.record(OPEN, vec![Arg::value(String::from("a"))]);
    state.record(READ, vec![Arg::value(1u32)]);
    state.record(CLOSE, Vec::new());

    let opened = state.verify(OPEN, Matcher::any(), Constraint::once());
    let read = state.verify(READ, Matcher::any(), Constraint::once());
    let closed = state.verify(CLOSE, Matcher::any(), Constraint::once());

    assert!(state.verify(OPEN, Matcher::any(), Constraint::before(&closed)).passed());
    assert!(state.verify(CLOSE, Matcher::any(), Constraint::after(&read)).passed());
    assert!(!state.verify(CLOSE, Matcher::any(), Constraint::before(&opened)).passed());
    // Nothing matched `flush()`, so no order relation holds.
    let flushed = state.verify(FLUSH, Matcher::any(), Constraint::Never);
    assert!(!state.verify(OPEN, Matcher::any(), Constraint::before(&flushed)).passed());

    assert!(in_order(&[&opened, &read, &closed]).passed);
    let reversed = in_order(&[&closed, &opened]);
    assert!(!reversed.passed);
    assert_eq!(reversed.chain, vec![Some(2), None]);
}

#[test]
fn test_opaque_arguments_match_only_wildcards() {
    struct Handle;
    let state = MockState::new("Pool");
    let attach = Selector::new("attach(Handle)");
    state.record(attach.clone(), vec![Arg::opaque(&Handle)]);

    assert!(state
        .verify(attach.clone(), Matcher::args([any()]), Constraint::once())
        .passed());
    let predicate = state.verify(
        attach.clone(),
        Matcher::args([matching::<u32, _>("anything", |_| true)]),
        Constraint::once(),
    );
    assert!(!predicate.passed());

    let equality = state.verify(attach, Matcher::args([eq(1u32)]), Constraint::once());
    assert!(equality.passed());
    assert!(!equality.notes().is_empty());
}

#[test]
fn test_reset_clears_everything_but_keeps_identity() {
    let state = MockState::new("File");
    let id = state.id();
    state.given(READ).will_return(vec![1u8]);
    let first = state.record(READ, vec![Arg::value(1u32)]);
    state.reset();

    assert!(state.invocations().is_empty());
    assert!(matches!(call_read(&state, 1), Answer::Unstubbed));
    assert_eq!(state.id(), id);
    assert!(state.invocations()[0].sequence() > first.sequence());
}

#[test]
fn test_instances_are_isolated_and_clones_share_state() {
    let left = MockState::new("File");
    let right = MockState::new("File");
    left.given(READ).will_return(vec![1u8]);
    left.record(CLOSE, Vec::new());

    assert_ne!(left.id(), right.id());
    assert!(matches!(call_read(&right, 1), Answer::Unstubbed));
    assert!(right.invocations_for(&CLOSE).is_empty());

    let shared = left.clone();
    shared.record(CLOSE, Vec::new());
    assert_eq!(left.invocations_for(&CLOSE).len(), 2);
}

#[test]
fn test_default_policy_can_change_at_runtime() {
    let state = MockState::with_policy("File", DefaultPolicy::TypeDefaults);
    assert!(state.type_defaults());
    state.set_default_policy(DefaultPolicy::Strict);
    assert_eq!(state.default_policy(), DefaultPolicy::Strict);
}
