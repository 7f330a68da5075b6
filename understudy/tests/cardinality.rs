// vim: tw=80
//! Call-count semantics: implicit cardinality, one-shot chains, repeating
//! actions, and explicit overrides.

use understudy::*;

/// A bare expectation must be matched exactly once.
#[test]
fn default_cardinality_is_exactly_one() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().return_const(9).times(1);
    assert_eq!(9, ex.call(()));
    ex.verify();
}

/// An expectation with no actions and no explicit count still requires its
/// single match; the call itself is answered with the synthesized default.
#[test]
fn bare_expectation_matched_once_verifies() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect();
    assert_eq!(0, ex.call(()));
    ex.verify();
}

#[test]
#[should_panic(expected = "fewer than expected 1")]
fn default_cardinality_zero_calls_fails_at_teardown() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect();
}

#[test]
#[should_panic(expected = "more than expected 1")]
fn default_cardinality_second_call_fails() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().times(1).return_const(9);
    assert_eq!(9, ex.call(()));
    // Reported at the offending call; the call still yields a default.
    assert_eq!(0, ex.call(()));
    assert!(!ex.sink().is_clean());
}

/// will_once(A).will_once(B): first match runs A, second runs B, and the
/// third is a cardinality violation because no repeating action follows.
#[test]
#[should_panic(expected = "more than expected 2")]
fn one_shot_chain_defines_the_bounds() {
    let mut ex = Expectations::<(i32, i32), i32>::new();
    ex.expect()
        .will_once(action::return_const(1))
        .will_once(action::return_const(2));

    assert_eq!(1, ex.call((2, 3)));
    assert_eq!(2, ex.call((2, 3)));
    assert_eq!(0, ex.call((2, 3)));
}

/// will_repeatedly alone allows any number of matches, including zero.
#[test]
fn repeating_action_allows_zero_matches() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().will_repeatedly(action::return_const(1));
    ex.verify();
}

#[test]
fn repeating_action_allows_many_matches() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().will_repeatedly(action::return_const(1));
    assert_eq!(1, ex.call(()));
    assert_eq!(1, ex.call(()));
    assert_eq!(1, ex.call(()));
}

/// One-shots before a repeating action still set the minimum.
#[test]
#[should_panic(expected = "fewer than expected 1")]
fn one_shot_before_repeat_sets_the_minimum() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect()
        .will_once(action::return_const(1))
        .will_repeatedly(action::return_const(2));
}

#[test]
fn one_shots_then_repeat_runs_in_order() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect()
        .will_once(action::return_const(1))
        .will_repeatedly(action::return_const(2));
    assert_eq!(1, ex.call(()));
    assert_eq!(2, ex.call(()));
    assert_eq!(2, ex.call(()));
}

/// An explicit Times clause overrides the inference.
#[test]
fn explicit_times_overrides_inference() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().times(3).will_repeatedly(action::return_const(1));
    ex.call(());
    ex.call(());
    ex.call(());
    ex.verify();
}

#[test]
#[should_panic(expected = "fewer than expected 2")]
fn times_requires_the_minimum() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().times(2).return_const(1);
    ex.call(());
}

#[test]
fn never_with_no_calls_is_satisfied() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().never();
    ex.verify();
}

#[test]
#[should_panic(expected = "more than expected 0")]
fn never_with_a_call_fails() {
    let mut ex = Expectations::<(), i32>::new();
    ex.expect().never();
    assert_eq!(0, ex.call(()));
}
