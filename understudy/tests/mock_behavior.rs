// vim: tw=80
//! A hand-written mock built from per-method collections, exercising stubs,
//! expectations, actions, and ordering end to end.

use std::sync::{Arc, Mutex as StdMutex};

use understudy::*;

#[derive(Clone, Debug, PartialEq)]
struct Boat {
    speed: i32,
}

impl Default for Boat {
    fn default() -> Self {
        Boat { speed: 11 }
    }
}

trait User {
    fn get_age(&self) -> i32;
    fn get_boat(&self) -> Boat;
    fn boat_ref(&self) -> &Boat;
    fn get_name(&self) -> String;
    fn fill_name(&self, name: &mut String);
    fn get_sum(&self, x: i32, y: i32) -> i32;
    fn take_num(&self, x: i32);
}

#[derive(Default)]
struct MockUser {
    get_age: Expectations<(), i32>,
    get_boat: Expectations<(), Boat>,
    boat_ref: RefExpectations<(), Boat>,
    get_name: Expectations<(), String>,
    // Reference arguments cross the dispatch boundary as pointers, so the
    // expectation type stays free of borrows.
    fill_name: Expectations<(*mut String,), ()>,
    get_sum: Expectations<(i32, i32), i32>,
    take_num: Expectations<(i32,), ()>,
}

impl User for MockUser {
    fn get_age(&self) -> i32 {
        self.get_age.call(())
    }
    fn get_boat(&self) -> Boat {
        self.get_boat.call(())
    }
    fn boat_ref(&self) -> &Boat {
        self.boat_ref.call(())
    }
    fn get_name(&self) -> String {
        self.get_name.call(())
    }
    fn fill_name(&self, name: &mut String) {
        self.fill_name.call((name as *mut String,))
    }
    fn get_sum(&self, x: i32, y: i32) -> i32 {
        self.get_sum.call((x, y))
    }
    fn take_num(&self, x: i32) {
        self.take_num.call((x,))
    }
}

/// A stub that is never matched is not an error.
#[test]
fn stub_not_called() {
    let mut user = MockUser::default();
    user.get_age.stub().return_const(-1);
}

/// A stub answers any number of calls with its action.
#[test]
fn stub_called_many_times() {
    let mut user = MockUser::default();
    user.get_age.stub().return_const(-1);

    assert_eq!(-1, user.get_age());
    assert_eq!(-1, user.get_age());
    assert_eq!(-1, user.get_age());
}

#[test]
#[should_panic(expected = "fewer than expected 1")]
fn expectation_not_called() {
    let mut user = MockUser::default();
    user.get_age
        .expect()
        .times(1)
        .will_repeatedly(action::return_const(1));
}

#[test]
fn repeating_expectation_called_many_times() {
    let mut user = MockUser::default();
    user.get_age.expect().will_repeatedly(action::return_const(1));

    assert_eq!(1, user.get_age());
    assert_eq!(1, user.get_age());
    assert_eq!(1, user.get_age());
}

#[test]
#[should_panic(expected = "more than expected 1")]
fn one_shot_expectation_called_more_than_once() {
    let mut user = MockUser::default();
    user.get_age.expect().will_once(action::return_const(1));

    assert_eq!(1, user.get_age());
    assert_eq!(0, user.get_age());
    assert_eq!(0, user.get_age());
}

#[test]
fn return_by_ref() {
    let mut user = MockUser::default();
    user.boat_ref.expect().return_const(Boat { speed: 12 });

    let boat = user.boat_ref();
    assert_eq!(12, boat.speed);
}

/// Overwrite the caller's argument with a fixed value.
#[test]
fn set_arg_referee() {
    let mut user = MockUser::default();
    user.fill_name.expect().will_once(do_all(
        vec![set_arg_ptr!(0, String::from("bill"))],
        action::return_const(()),
    ));

    let mut outarg = String::from("james");
    user.fill_name(&mut outarg);
    assert_eq!("bill", outarg);
}

/// Call a function instead of the real method and return its result.
#[test]
fn invoke_func_and_return_its_result() {
    let return_one = || 1;

    let mut user = MockUser::default();
    user.get_age
        .expect()
        .will_once(action::invoke(move |_| return_one()));

    assert_eq!(1, user.get_age());
}

/// Feed selected arguments of the mocked method to a different function.
#[test]
fn invoke_func_with_selected_args() {
    let mult = |x: i32, y: i32| x * y;

    let mut user = MockUser::default();
    user.get_sum.expect().will_repeatedly(with_args!(mult, 0, 1));

    assert_eq!(6, user.get_sum(2, 3));
    assert_eq!(28, user.get_sum(7, 4));
}

#[test]
fn invoke_void_func_with_selected_args() {
    let age = Arc::new(StdMutex::new(0));
    let a2 = age.clone();
    let setter = move |x: i32| {
        *a2.lock().unwrap() = x;
    };

    let mut user = MockUser::default();
    user.take_num.expect().will_repeatedly(with_args!(setter, 0));

    user.take_num(7);
    assert_eq!(7, *age.lock().unwrap());
}

#[test]
fn will_twice() {
    let mut user = MockUser::default();
    user.get_sum
        .expect()
        .will_once(action::return_const(1))
        .will_once(action::return_const(2));

    assert_eq!(1, user.get_sum(2, 3));
    assert_eq!(2, user.get_sum(2, 3));
}

/// No uninteresting-call warning from a nice mock.
#[test]
fn nice_mock() {
    let mut user = MockUser::default();
    user.get_sum.set_strictness(Strictness::Nice);

    assert_eq!(0, user.get_sum(2, 3));
    assert!(user.get_sum.sink().records().is_empty());
}

/// The uninteresting call fails a strict mock's test.
#[test]
#[should_panic(expected = "uninteresting call")]
fn strict_mock() {
    let mut user = MockUser::default();
    user.get_sum.set_strictness(Strictness::Strict);

    assert_eq!(0, user.get_sum(2, 3));
}

#[test]
#[should_panic(expected = "method sequence violation")]
fn order_of_calls_fails() {
    let mut user = MockUser::default();

    let fst = user.get_name.expect().times(1).return_const("bob").handle();
    user.get_age.expect().times(1).return_const(4).after(&fst);

    // get_age before get_name: reported, but the call completes.
    assert_eq!(4, user.get_age());
    assert_eq!("bob", user.get_name());
}

#[test]
fn order_of_calls_passes() {
    let mut user = MockUser::default();

    let fst = user.get_name.expect().times(1).return_const("bob").handle();
    user.get_age.expect().times(1).return_const(4).after(&fst);

    assert_eq!("bob", user.get_name());
    assert_eq!(4, user.get_age());
}

#[test]
#[should_panic(expected = "method sequence violation")]
fn order_in_sequence_fails() {
    let mut user = MockUser::default();
    {
        let _s = InSequence::new();
        user.get_name.expect().times(1).return_const("bob");
        user.get_age.expect().times(1).return_const(4);
    }

    assert_eq!(4, user.get_age());
    assert_eq!("bob", user.get_name());
}

#[test]
fn order_in_sequence_passes() {
    let mut user = MockUser::default();
    {
        let _s = InSequence::new();
        user.get_name.expect().times(1).return_const("bob");
        user.get_age.expect().times(1).return_const(4);
    }

    assert_eq!("bob", user.get_name());
    assert_eq!(4, user.get_age());
}

/// An unconfigured method on a hand-written mock synthesizes the default,
/// including for user-defined value types.
#[test]
fn unconfigured_method_returns_default() {
    let mut user = MockUser::default();
    user.get_boat.set_strictness(Strictness::Nice);

    assert_eq!(Boat { speed: 11 }, user.get_boat());
}
