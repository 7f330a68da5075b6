// vim: tw=80
//! Low-level Expectation behavior: matching, call counts, and manual mock
//! structs built from bare expectations.

use understudy::*;

#[test]
fn match_eq_ok() {
    let mut e = Expectation::<i32, ()>::default();
    e.returning(|_| ());
    e.with(predicate::eq(5));
    e.call(5);
}

#[test]
#[should_panic(expected = "Expectation didn't match arguments")]
fn match_eq_fail() {
    let mut e = Expectation::<i32, ()>::default();
    e.returning(|_| ());
    e.with(predicate::eq(4));
    e.call(5);
}

#[test]
fn match_fn_ok() {
    let mut e = Expectation::<i32, ()>::default();
    e.returning(|_| ());
    e.withf(|x: &i32| *x == 5);
    e.call(5);
}

#[test]
#[should_panic(expected = "Expectation didn't match arguments")]
fn match_fn_fail() {
    let mut e = Expectation::<i32, ()>::default();
    e.returning(|_| ());
    e.withf(|x: &i32| *x == 6);
    e.call(5);
}

#[test]
fn match_tuple_params() {
    let mut e = Expectation::<(u32, u32), ()>::default();
    e.returning(|_| ());
    e.with(params!(predicate::eq(42), predicate::eq(43)));
    e.call((42, 43));
}

/// A stateful closure works like a method that takes &mut self.
#[test]
fn mutable_closure_state() {
    let mut e = Expectation::<i32, i32>::default();
    let mut count = 0;
    e.returning(move |x| {
        count += x;
        count
    });
    assert_eq!(5, e.call(5));
    assert_eq!(10, e.call(5));
}

#[test]
fn no_args_or_returns() {
    let mut e = Expectation::<(), ()>::default();
    e.returning(|_| ());
    e.call(());
}

#[test]
fn never_ok() {
    let mut e = Expectation::<(), ()>::default();
    e.returning(|_| ());
    e.never();
}

#[test]
#[should_panic(expected = "called 1 time(s) which is more than expected 0")]
fn never_fail() {
    let mut e = Expectation::<(), ()>::default();
    e.returning(|_| ());
    e.never();
    e.call(());
}

#[test]
fn return_once_moves_a_non_clone_value() {
    struct NonClone();
    let mut e = Expectation::<(), NonClone>::default();
    let r = NonClone();
    e.return_once(move |_| r);
    e.call(());
}

#[test]
#[should_panic(expected = "more than expected 1")]
fn return_once_called_twice() {
    let mut e = Expectation::<(), u32>::default();
    e.return_once(|_| 42);
    e.call(());
    e.call(());
}

#[test]
fn return_once_st_for_non_send_values() {
    use std::rc::Rc;
    let r = Rc::new(42u32);
    let mut e = Expectation::<(), Rc<u32>>::default();
    e.return_once_st(move |_| r);
    assert_eq!(42, *e.call(()));
}

#[test]
fn returning_st_for_non_send_closures() {
    use std::{cell::Cell, rc::Rc};
    let count = Rc::new(Cell::new(0));
    let c2 = count.clone();
    let mut e = Expectation::<i32, i32>::default();
    e.returning_st(move |x| {
        c2.set(c2.get() + x);
        c2.get()
    });
    assert_eq!(5, e.call(5));
    assert_eq!(10, e.call(5));
    assert_eq!(10, count.get());
}

#[test]
#[should_panic(expected = "fewer than expected 1")]
fn unsatisfied_minimum_panics_at_drop() {
    let mut e = Expectation::<(), ()>::default();
    e.returning(|_| ());
    e.times(1);
}

#[test]
#[should_panic(expected = "must set a return value")]
fn no_action_configured() {
    let e = Expectation::<(), u32>::default();
    e.call(());
}

#[test]
fn times_range_within_bounds() {
    let mut e = Expectation::<(), ()>::default();
    e.returning(|_| ());
    e.times_range(1..3);
    e.call(());
    e.call(());
}

#[test]
#[should_panic(expected = "more than expected 2")]
fn times_range_exceeded() {
    let mut e = Expectation::<(), ()>::default();
    e.returning(|_| ());
    e.times_range(1..3);
    e.call(());
    e.call(());
    e.call(());
}

/// A mock struct has two different methods with the same name, from
/// different traits.  The engine doesn't care; the struct just needs
/// distinct field names for the two expectations.
mod name_conflict {
    use super::*;

    trait Foo {
        fn meth(&self) -> u32;
    }
    trait Bar {
        fn meth(&self) -> u32;
    }

    #[derive(Default)]
    struct MockA {
        foo_meth: Expectation<(), u32>,
        bar_meth: Expectation<(), u32>,
    }
    impl MockA {
        fn expect_foo_meth(&mut self) -> &mut Expectation<(), u32> {
            self.foo_meth = Expectation::new();
            &mut self.foo_meth
        }
        fn expect_bar_meth(&mut self) -> &mut Expectation<(), u32> {
            self.bar_meth = Expectation::new();
            &mut self.bar_meth
        }
    }
    impl Foo for MockA {
        fn meth(&self) -> u32 {
            self.foo_meth.call(())
        }
    }
    impl Bar for MockA {
        fn meth(&self) -> u32 {
            self.bar_meth.call(())
        }
    }

    #[test]
    fn t() {
        let mut mock = MockA::default();
        mock.expect_foo_meth().returning(|_| 5);
        mock.expect_bar_meth().returning(|_| 6);
        assert_eq!(5, Foo::meth(&mock));
        assert_eq!(6, Bar::meth(&mock));
    }
}
