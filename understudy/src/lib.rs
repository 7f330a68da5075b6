// vim: tw=80
//! An expectation-based mock engine for Rust.
//!
//! Understudy provides the runtime half of a mock object library: declare
//! expectations on a method, dispatch invocations against them, and verify
//! call counts and ordering at teardown.  There is no code generation
//! here; mock structs are written by hand, either by embedding an
//! [`Expectations`] collection per method, or by forwarding every method
//! through a type-erased [`Mock`] store.
//!
//! The basic idea:
//! * Create a mock struct whose methods forward to the engine.
//! * In your test, set expectations on it.  Each expectation can have
//!   argument matchers, a required call count, actions to perform on each
//!   match, and a required position relative to other expectations.
//! * Supply the mock object to the code that you're testing.  It will
//!   return the preprogrammed values supplied in the previous step.
//! * When the mock is dropped, every expectation that wasn't satisfied is
//!   reported, and the accumulated failures surface as a panic.
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Return values and actions`](#return-values-and-actions)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Call counts`](#call-counts)
//! * [`Stubs`](#stubs)
//! * [`Ordering`](#ordering)
//! * [`Strictness`](#strictness)
//! * [`Output arguments`](#output-arguments)
//! * [`Reference return values`](#reference-return-values)
//! * [`Checkpoints`](#checkpoints)
//!
//! ## Getting started
//! ```
//! use understudy::*;
//!
//! struct MockThermostat(Mock);
//!
//! impl MockThermostat {
//!     fn new() -> Self {
//!         MockThermostat(Mock::new("MockThermostat"))
//!     }
//!     fn temperature(&self) -> i32 {
//!         self.0.call("temperature", ())
//!     }
//! }
//!
//! let mut mock = MockThermostat::new();
//! mock.0.expect::<(), i32>("temperature")
//!     .times(1)
//!     .return_const(21i32);
//! assert_eq!(21, mock.temperature());
//! ```
//!
//! ## Return values and actions
//!
//! Each match of an expectation runs one action.  One-shot actions
//! declared with [`will_once`](Expectation::will_once) run in declaration
//! order; after they are consumed, the action declared with
//! [`will_repeatedly`](Expectation::will_repeatedly) runs for every
//! further match.  [`returning`](Expectation::returning) and
//! [`return_const`](Expectation::return_const) are shorthand for a
//! repeating closure or constant, and
//! [`return_once`](Expectation::return_once) for a one-shot `FnOnce`,
//! which is useful for return types that aren't `Clone`:
//!
//! ```
//! use understudy::*;
//!
//! let mut ex = Expectations::<(u32, u32), u32>::new();
//! ex.expect()
//!     .will_once(action::return_const(1u32))
//!     .will_once(action::return_const(2u32));
//! assert_eq!(1, ex.call((2, 3)));
//! assert_eq!(2, ex.call((2, 3)));
//! ```
//!
//! A closure action receives the invocation's arguments by value;
//! [`with_args!`](with_args) selects a subset of positions first:
//!
//! ```
//! use understudy::*;
//!
//! let mut ex = Expectations::<(u32, u32), u32>::new();
//! ex.expect()
//!     .will_repeatedly(with_args!(|x: u32, y: u32| x * y, 0, 1));
//! assert_eq!(6, ex.call((2, 3)));
//! assert_eq!(28, ex.call((7, 4)));
//! ```
//!
//! ## Matching arguments
//!
//! A matcher is anything that implements the [`Predicate`] trait, over the
//! whole argument tuple.  [`withf`](Expectation::withf) is shorthand for
//! the commonly used function predicate, and [`params!`](params) combines
//! one predicate per argument:
//!
//! ```
//! use understudy::*;
//!
//! let mut ex = Expectations::<(u32, u32), ()>::new();
//! ex.expect()
//!     .with(params!(predicate::eq(42), predicate::eq(43)))
//!     .return_const(());
//! ex.call((42, 43));
//! ```
//!
//! Matchers also discriminate between invocations of the same method.  On
//! a call, expectations are evaluated latest-declared-first and the first
//! eligible one is used, so later declarations override earlier, more
//! general ones:
//!
//! ```
//! use understudy::*;
//!
//! let mut ex = Expectations::<(String,), Option<u32>>::new();
//! ex.expect()
//!     .return_const(None::<u32>);
//! ex.expect()
//!     .with(predicate::eq(("something.txt".to_owned(),)))
//!     .return_const(Some(5));
//!
//! assert_eq!(Some(5), ex.call(("something.txt".to_owned(),)));
//! assert_eq!(None, ex.call(("other.txt".to_owned(),)));
//! ```
//!
//! ## Call counts
//!
//! Without an explicit count, the cardinality is inferred: a bare
//! expectation must be matched exactly once, `n` one-shot actions require
//! exactly `n` matches, and a repeating action allows any number.
//! [`times`](Expectation::times), [`times_range`](Expectation::times_range),
//! [`times_any`](Expectation::times_any), and
//! [`never`](Expectation::never) override the inference.  Exceeding the
//! maximum is reported at the offending call; falling short is reported at
//! teardown.
//!
//! ## Stubs
//!
//! A [`Stub`] supplies a default behavior with no cardinality enforcement:
//! it may be matched any number of times, including zero, and is never
//! verified.  Stubs answer calls that no enforced expectation claims, and
//! also lend their action to a matched expectation that has none:
//!
//! ```
//! use understudy::*;
//!
//! let mut ex = Expectations::<(), i32>::new();
//! ex.stub().return_const(-1);
//! assert_eq!(-1, ex.call(()));
//! assert_eq!(-1, ex.call(()));
//! ```
//!
//! ## Ordering
//!
//! Expectations may be ordered explicitly, requiring one to be satisfied
//! before another is matched, or ambiently with an [`InSequence`] guard,
//! which orders every expectation declared while it is live.  Ordering
//! constraints form a DAG; declaring a cycle panics.
//!
//! ```
//! use understudy::*;
//!
//! let mut first = Expectations::<(), String>::named("MockUser::get_name");
//! let mut second = Expectations::<(), i32>::named("MockUser::get_age");
//!
//! let fst = first.expect().return_const("bob".to_owned()).times(1).handle();
//! second.expect().return_const(4).times(1).after(&fst);
//!
//! first.call(());
//! second.call(());
//! ```
//!
//! ## Strictness
//!
//! A call that matches nothing still completes, returning the type's
//! synthesized default: zero for numeric types, `false` for `bool`, `None`
//! for options, an empty `String`, or the default-constructed value.  How
//! loudly that happens is the mock's strictness: by default the call is
//! recorded as a warning, a *nice* mock stays silent, and a *strict* mock
//! fails the test.  See [`Strictness`].
//!
//! ## Output arguments
//!
//! Mutable-reference and pointer positions in the argument tuple can be
//! written by side-effect actions, combined with a returning action via
//! [`do_all`]:
//!
//! ```
//! use understudy::*;
//!
//! let mut name = String::from("james");
//! {
//!     let mut ex = Expectations::<(&mut String,), ()>::new();
//!     ex.expect()
//!         .will_once(do_all(vec![set_arg!(0, String::from("bill"))],
//!                           action::return_const(())));
//!     ex.call((&mut name,));
//! }
//! assert_eq!("bill", name);
//! ```
//!
//! ## Reference return values
//!
//! Methods returning references use [`RefExpectation`] or
//! [`RefMutExpectation`], which own the storage the returned reference
//! borrows:
//!
//! ```
//! use understudy::*;
//!
//! struct Thing(u32);
//!
//! let mut ex = RefExpectations::<(u32,), Thing>::new();
//! ex.expect().return_const(Thing(42));
//! assert_eq!(42, ex.call((0,)).0);
//! ```
//!
//! ## Checkpoints
//!
//! Sometimes it's useful to validate all expectations mid-test, throw them
//! away, and add new ones.  Every collection and every [`Mock`] has a
//! `checkpoint` method: it verifies all current expectations immediately,
//! then clears them.  Stubs survive a checkpoint.

#![cfg_attr(feature = "nightly", feature(specialization))]
#![cfg_attr(feature = "nightly", allow(incomplete_features))]

pub mod action;
mod cardinality;
mod diagnostic;
mod matcher;
mod registry;
mod sequence;
mod synthesize;

mod expectation;

pub use predicates::prelude::{predicate, Predicate};

pub use crate::{
    action::{do_all, mutate, mutate_st, Action, SideEffect},
    diagnostic::{
        ConfigurationError, Diagnostic, DiagnosticSink, Severity, Violation,
    },
    expectation::{Expectation, RefExpectation, RefMutExpectation, Stub},
    matcher::UnsafeFnPredicate,
    registry::{
        AnyExpectations, Expectations, MethodKey, Mock, RefExpectations,
        RefMutExpectations, Strictness,
    },
    sequence::{InSequence, SeqHandle, Sequence, SequenceGraph},
    synthesize::Synthesize,
};

/// Check separate [`Predicate`]s for each argument of a method.  Used with
/// [`with`](Expectation::with).
///
/// # Examples
/// ```
/// use understudy::*;
///
/// let mut ex = Expectations::<(u32, u32), ()>::new();
/// ex.expect()
///     .with(params!(predicate::eq(42), predicate::eq(43)))
///     .return_const(());
///
/// ex.call((42, 43));
/// ```
#[macro_export]
macro_rules! params {
    ($p0:expr) => {
        $crate::predicate::function(move |(x0,)| $p0.eval(x0))
    };
    ($p0:expr, $p1:expr) => {
        $crate::predicate::function(move |(x0, x1)|
            $p0.eval(x0) && $p1.eval(x1))
    };
    ($p0:expr, $p1:expr, $p2:expr) => {
        $crate::predicate::function(move |(x0, x1, x2)|
            $p0.eval(x0) && $p1.eval(x1) && $p2.eval(x2))
    };
    ($p0:expr, $p1:expr, $p2:expr, $p3:expr) => {
        $crate::predicate::function(move |(x0, x1, x2, x3)|
            $p0.eval(x0) && $p1.eval(x1) && $p2.eval(x2) && $p3.eval(x3))
    };
}

/// An action that invokes a function with a selected subset of the
/// invocation's arguments, in the given order, and propagates its result.
///
/// # Examples
/// ```
/// use understudy::*;
///
/// let mut ex = Expectations::<(i32, i32), i32>::new();
/// ex.expect()
///     .will_repeatedly(with_args!(|x: i32, y: i32| x * y, 0, 1));
/// assert_eq!(6, ex.call((2, 3)));
/// ```
#[macro_export]
macro_rules! with_args {
    ($f:expr, $($idx:tt),+) => {{
        let mut f = $f;
        $crate::action::invoke(move |args| f($(args.$idx),+))
    }};
}

/// A side effect that assigns a fixed value through the `&mut`-typed
/// argument at the given position.
///
/// # Examples
/// ```
/// use understudy::*;
///
/// let mut out = 0i32;
/// {
///     let mut ex = Expectations::<(&mut i32,), ()>::new();
///     ex.expect()
///         .will_once(do_all(vec![set_arg!(0, 5)],
///                           action::return_const(())));
///     ex.call((&mut out,));
/// }
/// assert_eq!(5, out);
/// ```
#[macro_export]
macro_rules! set_arg {
    ($idx:tt, $value:expr) => {{
        let value = $value;
        $crate::action::mutate(move |args| {
            *args.$idx = value.clone();
        })
    }};
}

/// A side effect that writes a fixed value through the pointer-typed
/// argument at the given position.
///
/// The enclosing mock method is responsible for the pointer being valid
/// and exclusive for the duration of the call, which is what a generated
/// forwarding surface guarantees by construction.
#[macro_export]
macro_rules! set_arg_ptr {
    ($idx:tt, $value:expr) => {{
        let value = $value;
        $crate::action::mutate(move |args| unsafe {
            *args.$idx = value.clone();
        })
    }};
}
