// vim: tw=80
//! Argument matching for expectations.

use core::fmt::{self, Display};

use predicates::prelude::*;
use predicates_tree::CaseTreeExt;

use std::sync::Mutex;

/// Decides whether an invocation's arguments satisfy an expectation's
/// constraint.
///
/// A matcher wraps a single [`Predicate`] over the whole argument tuple.
/// The default matcher is the wildcard, which accepts anything.  Positional
/// per-argument predicates are combined into a tuple predicate with the
/// [`params!`](crate::params) macro.
pub(crate) struct Matcher<I>(Mutex<Box<dyn Predicate<I> + Send>>);

impl<I> Matcher<I> {
    pub fn new<P: Predicate<I> + Send + 'static>(p: P) -> Self {
        Matcher(Mutex::new(Box::new(p)))
    }

    pub fn matches(&self, i: &I) -> bool {
        self.0.lock().unwrap().eval(i)
    }

    /// Panic with the rendered case tree if the arguments don't match.
    /// Used by the low-level expectation types; registry dispatch filters
    /// with [`matches`](Self::matches) instead.
    pub fn verify(&self, i: &I) {
        if let Some(case) = self.0.lock().unwrap().find_case(false, i) {
            panic!("Expectation didn't match arguments:\n{}", case.tree());
        }
    }

    /// Rendered form of the predicate, for diagnostics.
    pub fn describe(&self) -> String {
        self.0.lock().unwrap().to_string()
    }
}

impl<I> Default for Matcher<I> {
    fn default() -> Self {
        Matcher::new(predicates::constant::always())
    }
}

/// Like `predicates::function::FnPredicate`, but unsafely implements
/// `Send`.  Useful for methods with pointer arguments.  The onus is on the
/// user to ensure that it can be safely sent between threads.
pub struct UnsafeFnPredicate<F, T>(
    pub(crate) predicates::function::FnPredicate<F, T>,
)
where
    F: Fn(&T) -> bool,
    T: ?Sized;

impl<F, T> Display for UnsafeFnPredicate<F, T>
where
    F: Fn(&T) -> bool,
    T: ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<F, T> predicates::reflection::PredicateReflection
    for UnsafeFnPredicate<F, T>
where
    F: Fn(&T) -> bool,
    T: ?Sized,
{
}

impl<F, T> Predicate<T> for UnsafeFnPredicate<F, T>
where
    F: Fn(&T) -> bool,
    T: ?Sized,
{
    fn eval(&self, var: &T) -> bool {
        self.0.eval(var)
    }
}

unsafe impl<F, T> Send for UnsafeFnPredicate<F, T>
where
    F: Fn(&T) -> bool,
    T: ?Sized,
{
}
