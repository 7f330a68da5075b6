// vim: tw=80
//! Expectation and stub types.
//!
//! An [`Expectation`] is a declared constraint plus behavior for matching
//! calls: argument matcher, cardinality, ordering memberships, and an
//! ordered action queue.  A [`Stub`] is the unenforced variant: a matcher
//! and a single default action, never verified at teardown.
//!
//! The low-level `call` methods here keep strict semantics: any violation
//! panics at the offending call, with the failing predicate rendered as a
//! case tree.  The report-and-continue behavior lives in the registry
//! layer, which drives expectations through their `pub(crate)` dispatch
//! surface instead.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use fragile::Fragile;
use predicates::prelude::*;

use crate::{
    action::{self, Action, ActionQueue},
    cardinality::{Cardinality, QueueShape},
    diagnostic::{DiagnosticSink, Violation},
    matcher::{Matcher, UnsafeFnPredicate},
    sequence::{SeqHandle, Sequence, SequenceGraph},
};

/// State shared by every expectation type: everything except the result.
pub(crate) struct Common<I> {
    matcher: Matcher<I>,
    cardinality: Cardinality,
    memberships: Vec<SeqHandle>,
    sink: Option<DiagnosticSink>,
    name: String,
    verified: AtomicBool,
}

impl<I> Default for Common<I> {
    fn default() -> Self {
        Common {
            matcher: Matcher::default(),
            cardinality: Cardinality::default(),
            memberships: Vec::new(),
            sink: None,
            name: String::new(),
            verified: AtomicBool::new(false),
        }
    }
}

impl<I> Common<I> {
    /// Attach the owning method's display name and the mock's sink.  Set by
    /// registries at declaration.
    pub fn set_context(&mut self, name: String, sink: DiagnosticSink) {
        self.name = name;
        self.sink = Some(sink);
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Rendered context for diagnostics, e.g.
    /// `"MockUser::get_age: Expectation(var == 4)"`.
    pub fn context(&self) -> String {
        let m = self.matcher.describe();
        if self.name.is_empty() {
            format!("Expectation({m})")
        } else {
            format!("{}: Expectation({m})", self.name)
        }
    }

    pub fn matches(&self, i: &I) -> bool {
        self.matcher.matches(i)
    }

    pub fn verify_args(&self, i: &I) {
        self.matcher.verify(i)
    }

    pub fn set_matcher<P>(&mut self, p: P)
    where
        P: Predicate<I> + Send + 'static,
    {
        self.matcher = Matcher::new(p);
    }

    pub fn cardinality_mut(&mut self) -> &mut Cardinality {
        &mut self.cardinality
    }

    pub fn count(&self) -> usize {
        self.cardinality.count()
    }

    pub fn has_capacity(&self, shape: QueueShape) -> bool {
        self.cardinality.has_capacity(shape)
    }

    pub fn max(&self, shape: QueueShape) -> usize {
        self.cardinality.bounds(shape).1.unwrap_or(usize::MAX)
    }

    /// Record one match and push the new satisfaction state into every
    /// ordering membership.
    pub fn record_match(&self, shape: QueueShape) {
        self.cardinality.record();
        self.sync(shape);
    }

    pub fn sync(&self, shape: QueueShape) {
        let satisfied = self.cardinality.is_satisfied(shape);
        for h in &self.memberships {
            h.update(satisfied);
        }
    }

    pub fn attach(&mut self, h: SeqHandle) {
        self.memberships.push(h);
    }

    pub fn add_after(&mut self, prev: &SeqHandle) {
        if let Some(own) =
            self.memberships.iter().find(|h| h.in_graph(prev.graph()))
        {
            prev.link_before(own);
        } else {
            self.memberships.push(prev.successor());
        }
    }

    pub fn ensure_membership(&mut self) -> SeqHandle {
        if self.memberships.is_empty() {
            let graph = SequenceGraph::new();
            self.memberships.push(SeqHandle::fresh(&graph));
        }
        self.memberships[0].clone()
    }

    pub fn order_eligible(&self) -> bool {
        self.memberships.iter().all(SeqHandle::eligible)
    }

    /// `Some(violation)` if the minimum was not reached.  Marks the
    /// expectation verified so the check runs at most once.
    pub fn deficit_violation(&self, shape: QueueShape) -> Option<Violation> {
        if self.verified.swap(true, Ordering::Relaxed) {
            return None;
        }
        self.cardinality.deficit(shape).map(|(actual, min)| {
            Violation::TooFewCalls {
                method: self.context(),
                actual,
                min,
            }
        })
    }
}

/// Shared builder methods of the expectation types.  Must be invoked from
/// within an `impl` block that has `I` in scope and provides `fn sync`.
macro_rules! expectation_builder {
    () => {
        /// Add this expectation to a [`Sequence`].  Its predecessor is the
        /// expectation most recently added to the same sequence.
        pub fn in_sequence(&mut self, seq: &mut Sequence) -> &mut Self {
            self.common.attach(seq.next());
            self.sync();
            self
        }

        /// Require `prev`'s expectation to reach its minimum call count
        /// before this one may be matched.  Handles come from
        /// [`handle`](Self::handle).
        pub fn after(&mut self, prev: &SeqHandle) -> &mut Self {
            self.common.add_after(prev);
            self.sync();
            self
        }

        /// An ordering handle for this expectation, for use with
        /// [`after`](Self::after).
        pub fn handle(&mut self) -> SeqHandle {
            let h = self.common.ensure_membership();
            self.sync();
            h
        }

        /// Forbid this expectation from ever being matched.
        pub fn never(&mut self) -> &mut Self {
            self.common.cardinality_mut().never();
            self.sync();
            self
        }

        /// Require exactly one match.  Shortcut for `times(1)`.
        pub fn once(&mut self) -> &mut Self {
            self.times(1)
        }

        /// Require exactly `n` matches.
        pub fn times(&mut self, n: usize) -> &mut Self {
            self.common.cardinality_mut().n(n);
            self.sync();
            self
        }

        /// Allow any number of matches, including zero.
        pub fn times_any(&mut self) -> &mut Self {
            self.common.cardinality_mut().any();
            self.sync();
            self
        }

        /// Allow any number of matches within the given half-open range.
        pub fn times_range(&mut self, range: std::ops::Range<usize>)
            -> &mut Self
        {
            self.common.cardinality_mut().range(range);
            self.sync();
            self
        }

        /// Set the matching criterion for this expectation.  Only one
        /// matcher can be set at a time; use [`params!`](crate::params) to
        /// combine per-argument predicates.
        pub fn with<P>(&mut self, p: P) -> &mut Self
        where
            P: Predicate<I> + Send + 'static,
        {
            self.common.set_matcher(p);
            self
        }

        /// Set a matching function.  Equivalent to
        /// `with(predicate::function(f))`.
        pub fn withf<F>(&mut self, f: F) -> &mut Self
        where
            F: Fn(&I) -> bool + Send + 'static,
            I: 'static,
        {
            self.common.set_matcher(predicate::function(f));
            self
        }

        /// Like [`withf`](Self::withf), but it unsafely implements `Send`.
        /// Useful for methods with pointer arguments.
        ///
        /// # Safety
        ///
        /// The closure must be safe to send between threads even though it
        /// may close over raw pointers.  It is always safe in
        /// single-threaded tests.
        pub unsafe fn withf_unsafe<F>(&mut self, f: F) -> &mut Self
        where
            F: Fn(&I) -> bool + 'static,
            I: 'static,
        {
            self.common
                .set_matcher(UnsafeFnPredicate(predicate::function(f)));
            self
        }
    };
}

/// Expectation type for methods that return a `'static` value.
pub struct Expectation<I, O> {
    common: Common<I>,
    actions: Mutex<ActionQueue<I, O>>,
}

impl<I, O> Expectation<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    fn shape(&self) -> QueueShape {
        self.actions.lock().unwrap().shape()
    }

    fn sync(&self) {
        self.common.sync(self.shape());
    }

    /// Call this expectation as if it were the real method.
    ///
    /// This is the strict, low-level dispatch: mismatched arguments, an
    /// exceeded maximum, or an unsatisfied predecessor panic at the call.
    pub fn call(&self, args: I) -> O {
        self.common.verify_args(&args);
        let shape = self.shape();
        if !self.common.has_capacity(shape) {
            panic!(
                "{}",
                Violation::TooManyCalls {
                    method: self.common.context(),
                    actual: self.common.count() + 1,
                    max: self.common.max(shape),
                }
            );
        }
        if !self.common.order_eligible() {
            panic!(
                "{}",
                Violation::OutOfOrder { method: self.common.context() }
            );
        }
        self.common.record_match(shape);
        match self.actions.lock().unwrap().next(args) {
            Some(o) => o,
            None => panic!(
                "{}: must set a return value with returning, return_const, \
                 or will_once",
                self.common.context()
            ),
        }
    }

    /// Append a one-shot action, run for exactly one match.
    pub fn will_once(&mut self, a: Action<I, O>) -> &mut Self {
        self.actions.lock().unwrap().push_once(a);
        self.sync();
        self
    }

    /// Set the repeating action, run for every match after the one-shots
    /// are consumed.
    pub fn will_repeatedly(&mut self, a: Action<I, O>) -> &mut Self {
        self.actions.lock().unwrap().set_repeated(a);
        self.sync();
        self
    }

    /// Supply a closure that will provide the return value for every
    /// match.  The method's arguments are passed to the closure by value.
    pub fn returning<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(I) -> O + Send + 'static,
    {
        self.will_repeatedly(action::invoke(f))
    }

    /// Single-threaded version of [`returning`](Self::returning).  Can be
    /// used when the argument or return type isn't `Send`.
    ///
    /// It is a runtime error to call the mock method from a different
    /// thread than the one that originally called this method.
    pub fn returning_st<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(I) -> O + 'static,
    {
        self.will_repeatedly(action::invoke_st(f))
    }

    /// Return a copy of a constant value from every match.
    ///
    /// The compiler can't always infer the proper type to use with this
    /// method; you will usually need to specify it explicitly, i.e.
    /// `return_const(42i32)` instead of `return_const(42)`.
    pub fn return_const<C>(&mut self, c: C) -> &mut Self
    where
        C: Clone + Into<O> + Send + 'static,
    {
        self.will_repeatedly(action::invoke(move |_| c.clone().into()))
    }

    /// Supply an `FnOnce` closure that will provide the return value for
    /// one match.  This is useful for return types that aren't `Clone`.
    pub fn return_once<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(I) -> O + Send + 'static,
    {
        self.will_once(action::invoke_once(f))
    }

    /// Single-threaded version of [`return_once`](Self::return_once).
    /// This is useful for return types that are neither `Send` nor
    /// `Clone`.
    pub fn return_once_st<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(I) -> O + 'static,
    {
        self.will_once(action::invoke_once_st(f))
    }

    expectation_builder! {}

    // Registry-facing dispatch surface.

    pub(crate) fn matches(&self, i: &I) -> bool {
        self.common.matches(i)
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.common.has_capacity(self.shape())
    }

    pub(crate) fn order_eligible(&self) -> bool {
        self.common.order_eligible()
    }

    pub(crate) fn register_match(&self) {
        self.common.record_match(self.shape());
    }

    pub(crate) fn attach(&mut self, h: SeqHandle) {
        self.common.attach(h);
        self.sync();
    }

    pub(crate) fn has_action(&self) -> bool {
        self.actions.lock().unwrap().has_next()
    }

    pub(crate) fn run_action(&self, args: I) -> Option<O> {
        self.actions.lock().unwrap().next(args)
    }

    pub(crate) fn context(&self) -> String {
        self.common.context()
    }

    pub(crate) fn count(&self) -> usize {
        self.common.count()
    }

    pub(crate) fn max_allowed(&self) -> usize {
        self.common.max(self.shape())
    }

    pub(crate) fn set_context(&mut self, name: String, sink: DiagnosticSink) {
        self.common.set_context(name, sink);
    }

    pub(crate) fn deficit_violation(&self) -> Option<Violation> {
        self.common.deficit_violation(self.shape())
    }
}

impl<I, O> Default for Expectation<I, O> {
    fn default() -> Self {
        Expectation {
            common: Common::default(),
            actions: Mutex::new(ActionQueue::default()),
        }
    }
}

impl<I, O> Drop for Expectation<I, O> {
    fn drop(&mut self) {
        // Standalone expectations verify themselves; registry-owned ones
        // (sink attached) are verified by their collection.
        if !std::thread::panicking() && !self.common.has_sink() {
            if let Some(v) = self.deficit_violation() {
                panic!("{}", v);
            }
        }
    }
}

/// Expectation type for methods that take `&self` and return a reference
/// with the same lifetime as `self`.
///
/// The returned reference borrows storage owned by the expectation, so the
/// referent lives exactly as long as the mock that owns it.
pub struct RefExpectation<I, O> {
    common: Common<I>,
    result: Option<O>,
}

impl<I, O> RefExpectation<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    // Any number of matches may borrow the stored result; bounds then come
    // from an explicit `times`-family call, if any.
    fn shape(&self) -> QueueShape {
        QueueShape { one_shots: 0, has_repeat: true }
    }

    fn sync(&self) {
        self.common.sync(self.shape());
    }

    /// Call this expectation as if it were the real method.
    pub fn call(&self, args: I) -> &O {
        self.common.verify_args(&args);
        let shape = self.shape();
        if !self.common.has_capacity(shape) {
            panic!(
                "{}",
                Violation::TooManyCalls {
                    method: self.common.context(),
                    actual: self.common.count() + 1,
                    max: self.common.max(shape),
                }
            );
        }
        if !self.common.order_eligible() {
            panic!(
                "{}",
                Violation::OutOfOrder { method: self.common.context() }
            );
        }
        self.common.record_match(shape);
        self.borrow_result()
    }

    /// Return a reference to a constant value from this expectation.
    pub fn return_const(&mut self, o: O) -> &mut Self {
        self.result = Some(o);
        self.sync();
        self
    }

    expectation_builder! {}

    pub(crate) fn matches(&self, i: &I) -> bool {
        self.common.matches(i)
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.common.has_capacity(self.shape())
    }

    pub(crate) fn order_eligible(&self) -> bool {
        self.common.order_eligible()
    }

    pub(crate) fn register_match(&self) {
        self.common.record_match(self.shape());
    }

    pub(crate) fn attach(&mut self, h: SeqHandle) {
        self.common.attach(h);
        self.sync();
    }

    pub(crate) fn borrow_result(&self) -> &O {
        self.result.as_ref().expect(
            "Must set a return value with RefExpectation::return_const",
        )
    }

    pub(crate) fn context(&self) -> String {
        self.common.context()
    }

    pub(crate) fn count(&self) -> usize {
        self.common.count()
    }

    pub(crate) fn max_allowed(&self) -> usize {
        self.common.max(self.shape())
    }

    pub(crate) fn set_context(&mut self, name: String, sink: DiagnosticSink) {
        self.common.set_context(name, sink);
    }

    pub(crate) fn deficit_violation(&self) -> Option<Violation> {
        self.common.deficit_violation(self.shape())
    }
}

impl<I, O> Default for RefExpectation<I, O> {
    fn default() -> Self {
        RefExpectation { common: Common::default(), result: None }
    }
}

impl<I, O> Drop for RefExpectation<I, O> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.common.has_sink() {
            if let Some(v) = self.deficit_violation() {
                panic!("{}", v);
            }
        }
    }
}

/// Expectation type for methods that take `&mut self` and return a mutable
/// or immutable reference with the same lifetime as `self`.
pub struct RefMutExpectation<I, O> {
    common: Common<I>,
    result: Option<O>,
    rfunc: Option<Mutex<Box<dyn FnMut(I) -> O + Send>>>,
}

impl<I, O> RefMutExpectation<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    fn shape(&self) -> QueueShape {
        QueueShape { one_shots: 0, has_repeat: true }
    }

    fn sync(&self) {
        self.common.sync(self.shape());
    }

    /// Call this expectation as if it were the real method.
    pub fn call_mut(&mut self, args: I) -> &mut O {
        self.common.verify_args(&args);
        let shape = self.shape();
        if !self.common.has_capacity(shape) {
            panic!(
                "{}",
                Violation::TooManyCalls {
                    method: self.common.context(),
                    actual: self.common.count() + 1,
                    max: self.common.max(shape),
                }
            );
        }
        if !self.common.order_eligible() {
            panic!(
                "{}",
                Violation::OutOfOrder { method: self.common.context() }
            );
        }
        self.common.record_match(shape);
        self.recompute(args)
    }

    /// Convenience method that can be used to supply a return value.  The
    /// value will be returned by mutable reference.
    pub fn return_var(&mut self, o: O) -> &mut Self {
        self.result = Some(o);
        self.sync();
        self
    }

    /// Supply a closure used to recompute the referent on every match.
    pub fn returning<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(I) -> O + Send + 'static,
    {
        self.rfunc = Some(Mutex::new(Box::new(f)));
        self.sync();
        self
    }

    /// Single-threaded version of [`returning`](Self::returning).  Can be
    /// used when the argument or return type isn't `Send`.
    pub fn returning_st<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(I) -> O + 'static,
    {
        let mut fragile = Fragile::new(f);
        self.returning(move |i| (fragile.get_mut())(i))
    }

    expectation_builder! {}

    pub(crate) fn matches(&self, i: &I) -> bool {
        self.common.matches(i)
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.common.has_capacity(self.shape())
    }

    pub(crate) fn order_eligible(&self) -> bool {
        self.common.order_eligible()
    }

    pub(crate) fn register_match(&self) {
        self.common.record_match(self.shape());
    }

    pub(crate) fn attach(&mut self, h: SeqHandle) {
        self.common.attach(h);
        self.sync();
    }

    pub(crate) fn recompute(&mut self, args: I) -> &mut O {
        if let Some(m) = self.rfunc.as_mut() {
            let o = (m.get_mut().unwrap())(args);
            self.result = Some(o);
        }
        self.result.as_mut().expect(
            "Must set a return value with RefMutExpectation::returning or \
             return_var",
        )
    }

    pub(crate) fn context(&self) -> String {
        self.common.context()
    }

    pub(crate) fn count(&self) -> usize {
        self.common.count()
    }

    pub(crate) fn max_allowed(&self) -> usize {
        self.common.max(self.shape())
    }

    pub(crate) fn set_context(&mut self, name: String, sink: DiagnosticSink) {
        self.common.set_context(name, sink);
    }

    pub(crate) fn deficit_violation(&self) -> Option<Violation> {
        self.common.deficit_violation(self.shape())
    }
}

impl<I, O> Default for RefMutExpectation<I, O> {
    fn default() -> Self {
        RefMutExpectation {
            common: Common::default(),
            result: None,
            rfunc: None,
        }
    }
}

impl<I, O> Drop for RefMutExpectation<I, O> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.common.has_sink() {
            if let Some(v) = self.deficit_violation() {
                panic!("{}", v);
            }
        }
    }
}

/// A default behavior for a method: matcher plus one action, with no
/// cardinality enforcement and no teardown verification.
///
/// Stubs answer calls that no enforced expectation claims.  Declaring a
/// stub that is never matched is not an error.
pub struct Stub<I, O> {
    matcher: Matcher<I>,
    action: Mutex<Option<Action<I, O>>>,
}

impl<I, O> Stub<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the matching criterion for this stub.
    pub fn with<P>(&mut self, p: P) -> &mut Self
    where
        P: Predicate<I> + Send + 'static,
    {
        self.matcher = Matcher::new(p);
        self
    }

    /// Set a matching function for this stub.
    pub fn withf<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&I) -> bool + Send + 'static,
        I: 'static,
    {
        self.matcher = Matcher::new(predicate::function(f));
        self
    }

    /// Set the default action.
    pub fn will(&mut self, a: Action<I, O>) -> &mut Self {
        *self.action.lock().unwrap() = Some(a);
        self
    }

    /// Answer matching calls with a closure over the arguments.
    pub fn returning<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(I) -> O + Send + 'static,
    {
        self.will(action::invoke(f))
    }

    /// Single-threaded version of [`returning`](Self::returning).
    pub fn returning_st<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(I) -> O + 'static,
    {
        self.will(action::invoke_st(f))
    }

    /// Answer matching calls with a copy of a constant value.
    pub fn return_const<C>(&mut self, c: C) -> &mut Self
    where
        C: Clone + Into<O> + Send + 'static,
    {
        self.will(action::invoke(move |_| c.clone().into()))
    }

    pub(crate) fn matches(&self, i: &I) -> bool {
        self.matcher.matches(i)
    }

    pub(crate) fn has_action(&self) -> bool {
        self.action.lock().unwrap().is_some()
    }

    pub(crate) fn run(&self, args: I) -> O {
        self.action
            .lock()
            .unwrap()
            .as_mut()
            .expect("Stub has no action")
            .call(args)
    }
}

impl<I, O> Default for Stub<I, O> {
    fn default() -> Self {
        Stub {
            matcher: Matcher::default(),
            action: Mutex::new(None),
        }
    }
}
