// vim: tw=80
//! Per-method expectation collections and the type-erased mock store.
//!
//! An [`Expectations`] collection owns every expectation and stub declared
//! for one mocked method, in declaration order, and dispatches invocations
//! against them.  A [`Mock`] bundles one collection per method behind a
//! type-erased store, together with the instance's strictness and
//! diagnostic sink.
//!
//! Dispatch selects among matching expectations latest-declared-first, so a
//! later, more specific declaration overrides an earlier, more general one.
//! Expectations whose call count is exhausted are skipped in favor of
//! earlier ones with remaining capacity.  Violations are recorded in the
//! sink and the call completes with the best available behavior, so a
//! single violation doesn't abort the rest of the test body.

use std::{any, collections::hash_map::HashMap, thread};

use downcast::{downcast, Any};

use crate::{
    diagnostic::{DiagnosticSink, Violation},
    expectation::{Expectation, RefExpectation, RefMutExpectation, Stub},
    sequence::ambient_handles,
    synthesize::Synthesize,
};

/// How a mock treats calls that match no expectation and no stub.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Synthesize a default result and record a warning.
    #[default]
    Default,
    /// Synthesize a default result silently.
    Nice,
    /// Synthesize a default result and fail the test at verification.
    Strict,
}

/// A collection of [`Expectation`]s and [`Stub`]s for one mocked method.
pub struct Expectations<I, O> {
    expectations: Vec<Expectation<I, O>>,
    stubs: Vec<Stub<I, O>>,
    name: String,
    strictness: Strictness,
    prefer_stubs: bool,
    sink: DiagnosticSink,
}

impl<I, O> Expectations<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection that renders `name` in its diagnostics, conventionally
    /// `"MockType::method"`.
    pub fn named(name: impl Into<String>) -> Self {
        let mut ex = Self::default();
        ex.name = name.into();
        ex
    }

    /// The unmatched-call policy for this method.
    pub fn set_strictness(&mut self, strictness: Strictness) {
        self.strictness = strictness;
    }

    /// When expectations and stubs both match a call, stubs normally lose.
    /// Flipping this prefers the stub's default action for the overlap.
    pub fn prefer_stubs(&mut self, prefer: bool) {
        self.prefer_stubs = prefer;
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub(crate) fn share_sink(&mut self, sink: DiagnosticSink) {
        self.sink = sink;
    }

    fn label(&self) -> String {
        if self.name.is_empty() {
            "mock method".to_owned()
        } else {
            self.name.clone()
        }
    }

    /// Create a new enforced expectation for this method.  If any
    /// [`InSequence`](crate::InSequence) guard is live on this thread, the
    /// expectation joins its sequence.
    pub fn expect(&mut self) -> &mut Expectation<I, O> {
        let mut e = Expectation::default();
        e.set_context(self.label(), self.sink.clone());
        for h in ambient_handles() {
            e.attach(h);
        }
        self.expectations.push(e);
        self.expectations.last_mut().unwrap()
    }

    /// Create a new stub (default behavior) for this method.
    pub fn stub(&mut self) -> &mut Stub<I, O> {
        self.stubs.push(Stub::default());
        self.stubs.last_mut().unwrap()
    }

    /// Simulate calling the real method.  An invocation that matches no
    /// expectation is answered according to the method's strictness, with a
    /// synthesized default result.
    pub fn call(&self, args: I) -> O
    where
        O: Synthesize,
    {
        self.dispatch(args, Some(<O as Synthesize>::synthesize))
    }

    /// Like [`call`](Self::call), but for return types with no
    /// synthesizable default: an invocation that matches no expectation
    /// panics instead.
    pub fn call_required(&self, args: I) -> O {
        self.dispatch(args, None)
    }

    fn dispatch(&self, args: I, synth: Option<fn() -> O>) -> O {
        let args = if self.prefer_stubs {
            match self.try_stubs(args) {
                Ok(o) => return o,
                Err(args) => args,
            }
        } else {
            args
        };

        // Latest-declared first among matching candidates with remaining
        // capacity, preferring one whose predecessors are satisfied.
        if let Some(e) = self
            .expectations
            .iter()
            .rev()
            .find(|e| {
                e.matches(&args) && e.has_capacity() && e.order_eligible()
            })
        {
            return self.execute(e, args, synth);
        }

        if let Some(e) = self
            .expectations
            .iter()
            .rev()
            .find(|e| e.matches(&args) && e.has_capacity())
        {
            // Out of order.  Report it, then complete the call with the
            // best available action anyway.
            self.sink.fail(Violation::OutOfOrder { method: e.context() });
            return self.execute(e, args, synth);
        }

        if let Some(e) =
            self.expectations.iter().rev().find(|e| e.matches(&args))
        {
            // Every matching expectation is exhausted.  The counter stays
            // at its maximum; the offending call gets a default result.
            self.sink.fail(Violation::TooManyCalls {
                method: e.context(),
                actual: e.count() + 1,
                max: e.max_allowed(),
            });
            return self.synthesize(synth);
        }

        let args = match self.try_stubs(args) {
            Ok(o) => return o,
            Err(args) => args,
        };
        drop(args);

        let v = Violation::Unmatched { method: self.label() };
        match self.strictness {
            Strictness::Nice => {}
            Strictness::Default => self.sink.warn(v),
            Strictness::Strict => self.sink.fail(v),
        }
        self.synthesize(synth)
    }

    fn execute(
        &self,
        e: &Expectation<I, O>,
        args: I,
        synth: Option<fn() -> O>,
    ) -> O {
        e.register_match();
        if e.has_action() {
            if let Some(o) = e.run_action(args) {
                return o;
            }
            return self.synthesize(synth);
        }
        // A matched expectation with no action of its own borrows the
        // latest matching stub's default.
        match self.try_stubs(args) {
            Ok(o) => o,
            Err(_) => self.synthesize(synth),
        }
    }

    fn try_stubs(&self, args: I) -> Result<O, I> {
        match self
            .stubs
            .iter()
            .rev()
            .find(|s| s.matches(&args) && s.has_action())
        {
            Some(s) => Ok(s.run(args)),
            None => Err(args),
        }
    }

    fn synthesize(&self, synth: Option<fn() -> O>) -> O {
        match synth {
            Some(f) => f(),
            None => {
                panic!("{}: No matching expectation found", self.label())
            }
        }
    }

    fn record_deficits(&self) {
        for e in &self.expectations {
            if let Some(v) = e.deficit_violation() {
                self.sink.fail(v);
            }
        }
    }

    /// Verify that every expectation reached its minimum call count,
    /// panicking with the accumulated report otherwise.
    pub fn verify(&self) {
        self.record_deficits();
        self.sink.flush();
    }

    /// Verify all current expectations, then clear them so new ones can be
    /// set mid-test.  Stubs survive a checkpoint.
    pub fn checkpoint(&mut self) {
        self.record_deficits();
        self.expectations.drain(..);
        self.sink.flush();
    }
}

impl<I, O> Default for Expectations<I, O> {
    fn default() -> Self {
        Expectations {
            expectations: Vec::new(),
            stubs: Vec::new(),
            name: String::new(),
            strictness: Strictness::default(),
            prefer_stubs: false,
            sink: DiagnosticSink::new(),
        }
    }
}

impl<I, O> Drop for Expectations<I, O> {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.verify();
        }
    }
}

/// A collection of [`RefExpectation`]s for one mocked method.
///
/// References cannot be synthesized, so an invocation that matches no
/// expectation panics regardless of strictness.
pub struct RefExpectations<I, O> {
    items: Vec<RefExpectation<I, O>>,
    name: String,
    sink: DiagnosticSink,
}

impl<I, O> RefExpectations<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        let mut ex = Self::default();
        ex.name = name.into();
        ex
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub(crate) fn share_sink(&mut self, sink: DiagnosticSink) {
        self.sink = sink;
    }

    fn label(&self) -> String {
        if self.name.is_empty() {
            "mock method".to_owned()
        } else {
            self.name.clone()
        }
    }

    /// Create a new expectation for this method.
    pub fn expect(&mut self) -> &mut RefExpectation<I, O> {
        let mut e = RefExpectation::default();
        e.set_context(self.label(), self.sink.clone());
        for h in ambient_handles() {
            e.attach(h);
        }
        self.items.push(e);
        self.items.last_mut().unwrap()
    }

    /// Simulate calling the real method.
    pub fn call(&self, args: I) -> &O {
        if let Some(e) = self.items.iter().rev().find(|e| {
            e.matches(&args) && e.has_capacity() && e.order_eligible()
        }) {
            e.register_match();
            return e.borrow_result();
        }
        if let Some(e) = self
            .items
            .iter()
            .rev()
            .find(|e| e.matches(&args) && e.has_capacity())
        {
            self.sink.fail(Violation::OutOfOrder { method: e.context() });
            e.register_match();
            return e.borrow_result();
        }
        if let Some(e) = self.items.iter().rev().find(|e| e.matches(&args)) {
            // Exhausted, but a reference has no synthesized fallback:
            // report and borrow the stored result without recording.
            self.sink.fail(Violation::TooManyCalls {
                method: e.context(),
                actual: e.count() + 1,
                max: e.max_allowed(),
            });
            return e.borrow_result();
        }
        panic!("{}: No matching expectation found", self.label());
    }

    fn record_deficits(&self) {
        for e in &self.items {
            if let Some(v) = e.deficit_violation() {
                self.sink.fail(v);
            }
        }
    }

    pub fn verify(&self) {
        self.record_deficits();
        self.sink.flush();
    }

    pub fn checkpoint(&mut self) {
        self.record_deficits();
        self.items.drain(..);
        self.sink.flush();
    }
}

impl<I, O> Default for RefExpectations<I, O> {
    fn default() -> Self {
        RefExpectations {
            items: Vec::new(),
            name: String::new(),
            sink: DiagnosticSink::new(),
        }
    }
}

impl<I, O> Drop for RefExpectations<I, O> {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.verify();
        }
    }
}

/// A collection of [`RefMutExpectation`]s for one mocked method.
pub struct RefMutExpectations<I, O> {
    items: Vec<RefMutExpectation<I, O>>,
    name: String,
    sink: DiagnosticSink,
}

impl<I, O> RefMutExpectations<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        let mut ex = Self::default();
        ex.name = name.into();
        ex
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub(crate) fn share_sink(&mut self, sink: DiagnosticSink) {
        self.sink = sink;
    }

    fn label(&self) -> String {
        if self.name.is_empty() {
            "mock method".to_owned()
        } else {
            self.name.clone()
        }
    }

    /// Create a new expectation for this method.
    pub fn expect(&mut self) -> &mut RefMutExpectation<I, O> {
        let mut e = RefMutExpectation::default();
        e.set_context(self.label(), self.sink.clone());
        for h in ambient_handles() {
            e.attach(h);
        }
        self.items.push(e);
        self.items.last_mut().unwrap()
    }

    /// Simulate calling the real method.
    pub fn call_mut(&mut self, args: I) -> &mut O {
        if let Some(i) = self.items.iter().rposition(|e| {
            e.matches(&args) && e.has_capacity() && e.order_eligible()
        }) {
            self.items[i].register_match();
            return self.items[i].recompute(args);
        }
        if let Some(i) = self
            .items
            .iter()
            .rposition(|e| e.matches(&args) && e.has_capacity())
        {
            self.sink.fail(Violation::OutOfOrder {
                method: self.items[i].context(),
            });
            self.items[i].register_match();
            return self.items[i].recompute(args);
        }
        if let Some(i) = self.items.iter().rposition(|e| e.matches(&args)) {
            let e = &self.items[i];
            self.sink.fail(Violation::TooManyCalls {
                method: e.context(),
                actual: e.count() + 1,
                max: e.max_allowed(),
            });
            return self.items[i].recompute(args);
        }
        panic!("{}: No matching expectation found", self.label());
    }

    fn record_deficits(&self) {
        for e in &self.items {
            if let Some(v) = e.deficit_violation() {
                self.sink.fail(v);
            }
        }
    }

    pub fn verify(&self) {
        self.record_deficits();
        self.sink.flush();
    }

    pub fn checkpoint(&mut self) {
        self.record_deficits();
        self.items.drain(..);
        self.sink.flush();
    }
}

impl<I, O> Default for RefMutExpectations<I, O> {
    fn default() -> Self {
        RefMutExpectations {
            items: Vec::new(),
            name: String::new(),
            sink: DiagnosticSink::new(),
        }
    }
}

impl<I, O> Drop for RefMutExpectations<I, O> {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.verify();
        }
    }
}

/// Object-safe surface of an expectation collection, for the type-erased
/// store inside [`Mock`].
pub trait AnyExpectations: Any + Send + Sync {
    /// Record any unmet minimums into the collection's sink, without
    /// flushing.
    fn verify_pending(&self);

    /// Verify and clear the collection.
    fn checkpoint_all(&mut self);
}
downcast!(dyn AnyExpectations);

impl<I: 'static, O: 'static> AnyExpectations for Expectations<I, O> {
    fn verify_pending(&self) {
        self.record_deficits();
    }

    fn checkpoint_all(&mut self) {
        self.checkpoint();
    }
}

impl<I: 'static, O: 'static> AnyExpectations for RefExpectations<I, O>
where
    O: Send + Sync,
{
    fn verify_pending(&self) {
        self.record_deficits();
    }

    fn checkpoint_all(&mut self) {
        self.checkpoint();
    }
}

impl<I: 'static, O: 'static> AnyExpectations for RefMutExpectations<I, O>
where
    O: Send + Sync,
{
    fn verify_pending(&self) {
        self.record_deficits();
    }

    fn checkpoint_all(&mut self) {
        self.checkpoint();
    }
}

/// Non-generic key identifying one mocked method in a [`Mock`]'s store: its
/// name plus the `TypeId` of its signature.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MethodKey {
    name: &'static str,
    sig: any::TypeId,
}

impl MethodKey {
    pub fn new<I: 'static, O: 'static>(name: &'static str) -> Self {
        MethodKey {
            name,
            sig: any::TypeId::of::<(I, O)>(),
        }
    }
}

/// A mock instance: one expectation collection per mocked method, plus the
/// instance's strictness and diagnostic sink.
///
/// Hand-written mock structs can either embed [`Expectations`] fields
/// directly, or wrap a `Mock` and forward each method through
/// [`call`](Self::call).  Verification runs when the mock is dropped, or
/// earlier via [`verify`](Self::verify) / [`checkpoint`](Self::checkpoint).
///
/// # Examples
/// ```
/// use understudy::*;
///
/// let mut mock = Mock::new("MockUser");
/// mock.expect::<(String,), u32>("get_user_age")
///     .with(predicate::eq(("bob".to_owned(),)))
///     .times(1)
///     .return_const(2u32);
///
/// assert_eq!(2, mock.call::<(String,), u32>("get_user_age",
///                                           ("bob".to_owned(),)));
/// ```
pub struct Mock {
    name: String,
    strictness: Strictness,
    sink: DiagnosticSink,
    store: HashMap<MethodKey, Box<dyn AnyExpectations>>,
}

impl Mock {
    /// A mock with [`Strictness::Default`]: unmatched calls warn.
    pub fn new(name: impl Into<String>) -> Self {
        Mock::with_strictness(name, Strictness::Default)
    }

    /// A mock that silently answers unmatched calls.
    pub fn nice(name: impl Into<String>) -> Self {
        Mock::with_strictness(name, Strictness::Nice)
    }

    /// A mock for which any unmatched call fails the test.
    pub fn strict(name: impl Into<String>) -> Self {
        Mock::with_strictness(name, Strictness::Strict)
    }

    pub fn with_strictness(
        name: impl Into<String>,
        strictness: Strictness,
    ) -> Self {
        Mock {
            name: name.into(),
            strictness,
            sink: DiagnosticSink::new(),
            store: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    fn label(&self, method: &str) -> String {
        format!("{}::{}", self.name, method)
    }

    fn collection<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
    ) -> &mut Expectations<I, O> {
        let key = MethodKey::new::<I, O>(method);
        let label = self.label(method);
        let sink = self.sink.clone();
        let strictness = self.strictness;
        self.store
            .entry(key)
            .or_insert_with(|| {
                let mut ex = Expectations::<I, O>::named(label);
                ex.share_sink(sink);
                ex.set_strictness(strictness);
                Box::new(ex)
            })
            .downcast_mut()
            .unwrap()
    }

    fn ref_collection<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
    ) -> &mut RefExpectations<I, O>
    where
        O: Send + Sync,
    {
        let key = MethodKey::new::<I, O>(method);
        let label = self.label(method);
        let sink = self.sink.clone();
        self.store
            .entry(key)
            .or_insert_with(|| {
                let mut ex = RefExpectations::<I, O>::named(label);
                ex.share_sink(sink);
                Box::new(ex)
            })
            .downcast_mut()
            .unwrap()
    }

    fn ref_mut_collection<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
    ) -> &mut RefMutExpectations<I, O>
    where
        O: Send + Sync,
    {
        let key = MethodKey::new::<I, O>(method);
        let label = self.label(method);
        let sink = self.sink.clone();
        self.store
            .entry(key)
            .or_insert_with(|| {
                let mut ex = RefMutExpectations::<I, O>::named(label);
                ex.share_sink(sink);
                Box::new(ex)
            })
            .downcast_mut()
            .unwrap()
    }

    /// Declare an enforced expectation on `method`.
    pub fn expect<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
    ) -> &mut Expectation<I, O> {
        self.collection::<I, O>(method).expect()
    }

    /// Declare a stub (default behavior) on `method`.
    pub fn stub<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
    ) -> &mut Stub<I, O> {
        self.collection::<I, O>(method).stub()
    }

    /// Declare an expectation on a method returning a reference.
    pub fn expect_ref<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
    ) -> &mut RefExpectation<I, O>
    where
        O: Send + Sync,
    {
        self.ref_collection::<I, O>(method).expect()
    }

    /// Declare an expectation on a `&mut self` method returning a
    /// reference.
    pub fn expect_ref_mut<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
    ) -> &mut RefMutExpectation<I, O>
    where
        O: Send + Sync,
    {
        self.ref_mut_collection::<I, O>(method).expect()
    }

    /// Dispatch an invocation of `method`.  Called by the mock struct's
    /// forwarding methods.
    pub fn call<I: 'static, O: 'static>(
        &self,
        method: &'static str,
        args: I,
    ) -> O
    where
        O: Synthesize,
    {
        let key = MethodKey::new::<I, O>(method);
        match self.store.get(&key) {
            Some(c) => {
                c.downcast_ref::<Expectations<I, O>>().unwrap().call(args)
            }
            None => {
                let v = Violation::Unmatched {
                    method: self.label(method),
                };
                match self.strictness {
                    Strictness::Nice => {}
                    Strictness::Default => self.sink.warn(v),
                    Strictness::Strict => self.sink.fail(v),
                }
                O::synthesize()
            }
        }
    }

    /// Like [`call`](Self::call), for return types with no synthesizable
    /// default.  An invocation of an undeclared method panics.
    pub fn call_required<I: 'static, O: 'static>(
        &self,
        method: &'static str,
        args: I,
    ) -> O {
        let key = MethodKey::new::<I, O>(method);
        match self.store.get(&key) {
            Some(c) => c
                .downcast_ref::<Expectations<I, O>>()
                .unwrap()
                .call_required(args),
            None => {
                panic!(
                    "{}: No matching expectation found",
                    self.label(method)
                )
            }
        }
    }

    /// Dispatch an invocation of a method returning a reference.
    pub fn call_ref<I: 'static, O: 'static>(
        &self,
        method: &'static str,
        args: I,
    ) -> &O
    where
        O: Send + Sync,
    {
        let key = MethodKey::new::<I, O>(method);
        match self.store.get(&key) {
            Some(c) => {
                c.downcast_ref::<RefExpectations<I, O>>().unwrap().call(args)
            }
            None => {
                panic!(
                    "{}: No matching expectation found",
                    self.label(method)
                )
            }
        }
    }

    /// Dispatch an invocation of a `&mut self` method returning a
    /// reference.
    pub fn call_ref_mut<I: 'static, O: 'static>(
        &mut self,
        method: &'static str,
        args: I,
    ) -> &mut O
    where
        O: Send + Sync,
    {
        let key = MethodKey::new::<I, O>(method);
        let label = self.label(method);
        match self.store.get_mut(&key) {
            Some(c) => c
                .downcast_mut::<RefMutExpectations<I, O>>()
                .unwrap()
                .call_mut(args),
            None => {
                panic!("{}: No matching expectation found", label)
            }
        }
    }

    /// Verify every method's expectations, panicking with the accumulated
    /// report if any failed.  Also runs on drop.
    pub fn verify(&self) {
        for c in self.store.values() {
            c.verify_pending();
        }
        self.sink.flush();
    }

    /// Verify all methods' expectations and clear them, so new ones can be
    /// set mid-test.  Stubs survive.
    pub fn checkpoint(&mut self) {
        for c in self.store.values_mut() {
            c.checkpoint_all();
        }
        self.sink.flush();
    }
}

impl Drop for Mock {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.verify();
        }
    }
}
