// vim: tw=80
//! Behaviors executed when an expectation matches.
//!
//! An [`Action`] consumes the invocation's arguments and produces the
//! call's result.  A [`SideEffect`] mutates the arguments in place without
//! producing a result; [`do_all`] runs side effects before one returning
//! action, which is how "set this output argument *and* return that value"
//! is expressed.  Expectations hold an [`ActionQueue`]: one-shot actions
//! are consumed in declaration order, then an optional repeating action
//! runs for every further match.

use std::collections::VecDeque;

use fragile::Fragile;

use crate::cardinality::QueueShape;

enum Kind<I, O> {
    Mut(Box<dyn FnMut(I) -> O + Send>),
    Once(Option<Box<dyn FnOnce(I) -> O + Send>>),
    Seq(Vec<SideEffect<I>>, Box<Action<I, O>>),
}

/// A unit of behavior bound to one match: produce the invocation's result,
/// possibly with side effects on the arguments first.
pub struct Action<I, O>(Kind<I, O>);

impl<I, O> Action<I, O> {
    pub(crate) fn call(&mut self, mut args: I) -> O {
        match &mut self.0 {
            Kind::Mut(f) => f(args),
            Kind::Once(f) => match f.take() {
                Some(f) => f(args),
                None => {
                    panic!("Called a method twice that was expected only once")
                }
            },
            Kind::Seq(effects, last) => {
                for e in effects.iter_mut() {
                    e.apply(&mut args);
                }
                last.call(args)
            }
        }
    }
}

/// Return a copy of a constant value.
pub fn return_const<I, O>(value: O) -> Action<I, O>
where
    O: Clone + Send + 'static,
{
    Action(Kind::Mut(Box::new(move |_| value.clone())))
}

/// Return a value by moving it out.  Running the action a second time is an
/// error, which the cardinality inference rules make unreachable unless the
/// action is declared as repeating.
pub fn return_value<I, O>(value: O) -> Action<I, O>
where
    O: Send + 'static,
{
    Action(Kind::Once(Some(Box::new(move |_| value))))
}

/// Invoke a function with the invocation's arguments and propagate its
/// result.
pub fn invoke<I, O, F>(f: F) -> Action<I, O>
where
    F: FnMut(I) -> O + Send + 'static,
{
    Action(Kind::Mut(Box::new(f)))
}

/// Like [`invoke`], but for a function that may only be called once.
pub fn invoke_once<I, O, F>(f: F) -> Action<I, O>
where
    F: FnOnce(I) -> O + Send + 'static,
{
    Action(Kind::Once(Some(Box::new(f))))
}

/// Single-threaded version of [`invoke`].  Can be used when the argument or
/// return type isn't `Send`.
///
/// It is a runtime error to run the action from a different thread than the
/// one that created it.
pub fn invoke_st<I, O, F>(f: F) -> Action<I, O>
where
    F: FnMut(I) -> O + 'static,
{
    let mut fragile = Fragile::new(f);
    Action(Kind::Mut(Box::new(move |i| (fragile.get_mut())(i))))
}

/// Single-threaded version of [`invoke_once`].
pub fn invoke_once_st<I, O, F>(f: F) -> Action<I, O>
where
    F: FnOnce(I) -> O + 'static,
{
    let fragile = Fragile::new(f);
    Action(Kind::Once(Some(Box::new(move |i| {
        (fragile.into_inner())(i)
    }))))
}

/// Run `effects` in order against the arguments, then run `last` for the
/// result.
///
/// # Examples
/// ```
/// use understudy::*;
///
/// let mut out = 0;
/// {
///     let mut ex = Expectations::<(&mut i32,), i32>::new();
///     ex.expect()
///         .will_once(do_all(vec![set_arg!(0, 7)],
///                           action::return_const(-2)));
///     assert_eq!(-2, ex.call((&mut out,)));
/// }
/// assert_eq!(7, out);
/// ```
pub fn do_all<I, O>(effects: Vec<SideEffect<I>>, last: Action<I, O>)
    -> Action<I, O>
{
    Action(Kind::Seq(effects, Box::new(last)))
}

/// Mutates the invocation's arguments in place.  Built with [`mutate`] or
/// the [`set_arg!`](crate::set_arg) / [`set_arg_ptr!`](crate::set_arg_ptr)
/// macros.
pub struct SideEffect<I>(Box<dyn FnMut(&mut I) + Send>);

impl<I> SideEffect<I> {
    pub(crate) fn apply(&mut self, args: &mut I) {
        (self.0)(args)
    }
}

/// A side effect from an arbitrary closure over the argument tuple.
pub fn mutate<I, F>(f: F) -> SideEffect<I>
where
    F: FnMut(&mut I) + Send + 'static,
{
    SideEffect(Box::new(f))
}

/// Single-threaded version of [`mutate`].  Useful when the side effect
/// closes over values that aren't `Send`, such as pointers.
///
/// It is a runtime error to run the action from a different thread than the
/// one that created it.
pub fn mutate_st<I, F>(f: F) -> SideEffect<I>
where
    F: FnMut(&mut I) + 'static,
{
    let mut fragile = Fragile::new(f);
    SideEffect(Box::new(move |i| (fragile.get_mut())(i)))
}

/// Ordered actions for one expectation: one-shots first, then an optional
/// repeating action for every further match.
pub(crate) struct ActionQueue<I, O> {
    one_shots: VecDeque<Action<I, O>>,
    repeated: Option<Action<I, O>>,
    declared_one_shots: usize,
}

impl<I, O> ActionQueue<I, O> {
    pub fn push_once(&mut self, a: Action<I, O>) {
        self.one_shots.push_back(a);
        self.declared_one_shots += 1;
    }

    pub fn set_repeated(&mut self, a: Action<I, O>) {
        self.repeated = Some(a);
    }

    pub fn is_empty(&self) -> bool {
        self.declared_one_shots == 0 && self.repeated.is_none()
    }

    /// The declared shape, which cardinality inference consumes.  Stable
    /// across matches: consuming a one-shot doesn't shrink it.
    pub fn shape(&self) -> QueueShape {
        QueueShape {
            one_shots: self.declared_one_shots,
            has_repeat: self.repeated.is_some(),
        }
    }

    /// Would [`next`](Self::next) run anything?
    pub fn has_next(&self) -> bool {
        !self.one_shots.is_empty() || self.repeated.is_some()
    }

    /// Run the next action: the first unconsumed one-shot, else the
    /// repeating action.  `None` if the queue has nothing to run.
    pub fn next(&mut self, args: I) -> Option<O> {
        if let Some(mut a) = self.one_shots.pop_front() {
            Some(a.call(args))
        } else if let Some(a) = &mut self.repeated {
            Some(a.call(args))
        } else {
            None
        }
    }
}

impl<I, O> Default for ActionQueue<I, O> {
    fn default() -> Self {
        ActionQueue {
            one_shots: VecDeque::new(),
            repeated: None,
            declared_one_shots: 0,
        }
    }
}
