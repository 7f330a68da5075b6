// vim: tw=80
//! Ordering constraints between expectations.
//!
//! Constraints form a directed acyclic graph: an edge from A to B means "A
//! must reach its minimum call count before B may be matched."  The graph is
//! an arena of nodes addressed by index; expectations hold [`SeqHandle`]s
//! into it.  Edges are declared either explicitly, with
//! [`Expectation::after`](crate::Expectation::after), or implicitly by
//! adding expectations to a [`Sequence`], where each expectation is chained
//! after the previously added one.  An [`InSequence`] guard makes a fresh
//! sequence ambient for the current thread, so that every expectation
//! declared through a registry while the guard lives joins it automatically.

use std::{
    cell::RefCell,
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use crate::diagnostic::ConfigurationError;

#[derive(Default)]
struct Node {
    satisfied: bool,
    preds: Vec<usize>,
    succs: Vec<usize>,
}

#[derive(Default)]
struct GraphInner {
    nodes: Vec<Node>,
}

impl GraphInner {
    /// Is `to` reachable from `from` along successor edges?
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(n) = stack.pop() {
            if n == to {
                return true;
            }
            if !std::mem::replace(&mut seen[n], true) {
                stack.extend(&self.nodes[n].succs);
            }
        }
        false
    }
}

/// Arena of ordering constraints.  Cheaply cloneable; clones share the same
/// nodes.
#[derive(Clone, Default)]
pub struct SequenceGraph(Arc<Mutex<GraphInner>>);

impl SequenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_node(&self) -> usize {
        let mut inner = self.0.lock().unwrap();
        inner.nodes.push(Node::default());
        inner.nodes.len() - 1
    }

    /// Insert the edge `from -> to`, panicking if it would close a cycle.
    fn add_edge(&self, from: usize, to: usize) {
        let mut inner = self.0.lock().unwrap();
        if from == to || inner.reaches(to, from) {
            panic!("{}", ConfigurationError::CyclicSequence);
        }
        inner.nodes[from].succs.push(to);
        inner.nodes[to].preds.push(from);
    }

    fn same_graph(&self, other: &SequenceGraph) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An expectation's membership in one [`SequenceGraph`]: the graph plus the
/// expectation's node index.
#[derive(Clone)]
pub struct SeqHandle {
    graph: SequenceGraph,
    node: usize,
}

impl SeqHandle {
    /// Push the owning expectation's current satisfaction state into the
    /// graph.  An expectation is satisfied once its matched count has
    /// reached its minimum, so `never()` and `times_any()` members don't
    /// wedge their successors.
    pub(crate) fn update(&self, satisfied: bool) {
        self.graph.0.lock().unwrap().nodes[self.node].satisfied = satisfied;
    }

    /// May the owning expectation be matched now?  True when every direct
    /// predecessor is satisfied.
    pub(crate) fn eligible(&self) -> bool {
        let inner = self.graph.0.lock().unwrap();
        inner.nodes[self.node]
            .preds
            .iter()
            .all(|&p| inner.nodes[p].satisfied)
    }

    /// A handle to a new node in the same graph, ordered after this one.
    /// Used by `after`-style declarations.
    pub(crate) fn successor(&self) -> SeqHandle {
        let node = self.graph.add_node();
        self.graph.add_edge(self.node, node);
        SeqHandle {
            graph: self.graph.clone(),
            node,
        }
    }

    /// Add the edge `self -> existing` between two nodes that may already
    /// belong to the same graph.  Panics if they belong to different graphs
    /// or if the edge would close a cycle.
    pub(crate) fn link_before(&self, successor: &SeqHandle) {
        assert!(
            self.graph.same_graph(&successor.graph),
            "Expectations belong to different sequence graphs"
        );
        self.graph.add_edge(self.node, successor.node);
    }

    pub(crate) fn in_graph(&self, graph: &SequenceGraph) -> bool {
        self.graph.same_graph(graph)
    }

    pub(crate) fn fresh(graph: &SequenceGraph) -> SeqHandle {
        SeqHandle {
            graph: graph.clone(),
            node: graph.add_node(),
        }
    }

    pub(crate) fn graph(&self) -> &SequenceGraph {
        &self.graph
    }
}

/// Used to enforce that expectations must be matched in the order they were
/// added.
///
/// Each call to [`next`](Self::next) yields a handle chained after the
/// previously yielded one, forming a linear chain in the underlying graph.
/// Expectations from different mock objects may share one sequence.
///
/// # Examples
/// ```
/// use understudy::*;
///
/// let mut seq = Sequence::new();
///
/// let mut e1 = Expectations::<u32, ()>::new();
/// e1.expect()
///     .times(1)
///     .return_const(())
///     .in_sequence(&mut seq);
///
/// let mut e2 = Expectations::<(), u32>::new();
/// e2.expect()
///     .times(1)
///     .return_const(42u32)
///     .in_sequence(&mut seq);
///
/// e1.call(5);
/// assert_eq!(42, e2.call(()));
/// ```
#[derive(Default)]
pub struct Sequence {
    graph: SequenceGraph,
    last: Option<usize>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for the next expectation in the sequence.
    pub fn next(&mut self) -> SeqHandle {
        let node = self.graph.add_node();
        if let Some(prev) = self.last {
            self.graph.add_edge(prev, node);
        }
        self.last = Some(node);
        SeqHandle {
            graph: self.graph.clone(),
            node,
        }
    }
}

thread_local! {
    static AMBIENT: RefCell<Vec<Sequence>> = const { RefCell::new(Vec::new()) };
}

/// While a value of this type is live, every expectation declared through a
/// registry on the current thread is added to an implicit [`Sequence`], so
/// calls must occur in declaration order.
///
/// # Examples
/// ```
/// use understudy::*;
///
/// let mut ex = Expectations::<(), i32>::named("Mock::meth");
/// {
///     let _guard = InSequence::new();
///     ex.expect().times(1).return_const(1);
///     ex.expect().times(1).return_const(2);
/// }
/// assert_eq!(1, ex.call(()));
/// assert_eq!(2, ex.call(()));
/// ex.verify();
/// ```
#[must_use = "InSequence only orders declarations while it is live"]
pub struct InSequence(PhantomData<*const ()>);

impl InSequence {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        AMBIENT.with(|a| a.borrow_mut().push(Sequence::new()));
        InSequence(PhantomData)
    }
}

impl Drop for InSequence {
    fn drop(&mut self) {
        AMBIENT.with(|a| {
            a.borrow_mut().pop();
        });
    }
}

/// One handle per active ambient sequence, each chained after that
/// sequence's previous expectation.  Called by registries at declaration.
pub(crate) fn ambient_handles() -> Vec<SeqHandle> {
    AMBIENT.with(|a| a.borrow_mut().iter_mut().map(Sequence::next).collect())
}
