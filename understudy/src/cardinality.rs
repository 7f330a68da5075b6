// vim: tw=80
//! Call-count tracking and enforcement for expectations.

use std::{
    ops::Range,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Declared call-count constraint.  `Implicit` is resolved against the shape
/// of the expectation's action queue at enforcement time.
#[derive(Clone, Copy, Debug)]
enum Spec {
    Implicit,
    Bounds { min: usize, max: Option<usize> },
}

/// The shape of an expectation's action queue, as far as cardinality
/// inference cares: how many one-shot actions were declared, and whether a
/// repeating action follows them.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct QueueShape {
    pub one_shots: usize,
    pub has_repeat: bool,
}

/// Tracks how many times an expectation has been matched and decides
/// whether another match is allowed.
///
/// Without an explicit spec the allowed counts are inferred from the action
/// queue: `n` one-shot actions require exactly `n` matches, a repeating
/// action lifts the maximum, and an empty queue means exactly one match.
#[derive(Debug)]
pub(crate) struct Cardinality {
    /// How many times has the expectation already been matched?
    count: AtomicUsize,
    spec: Spec,
}

impl Cardinality {
    /// Resolved (min, max) bounds; `None` max means unbounded.
    pub fn bounds(&self, shape: QueueShape) -> (usize, Option<usize>) {
        match self.spec {
            Spec::Bounds { min, max } => (min, max),
            Spec::Implicit if shape.has_repeat => (shape.one_shots, None),
            Spec::Implicit if shape.one_shots > 0 => {
                (shape.one_shots, Some(shape.one_shots))
            }
            Spec::Implicit => (1, Some(1)),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Would one more match stay within the maximum?
    pub fn has_capacity(&self, shape: QueueShape) -> bool {
        match self.bounds(shape).1 {
            Some(max) => self.count() < max,
            None => true,
        }
    }

    /// Has the minimum required count been reached?
    pub fn is_satisfied(&self, shape: QueueShape) -> bool {
        self.count() >= self.bounds(shape).0
    }

    /// Record one more match.  The caller must have checked
    /// [`has_capacity`](Self::has_capacity) first; the counter never exceeds
    /// the declared maximum.
    pub fn record(&self) -> usize {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// `Some((actual, min))` if the expectation is still short of its
    /// minimum.  Checked at teardown.
    pub fn deficit(&self, shape: QueueShape) -> Option<(usize, usize)> {
        let (min, _) = self.bounds(shape);
        let count = self.count();
        (count < min).then_some((count, min))
    }

    /// Allow any number of matches.
    pub fn any(&mut self) {
        self.spec = Spec::Bounds { min: 0, max: None };
    }

    /// Require exactly `n` matches.
    pub fn n(&mut self, n: usize) {
        self.spec = Spec::Bounds { min: n, max: Some(n) };
    }

    /// Forbid this expectation from ever being matched.
    pub fn never(&mut self) {
        self.n(0);
    }

    /// Allow any count within `range` (half-open, like the standard
    /// library's ranges).
    pub fn range(&mut self, range: Range<usize>) {
        assert!(range.end > range.start, "Backwards range");
        self.spec = Spec::Bounds {
            min: range.start,
            max: Some(range.end - 1),
        };
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality {
            count: AtomicUsize::default(),
            spec: Spec::Implicit,
        }
    }
}
