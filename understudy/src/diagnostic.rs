// vim: tw=80
//! Failure and warning records produced by dispatch and verification.
//!
//! The engine never aborts a test body on the first violation.  Instead,
//! violations accumulate in a [`DiagnosticSink`] and surface when the sink is
//! flushed, normally from the owning mock's verification path.  Warnings are
//! additionally emitted through `tracing` so they are visible even when a
//! test passes.

use std::{
    mem,
    sync::{Arc, Mutex},
};

use thiserror::Error;

/// A constraint violation detected during dispatch or at verification.
///
/// The `method` field carries the rendered context of the offending
/// expectation, e.g. `"MockUser::get_age: Expectation(var == 4)"`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Violation {
    /// An expectation was matched more often than its cardinality allows.
    #[error("{method} called {actual} time(s) which is more than expected \
             {max}")]
    TooManyCalls {
        method: String,
        actual: usize,
        max: usize,
    },

    /// An expectation did not reach its minimum call count by teardown.
    #[error("{method} called {actual} time(s) which is fewer than expected \
             {min}")]
    TooFewCalls {
        method: String,
        actual: usize,
        min: usize,
    },

    /// An expectation was matched before all of its predecessors were
    /// satisfied (method sequence violation).
    #[error("{method} called out of order (method sequence violation)")]
    OutOfOrder { method: String },

    /// A call matched no expectation at all.
    #[error("{method}: uninteresting call, no matching expectation found")]
    Unmatched { method: String },
}

/// Unrecoverable misconfiguration of the engine itself.  Unlike
/// [`Violation`]s these abort the test at the point of declaration.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("sequence constraint would form a cycle")]
    CyclicSequence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Recorded and reported, but does not fail the test.
    Warning,
    /// Fails the test when the sink is flushed.
    Failure,
}

/// One recorded violation together with its severity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub violation: Violation,
}

/// Accumulates violations so that a single failure does not abort the rest
/// of the test body.
///
/// Cloning a sink yields another handle to the same record store, which is
/// how one mock instance shares a sink across all of its methods.
#[derive(Clone, Default)]
pub struct DiagnosticSink(Arc<Mutex<Vec<Diagnostic>>>);

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure-severity violation.
    pub fn fail(&self, violation: Violation) {
        self.0.lock().unwrap().push(Diagnostic {
            severity: Severity::Failure,
            violation,
        });
    }

    /// Record a warning-severity violation.
    pub fn warn(&self, violation: Violation) {
        tracing::warn!("{}", violation);
        self.0.lock().unwrap().push(Diagnostic {
            severity: Severity::Warning,
            violation,
        });
    }

    /// All records accumulated so far, in the order they were recorded.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.0.lock().unwrap().clone()
    }

    /// The failure-severity violations accumulated so far.
    pub fn failures(&self) -> Vec<Violation> {
        self.records()
            .into_iter()
            .filter(|d| d.severity == Severity::Failure)
            .map(|d| d.violation)
            .collect()
    }

    /// The warning-severity violations accumulated so far.
    pub fn warnings(&self) -> Vec<Violation> {
        self.records()
            .into_iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| d.violation)
            .collect()
    }

    /// `true` if no failure has been recorded.  Warnings don't count.
    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }

    /// Drain all records, panicking if any failure was recorded.
    ///
    /// Flushing is idempotent: a second flush of an already-drained sink is
    /// a no-op.
    pub fn flush(&self) {
        let records = mem::take(&mut *self.0.lock().unwrap());
        let failures = records
            .iter()
            .filter(|d| d.severity == Severity::Failure)
            .collect::<Vec<_>>();
        if !failures.is_empty() {
            let mut msg = String::from("mock verification failed:");
            for d in failures {
                msg.push_str("\n  ");
                msg.push_str(&d.violation.to_string());
            }
            panic!("{}", msg);
        }
    }
}

#[cfg(test)]
mod t {
    use super::*;

    #[test]
    fn warnings_do_not_fail_flush() {
        let sink = DiagnosticSink::new();
        sink.warn(Violation::Unmatched {
            method: "Mock::foo".to_owned(),
        });
        assert!(sink.is_clean());
        assert_eq!(1, sink.warnings().len());
        sink.flush();
    }

    #[test]
    #[should_panic(expected = "called 2 time(s) which is more than expected \
                               1")]
    fn failures_panic_at_flush() {
        let sink = DiagnosticSink::new();
        sink.fail(Violation::TooManyCalls {
            method: "Mock::foo: Expectation(always)".to_owned(),
            actual: 2,
            max: 1,
        });
        sink.flush();
    }

    #[test]
    fn flush_is_idempotent() {
        let sink = DiagnosticSink::new();
        sink.warn(Violation::Unmatched {
            method: "Mock::foo".to_owned(),
        });
        sink.flush();
        assert!(sink.records().is_empty());
        sink.flush();
    }
}
