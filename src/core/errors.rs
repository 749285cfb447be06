/*!
 * Error Types
 * Centralized error handling with thiserror and miette diagnostics
 */

use miette::Diagnostic;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use thiserror::Error;

/// Result type for coordination primitives
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by the coordination primitives
///
/// Misuse variants (ownership, reuse, precondition) are reported to the
/// violating caller and are never worth retrying. `AggregateFailure` is the
/// deferred report of worker failures, surfaced on the owner thread.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum SyncError {
    #[error("{operation} can only be called by the owner thread (owner {owner:?}, caller {caller:?})")]
    #[diagnostic(
        code(sync::ownership_violation),
        help("Only the thread that created (or took over) the WaitGroup may add work, wait or reset.")
    )]
    OwnershipViolation {
        operation: &'static str,
        owner: ThreadId,
        caller: ThreadId,
    },

    #[error("Reuse violation: {0}")]
    #[diagnostic(
        code(sync::reuse_violation),
        help("Waiting is one-shot per cycle. Call reset() once the cycle has drained to start a new one.")
    )]
    ReuseViolation(&'static str),

    #[error("Precondition violation: {0}")]
    #[diagnostic(
        code(sync::precondition_violation),
        help("Reset and transfer need a drained counter and no thread waiting; add must keep the counter in range.")
    )]
    PreconditionViolation(&'static str),

    #[error("{0}")]
    #[diagnostic(
        code(sync::aggregate_failure),
        help("Every worker completed, but some reported failures. Inspect them in report order.")
    )]
    AggregateFailure(AggregateFailure),
}

impl SyncError {
    pub(crate) fn ownership(operation: &'static str, owner: ThreadId) -> Self {
        SyncError::OwnershipViolation {
            operation,
            owner,
            caller: thread::current().id(),
        }
    }

    /// Borrow the aggregated failures, if this is an aggregate report
    pub fn aggregate(&self) -> Option<&AggregateFailure> {
        match self {
            SyncError::AggregateFailure(agg) => Some(agg),
            _ => None,
        }
    }

    /// Whether this error signals a programming mistake rather than worker failures
    #[inline]
    pub fn is_misuse(&self) -> bool {
        !matches!(self, SyncError::AggregateFailure(_))
    }
}

/// Thread-safe failure value a worker hands to `WaitGroup::done_with`
///
/// Cheap to clone; the payload is shared.
#[derive(Clone)]
pub struct Failure {
    source: Arc<dyn StdError + Send + Sync + 'static>,
    reporter: ThreadId,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl Failure {
    /// Wrap an error reported by the current thread
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(error),
            reporter: thread::current().id(),
        }
    }

    /// Failure carrying only a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Thread that reported the failure
    #[inline]
    pub fn reporter(&self) -> ThreadId {
        self.reporter
    }

    /// The wrapped error
    #[inline]
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.source
    }

    /// Attempt to view the payload as a concrete error type
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("error", &self.source.to_string())
            .field("reporter", &self.reporter)
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

/// Every failure reported during one fan-in cycle, in report order
#[derive(Debug, Clone, Default)]
pub struct AggregateFailure {
    failures: Vec<Failure>,
}

impl AggregateFailure {
    pub(crate) fn new(failures: Vec<Failure>) -> Self {
        Self { failures }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Failure> {
        self.failures.iter()
    }

    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker(s) reported failure", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { ": " } else { "; " }, failure)?;
        }
        Ok(())
    }
}

impl StdError for AggregateFailure {}

impl<'a> IntoIterator for &'a AggregateFailure {
    type Item = &'a Failure;
    type IntoIter = std::slice::Iter<'a, Failure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.iter()
    }
}

impl IntoIterator for AggregateFailure {
    type Item = Failure;
    type IntoIter = std::vec::IntoIter<Failure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}
