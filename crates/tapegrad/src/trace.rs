//! Trace sessions and the thread-local active-trace stack.
//!
//! A trace is one differentiation session. Opening a session pushes a fresh
//! [`Tape`] onto a thread-local stack; the session's id is strictly greater
//! than every id handed out before it on this thread, so the innermost
//! active trace is always the one with the largest id. An outer session
//! stays on the stack, suspended, while an inner session runs. This is
//! what makes differentiating through differentiation well defined.

use crate::error::AdError;
use crate::tape::{Node, NodeId, Tape};
use std::cell::{Cell, RefCell};

/// Identifier for one differentiation session.
///
/// Strictly increasing per thread; ordering decides which trace governs a
/// primitive application when arguments from several traces meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceId(u64);

thread_local! {
    static NEXT_TRACE: Cell<u64> = const { Cell::new(0) };
    static TRACE_STACK: RefCell<Vec<Tape>> = const { RefCell::new(Vec::new()) };
}

fn next_trace_id() -> TraceId {
    NEXT_TRACE.with(|c| {
        let id = c.get();
        c.set(id + 1);
        TraceId(id)
    })
}

/// Check whether a trace is currently open on this thread.
pub(crate) fn is_active(trace: TraceId) -> bool {
    TRACE_STACK.with(|s| s.borrow().iter().any(|t| t.trace_id() == trace))
}

/// Append a node to the tape of the given trace.
///
/// The target is addressed by id, not by top-of-stack: while an inner
/// session's backward pass runs, gradient arithmetic on values boxed by an
/// outer session must record into the outer tape.
pub(crate) fn record(trace: TraceId, node: Node) -> Result<NodeId, AdError> {
    TRACE_STACK.with(|s| {
        let mut stack = s.borrow_mut();
        let tape = stack
            .iter_mut()
            .rev()
            .find(|t| t.trace_id() == trace)
            .ok_or(AdError::TraceLeak { trace })?;
        Ok(tape.push(node))
    })
}

/// Scoped handle for one open trace session.
///
/// [`TraceGuard::finish`] closes the session and hands the tape back for
/// the backward pass. If the guard is dropped without finishing (an error
/// unwound out of the user function), the session is popped anyway so the
/// stack can never be left dangling.
pub(crate) struct TraceGuard {
    id: TraceId,
    finished: bool,
}

impl TraceGuard {
    /// Open a new trace session on this thread.
    pub(crate) fn begin() -> Self {
        let id = next_trace_id();
        TRACE_STACK.with(|s| s.borrow_mut().push(Tape::new(id)));
        Self {
            id,
            finished: false,
        }
    }

    /// The session's trace id.
    pub(crate) fn id(&self) -> TraceId {
        self.id
    }

    /// Close the session and take ownership of its tape.
    pub(crate) fn finish(mut self) -> Tape {
        self.finished = true;
        let tape = TRACE_STACK
            .with(|s| s.borrow_mut().pop())
            .expect("trace stack empty on finish");
        debug_assert_eq!(tape.trace_id(), self.id);
        tape
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        if !self.finished {
            TRACE_STACK.with(|s| {
                s.borrow_mut().pop();
            });
        }
    }
}
