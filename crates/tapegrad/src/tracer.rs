//! Dispatch layer for wrapped primitives.
//!
//! Every wrapped primitive funnels through [`apply`]: scan the arguments
//! for traced values, decide which trace (if any) governs the call, and
//! either evaluate eagerly or record a node and box the result.

use crate::error::AdError;
use crate::registry::{self, PrimitiveId};
use crate::tape::{Node, Provenance};
use crate::tensor::Tensor;
use crate::trace::{self, TraceId};
use crate::value::Value;
use smallvec::SmallVec;

/// Apply a registered primitive to the given arguments.
///
/// If no argument is boxed, the raw kernel runs directly on the plain
/// tensors, the fast path with no graph growth. Otherwise the innermost
/// trace among the boxed arguments governs the call: exactly those
/// arguments are unboxed one level, the primitive is re-applied to them
/// (re-tracing any outer sessions), a node is recorded, and the result is
/// boxed under the governing trace. Arguments boxed by other active traces
/// are passed through as opaque constants for this call; their own tracing
/// resumes once the inner session concludes.
///
/// # Errors
///
/// [`AdError::UnknownPrimitive`] if `op` was never registered, and
/// [`AdError::TraceLeak`] if an argument is boxed by a trace that is no
/// longer active.
pub fn apply(op: PrimitiveId, args: &[Value]) -> Result<Value, AdError> {
    match governing_trace(args)? {
        Some(trace) => apply_traced(op, args, trace),
        None => {
            let def = registry::lookup(op)?;
            let mut raws: Vec<&Tensor> = Vec::with_capacity(args.len());
            for arg in args {
                match arg {
                    Value::Plain(t) => raws.push(t),
                    Value::Traced(b) => {
                        return Err(AdError::TraceLeak { trace: b.trace() });
                    }
                }
            }
            (def.raw)(&raws).map(Value::Plain)
        }
    }
}

fn apply_traced(op: PrimitiveId, args: &[Value], trace: TraceId) -> Result<Value, AdError> {
    let mut argvals: Vec<Value> = Vec::with_capacity(args.len());
    let mut parents: SmallVec<[(usize, Provenance); 2]> = SmallVec::new();

    for (argnum, arg) in args.iter().enumerate() {
        match arg {
            Value::Traced(b) if b.trace() == trace => {
                parents.push((argnum, b.provenance()));
                argvals.push(b.value().clone());
            }
            _ => argvals.push(arg.clone()),
        }
    }

    // Re-apply to the partially unboxed arguments. This is the recursion
    // that also records the call into any outer traces still present in
    // `argvals`.
    let ans = apply(op, &argvals)?;
    let shape = ans.shape().to_vec();
    let node = Node::new(op, ans.clone(), shape, argvals, parents);
    let id = trace::record(trace, node)?;
    Ok(Value::traced(ans, trace, Provenance::Node(id)))
}

/// Find the innermost active trace among boxed arguments.
///
/// Trace ids increase strictly per thread, so the largest id among the
/// boxed arguments is the innermost session. A box whose trace is not on
/// the active stack is stale and reported as a [`AdError::TraceLeak`].
fn governing_trace(args: &[Value]) -> Result<Option<TraceId>, AdError> {
    let mut top: Option<TraceId> = None;
    for arg in args {
        if let Value::Traced(b) = arg {
            if top.map_or(true, |t| b.trace() > t) {
                top = Some(b.trace());
            }
        }
    }
    if let Some(trace) = top {
        if !trace::is_active(trace) {
            return Err(AdError::TraceLeak { trace });
        }
    }
    Ok(top)
}
