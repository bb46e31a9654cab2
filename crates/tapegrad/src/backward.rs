//! Backward pass: reverse sweep with gradient accumulation.

use crate::error::AdError;
use crate::ops;
use crate::registry;
use crate::tape::{NodeId, Provenance, Tape};
use crate::value::Value;
use std::collections::HashMap;

/// Propagate vector-Jacobian products from `end` back to the start marker.
///
/// Nodes are visited in reverse creation order, which is a valid reverse
/// topological order because parents are always created strictly before
/// their children. For each visited node the accumulated output gradient
/// is pulled out of the map, the gradient rule for each recorded parent is
/// built lazily from the node's saved output and argument values, and the
/// resulting contribution is added into the parent's entry, so gradients
/// from every consumer of a value sum. Constants were never recorded as parents
/// and so never appear in the map.
///
/// The accumulation arithmetic goes through the wrapped `add` primitive,
/// so a backward pass running under an outer trace is itself traced;
/// gradients of gradients come out of the same machinery.
///
/// Returns the gradient accumulated at the start marker, or `None` if the
/// sweep never reached it.
///
/// # Errors
///
/// [`AdError::UngradableOperation`] if a visited node's primitive has no
/// gradient rule for an argument position that was traced.
pub(crate) fn backward(tape: &Tape, end: NodeId, seed: Value) -> Result<Option<Value>, AdError> {
    let mut outgrads: HashMap<usize, Value> = HashMap::new();
    outgrads.insert(end.index(), seed);
    let mut start_grad: Option<Value> = None;

    for idx in (0..=end.index()).rev() {
        // Nodes never reached from `end` accumulate nothing and are skipped.
        let grad_output = match outgrads.remove(&idx) {
            Some(g) => g,
            None => continue,
        };
        let node = &tape.nodes()[idx];
        let def = registry::lookup(node.op())?;

        for &(argnum, parent) in node.parents() {
            let maker = def.vjps.get(argnum).copied().flatten().ok_or(
                AdError::UngradableOperation {
                    op: node.op(),
                    argnum,
                },
            )?;
            let vjp = maker(node.value(), node.shape(), node.argvals());
            let contribution = vjp(&grad_output)?;

            match parent {
                Provenance::Node(pid) => {
                    let merged = match outgrads.remove(&pid.index()) {
                        Some(prev) => ops::add(&prev, &contribution)?,
                        None => contribution,
                    };
                    outgrads.insert(pid.index(), merged);
                }
                Provenance::Start => {
                    start_grad = Some(match start_grad.take() {
                        Some(prev) => ops::add(&prev, &contribution)?,
                        None => contribution,
                    });
                }
            }
        }
    }

    Ok(start_grad)
}
