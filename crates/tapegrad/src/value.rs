//! Traced values.
//!
//! [`Value`] is the sum type the dispatch layer branches on: either a plain
//! tensor, or a boxed tensor carrying provenance within one trace session.
//! The inner value of a box is itself a [`Value`], so a value boxed by an
//! outer session can be boxed again by an inner one, the nesting that
//! enables higher-order differentiation.

use crate::tape::Provenance;
use crate::tensor::Tensor;
use crate::trace::TraceId;
use std::rc::Rc;

/// A numeric value flowing through a differentiable computation.
///
/// # Examples
///
/// ```
/// use tapegrad::{Tensor, Value};
///
/// let x = Value::scalar(2.0);
/// assert_eq!(x.item(), Some(2.0));
/// assert!(!x.is_traced());
///
/// let v = Value::from(Tensor::ones(&[3]));
/// assert_eq!(v.shape(), &[3]);
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// An untraced tensor; primitives applied to it evaluate eagerly.
    Plain(Tensor),
    /// A tensor boxed by an open trace session.
    Traced(Rc<TracedValue>),
}

/// Provenance record attached to a boxed value: the value itself (possibly
/// boxed by an outer trace), the trace that created the box, and the node
/// or start marker that produced it.
#[derive(Debug)]
pub struct TracedValue {
    value: Value,
    trace: TraceId,
    provenance: Provenance,
}

impl TracedValue {
    /// The wrapped value, unboxed one level.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The trace this box belongs to.
    pub fn trace(&self) -> TraceId {
        self.trace
    }

    /// The node (or start marker) that produced this box.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

impl Value {
    /// Create a plain rank-0 value.
    pub fn scalar(value: f64) -> Self {
        Value::Plain(Tensor::scalar(value))
    }

    /// Box a value under the given trace.
    pub(crate) fn traced(value: Value, trace: TraceId, provenance: Provenance) -> Self {
        Value::Traced(Rc::new(TracedValue {
            value,
            trace,
            provenance,
        }))
    }

    /// Unwrap to the underlying tensor, through any number of boxes.
    pub fn raw(&self) -> &Tensor {
        match self {
            Value::Plain(t) => t,
            Value::Traced(b) => b.value.raw(),
        }
    }

    /// Shape of the underlying tensor.
    pub fn shape(&self) -> &[usize] {
        self.raw().shape()
    }

    /// The single element of a scalar value, `None` otherwise.
    pub fn item(&self) -> Option<f64> {
        self.raw().item()
    }

    /// Check whether this value is boxed by some trace.
    pub fn is_traced(&self) -> bool {
        matches!(self, Value::Traced(_))
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Value::Plain(tensor)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::scalar(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceGuard;

    #[test]
    fn test_plain_value_accessors() {
        let v = Value::from(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
        assert_eq!(v.shape(), &[2]);
        assert_eq!(v.item(), None);
        assert!(!v.is_traced());
    }

    #[test]
    fn test_scalar_conversion() {
        let v: Value = 4.5.into();
        assert_eq!(v.item(), Some(4.5));
    }

    #[test]
    fn test_raw_unwraps_nested_boxes() {
        let outer = TraceGuard::begin();
        let inner = TraceGuard::begin();

        let plain = Value::scalar(3.0);
        let once = Value::traced(plain, outer.id(), Provenance::Start);
        let twice = Value::traced(once, inner.id(), Provenance::Start);

        assert!(twice.is_traced());
        assert_eq!(twice.raw().item(), Some(3.0));
        match &twice {
            Value::Traced(b) => {
                assert_eq!(b.trace(), inner.id());
                assert_eq!(b.provenance(), Provenance::Start);
                assert!(b.value().is_traced());
            }
            Value::Plain(_) => unreachable!(),
        }

        inner.finish();
        outer.finish();
    }
}
