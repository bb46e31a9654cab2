//! Gradient drivers.

use crate::backward::backward;
use crate::error::AdError;
use crate::tape::Provenance;
use crate::tensor::Tensor;
use crate::trace::TraceGuard;
use crate::value::Value;

/// Construct the gradient function of a scalar-valued function.
///
/// `grad(f)` returns a function that evaluates `f` under a fresh trace and
/// runs the backward pass, yielding the gradient of `f` at the given point
/// with the same shape as the input. The returned function can itself be
/// passed back to `grad` for higher-order derivatives.
///
/// If `f`'s output never touched its input, the gradient is zero; if the
/// output is not scalar-shaped, the call fails with
/// [`AdError::NonScalarTarget`] before any backward work happens.
///
/// # Examples
///
/// ```
/// use tapegrad::{grad, ops, Value};
///
/// // d(x^2)/dx = 2x
/// let df = grad(|x: &Value| ops::mul(x, x));
/// let g = df(&Value::scalar(3.0)).unwrap();
/// assert_eq!(g.item(), Some(6.0));
///
/// // d2(x^2)/dx2 = 2
/// let ddf = grad(grad(|x: &Value| ops::mul(x, x)));
/// let g2 = ddf(&Value::scalar(3.0)).unwrap();
/// assert_eq!(g2.item(), Some(2.0));
/// ```
pub fn grad<F>(fun: F) -> impl Fn(&Value) -> Result<Value, AdError>
where
    F: Fn(&Value) -> Result<Value, AdError>,
{
    move |x: &Value| differentiate(&fun, x).map(|(_, g)| g)
}

/// Like [`grad`], but also returns the function's value at the point.
///
/// # Examples
///
/// ```
/// use tapegrad::{ops, value_and_grad, Value};
///
/// let vg = value_and_grad(|x: &Value| ops::mul(x, x));
/// let (y, g) = vg(&Value::scalar(3.0)).unwrap();
/// assert_eq!(y.item(), Some(9.0));
/// assert_eq!(g.item(), Some(6.0));
/// ```
pub fn value_and_grad<F>(fun: F) -> impl Fn(&Value) -> Result<(Value, Value), AdError>
where
    F: Fn(&Value) -> Result<Value, AdError>,
{
    move |x: &Value| differentiate(&fun, x)
}

/// One full differentiation: open a trace, box the input, run the
/// function, validate the output, sweep backward, close the trace.
fn differentiate<F>(fun: &F, x: &Value) -> Result<(Value, Value), AdError>
where
    F: Fn(&Value) -> Result<Value, AdError>,
{
    let guard = TraceGuard::begin();
    let trace = guard.id();
    let start = Value::traced(x.clone(), trace, Provenance::Start);

    let out = fun(&start);
    // Close the session before propagating any error, so a failing user
    // function cannot leave the trace stack dangling.
    let tape = guard.finish();
    let out = out?;

    let out_shape = out.raw().shape().to_vec();
    if !out.raw().is_scalar() {
        return Err(AdError::NonScalarTarget { shape: out_shape });
    }

    match &out {
        Value::Traced(end) if end.trace() == trace => {
            let value = end.value().clone();
            let gradient = match end.provenance() {
                Provenance::Node(node) => {
                    let seed = Value::Plain(Tensor::ones(&out_shape));
                    backward(&tape, node, seed)?
                        .unwrap_or_else(|| Value::Plain(Tensor::zeros(x.raw().shape())))
                }
                // The function returned its input unchanged; the gradient
                // is the seed itself.
                Provenance::Start => Value::Plain(Tensor::ones(&out_shape)),
            };
            Ok((value, gradient))
        }
        // No primitive ever touched the boxed input: the function is
        // constant with respect to it and the gradient is zero.
        _ => {
            let zero = Value::Plain(Tensor::zeros(x.raw().shape()));
            Ok((out, zero))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    #[test]
    fn test_grad_square() {
        let df = grad(|x: &Value| ops::mul(x, x));
        let g = df(&Value::scalar(3.0)).unwrap();
        assert_eq!(g.item(), Some(6.0));
        assert!(!g.is_traced());
    }

    #[test]
    fn test_grad_constant_function_is_zero() {
        let df = grad(|_x: &Value| Ok(Value::scalar(5.0)));
        let g = df(&Value::scalar(2.0)).unwrap();
        assert_eq!(g.item(), Some(0.0));
    }

    #[test]
    fn test_grad_identity_is_one() {
        let df = grad(|x: &Value| Ok(x.clone()));
        let g = df(&Value::scalar(7.0)).unwrap();
        assert_eq!(g.item(), Some(1.0));
    }

    #[test]
    fn test_non_scalar_target_rejected() {
        let v = Value::from(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
        let df = grad(|x: &Value| ops::neg(x));
        let result = df(&v);
        match result {
            Err(AdError::NonScalarTarget { shape }) => assert_eq!(shape, vec![2]),
            other => panic!("expected NonScalarTarget, got {other:?}"),
        }
    }

    #[test]
    fn test_error_in_function_unwinds_cleanly() {
        let bad = grad(|x: &Value| {
            let v = Value::from(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
            ops::add(x, &v).and_then(|arr| {
                let w = Value::from(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
                ops::add(&arr, &w)
            })
        });
        assert!(bad(&Value::scalar(1.0)).is_err());

        // The trace stack must be clean afterwards: a fresh grad call
        // still works.
        let df = grad(|x: &Value| ops::mul(x, x));
        assert_eq!(df(&Value::scalar(2.0)).unwrap().item(), Some(4.0));
    }

    #[test]
    fn test_value_and_grad() {
        let vg = value_and_grad(|x: &Value| ops::exp(x));
        let (y, g) = vg(&Value::scalar(0.0)).unwrap();
        assert_eq!(y.item(), Some(1.0));
        assert_eq!(g.item(), Some(1.0));
    }
}
