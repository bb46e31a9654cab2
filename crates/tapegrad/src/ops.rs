//! Default primitives and their gradient rules.
//!
//! Each public function here is the dispatch-aware version of one raw
//! kernel, registered together with one VJP maker per differentiable
//! argument. The rules themselves are written in terms of these wrapped
//! functions, so evaluating a rule under an outer trace records into that
//! trace. This is what makes gradients of gradients work.

use crate::error::AdError;
use crate::registry::{register, PrimitiveDef, PrimitiveId, VjpFn};
use crate::tensor::Tensor;
use crate::tracer::apply;
use crate::value::Value;
use std::sync::Once;

pub const ADD: PrimitiveId = PrimitiveId::new("add");
pub const SUB: PrimitiveId = PrimitiveId::new("sub");
pub const MUL: PrimitiveId = PrimitiveId::new("mul");
pub const DIV: PrimitiveId = PrimitiveId::new("div");
pub const POW: PrimitiveId = PrimitiveId::new("pow");
pub const NEG: PrimitiveId = PrimitiveId::new("neg");
pub const EXP: PrimitiveId = PrimitiveId::new("exp");
pub const LOG: PrimitiveId = PrimitiveId::new("log");
pub const SQRT: PrimitiveId = PrimitiveId::new("sqrt");
pub const SIN: PrimitiveId = PrimitiveId::new("sin");
pub const COS: PrimitiveId = PrimitiveId::new("cos");
pub const SINH: PrimitiveId = PrimitiveId::new("sinh");
pub const COSH: PrimitiveId = PrimitiveId::new("cosh");
pub const TANH: PrimitiveId = PrimitiveId::new("tanh");
pub const SUM: PrimitiveId = PrimitiveId::new("sum");
pub const DOT: PrimitiveId = PrimitiveId::new("dot");
pub const FLOOR: PrimitiveId = PrimitiveId::new("floor");

static INSTALL: Once = Once::new();

/// Register the default primitive table. Idempotent; every wrapped
/// function below calls this, so explicit installation is only needed
/// when going through [`crate::registry::wrap`] directly.
pub fn install_default_primitives() {
    INSTALL.call_once(install);
}

fn install() {
    register(PrimitiveDef {
        id: ADD,
        raw: raw_add,
        vjps: vec![Some(add_vjp0), Some(add_vjp1)],
    });
    register(PrimitiveDef {
        id: SUB,
        raw: raw_sub,
        vjps: vec![Some(sub_vjp0), Some(sub_vjp1)],
    });
    register(PrimitiveDef {
        id: MUL,
        raw: raw_mul,
        vjps: vec![Some(mul_vjp0), Some(mul_vjp1)],
    });
    register(PrimitiveDef {
        id: DIV,
        raw: raw_div,
        vjps: vec![Some(div_vjp0), Some(div_vjp1)],
    });
    register(PrimitiveDef {
        id: POW,
        raw: raw_pow,
        vjps: vec![Some(pow_vjp0), Some(pow_vjp1)],
    });
    register(PrimitiveDef {
        id: NEG,
        raw: raw_neg,
        vjps: vec![Some(neg_vjp0)],
    });
    register(PrimitiveDef {
        id: EXP,
        raw: raw_exp,
        vjps: vec![Some(exp_vjp0)],
    });
    register(PrimitiveDef {
        id: LOG,
        raw: raw_log,
        vjps: vec![Some(log_vjp0)],
    });
    register(PrimitiveDef {
        id: SQRT,
        raw: raw_sqrt,
        vjps: vec![Some(sqrt_vjp0)],
    });
    register(PrimitiveDef {
        id: SIN,
        raw: raw_sin,
        vjps: vec![Some(sin_vjp0)],
    });
    register(PrimitiveDef {
        id: COS,
        raw: raw_cos,
        vjps: vec![Some(cos_vjp0)],
    });
    register(PrimitiveDef {
        id: SINH,
        raw: raw_sinh,
        vjps: vec![Some(sinh_vjp0)],
    });
    register(PrimitiveDef {
        id: COSH,
        raw: raw_cosh,
        vjps: vec![Some(cosh_vjp0)],
    });
    register(PrimitiveDef {
        id: TANH,
        raw: raw_tanh,
        vjps: vec![Some(tanh_vjp0)],
    });
    register(PrimitiveDef {
        id: SUM,
        raw: raw_sum,
        vjps: vec![Some(sum_vjp0)],
    });
    register(PrimitiveDef {
        id: DOT,
        raw: raw_dot,
        vjps: vec![Some(dot_vjp0), Some(dot_vjp1)],
    });
    // No gradient rules: tracing through floor succeeds, but asking for
    // its gradient fails lazily in the backward pass.
    register(PrimitiveDef {
        id: FLOOR,
        raw: raw_floor,
        vjps: vec![],
    });
}

fn apply1(op: PrimitiveId, x: &Value) -> Result<Value, AdError> {
    install_default_primitives();
    apply(op, std::slice::from_ref(x))
}

fn apply2(op: PrimitiveId, a: &Value, b: &Value) -> Result<Value, AdError> {
    install_default_primitives();
    apply(op, &[a.clone(), b.clone()])
}

/// Element-wise addition with scalar broadcasting.
pub fn add(a: &Value, b: &Value) -> Result<Value, AdError> {
    apply2(ADD, a, b)
}

/// Element-wise subtraction with scalar broadcasting.
pub fn sub(a: &Value, b: &Value) -> Result<Value, AdError> {
    apply2(SUB, a, b)
}

/// Element-wise multiplication with scalar broadcasting.
pub fn mul(a: &Value, b: &Value) -> Result<Value, AdError> {
    apply2(MUL, a, b)
}

/// Element-wise division with scalar broadcasting.
pub fn div(a: &Value, b: &Value) -> Result<Value, AdError> {
    apply2(DIV, a, b)
}

/// Element-wise power `a^b` with scalar broadcasting.
pub fn pow(a: &Value, b: &Value) -> Result<Value, AdError> {
    apply2(POW, a, b)
}

/// Element-wise negation.
pub fn neg(x: &Value) -> Result<Value, AdError> {
    apply1(NEG, x)
}

/// Element-wise exponential.
pub fn exp(x: &Value) -> Result<Value, AdError> {
    apply1(EXP, x)
}

/// Element-wise natural logarithm.
pub fn log(x: &Value) -> Result<Value, AdError> {
    apply1(LOG, x)
}

/// Element-wise square root.
pub fn sqrt(x: &Value) -> Result<Value, AdError> {
    apply1(SQRT, x)
}

/// Element-wise sine.
pub fn sin(x: &Value) -> Result<Value, AdError> {
    apply1(SIN, x)
}

/// Element-wise cosine.
pub fn cos(x: &Value) -> Result<Value, AdError> {
    apply1(COS, x)
}

/// Element-wise hyperbolic sine.
pub fn sinh(x: &Value) -> Result<Value, AdError> {
    apply1(SINH, x)
}

/// Element-wise hyperbolic cosine.
pub fn cosh(x: &Value) -> Result<Value, AdError> {
    apply1(COSH, x)
}

/// Element-wise hyperbolic tangent.
pub fn tanh(x: &Value) -> Result<Value, AdError> {
    apply1(TANH, x)
}

/// Sum of all elements, as a rank-0 value.
pub fn sum(x: &Value) -> Result<Value, AdError> {
    apply1(SUM, x)
}

/// Inner product of two 1-D values of equal length.
pub fn dot(a: &Value, b: &Value) -> Result<Value, AdError> {
    apply2(DOT, a, b)
}

/// Element-wise floor. Traced but not differentiable.
pub fn floor(x: &Value) -> Result<Value, AdError> {
    apply1(FLOOR, x)
}

// ----- Raw kernels -----

fn raw_add(args: &[&Tensor]) -> Result<Tensor, AdError> {
    args[0].zip(args[1], |a, b| a + b)
}

fn raw_sub(args: &[&Tensor]) -> Result<Tensor, AdError> {
    args[0].zip(args[1], |a, b| a - b)
}

fn raw_mul(args: &[&Tensor]) -> Result<Tensor, AdError> {
    args[0].zip(args[1], |a, b| a * b)
}

fn raw_div(args: &[&Tensor]) -> Result<Tensor, AdError> {
    args[0].zip(args[1], |a, b| a / b)
}

fn raw_pow(args: &[&Tensor]) -> Result<Tensor, AdError> {
    args[0].zip(args[1], f64::powf)
}

fn raw_neg(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(|x| -x))
}

fn raw_exp(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::exp))
}

fn raw_log(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::ln))
}

fn raw_sqrt(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::sqrt))
}

fn raw_sin(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::sin))
}

fn raw_cos(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::cos))
}

fn raw_sinh(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::sinh))
}

fn raw_cosh(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::cosh))
}

fn raw_tanh(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::tanh))
}

fn raw_floor(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].map(f64::floor))
}

fn raw_sum(args: &[&Tensor]) -> Result<Tensor, AdError> {
    Ok(args[0].sum())
}

fn raw_dot(args: &[&Tensor]) -> Result<Tensor, AdError> {
    let (a, b) = (args[0], args[1]);
    if a.ndim() != 1 {
        return Err(AdError::RankMismatch {
            expected: 1,
            actual: a.ndim(),
        });
    }
    if b.ndim() != 1 {
        return Err(AdError::RankMismatch {
            expected: 1,
            actual: b.ndim(),
        });
    }
    if a.len() != b.len() {
        return Err(AdError::ShapeMismatch {
            lhs: a.shape().to_vec(),
            rhs: b.shape().to_vec(),
        });
    }
    let acc = a
        .data()
        .iter()
        .zip(b.data().iter())
        .map(|(x, y)| x * y)
        .sum();
    Ok(Tensor::scalar(acc))
}

// ----- Gradient rules -----

/// Undo scalar broadcasting: a gradient flowing back to an argument that
/// was broadcast over the other operand must be summed back down to the
/// argument's shape.
fn unbroadcast(target: &[usize], g: Value) -> Result<Value, AdError> {
    if g.shape() == target {
        Ok(g)
    } else if target.iter().product::<usize>() == 1 {
        sum(&g)
    } else {
        Err(AdError::ShapeMismatch {
            lhs: target.to_vec(),
            rhs: g.shape().to_vec(),
        })
    }
}

fn add_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[0].shape().to_vec();
    Box::new(move |g| unbroadcast(&target, g.clone()))
}

fn add_vjp1(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[1].shape().to_vec();
    Box::new(move |g| unbroadcast(&target, g.clone()))
}

fn sub_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[0].shape().to_vec();
    Box::new(move |g| unbroadcast(&target, g.clone()))
}

fn sub_vjp1(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[1].shape().to_vec();
    Box::new(move |g| unbroadcast(&target, neg(g)?))
}

fn mul_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[0].shape().to_vec();
    let y = args[1].clone();
    Box::new(move |g| unbroadcast(&target, mul(&y, g)?))
}

fn mul_vjp1(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[1].shape().to_vec();
    let x = args[0].clone();
    Box::new(move |g| unbroadcast(&target, mul(&x, g)?))
}

fn div_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[0].shape().to_vec();
    let y = args[1].clone();
    Box::new(move |g| unbroadcast(&target, div(g, &y)?))
}

fn div_vjp1(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[1].shape().to_vec();
    let x = args[0].clone();
    let y = args[1].clone();
    Box::new(move |g| {
        // -g * x / y^2
        let num = mul(g, &x)?;
        let den = mul(&y, &y)?;
        unbroadcast(&target, neg(&div(&num, &den)?)?)
    })
}

fn pow_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[0].shape().to_vec();
    let x = args[0].clone();
    let y = args[1].clone();
    Box::new(move |g| {
        // g * y * x^(y - 1)
        let exponent = sub(&y, &Value::scalar(1.0))?;
        let contrib = mul(&mul(g, &y)?, &pow(&x, &exponent)?)?;
        unbroadcast(&target, contrib)
    })
}

fn pow_vjp1(ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[1].shape().to_vec();
    let x = args[0].clone();
    let ans = ans.clone();
    Box::new(move |g| {
        // g * ln(x) * x^y, where x^y is the saved output
        let contrib = mul(&mul(g, &log(&x)?)?, &ans)?;
        unbroadcast(&target, contrib)
    })
}

fn neg_vjp0(_ans: &Value, _shape: &[usize], _args: &[Value]) -> VjpFn {
    Box::new(|g| neg(g))
}

fn exp_vjp0(ans: &Value, _shape: &[usize], _args: &[Value]) -> VjpFn {
    let ans = ans.clone();
    Box::new(move |g| mul(&ans, g))
}

fn log_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let x = args[0].clone();
    Box::new(move |g| div(g, &x))
}

fn sqrt_vjp0(ans: &Value, _shape: &[usize], _args: &[Value]) -> VjpFn {
    let ans = ans.clone();
    Box::new(move |g| div(g, &mul(&Value::scalar(2.0), &ans)?))
}

fn sin_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let x = args[0].clone();
    Box::new(move |g| mul(g, &cos(&x)?))
}

fn cos_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let x = args[0].clone();
    Box::new(move |g| neg(&mul(g, &sin(&x)?)?))
}

fn sinh_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let x = args[0].clone();
    Box::new(move |g| mul(g, &cosh(&x)?))
}

fn cosh_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let x = args[0].clone();
    Box::new(move |g| mul(g, &sinh(&x)?))
}

fn tanh_vjp0(ans: &Value, _shape: &[usize], _args: &[Value]) -> VjpFn {
    let ans = ans.clone();
    Box::new(move |g| {
        // g * (1 - tanh(x)^2), using the saved output
        mul(g, &sub(&Value::scalar(1.0), &mul(&ans, &ans)?)?)
    })
}

fn sum_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let target = args[0].shape().to_vec();
    Box::new(move |g| mul(g, &Value::Plain(Tensor::ones(&target))))
}

fn dot_vjp0(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let b = args[1].clone();
    Box::new(move |g| mul(g, &b))
}

fn dot_vjp1(_ans: &Value, _shape: &[usize], args: &[Value]) -> VjpFn {
    let a = args[0].clone();
    Box::new(move |g| mul(g, &a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unboxed_arithmetic() {
        let a = Value::scalar(3.0);
        let b = Value::scalar(4.0);
        assert_eq!(add(&a, &b).unwrap().item(), Some(7.0));
        assert_eq!(sub(&a, &b).unwrap().item(), Some(-1.0));
        assert_eq!(mul(&a, &b).unwrap().item(), Some(12.0));
        assert_eq!(div(&a, &b).unwrap().item(), Some(0.75));
        assert_eq!(pow(&a, &Value::scalar(2.0)).unwrap().item(), Some(9.0));
        assert_eq!(neg(&a).unwrap().item(), Some(-3.0));
    }

    #[test]
    fn test_unboxed_transcendentals() {
        let zero = Value::scalar(0.0);
        assert_eq!(exp(&zero).unwrap().item(), Some(1.0));
        assert_eq!(sin(&zero).unwrap().item(), Some(0.0));
        assert_eq!(cos(&zero).unwrap().item(), Some(1.0));
        assert_eq!(tanh(&zero).unwrap().item(), Some(0.0));
        assert_eq!(cosh(&zero).unwrap().item(), Some(1.0));

        let e = exp(&Value::scalar(1.0)).unwrap();
        assert_relative_eq!(log(&e).unwrap().item().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scalar_broadcasting() {
        let v = Value::from(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
        let s = Value::scalar(10.0);
        let out = mul(&v, &s).unwrap();
        assert_eq!(out.raw().data(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_sum_and_dot() {
        let v = Value::from(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
        let w = Value::from(Tensor::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap());

        assert_eq!(sum(&v).unwrap().item(), Some(6.0));
        assert_eq!(dot(&v, &w).unwrap().item(), Some(32.0));
    }

    #[test]
    fn test_dot_rejects_matrices() {
        let m = Value::from(Tensor::ones(&[2, 2]));
        let v = Value::from(Tensor::ones(&[4]));
        let result = dot(&m, &v);
        assert!(matches!(result, Err(AdError::RankMismatch { .. })));
    }

    #[test]
    fn test_dot_rejects_length_mismatch() {
        let v = Value::from(Tensor::ones(&[3]));
        let w = Value::from(Tensor::ones(&[4]));
        let result = dot(&v, &w);
        assert!(matches!(result, Err(AdError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_floor_forward_works_untraced() {
        let out = floor(&Value::scalar(2.7)).unwrap();
        assert_eq!(out.item(), Some(2.0));
    }
}
