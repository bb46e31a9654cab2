//! tapegrad - tape-based reverse-mode automatic differentiation.
//!
//! Gradients of scalar-valued numeric functions are computed by tracing:
//! wrapped primitives applied to traced values record themselves into a
//! per-session tape as a side effect of ordinary execution, and a reverse
//! sweep over that tape propagates vector-Jacobian products back to the
//! input. Trace sessions nest, so the gradient function returned by
//! [`grad`] can itself be differentiated.
//!
//! # Architecture
//!
//! ```text
//! grad(f)(x)
//!   │ opens a trace session, boxes x
//!   ▼
//! Value::Traced ──wrapped primitive──► tracer::apply
//!   │                                      │ records
//!   ▼                                      ▼
//! Tensor (plain data)               Tape (Vec<Node>, per session)
//!                                          │ reverse scan
//!                                          ▼
//!                                   backward pass (VJP accumulation)
//! ```
//!
//! # Example
//!
//! ```
//! use tapegrad::{grad, ops, Value};
//!
//! // f(x) = sin(x) * exp(x)
//! let f = |x: &Value| ops::mul(&ops::sin(x)?, &ops::exp(x)?);
//!
//! let df = grad(f);
//! let g = df(&Value::scalar(1.0)).unwrap();
//!
//! // f'(x) = (cos(x) + sin(x)) * exp(x)
//! let expected = (1.0_f64.cos() + 1.0_f64.sin()) * 1.0_f64.exp();
//! assert!((g.item().unwrap() - expected).abs() < 1e-12);
//! ```
//!
//! # Key types
//!
//! - [`Value`]: a plain or traced numeric value
//! - [`grad`] / [`value_and_grad`]: differentiation drivers
//! - [`register`] / [`wrap`]: hooks for user-defined primitives
//! - [`ops`]: the default primitive table

pub mod error;
pub mod ops;
pub mod registry;
pub mod tensor;
pub mod value;

mod backward;
mod grad;
mod tape;
mod trace;
mod tracer;

pub use error::AdError;
pub use grad::{grad, value_and_grad};
pub use registry::{register, wrap, PrimitiveDef, PrimitiveId, RawFn, VjpFn, VjpMaker};
pub use tape::{NodeId, Provenance};
pub use tensor::Tensor;
pub use trace::TraceId;
pub use tracer::apply;
pub use value::{TracedValue, Value};
