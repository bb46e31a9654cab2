//! Primitive registry.
//!
//! Associates each wrapped operation with its raw kernel and one optional
//! gradient-rule maker per positional argument. The registry is process
//! wide, populated at startup, and read-only during tracing; a missing
//! rule is only reported when the backward pass actually needs it.

use crate::error::AdError;
use crate::tensor::Tensor;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, RwLock};

/// Name-keyed identity of a registered primitive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveId(&'static str);

impl PrimitiveId {
    /// Create an id from a static name. Two ids with the same name denote
    /// the same operation.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The primitive's name.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Raw kernel: evaluates the primitive on unboxed tensors.
pub type RawFn = fn(&[&Tensor]) -> Result<Tensor, AdError>;

/// Vector-Jacobian product: maps the gradient of the output to the
/// gradient contribution for one argument.
pub type VjpFn = Box<dyn Fn(&Value) -> Result<Value, AdError>>;

/// Builds the [`VjpFn`] for one argument from the primitive's output value,
/// output shape, and argument values. Must be pure; evaluated lazily during
/// the backward pass, never during the forward trace.
pub type VjpMaker = fn(&Value, &[usize], &[Value]) -> VjpFn;

/// A registered primitive: raw kernel plus gradient-rule makers, one slot
/// per positional argument (`None` marks a non-differentiable position).
#[derive(Debug, Clone)]
pub struct PrimitiveDef {
    pub id: PrimitiveId,
    pub raw: RawFn,
    pub vjps: Vec<Option<VjpMaker>>,
}

static REGISTRY: LazyLock<RwLock<HashMap<&'static str, PrimitiveDef>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register a primitive, replacing any previous registration of the same
/// id. Intended to run at startup; re-registering is idempotent (last
/// write wins).
pub fn register(def: PrimitiveDef) {
    REGISTRY
        .write()
        .expect("primitive registry poisoned")
        .insert(def.id.name(), def);
}

/// Look up a registered primitive.
pub(crate) fn lookup(op: PrimitiveId) -> Result<PrimitiveDef, AdError> {
    REGISTRY
        .read()
        .expect("primitive registry poisoned")
        .get(op.name())
        .cloned()
        .ok_or(AdError::UnknownPrimitive { op })
}

/// Return a dispatch-aware version of a registered primitive.
///
/// The returned closure scans its arguments for traced values and either
/// evaluates the raw kernel directly or records a node in the governing
/// trace; see [`crate::apply`].
pub fn wrap(op: PrimitiveId) -> impl Fn(&[Value]) -> Result<Value, AdError> {
    move |args| crate::tracer::apply(op, args)
}
