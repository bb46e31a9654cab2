//! Node arena for one trace session.
//!
//! Nodes are appended in forward execution order and never mutated, so a
//! reverse index scan of the arena is a valid reverse topological order:
//! a node can only reference parents created strictly earlier.

use crate::registry::PrimitiveId;
use crate::trace::TraceId;
use crate::value::Value;
use smallvec::SmallVec;

/// Index of a node within its trace's tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Where a traced value came from.
///
/// `Start` marks the originally boxed input of the session, the root the
/// backward pass terminates at. `Node` points at the recording of the
/// primitive application that produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Start,
    Node(NodeId),
}

/// Record of one primitive application during tracing.
///
/// Immutable once pushed. `argvals` holds every argument unboxed one level
/// relative to this node's trace; values boxed by outer traces stay boxed,
/// which is what lets the backward pass itself be traced. `parents` lists
/// only the argument positions that were boxed in this trace; plain
/// constants contribute no parent and therefore no gradient.
#[derive(Debug)]
pub(crate) struct Node {
    op: PrimitiveId,
    value: Value,
    shape: Vec<usize>,
    argvals: Vec<Value>,
    parents: SmallVec<[(usize, Provenance); 2]>,
}

impl Node {
    pub(crate) fn new(
        op: PrimitiveId,
        value: Value,
        shape: Vec<usize>,
        argvals: Vec<Value>,
        parents: SmallVec<[(usize, Provenance); 2]>,
    ) -> Self {
        Self {
            op,
            value,
            shape,
            argvals,
            parents,
        }
    }

    pub(crate) fn op(&self) -> PrimitiveId {
        self.op
    }

    pub(crate) fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub(crate) fn argvals(&self) -> &[Value] {
        &self.argvals
    }

    pub(crate) fn parents(&self) -> &[(usize, Provenance)] {
        &self.parents
    }
}

/// The node arena owned by one trace session.
///
/// Dropped, together with every node in it, when the `grad` call that
/// opened the session returns.
#[derive(Debug)]
pub(crate) struct Tape {
    trace: TraceId,
    nodes: Vec<Node>,
}

impl Tape {
    pub(crate) fn new(trace: TraceId) -> Self {
        Self {
            trace,
            nodes: Vec::new(),
        }
    }

    pub(crate) fn trace_id(&self) -> TraceId {
        self.trace
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceGuard;

    fn dummy_node(parents: SmallVec<[(usize, Provenance); 2]>) -> Node {
        Node::new(
            PrimitiveId::new("test"),
            Value::scalar(1.0),
            Vec::new(),
            vec![Value::scalar(1.0)],
            parents,
        )
    }

    #[test]
    fn test_push_assigns_creation_order_ids() {
        let trace = TraceGuard::begin().finish().trace_id();
        let mut tape = Tape::new(trace);

        let a = tape.push(dummy_node(SmallVec::new()));
        let b = tape.push(dummy_node(SmallVec::from_iter([(0, Provenance::Node(a))])));

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(tape.nodes().len(), 2);
        assert_eq!(tape.nodes()[1].parents(), &[(0, Provenance::Node(a))]);
    }

    #[test]
    fn test_node_records_op_and_shape() {
        let node = dummy_node(SmallVec::from_iter([(0, Provenance::Start)]));
        assert_eq!(node.op().name(), "test");
        assert_eq!(node.shape(), &[] as &[usize]);
        assert_eq!(node.argvals().len(), 1);
    }
}
