//! Member types: the nodes and objects that populate a tree node.
//!
//! The engine only reads [`Member::vector`] (and [`Member::n_leaves`] for the
//! leaf-count ordering); every other field is carried for display.

use serde::{Deserialize, Serialize};

/// Identifier of an internal tree node.
pub type NodeId = i64;

/// Identifier of a leaf object.
pub type ObjectId = String;

/// An internal tree node with its aggregated statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,

    /// Parent node, `None` for a project root.
    pub parent_id: Option<NodeId>,

    pub name: Option<String>,

    /// Number of direct child nodes.
    pub n_children: usize,

    /// Mean of all contained leaf feature vectors.
    pub centroid: Vec<f32>,

    /// User-designated reference member.
    pub starred: bool,

    pub approved: bool,

    /// Number of leaf aggregates (direct objects plus sub-node leaves).
    pub n_leaves: usize,

    /// Number of objects anywhere below this node.
    pub n_objects_deep: usize,
}

/// A leaf object with its feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub object_id: ObjectId,
    pub vector: Vec<f32>,
}

/// A member of a node: either a child node or a leaf object.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Node(NodeRecord),
    Object(ObjectRecord),
}

impl Member {
    /// The vector the engine works on: centroid for nodes, features for objects.
    pub fn vector(&self) -> &[f32] {
        match self {
            Member::Node(n) => &n.centroid,
            Member::Object(o) => &o.vector,
        }
    }

    /// Count of contained leaf objects (0 for plain objects).
    pub fn n_leaves(&self) -> usize {
        match self {
            Member::Node(n) => n.n_leaves,
            Member::Object(_) => 0,
        }
    }

    pub fn is_starred(&self) -> bool {
        matches!(self, Member::Node(n) if n.starred)
    }

    pub fn as_node(&self) -> Option<&NodeRecord> {
        match self {
            Member::Node(n) => Some(n),
            Member::Object(_) => None,
        }
    }
}

impl From<NodeRecord> for Member {
    fn from(node: NodeRecord) -> Self {
        Member::Node(node)
    }
}

impl From<ObjectRecord> for Member {
    fn from(object: ObjectRecord) -> Self {
        Member::Object(object)
    }
}

/// Apply a permutation returned by the engine. An empty permutation keeps the order.
pub fn apply_order<T>(items: Vec<T>, order: &[usize]) -> Vec<T> {
    if order.is_empty() {
        return items;
    }
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots.get_mut(i)?.take()).collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_vector_capability() {
        let n: Member = node(1, vec![1.0, 2.0], true).into();
        let o: Member = object("a", vec![3.0, 4.0]).into();
        assert_eq!(n.vector(), &[1.0, 2.0]);
        assert_eq!(o.vector(), &[3.0, 4.0]);
        assert!(n.is_starred());
        assert!(!o.is_starred());
        assert_eq!(o.n_leaves(), 0);
    }

    #[test]
    fn test_apply_order() {
        assert_eq!(apply_order(vec!['a', 'b', 'c'], &[2, 0, 1]), vec!['c', 'a', 'b']);
        assert_eq!(apply_order(vec!['a', 'b'], &[]), vec!['a', 'b']);
    }
}
