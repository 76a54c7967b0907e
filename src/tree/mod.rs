//! Tree/storage collaborator boundary.
//!
//! The explorer reads node and object records through [`Tree`] and writes
//! relocations, new subnodes and audit records back through it. Callers own
//! the transactional scope; [`memory::MemoryTree`] provides snapshot
//! transactions for the in-process deployment.

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::member::{NodeId, NodeRecord, ObjectId, ObjectRecord};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("Cannot move node {node} below itself (target {target})")]
    Cycle { node: NodeId, target: NodeId },

    #[error("Object {object_id} has dimensionality {found}, tree uses {expected}")]
    Dimension {
        object_id: ObjectId,
        expected: usize,
        found: usize,
    },
}

/// Which direct children to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildFilter {
    #[default]
    All,
    Starred,
    Unstarred,
}

impl ChildFilter {
    pub fn accepts(&self, node: &NodeRecord) -> bool {
        match self {
            ChildFilter::All => true,
            ChildFilter::Starred => node.starred,
            ChildFilter::Unstarred => !node.starred,
        }
    }
}

/// Flag and name changes applied to one node. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.starred.is_none() && self.approved.is_none()
    }
}

/// Operations consumed from the tree/storage backend.
pub trait Tree {
    fn get_node(&self, node_id: NodeId) -> Result<NodeRecord, TreeError>;

    /// Direct child nodes of `node_id`.
    fn get_children(&self, node_id: NodeId, filter: ChildFilter) -> Result<Vec<NodeRecord>, TreeError>;

    /// Objects located directly in `node_id`.
    fn get_objects(&self, node_id: NodeId) -> Result<Vec<ObjectRecord>, TreeError>;

    /// Node ids from the project root down to `node_id`.
    fn get_path(&self, node_id: NodeId) -> Result<Vec<NodeId>, TreeError>;

    /// Nodes that could be adopted by `node_id`, best first.
    fn recommend_children(&self, node_id: NodeId, max_n: usize) -> Result<Vec<NodeRecord>, TreeError>;

    /// Objects that could be adopted by `node_id`, best first.
    fn recommend_objects(&self, node_id: NodeId, max_n: usize) -> Result<Vec<ObjectRecord>, TreeError>;

    fn create_node(&mut self, parent_id: NodeId, name: Option<&str>) -> Result<NodeId, TreeError>;

    fn update_node(&mut self, node_id: NodeId, update: &NodeUpdate) -> Result<(), TreeError>;

    /// Move nodes below `target`. With `unapprove`, moved nodes lose their approval.
    fn relocate_nodes(&mut self, node_ids: &[NodeId], target: NodeId, unapprove: bool) -> Result<(), TreeError>;

    /// Move objects into `target`. With `unapprove`, `target` loses its approval.
    fn relocate_objects(&mut self, object_ids: &[ObjectId], target: NodeId, unapprove: bool) -> Result<(), TreeError>;

    fn append_audit_log(&mut self, action: &str, node_id: Option<NodeId>) -> Result<(), TreeError>;
}
