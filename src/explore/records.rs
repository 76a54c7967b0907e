//! Caller-facing member records.

use serde::{Deserialize, Serialize};

use crate::engine::member::{Member, NodeId, NodeRecord, ObjectId, ObjectRecord};
use crate::tree::{Tree, TreeError};

/// Icon category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeIcon {
    Star,
    Approval,
    HexagonMultiple,
}

impl NodeIcon {
    pub fn for_node(node: &NodeRecord) -> Self {
        if node.starred {
            NodeIcon::Star
        } else if node.approved {
            NodeIcon::Approval
        } else {
            NodeIcon::HexagonMultiple
        }
    }
}

/// Display record of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub node_id: NodeId,
    pub id: NodeId,
    pub path: Vec<NodeId>,
    pub text: String,
    pub name: String,
    pub children: bool,
    pub n_children: usize,
    pub icon: NodeIcon,
    pub starred: bool,
    pub approved: bool,
    pub n_objects_deep: usize,
}

/// Display record of an object: only its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectView {
    pub object_id: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRecord {
    Node(NodeView),
    Object(ObjectView),
}

impl NodeView {
    pub fn new(node: &NodeRecord, path: Vec<NodeId>) -> Self {
        let name = node.name.clone().unwrap_or_else(|| node.node_id.to_string());
        Self {
            node_id: node.node_id,
            id: node.node_id,
            path,
            text: format!("{} ({})", name, node.n_children),
            name,
            children: node.n_children > 0,
            n_children: node.n_children,
            icon: NodeIcon::for_node(node),
            starred: node.starred,
            approved: node.approved,
            n_objects_deep: node.n_objects_deep,
        }
    }

    /// View of `node` with its path looked up in `tree`.
    pub fn load<T: Tree + ?Sized>(tree: &T, node: &NodeRecord) -> Result<Self, TreeError> {
        Ok(Self::new(node, tree.get_path(node.node_id)?))
    }
}

impl From<&ObjectRecord> for ObjectView {
    fn from(object: &ObjectRecord) -> Self {
        Self {
            object_id: object.object_id.clone(),
        }
    }
}

impl MemberRecord {
    pub fn load<T: Tree + ?Sized>(tree: &T, member: &Member) -> Result<Self, TreeError> {
        Ok(match member {
            Member::Node(node) => MemberRecord::Node(NodeView::load(tree, node)?),
            Member::Object(object) => MemberRecord::Object(object.into()),
        })
    }
}
