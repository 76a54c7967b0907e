//! Direct edits of the tree: node flags and member adoption.
//!
//! Both writes leave an audit record. Callers run them inside one tree
//! transaction, like classification.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::member::{NodeId, NodeRecord, ObjectId};
use crate::error::ExploreError;
use crate::tree::{ChildFilter, NodeUpdate, Tree};

/// A member named by id. Full node or object records are accepted too;
/// fields other than the id are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    Node { node_id: NodeId },
    Object { object_id: ObjectId },
}

/// Body of an adoption request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdoptRequest {
    pub members: Vec<MemberRef>,
}

/// Number of members moved by an adoption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdoptOutcome {
    pub n_nodes: usize,
    pub n_objects: usize,
}

/// Apply `update` to `node_id` and return the updated record.
pub fn update_node<T: Tree + ?Sized>(
    tree: &mut T,
    node_id: NodeId,
    update: &NodeUpdate,
) -> Result<NodeRecord, ExploreError> {
    tree.update_node(node_id, update)?;

    // serde_json::Value maps keep their keys sorted
    let fields = serde_json::to_value(update)?;
    tree.append_audit_log(&format!("update_node({fields})"), Some(node_id))?;

    info!(node_id, %fields, "Updated node");
    tree.get_node(node_id).map_err(ExploreError::from)
}

/// Move `members` below `parent_id`, nodes first.
pub fn adopt_members<T: Tree + ?Sized>(
    tree: &mut T,
    parent_id: NodeId,
    members: &[MemberRef],
) -> Result<AdoptOutcome, ExploreError> {
    let mut node_ids = Vec::new();
    let mut object_ids = Vec::new();
    for member in members {
        match member {
            MemberRef::Node { node_id } => node_ids.push(*node_id),
            MemberRef::Object { object_id } => object_ids.push(object_id.clone()),
        }
    }

    tree.relocate_nodes(&node_ids, parent_id, false)?;
    tree.relocate_objects(&object_ids, parent_id, false)?;
    tree.append_audit_log(
        &format!("adopt_members(nodes={},objects={})", node_ids.len(), object_ids.len()),
        Some(parent_id),
    )?;

    info!(parent_id, n_nodes = node_ids.len(), n_objects = object_ids.len(), "Adopted members");
    Ok(AdoptOutcome {
        n_nodes: node_ids.len(),
        n_objects: object_ids.len(),
    })
}

/// Objects below `node_id` that already sit in a starred node.
///
/// Counts the deep object totals of the topmost starred descendants; a
/// starred node inside a starred node is not counted twice.
pub fn n_sorted<T: Tree + ?Sized>(tree: &T, node_id: NodeId) -> Result<usize, ExploreError> {
    let mut total = 0;
    let mut pending = vec![node_id];
    while let Some(current) = pending.pop() {
        for child in tree.get_children(current, ChildFilter::All)? {
            if child.starred {
                total += child.n_objects_deep;
            } else {
                pending.push(child.node_id);
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::memory::MemoryTree;
    use crate::tree::TreeError;

    fn tree() -> (MemoryTree, NodeId, NodeId, NodeId) {
        let mut tree = MemoryTree::new();
        let root = tree.add_project("p");
        let a = tree.add_node(root, Some("a"), true).unwrap();
        let b = tree.add_node(root, Some("b"), false).unwrap();
        let inner = tree.add_node(b, Some("inner"), true).unwrap();
        let nested = tree.add_node(inner, Some("nested"), true).unwrap();
        tree.add_object(a, "a1", vec![0.0]).unwrap();
        tree.add_object(a, "a2", vec![0.0]).unwrap();
        tree.add_object(b, "b1", vec![1.0]).unwrap();
        tree.add_object(inner, "i1", vec![1.0]).unwrap();
        tree.add_object(nested, "n1", vec![1.0]).unwrap();
        tree.add_object(root, "loose", vec![2.0]).unwrap();
        (tree, root, a, b)
    }

    #[test]
    fn test_update_node_records_sorted_fields() {
        let (mut tree, _, _, b) = tree();
        let update = NodeUpdate {
            starred: Some(true),
            approved: Some(true),
            ..Default::default()
        };

        let node = update_node(&mut tree, b, &update).unwrap();
        assert!(node.starred);
        assert!(node.approved);
        assert_eq!(
            tree.audit_log().last().unwrap().action,
            r#"update_node({"approved":true,"starred":true})"#
        );
    }

    #[test]
    fn test_adopt_members_moves_nodes_and_objects() {
        let (mut tree, root, a, b) = tree();
        let members: Vec<MemberRef> =
            serde_json::from_str(r#"[{"node_id": 2, "name": "a", "starred": true}, {"object_id": "loose"}]"#).unwrap();
        assert_eq!(members[0], MemberRef::Node { node_id: a });

        let outcome = adopt_members(&mut tree, b, &members).unwrap();
        assert_eq!(outcome, AdoptOutcome { n_nodes: 1, n_objects: 1 });
        assert_eq!(tree.get_path(a).unwrap(), vec![root, b, a]);
        assert_eq!(tree.object_location("loose"), Some(b));
        assert_eq!(
            tree.audit_log().last().unwrap().action,
            "adopt_members(nodes=1,objects=1)"
        );
    }

    #[test]
    fn test_adopt_unknown_object_fails() {
        let (mut tree, _, a, _) = tree();
        let members = vec![MemberRef::Object { object_id: "missing".into() }];
        let err = tree.transaction(|t| adopt_members(t, a, &members)).unwrap_err();
        assert!(matches!(err, ExploreError::Tree(TreeError::ObjectNotFound(_))));
    }

    #[test]
    fn test_n_sorted_counts_topmost_starred() {
        let (tree, root, a, b) = tree();
        // a: 2 objects, inner: i1 + n1; b1 and loose are unsorted
        assert_eq!(n_sorted(&tree, root).unwrap(), 4);
        assert_eq!(n_sorted(&tree, b).unwrap(), 2);
        assert_eq!(n_sorted(&tree, a).unwrap(), 0);
    }
}
