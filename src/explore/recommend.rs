//! Recommendation queries.
//!
//! The recommendation source lives in the tree collaborator; these functions
//! only turn its answers into member records for the paginated envelope.

use serde::{Deserialize, Serialize};

use crate::engine::member::NodeId;
use crate::error::ExploreError;
use crate::explore::records::{MemberRecord, NodeView};
use crate::tree::Tree;

pub const CHILDREN_OPERATION: &str = "node_recommended_children";
pub const OBJECTS_OPERATION: &str = "node_recommended_objects";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendQuery {
    pub node_id: NodeId,
    pub max_n: usize,
}

impl RecommendQuery {
    /// Query with `max_n` defaulted and clamped to `limit`.
    pub fn new(node_id: NodeId, max_n: Option<usize>, default_max_n: usize, limit: usize) -> Self {
        Self {
            node_id,
            max_n: max_n.unwrap_or(default_max_n).min(limit),
        }
    }
}

pub fn recommended_children<T: Tree + ?Sized>(
    tree: &T,
    query: &RecommendQuery,
) -> Result<Vec<MemberRecord>, ExploreError> {
    tree.recommend_children(query.node_id, query.max_n)?
        .iter()
        .map(|n| Ok(MemberRecord::Node(NodeView::load(tree, n)?)))
        .collect()
}

pub fn recommended_objects<T: Tree + ?Sized>(
    tree: &T,
    query: &RecommendQuery,
) -> Result<Vec<MemberRecord>, ExploreError> {
    Ok(tree
        .recommend_objects(query.node_id, query.max_n)?
        .iter()
        .map(|o| MemberRecord::Object(o.into()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::memory::MemoryTree;

    #[test]
    fn test_max_n_clamped() {
        assert_eq!(RecommendQuery::new(1, None, 100, 1000).max_n, 100);
        assert_eq!(RecommendQuery::new(1, Some(5000), 100, 1000).max_n, 1000);
        assert_eq!(RecommendQuery::new(1, Some(3), 100, 1000).max_n, 3);
    }

    #[test]
    fn test_records() {
        let mut tree = MemoryTree::new();
        let root = tree.add_project("p");
        let a = tree.add_node(root, Some("a"), false).unwrap();
        let b = tree.add_node(root, Some("b"), false).unwrap();
        tree.add_object(a, "x", vec![0.0]).unwrap();
        tree.add_object(b, "y", vec![1.0]).unwrap();
        tree.add_object(root, "z", vec![0.5]).unwrap();

        let query = RecommendQuery::new(a, None, 100, 1000);
        let children = recommended_children(&tree, &query).unwrap();
        assert!(matches!(&children[..], [MemberRecord::Node(n)] if n.name == "b" && n.path == vec![root, b]));

        let objects = recommended_objects(&tree, &query).unwrap();
        assert_eq!(objects, vec![MemberRecord::Object(crate::explore::records::ObjectView { object_id: "z".into() })]);
    }
}
