//! Arranged membership listing of a node.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::arrange::{ArrangeMode, Arranger};
use crate::engine::member::{apply_order, Member, NodeId};
use crate::error::ExploreError;
use crate::explore::records::MemberRecord;
use crate::tree::{ChildFilter, Tree};

/// Operation name used in cache keys.
pub const OPERATION: &str = "node_members";

/// Parameters of a membership listing. Serialized as the cache key parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembersQuery {
    pub node_id: NodeId,
    /// Include child nodes.
    pub nodes: bool,
    /// Include objects.
    pub objects: bool,
    pub arrange_by: ArrangeMode,
    /// List starred children before everything else.
    pub starred_first: bool,
}

/// List the members of `query.node_id`, arranged as requested.
///
/// With `starred_first`, starred children are taken out of the arrangement
/// and prepended in collaborator order, even when `nodes` is off. For
/// starred-similarity the anchors are the starred children, or all children
/// when none is starred.
pub fn node_members<T: Tree + ?Sized>(
    tree: &T,
    arranger: &Arranger,
    query: &MembersQuery,
) -> Result<Vec<MemberRecord>, ExploreError> {
    let child_filter = if query.starred_first {
        ChildFilter::Unstarred
    } else {
        ChildFilter::All
    };

    let mut members: Vec<Member> = Vec::new();
    if query.nodes {
        members.extend(tree.get_children(query.node_id, child_filter)?.into_iter().map(Member::from));
    }
    if query.objects {
        members.extend(tree.get_objects(query.node_id)?.into_iter().map(Member::from));
    }

    let starred: Vec<Member> = if query.arrange_by == ArrangeMode::StarredSimilarity || query.starred_first {
        tree.get_children(query.node_id, ChildFilter::Starred)?
            .into_iter()
            .map(Member::from)
            .collect()
    } else {
        Vec::new()
    };

    if query.arrange_by != ArrangeMode::None {
        let fallback;
        let anchors: &[Member] = if query.arrange_by == ArrangeMode::StarredSimilarity && starred.is_empty() {
            fallback = tree
                .get_children(query.node_id, ChildFilter::All)?
                .into_iter()
                .map(Member::from)
                .collect::<Vec<_>>();
            &fallback
        } else {
            &starred
        };

        let order = arranger.arrange(&members, &query.arrange_by, anchors)?;
        debug!(
            node_id = query.node_id,
            arrange_by = %query.arrange_by,
            members = members.len(),
            reordered = !order.is_empty(),
            "Arranged members"
        );
        members = apply_order(members, &order);
    }

    if query.starred_first {
        let mut ordered = starred;
        ordered.extend(members);
        members = ordered;
    }

    members
        .iter()
        .map(|m| MemberRecord::load(tree, m).map_err(ExploreError::from))
        .collect()
}
