//! Classification of a node's members into its starred children.
//!
//! Unstarred children and/or direct objects are assigned to the nearest
//! starred child and relocated there (or into a per-anchor subnode). The
//! caller runs [`classify_members`] inside one tree transaction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ClassifyConfig;
use crate::engine::classifier::{NearestCentroid, UNASSIGNED};
use crate::engine::member::{NodeId, NodeRecord};
use crate::error::ExploreError;
use crate::tree::{ChildFilter, Tree, TreeError};

/// Name given to subnodes created under an anchor.
pub const SUBNODE_NAME: &str = "classified";

/// What to classify and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Classify unstarred child nodes.
    pub nodes: bool,
    /// Classify direct objects.
    pub objects: bool,
    /// Reject ambiguous assignments.
    pub safe: bool,
    /// Move into a new subnode of each anchor instead of the anchor itself.
    pub subnode: bool,
}

/// Number of members that received an assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyOutcome {
    pub n_predicted_children: usize,
    pub n_predicted_objects: usize,
}

/// Relocation target per anchor, creating subnodes on first use.
struct TargetResolver {
    subnode: bool,
    created: HashMap<NodeId, NodeId>,
}

impl TargetResolver {
    fn new(subnode: bool) -> Self {
        Self {
            subnode,
            created: HashMap::new(),
        }
    }

    fn resolve<T: Tree + ?Sized>(&mut self, tree: &mut T, anchor: NodeId) -> Result<NodeId, TreeError> {
        if !self.subnode {
            return Ok(anchor);
        }
        if let Some(&target) = self.created.get(&anchor) {
            return Ok(target);
        }
        let target = tree.create_node(anchor, Some(SUBNODE_NAME))?;
        self.created.insert(anchor, target);
        Ok(target)
    }
}

/// Classify the members of `node_id` into its starred children.
///
/// Without starred children nothing is classified. An audit record is written
/// either way.
pub fn classify_members<T: Tree + ?Sized>(
    tree: &mut T,
    node_id: NodeId,
    request: &ClassifyRequest,
    config: &ClassifyConfig,
) -> Result<ClassifyOutcome, ExploreError> {
    let (starred, unstarred): (Vec<NodeRecord>, Vec<NodeRecord>) = tree
        .get_children(node_id, ChildFilter::All)?
        .into_iter()
        .partition(|c| c.starred);

    let mut outcome = ClassifyOutcome::default();

    if starred.is_empty() {
        info!(node_id, "No starred children, nothing to classify");
    } else {
        let classifier = NearestCentroid::new(starred.iter().map(|s| s.centroid.clone()).collect(), config)?;
        let mut targets = TargetResolver::new(request.subnode);

        if request.nodes && !unstarred.is_empty() {
            info!(node_id, n = unstarred.len(), "Predicting unstarred children");
            let centroids: Vec<&[f32]> = unstarred.iter().map(|c| c.centroid.as_slice()).collect();
            let predicted = classifier.classify(&centroids, request.safe)?;

            for (class, anchor) in starred.iter().enumerate() {
                let to_move: Vec<NodeId> = assigned(&predicted, class)
                    .map(|i| unstarred[i].node_id)
                    .collect();
                if !to_move.is_empty() {
                    let target = targets.resolve(tree, anchor.node_id)?;
                    tree.relocate_nodes(&to_move, target, true)?;
                }
            }
            outcome.n_predicted_children = count_assigned(&predicted);
        }

        if request.objects {
            let objects = tree.get_objects(node_id)?;
            info!(node_id, n = objects.len(), "Predicting objects");
            let vectors: Vec<&[f32]> = objects.iter().map(|o| o.vector.as_slice()).collect();
            let predicted = classifier.classify(&vectors, request.safe)?;

            for (class, anchor) in starred.iter().enumerate() {
                let to_move: Vec<String> = assigned(&predicted, class)
                    .map(|i| objects[i].object_id.clone())
                    .collect();
                if !to_move.is_empty() {
                    let target = targets.resolve(tree, anchor.node_id)?;
                    info!(n = to_move.len(), target, "Moving objects");
                    tree.relocate_objects(&to_move, target, true)?;
                }
            }
            outcome.n_predicted_objects = count_assigned(&predicted);
        }
    }

    tree.append_audit_log(
        &format!(
            "classify_members(nodes={},objects={})",
            request.nodes, request.objects
        ),
        Some(node_id),
    )?;

    Ok(outcome)
}

/// Member indices assigned to `class`.
fn assigned(predicted: &[i32], class: usize) -> impl Iterator<Item = usize> + '_ {
    predicted
        .iter()
        .enumerate()
        .filter(move |(_, &p)| p == class as i32)
        .map(|(i, _)| i)
}

fn count_assigned(predicted: &[i32]) -> usize {
    predicted.iter().filter(|&&p| p != UNASSIGNED).count()
}
