//! In-memory tree backend.
//!
//! Node statistics (centroid, leaf counts) are derived on read from the
//! objects below each node. Writes go through [`MemoryTree::transaction`],
//! which restores a snapshot when the closure fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::debug;

use crate::engine::euclidean;
use crate::engine::member::{NodeId, NodeRecord, ObjectId, ObjectRecord};
use crate::tree::{ChildFilter, NodeUpdate, Tree, TreeError};

#[derive(Debug, Clone)]
struct StoredNode {
    parent_id: Option<NodeId>,
    name: Option<String>,
    starred: bool,
    approved: bool,
    children: Vec<NodeId>,
    objects: Vec<ObjectId>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    node_id: NodeId,
    vector: Vec<f32>,
}

/// One entry of the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub action: String,
    pub node_id: Option<NodeId>,
    pub at: SystemTime,
}

/// A tree held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    nodes: BTreeMap<NodeId, StoredNode>,
    objects: BTreeMap<ObjectId, StoredObject>,
    audit: Vec<AuditRecord>,
    next_node_id: NodeId,
    dim: Option<usize>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root node.
    pub fn add_project(&mut self, name: &str) -> NodeId {
        self.insert_node(None, Some(name.to_string()))
    }

    /// Create a child node with an explicit starred flag.
    pub fn add_node(&mut self, parent_id: NodeId, name: Option<&str>, starred: bool) -> Result<NodeId, TreeError> {
        let node_id = self.create_node(parent_id, name)?;
        self.node_mut(node_id)?.starred = starred;
        Ok(node_id)
    }

    /// Place a new object in `node_id`.
    pub fn add_object(&mut self, node_id: NodeId, object_id: &str, vector: Vec<f32>) -> Result<(), TreeError> {
        let expected = *self.dim.get_or_insert(vector.len());
        if vector.len() != expected {
            return Err(TreeError::Dimension {
                object_id: object_id.to_string(),
                expected,
                found: vector.len(),
            });
        }

        self.node_mut(node_id)?.objects.push(object_id.to_string());
        self.objects
            .insert(object_id.to_string(), StoredObject { node_id, vector });
        Ok(())
    }

    pub fn set_starred(&mut self, node_id: NodeId, starred: bool) -> Result<(), TreeError> {
        self.node_mut(node_id)?.starred = starred;
        Ok(())
    }

    pub fn set_approved(&mut self, node_id: NodeId, approved: bool) -> Result<(), TreeError> {
        self.node_mut(node_id)?.approved = approved;
        Ok(())
    }

    /// Node that currently holds `object_id`.
    pub fn object_location(&self, object_id: &str) -> Option<NodeId> {
        self.objects.get(object_id).map(|o| o.node_id)
    }

    pub fn audit_log(&self) -> &[AuditRecord] {
        &self.audit
    }

    /// Run `f` atomically: on error every change it made is rolled back.
    pub fn transaction<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            debug!("Rolling back tree transaction");
            *self = snapshot;
        }
        result
    }

    fn insert_node(&mut self, parent_id: Option<NodeId>, name: Option<String>) -> NodeId {
        self.next_node_id += 1;
        let node_id = self.next_node_id;
        self.nodes.insert(
            node_id,
            StoredNode {
                parent_id,
                name,
                starred: false,
                approved: false,
                children: Vec::new(),
                objects: Vec::new(),
            },
        );
        node_id
    }

    fn node(&self, node_id: NodeId) -> Result<&StoredNode, TreeError> {
        self.nodes.get(&node_id).ok_or(TreeError::NodeNotFound(node_id))
    }

    fn node_mut(&mut self, node_id: NodeId) -> Result<&mut StoredNode, TreeError> {
        self.nodes.get_mut(&node_id).ok_or(TreeError::NodeNotFound(node_id))
    }

    /// All objects below `node_id`, depth first.
    fn deep_objects(&self, node_id: NodeId) -> Vec<&StoredObject> {
        let mut result = Vec::new();
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                result.extend(node.objects.iter().filter_map(|o| self.objects.get(o)));
                stack.extend(node.children.iter().copied());
            }
        }
        result
    }

    fn record(&self, node_id: NodeId) -> Result<NodeRecord, TreeError> {
        let node = self.node(node_id)?;
        let leaves = self.deep_objects(node_id);
        let dim = self.dim.unwrap_or(0);

        let mut centroid = vec![0.0f32; dim];
        for leaf in &leaves {
            for (c, x) in centroid.iter_mut().zip(&leaf.vector) {
                *c += x;
            }
        }
        if !leaves.is_empty() {
            centroid.iter_mut().for_each(|c| *c /= leaves.len() as f32);
        }

        Ok(NodeRecord {
            node_id,
            parent_id: node.parent_id,
            name: node.name.clone(),
            n_children: node.children.len(),
            centroid,
            starred: node.starred,
            approved: node.approved,
            n_leaves: leaves.len(),
            n_objects_deep: leaves.len(),
        })
    }

    fn object_record(&self, object_id: &str) -> Result<ObjectRecord, TreeError> {
        let object = self
            .objects
            .get(object_id)
            .ok_or_else(|| TreeError::ObjectNotFound(object_id.to_string()))?;
        Ok(ObjectRecord {
            object_id: object_id.to_string(),
            vector: object.vector.clone(),
        })
    }

    fn is_descendant_or_self(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        false
    }
}

impl Tree for MemoryTree {
    fn get_node(&self, node_id: NodeId) -> Result<NodeRecord, TreeError> {
        self.record(node_id)
    }

    fn get_children(&self, node_id: NodeId, filter: ChildFilter) -> Result<Vec<NodeRecord>, TreeError> {
        let mut children = Vec::new();
        for &child in &self.node(node_id)?.children {
            let record = self.record(child)?;
            if filter.accepts(&record) {
                children.push(record);
            }
        }
        Ok(children)
    }

    fn get_objects(&self, node_id: NodeId) -> Result<Vec<ObjectRecord>, TreeError> {
        self.node(node_id)?
            .objects
            .iter()
            .map(|o| self.object_record(o))
            .collect()
    }

    fn get_path(&self, node_id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut path = vec![node_id];
        let mut current = self.node(node_id)?.parent_id;
        while let Some(id) = current {
            path.push(id);
            current = self.node(id)?.parent_id;
        }
        path.reverse();
        Ok(path)
    }

    fn recommend_children(&self, node_id: NodeId, max_n: usize) -> Result<Vec<NodeRecord>, TreeError> {
        let target = self.record(node_id)?;
        let Some(parent_id) = target.parent_id else {
            return Ok(Vec::new());
        };

        let mut candidates: Vec<(f32, NodeRecord)> = self
            .get_children(parent_id, ChildFilter::All)?
            .into_iter()
            .filter(|c| c.node_id != node_id)
            .map(|c| (euclidean(&c.centroid, &target.centroid), c))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(candidates.into_iter().take(max_n).map(|(_, c)| c).collect())
    }

    fn recommend_objects(&self, node_id: NodeId, max_n: usize) -> Result<Vec<ObjectRecord>, TreeError> {
        let target = self.record(node_id)?;
        let Some(parent_id) = target.parent_id else {
            return Ok(Vec::new());
        };

        let mut candidates: Vec<(f32, ObjectRecord)> = self
            .get_objects(parent_id)?
            .into_iter()
            .map(|o| (euclidean(&o.vector, &target.centroid), o))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(candidates.into_iter().take(max_n).map(|(_, o)| o).collect())
    }

    fn create_node(&mut self, parent_id: NodeId, name: Option<&str>) -> Result<NodeId, TreeError> {
        self.node(parent_id)?;
        let node_id = self.insert_node(Some(parent_id), name.map(str::to_string));
        self.node_mut(parent_id)?.children.push(node_id);
        debug!(node_id, parent_id, "Created node");
        Ok(node_id)
    }

    fn update_node(&mut self, node_id: NodeId, update: &NodeUpdate) -> Result<(), TreeError> {
        let node = self.node_mut(node_id)?;
        if let Some(name) = &update.name {
            node.name = Some(name.clone());
        }
        if let Some(starred) = update.starred {
            node.starred = starred;
        }
        if let Some(approved) = update.approved {
            node.approved = approved;
        }
        Ok(())
    }

    fn relocate_nodes(&mut self, node_ids: &[NodeId], target: NodeId, unapprove: bool) -> Result<(), TreeError> {
        self.node(target)?;
        for &node_id in node_ids {
            if self.is_descendant_or_self(target, node_id) {
                return Err(TreeError::Cycle { node: node_id, target });
            }

            let old_parent = self.node(node_id)?.parent_id;
            if let Some(old) = old_parent {
                self.node_mut(old)?.children.retain(|&c| c != node_id);
            }
            self.node_mut(target)?.children.push(node_id);

            let node = self.node_mut(node_id)?;
            node.parent_id = Some(target);
            if unapprove {
                node.approved = false;
            }
        }
        Ok(())
    }

    fn relocate_objects(&mut self, object_ids: &[ObjectId], target: NodeId, unapprove: bool) -> Result<(), TreeError> {
        self.node(target)?;
        for object_id in object_ids {
            let object = self
                .objects
                .get_mut(object_id)
                .ok_or_else(|| TreeError::ObjectNotFound(object_id.clone()))?;
            let old = std::mem::replace(&mut object.node_id, target);

            self.node_mut(old)?.objects.retain(|o| o != object_id);
            self.node_mut(target)?.objects.push(object_id.clone());
        }
        if unapprove && !object_ids.is_empty() {
            self.node_mut(target)?.approved = false;
        }
        Ok(())
    }

    fn append_audit_log(&mut self, action: &str, node_id: Option<NodeId>) -> Result<(), TreeError> {
        self.audit.push(AuditRecord {
            action: action.to_string(),
            node_id,
            at: SystemTime::now(),
        });
        Ok(())
    }
}

/// Thread-safe wrapper around the in-memory tree.
pub type SharedTree = Arc<RwLock<MemoryTree>>;

/// Create a new thread-safe tree.
pub fn new_shared_tree(tree: MemoryTree) -> SharedTree {
    Arc::new(RwLock::new(tree))
}
