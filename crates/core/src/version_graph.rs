//! Render version graph.
//!
//! Every generated or edited image becomes an immutable [`RenderNode`] with a
//! parent pointer. "Current render", "undo" and "pick an older version" move a
//! single `current_id` pointer; edits always create new nodes. Creating a
//! child of an older node starts a new branch, so history is a tree rather
//! than a linear log.
//!
//! Deletion policy: only leaf nodes can be deleted. Deleting a node with
//! children fails with [`CoreError::HasDescendants`]; nothing is ever
//! orphaned.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ArtifactRef, NodeId, Timestamp};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a render was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderKind {
    Original,
    GlobalEdit,
    SelectiveEdit,
    ZoneView,
    MulticamGrid,
    Composite,
}

impl RenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderKind::Original => "original",
            RenderKind::GlobalEdit => "global-edit",
            RenderKind::SelectiveEdit => "selective-edit",
            RenderKind::ZoneView => "zone-view",
            RenderKind::MulticamGrid => "multicam-grid",
            RenderKind::Composite => "composite",
        }
    }
}

/// One immutable render in a project's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderNode {
    pub id: NodeId,
    pub artifact_ref: ArtifactRef,
    pub directive: String,
    pub kind: RenderKind,
    pub parent_id: Option<NodeId>,
    pub created_at: Timestamp,
}

/// Serializable form of a [`VersionGraph`]: nodes in creation order plus the
/// current pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<RenderNode>,
    pub current_id: Option<NodeId>,
}

// ---------------------------------------------------------------------------
// VersionGraph
// ---------------------------------------------------------------------------

/// The render tree of a single project.
#[derive(Debug, Clone, Default)]
pub struct VersionGraph {
    /// All nodes, in creation order.
    nodes: IndexMap<NodeId, RenderNode>,
    root_id: Option<NodeId>,
    current_id: Option<NodeId>,
}

impl VersionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the project's original render and make it current.
    pub fn create_root(
        &mut self,
        artifact_ref: ArtifactRef,
        directive: impl Into<String>,
    ) -> Result<RenderNode, CoreError> {
        if self.root_id.is_some() {
            return Err(CoreError::AlreadyHasRoot);
        }
        let node = self.insert(artifact_ref, directive.into(), RenderKind::Original, None);
        self.root_id = Some(node.id);
        Ok(node)
    }

    /// Create a child of `parent_id` and make it current, whether or not the
    /// parent was current.
    pub fn create_child(
        &mut self,
        parent_id: NodeId,
        artifact_ref: ArtifactRef,
        directive: impl Into<String>,
        kind: RenderKind,
    ) -> Result<RenderNode, CoreError> {
        if kind == RenderKind::Original {
            return Err(CoreError::Validation(
                "Only the root render can be of kind 'original'".to_string(),
            ));
        }
        if !self.nodes.contains_key(&parent_id) {
            return Err(CoreError::ParentNotFound(parent_id));
        }
        Ok(self.insert(artifact_ref, directive.into(), kind, Some(parent_id)))
    }

    /// Move the current pointer to the current node's parent. Nothing is
    /// deleted; the abandoned child stays selectable.
    pub fn undo(&mut self) -> Result<RenderNode, CoreError> {
        let parent = self
            .current()
            .and_then(|node| node.parent_id)
            .and_then(|id| self.nodes.get(&id))
            .cloned()
            .ok_or(CoreError::NoPreviousVersion)?;
        self.current_id = Some(parent.id);
        Ok(parent)
    }

    /// Move the current pointer to the most recently created child of the
    /// current node.
    pub fn redo(&mut self) -> Result<RenderNode, CoreError> {
        let current = self.current_id.ok_or(CoreError::NoNextVersion)?;
        let child = self
            .children(current)
            .last()
            .map(|node| (*node).clone())
            .ok_or(CoreError::NoNextVersion)?;
        self.current_id = Some(child.id);
        Ok(child)
    }

    /// Make an existing node current without creating or deleting anything.
    pub fn select_existing(&mut self, node_id: NodeId) -> Result<RenderNode, CoreError> {
        let node = self
            .nodes
            .get(&node_id)
            .cloned()
            .ok_or(CoreError::NodeNotFound(node_id))?;
        self.current_id = Some(node_id);
        Ok(node)
    }

    /// Remove a leaf node.
    ///
    /// Deleting the current node moves the pointer to its parent in the same
    /// step; the root cannot be deleted while it is current.
    pub fn delete_node(&mut self, node_id: NodeId) -> Result<RenderNode, CoreError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(CoreError::NodeNotFound(node_id))?;
        if self.has_children(node_id) {
            return Err(CoreError::HasDescendants(node_id));
        }
        let parent_id = node.parent_id;

        if self.current_id == Some(node_id) {
            match parent_id {
                Some(parent) => self.current_id = Some(parent),
                None => return Err(CoreError::CannotDeleteCurrentRoot),
            }
        }

        let removed = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(CoreError::NodeNotFound(node_id))?;
        if self.root_id == Some(node_id) {
            self.root_id = None;
        }
        Ok(removed)
    }

    // ---- queries ----

    pub fn current_id(&self) -> Option<NodeId> {
        self.current_id
    }

    pub fn current(&self) -> Option<&RenderNode> {
        self.current_id.and_then(|id| self.nodes.get(&id))
    }

    pub fn root(&self) -> Option<&RenderNode> {
        self.root_id.and_then(|id| self.nodes.get(&id))
    }

    pub fn get(&self, node_id: NodeId) -> Option<&RenderNode> {
        self.nodes.get(&node_id)
    }

    /// Children of `node_id`, oldest first.
    pub fn children(&self, node_id: NodeId) -> Vec<&RenderNode> {
        self.nodes
            .values()
            .filter(|n| n.parent_id == Some(node_id))
            .collect()
    }

    pub fn has_children(&self, node_id: NodeId) -> bool {
        self.nodes.values().any(|n| n.parent_id == Some(node_id))
    }

    /// Nodes from the root down to the current node. This is the linear
    /// history a picker shows; sibling branches are reachable via
    /// [`children`](Self::children).
    pub fn path_to_current(&self) -> Vec<&RenderNode> {
        let mut path = Vec::new();
        let mut cursor = self.current();
        while let Some(node) = cursor {
            path.push(node);
            cursor = node.parent_id.and_then(|id| self.nodes.get(&id));
        }
        path.reverse();
        path
    }

    /// All nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---- persistence ----

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            current_id: self.current_id,
        }
    }

    /// Rebuild a graph from a snapshot.
    ///
    /// Rejects duplicate ids, dangling parent references, cycles, anything
    /// other than exactly one `original` root, and a missing current node.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, CoreError> {
        let mut nodes = IndexMap::with_capacity(snapshot.nodes.len());
        for node in snapshot.nodes {
            let id = node.id;
            if nodes.insert(id, node).is_some() {
                return Err(CoreError::Validation(format!("Duplicate render id {id}")));
            }
        }

        if nodes.is_empty() {
            if let Some(id) = snapshot.current_id {
                return Err(CoreError::NodeNotFound(id));
            }
            return Ok(Self::default());
        }

        let roots: Vec<&RenderNode> = nodes.values().filter(|n| n.parent_id.is_none()).collect();
        if roots.len() != 1 {
            return Err(CoreError::Validation(format!(
                "Expected exactly one root render, found {}",
                roots.len()
            )));
        }
        let root_id = roots[0].id;

        for node in nodes.values() {
            match node.parent_id {
                None if node.kind != RenderKind::Original => {
                    return Err(CoreError::Validation(format!(
                        "Root render {} must be of kind 'original'",
                        node.id
                    )));
                }
                Some(_) if node.kind == RenderKind::Original => {
                    return Err(CoreError::Validation(format!(
                        "Render {} has a parent but is of kind 'original'",
                        node.id
                    )));
                }
                Some(parent) if !nodes.contains_key(&parent) => {
                    return Err(CoreError::ParentNotFound(parent));
                }
                _ => {}
            }
        }

        // Every node must reach the root within `len` steps.
        for node in nodes.values() {
            let mut cursor = node.parent_id;
            let mut steps = 0;
            while let Some(id) = cursor {
                steps += 1;
                if steps > nodes.len() {
                    return Err(CoreError::Validation(format!(
                        "Render {} is part of a parent cycle",
                        node.id
                    )));
                }
                cursor = nodes.get(&id).and_then(|n| n.parent_id);
            }
        }

        let current_id = match snapshot.current_id {
            Some(id) if nodes.contains_key(&id) => id,
            Some(id) => return Err(CoreError::NodeNotFound(id)),
            None => {
                return Err(CoreError::Validation(
                    "Snapshot has renders but no current render".to_string(),
                ))
            }
        };

        Ok(Self {
            nodes,
            root_id: Some(root_id),
            current_id: Some(current_id),
        })
    }

    // ---- private helpers ----

    fn insert(
        &mut self,
        artifact_ref: ArtifactRef,
        directive: String,
        kind: RenderKind,
        parent_id: Option<NodeId>,
    ) -> RenderNode {
        let node = RenderNode {
            id: uuid::Uuid::now_v7(),
            artifact_ref,
            directive,
            kind,
            parent_id,
            created_at: chrono::Utc::now(),
        };
        self.nodes.insert(node.id, node.clone());
        self.current_id = Some(node.id);
        node
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
