//! Rendering scene-node collaborator.
//!
//! The hierarchy drives the rendering engine's node graph only through the
//! narrow [`NodeGraph`] contract: create/destroy a bare transform node,
//! (un)parent it, set its TRS and visibility, and read back its world matrix.
//! [`NodeArena`] is the built-in implementation used when no external engine
//! is plugged in.
//!
//! # Matrix Updates
//!
//! [`NodeGraph::world_matrix`] is always computed live by walking the parent
//! chain. [`NodeArena::update`] additionally refreshes per-node world matrix
//! caches once per frame for render consumers, using an explicit stack and a
//! dirty check so unchanged subtrees are skipped.

use glam::{Affine3A, Quat, Vec3};
use slotmap::SlotMap;

use crate::scene::NodeHandle;
use crate::scene::node::Node;

/// Scene-node operations the hierarchy needs from a rendering engine.
pub trait NodeGraph {
    /// Creates a bare node under the scene root.
    fn create_node(&mut self) -> NodeHandle;

    /// Destroys a node. Its children are moved to the scene root.
    fn destroy_node(&mut self, node: NodeHandle);

    /// Re-parents `node`; `None` moves it to the scene root.
    fn set_parent(&mut self, node: NodeHandle, parent: Option<NodeHandle>);

    fn set_transform(&mut self, node: NodeHandle, position: Vec3, rotation: Quat, scale: Vec3);

    fn set_visible(&mut self, node: NodeHandle, visible: bool);

    /// Current parent of `node` (`None` for root nodes and stale handles).
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Live world matrix of `node`, or `None` if the handle is stale.
    fn world_matrix(&self, node: NodeHandle) -> Option<Affine3A>;

    /// Per-frame hook, called after all node transforms were written.
    fn update(&mut self) {}
}

/// Default [`NodeGraph`]: nodes in a [`SlotMap`] plus the list of root nodes.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: SlotMap<NodeHandle, Node>,
    root_nodes: Vec<NodeHandle>,
}

impl NodeArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, node: NodeHandle) -> Option<&Node> {
        self.nodes.get(node)
    }

    #[inline]
    #[must_use]
    pub fn root_nodes(&self) -> &[NodeHandle] {
        &self.root_nodes
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn is_ancestor(&self, candidate: NodeHandle, node: NodeHandle) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(handle) = current {
            if handle == candidate {
                return true;
            }
            current = self.nodes.get(handle).and_then(|n| n.parent);
        }
        false
    }

    fn unlink(&mut self, node: NodeHandle) {
        let old_parent = self.nodes.get(node).and_then(|n| n.parent);
        if let Some(p) = old_parent {
            if let Some(parent) = self.nodes.get_mut(p)
                && let Some(i) = parent.children.iter().position(|&x| x == node)
            {
                parent.children.remove(i);
            }
        } else if let Some(i) = self.root_nodes.iter().position(|&x| x == node) {
            self.root_nodes.remove(i);
        }
    }

    /// Refreshes the cached world matrices of every node.
    ///
    /// Iterative depth-first walk from the roots; a node's world matrix is
    /// recomputed only if its own TRS or an ancestor changed.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(NodeHandle, Affine3A, bool)> = Vec::with_capacity(64);

        for &root in self.root_nodes.iter().rev() {
            stack.push((root, Affine3A::IDENTITY, false));
        }

        while let Some((handle, parent_world, parent_changed)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(handle) else {
                continue;
            };

            let local_changed = node.update_local_matrix();
            let world_needs_update = local_changed || parent_changed;
            if world_needs_update {
                node.world_matrix = parent_world * node.local_matrix;
            }

            let world = node.world_matrix;
            for &child in node.children.iter().rev() {
                stack.push((child, world, world_needs_update));
            }
        }
    }
}

impl NodeGraph for NodeArena {
    fn create_node(&mut self) -> NodeHandle {
        let handle = self.nodes.insert(Node::new());
        self.root_nodes.push(handle);
        handle
    }

    fn destroy_node(&mut self, node: NodeHandle) {
        let Some(children) = self.nodes.get(node).map(|n| n.children.clone()) else {
            return;
        };
        for child in children {
            self.set_parent(child, None);
        }
        self.unlink(node);
        self.nodes.remove(node);
    }

    fn set_parent(&mut self, node: NodeHandle, parent: Option<NodeHandle>) {
        if !self.nodes.contains_key(node) {
            return;
        }
        if let Some(p) = parent {
            if p == node {
                log::warn!("Cannot parent a node to itself");
                return;
            }
            if !self.nodes.contains_key(p) {
                log::error!("Parent node not found during set_parent");
                return;
            }
            if self.is_ancestor(node, p) {
                log::warn!("Refusing to parent a node under its own descendant");
                return;
            }
        }

        self.unlink(node);

        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(p) {
                    parent_node.children.push(node);
                }
            }
            None => self.root_nodes.push(node),
        }

        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = parent;
            n.mark_dirty();
        }
    }

    fn set_transform(&mut self, node: NodeHandle, position: Vec3, rotation: Quat, scale: Vec3) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.position = position;
            n.rotation = rotation;
            n.scale = scale;
        }
    }

    fn set_visible(&mut self, node: NodeHandle, visible: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.visible = visible;
        }
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(node).and_then(Node::parent)
    }

    fn world_matrix(&self, node: NodeHandle) -> Option<Affine3A> {
        let mut current = self.nodes.get(node)?;
        let mut world = current.local_trs();
        while let Some(p) = current.parent {
            let Some(parent) = self.nodes.get(p) else {
                break;
            };
            world = parent.local_trs() * world;
            current = parent;
        }
        Some(world)
    }

    fn update(&mut self) {
        self.update_world_matrices();
    }
}
