//! Per-node persistent state, addressed by [`NodeId`].

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::node::{AudioNode, NodeId};

/// Owns every node instance between ticks.
///
/// Each live id maps to exactly one boxed node; the node's fields are its
/// state. Destroying an entry drops the node, which releases anything it owns
/// (a capture thread, for example).
#[derive(Default)]
pub struct StateStore {
    nodes: HashMap<NodeId, Box<dyn AudioNode>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, id: NodeId, node: Box<dyn AudioNode>) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&dyn AudioNode> {
        self.nodes.get(&id).map(|node| node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut (dyn AudioNode + 'static)> {
        self.nodes.get_mut(&id).map(|node| node.as_mut())
    }

    /// Drop the state for `id`, returning whether there was any.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        self.nodes.remove(&id).is_some()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
