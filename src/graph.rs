//! Node graph model - nodes, sockets and links.

use hashbrown::HashMap;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;

use crate::block::{SampleBlock, VoiceId};
use crate::error::{Error, Result};
use crate::node::{AudioNode, NodeId, SocketSpec};

/// An input socket and the scalar it feeds while unlinked.
#[derive(Clone, Debug)]
pub struct InputSocket {
    spec: SocketSpec,
    value: f32,
    last_value: f32,
    /// Voice tagged on synthesized blocks. Fixed for the socket's lifetime so
    /// value changes glide instead of restarting downstream voices.
    voice: VoiceId,
}

impl InputSocket {
    fn new(spec: SocketSpec) -> Self {
        Self {
            spec,
            value: spec.default,
            last_value: spec.default,
            voice: VoiceId::fresh(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    #[inline]
    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    /// Block ramping from the value seen last time to the current one.
    fn take_ramp(&mut self, len: usize) -> SampleBlock {
        let block = SampleBlock::ramp(self.last_value, self.value, len, self.voice);
        self.last_value = self.value;
        block
    }
}

/// Structural description of a node, copied from its [`AudioNode`] when added.
#[derive(Clone, Debug)]
pub struct NodeData {
    id: NodeId,
    kind: &'static str,
    inputs: Vec<InputSocket>,
    outputs: Vec<&'static str>,
    is_sink: bool,
}

impl NodeData {
    fn describe(id: NodeId, node: &dyn AudioNode) -> Self {
        Self {
            id,
            kind: node.kind(),
            inputs: node.inputs().iter().copied().map(InputSocket::new).collect(),
            outputs: node.outputs().to_vec(),
            is_sink: node.is_sink(),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    #[inline]
    pub fn inputs(&self) -> &[InputSocket] {
        &self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> &[&'static str] {
        &self.outputs
    }

    #[inline]
    pub fn is_sink(&self) -> bool {
        self.is_sink
    }

    fn input_mut(&mut self, name: &str) -> Option<&mut InputSocket> {
        self.inputs.iter_mut().find(|s| s.name() == name)
    }
}

/// A connection from an output socket to an input socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub from: NodeId,
    pub output: &'static str,
    pub to: NodeId,
    pub input: &'static str,
}

/// The mutable node graph.
///
/// Every structural mutation marks the graph dirty; the evaluation order is
/// rebuilt from it lazily before the next tick.
pub struct Graph {
    graph: StableGraph<NodeData, Link>,
    node_indices: HashMap<NodeId, NodeIndex>,
    next_node_id: u32,
    dirty: bool,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::with_capacity(64, 64),
            node_indices: HashMap::new(),
            next_node_id: 0,
            dirty: true,
        }
    }

    /// Add a node described by `node`, returning its new id.
    pub fn add_node(&mut self, node: &dyn AudioNode) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let idx = self.graph.add_node(NodeData::describe(id, node));
        self.node_indices.insert(id, idx);
        self.dirty = true;
        id
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<NodeData> {
        let idx = self.node_indices.remove(&id).ok_or(Error::UnknownNode(id))?;
        self.dirty = true;
        self.graph.remove_node(idx).ok_or(Error::UnknownNode(id))
    }

    /// Link `from.output` to `to.input`.
    ///
    /// An input holds at most one link; if `to.input` is already linked, the
    /// old link is replaced and returned.
    pub fn connect(
        &mut self,
        from: NodeId,
        output: &str,
        to: NodeId,
        input: &str,
    ) -> Result<Option<Link>> {
        let from_idx = self.index(from)?;
        let to_idx = self.index(to)?;

        let output = *self.graph[from_idx]
            .outputs
            .iter()
            .find(|o| **o == output)
            .ok_or_else(|| Error::UnknownSocket {
                node: from,
                socket: output.to_string(),
                direction: "output",
            })?;
        let input = self.graph[to_idx]
            .inputs
            .iter()
            .find(|s| s.name() == input)
            .map(InputSocket::name)
            .ok_or_else(|| Error::UnknownSocket {
                node: to,
                socket: input.to_string(),
                direction: "input",
            })?;

        let replaced = self.unlink_input(to_idx, input);
        if let Some(old) = replaced {
            tracing::debug!(?old, "replacing existing link into input");
        }

        let link = Link {
            from,
            output,
            to,
            input,
        };
        self.graph.add_edge(from_idx, to_idx, link);
        self.dirty = true;
        Ok(replaced)
    }

    /// Remove the link feeding `to.input`, returning whether there was one.
    pub fn disconnect(&mut self, to: NodeId, input: &str) -> Result<bool> {
        let to_idx = self.index(to)?;
        Ok(self.unlink_input(to_idx, input).is_some())
    }

    fn unlink_input(&mut self, to_idx: NodeIndex, input: &str) -> Option<Link> {
        let edge = self
            .graph
            .edges_directed(to_idx, Direction::Incoming)
            .find(|e| e.weight().input == input)
            .map(|e| e.id())?;
        self.dirty = true;
        self.graph.remove_edge(edge)
    }

    /// Set the scalar an unlinked input feeds. Not a structural change.
    pub fn set_input(&mut self, id: NodeId, input: &str, value: f32) -> Result<()> {
        let idx = self.index(id)?;
        let socket = self.graph[idx]
            .input_mut(input)
            .ok_or_else(|| Error::UnknownSocket {
                node: id,
                socket: input.to_string(),
                direction: "input",
            })?;
        socket.value = value;
        Ok(())
    }

    /// Synthesized block for an unlinked input.
    ///
    /// A node or socket that vanished mid-removal yields silence instead of an
    /// error.
    pub fn default_block(&mut self, id: NodeId, input: &str, len: usize) -> SampleBlock {
        let socket = self
            .node_indices
            .get(&id)
            .copied()
            .and_then(|idx| self.graph.node_weight_mut(idx))
            .and_then(|node| node.input_mut(input));

        match socket {
            Some(socket) => socket.take_ramp(len),
            None => {
                tracing::debug!(?id, input, "default requested for a vanished socket");
                SampleBlock::silent(len)
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.node_indices.get(&id).map(|idx| &self.graph[*idx])
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node_indices.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node ids, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.node_indices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sink node ids, ascending.
    pub fn sinks(&self) -> Vec<NodeId> {
        let mut sinks: Vec<NodeId> = self
            .graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
            .filter(|n| n.is_sink)
            .map(|n| n.id)
            .collect();
        sinks.sort_unstable();
        sinks
    }

    /// The link feeding `id.input`, if any.
    pub fn link_into(&self, id: NodeId, input: &str) -> Option<Link> {
        let idx = *self.node_indices.get(&id)?;
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| *e.weight())
            .find(|link| link.input == input)
    }

    /// Links leaving `id`, across all of its outputs.
    pub fn links_from(&self, id: NodeId) -> Vec<Link> {
        self.node_indices
            .get(&id)
            .map(|idx| {
                self.graph
                    .edges_directed(*idx, Direction::Outgoing)
                    .map(|e| *e.weight())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.graph.edge_references().map(|e| e.weight())
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag, returning whether it was set.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    fn index(&self, id: NodeId) -> Result<NodeIndex> {
        self.node_indices
            .get(&id)
            .copied()
            .ok_or(Error::UnknownNode(id))
    }
}
