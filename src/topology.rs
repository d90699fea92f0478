//! Evaluation order for the sink-reachable part of a [`Graph`].

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::NodeId;

/// Nodes in the order they must be processed within one tick.
///
/// Every node comes after all nodes feeding it. Only valid for the graph it
/// was built from, until that graph is next mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationOrder {
    nodes: Vec<NodeId>,
}

impl EvaluationOrder {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| *n == id)
    }
}

/// Build the evaluation order for `graph`.
///
/// Walks backwards from every sink to find the nodes that contribute to one,
/// then sorts those with Kahn's algorithm. Nodes that feed no sink are left
/// out. Ties resolve in discovery order, so the result is deterministic.
pub fn rebuild(graph: &Graph) -> Result<EvaluationOrder> {
    let sinks = graph.sinks();

    // connected-input count per discovered node
    let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
    let mut discovered: Vec<NodeId> = Vec::new();
    let mut frontier: VecDeque<NodeId> = VecDeque::new();

    for sink in sinks {
        if in_degree.insert(sink, 0).is_none() {
            discovered.push(sink);
            frontier.push_back(sink);
        }
    }

    while let Some(id) = frontier.pop_front() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let mut count = 0;
        for socket in node.inputs() {
            let Some(link) = graph.link_into(id, socket.name()) else {
                continue;
            };
            count += 1;
            if !in_degree.contains_key(&link.from) {
                in_degree.insert(link.from, 0);
                discovered.push(link.from);
                frontier.push_back(link.from);
            }
        }
        in_degree.insert(id, count);
    }

    let mut ready: VecDeque<NodeId> = discovered
        .iter()
        .copied()
        .filter(|id| in_degree[id] == 0)
        .collect();
    let mut order = Vec::with_capacity(discovered.len());

    while let Some(id) = ready.pop_front() {
        order.push(id);
        for link in graph.links_from(id) {
            if let Some(count) = in_degree.get_mut(&link.to) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(link.to);
                }
            }
        }
    }

    if order.len() < discovered.len() {
        let nodes: Vec<NodeId> = discovered
            .into_iter()
            .filter(|id| in_degree[id] > 0)
            .collect();
        tracing::warn!(cycle_len = nodes.len(), "graph contains a cycle");
        return Err(Error::CyclicGraph { nodes });
    }

    tracing::debug!(
        ordered = order.len(),
        excluded = graph.node_count() - order.len(),
        "rebuilt evaluation order"
    );
    Ok(EvaluationOrder::new(order))
}
