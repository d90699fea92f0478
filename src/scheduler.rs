//! Drives one evaluation tick over an [`EvaluationOrder`].

use hashbrown::HashMap;

use crate::block::SampleBlock;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{Inputs, NodeId, ProcessContext};
use crate::store::StateStore;
use crate::topology::EvaluationOrder;

/// Blocks that reached sink nodes during one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutput {
    blocks: Vec<(NodeId, SampleBlock)>,
}

impl TickOutput {
    /// Sink blocks in evaluation order.
    pub fn blocks(&self) -> &[(NodeId, SampleBlock)] {
        &self.blocks
    }

    pub fn get(&self, sink: NodeId) -> Option<&SampleBlock> {
        self.blocks
            .iter()
            .find(|(id, _)| *id == sink)
            .map(|(_, block)| block)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every voice of every sink summed into one row of `len` samples.
    pub fn mixdown(&self, len: usize) -> Vec<f32> {
        let mut out = vec![0.0; len];
        for (_, block) in &self.blocks {
            for (acc, sample) in out.iter_mut().zip(block.mixdown()) {
                *acc += sample;
            }
        }
        out
    }
}

/// Routes blocks between nodes for a tick.
///
/// Holds the routing table between ticks only to reuse its allocation.
#[derive(Default)]
pub struct Scheduler {
    routed: HashMap<(NodeId, &'static str), SampleBlock>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every node in `order` once.
    ///
    /// The order is checked against the graph and the store before anything
    /// runs, so a [`Error::MissingNode`] leaves node state untouched.
    pub fn evaluate_tick(
        &mut self,
        graph: &mut Graph,
        store: &mut StateStore,
        order: &EvaluationOrder,
        ctx: &ProcessContext,
    ) -> Result<TickOutput> {
        if let Some(missing) = order
            .nodes()
            .iter()
            .find(|id| !graph.contains(**id) || !store.contains(**id))
        {
            return Err(Error::MissingNode(*missing));
        }

        self.routed.clear();
        let mut output = TickOutput::default();

        for &id in order.nodes() {
            let (kind, input_names, output_names, is_sink) = match graph.node(id) {
                Some(data) => (
                    data.kind(),
                    data.inputs().iter().map(|s| s.name()).collect::<Vec<_>>(),
                    data.outputs().to_vec(),
                    data.is_sink(),
                ),
                None => return Err(Error::MissingNode(id)),
            };

            let mut inputs = Inputs::new();
            for name in input_names {
                let block = match self.routed.remove(&(id, name)) {
                    Some(block) => block,
                    None => graph.default_block(id, name, ctx.block_len),
                };
                inputs.insert(name, block);
            }

            let node = store.get_mut(id).ok_or(Error::MissingNode(id))?;
            let produced = node.process(ctx, &inputs);
            if produced.len() != output_names.len() {
                return Err(Error::OutputArity {
                    node: id,
                    kind,
                    expected: output_names.len(),
                    got: produced.len(),
                });
            }

            if !produced.is_empty() {
                let links = graph.links_from(id);
                for (name, block) in output_names.iter().zip(produced) {
                    for link in links.iter().filter(|l| l.output == *name) {
                        self.routed.insert((link.to, link.input), block.clone());
                    }
                }
            }

            if is_sink {
                let block = inputs
                    .get("audio")
                    .or_else(|| inputs.iter().next().map(|(_, b)| b))
                    .cloned()
                    .unwrap_or_else(|| SampleBlock::silent(ctx.block_len));
                output.blocks.push((id, block));
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::VoiceId;
    use crate::graph::tests::{sink, source};
    use crate::node::{AudioNode, SocketSpec};
    use crate::topology;

    fn ctx(block_len: usize) -> ProcessContext {
        ProcessContext {
            tick_time: 0.0,
            sample_rate: 8,
            block_duration: block_len as f64 / 8.0,
            block_len,
        }
    }

    /// Emits a constant on its output.
    struct Constant(f32);

    impl AudioNode for Constant {
        fn kind(&self) -> &'static str {
            "constant"
        }
        fn outputs(&self) -> &[&'static str] {
            &["out"]
        }
        fn process(&mut self, ctx: &ProcessContext, _inputs: &Inputs) -> Vec<SampleBlock> {
            vec![SampleBlock::filled(self.0, ctx.block_len, VoiceId::from_raw(99))]
        }
    }

    /// Adds its two inputs.
    struct Sum;

    const SUM_INPUTS: &[SocketSpec] = &[SocketSpec::new("x", 0.0), SocketSpec::new("y", 0.5)];

    impl AudioNode for Sum {
        fn kind(&self) -> &'static str {
            "sum"
        }
        fn inputs(&self) -> &[SocketSpec] {
            SUM_INPUTS
        }
        fn outputs(&self) -> &[&'static str] {
            &["out"]
        }
        fn process(&mut self, ctx: &ProcessContext, inputs: &Inputs) -> Vec<SampleBlock> {
            let x = inputs.get_or_silent("x", ctx.block_len).mixdown();
            let y = inputs.get_or_silent("y", ctx.block_len).mixdown();
            let row = x.iter().zip(&y).map(|(a, b)| a + b).collect();
            vec![SampleBlock::single(row, VoiceId::PLACEHOLDER)]
        }
    }

    struct Broken;

    impl AudioNode for Broken {
        fn kind(&self) -> &'static str {
            "broken"
        }
        fn outputs(&self) -> &[&'static str] {
            &["out"]
        }
        fn process(&mut self, _ctx: &ProcessContext, _inputs: &Inputs) -> Vec<SampleBlock> {
            Vec::new()
        }
    }

    fn add(graph: &mut Graph, store: &mut StateStore, node: impl AudioNode) -> NodeId {
        let id = graph.add_node(&node);
        store.create(id, Box::new(node)).unwrap();
        id
    }

    #[test]
    fn routes_linked_data_and_defaults() {
        let mut graph = Graph::new();
        let mut store = StateStore::new();
        let c = add(&mut graph, &mut store, Constant(0.25));
        let sum = add(&mut graph, &mut store, Sum);
        let out = add(&mut graph, &mut store, sink());
        graph.connect(c, "out", sum, "x").unwrap();
        graph.connect(sum, "out", out, "a").unwrap();

        let order = topology::rebuild(&graph).unwrap();
        let tick = Scheduler::new()
            .evaluate_tick(&mut graph, &mut store, &order, &ctx(4))
            .unwrap();
        // the stub sink has no "audio" input, so its first input is reported
        assert_eq!(tick.get(out).unwrap().rows()[0], vec![0.75; 4]);
    }

    #[test]
    fn fan_out_delivers_copies() {
        let mut graph = Graph::new();
        let mut store = StateStore::new();
        let c = add(&mut graph, &mut store, Constant(1.0));
        let sum = add(&mut graph, &mut store, Sum);
        let out = add(&mut graph, &mut store, sink());
        graph.connect(c, "out", sum, "x").unwrap();
        graph.connect(c, "out", sum, "y").unwrap();
        graph.connect(sum, "out", out, "a").unwrap();

        let order = topology::rebuild(&graph).unwrap();
        let tick = Scheduler::new()
            .evaluate_tick(&mut graph, &mut store, &order, &ctx(2))
            .unwrap();
        assert_eq!(tick.mixdown(2), vec![2.0, 2.0]);
    }

    #[test]
    fn missing_state_is_reported_before_processing() {
        let mut graph = Graph::new();
        let mut store = StateStore::new();
        let src = add(&mut graph, &mut store, source());
        let out = add(&mut graph, &mut store, sink());
        graph.connect(src, "out", out, "a").unwrap();
        let order = topology::rebuild(&graph).unwrap();

        store.destroy(out);
        let result = Scheduler::new().evaluate_tick(&mut graph, &mut store, &order, &ctx(4));
        assert!(matches!(result, Err(Error::MissingNode(id)) if id == out));
    }

    #[test]
    fn wrong_output_count_is_an_error() {
        let mut graph = Graph::new();
        let mut store = StateStore::new();
        let broken = add(&mut graph, &mut store, Broken);
        let out = add(&mut graph, &mut store, sink());
        graph.connect(broken, "out", out, "a").unwrap();
        let order = topology::rebuild(&graph).unwrap();

        let result = Scheduler::new().evaluate_tick(&mut graph, &mut store, &order, &ctx(4));
        assert!(matches!(
            result,
            Err(Error::OutputArity { expected: 1, got: 0, .. })
        ));
    }
}
