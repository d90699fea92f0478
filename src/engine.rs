//! High-level engine API

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::io::{self, AudioSink};
use crate::node::{AudioNode, NodeId, ProcessContext};
use crate::scheduler::{Scheduler, TickOutput};
use crate::store::StateStore;
use crate::topology::{self, EvaluationOrder};

#[cfg(feature = "cpal_sink")]
use crate::device::CpalDevice;

/// Evaluation attempts per tick before giving up on a changing structure.
const MAX_ATTEMPTS: usize = 2;

/// The audio engine - owns the node graph, node state and the output.
///
/// `AudioTree` provides a high-level API for building and running a node
/// graph. It handles:
/// - Adding, removing and linking nodes
/// - Rebuilding the evaluation order whenever the structure changed
/// - Evaluating one block per [`tick`](Self::tick) and handing it to the output
///
/// # Creating an Instance
///
/// The easiest way is [`AudioTree::default_output`] which plays on the
/// system's default audio device:
///
/// ```no_run
/// # #[cfg(feature = "cpal_sink")]
/// # fn main() -> audionodes::Result<()> {
/// # use audionodes::AudioTree;
/// let mut tree = AudioTree::default_output()?;
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "cpal_sink"))]
/// # fn main() {}
/// ```
///
/// For more control, use [`AudioTree::new`] and attach any
/// [`AudioSink`] with [`with_output`](Self::with_output):
///
/// ```
/// # fn main() -> audionodes::Result<()> {
/// use audionodes::{AudioTree, EngineConfig};
/// use audionodes::io::RtrbSink;
///
/// let (sink, _consumer) = RtrbSink::with_capacity(8192);
/// let tree = AudioTree::new(EngineConfig::new(48_000).with_block_len(512))?
///     .with_output(sink);
/// assert_eq!(tree.sample_rate(), 48_000);
/// # Ok(())
/// # }
/// ```
///
/// # Building the Graph
///
/// 1. Add nodes with [`add`](Self::add) - returns a [`NodeId`]
/// 2. Link an output socket to an input socket with [`connect`](Self::connect)
/// 3. Give unlinked inputs a value with [`set_input`](Self::set_input)
/// 4. Link the final signal into an [`Output`](crate::nodes::Output) node
///
/// ```
/// # fn main() -> audionodes::Result<()> {
/// use audionodes::{AudioTree, EngineConfig};
/// use audionodes::nodes::{Delay, Oscillator, Output};
///
/// let mut tree = AudioTree::new(EngineConfig::default())?;
///
/// // Create nodes
/// let osc = tree.add(Oscillator::sine());
/// let echo = tree.add(Delay::new());
/// let out = tree.add(Output::new());
///
/// // Build the graph
/// tree.set_input(osc, "frequency", 220.0)?;
/// tree.set_input(osc, "amplitude", 0.25)?;
/// tree.connect(osc, "audio", echo, "audio")?;
/// tree.connect(echo, "audio", out, "audio")?;
///
/// let block = tree.tick()?;
/// assert_eq!(block.get(out).map(|b| b.len()), Some(1024));
/// # Ok(())
/// # }
/// ```
///
/// # Processing Audio
///
/// Each [`tick`](Self::tick) evaluates one block and, when an output is
/// attached, waits for the previous block to finish playing before queueing
/// the new one. That wait paces the loop, so running in real time is just:
///
/// ```no_run
/// # #[cfg(feature = "cpal_sink")]
/// # fn main() -> audionodes::Result<()> {
/// # let mut tree = audionodes::AudioTree::default_output()?;
/// loop {
///     tree.tick()?;
/// }
/// # }
/// # #[cfg(not(feature = "cpal_sink"))]
/// # fn main() {}
/// ```
pub struct AudioTree {
    config: EngineConfig,
    pub(crate) graph: Graph,
    pub(crate) store: StateStore,
    scheduler: Scheduler,
    /// Valid for the graph as of the last rebuild
    pub(crate) order: EvaluationOrder,

    sink: Option<Box<dyn AudioSink>>,
    pcm: Vec<i16>,

    /// Logical time of the next tick, in seconds
    time: f64,
    ticks: u64,
}

impl AudioTree {
    /// Create an engine without an output.
    ///
    /// Ticks still evaluate the graph and return the sink blocks; use
    /// [`with_output`](Self::with_output) to also play them.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            sample_rate = config.sample_rate,
            block_len = config.block_len,
            "audio tree created"
        );
        Ok(Self {
            config,
            graph: Graph::new(),
            store: StateStore::new(),
            scheduler: Scheduler::new(),
            order: EvaluationOrder::default(),
            sink: None,
            pcm: Vec::with_capacity(config.block_len),
            time: 0.0,
            ticks: 0,
        })
    }

    /// Create an engine playing on the system's default output device, at
    /// that device's sample rate.
    #[cfg(feature = "cpal_sink")]
    pub fn default_output() -> Result<Self> {
        let device = CpalDevice::default_output()
            .ok_or_else(|| Error::DeviceUnavailable("no output device available".into()))?;
        let config = EngineConfig::new(device.sample_rate());
        let sink = device.create_sink(config.block_len)?;
        Ok(Self::new(config)?.with_output(sink))
    }

    /// Attach an output (builder pattern).
    pub fn with_output(mut self, sink: impl AudioSink + 'static) -> Self {
        self.set_output(sink);
        self
    }

    /// Replace the output, returning the previous one.
    pub fn set_output(&mut self, sink: impl AudioSink + 'static) -> Option<Box<dyn AudioSink>> {
        self.sink.replace(Box::new(sink))
    }

    pub fn take_output(&mut self) -> Option<Box<dyn AudioSink>> {
        self.sink.take()
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    #[inline]
    pub fn block_len(&self) -> usize {
        self.config.block_len
    }

    /// Logical time of the next tick, in seconds.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Ticks completed so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The node graph, for inspection.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The evaluation order as of the last rebuild.
    pub fn order(&self) -> &EvaluationOrder {
        &self.order
    }

    /// Add a node to the graph.
    ///
    /// The node value becomes the node's state; keep any handle it offers
    /// (like a [`Keyboard`](crate::nodes::Keyboard)) before adding it.
    pub fn add(&mut self, node: impl AudioNode) -> NodeId {
        let id = self.graph.add_node(&node);
        let created = self.store.create(id, Box::new(node));
        debug_assert!(created.is_ok(), "fresh node id already had state");
        tracing::debug!(?id, kind = self.graph.node(id).map(|n| n.kind()), "node added");
        id
    }

    /// Remove a node, its links and its state.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.graph.remove_node(id)?;
        self.store.destroy(id);
        tracing::debug!(?id, "node removed");
        Ok(())
    }

    /// Link `from.output` into `to.input`, replacing any link already there.
    pub fn connect(&mut self, from: NodeId, output: &str, to: NodeId, input: &str) -> Result<()> {
        self.graph.connect(from, output, to, input)?;
        Ok(())
    }

    /// Unlink `to.input`, returning whether it was linked.
    pub fn disconnect(&mut self, to: NodeId, input: &str) -> Result<bool> {
        self.graph.disconnect(to, input)
    }

    /// Set the value an unlinked input holds. Changes glide over one block.
    pub fn set_input(&mut self, id: NodeId, input: &str, value: f32) -> Result<()> {
        self.graph.set_input(id, input, value)
    }

    /// Rebuild the evaluation order now instead of on the next tick.
    pub fn rebuild(&mut self) -> Result<()> {
        self.order = topology::rebuild(&self.graph)?;
        self.graph.take_dirty();
        Ok(())
    }

    /// Evaluate one block.
    ///
    /// Rebuilds the evaluation order first if the graph changed. Should a node
    /// vanish under the evaluation anyway, the order is rebuilt and the tick
    /// retried once before failing with [`Error::StructuralInconsistency`].
    /// Nothing reaches the output unless the whole tick succeeded.
    pub fn tick(&mut self) -> Result<TickOutput> {
        let ctx = ProcessContext {
            tick_time: self.time,
            sample_rate: self.config.sample_rate,
            block_duration: self.config.block_duration(),
            block_len: self.config.block_len,
        };

        let mut attempts = 0;
        let output = loop {
            attempts += 1;
            if self.graph.is_dirty() {
                self.rebuild()?;
            }
            match self
                .scheduler
                .evaluate_tick(&mut self.graph, &mut self.store, &self.order, &ctx)
            {
                Ok(output) => break output,
                Err(Error::MissingNode(node)) if attempts < MAX_ATTEMPTS => {
                    tracing::warn!(?node, attempts, "node vanished mid-tick, rebuilding");
                    self.graph.mark_dirty();
                }
                Err(Error::MissingNode(node)) => {
                    return Err(Error::StructuralInconsistency { node, attempts });
                }
                Err(err) => return Err(err),
            }
        };

        self.time += ctx.block_duration;
        self.ticks += 1;

        if let Some(sink) = self.sink.as_mut() {
            io::encode(&output.mixdown(ctx.block_len), &mut self.pcm);
            sink.wait_ready()?;
            sink.play(&self.pcm)?;
        }

        Ok(output)
    }

    /// Run `ticks` ticks back to back.
    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RtrbSink;
    use crate::nodes::{Oscillator, Output};

    fn tree() -> AudioTree {
        AudioTree::new(EngineConfig::new(8).with_block_len(4)).unwrap()
    }

    #[test]
    fn rebuilds_lazily() {
        let mut tree = tree();
        let osc = tree.add(Oscillator::sine());
        let out = tree.add(Output::new());
        tree.connect(osc, "audio", out, "audio").unwrap();
        assert!(tree.order().is_empty());

        tree.tick().unwrap();
        assert_eq!(tree.order().nodes(), &[osc, out]);
        assert!(!tree.graph().is_dirty());
    }

    #[test]
    fn clock_advances_per_tick() {
        let mut tree = tree();
        tree.run(3).unwrap();
        assert_eq!(tree.ticks(), 3);
        assert_eq!(tree.time(), 1.5);
    }

    #[test]
    fn stale_order_is_recovered_once() {
        let mut tree = tree();
        let osc = tree.add(Oscillator::sine());
        let out = tree.add(Output::new());
        tree.connect(osc, "audio", out, "audio").unwrap();
        tree.tick().unwrap();

        // pull the node out from under the cached order
        tree.graph.remove_node(osc).unwrap();
        tree.graph.take_dirty();
        tree.store.destroy(osc);

        let output = tree.tick().unwrap();
        assert_eq!(tree.order().nodes(), &[out]);
        assert_eq!(output.get(out).unwrap().mixdown(), vec![0.0; 4]);
    }

    #[test]
    fn persistent_inconsistency_is_fatal() {
        let mut tree = tree();
        let out = tree.add(Output::new());
        tree.tick().unwrap();

        // state gone but the node still in the graph: a rebuild can't help
        tree.store.destroy(out);
        let err = tree.tick().unwrap_err();
        assert!(matches!(
            err,
            Error::StructuralInconsistency { node, attempts: 2 } if node == out
        ));
        assert_eq!(tree.ticks(), 1);
    }

    #[test]
    fn cycles_fail_the_tick() {
        use crate::nodes::Delay;

        let mut tree = tree();
        let a = tree.add(Delay::new());
        let b = tree.add(Delay::new());
        let out = tree.add(Output::new());
        tree.connect(a, "audio", b, "audio").unwrap();
        tree.connect(b, "audio", a, "audio").unwrap();
        tree.connect(b, "audio", out, "audio").unwrap();

        assert!(matches!(tree.tick(), Err(Error::CyclicGraph { .. })));
        assert!(tree.graph().is_dirty());

        tree.disconnect(a, "audio").unwrap();
        assert!(tree.tick().is_ok());
    }

    #[test]
    fn plays_pcm_into_the_sink() {
        let (sink, mut consumer) = RtrbSink::with_capacity(16);
        let mut tree = tree().with_output(sink);
        let osc = tree.add(Oscillator::new(|_| 2.0));
        let out = tree.add(Output::new());
        tree.connect(osc, "audio", out, "audio").unwrap();

        tree.tick().unwrap();
        let pcm: Vec<i16> = std::iter::from_fn(|| consumer.pop().ok()).collect();
        // clipped to full scale
        assert_eq!(pcm, vec![i16::MAX; 4]);
    }

    #[test]
    fn removal_destroys_state() {
        let mut tree = tree();
        let osc = tree.add(Oscillator::sine());
        tree.remove(osc).unwrap();
        assert!(!tree.store.contains(osc));
        assert!(matches!(tree.remove(osc), Err(Error::UnknownNode(_))));
    }
}
