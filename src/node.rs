//! Core node trait and context types.

use std::borrow::Cow;

use crate::block::SampleBlock;

/// Information available during one evaluation tick.
///
/// Passed to every [`AudioNode::process`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessContext {
    /// Logical time of the tick in seconds
    pub tick_time: f64,
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Duration of one block in seconds
    pub block_duration: f64,
    /// Number of samples per block row
    pub block_len: usize,
}

/// Unique identifier for a node within an [`AudioTree`](crate::AudioTree).
///
/// Ids are handed out once and never reused, so a handle can't accidentally
/// address a newer node that replaced a removed one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(pub(crate) u32);

/// Declaration of an input socket and the scalar it holds while unlinked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SocketSpec {
    pub name: &'static str,
    pub default: f32,
}

impl SocketSpec {
    pub const fn new(name: &'static str, default: f32) -> Self {
        Self { name, default }
    }
}

/// The input blocks handed to a node for one tick, keyed by socket name.
///
/// Every declared input has an entry: either data routed from an upstream
/// node, or a block synthesized from the socket's scalar value.
#[derive(Clone, Debug, Default)]
pub struct Inputs {
    blocks: Vec<(&'static str, SampleBlock)>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, block: SampleBlock) {
        match self.blocks.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = block,
            None => self.blocks.push((name, block)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SampleBlock> {
        self.blocks
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, block)| block)
    }

    /// The named block, or a silent placeholder if the socket is absent.
    pub fn get_or_silent(&self, name: &str, len: usize) -> Cow<'_, SampleBlock> {
        match self.get(name) {
            Some(block) => Cow::Borrowed(block),
            None => Cow::Owned(SampleBlock::silent(len)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SampleBlock)> {
        self.blocks.iter().map(|(name, block)| (*name, block))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// The core trait for graph nodes.
///
/// A node declares its sockets and turns one block of inputs into one block
/// per output. Nodes can be:
/// - **Sources**: no inputs (or only scalar parameters) - oscillators, pianos, microphones
/// - **Effects**: inputs and outputs - delays
/// - **Sinks**: inputs only, flagged with [`is_sink`](Self::is_sink) - the audio output
///
/// The struct implementing this trait *is* the node's persistent state. It is
/// owned by the [`StateStore`](crate::StateStore) under the node's id and only
/// ever touched from the tick thread.
///
/// ```
/// use audionodes::{AudioNode, Inputs, ProcessContext, SampleBlock, SocketSpec};
///
/// /// Multiplies its input by a gain parameter.
/// struct Gain;
///
/// const INPUTS: &[SocketSpec] = &[SocketSpec::new("audio", 0.0), SocketSpec::new("gain", 1.0)];
///
/// impl AudioNode for Gain {
///     fn kind(&self) -> &'static str { "gain" }
///     fn inputs(&self) -> &[SocketSpec] { INPUTS }
///     fn outputs(&self) -> &[&'static str] { &["audio"] }
///
///     fn process(&mut self, ctx: &ProcessContext, inputs: &Inputs) -> Vec<SampleBlock> {
///         let audio = inputs.get_or_silent("audio", ctx.block_len);
///         let gain = inputs.get_or_silent("gain", ctx.block_len);
///         let rows = audio
///             .rows()
///             .iter()
///             .enumerate()
///             .map(|(voice, row)| {
///                 let g = gain.row_or_broadcast(voice).unwrap_or(&[]);
///                 row.iter().zip(g).map(|(s, g)| s * g).collect()
///             })
///             .collect();
///         vec![SampleBlock::new(rows, audio.voices().to_vec()).unwrap_or_default()]
///     }
/// }
/// ```
pub trait AudioNode: Send + 'static {
    /// Type tag of the node, e.g. `"oscillator"`.
    fn kind(&self) -> &'static str;

    /// Input sockets in declaration order.
    fn inputs(&self) -> &[SocketSpec] {
        &[]
    }

    /// Output socket names in declaration order.
    fn outputs(&self) -> &[&'static str] {
        &[]
    }

    /// Whether evaluation is pulled from this node.
    fn is_sink(&self) -> bool {
        false
    }

    /// Evaluate one tick.
    ///
    /// Must return exactly one block per entry of [`outputs`](Self::outputs),
    /// in the same order.
    fn process(&mut self, ctx: &ProcessContext, inputs: &Inputs) -> Vec<SampleBlock>;
}
