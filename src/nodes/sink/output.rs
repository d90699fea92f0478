//! Graph output

use crate::block::SampleBlock;
use crate::node::{AudioNode, Inputs, ProcessContext, SocketSpec};

const INPUTS: &[SocketSpec] = &[SocketSpec::new("audio", 0.0)];

/// The node evaluation is pulled from.
///
/// Whatever reaches its `audio` input is handed to the tree's
/// [`AudioSink`](crate::io::AudioSink) at the end of the tick. A tree may
/// hold several; their signals are summed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }
}

impl AudioNode for Output {
    fn kind(&self) -> &'static str {
        "output"
    }

    fn inputs(&self) -> &[SocketSpec] {
        INPUTS
    }

    fn is_sink(&self) -> bool {
        true
    }

    fn process(&mut self, _ctx: &ProcessContext, _inputs: &Inputs) -> Vec<SampleBlock> {
        Vec::new()
    }
}
