//! Block-granular echo line

use std::collections::VecDeque;

use crate::block::{SampleBlock, VoiceId};
use crate::node::{AudioNode, Inputs, ProcessContext, SocketSpec};

const INPUTS: &[SocketSpec] = &[SocketSpec::new("audio", 0.0), SocketSpec::new("delay", 1.0)];

/// A feedback echo measured in whole blocks.
///
/// All input voices are summed to one. The line holds `ceil(delay / block)`
/// blocks; once full, each tick mixes the oldest block with the new input and
/// feeds the mix back in, so echoes decay by half per pass.
pub struct Delay {
    line: VecDeque<Vec<f32>>,
    voice: VoiceId,
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Delay {
    pub fn new() -> Self {
        Self {
            line: VecDeque::new(),
            voice: VoiceId::fresh(),
        }
    }

    /// Blocks currently held in the line
    #[inline]
    pub fn len(&self) -> usize {
        self.line.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    #[inline]
    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    fn emit(&self, row: &[f32]) -> Vec<SampleBlock> {
        let half = row.iter().map(|s| s * 0.5).collect();
        vec![SampleBlock::single(half, self.voice)]
    }
}

/// Whole blocks covering `seconds`. Negative delays count as zero.
///
/// The tolerance absorbs the f32 representation error of the delay value, so
/// 0.1 s over 0.1 s blocks is one block, not two.
fn blocks_for(seconds: f32, block_duration: f64) -> usize {
    let blocks = seconds.max(0.0) as f64 / block_duration;
    (blocks - 1e-6).ceil().max(0.0) as usize
}

impl AudioNode for Delay {
    fn kind(&self) -> &'static str {
        "delay"
    }

    fn inputs(&self) -> &[SocketSpec] {
        INPUTS
    }

    fn outputs(&self) -> &[&'static str] {
        &["audio"]
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &Inputs) -> Vec<SampleBlock> {
        let len = ctx.block_len;
        let mut combined = inputs.get_or_silent("audio", len).mixdown();
        combined.resize(len, 0.0);

        let seconds = inputs
            .get("delay")
            .and_then(SampleBlock::last_sample)
            .unwrap_or(0.0);
        let target = blocks_for(seconds, ctx.block_duration);

        while self.line.len() > target {
            self.line.pop_front();
        }

        if target == 0 {
            self.line.clear();
            return self.emit(&combined);
        }

        if self.line.len() < target {
            let out = self.emit(&combined);
            self.line.push_back(combined);
            return out;
        }

        let mixed: Vec<f32> = match self.line.pop_front() {
            Some(oldest) => oldest
                .iter()
                .zip(&combined)
                .map(|(old, new)| (old + new) * 0.5)
                .collect(),
            None => combined,
        };
        let out = self.emit(&mixed);
        self.line.push_back(mixed);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ProcessContext {
        ProcessContext {
            tick_time: 0.0,
            sample_rate: 4,
            block_duration: 1.0,
            block_len: 4,
        }
    }

    fn inputs(audio: f32, delay: f32) -> Inputs {
        let mut inputs = Inputs::new();
        inputs.insert("audio", SampleBlock::filled(audio, 4, VoiceId::PLACEHOLDER));
        inputs.insert("delay", SampleBlock::filled(delay, 4, VoiceId::PLACEHOLDER));
        inputs
    }

    #[test]
    fn fills_before_echoing() {
        let mut delay = Delay::new();
        let ctx = ctx();

        // two-block line: the first two ticks pass through at half level
        assert_eq!(delay.process(&ctx, &inputs(1.0, 2.0))[0].rows()[0], vec![0.5; 4]);
        assert_eq!(delay.process(&ctx, &inputs(0.5, 2.0))[0].rows()[0], vec![0.25; 4]);
        assert_eq!(delay.len(), 2);

        // third tick mixes in the first block: (1.0 + 0.0) / 2, halved
        assert_eq!(delay.process(&ctx, &inputs(0.0, 2.0))[0].rows()[0], vec![0.25; 4]);
        assert_eq!(delay.len(), 2);
    }

    #[test]
    fn partial_blocks_round_up() {
        let mut delay = Delay::new();
        let ctx = ctx();
        delay.process(&ctx, &inputs(1.0, 0.1));
        assert_eq!(delay.len(), 1);
        let out = delay.process(&ctx, &inputs(0.0, 0.1));
        assert_eq!(out[0].rows()[0], vec![0.25; 4]);
    }

    #[test]
    fn zero_delay_bypasses() {
        let mut delay = Delay::new();
        let ctx = ctx();
        delay.process(&ctx, &inputs(1.0, 3.0));
        delay.process(&ctx, &inputs(1.0, 3.0));

        let out = delay.process(&ctx, &inputs(0.8, 0.0));
        assert_eq!(out[0].rows()[0], vec![0.4; 4]);
        assert!(delay.is_empty());

        let out = delay.process(&ctx, &inputs(0.6, -1.0));
        assert_eq!(out[0].rows()[0], vec![0.3; 4]);
    }

    #[test]
    fn shrinking_delay_trims_oldest() {
        let mut delay = Delay::new();
        let ctx = ctx();
        for audio in [1.0, 2.0, 3.0] {
            delay.process(&ctx, &inputs(audio, 3.0));
        }
        // line is [1, 2, 3]; shrinking to one keeps [3]
        let out = delay.process(&ctx, &inputs(1.0, 1.0));
        assert_eq!(out[0].rows()[0], vec![1.0; 4]);
        assert_eq!(delay.len(), 1);
    }

    #[test]
    fn output_voice_is_stable() {
        let mut delay = Delay::new();
        let ctx = ctx();
        let first = delay.process(&ctx, &inputs(1.0, 1.0))[0].voices()[0];
        let second = delay.process(&ctx, &inputs(1.0, 1.0))[0].voices()[0];
        assert_eq!(first, second);
        assert_eq!(first, delay.voice());
    }

    #[test]
    fn delay_rounds_to_whole_blocks() {
        assert_eq!(blocks_for(0.1, 4410.0 / 44_100.0), 1);
        assert_eq!(blocks_for(0.11, 0.1), 2);
        assert_eq!(blocks_for(0.3, 0.1), 3);
        assert_eq!(blocks_for(0.0, 0.1), 0);
        assert_eq!(blocks_for(-1.0, 0.1), 0);
    }

    #[test]
    fn exact_multiple_does_not_add_a_block() {
        let ctx = ProcessContext {
            tick_time: 0.0,
            sample_rate: 44_100,
            block_duration: 4410.0 / 44_100.0,
            block_len: 4410,
        };
        let mut inputs = Inputs::new();
        inputs.insert("audio", SampleBlock::filled(1.0, 4410, VoiceId::PLACEHOLDER));
        inputs.insert("delay", SampleBlock::filled(0.1, 4410, VoiceId::PLACEHOLDER));

        let mut delay = Delay::new();
        delay.process(&ctx, &inputs);
        assert_eq!(delay.len(), 1);

        // the echo comes back on the very next tick
        inputs.insert("audio", SampleBlock::silent(4410));
        let echo = delay.process(&ctx, &inputs);
        assert_eq!(echo[0].rows()[0][0], 0.25);
        assert_eq!(delay.len(), 1);
    }
}
