//! Phase-continuous polyphonic oscillator

use itertools::izip;

use crate::block::{SampleBlock, VoiceId};
use crate::node::{AudioNode, Inputs, ProcessContext, SocketSpec};
use crate::waveform;

const INPUTS: &[SocketSpec] = &[
    SocketSpec::new("frequency", 440.0),
    SocketSpec::new("amplitude", 1.0),
    SocketSpec::new("offset", 0.0),
];

/// An oscillator driven by a per-voice frequency signal.
///
/// Every voice of the `frequency` input gets its own phase accumulator, kept
/// across blocks under the voice's id so that a note sounding for many ticks
/// never jumps. Output is `generator(phase) * amplitude + offset`.
pub struct Oscillator {
    generator: Box<dyn Fn(f64) -> f32 + Send>,
    /// Phase at the start of the next block, in cycles, per voice
    phases: Vec<f64>,
    voices: Vec<VoiceId>,
}

impl Oscillator {
    /// Create an oscillator from a generator mapping phase (in cycles) to a
    /// sample.
    pub fn new(generator: impl Fn(f64) -> f32 + Send + 'static) -> Self {
        Self {
            generator: Box::new(generator),
            phases: Vec::new(),
            voices: Vec::new(),
        }
    }

    pub fn sine() -> Self {
        Self::new(waveform::sine)
    }

    pub fn square() -> Self {
        Self::new(waveform::square)
    }

    pub fn sawtooth() -> Self {
        Self::new(waveform::sawtooth)
    }

    pub fn triangle() -> Self {
        Self::new(waveform::triangle)
    }

    #[inline]
    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    #[inline]
    pub fn voices(&self) -> &[VoiceId] {
        &self.voices
    }

    /// Line the phase table up with the incoming voices.
    ///
    /// Voices that went away lose their phase; a voice not found at its
    /// position starts from zero.
    fn reconcile(&mut self, incoming: &[VoiceId]) {
        if self.voices == incoming {
            return;
        }

        let mut i = 0;
        while i < self.voices.len() {
            if incoming.contains(&self.voices[i]) {
                i += 1;
            } else {
                self.voices.remove(i);
                self.phases.remove(i);
            }
        }

        for (index, id) in incoming.iter().enumerate() {
            if self.voices.get(index) != Some(id) {
                self.voices.insert(index, *id);
                self.phases.insert(index, 0.0);
            }
        }

        self.voices.truncate(incoming.len());
        self.phases.truncate(incoming.len());
    }
}

/// Samples of `block` for `voice`, continued by `fallback` once they run out.
fn row_or<'a>(
    block: &'a SampleBlock,
    voice: usize,
    fallback: f32,
) -> impl Iterator<Item = f32> + 'a {
    block
        .row_or_broadcast(voice)
        .into_iter()
        .flatten()
        .copied()
        .chain(std::iter::repeat(fallback))
}

impl AudioNode for Oscillator {
    fn kind(&self) -> &'static str {
        "oscillator"
    }

    fn inputs(&self) -> &[SocketSpec] {
        INPUTS
    }

    fn outputs(&self) -> &[&'static str] {
        &["audio"]
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &Inputs) -> Vec<SampleBlock> {
        let len = ctx.block_len;
        let frequency = inputs.get_or_silent("frequency", len);
        let amplitude = inputs.get_or_silent("amplitude", len);
        let offset = inputs.get_or_silent("offset", len);

        self.reconcile(frequency.voices());

        let rate = ctx.sample_rate as f64;
        let generator = &self.generator;
        let rows: Vec<Vec<f32>> = self
            .phases
            .iter_mut()
            .zip(frequency.rows())
            .enumerate()
            .map(|(voice, (phase, freq_row))| {
                let mut acc = *phase;
                let gains = row_or(&amplitude, voice, 1.0);
                let offsets = row_or(&offset, voice, 0.0);
                let row = izip!(freq_row, gains, offsets)
                    .map(|(f, a, o)| {
                        acc += *f as f64 / rate;
                        generator(acc) * a + o
                    })
                    .collect();
                *phase = acc.rem_euclid(1.0);
                row
            })
            .collect();

        let block = SampleBlock::new(rows, self.voices.clone()).unwrap_or_else(|err| {
            tracing::error!(%err, "oscillator produced a malformed block");
            SampleBlock::silent(len)
        });
        vec![block]
    }
}
