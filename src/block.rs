//! Multi-voice sample blocks passed between nodes.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

static NEXT_VOICE: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one concurrently sounding voice.
///
/// Voices keep their id for as long as they sound, which is what lets stateful
/// nodes (like the [`Oscillator`](crate::nodes::Oscillator)) carry per-voice
/// state from one block to the next.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct VoiceId(u64);

impl VoiceId {
    /// Id used for silent stand-in voices.
    pub const PLACEHOLDER: VoiceId = VoiceId(0);

    /// Allocate an id that has never been handed out before.
    pub fn fresh() -> Self {
        VoiceId(NEXT_VOICE.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        VoiceId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One block of audio (or control) data: a row of samples per voice, plus the
/// id of each voice.
///
/// The row count always equals the voice count and every row has the same
/// length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBlock {
    rows: Vec<Vec<f32>>,
    voices: Vec<VoiceId>,
}

impl SampleBlock {
    /// Build a block, checking the shape invariant.
    pub fn new(rows: Vec<Vec<f32>>, voices: Vec<VoiceId>) -> Result<Self> {
        if rows.len() != voices.len() {
            return Err(Error::BlockShape {
                rows: rows.len(),
                voices: voices.len(),
            });
        }
        if let Some(first) = rows.first() {
            if rows.iter().any(|row| row.len() != first.len()) {
                return Err(Error::BlockShape {
                    rows: rows.len(),
                    voices: voices.len(),
                });
            }
        }
        Ok(Self { rows, voices })
    }

    /// A single-voice block.
    pub fn single(row: Vec<f32>, voice: VoiceId) -> Self {
        Self {
            rows: vec![row],
            voices: vec![voice],
        }
    }

    /// One placeholder voice of silence.
    pub fn silent(len: usize) -> Self {
        Self::filled(0.0, len, VoiceId::PLACEHOLDER)
    }

    /// One voice holding a constant value.
    pub fn filled(value: f32, len: usize, voice: VoiceId) -> Self {
        Self::single(vec![value; len], voice)
    }

    /// One voice crossfading linearly from `from` towards `to` over the block.
    pub fn ramp(from: f32, to: f32, len: usize, voice: VoiceId) -> Self {
        if from == to {
            return Self::filled(to, len, voice);
        }
        let row = (0..len)
            .map(|i| {
                let t = i as f32 / len as f32;
                to * t + from * (1.0 - t)
            })
            .collect();
        Self::single(row, voice)
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    #[inline]
    pub fn voices(&self) -> &[VoiceId] {
        &self.voices
    }

    #[inline]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Samples per row (0 for a block with no voices).
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, voice_index: usize) -> Option<&[f32]> {
        self.rows.get(voice_index).map(Vec::as_slice)
    }

    /// Row for the voice at `voice_index`, falling back to the first row so a
    /// single-voice block applies to every voice.
    pub fn row_or_broadcast(&self, voice_index: usize) -> Option<&[f32]> {
        self.rows
            .get(voice_index)
            .or_else(|| self.rows.first())
            .map(Vec::as_slice)
    }

    /// Sum all voices into one row.
    pub fn mixdown(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.len()];
        for row in &self.rows {
            for (acc, sample) in out.iter_mut().zip(row) {
                *acc += *sample;
            }
        }
        out
    }

    /// Most recent sample of the first voice.
    pub fn last_sample(&self) -> Option<f32> {
        self.rows.first().and_then(|row| row.last()).copied()
    }

    pub fn into_parts(self) -> (Vec<Vec<f32>>, Vec<VoiceId>) {
        (self.rows, self.voices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_voices() {
        let err = SampleBlock::new(vec![vec![0.0; 4]], vec![]).unwrap_err();
        assert!(matches!(err, Error::BlockShape { rows: 1, voices: 0 }));
    }

    #[test]
    fn rejects_ragged_rows() {
        let voices = vec![VoiceId::fresh(), VoiceId::fresh()];
        assert!(SampleBlock::new(vec![vec![0.0; 4], vec![0.0; 3]], voices).is_err());
    }

    #[test]
    fn ramp_starts_at_previous_value() {
        let block = SampleBlock::ramp(1.0, 3.0, 4, VoiceId::PLACEHOLDER);
        assert_eq!(block.rows()[0], vec![1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn mixdown_sums_voices() {
        let block = SampleBlock::new(
            vec![vec![0.25, 0.5], vec![0.25, -0.5]],
            vec![VoiceId::fresh(), VoiceId::fresh()],
        )
        .unwrap();
        assert_eq!(block.mixdown(), vec![0.5, 0.0]);
    }

    #[test]
    fn single_row_broadcasts() {
        let block = SampleBlock::filled(2.0, 3, VoiceId::PLACEHOLDER);
        assert_eq!(block.row_or_broadcast(5), Some(&[2.0, 2.0, 2.0][..]));
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = VoiceId::fresh();
        let b = VoiceId::fresh();
        assert_ne!(a, b);
        assert_ne!(a, VoiceId::PLACEHOLDER);
    }
}
