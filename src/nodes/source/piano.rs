//! Polyphonic key-event source

use std::sync::Arc;

use parking_lot::Mutex;

use crate::block::{SampleBlock, VoiceId};
use crate::node::{AudioNode, Inputs, ProcessContext};

/// Whether a key is held down or only kept alive by the sustain pedal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPhase {
    Pressed,
    Sustained,
}

/// One sounding key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Key {
    pub note: u8,
    pub frequency: f32,
    /// MIDI velocity, 1-127
    pub velocity: u8,
    /// Tick time the key was (re)pressed at
    pub start: f64,
    pub voice: VoiceId,
    pub phase: KeyPhase,
}

struct Outputs {
    tick_time: f64,
    blocks: [SampleBlock; 3],
}

#[derive(Default)]
struct KeyState {
    keys: Vec<Key>,
    sustain: bool,
    last_tick: f64,
    cached: Option<Outputs>,
}

impl KeyState {
    fn render(&self, ctx: &ProcessContext) -> [SampleBlock; 3] {
        let len = ctx.block_len;
        if self.keys.is_empty() {
            let silent = SampleBlock::silent(len);
            return [silent.clone(), silent.clone(), silent];
        }

        let voices: Vec<VoiceId> = self.keys.iter().map(|k| k.voice).collect();
        let rate = ctx.sample_rate as f64;

        let frequency = self.keys.iter().map(|k| vec![k.frequency; len]).collect();
        let runtime = self
            .keys
            .iter()
            .map(|k| {
                let held = ctx.tick_time - k.start;
                (0..len).map(|i| (held + i as f64 / rate) as f32).collect()
            })
            .collect();
        let velocity = self
            .keys
            .iter()
            .map(|k| vec![k.velocity as f32 / 127.0; len])
            .collect();

        [
            SampleBlock::new(frequency, voices.clone()),
            SampleBlock::new(runtime, voices.clone()),
            SampleBlock::new(velocity, voices),
        ]
        .map(|block| block.unwrap_or_else(|_| SampleBlock::silent(len)))
    }
}

/// Turns key presses into per-voice `frequency`, `runtime` and `velocity`
/// signals.
///
/// Key events arrive through [`Keyboard`] handles, from any thread. Each
/// pressed key is one voice; `runtime` counts the seconds since its press, so
/// downstream envelopes can shape the note.
///
/// ```
/// use audionodes::nodes::Piano;
///
/// let piano = Piano::new();
/// let keyboard = piano.keyboard();
/// keyboard.key_down(69, 440.0, 100);
/// assert_eq!(keyboard.active_keys().len(), 1);
/// keyboard.key_up(69);
/// assert!(keyboard.active_keys().is_empty());
/// ```
pub struct Piano {
    state: Arc<Mutex<KeyState>>,
}

impl Default for Piano {
    fn default() -> Self {
        Self::new()
    }
}

impl Piano {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(KeyState::default())),
        }
    }

    /// A handle for sending key events to this piano.
    pub fn keyboard(&self) -> Keyboard {
        Keyboard {
            state: self.state.clone(),
        }
    }
}

impl AudioNode for Piano {
    fn kind(&self) -> &'static str {
        "piano"
    }

    fn outputs(&self) -> &[&'static str] {
        &["frequency", "runtime", "velocity"]
    }

    fn process(&mut self, ctx: &ProcessContext, _inputs: &Inputs) -> Vec<SampleBlock> {
        let mut state = self.state.lock();
        let fresh = state
            .cached
            .as_ref()
            .map_or(false, |c| c.tick_time == ctx.tick_time);

        if !fresh {
            let blocks = state.render(ctx);
            state.last_tick = ctx.tick_time;
            state.cached = Some(Outputs {
                tick_time: ctx.tick_time,
                blocks,
            });
        }

        match &state.cached {
            Some(outputs) => outputs.blocks.to_vec(),
            None => Vec::new(),
        }
    }
}

/// Cloneable, thread-safe handle feeding key events to a [`Piano`].
#[derive(Clone)]
pub struct Keyboard {
    state: Arc<Mutex<KeyState>>,
}

impl Keyboard {
    /// Press `note`. A velocity of zero counts as a release.
    ///
    /// With the sustain pedal down, pressing a note that is still sounding
    /// restarts it as a new voice instead of stacking another one.
    pub fn key_down(&self, note: u8, frequency: f32, velocity: u8) {
        if velocity == 0 {
            self.key_up(note);
            return;
        }

        let mut state = self.state.lock();
        let start = state.last_tick;
        let key = Key {
            note,
            frequency,
            velocity,
            start,
            voice: VoiceId::fresh(),
            phase: KeyPhase::Pressed,
        };

        if state.sustain && state.keys.iter().any(|k| k.note == note) {
            for existing in state.keys.iter_mut().filter(|k| k.note == note) {
                *existing = Key {
                    voice: VoiceId::fresh(),
                    ..key
                };
            }
        } else {
            state.keys.push(key);
        }
        tracing::trace!(note, velocity, "key down");
    }

    /// Release `note`; with sustain on it keeps sounding until the pedal lifts.
    pub fn key_up(&self, note: u8) {
        let mut state = self.state.lock();
        if state.sustain {
            state
                .keys
                .iter_mut()
                .filter(|k| k.note == note)
                .for_each(|k| k.phase = KeyPhase::Sustained);
        } else {
            state.keys.retain(|k| k.note != note);
        }
        tracing::trace!(note, "key up");
    }

    /// Press or lift the sustain pedal. Lifting it silences every key that was
    /// only being sustained.
    pub fn set_sustain(&self, on: bool) {
        let mut state = self.state.lock();
        if state.sustain == on {
            return;
        }
        state.sustain = on;
        if !on {
            state.keys.retain(|k| k.phase != KeyPhase::Sustained);
        }
    }

    pub fn sustain(&self) -> bool {
        self.state.lock().sustain
    }

    /// Drop every key at once.
    pub fn clear(&self) {
        self.state.lock().keys.clear();
    }

    /// Snapshot of the sounding keys, oldest first.
    pub fn active_keys(&self) -> Vec<Key> {
        self.state.lock().keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ctx(tick_time: f64) -> ProcessContext {
        ProcessContext {
            tick_time,
            sample_rate: 4,
            block_duration: 1.0,
            block_len: 4,
        }
    }

    #[test]
    fn silent_without_keys() {
        let mut piano = Piano::new();
        let out = piano.process(&ctx(0.0), &Inputs::new());
        assert_eq!(out.len(), 3);
        for block in out {
            assert_eq!(block, SampleBlock::silent(4));
        }
    }

    #[test]
    fn one_voice_per_key() {
        let mut piano = Piano::new();
        let keys = piano.keyboard();
        piano.process(&ctx(1.0), &Inputs::new());
        keys.key_down(60, 261.6, 127);
        keys.key_down(64, 329.6, 64);

        let out = piano.process(&ctx(2.0), &Inputs::new());
        let [frequency, runtime, velocity] = [&out[0], &out[1], &out[2]];
        assert_eq!(frequency.voice_count(), 2);
        assert_eq!(frequency.rows()[1], vec![329.6; 4]);
        assert_eq!(velocity.rows()[0], vec![1.0; 4]);
        assert_abs_diff_eq!(velocity.rows()[1][0], 64.0 / 127.0);
        // pressed at the previous tick, one second ago
        assert_eq!(runtime.rows()[0], vec![1.0, 1.25, 1.5, 1.75]);
        assert_eq!(frequency.voices(), runtime.voices());
    }

    #[test]
    fn same_tick_is_cached() {
        let mut piano = Piano::new();
        let keys = piano.keyboard();
        let first = piano.process(&ctx(0.0), &Inputs::new());
        keys.key_down(60, 261.6, 100);
        let again = piano.process(&ctx(0.0), &Inputs::new());
        assert_eq!(first, again);
        let next = piano.process(&ctx(1.0), &Inputs::new());
        assert_eq!(next[0].voice_count(), 1);
        assert_ne!(next[0].voices()[0], VoiceId::PLACEHOLDER);
    }

    #[test]
    fn release_without_sustain_removes() {
        let piano = Piano::new();
        let keys = piano.keyboard();
        keys.key_down(60, 261.6, 100);
        keys.key_down(60, 261.6, 100);
        keys.key_up(60);
        assert!(keys.active_keys().is_empty());
    }

    #[test]
    fn zero_velocity_releases() {
        let piano = Piano::new();
        let keys = piano.keyboard();
        keys.key_down(60, 261.6, 100);
        keys.key_down(60, 261.6, 0);
        assert!(keys.active_keys().is_empty());
    }

    #[test]
    fn sustain_holds_until_pedal_lifts() {
        let piano = Piano::new();
        let keys = piano.keyboard();
        keys.set_sustain(true);
        keys.key_down(60, 261.6, 100);
        keys.key_down(64, 329.6, 100);
        keys.key_up(60);

        let active = keys.active_keys();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].phase, KeyPhase::Sustained);
        assert_eq!(active[1].phase, KeyPhase::Pressed);

        keys.set_sustain(false);
        let active = keys.active_keys();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].note, 64);
    }

    #[test]
    fn sustained_repress_reactivates_with_new_voice() {
        let mut piano = Piano::new();
        let keys = piano.keyboard();
        keys.set_sustain(true);
        keys.key_down(60, 261.6, 100);
        keys.key_up(60);
        let before = keys.active_keys()[0];

        piano.process(&ctx(3.0), &Inputs::new());
        keys.key_down(60, 262.0, 50);
        let after = keys.active_keys();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].phase, KeyPhase::Pressed);
        assert_ne!(after[0].voice, before.voice);
        assert_eq!(after[0].start, 3.0);
        assert_eq!(after[0].velocity, 50);
    }

    #[test]
    fn repeated_sustain_is_a_no_op() {
        let piano = Piano::new();
        let keys = piano.keyboard();
        keys.set_sustain(true);
        keys.key_down(60, 261.6, 100);
        keys.key_up(60);
        keys.set_sustain(true);
        assert_eq!(keys.active_keys().len(), 1);
        keys.clear();
        assert!(keys.active_keys().is_empty());
        assert!(keys.sustain());
    }
}
