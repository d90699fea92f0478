//! Playback and capture seams.
//!
//! The engine hands finished blocks to an [`AudioSink`] and the
//! [`Microphone`](crate::nodes::Microphone) pulls captured blocks from an
//! [`AudioSource`]. Both speak signed 16-bit mono PCM.
//!
//! Implementations:
//! - [`RtrbSink`] - writes into an `rtrb` ring buffer, for pipelines and tests
//! - [`CpalSink`] - plays on a system device (requires `cpal_sink`)
//! - [`CpalSource`] - records from a system device (requires `cpal_source`)

use crate::error::Result;

mod rtrb_sink;
pub use rtrb_sink::RtrbSink;

#[cfg(all(feature = "cpal_sink", feature = "std"))]
mod cpal_sink;
#[cfg(all(feature = "cpal_sink", feature = "std"))]
pub use cpal_sink::CpalSink;

#[cfg(all(feature = "cpal_source", feature = "std"))]
mod cpal_source;
#[cfg(all(feature = "cpal_source", feature = "std"))]
pub use cpal_source::CpalSource;

/// Destination for rendered PCM blocks.
pub trait AudioSink: Send {
    /// Block until the previously played block has been consumed.
    fn wait_ready(&mut self) -> Result<()>;

    /// Queue one block of mono samples.
    fn play(&mut self, pcm: &[i16]) -> Result<()>;
}

/// Origin of captured PCM blocks.
pub trait AudioSource: Send + 'static {
    /// Fill `buf` with the next samples, blocking until enough are available.
    fn read_block(&mut self, buf: &mut [i16]) -> Result<()>;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn wait_ready(&mut self) -> Result<()> {
        (**self).wait_ready()
    }

    fn play(&mut self, pcm: &[i16]) -> Result<()> {
        (**self).play(pcm)
    }
}

/// Convert a sample in `[-1, 1]` to 16-bit PCM, clipping anything outside.
#[inline]
pub fn to_pcm(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert captured 16-bit PCM to a float sample.
///
/// Scales by 2^16, so full-scale input lands in `[-0.5, 0.5)`.
#[inline]
pub fn from_pcm(sample: i16) -> f32 {
    sample as f32 / 65536.0
}

/// Encode a row of float samples into `out`, replacing its contents.
pub fn encode(samples: &[f32], out: &mut Vec<i16>) {
    out.clear();
    out.extend(samples.iter().copied().map(to_pcm));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_clips_at_both_ends() {
        assert_eq!(to_pcm(1.0), i16::MAX);
        assert_eq!(to_pcm(4.0), i16::MAX);
        assert_eq!(to_pcm(-1.0), i16::MIN);
        assert_eq!(to_pcm(-7.5), i16::MIN);
        assert_eq!(to_pcm(0.0), 0);
        assert_eq!(to_pcm(0.5), 16384);
    }

    #[test]
    fn capture_scaling() {
        assert_eq!(from_pcm(0), 0.0);
        assert_eq!(from_pcm(16384), 0.25);
        assert_eq!(from_pcm(i16::MIN), -0.5);
    }

    #[test]
    fn encode_replaces_buffer() {
        let mut out = vec![1, 2, 3, 4, 5];
        encode(&[0.0, 0.5], &mut out);
        assert_eq!(out, vec![0, 16384]);
    }
}
