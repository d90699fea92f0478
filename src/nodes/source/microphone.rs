//! Live audio capture source

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::block::{SampleBlock, VoiceId};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::io::{from_pcm, AudioSource};
use crate::node::{AudioNode, Inputs, ProcessContext};

use super::capture::{CaptureQueue, CaptureStream};

/// Streams blocks recorded from an [`AudioSource`].
///
/// A background thread reads the source into a [`CaptureQueue`]; each tick
/// takes one block from it, waiting while fewer than `buffer_len` are queued.
/// Once capture ends (a read error, or [`stop`](Self::stop)) the node emits
/// silence. Dropping the node stops and joins the capture thread, so the
/// source should return from `read_block` promptly.
pub struct Microphone {
    queue: Arc<CaptureQueue>,
    stream: CaptureStream,
    voice: VoiceId,
    thread: Option<JoinHandle<()>>,
}

impl Microphone {
    pub fn new(source: impl AudioSource, config: CaptureConfig) -> Result<Self> {
        if config.block_len == 0 {
            return Err(Error::InvalidConfig("capture block length must be non-zero".into()));
        }

        let queue = Arc::new(CaptureQueue::new(config));
        let thread = std::thread::Builder::new()
            .name("audionodes-capture".into())
            .spawn({
                let queue = queue.clone();
                move || capture(source, queue)
            })
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        Ok(Self {
            stream: CaptureStream::new(queue.clone()),
            queue,
            voice: VoiceId::fresh(),
            thread: Some(thread),
        })
    }

    /// Blocks waiting to be played
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_capturing(&self) -> bool {
        !self.queue.is_stopped()
    }

    /// End capture; later ticks emit silence.
    pub fn stop(&self) {
        self.queue.stop();
    }

    #[inline]
    pub fn voice(&self) -> VoiceId {
        self.voice
    }
}

fn capture<S: AudioSource>(mut source: S, queue: Arc<CaptureQueue>) {
    let mut pcm = vec![0i16; queue.config().block_len];
    tracing::debug!(block_len = pcm.len(), "capture started");

    while !queue.is_stopped() {
        if let Err(err) = source.read_block(&mut pcm) {
            tracing::error!(%err, "capture source failed");
            queue.stop();
            break;
        }
        queue.push(pcm.iter().copied().map(from_pcm).collect());
    }
    tracing::debug!("capture stopped");
}

impl AudioNode for Microphone {
    fn kind(&self) -> &'static str {
        "microphone"
    }

    fn outputs(&self) -> &[&'static str] {
        &["audio"]
    }

    fn process(&mut self, ctx: &ProcessContext, _inputs: &Inputs) -> Vec<SampleBlock> {
        let block = match self.stream.next() {
            Some(mut row) => {
                row.resize(ctx.block_len, 0.0);
                SampleBlock::single(row, self.voice)
            }
            None => SampleBlock::silent(ctx.block_len),
        };
        vec![block]
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.queue.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
