//! Ring buffer sink for custom audio processing

use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::{Error, Result};
use crate::io::AudioSink;

/// Sleep bounds while waiting for the consumer to make room
const MIN_POLL: Duration = Duration::from_micros(50);
const MAX_POLL: Duration = Duration::from_millis(2);

/// A sink that pushes PCM into an rtrb ring buffer
///
/// Useful for:
/// - Sending audio to another thread
/// - Recording/analysis
/// - Driving the engine in tests
pub struct RtrbSink {
    producer: Producer<i16>,
    capacity: usize,
    last_len: usize,
    dropped: usize,
}

impl RtrbSink {
    /// Create a sink that writes to the given producer
    pub fn new(producer: Producer<i16>) -> Self {
        let capacity = producer.slots();
        Self {
            producer,
            capacity,
            last_len: 0,
            dropped: 0,
        }
    }

    /// Create a sink together with the consumer end of a fresh buffer
    pub fn with_capacity(capacity: usize) -> (Self, Consumer<i16>) {
        let (producer, consumer) = RingBuffer::new(capacity);
        (Self::new(producer), consumer)
    }

    /// Returns how many sample slots are available
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    /// Number of blocks skipped because the buffer was full
    #[inline]
    pub fn dropped_blocks(&self) -> usize {
        self.dropped
    }
}

impl AudioSink for RtrbSink {
    /// Waits until there's room for another block the size of the last one.
    ///
    /// rtrb has no wakeup, so this sleeps between checks, backing off up to
    /// `MAX_POLL`.
    fn wait_ready(&mut self) -> Result<()> {
        let needed = self.last_len.min(self.capacity);
        let mut pause = MIN_POLL;
        while self.producer.slots() < needed {
            if self.producer.is_abandoned() {
                return Err(Error::DeviceUnavailable("ring buffer consumer dropped".into()));
            }
            std::thread::sleep(pause);
            pause = (pause * 2).min(MAX_POLL);
        }
        Ok(())
    }

    fn play(&mut self, pcm: &[i16]) -> Result<()> {
        self.last_len = pcm.len();

        // Skip the block rather than partially write it
        if self.producer.slots() < pcm.len() {
            self.dropped += 1;
            tracing::warn!(
                samples = pcm.len(),
                available = self.producer.slots(),
                "ring buffer full, dropping block"
            );
            return Ok(());
        }

        for &sample in pcm {
            // Safety: we verified slots above
            let _ = self.producer.push(sample);
        }
        Ok(())
    }
}
