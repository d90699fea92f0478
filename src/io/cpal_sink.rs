//! CPAL audio output sink

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::{Error, Result};
use crate::io::AudioSink;

/// Plays PCM blocks on a CPAL device.
///
/// The CPAL stream runs on its own thread; [`play`](AudioSink::play) feeds a
/// ring buffer the stream consumes, duplicating the mono signal to every
/// device channel. [`wait_ready`](AudioSink::wait_ready) blocks until at most
/// one block is left to play, so the next block is always queued before the
/// device runs dry.
pub struct CpalSink {
    queue: BlockQueue,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open a stream on `device`, keeping one `block_len` block queued ahead.
    pub fn new(
        device: &cpal::Device,
        config: &SupportedStreamConfig,
        block_len: usize,
    ) -> Result<Self> {
        let sample_format = config.sample_format();
        let stream_config = config.config();
        let channels = stream_config.channels;
        let sample_rate = stream_config.sample_rate.0;

        let (queue, feed) = BlockQueue::new(block_len, channels as usize);
        let (started_tx, started_rx) = bounded::<Result<()>>(1);
        let shutdown = Arc::new(AtomicBool::new(false));

        // cpal streams aren't Send; the stream lives as long as this thread
        let device = device.clone();
        let stop = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name("audionodes-output".into())
            .spawn(move || {
                let stream = match build_stream(&device, sample_format, &stream_config, feed) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = started_tx.send(Err(err));
                        return;
                    }
                };
                if let Err(err) = stream.play() {
                    let _ = started_tx.send(Err(Error::DeviceUnavailable(err.to_string())));
                    return;
                }
                let _ = started_tx.send(Ok(()));

                while !stop.load(Ordering::Acquire) {
                    std::thread::park();
                }
                tracing::debug!("output stream stopped");
            })
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        started_rx
            .recv()
            .map_err(|_| Error::DeviceUnavailable("output thread exited".into()))??;

        tracing::info!(
            channels,
            sample_rate,
            block_len,
            ?sample_format,
            "output stream started"
        );

        Ok(Self {
            queue,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Returns how many frames have been played
    #[inline]
    pub fn frames_consumed(&self) -> usize {
        self.queue.stats.frames_consumed.load(Ordering::Relaxed)
    }

    /// Check and clear the underrun flag
    pub fn check_underrun(&self) -> bool {
        self.queue.check_underrun()
    }
}

impl AudioSink for CpalSink {
    fn wait_ready(&mut self) -> Result<()> {
        self.queue.wait_ready()
    }

    fn play(&mut self, pcm: &[i16]) -> Result<()> {
        self.queue.play(pcm)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

#[derive(Default)]
struct PlaybackStats {
    frames_consumed: AtomicUsize,
    had_underrun: AtomicBool,
}

/// Writing end of the ring buffer the device callback drains.
struct BlockQueue {
    buffer: Producer<i16>,
    capacity: usize,
    block_len: usize,
    consumed: Receiver<()>,
    stats: Arc<PlaybackStats>,
}

impl BlockQueue {
    fn new(block_len: usize, channels: usize) -> (Self, Feed) {
        // room for the block playing plus the one queued behind it
        let capacity = (block_len * 2).next_power_of_two().max(8192);
        let (producer, consumer) = RingBuffer::<i16>::new(capacity);
        let (consumed_tx, consumed_rx) = bounded(1);
        let stats = Arc::new(PlaybackStats::default());

        let queue = Self {
            buffer: producer,
            capacity,
            block_len,
            consumed: consumed_rx,
            stats: stats.clone(),
        };
        let feed = Feed {
            consumer,
            channels,
            consumed: consumed_tx,
            stats,
        };
        (queue, feed)
    }

    #[inline]
    fn queued(&self) -> usize {
        self.capacity - self.buffer.slots()
    }

    fn check_underrun(&self) -> bool {
        self.stats.had_underrun.swap(false, Ordering::Relaxed)
    }

    fn wait_ready(&mut self) -> Result<()> {
        while self.queued() > self.block_len {
            self.consumed
                .recv()
                .map_err(|_| Error::DeviceUnavailable("output stream stopped".into()))?;
        }
        Ok(())
    }

    fn play(&mut self, pcm: &[i16]) -> Result<()> {
        if self.buffer.slots() < pcm.len() {
            tracing::warn!(
                samples = pcm.len(),
                available = self.buffer.slots(),
                "output buffer full, dropping block"
            );
            return Ok(());
        }
        for &sample in pcm {
            let _ = self.buffer.push(sample);
        }
        Ok(())
    }
}

/// State moved into the device callback.
struct Feed {
    consumer: Consumer<i16>,
    channels: usize,
    consumed: Sender<()>,
    stats: Arc<PlaybackStats>,
}

impl Feed {
    fn fill<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<i16>,
    {
        let mut underrun = false;
        let mut frames = 0;
        for frame in data.chunks_mut(self.channels.max(1)) {
            let s = self.consumer.pop().unwrap_or_else(|_| {
                underrun = true;
                0
            });
            let v = T::from_sample(s);
            frame.iter_mut().for_each(|d| *d = v);
            frames += 1;
        }
        if underrun {
            self.stats.had_underrun.store(true, Ordering::Relaxed);
        }
        self.stats.frames_consumed.fetch_add(frames, Ordering::Relaxed);
        // a full channel already holds a wakeup for the writer
        let _ = self.consumed.try_send(());
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    feed: Feed,
) -> Result<cpal::Stream> {
    match sample_format {
        SampleFormat::F32 => run::<f32>(device, stream_config, feed),
        SampleFormat::I16 => run::<i16>(device, stream_config, feed),
        SampleFormat::U16 => run::<u16>(device, stream_config, feed),
        other => Err(Error::DeviceUnavailable(format!(
            "unsupported sample format: {:?}",
            other
        ))),
    }
}

fn run<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut feed: Feed,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<i16>,
{
    device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| feed.fill(data),
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))
}
