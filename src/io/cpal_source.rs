//! CPAL audio capture source

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedBufferSize, SupportedStreamConfigRange,
};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};
use crate::io::AudioSource;

/// Chunks the device may deliver before the reader catches up.
const CHUNK_BACKLOG: usize = 64;

/// Records mono PCM from a CPAL input device.
///
/// The stream runs at the engine's sample rate, preferring a mono config and
/// a device buffer of one block. Only the first channel of each frame is kept.
/// The device callback hands chunks over a channel;
/// [`read_block`](AudioSource::read_block) reassembles them into blocks of
/// whatever size the caller asks for.
pub struct CpalSource {
    chunks: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSource {
    /// Open `device` at `sample_rate`, asking for `block_len`-frame buffers.
    ///
    /// Fails with [`Error::DeviceUnavailable`] if the device cannot record at
    /// that rate.
    pub fn new(device: &cpal::Device, sample_rate: u32, block_len: usize) -> Result<Self> {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        let (stream_config, sample_format) = capture_config(ranges, sample_rate, block_len)?;
        let channels = stream_config.channels;
        let buffer_size = stream_config.buffer_size.clone();

        let (chunk_tx, chunk_rx) = bounded(CHUNK_BACKLOG);
        let (started_tx, started_rx) = bounded::<Result<()>>(1);
        let shutdown = Arc::new(AtomicBool::new(false));

        let device = device.clone();
        let stop = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name("audionodes-input".into())
            .spawn(move || {
                let stream = match build_stream(&device, sample_format, &stream_config, chunk_tx) {
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
                tracing::debug!("input stream stopped");
            })
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        started_rx
            .recv()
            .map_err(|_| Error::DeviceUnavailable("input thread exited".into()))??;

        tracing::info!(
            channels,
            sample_rate,
            ?buffer_size,
            ?sample_format,
            "input stream started"
        );

        Ok(Self {
            chunks: chunk_rx,
            pending: Vec::new(),
            shutdown,
            thread: Some(thread),
        })
    }
}

impl AudioSource for CpalSource {
    fn read_block(&mut self, buf: &mut [i16]) -> Result<()> {
        while self.pending.len() < buf.len() {
            let chunk = self
                .chunks
                .recv()
                .map_err(|_| Error::DeviceUnavailable("input stream stopped".into()))?;
            self.pending.extend_from_slice(&chunk);
        }
        buf.copy_from_slice(&self.pending[..buf.len()]);
        self.pending.drain(..buf.len());
        Ok(())
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

/// Preference among the formats the capture stream can convert.
fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

/// Pick the stream config for recording at `sample_rate`.
///
/// Fewest channels wins, then the closest sample format to `i16`. The device
/// buffer is fixed to `block_len` frames when the device allows it.
fn capture_config(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    sample_rate: u32,
    block_len: usize,
) -> Result<(StreamConfig, SampleFormat)> {
    let rate = SampleRate(sample_rate);
    let range = ranges
        .into_iter()
        .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
        .filter_map(|r| format_rank(r.sample_format()).map(|rank| (r, rank)))
        .min_by_key(|(r, rank)| (r.channels(), *rank))
        .map(|(r, _)| r)
        .ok_or_else(|| {
            Error::DeviceUnavailable(format!("no input config at {} Hz", sample_rate))
        })?;

    let frames = u32::try_from(block_len).unwrap_or(u32::MAX);
    let buffer_size = match *range.buffer_size() {
        SupportedBufferSize::Range { min, max } if (min..=max).contains(&frames) => {
            BufferSize::Fixed(frames)
        }
        _ => BufferSize::Default,
    };
    let sample_format = range.sample_format();
    let mut config = range.with_sample_rate(rate).config();
    config.buffer_size = buffer_size;
    Ok((config, sample_format))
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    chunks: Sender<Vec<i16>>,
) -> Result<cpal::Stream> {
    match sample_format {
        SampleFormat::F32 => run::<f32>(device, stream_config, chunks),
        SampleFormat::I16 => run::<i16>(device, stream_config, chunks),
        SampleFormat::U16 => run::<u16>(device, stream_config, chunks),
        other => Err(Error::DeviceUnavailable(format!(
            "unsupported sample format: {:?}",
            other
        ))),
    }
}

fn run<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    chunks: Sender<Vec<i16>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = (stream_config.channels as usize).max(1);
    device
        .build_input_stream(
            stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let chunk: Vec<i16> = data
                    .chunks(channels)
                    .filter_map(|frame| frame.first())
                    .map(|s| i16::from_sample(*s))
                    .collect();
                // a full backlog means nobody is reading; drop the chunk
                let _ = chunks.try_send(chunk);
            },
            |err| tracing::error!(%err, "input stream error"),
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))
}
