//! Engine and capture configuration.

use crate::error::{Error, Result};

/// Sample rate and block size of an [`AudioTree`](crate::AudioTree).
///
/// Defaults to 44.1 kHz with 1024-sample blocks (~23 ms per tick).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub block_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_len: 1024,
        }
    }
}

impl EngineConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_len(mut self, block_len: usize) -> Self {
        self.block_len = block_len;
        self
    }

    /// Duration of one block in seconds.
    pub fn block_duration(&self) -> f64 {
        self.block_len as f64 / self.sample_rate as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample rate must be non-zero".into()));
        }
        if self.block_len == 0 {
            return Err(Error::InvalidConfig("block length must be non-zero".into()));
        }
        Ok(())
    }
}

/// Buffering of a [`Microphone`](crate::nodes::Microphone) capture pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Samples per captured block
    pub block_len: usize,
    /// Low watermark in blocks; the high watermark is twice this
    pub buffer_len: usize,
}

impl CaptureConfig {
    pub fn new(block_len: usize) -> Self {
        Self {
            block_len,
            buffer_len: 4,
        }
    }

    pub fn with_buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len.max(1);
        self
    }

    #[inline]
    pub fn high_watermark(&self) -> usize {
        self.buffer_len * 2
    }

    /// Hard bound on queued blocks, above which the producer drops the oldest.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer_len * 4
    }
}

impl From<&EngineConfig> for CaptureConfig {
    fn from(config: &EngineConfig) -> Self {
        Self::new(config.block_len)
    }
}
