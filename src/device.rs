//! CPAL device discovery.
//!
//! This module provides [`CpalDevice`] for discovering and selecting audio
//! output and input devices.
//!
//! # Example: List and Select a Device
//!
//! ```no_run
//! # #[cfg(feature = "cpal_sink")]
//! # fn main() -> audionodes::Result<()> {
//! use audionodes::{AudioTree, CpalDevice, EngineConfig};
//!
//! // List all available output devices
//! let devices = CpalDevice::list_outputs();
//! for (i, device) in devices.iter().enumerate() {
//!     println!("[{}] {} ({} Hz, {} ch)",
//!         i, device.name(), device.sample_rate(), device.channels());
//! }
//!
//! // Use a specific device
//! let device = &devices[0];
//! let config = EngineConfig::new(device.sample_rate());
//! let tree = AudioTree::new(config)?.with_output(device.create_sink(config.block_len)?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cpal_sink"))]
//! # fn main() {}
//! ```

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::Result;

/// A discovered audio device.
///
/// Use [`CpalDevice::default_output`] / [`CpalDevice::default_input`] to get
/// the system defaults, or the `list_*` functions to enumerate all devices.
pub struct CpalDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,

    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    fn describe(device: cpal::Device, config: cpal::SupportedStreamConfig) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        }
    }

    /// Get the system's default output device.
    ///
    /// Returns `None` if no audio device is available.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;
        let device = Self::describe(device, config);
        tracing::info!(
            name = device.name(),
            sample_rate = device.sample_rate,
            "default output device"
        );
        Some(device)
    }

    /// List all available audio output devices.
    ///
    /// Returns an empty list if no devices are found or if enumeration fails.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| {
                devices
                    .filter_map(|device| {
                        let config = device.default_output_config().ok()?;
                        Some(Self::describe(device, config))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the system's default input device.
    pub fn default_input() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device()?;
        let config = device.default_input_config().ok()?;
        let device = Self::describe(device, config);
        tracing::info!(
            name = device.name(),
            sample_rate = device.sample_rate,
            "default input device"
        );
        Some(device)
    }

    /// List all available audio input devices.
    pub fn list_inputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.input_devices()
            .map(|devices| {
                devices
                    .filter_map(|device| {
                        let config = device.default_input_config().ok()?;
                        Some(Self::describe(device, config))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device's sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Open an [`AudioSink`](crate::io::AudioSink) playing on this device.
    ///
    /// Hand it to [`AudioTree::with_output`](crate::AudioTree::with_output).
    #[cfg(feature = "cpal_sink")]
    pub fn create_sink(&self, block_len: usize) -> Result<crate::io::CpalSink> {
        crate::io::CpalSink::new(&self.device, &self.config, block_len)
    }

    /// Open an [`AudioSource`](crate::io::AudioSource) recording from this
    /// device, for use with a [`Microphone`](crate::nodes::Microphone).
    ///
    /// The stream runs at the engine's `sample_rate` with `block_len`-frame
    /// device buffers where supported; pass the tree's
    /// [`EngineConfig`](crate::EngineConfig) values so capture keeps pace
    /// with ticks.
    #[cfg(feature = "cpal_source")]
    pub fn create_source(
        &self,
        sample_rate: u32,
        block_len: usize,
    ) -> Result<crate::io::CpalSource> {
        crate::io::CpalSource::new(&self.device, sample_rate, block_len)
    }
}
