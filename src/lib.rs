//! A real-time modular synthesis engine.
//!
//! Sources, effects and sinks are wired into a node graph that is evaluated
//! one fixed-size block at a time. Signals stay continuous across blocks:
//! oscillators keep their phase per voice, unlinked inputs glide between
//! values, and delay lines and key state persist from tick to tick.
//!
//! Start with [`AudioTree`]; the built-in nodes live in [`nodes`].

pub mod block;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod io;
pub mod node;
pub mod nodes;
pub mod scheduler;
pub mod store;
pub mod topology;
pub mod waveform;

#[cfg(any(feature = "cpal_sink", feature = "cpal_source"))]
pub mod device;

pub use block::{SampleBlock, VoiceId};
pub use config::{CaptureConfig, EngineConfig};
pub use engine::AudioTree;
pub use error::{Error, Result};
pub use graph::{Graph, Link};
pub use io::{AudioSink, AudioSource};
pub use node::{AudioNode, Inputs, NodeId, ProcessContext, SocketSpec};
pub use scheduler::{Scheduler, TickOutput};
pub use store::StateStore;
pub use topology::EvaluationOrder;

#[cfg(any(feature = "cpal_sink", feature = "cpal_source"))]
pub use device::CpalDevice;
