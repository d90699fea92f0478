//! Built-in audio nodes.
//!
//! Nodes are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Generate signals with no audio inputs:
//! - [`Oscillator`] - Phase-continuous oscillator, one voice per input voice
//! - [`Piano`] - Turns key presses into per-voice control signals
//! - [`Microphone`] - Plays back blocks captured from an [`AudioSource`](crate::io::AudioSource)
//!
//! ## Effects ([`effect`])
//!
//! Process audio (inputs → outputs):
//! - [`Delay`] - Feedback echo
//!
//! ## Sinks ([`sink`])
//!
//! Consume audio with no outputs:
//! - [`Output`] - Hands its input to the tree's [`AudioSink`](crate::io::AudioSink)

pub mod source;
pub mod effect;
pub mod sink;

// Re-export common types at the top level for convenience
pub use source::{
    CaptureQueue, CaptureStream, Key, KeyPhase, Keyboard, Microphone, Oscillator, Piano,
};
pub use effect::Delay;
pub use sink::Output;
