//! Signal source nodes (generators with no audio inputs)

mod capture;
mod microphone;
mod oscillator;
mod piano;

pub use capture::{CaptureQueue, CaptureStream};
pub use microphone::Microphone;
pub use oscillator::Oscillator;
pub use piano::{Key, KeyPhase, Keyboard, Piano};
