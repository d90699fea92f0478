//! Audio effect nodes (processors with audio inputs and outputs)

mod delay;

pub use delay::Delay;
