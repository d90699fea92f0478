//! Sink nodes (evaluation is pulled from these)

mod output;

pub use output::Output;
