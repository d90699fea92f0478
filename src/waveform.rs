//! Stock generator functions for the [`Oscillator`](crate::nodes::Oscillator).
//!
//! Each maps a phase in cycles (`[0, 1)` for one period) to a sample in
//! `[-1, 1]`. Any `Fn(f64) -> f32` works in their place.

use std::f64::consts::TAU;

pub fn sine(phase: f64) -> f32 {
    (phase * TAU).sin() as f32
}

pub fn square(phase: f64) -> f32 {
    if phase.rem_euclid(1.0) < 0.5 {
        1.0
    } else {
        -1.0
    }
}

pub fn sawtooth(phase: f64) -> f32 {
    (2.0 * phase.rem_euclid(1.0) - 1.0) as f32
}

pub fn triangle(phase: f64) -> f32 {
    let p = phase.rem_euclid(1.0);
    (1.0 - 4.0 * (p - 0.5).abs()) as f32
}
