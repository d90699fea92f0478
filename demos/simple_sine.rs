//! Simple example: play a sine wave with configurable output device
//!
//! Run with: cargo run --example simple_sine --features cpal_sink
//!
//! Lists available devices and lets you pick one, then plays a sine that
//! sweeps around 440Hz.

use std::io::{self, Write};

use audionodes::nodes::{Oscillator, Output};
use audionodes::{AudioTree, CpalDevice, EngineConfig};

fn main() -> audionodes::Result<()> {
    tracing_subscriber::fmt::init();

    // List available output devices
    let devices = CpalDevice::list_outputs();

    if devices.is_empty() {
        eprintln!("No audio output devices found!");
        return Ok(());
    }

    println!("Available audio output devices:");
    for (i, device) in devices.iter().enumerate() {
        println!(
            "  [{}] {} ({}Hz, {} ch)",
            i,
            device.name(),
            device.sample_rate(),
            device.channels()
        );
    }

    // Let user pick a device (or default to 0)
    print!("\nSelect device [0]: ");
    io::stdout().flush().ok();

    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();
    let choice: usize = input.trim().parse().unwrap_or(0);

    let Some(device) = devices.into_iter().nth(choice).or_else(|| {
        println!("Invalid choice, using default device");
        CpalDevice::default_output()
    }) else {
        eprintln!("No usable device");
        return Ok(());
    };

    println!("\nUsing: {} @ {}Hz", device.name(), device.sample_rate());

    // Small blocks keep the sweep smooth
    let config = EngineConfig::new(device.sample_rate()).with_block_len(256);
    let mut tree = AudioTree::new(config)?.with_output(device.create_sink(config.block_len)?);

    let sine = tree.add(Oscillator::sine());
    let out = tree.add(Output::new());
    tree.set_input(sine, "amplitude", 0.25)?;
    tree.connect(sine, "audio", out, "audio")?;

    println!("Playing 440Hz sine wave...");
    println!("Press Ctrl+C to stop\n");

    loop {
        // Modulate frequency slowly; each change glides over one block
        let t = tree.time() as f32;
        let freq = 440.0 + 220.0 * (t * 0.5 * std::f32::consts::PI).sin();
        tree.set_input(sine, "frequency", freq)?;
        tree.tick()?;
    }
}
