//! Play a short chord progression through an echo
//!
//! Run with: cargo run --example piano_echo --features cpal_sink
//!
//! Lists available devices and lets you pick one, then plays
//! piano -> oscillator -> delay -> output.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use audionodes::nodes::{Delay, Oscillator, Output, Piano};
use audionodes::{AudioTree, CpalDevice, EngineConfig};

const CHORDS: [[u8; 3]; 4] = [[60, 64, 67], [57, 60, 64], [53, 57, 60], [55, 59, 62]];

fn midi_to_hz(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

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

    let Some(device) = devices.into_iter().nth(choice).or_else(CpalDevice::default_output) else {
        eprintln!("No usable device");
        return Ok(());
    };

    println!("\nUsing: {} @ {}Hz", device.name(), device.sample_rate());

    let config = EngineConfig::new(device.sample_rate());
    let mut tree = AudioTree::new(config)?.with_output(device.create_sink(config.block_len)?);

    // Build the graph
    let piano = Piano::new();
    let keys = piano.keyboard();
    let piano = tree.add(piano);
    let osc = tree.add(Oscillator::triangle());
    let echo = tree.add(Delay::new());
    let out = tree.add(Output::new());

    tree.connect(piano, "frequency", osc, "frequency")?;
    tree.connect(piano, "velocity", osc, "amplitude")?;
    tree.connect(osc, "audio", echo, "audio")?;
    tree.connect(echo, "audio", out, "audio")?;
    tree.set_input(echo, "delay", 0.3)?;

    // Play from another thread, the way a MIDI input would
    let player = thread::spawn(move || {
        for chord in CHORDS.iter().cycle().take(8) {
            for &note in chord {
                keys.key_down(note, midi_to_hz(note), 80);
            }
            thread::sleep(Duration::from_millis(600));
            for &note in chord {
                keys.key_up(note);
            }
            thread::sleep(Duration::from_millis(150));
        }
    });

    println!("Playing...");
    while !player.is_finished() {
        tree.tick()?;
    }

    // let the echo ring out
    let tail = (2.0 / config.block_duration()) as u64;
    tree.run(tail)
}
