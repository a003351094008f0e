//! This example programs a single 2-op FM voice, keys it on for one second at
//! a sampling rate of 44100 Hz, and writes the rendered audio to a file
//! called `tone.raw` using a two channel little-endian 16-bit sample format.

use opl3::Chip;
use std::fs::File;
use std::io::{BufWriter, Write};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut chip = Chip::new(44100);

    // Operator 0 (modulator): frequency multiplier 1, fast attack/decay.
    chip.write_reg(0x20, 0x01);
    chip.write_reg(0x40, 0x10);
    chip.write_reg(0x60, 0xF0);
    chip.write_reg(0x80, 0x77);

    // Operator 3 (carrier): frequency multiplier 1, fast attack/decay.
    chip.write_reg(0x23, 0x01);
    chip.write_reg(0x43, 0x00);
    chip.write_reg(0x63, 0xF0);
    chip.write_reg(0x83, 0x77);

    // Channel 0: enable both stereo channels, phase modulation algorithm.
    chip.write_reg(0xC0, 0x30);

    // F-Number for roughly 440 Hz at block 4: freq = 440 * 2^(20-block) / sample_rate.
    chip.write_reg(0xA0, 0x44);
    chip.write_reg(0xB0, 0x2A); // key on, octave (block) 2, frequency high bits

    let mut file = BufWriter::new(File::create("tone.raw")?);

    for _ in 0..44100 {
        let (left, right) = chip.sample();
        file.write_all(&left.to_le_bytes())?;
        file.write_all(&right.to_le_bytes())?;
    }

    Ok(())
}
