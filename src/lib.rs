//! The opl3 crate provides a cycle-approximate emulation of the
//! [Yamaha YMF262](https://en.wikipedia.org/wiki/Yamaha_YMF262) (OPL3) FM
//! synthesis chip, as used for music and sound effects in a large number of
//! PC sound cards and game consoles from the late 1980s through the 1990s.
//!
//! This particular implementation is built around a plain register-write
//! API, mirroring how the real chip is addressed by software: you write
//! 9-bit register values and read back stereo 16-bit PCM samples. There is
//! no file format parser, no host audio device integration and no MIDI
//! layer; those concerns belong to the application embedding this crate.
//!
//! The numerics are checked against the Opal OPL3 emulator and reproduce
//! several of its documented quirks (such as the attack envelope's silent
//! buildup before it snaps open) rather than a simplified idealization of
//! the hardware.
//!
//! To get started, initialize a new [`Chip`], program some registers, and
//! start rendering in a loop:
//!
//! ```
//! # use opl3::Chip;
//! let mut chip = Chip::new(44100);
//!
//! // Program channel 0 as a simple 2-op FM voice.
//! chip.write_reg(0x20, 0x01);
//! chip.write_reg(0x40, 0x10);
//! chip.write_reg(0x60, 0xF0);
//! chip.write_reg(0x80, 0x77);
//! chip.write_reg(0x23, 0x01);
//! chip.write_reg(0x43, 0x00);
//! chip.write_reg(0x63, 0xF0);
//! chip.write_reg(0x83, 0x77);
//! chip.write_reg(0xC0, 0x30); // enable both stereo channels
//! chip.write_reg(0xA0, 0x44);
//! chip.write_reg(0xB0, 0x2A); // key on
//!
//! for _ in 0..44100 {
//!     let (left, right) = chip.sample();
//!
//!     // Do something useful with the samples here, such as writing to a file or playing on an
//!     // audio device.
//! }
//! ```
//!
//! Note that a channel's left/right stereo enable bits (register
//! `0xC0..0xC8`) default to off, so a freshly keyed-on voice stays silent
//! until they are set.
//!
//! For more detailed information on how to use the crate, please have a
//! look at the [`Chip`] struct, which is the workhorse of the crate.

mod channel;
mod chip;
mod operator;
mod tables;

pub use chip::{Chip, INTERNAL_SAMPLE_RATE};
