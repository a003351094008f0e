//! A single synthesis channel: routes one or two operators (or, when paired
//! with a neighboring channel, four) through one of the six FM/additive
//! algorithm topologies.
//!
//! A channel never owns its operators — it only remembers their indices into
//! the chip's operator array — because the four-operator pairing scheme
//! requires two distinct channels to alias the same two underlying
//! operators. The actual per-sample routing lives on [`crate::chip::Chip`],
//! since it is the only place that can mutably borrow both the channel and
//! operator arrays at once.

use crate::tables::CHANNEL_OPERATOR_BASE;

/// Channel indices that can act as the primary half of a four-operator pair.
pub const FOUR_OP_PRIMARIES: [usize; 6] = [0, 1, 2, 9, 10, 11];

/// One of the 18 channels a chip exposes.
#[derive(Debug, Clone)]
pub struct Channel {
    operators: [usize; 2],
    /// The second pair of operators used in four-operator mode. Only the six
    /// channels at indices 0, 1, 2, 9, 10, 11 carry one; every other channel
    /// is permanently two-operator-only, matching the chip's fixed wiring.
    extra_operators: Option<[usize; 2]>,

    freq: u16,
    octave: u16,
    phase_step: u32,
    key_scale_number: u16,
    feedback_shift: u16,
    modulation_type: u16,

    /// Index of the channel this one is paired with in four-operator mode.
    /// Only ever set on a primary (four-op-capable) channel; its secondary
    /// never points back.
    channel_pair: Option<usize>,

    enable: bool,
    left_enable: bool,
    right_enable: bool,
}

impl Channel {
    pub(crate) fn new(channel_index: usize) -> Self {
        let base = CHANNEL_OPERATOR_BASE[channel_index];
        let extra_operators = FOUR_OP_PRIMARIES
            .contains(&channel_index)
            .then(|| [base + 6, base + 9]);

        Self {
            operators: [base, base + 3],
            extra_operators,
            freq: 0,
            octave: 0,
            phase_step: 0,
            key_scale_number: 0,
            feedback_shift: 0,
            modulation_type: 0,
            channel_pair: None,
            enable: true,
            left_enable: false,
            right_enable: false,
        }
    }

    pub fn operators(&self) -> [usize; 2] {
        self.operators
    }

    pub fn extra_operators(&self) -> Option<[usize; 2]> {
        self.extra_operators
    }

    pub fn freq(&self) -> u16 {
        self.freq
    }

    pub fn octave(&self) -> u16 {
        self.octave
    }

    pub fn phase_step(&self) -> u32 {
        self.phase_step
    }

    pub fn key_scale_number(&self) -> u16 {
        self.key_scale_number
    }

    pub fn feedback_shift(&self) -> u16 {
        self.feedback_shift
    }

    pub fn modulation_type(&self) -> u16 {
        self.modulation_type
    }

    pub fn channel_pair(&self) -> Option<usize> {
        self.channel_pair
    }

    pub fn enable(&self) -> bool {
        self.enable
    }

    pub fn left_enable(&self) -> bool {
        self.left_enable
    }

    pub fn right_enable(&self) -> bool {
        self.right_enable
    }

    pub fn set_enable(&mut self, on: bool) {
        self.enable = on;
    }

    pub fn set_channel_pair(&mut self, pair: Option<usize>) {
        self.channel_pair = pair;
    }

    pub fn set_left_enable(&mut self, on: bool) {
        self.left_enable = on;
    }

    pub fn set_right_enable(&mut self, on: bool) {
        self.right_enable = on;
    }

    pub fn set_feedback(&mut self, val: u16) {
        self.feedback_shift = if val == 0 { 0 } else { 9 - val };
    }

    pub fn set_modulation_type(&mut self, typ: u16) {
        self.modulation_type = typ;
    }

    pub fn set_frequency_low(&mut self, freq: u16) {
        self.freq = (self.freq & 0x300) | (freq & 0xFF);
        self.compute_phase_step();
    }

    /// Sets the high two bits of the frequency. The key-scale number also
    /// depends on these bits, but recomputing it needs the chip's global
    /// note-select flag, so the caller must follow up with
    /// [`Channel::set_key_scale_number`].
    pub fn set_frequency_high(&mut self, freq: u16) {
        self.freq = (self.freq & 0xFF) | ((freq & 3) << 8);
        self.compute_phase_step();
    }

    pub fn set_octave(&mut self, octave: u16) {
        self.octave = octave & 7;
        self.compute_phase_step();
    }

    fn compute_phase_step(&mut self) {
        self.phase_step = (self.freq as u32) << self.octave;
    }

    /// Block/octave in bits 3-1, with bit 0 taken from the frequency's MSB
    /// (`note_sel` set) or second-MSB (`note_sel` clear).
    pub fn set_key_scale_number(&mut self, note_sel: bool) {
        let lsb = if note_sel { self.freq >> 9 } else { (self.freq >> 8) & 1 };
        self.key_scale_number = (self.octave << 1) | lsb;
    }
}
