//! The top-level chip: owns every channel and operator, decodes register
//! writes, runs the global LFOs, and resamples the internal 49716 Hz signal
//! to the host sample rate.

use crate::channel::Channel;
use crate::operator::Operator;
use crate::tables::{CHANNEL_OPERATOR_BASE, OPERATOR_OWNER_CHANNEL, OPERATOR_REGISTER_LOOKUP};

/// The chip's fixed internal sample rate.
pub const INTERNAL_SAMPLE_RATE: i32 = 49716;

/// A full emulated chip: 18 channels, 36 operators, and the register
/// protocol that drives them.
///
/// To get a proper audio signal, instantiate the struct with a host sample
/// rate of your choice and start writing registers:
///
/// ```
/// # use opl3::Chip;
/// let mut chip = Chip::new(44100);
///
/// // Program channel 0 as a simple 2-op FM voice and key it on.
/// chip.write_reg(0x20, 0x01); // operator 0: frequency multiplier 1
/// chip.write_reg(0x40, 0x10); // operator 0: output level
/// chip.write_reg(0x60, 0xF0); // operator 0: attack/decay rate
/// chip.write_reg(0x80, 0x77); // operator 0: sustain level/release rate
/// chip.write_reg(0x23, 0x01); // operator 3 (carrier): frequency multiplier 1
/// chip.write_reg(0x43, 0x00); // operator 3: output level
/// chip.write_reg(0x63, 0xF0); // operator 3: attack/decay rate
/// chip.write_reg(0x83, 0x77); // operator 3: sustain level/release rate
/// chip.write_reg(0xC0, 0x30); // channel 0: stereo enable, FM modulation
/// chip.write_reg(0xA0, 0x44); // channel 0: frequency low byte
/// chip.write_reg(0xB0, 0x2A); // channel 0: key-on, octave, frequency high bits
///
/// for _ in 0..44100 {
///     let (_left, _right) = chip.sample();
/// }
/// ```
///
/// Stereo output is muted by default: a channel's left/right enable bits
/// (register `0xC0..0xC8`, bits 4 and 5) must be set before it is audible.
pub struct Chip {
    operators: [Operator; 36],
    channels: [Channel; 18],

    sample_rate: i32,
    sample_accum: i32,
    last_output: [i16; 2],
    curr_output: [i16; 2],

    clock: u16,
    tremolo_clock: u16,
    tremolo_level: u16,
    vibrato_tick: u16,
    vibrato_clock: u16,

    note_sel: bool,
    tremolo_depth: bool,
    vibrato_depth: bool,
}

impl Chip {
    /// Construct a new chip targeting the given host sample rate. A rate of
    /// `0` silently falls back to the chip's own internal rate
    /// ([`INTERNAL_SAMPLE_RATE`]).
    pub fn new(host_sample_rate: u32) -> Self {
        let sample_rate = if host_sample_rate == 0 {
            INTERNAL_SAMPLE_RATE
        } else {
            host_sample_rate as i32
        };

        let mut chip = Self {
            operators: std::array::from_fn(|_| Operator::new()),
            channels: std::array::from_fn(Channel::new),

            sample_rate,
            sample_accum: 0,
            last_output: [0, 0],
            curr_output: [0, 0],

            clock: 0,
            tremolo_clock: 0,
            tremolo_level: 0,
            vibrato_tick: 0,
            vibrato_clock: 0,

            note_sel: false,
            tremolo_depth: false,
            vibrato_depth: false,
        };

        for op in chip.operators.iter_mut() {
            op.compute_rates(0);
        }

        chip
    }

    /// Write a value to a 9-bit OPL3 register. Registers `0x100` and above
    /// address the second bank of channels/operators. Unknown register
    /// numbers are silently ignored, matching the hardware's behavior.
    pub fn write_reg(&mut self, reg: u16, val: u8) {
        if reg == 0xBD {
            self.tremolo_depth = val & 0x80 != 0;
            self.vibrato_depth = val & 0x40 != 0;
            return;
        }

        let typ = reg & 0xE0;
        match typ {
            0x00 => self.write_global_reg(reg, val),
            0xA0..=0xC0 => self.write_channel_reg(reg, val),
            0x20 | 0x40 | 0x60 | 0x80 | 0xE0 => self.write_operator_reg(reg, val),
            _ => {}
        }
    }

    fn write_operator_reg(&mut self, reg: u16, val: u8) {
        let slot = OPERATOR_REGISTER_LOOKUP[(reg & 0x1F) as usize];
        if slot < 0 {
            return;
        }
        let mut op_num = slot as usize;
        if reg & 0x100 != 0 {
            op_num += 18;
        }

        let owner = OPERATOR_OWNER_CHANNEL[op_num];
        let ksn = self.channels[owner].key_scale_number();
        let (octave, freq) = (self.channels[owner].octave(), self.channels[owner].freq());
        let op = &mut self.operators[op_num];

        match reg & 0xE0 {
            0x20 => {
                op.set_tremolo_enable(val & 0x80 != 0);
                op.set_vibrato_enable(val & 0x40 != 0);
                op.set_sustain_mode(val & 0x20 != 0);
                op.set_envelope_scaling(val & 0x10 != 0, ksn);
                op.set_frequency_multiplier((val & 15) as u16);
            }
            0x40 => {
                op.set_key_scale((val >> 6) as u16, octave, freq);
                op.set_output_level((val & 0x3F) as u16);
            }
            0x60 => {
                op.set_attack_rate((val >> 4) as u16, ksn);
                op.set_decay_rate((val & 15) as u16, ksn);
            }
            0x80 => {
                op.set_sustain_level((val >> 4) as u16);
                op.set_release_rate((val & 15) as u16, ksn);
            }
            0xE0 => {
                op.set_waveform((val & 7) as u16);
            }
            _ => {}
        }
    }

    fn write_channel_reg(&mut self, reg: u16, val: u8) {
        let mut chan_num = (reg & 15) as usize;
        if chan_num >= 9 {
            return;
        }
        if reg & 0x100 != 0 {
            chan_num += 9;
        }

        let targets = [Some(chan_num), self.channels[chan_num].channel_pair()];

        match reg & 0xF0 {
            0xA0 => {
                for t in targets.into_iter().flatten() {
                    self.channels[t].set_frequency_low(val as u16);
                }
            }
            0xB0 => {
                for t in targets.into_iter().flatten() {
                    let on = val & 0x20 != 0;
                    for op_idx in self.channels[t].operators() {
                        self.operators[op_idx].set_key_on(on);
                    }
                    self.channels[t].set_octave((val >> 2 & 7) as u16);
                    self.channels[t].set_frequency_high((val & 3) as u16);
                    self.recompute_key_scale_number(t);
                }
            }
            0xC0 => {
                self.channels[chan_num].set_right_enable(val & 0x20 != 0);
                self.channels[chan_num].set_left_enable(val & 0x10 != 0);
                self.channels[chan_num].set_feedback((val >> 1 & 7) as u16);
                self.channels[chan_num].set_modulation_type((val & 1) as u16);
            }
            _ => {}
        }
    }

    fn write_global_reg(&mut self, reg: u16, val: u8) {
        match reg {
            0x104 => self.write_four_op_enables(val),
            0x08 => {
                self.note_sel = val & 0x40 != 0;
                for i in 0..18 {
                    self.recompute_key_scale_number(i);
                }
            }
            _ => {}
        }
    }

    /// Enables or disables four-operator mode for each of the six primary
    /// channel pairs. Bit `i` of `val` controls primary channel `i < 3 ? i :
    /// i + 6` paired with secondary channel `primary + 3`.
    fn write_four_op_enables(&mut self, val: u8) {
        for i in 0..6u16 {
            let primary = if i < 3 { i as usize } else { i as usize + 6 };
            let secondary = primary + 3;
            if val & (1 << i) != 0 {
                self.channels[primary].set_channel_pair(Some(secondary));
                self.channels[secondary].set_enable(false);
            } else {
                self.channels[primary].set_channel_pair(None);
                self.channels[secondary].set_enable(true);
            }
        }
    }

    /// Recomputes a channel's key-scale number from its frequency/octave and
    /// the global note-select flag, then cascades the rate and key-scale
    /// level recompute to every operator that channel owns.
    fn recompute_key_scale_number(&mut self, channel: usize) {
        self.channels[channel].set_key_scale_number(self.note_sel);
        let ksn = self.channels[channel].key_scale_number();
        let (octave, freq) = (self.channels[channel].octave(), self.channels[channel].freq());

        let base = CHANNEL_OPERATOR_BASE[channel];
        for &op_idx in &[base, base + 3] {
            self.operators[op_idx].compute_rates(ksn);
            self.operators[op_idx].compute_key_scale_level(octave, freq);
        }
    }

    /// Generate the next host-rate sample pair via integer-accumulator
    /// linear interpolation between internal-rate samples.
    pub fn sample(&mut self) -> (i16, i16) {
        while self.sample_accum >= self.sample_rate {
            self.last_output = self.curr_output;
            let (l, r) = self.output();
            self.curr_output = [l, r];
            self.sample_accum -= self.sample_rate;
        }

        let blend = self.sample_rate - self.sample_accum;
        let left = ((self.last_output[0] as i32 * blend + self.curr_output[0] as i32 * self.sample_accum)
            / self.sample_rate) as i16;
        let right = ((self.last_output[1] as i32 * blend + self.curr_output[1] as i32 * self.sample_accum)
            / self.sample_rate) as i16;

        self.sample_accum += INTERNAL_SAMPLE_RATE;

        (left, right)
    }

    /// Render `out.len()` mono samples (left/right averaged) at the host
    /// sample rate.
    pub fn generate_block_mono(&mut self, out: &mut [i32]) {
        for slot in out.iter_mut() {
            let (left, right) = self.sample();
            *slot = (left as i32 + right as i32) / 2;
        }
    }

    /// Advance every channel by one internal sample and sum their output,
    /// then advance the chip's global LFO state. Runs at
    /// [`INTERNAL_SAMPLE_RATE`].
    fn output(&mut self) -> (i16, i16) {
        let mut lmix = 0i32;
        let mut rmix = 0i32;

        for i in 0..18 {
            let (l, r) = self.channel_output(i);
            lmix += l as i32;
            rmix += r as i32;
        }

        let left = lmix.clamp(-0x8000, 0x7FFF) as i16;
        let right = rmix.clamp(-0x8000, 0x7FFF) as i16;

        self.clock = self.clock.wrapping_add(1);

        // The tremolo is a 13,440-sample triangle wave, peak 26 and trough 0.
        self.tremolo_clock = (self.tremolo_clock + 1) % 13440;
        self.tremolo_level = self.tremolo_clock;
        if self.tremolo_clock >= 13440 / 2 {
            self.tremolo_level = 13440 - self.tremolo_clock;
        }
        self.tremolo_level /= 256;
        if !self.tremolo_depth {
            self.tremolo_level >>= 2;
        }

        // Vibrato is an 8-sample triangle wave, ticking once every 1024 samples.
        self.vibrato_tick += 1;
        if self.vibrato_tick >= 1024 {
            self.vibrato_tick = 0;
            self.vibrato_clock = (self.vibrato_clock + 1) & 7;
        }

        (left, right)
    }

    /// Produce one channel's output: vibrato shaping followed by dispatch
    /// into one of the six 2-op/4-op algorithm topologies.
    fn channel_output(&mut self, index: usize) -> (i16, i16) {
        if !self.channels[index].enable() {
            return (0, 0);
        }

        let mut vibrato = ((self.channels[index].freq() >> 7) & 7) as i16;
        if !self.vibrato_depth {
            vibrato >>= 1;
        }

        let clk = self.vibrato_clock;
        if clk & 3 == 0 {
            vibrato = 0;
        } else {
            if clk & 1 != 0 {
                vibrato >>= 1;
            }
            if clk & 4 != 0 {
                vibrato = -vibrato;
            }
        }
        vibrato <<= self.channels[index].octave();

        let phase_step = self.channels[index].phase_step();
        let fbshift = self.channels[index].feedback_shift();
        let clock = self.clock;
        let tremolo = self.tremolo_level;
        let [op0, op1] = self.channels[index].operators();

        let out = if let Some(pair) = self.channels[index].channel_pair() {
            let [op2, op3] = self.channels[index]
                .extra_operators()
                .expect("channel_pair is only set on four-op-capable primary channels");
            let modulation_type = self.channels[index].modulation_type();
            let pair_modulation_type = self.channels[pair].modulation_type();

            if pair_modulation_type == 0 {
                if modulation_type == 0 {
                    // feedback -> modulator -> modulator -> modulator -> carrier
                    let mut out = self.operators[op0].output(phase_step, vibrato, 0, fbshift, clock, tremolo);
                    out = self.operators[op1].output(phase_step, vibrato, out, 0, clock, tremolo);
                    out = self.operators[op2].output(phase_step, vibrato, out, 0, clock, tremolo);
                    self.operators[op3].output(phase_step, vibrato, out, 0, clock, tremolo)
                } else {
                    // (feedback -> carrier) + (modulator -> modulator -> carrier)
                    let out = self.operators[op0].output(phase_step, vibrato, 0, fbshift, clock, tremolo);
                    let mut acc = self.operators[op1].output(phase_step, vibrato, 0, 0, clock, tremolo);
                    acc = self.operators[op2].output(phase_step, vibrato, acc, 0, clock, tremolo);
                    out.wrapping_add(self.operators[op3].output(phase_step, vibrato, acc, 0, clock, tremolo))
                }
            } else if modulation_type == 0 {
                // (feedback -> modulator -> carrier) + (modulator -> carrier)
                let mut out = self.operators[op0].output(phase_step, vibrato, 0, fbshift, clock, tremolo);
                out = self.operators[op1].output(phase_step, vibrato, out, 0, clock, tremolo);
                let acc = self.operators[op2].output(phase_step, vibrato, 0, 0, clock, tremolo);
                out.wrapping_add(self.operators[op3].output(phase_step, vibrato, acc, 0, clock, tremolo))
            } else {
                // (feedback -> carrier) + (modulator -> carrier) + carrier
                let mut out = self.operators[op0].output(phase_step, vibrato, 0, fbshift, clock, tremolo);
                let acc = self.operators[op1].output(phase_step, vibrato, 0, 0, clock, tremolo);
                out = out.wrapping_add(self.operators[op2].output(phase_step, vibrato, acc, 0, clock, tremolo));
                out.wrapping_add(self.operators[op3].output(phase_step, vibrato, 0, 0, clock, tremolo))
            }
        } else {
            let modulation_type = self.channels[index].modulation_type();
            if modulation_type == 0 {
                // Phase modulation
                let out = self.operators[op0].output(phase_step, vibrato, 0, fbshift, clock, tremolo);
                self.operators[op1].output(phase_step, vibrato, out, 0, clock, tremolo)
            } else {
                // Additive
                let out = self.operators[op0].output(phase_step, vibrato, 0, fbshift, clock, tremolo);
                out.wrapping_add(self.operators[op1].output(phase_step, vibrato, 0, 0, clock, tremolo))
            }
        };

        let left = if self.channels[index].left_enable() { out } else { 0 };
        let right = if self.channels[index].right_enable() { out } else { 0 };
        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::EnvelopeStage;

    fn program_basic_voice(chip: &mut Chip) {
        chip.write_reg(0x20, 0x01);
        chip.write_reg(0x40, 0x10);
        chip.write_reg(0x60, 0xF0);
        chip.write_reg(0x80, 0x77);
        chip.write_reg(0x23, 0x01);
        chip.write_reg(0x43, 0x00);
        chip.write_reg(0x63, 0xF0);
        chip.write_reg(0x83, 0x77);
        chip.write_reg(0xC0, 0x30);
        chip.write_reg(0xA0, 0x44);
        chip.write_reg(0xB0, 0x2A);
    }

    /// The exact register sequence from scenario S2: a 2-op FM sine voice.
    fn program_s2_voice(chip: &mut Chip) {
        chip.write_reg(0x20, 0x01);
        chip.write_reg(0x40, 0x10);
        chip.write_reg(0x60, 0xF0);
        chip.write_reg(0x80, 0xF0);
        chip.write_reg(0xE0, 0x00);
        chip.write_reg(0x23, 0x01);
        chip.write_reg(0x43, 0x00);
        chip.write_reg(0x63, 0xF0);
        chip.write_reg(0x83, 0xF0);
        chip.write_reg(0xE3, 0x00);
        chip.write_reg(0xC0, 0x31);
        chip.write_reg(0xA0, 0x44);
        chip.write_reg(0xB0, 0x32);
    }

    #[test]
    fn silent_until_stereo_enabled() {
        let mut chip = Chip::new(44100);
        chip.write_reg(0x20, 0x01);
        chip.write_reg(0x40, 0x00);
        chip.write_reg(0x60, 0xFF);
        chip.write_reg(0x80, 0x0F);
        chip.write_reg(0x23, 0x01);
        chip.write_reg(0x43, 0x00);
        chip.write_reg(0x63, 0xFF);
        chip.write_reg(0x83, 0x0F);
        chip.write_reg(0xA0, 0x44);
        chip.write_reg(0xB0, 0x2A);

        for _ in 0..100 {
            let (l, r) = chip.sample();
            assert_eq!((l, r), (0, 0));
        }
    }

    #[test]
    fn keyed_voice_produces_nonzero_output() {
        let mut chip = Chip::new(44100);
        program_basic_voice(&mut chip);

        let mut saw_nonzero = false;
        for _ in 0..2000 {
            let (l, _r) = chip.sample();
            if l != 0 {
                saw_nonzero = true;
                break;
            }
        }
        assert!(saw_nonzero, "keyed channel never produced nonzero output");
    }

    #[test]
    fn unregistered_channel_number_is_ignored() {
        let mut chip = Chip::new(44100);
        // Channel numbers 9..15 within a bank are invalid and must be ignored.
        chip.write_reg(0xA9, 0xFF);
        chip.write_reg(0xB9, 0xFF);
        // No panic, no effect: channel array bounds were never touched.
    }

    #[test]
    fn four_op_enable_disables_secondary_channel() {
        let mut chip = Chip::new(44100);
        chip.write_reg(0x104, 0x01); // enable pair 0/3
        assert_eq!(chip.channels[0].channel_pair(), Some(3));
        assert!(!chip.channels[3].enable());

        chip.write_reg(0x104, 0x00); // disable again
        assert_eq!(chip.channels[0].channel_pair(), None);
        assert!(chip.channels[3].enable());
    }

    #[test]
    fn zero_host_rate_falls_back_to_internal_rate() {
        let chip = Chip::new(0);
        assert_eq!(chip.sample_rate, INTERNAL_SAMPLE_RATE);
    }

    #[test]
    fn generate_block_mono_matches_sample_average() {
        let mut chip = Chip::new(44100);
        program_basic_voice(&mut chip);

        let mut reference = Chip::new(44100);
        program_basic_voice(&mut reference);

        let mut block = [0i32; 16];
        chip.generate_block_mono(&mut block);

        for expected in block {
            let (l, r) = reference.sample();
            assert_eq!(expected, (l as i32 + r as i32) / 2);
        }
    }

    #[test]
    fn s1_silence_by_default() {
        let mut chip = Chip::new(INTERNAL_SAMPLE_RATE as u32);
        for _ in 0..1000 {
            assert_eq!(chip.sample(), (0, 0));
        }
    }

    #[test]
    fn s2_simple_sine_tone() {
        let mut chip = Chip::new(INTERNAL_SAMPLE_RATE as u32);
        program_s2_voice(&mut chip);

        let mut saw_nonzero_within_10 = false;
        let mut saw_positive = false;
        let mut saw_negative = false;
        let mut sum_squares = 0f64;

        for i in 0..4096 {
            let (l, _r) = chip.sample();
            if i < 10 && l != 0 {
                saw_nonzero_within_10 = true;
            }
            match l.cmp(&0) {
                std::cmp::Ordering::Greater => saw_positive = true,
                std::cmp::Ordering::Less => saw_negative = true,
                std::cmp::Ordering::Equal => {}
            }
            sum_squares += (l as f64) * (l as f64);
        }

        let rms = (sum_squares / 4096.0).sqrt();

        assert!(saw_nonzero_within_10, "expected nonzero output within 10 samples");
        assert!(saw_positive && saw_negative, "expected the waveform to cross zero");
        assert!(rms > 1000.0, "RMS {rms} was not above 1000");
    }

    #[test]
    fn s3_key_off_decays_to_silence() {
        let mut chip = Chip::new(INTERNAL_SAMPLE_RATE as u32);
        program_s2_voice(&mut chip);
        chip.write_reg(0xB0, 0x12); // clear key-on, keep octave/freq bits

        let mut decayed = false;
        for _ in 0..(chip.sample_rate as usize * 2) {
            let (l, r) = chip.sample();
            if (l as i32).abs() + (r as i32).abs() < 10 {
                decayed = true;
                break;
            }
        }
        assert!(decayed, "channel did not decay to near-silence after key-off");
    }

    #[test]
    fn s4_four_op_pairing() {
        let mut chip = Chip::new(INTERNAL_SAMPLE_RATE as u32);
        chip.write_reg(0x104, 0x01);
        assert_eq!(chip.channels[0].channel_pair(), Some(3));
        assert!(!chip.channels[3].enable());

        chip.write_reg(0xC3, 0x30);
        assert!(chip.channels[3].left_enable());
        assert!(chip.channels[3].right_enable());

        for _ in 0..1000 {
            let (l, r) = chip.channel_output(3);
            assert_eq!((l, r), (0, 0), "disabled secondary channel must contribute nothing");
        }

        chip.write_reg(0x104, 0x00);
        assert!(chip.channels[3].enable());
    }

    #[test]
    fn s5_tremolo_triangle_wave() {
        let mut chip = Chip::new(INTERNAL_SAMPLE_RATE as u32);
        chip.write_reg(0xBD, 0x80); // tremolo depth set, so no extra >>2 shift

        let mut max_level = 0u16;
        let mut level_at_6720 = None;
        for i in 1..=13440u32 {
            chip.output();
            if i == 6720 {
                level_at_6720 = Some(chip.tremolo_level);
            }
            max_level = max_level.max(chip.tremolo_level);
        }

        assert_eq!(max_level, 26);
        assert_eq!(level_at_6720, Some(26));
        assert_eq!(chip.tremolo_level, 0, "triangle wave must return to 0 after a full period");
    }

    #[test]
    fn s6_resampling_accumulator_does_not_drift() {
        let mut chip = Chip::new(22050);
        program_s2_voice(&mut chip);

        for _ in 0..100_000 {
            chip.sample();
            assert!(
                chip.sample_accum >= 0 && chip.sample_accum < chip.sample_rate + INTERNAL_SAMPLE_RATE,
                "resampler accumulator drifted out of its expected range"
            );
        }
    }

    #[test]
    fn resampler_at_internal_rate_tracks_internal_steps() {
        // At host_rate == the chip's own internal rate, `sample()` pipelines
        // two calls behind the raw internal step due to the `last`/`curr`
        // bookkeeping (see opal.go's `Sample`), so the first two samples are
        // zero and sample `k` (k >= 3) equals the (k-2)-th internal step.
        let mut chip = Chip::new(INTERNAL_SAMPLE_RATE as u32);
        program_s2_voice(&mut chip);

        let mut shadow = Chip::new(INTERNAL_SAMPLE_RATE as u32);
        program_s2_voice(&mut shadow);

        assert_eq!(chip.sample(), (0, 0));
        assert_eq!(chip.sample(), (0, 0));

        for _ in 0..500 {
            assert_eq!(chip.sample(), shadow.output());
        }
    }

    #[test]
    fn invariant7_four_op_disable_clears_all_pairs() {
        let mut chip = Chip::new(44100);
        chip.write_reg(0x104, 0x3F); // enable all six pairs
        chip.write_reg(0x104, 0x00); // then clear them all

        for i in 0..18 {
            assert_eq!(chip.channels[i].channel_pair(), None);
            assert!(chip.channels[i].enable());
        }
    }

    #[test]
    fn invariant2_release_reaches_off_within_budget() {
        let mut chip = Chip::new(44100);
        chip.write_reg(0x20, 0x01);
        chip.write_reg(0x40, 0x00);
        chip.write_reg(0x60, 0xFF);
        chip.write_reg(0x80, 0x04); // sustain 0, release rate 4 (slow, nonzero)
        chip.write_reg(0x23, 0x01);
        chip.write_reg(0x43, 0x00);
        chip.write_reg(0x63, 0xFF);
        chip.write_reg(0x83, 0x04);
        chip.write_reg(0xC0, 0x30);
        chip.write_reg(0xA0, 0x44);
        chip.write_reg(0xB0, 0x2A); // key on

        for _ in 0..1000 {
            chip.sample();
        }
        chip.write_reg(0xB0, 0x0A); // key off

        for _ in 0..(1 << 20) {
            chip.sample();
        }

        for op in &chip.operators {
            assert_eq!(op.envelope_stage(), EnvelopeStage::Off);
            assert_eq!(op.envelope_level(), 0x1FF);
        }
    }

    #[test]
    fn invariant6_key_on_register_fans_out_octave_freq_and_key_on() {
        // val = 0b00101010: key-on set, octave (block) = 2, freq high bits = 2
        let mut chip = Chip::new(44100);
        chip.write_reg(0xB0, 0b0010_1010);

        assert!(chip.operators[chip.channels[0].operators()[0]].envelope_stage() != EnvelopeStage::Off);
        assert_eq!(chip.channels[0].octave(), 2);
        assert_eq!(chip.channels[0].freq() >> 8, 2);
    }
}
