//! A single FM operator: phase accumulator, waveform selector, four-stage
//! envelope generator, and the output memory used for self-feedback.

use crate::tables::{EXP_TABLE, FREQ_MULT_TABLE, KEY_SCALE_LEVEL_TABLE, KEY_SCALE_SHIFT_TABLE, LOG_SIN_TABLE, RATE_TABLES};

/// Which stage of the envelope an operator is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Off,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Precomputed rate-scaling parameters for one envelope stage, derived from
/// the stage's rate register and the owning channel's key-scale number.
#[derive(Debug, Clone, Copy, Default)]
struct RateParams {
    shift: u16,
    mask: u16,
    add: u16,
    tab: [u16; 8],
}

impl RateParams {
    /// `effective = rate*4 + (ksn >> (key_scale_rate ? 0 : 2))`, split into a
    /// 4-bit-or-more high part and a 2-bit low part that selects one of the
    /// four clock-gating patterns.
    fn compute(rate: u16, ksn: u16, key_scale_rate: bool) -> Self {
        let scale_shift = if key_scale_rate { 0 } else { 2 };
        let combined = rate * 4 + (ksn >> scale_shift);
        let hi = combined >> 2;
        let lo = combined & 3;

        let shift = if hi < 12 { 12 - hi } else { 0 };
        let add = if hi < 12 { 1 } else { 1 << (hi - 12) };

        Self {
            shift,
            mask: (1u16 << shift) - 1,
            add,
            tab: RATE_TABLES[lo as usize],
        }
    }
}

/// A single FM oscillator with its own phase accumulator, waveform selector,
/// four-stage envelope, and feedback memory.
#[derive(Debug, Clone)]
pub struct Operator {
    phase: u32,
    waveform: u8,
    freq_mult_x2: u16,

    envelope_stage: EnvelopeStage,
    envelope_level: i16,
    output_level: u16,

    attack_rate: u16,
    decay_rate: u16,
    release_rate: u16,
    sustain_level: u16,

    attack: RateParams,
    decay: RateParams,
    release: RateParams,

    key_scale_shift: u16,
    key_scale_level: u16,

    out: [i16; 2],

    key_on: bool,
    key_scale_rate: bool,
    sustain_mode: bool,
    tremolo_enable: bool,
    vibrato_enable: bool,
}

impl Default for Operator {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator {
    pub fn new() -> Self {
        Self {
            phase: 0,
            waveform: 0,
            freq_mult_x2: FREQ_MULT_TABLE[0],

            envelope_stage: EnvelopeStage::Off,
            envelope_level: 0x1FF,
            output_level: 0,

            attack_rate: 0,
            decay_rate: 0,
            release_rate: 0,
            sustain_level: 0,

            attack: RateParams::default(),
            decay: RateParams::default(),
            release: RateParams::default(),

            key_scale_shift: 0,
            key_scale_level: 0,

            out: [0, 0],

            key_on: false,
            key_scale_rate: false,
            sustain_mode: false,
            tremolo_enable: false,
            vibrato_enable: false,
        }
    }

    /// Advance phase and envelope by one internal sample and produce the
    /// operator's output. `phase_step` and `vibrato` come from the owning
    /// channel; `modulation` is the upstream operator's output in this
    /// channel's algorithm (0 for an unmodulated carrier); `fbshift` is
    /// non-zero only for the first operator of a channel with feedback
    /// enabled; `clock` and `tremolo_level` are the chip's global LFO state.
    pub fn output(
        &mut self,
        phase_step: u32,
        vibrato: i16,
        mut modulation: i16,
        fbshift: u16,
        clock: u16,
        tremolo_level: u16,
    ) -> i16 {
        let mut step = phase_step;
        if self.vibrato_enable {
            step = step.wrapping_add(vibrato as u32);
        }
        self.phase = self.phase.wrapping_add((step.wrapping_mul(self.freq_mult_x2 as u32)) / 2);

        let tremolo = if self.tremolo_enable { tremolo_level } else { 0 };
        let level = (self.envelope_level as u16)
            .wrapping_add(self.output_level)
            .wrapping_add(self.key_scale_level)
            .wrapping_add(tremolo)
            << 3;

        match self.envelope_stage {
            EnvelopeStage::Attack => {
                // The multiply uses the *full* 16-bit one's complement of the
                // envelope level, not a 9-bit-masked one: repeated additions
                // climb past 0x1FF and eventually overflow `i16`, and it is
                // that overflow-to-negative wrap that the `<= 0` check below
                // catches. This reproduces a real quirk of the chip's attack
                // curve (a silent buildup before the envelope snaps open) and
                // must stay bit-exact, hence the explicit wrapping ops. The
                // product itself is truncated to 16 bits *before* the shift,
                // not after, so `wrapping_mul` must run at `u16` width.
                let mut add = (self.attack.add >> self.attack.tab[(clock >> self.attack.shift & 7) as usize])
                    .wrapping_mul(!(self.envelope_level as u16))
                    >> 3;
                if self.attack_rate == 0 {
                    add = 0;
                }
                if self.attack.mask != 0 && (clock & self.attack.mask) != 0 {
                    add = 0;
                }
                self.envelope_level = self.envelope_level.wrapping_add(add as i16);
                if self.envelope_level <= 0 {
                    self.envelope_level = 0;
                    self.envelope_stage = EnvelopeStage::Decay;
                }
            }

            EnvelopeStage::Decay => {
                let mut add = self.decay.add >> self.decay.tab[(clock >> self.decay.shift & 7) as usize];
                if self.decay_rate == 0 {
                    add = 0;
                }
                if self.decay.mask != 0 && (clock & self.decay.mask) != 0 {
                    add = 0;
                }
                self.envelope_level = self.envelope_level.wrapping_add(add as i16);
                if self.envelope_level >= self.sustain_level as i16 {
                    self.envelope_level = self.sustain_level as i16;
                    self.envelope_stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                if !self.sustain_mode {
                    self.envelope_stage = EnvelopeStage::Release;
                    self.advance_release(clock);
                }
            }

            EnvelopeStage::Release => {
                self.advance_release(clock);
            }

            EnvelopeStage::Off => {
                self.out = [0, 0];
                return 0;
            }
        }

        // Release may have just turned the operator off.
        if self.envelope_stage == EnvelopeStage::Off {
            self.out = [0, 0];
            return 0;
        }

        if fbshift != 0 {
            modulation += (self.out[0] + self.out[1]) >> fbshift;
        }

        let phase14 = ((self.phase >> 10) as u16).wrapping_add(modulation as u16);
        let mut offset = phase14 & 0xFF;
        let mut logsin: u16;
        let mut negate = false;

        match self.waveform {
            0 => {
                if phase14 & 0x100 != 0 {
                    offset ^= 0xFF;
                }
                logsin = LOG_SIN_TABLE[offset as usize];
                negate = phase14 & 0x200 != 0;
            }
            1 => {
                if phase14 & 0x200 != 0 {
                    offset = 0;
                } else if phase14 & 0x100 != 0 {
                    offset ^= 0xFF;
                }
                logsin = LOG_SIN_TABLE[offset as usize];
            }
            2 => {
                if phase14 & 0x100 != 0 {
                    offset ^= 0xFF;
                }
                logsin = LOG_SIN_TABLE[offset as usize];
            }
            3 => {
                if phase14 & 0x100 != 0 {
                    offset = 0;
                }
                logsin = LOG_SIN_TABLE[offset as usize];
            }
            4 => {
                if phase14 & 0x200 != 0 {
                    offset = 0;
                    logsin = LOG_SIN_TABLE[0];
                } else {
                    if phase14 & 0x80 != 0 {
                        offset ^= 0xFF;
                    }
                    offset = (offset + offset) & 0xFF;
                    negate = phase14 & 0x100 != 0;
                    logsin = LOG_SIN_TABLE[offset as usize];
                }
            }
            5 => {
                if phase14 & 0x200 != 0 {
                    offset = 0;
                    logsin = LOG_SIN_TABLE[0];
                } else {
                    offset = (offset + offset) & 0xFF;
                    if phase14 & 0x80 != 0 {
                        offset ^= 0xFF;
                    }
                    logsin = LOG_SIN_TABLE[offset as usize];
                }
            }
            6 => {
                logsin = 0;
                negate = phase14 & 0x200 != 0;
            }
            7 => {
                logsin = phase14 & 0x1FF;
                if phase14 & 0x200 != 0 {
                    logsin ^= 0x1FF;
                    negate = true;
                }
                logsin <<= 3;
            }
            _ => unreachable!("waveform is masked to 0..7"),
        }

        let mix = (logsin.wrapping_add(level)).min(0x1FFF);

        // The shift amount (`mix >> 8`) can reach 31, past `u16`'s width: Go's
        // shift semantics define that as yielding 0, which Rust's `>>` would
        // instead panic on, so the >=16 case is handled explicitly.
        let shift = mix >> 8;
        let attenuated = if shift >= 16 {
            0
        } else {
            (EXP_TABLE[(mix & 0xFF) as usize] + 1024) >> shift
        };
        let mut v = attenuated as i16;
        v += v;
        if negate {
            v = !v;
        }

        self.out[1] = self.out[0];
        self.out[0] = v;

        v
    }

    fn advance_release(&mut self, clock: u16) {
        let mut add = self.release.add >> self.release.tab[(clock >> self.release.shift & 7) as usize];
        if self.release_rate == 0 {
            add = 0;
        }
        if self.release.mask != 0 && (clock & self.release.mask) != 0 {
            add = 0;
        }
        self.envelope_level = self.envelope_level.wrapping_add(add as i16);
        if self.envelope_level >= 0x1FF {
            self.envelope_level = 0x1FF;
            self.envelope_stage = EnvelopeStage::Off;
        }
    }

    /// Trigger (or release) this operator. Redundant key-on/off writes are
    /// ignored. The highest attack rate (15) is instant and skips straight
    /// to the Decay stage with the envelope already at full volume.
    pub fn set_key_on(&mut self, on: bool) {
        if self.key_on == on {
            return;
        }
        self.key_on = on;

        if on {
            if self.attack_rate == 15 {
                self.envelope_stage = EnvelopeStage::Decay;
                self.envelope_level = 0;
            } else {
                self.envelope_stage = EnvelopeStage::Attack;
            }
            self.phase = 0;
        } else if self.envelope_stage != EnvelopeStage::Off && self.envelope_stage != EnvelopeStage::Release {
            self.envelope_stage = EnvelopeStage::Release;
        }
    }

    pub fn set_tremolo_enable(&mut self, on: bool) {
        self.tremolo_enable = on;
    }

    pub fn set_vibrato_enable(&mut self, on: bool) {
        self.vibrato_enable = on;
    }

    pub fn set_sustain_mode(&mut self, on: bool) {
        self.sustain_mode = on;
    }

    /// Key-scale rate (KSR): how strongly the channel's key-scale number
    /// influences this operator's envelope rates. Recomputes the cached
    /// rate parameters, so the caller must already have set the channel's
    /// key-scale number via [`Operator::compute_rates`].
    pub fn set_envelope_scaling(&mut self, on: bool, ksn: u16) {
        self.key_scale_rate = on;
        self.compute_rates(ksn);
    }

    pub fn set_frequency_multiplier(&mut self, index: u16) {
        self.freq_mult_x2 = FREQ_MULT_TABLE[(index & 15) as usize];
    }

    pub fn set_key_scale(&mut self, scale: u16, octave: u16, freq: u16) {
        self.key_scale_shift = KEY_SCALE_SHIFT_TABLE[(scale & 3) as usize];
        self.compute_key_scale_level(octave, freq);
    }

    pub fn set_output_level(&mut self, level: u16) {
        self.output_level = level * 4;
    }

    pub fn set_attack_rate(&mut self, rate: u16, ksn: u16) {
        self.attack_rate = rate & 15;
        self.compute_rates(ksn);
    }

    pub fn set_decay_rate(&mut self, rate: u16, ksn: u16) {
        self.decay_rate = rate & 15;
        self.compute_rates(ksn);
    }

    /// Register value 15 maps to attenuation 31*16 = 496, not 15*16 = 240 —
    /// this matches documented OPL3 hardware behavior.
    pub fn set_sustain_level(&mut self, level: u16) {
        self.sustain_level = if level < 15 { level } else { 31 } * 16;
    }

    pub fn set_release_rate(&mut self, rate: u16, ksn: u16) {
        self.release_rate = rate & 15;
        self.compute_rates(ksn);
    }

    pub fn set_waveform(&mut self, wave: u16) {
        self.waveform = (wave & 7) as u8;
    }

    /// Recompute the per-stage rate-scaling parameters from this operator's
    /// rate registers and the owning channel's key-scale number. Must be
    /// called whenever the key-scale number, any rate register, or KSR
    /// changes.
    pub fn compute_rates(&mut self, ksn: u16) {
        self.attack = RateParams::compute(self.attack_rate, ksn, self.key_scale_rate);
        if self.attack_rate == 15 {
            self.attack.add = 0xFFF;
        }
        self.decay = RateParams::compute(self.decay_rate, ksn, self.key_scale_rate);
        self.release = RateParams::compute(self.release_rate, ksn, self.key_scale_rate);
    }

    /// Recompute the key-scale level (output attenuation towards higher
    /// pitches) from the owning channel's octave and frequency.
    pub fn compute_key_scale_level(&mut self, octave: u16, freq: u16) {
        let index = (octave << 4) | (freq >> 6);
        self.key_scale_level = (KEY_SCALE_LEVEL_TABLE[index as usize] as u16) >> self.key_scale_shift;
    }

    #[cfg(test)]
    pub(crate) fn envelope_level(&self) -> i16 {
        self.envelope_level
    }

    #[cfg(test)]
    pub(crate) fn envelope_stage(&self) -> EnvelopeStage {
        self.envelope_stage
    }
}
