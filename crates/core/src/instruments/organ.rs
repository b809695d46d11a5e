//! Tonewheel organ: additive drawbar voices with key click, played through
//! a rotating-speaker simulation whose rotor speeds up and slows down with
//! inertia.

use std::f32::consts::TAU;

use crate::config::EngineConfig;
use crate::dsp::{
    db_to_gain, Automation, Biquad, DelayLine, FilterKind, Oscillator, Reverb, ShaperCurve,
    Waveform,
};
use crate::score::{DrawbarPreset, LeslieSpeed};
use crate::voice::{NoiseBurst, Partial, Voice, VoiceId};

use super::{noise_seed, one_shot, Articulation, EngineCore, Instrument, Melodic, Pitch, ToneState};

/// Harmonic ratio of each drawbar footage: 16', 5⅓', 8', 4', 2⅔', 2',
/// 1⅗', 1⅓', 1'.
const DRAWBAR_RATIOS: [f32; 9] = [0.5, 1.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0];
pub const ORGAN_LEVEL: f32 = 0.22;
const ATTACK: f64 = 0.005;
const RELEASE: f64 = 0.06;
const CLICK_GAIN: f32 = 0.04;
/// Seconds the rotor needs to reach a new speed.
const ROTOR_INERTIA: f64 = 1.0;
const VIBRATO_BASE: f32 = 0.002;
const VIBRATO_DEPTH: f32 = 0.0008;
const TREMOLO_DEPTH: f32 = 0.3;

/// Linear gain of one drawbar set to `level` (0..=8): 3 dB per step,
/// fully in at 8, silent at 0.
pub fn drawbar_gain(level: u8) -> f32 {
    if level == 0 {
        0.0
    } else {
        db_to_gain(-(8.0 - f32::from(level.min(8))) * 3.0)
    }
}

/// Rotating speaker: amplitude and Doppler modulation from one rotor phase.
#[derive(Debug, Clone)]
struct Leslie {
    rate: Automation,
    phase: f32,
    line: DelayLine,
    sample_rate: f32,
}

impl Leslie {
    fn new(sample_rate: f32) -> Self {
        let max = ((VIBRATO_BASE + VIBRATO_DEPTH) * sample_rate) as usize + 4;
        Self {
            rate: Automation::new(LeslieSpeed::default().rate_hz()),
            phase: 0.0,
            line: DelayLine::new(max),
            sample_rate,
        }
    }

    fn set_speed(&mut self, speed: LeslieSpeed, now: f64) {
        let held = self.rate.cancel_and_hold(now);
        self.rate
            .set_value_at(held, now)
            .linear_ramp_to(speed.rate_hz(), now + ROTOR_INERTIA);
    }

    fn rate_at(&self, time: f64) -> f32 {
        self.rate.value_at(time)
    }

    #[inline]
    fn process(&mut self, x: f32, time: f64) -> f32 {
        let rotor = (TAU * self.phase).sin();
        self.phase = (self.phase + self.rate.value_at(time) / self.sample_rate).fract();

        self.line.write(x);
        let doppler = self
            .line
            .read((VIBRATO_BASE + VIBRATO_DEPTH * rotor) * self.sample_rate);
        doppler * (1.0 - TREMOLO_DEPTH * 0.5 * (1.0 + rotor))
    }
}

/// Organ tone: only `drive`, `reverb_mix` and `level` are read.
pub fn default_organ_tone() -> ToneState {
    ToneState {
        drive: 1.5,
        reverb_mix: 0.2,
        level: 1.0,
        ..ToneState::default()
    }
}

#[derive(Debug)]
pub struct Organ {
    core: EngineCore,
    leslie: Leslie,
    preamp: Biquad,
    reverb: Reverb,
    drive: f32,
    level: f32,
    drawbars: DrawbarPreset,
}

impl Organ {
    /// Starts with its fader closed; sections that carry an organ chord fade
    /// it in.
    pub fn new(config: &EngineConfig, sample_rate: f32) -> Self {
        let mut organ = Self {
            core: EngineCore::new(config, sample_rate, ORGAN_LEVEL, false),
            leslie: Leslie::new(sample_rate),
            preamp: Biquad::new(FilterKind::LowPass, 6_000.0, 0.707, sample_rate),
            reverb: Reverb::new(0.6, 0.4, sample_rate),
            drive: 0.0,
            level: 0.0,
            drawbars: DrawbarPreset::default(),
        };
        organ.set_tone(&default_organ_tone(), 0.0);
        organ
    }

    pub fn drawbars(&self) -> DrawbarPreset {
        self.drawbars
    }

    /// Rotor speed in Hz at `time`, including any ramp in progress.
    pub fn rotor_rate_at(&self, time: f64) -> f32 {
        self.leslie.rate_at(time)
    }

    pub fn level_at(&self, time: f64) -> f32 {
        self.core.fader_at(time)
    }

    fn chord_voice(&self, chord: &[f32], start: f64, duration: f64) -> Voice {
        let levels = self.drawbars.levels();
        let per_note = 1.0 / chord.len().max(1) as f32;
        let release_at = start + (duration - RELEASE).max(ATTACK);

        let mut envelope = Automation::new(0.0);
        envelope
            .set_value_at(0.0001, start)
            .linear_ramp_to(1.0, start + ATTACK)
            .set_value_at(1.0, release_at)
            .linear_ramp_to(0.0, release_at + RELEASE);

        let mut voice = Voice::new(
            start,
            release_at + RELEASE + 0.01,
            self.core.sample_rate,
            envelope,
        );
        for &frequency in chord {
            for (ratio, level) in DRAWBAR_RATIOS.iter().zip(levels) {
                let gain = drawbar_gain(level);
                if gain > 0.0 {
                    voice = voice.partial(
                        Partial::new(Oscillator::new(Waveform::Sine), frequency, gain * per_note * 0.1)
                            .ratio(*ratio),
                    );
                }
            }
        }

        voice.burst(
            NoiseBurst::new(noise_seed(start, 5), one_shot(CLICK_GAIN, start, 0.005)).filter(
                Biquad::new(FilterKind::HighPass, 2_000.0, 0.707, self.core.sample_rate),
            ),
        )
    }
}

impl Instrument for Organ {
    fn name(&self) -> &'static str {
        "organ"
    }

    /// Only drive, reverb send and level apply to the organ.
    fn set_tone(&mut self, tone: &ToneState, _now: f64) {
        self.drive = tone.drive;
        self.reverb.mix = tone.reverb_mix;
        self.level = tone.level;
    }

    fn mute_all(&mut self, now: f64) {
        self.core.bank.mute_all(now);
    }

    fn fade_in(&mut self, seconds: f64, now: f64) {
        self.core.fade_in(seconds, now);
    }

    fn fade_out(&mut self, seconds: f64, now: f64) {
        self.core.fade_out(seconds, now);
    }

    fn render(&mut self, start_time: f64, dt: f64, out: &mut [f32]) {
        let Self {
            core,
            leslie,
            preamp,
            reverb,
            drive,
            level,
            ..
        } = self;
        core.render_with(start_time, dt, out, |x, time| {
            let driven = ShaperCurve::Tube.apply(preamp.process(x), *drive);
            let rotated = leslie.process(driven, time);
            (rotated + reverb.process(rotated)) * *level
        });
    }

    fn active_voices(&self) -> usize {
        self.core.bank.active_voices()
    }
}

impl Melodic for Organ {
    /// Chords only. The articulation's registration, when present, switches
    /// drawbars for this and later chords and starts the rotor ramp.
    fn trigger(
        &mut self,
        pitch: &Pitch,
        start: f64,
        duration: f64,
        articulation: &Articulation,
    ) -> Option<VoiceId> {
        let chord = match pitch {
            Pitch::Chord(chord) if !chord.is_empty() => chord,
            _ => return None,
        };
        if duration <= 0.0 {
            return None;
        }
        if let Some((drawbars, speed)) = articulation.registration {
            self.drawbars = drawbars;
            self.leslie.set_speed(speed, start);
        }
        let voice = self
            .chord_voice(chord, start, duration)
            .scaled(articulation.velocity);
        Some(self.core.attach(voice))
    }
}
