//! The five instrument engines and the contract they share.
//!
//! Every engine owns a [`VoiceBank`] (ephemeral per-note voices on a
//! swappable input bus), a shared effect chain that all of its voices flow
//! through, and a master fader. Tone changes mutate the chain in place, so
//! they reach notes that are already sounding.

pub mod bass;
pub mod chain;
pub mod drums;
pub mod lead;
pub mod organ;
pub mod pad;

pub use bass::BassGuitar;
pub use chain::{ChainVoicing, ToneChain};
pub use drums::{DrumKit, RoomState};
pub use lead::LeadGuitar;
pub use organ::Organ;
pub use pad::PadSynth;

use crate::config::EngineConfig;
use crate::dsp::{Automation, ShaperCurve};
use crate::score::{DrawbarPreset, LeslieSpeed};
use crate::voice::{Voice, VoiceBank, VoiceId};

/// What a melodic trigger should sound.
#[derive(Debug, Clone, PartialEq)]
pub enum Pitch {
    Single(f32),
    Chord(Vec<f32>),
}

impl Pitch {
    pub fn frequencies(&self) -> &[f32] {
        match self {
            Pitch::Single(frequency) => std::slice::from_ref(frequency),
            Pitch::Chord(frequencies) => frequencies,
        }
    }
}

/// Per-note performance flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Articulation {
    pub palm_mute: bool,
    /// Previous pitch to glide from, when the note is slid into.
    pub slide_from: Option<f32>,
    pub velocity: f32,
    /// Organ registration; ignored by the other engines.
    pub registration: Option<(DrawbarPreset, LeslieSpeed)>,
}

impl Default for Articulation {
    fn default() -> Self {
        Self {
            palm_mute: false,
            slide_from: None,
            velocity: 1.0,
            registration: None,
        }
    }
}

/// Parameter bundle of a [`ToneChain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneState {
    pub curve: ShaperCurve,
    pub drive: f32,
    /// Second, gentler saturation stage; `0.0` bypasses it.
    pub second_drive: f32,
    pub low_db: f32,
    pub mid_db: f32,
    pub high_db: f32,
    pub presence_db: f32,
    pub cabinet_hz: f32,
    pub highpass_hz: f32,
    pub delay_time: f32,
    pub delay_feedback: f32,
    pub delay_mix: f32,
    pub reverb_mix: f32,
    pub level: f32,
}

impl ToneState {
    /// Field-wise linear blend; the shaper curve switches at the midpoint.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            curve: ShaperCurve::blend(self.curve, other.curve, t),
            drive: mix(self.drive, other.drive),
            second_drive: mix(self.second_drive, other.second_drive),
            low_db: mix(self.low_db, other.low_db),
            mid_db: mix(self.mid_db, other.mid_db),
            high_db: mix(self.high_db, other.high_db),
            presence_db: mix(self.presence_db, other.presence_db),
            cabinet_hz: mix(self.cabinet_hz, other.cabinet_hz),
            highpass_hz: mix(self.highpass_hz, other.highpass_hz),
            delay_time: mix(self.delay_time, other.delay_time),
            delay_feedback: mix(self.delay_feedback, other.delay_feedback),
            delay_mix: mix(self.delay_mix, other.delay_mix),
            reverb_mix: mix(self.reverb_mix, other.reverb_mix),
            level: mix(self.level, other.level),
        }
    }
}

impl Default for ToneState {
    fn default() -> Self {
        Self {
            curve: ShaperCurve::Tube,
            drive: 6.0,
            second_drive: 3.0,
            low_db: 3.0,
            mid_db: -2.0,
            high_db: -6.0,
            presence_db: 2.0,
            cabinet_hz: 4_500.0,
            highpass_hz: 70.0,
            delay_time: 0.42,
            delay_feedback: 0.2,
            delay_mix: 0.08,
            reverb_mix: 0.12,
            level: 0.16,
        }
    }
}

/// Contract shared by all five engines.
pub trait Instrument {
    fn name(&self) -> &'static str;

    /// Replaces the shared chain parameters immediately.
    fn set_tone(&mut self, tone: &ToneState, now: f64);

    /// Click-free silence: the current input bus is ramped out and a fresh
    /// one takes its place.
    fn mute_all(&mut self, now: f64);

    fn fade_in(&mut self, seconds: f64, now: f64);

    fn fade_out(&mut self, seconds: f64, now: f64);

    /// Adds one block of output into `out`, sample `i` at `start_time + i * dt`.
    fn render(&mut self, start_time: f64, dt: f64, out: &mut [f32]);

    fn active_voices(&self) -> usize;
}

/// Engines that play pitched notes.
pub trait Melodic: Instrument {
    /// Builds one voice for `pitch`. Returns `None` when nothing would sound.
    fn trigger(
        &mut self,
        pitch: &Pitch,
        start: f64,
        duration: f64,
        articulation: &Articulation,
    ) -> Option<VoiceId>;
}

/// Voice bank, master fader and scratch buffer common to every engine.
#[derive(Debug)]
pub(crate) struct EngineCore {
    pub(crate) bank: VoiceBank,
    pub(crate) sample_rate: f32,
    fader: Automation,
    full_level: f32,
    scratch: Vec<f32>,
}

impl EngineCore {
    /// `full_level` is where `fade_in` lands; the fader starts there when
    /// `open` is set and at silence otherwise.
    pub(crate) fn new(config: &EngineConfig, sample_rate: f32, full_level: f32, open: bool) -> Self {
        Self {
            bank: VoiceBank::new(config),
            sample_rate,
            fader: Automation::new(if open { full_level } else { 0.0 }),
            full_level,
            scratch: Vec::new(),
        }
    }

    pub(crate) fn attach(&mut self, voice: Voice) -> VoiceId {
        self.bank.attach(voice)
    }

    pub(crate) fn fade_to(&mut self, target: f32, seconds: f64, now: f64) {
        let held = self.fader.cancel_and_hold(now);
        self.fader
            .set_value_at(held, now)
            .linear_ramp_to(target, now + seconds.max(0.0));
    }

    pub(crate) fn fade_in(&mut self, seconds: f64, now: f64) {
        self.fade_to(self.full_level, seconds, now);
    }

    pub(crate) fn fade_out(&mut self, seconds: f64, now: f64) {
        self.fade_to(0.0, seconds, now);
    }

    pub(crate) fn fader_at(&self, time: f64) -> f32 {
        self.fader.value_at(time)
    }

    /// Renders the raw voice sum for a block and hands it to `process`
    /// with each sample time, then applies the fader.
    pub(crate) fn render_with(
        &mut self,
        start_time: f64,
        dt: f64,
        out: &mut [f32],
        mut process: impl FnMut(f32, f64) -> f32,
    ) {
        self.scratch.clear();
        self.scratch.resize(out.len(), 0.0);
        self.bank.render(start_time, dt, &mut self.scratch);
        for (i, (sample, dry)) in out.iter_mut().zip(&self.scratch).enumerate() {
            let time = start_time + i as f64 * dt;
            *sample += process(*dry, time) * self.fader.value_at(time);
        }
        self.bank.sweep(start_time + out.len() as f64 * dt);
    }
}

/// ADSR-style envelope expressed as breakpoints from `start`.
pub(crate) fn note_envelope(
    start: f64,
    duration: f64,
    attack: f64,
    peak: f32,
    decay: f64,
    sustain: f32,
    release: f64,
) -> Automation {
    let mut env = Automation::new(0.0);
    let decay_end = attack + decay;
    env.set_value_at(0.0001, start)
        .linear_ramp_to(peak, start + attack)
        .exponential_ramp_to(sustain.max(0.001), start + decay_end)
        .set_value_at(sustain * 0.85, start + decay_end.max(duration - release))
        .linear_ramp_to(0.0, start + duration.max(decay_end + 0.001));
    env
}

/// Exponential one-shot decay from `gain` at `start` to near silence at
/// `start + length`.
pub(crate) fn one_shot(gain: f32, start: f64, length: f64) -> Automation {
    let mut env = Automation::new(0.0);
    env.set_value_at(gain, start)
        .exponential_ramp_to(gain * 0.001, start + length)
        .set_value_at(0.0, start + length + 0.001);
    env
}

/// Seed for a voice's noise source, derived from its start time so offline
/// renders are reproducible.
pub(crate) fn noise_seed(start: f64, salt: u32) -> u32 {
    ((start * 48_000.0) as u64 as u32) ^ salt.wrapping_mul(0x9E37_79B9)
}
