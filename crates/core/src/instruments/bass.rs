//! Bass guitar: sine fundamental, gritty triangle and sub octave with a
//! short finger transient.

use crate::config::EngineConfig;
use crate::dsp::{Automation, Biquad, FilterKind, Oscillator, ShaperCurve, Waveform};
use crate::voice::{NoiseBurst, Partial, Voice, VoiceId};

use super::{
    noise_seed, one_shot, Articulation, ChainVoicing, EngineCore, Instrument, Melodic, Pitch,
    ToneChain, ToneState,
};

const STOP_PAD: f64 = 0.05;

/// Starting bass tone before any section applies its own.
pub fn default_bass_tone() -> ToneState {
    ToneState {
        curve: ShaperCurve::Tanh,
        drive: 2.5,
        second_drive: 0.0,
        low_db: 6.0,
        mid_db: -4.0,
        high_db: 0.0,
        presence_db: 0.0,
        cabinet_hz: 3_000.0,
        highpass_hz: 30.0,
        delay_time: 0.3,
        delay_feedback: 0.0,
        delay_mix: 0.0,
        reverb_mix: 0.0,
        level: 0.22,
    }
}

#[derive(Debug)]
pub struct BassGuitar {
    core: EngineCore,
    chain: ToneChain,
}

impl BassGuitar {
    pub fn new(config: &EngineConfig, sample_rate: f32) -> Self {
        Self {
            core: EngineCore::new(config, sample_rate, 1.0, true),
            chain: ToneChain::new(ChainVoicing::BASS, default_bass_tone(), sample_rate),
        }
    }

    pub fn tone(&self) -> &ToneState {
        self.chain.tone()
    }
}

impl Instrument for BassGuitar {
    fn name(&self) -> &'static str {
        "bass"
    }

    fn set_tone(&mut self, tone: &ToneState, _now: f64) {
        self.chain.set_tone(tone);
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
        let chain = &mut self.chain;
        self.core
            .render_with(start_time, dt, out, |x, _| chain.process(x));
    }

    fn active_voices(&self) -> usize {
        self.core.bank.active_voices()
    }
}

impl Melodic for BassGuitar {
    fn trigger(
        &mut self,
        pitch: &Pitch,
        start: f64,
        duration: f64,
        articulation: &Articulation,
    ) -> Option<VoiceId> {
        let frequency = *pitch.frequencies().first()?;
        if frequency <= 0.0 || duration <= 0.0 {
            return None;
        }
        let rate = self.core.sample_rate;

        let mut envelope = Automation::new(0.0);
        envelope
            .set_value_at(0.0001, start)
            .linear_ramp_to(0.18, start + 0.01)
            .set_value_at(0.15, start + (duration - 0.08).max(0.02))
            .linear_ramp_to(0.0, start + duration.max(0.03));

        let voice = Voice::new(start, start + duration + STOP_PAD, rate, envelope)
            .partial(Partial::new(Oscillator::new(Waveform::Sine), frequency, 0.3))
            .partial(Partial::new(Oscillator::new(Waveform::Triangle), frequency, 0.15).detune(3.0))
            .partial(Partial::new(Oscillator::new(Waveform::Sine), frequency, 0.2).ratio(0.5))
            .burst(
                NoiseBurst::new(noise_seed(start, 2), one_shot(0.06, start, 0.015))
                    .filter(Biquad::new(FilterKind::BandPass, frequency * 2.0, 3.0, rate)),
            )
            .scaled(articulation.velocity);

        Some(self.core.attach(voice))
    }
}
