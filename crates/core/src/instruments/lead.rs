//! Lead guitar: a detuned saw stack with power-chord fifth, sub octave and
//! pick transient, driven through the amp chain.

use crate::config::EngineConfig;
use crate::dsp::{Automation, Biquad, FilterKind, Oscillator, Waveform};
use crate::voice::{NoiseBurst, Partial, Voice, VoiceId};

use super::{
    note_envelope, noise_seed, one_shot, Articulation, ChainVoicing, EngineCore, Instrument,
    Melodic, Pitch, ToneChain, ToneState,
};

const DETUNE_CENTS: [f32; 4] = [-6.0, 6.0, -14.0, 14.0];
const DETUNE_GAINS: [f32; 4] = [0.14, 0.14, 0.06, 0.06];
const SLIDE_TIME: f64 = 0.06;
const PALM_MUTE_CUTOFF: f32 = 350.0;
const STOP_PAD: f64 = 0.05;

#[derive(Debug)]
pub struct LeadGuitar {
    core: EngineCore,
    chain: ToneChain,
}

impl LeadGuitar {
    pub fn new(config: &EngineConfig, sample_rate: f32) -> Self {
        Self {
            core: EngineCore::new(config, sample_rate, 1.0, true),
            chain: ToneChain::new(ChainVoicing::GUITAR, ToneState::default(), sample_rate),
        }
    }

    pub fn tone(&self) -> &ToneState {
        self.chain.tone()
    }

    fn build_voice(
        &self,
        frequency: f32,
        start: f64,
        duration: f64,
        articulation: &Articulation,
    ) -> Voice {
        let rate = self.core.sample_rate;
        let palm = articulation.palm_mute;
        let (attack, decay, sustain, release) = if palm {
            (0.008, 0.04, 0.09, 0.03)
        } else {
            (0.015, 0.08, 0.13, 0.12)
        };

        let envelope = note_envelope(start, duration, attack, sustain * 1.3, decay, sustain, release);
        let mut voice = Voice::new(start, start + duration + STOP_PAD, rate, envelope);

        let pitch_line = || {
            let mut line = Automation::new(frequency);
            if let Some(from) = articulation.slide_from.filter(|f| *f > 0.0) {
                line.set_value_at(from, start)
                    .linear_ramp_to(frequency, start + SLIDE_TIME);
            }
            line
        };

        for (cents, gain) in DETUNE_CENTS.iter().zip(DETUNE_GAINS) {
            voice = voice.partial(
                Partial::new(Oscillator::new(Waveform::Saw), frequency, gain)
                    .frequency(pitch_line())
                    .detune(*cents),
            );
        }
        voice = voice
            .partial(
                Partial::new(Oscillator::new(Waveform::Saw), frequency, 0.09)
                    .frequency(pitch_line())
                    .ratio(1.5)
                    .detune(4.0),
            )
            .partial(
                Partial::new(Oscillator::new(Waveform::Sine), frequency, 0.18)
                    .frequency(pitch_line())
                    .ratio(0.5),
            )
            .partial(
                Partial::new(Oscillator::new(Waveform::Sine), frequency, 0.04)
                    .frequency(pitch_line())
                    .ratio(2.0),
            );

        let pick_gain = if palm { 0.15 } else { 0.08 };
        voice = voice.burst(
            NoiseBurst::new(noise_seed(start, 1), one_shot(pick_gain, start, 0.02)).filter(
                Biquad::new(FilterKind::BandPass, frequency * 3.0, 2.0, rate),
            ),
        );

        if palm {
            voice = voice.filter(
                FilterKind::LowPass,
                1.0,
                Automation::new(PALM_MUTE_CUTOFF),
            );
        }

        voice.scaled(articulation.velocity)
    }
}

impl Instrument for LeadGuitar {
    fn name(&self) -> &'static str {
        "lead"
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

impl Melodic for LeadGuitar {
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
        let voice = self.build_voice(frequency, start, duration, articulation);
        Some(self.core.attach(voice))
    }
}
