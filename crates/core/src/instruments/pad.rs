//! Space synth: chords become a tape-wobbled mellotron pad, single pitches
//! become a resonant square-wave arp pluck. Both run through a phaser,
//! chorus and a long filtered echo.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::dsp::{Automation, Chorus, FeedbackDelay, FilterKind, Oscillator, Phaser, ShaperCurve, Waveform};
use crate::voice::{Partial, Voice, VoiceId, Wobble};

use super::{Articulation, EngineCore, Instrument, Melodic, Pitch, ToneState};

/// Fader level reached by `fade_in`.
pub const PAD_LEVEL: f32 = 0.32;
const PAD_ATTACK: f64 = 1.2;
const PAD_RELEASE: f64 = 1.5;

/// Echo settings of the space chain; only the delay and level fields are
/// read.
pub fn default_pad_tone() -> ToneState {
    ToneState {
        curve: ShaperCurve::Tanh,
        drive: 0.0,
        second_drive: 0.0,
        low_db: 0.0,
        mid_db: 0.0,
        high_db: 0.0,
        presence_db: 0.0,
        cabinet_hz: 3_500.0,
        highpass_hz: 20.0,
        delay_time: 0.666,
        delay_feedback: 0.4,
        delay_mix: 0.2,
        reverb_mix: 0.0,
        level: 1.0,
    }
}

#[derive(Debug)]
struct SpaceChain {
    phaser: Phaser,
    chorus: Chorus,
    echo: FeedbackDelay,
    level: f32,
}

impl SpaceChain {
    fn new(sample_rate: f32) -> Self {
        let mut chain = Self {
            phaser: Phaser::new(4, 1_000.0, 800.0, 0.3, sample_rate),
            chorus: Chorus::new(0.015, 0.004, 0.7, sample_rate),
            echo: FeedbackDelay::new(2.0, 3_500.0, sample_rate),
            level: 1.0,
        };
        chain.set_tone(&default_pad_tone());
        chain
    }

    fn set_tone(&mut self, tone: &ToneState) {
        self.echo
            .set(tone.delay_time, tone.delay_feedback, tone.delay_mix);
        self.level = tone.level;
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.chorus.process(self.phaser.process(x));
        (y + self.echo.process(y)) * self.level
    }
}

#[derive(Debug)]
pub struct PadSynth {
    core: EngineCore,
    chain: SpaceChain,
    rng: StdRng,
}

impl PadSynth {
    pub fn new(config: &EngineConfig, sample_rate: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ 0x5eed_0f_5ace),
            None => StdRng::from_os_rng(),
        };
        Self {
            core: EngineCore::new(config, sample_rate, PAD_LEVEL, false),
            chain: SpaceChain::new(sample_rate),
            rng,
        }
    }

    /// Current master fader value, for gating checks.
    pub fn level_at(&self, time: f64) -> f32 {
        self.core.fader_at(time)
    }

    fn pad_voice(&mut self, chord: &[f32], start: f64, duration: f64) -> Voice {
        let mut envelope = Automation::new(0.0);
        envelope
            .set_value_at(0.0001, start)
            .linear_ramp_to(0.06, start + PAD_ATTACK)
            .set_value_at(0.05, start + PAD_ATTACK.max(duration - PAD_RELEASE))
            .linear_ramp_to(0.0, start + duration.max(PAD_ATTACK + 0.01));

        let mut voice = Voice::new(start, start + duration + 0.1, self.core.sample_rate, envelope);
        for &frequency in chord {
            for (waveform, cents) in [
                (Waveform::Saw, 0.0),
                (Waveform::Triangle, -12.0),
                (Waveform::Triangle, 8.0),
            ] {
                let wobble = Wobble::new(
                    self.rng.random_range(0.3..0.8),
                    self.rng.random_range(6.0..10.0),
                );
                voice = voice.partial(
                    Partial::new(Oscillator::new(waveform), frequency, 1.0)
                        .detune(cents)
                        .wobble(wobble),
                );
            }
        }
        voice
    }

    fn arp_voice(&self, frequency: f32, start: f64, duration: f64) -> Voice {
        let mut envelope = Automation::new(0.0);
        envelope
            .set_value_at(0.0001, start)
            .linear_ramp_to(0.07, start + 0.01)
            .exponential_ramp_to(0.03, start + (duration * 0.3).max(0.011))
            .linear_ramp_to(0.0, start + duration.max(0.012));

        let mut cutoff = Automation::new(frequency * 6.0);
        cutoff
            .set_value_at(frequency * 6.0, start)
            .exponential_ramp_to(frequency * 1.5, start + duration * 0.8);

        Voice::new(start, start + duration + 0.05, self.core.sample_rate, envelope)
            .partial(Partial::new(Oscillator::new(Waveform::Square), frequency, 1.0))
            .filter(FilterKind::LowPass, 8.0, cutoff)
    }
}

impl Instrument for PadSynth {
    fn name(&self) -> &'static str {
        "pad"
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

impl Melodic for PadSynth {
    fn trigger(
        &mut self,
        pitch: &Pitch,
        start: f64,
        duration: f64,
        articulation: &Articulation,
    ) -> Option<VoiceId> {
        if duration <= 0.0 {
            return None;
        }
        let voice = match pitch {
            Pitch::Chord(chord) if !chord.is_empty() => self.pad_voice(chord, start, duration),
            Pitch::Chord(_) => return None,
            Pitch::Single(frequency) if *frequency > 0.0 => {
                self.arp_voice(*frequency, start, duration)
            }
            Pitch::Single(_) => return None,
        };
        Some(self.core.attach(voice.scaled(articulation.velocity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 8_000.0;

    fn peak(pad: &mut PadSynth, t0: f64, seconds: f64) -> f32 {
        let mut out = vec![0.0; (seconds * RATE as f64) as usize];
        pad.render(t0, 1.0 / RATE as f64, &mut out);
        out.iter().map(|s| s.abs()).fold(0.0, f32::max)
    }

    #[test]
    fn pad_is_silent_until_faded_in() {
        let mut pad = PadSynth::new(&EngineConfig::default(), RATE, Some(1));
        pad.trigger(
            &Pitch::Chord(vec![146.83, 174.61, 220.0]),
            0.0,
            4.0,
            &Articulation::default(),
        )
        .unwrap();
        assert_eq!(peak(&mut pad, 0.0, 1.0), 0.0);

        pad.fade_in(0.5, 1.0);
        assert!(peak(&mut pad, 1.0, 1.0) > 0.001);
        assert!((pad.level_at(1.5) - PAD_LEVEL).abs() < 1e-6);
    }

    #[test]
    fn arp_pluck_builds_a_filtered_voice() {
        let mut pad = PadSynth::new(&EngineConfig::default(), RATE, Some(2));
        pad.fade_in(0.0, 0.0);
        pad.trigger(&Pitch::Single(440.0), 0.0, 0.2, &Articulation::default())
            .unwrap();
        assert!(peak(&mut pad, 0.0, 0.3) > 0.001);
        assert!(pad
            .trigger(&Pitch::Chord(Vec::new()), 0.0, 1.0, &Articulation::default())
            .is_none());
    }
}
