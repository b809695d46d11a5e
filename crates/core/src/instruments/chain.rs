//! Amp-style effect chain shared by all voices of a guitar-like engine:
//! drive, tone stack, cabinet, power-amp compression, then delay and
//! reverb sends.

use crate::dsp::{Biquad, Compressor, FeedbackDelay, FilterKind, Reverb, ShaperCurve};

use super::ToneState;

/// Fixed corner frequencies of a chain; the gains come from [`ToneState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainVoicing {
    pub input_gain: f32,
    pub low_hz: f32,
    pub mid_hz: f32,
    pub mid_q: f32,
    pub high_hz: f32,
    pub presence_hz: f32,
    /// Cabinet resonance peak (frequency, Q, gain dB); `None` skips it.
    pub resonance: Option<(f32, f32, f32)>,
    pub comp_threshold_db: f32,
    pub comp_ratio: f32,
    pub comp_attack: f32,
    pub comp_release: f32,
}

impl ChainVoicing {
    pub const GUITAR: Self = Self {
        input_gain: 0.6,
        low_hz: 250.0,
        mid_hz: 800.0,
        mid_q: 1.2,
        high_hz: 3_500.0,
        presence_hz: 2_200.0,
        resonance: Some((2_800.0, 3.0, 4.0)),
        comp_threshold_db: -18.0,
        comp_ratio: 4.0,
        comp_attack: 0.005,
        comp_release: 0.1,
    };

    pub const BASS: Self = Self {
        input_gain: 1.0,
        low_hz: 200.0,
        mid_hz: 600.0,
        mid_q: 1.0,
        high_hz: 3_000.0,
        presence_hz: 1_500.0,
        resonance: None,
        comp_threshold_db: -20.0,
        comp_ratio: 6.0,
        comp_attack: 0.003,
        comp_release: 0.15,
    };
}

#[derive(Debug, Clone)]
pub struct ToneChain {
    voicing: ChainVoicing,
    sample_rate: f32,
    tone: ToneState,
    highpass: Biquad,
    low: Biquad,
    mid: Biquad,
    high: Biquad,
    presence: Biquad,
    cabinet: Biquad,
    resonance: Option<Biquad>,
    body: Biquad,
    compressor: Compressor,
    delay: FeedbackDelay,
    reverb: Reverb,
}

impl ToneChain {
    pub fn new(voicing: ChainVoicing, tone: ToneState, sample_rate: f32) -> Self {
        let bypass = |kind| Biquad::new(kind, 1_000.0, 0.707, sample_rate);
        let mut chain = Self {
            voicing,
            sample_rate,
            tone,
            highpass: bypass(FilterKind::HighPass),
            low: bypass(FilterKind::LowShelf(0.0)),
            mid: bypass(FilterKind::Peaking(0.0)),
            high: bypass(FilterKind::HighShelf(0.0)),
            presence: bypass(FilterKind::Peaking(0.0)),
            cabinet: bypass(FilterKind::LowPass),
            resonance: voicing
                .resonance
                .map(|(hz, q, db)| Biquad::new(FilterKind::Peaking(db), hz, q, sample_rate)),
            body: Biquad::new(FilterKind::Peaking(3.0), 400.0, 1.5, sample_rate),
            compressor: Compressor::new(
                voicing.comp_threshold_db,
                voicing.comp_ratio,
                voicing.comp_attack,
                voicing.comp_release,
                sample_rate,
            ),
            delay: FeedbackDelay::new(2.0, 2_500.0, sample_rate),
            reverb: Reverb::new(0.45, 0.5, sample_rate),
        };
        chain.set_tone(&tone);
        chain
    }

    pub fn tone(&self) -> &ToneState {
        &self.tone
    }

    /// Applies new parameters without resetting filter or delay state, so
    /// sustaining notes carry straight through the change.
    pub fn set_tone(&mut self, tone: &ToneState) {
        let v = self.voicing;
        let rate = self.sample_rate;
        self.tone = *tone;
        self.highpass
            .set(FilterKind::HighPass, tone.highpass_hz.max(10.0), 0.7, rate);
        self.low.set(FilterKind::LowShelf(tone.low_db), v.low_hz, 0.707, rate);
        self.mid.set(FilterKind::Peaking(tone.mid_db), v.mid_hz, v.mid_q, rate);
        self.high
            .set(FilterKind::HighShelf(tone.high_db), v.high_hz, 0.707, rate);
        self.presence
            .set(FilterKind::Peaking(tone.presence_db), v.presence_hz, 2.0, rate);
        self.cabinet
            .set(FilterKind::LowPass, tone.cabinet_hz, 0.7, rate);
        self.delay
            .set(tone.delay_time, tone.delay_feedback, tone.delay_mix);
        self.reverb.mix = tone.reverb_mix;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let tone = &self.tone;
        let mut y = tone.curve.apply(x * self.voicing.input_gain * 4.0, tone.drive);
        if tone.second_drive > 0.0 {
            y = ShaperCurve::Tube.apply(y, tone.second_drive);
        }

        y = self.low.process(y);
        y = self.mid.process(y);
        y = self.high.process(y);
        y = self.presence.process(y);
        y = self.highpass.process(y);
        y = self.cabinet.process(y);
        if let Some(resonance) = &mut self.resonance {
            y = resonance.process(y);
        }
        y = self.body.process(y);
        y = self.compressor.process(y);

        let sends = self.delay.process(y) + self.reverb.process(y);
        (y + sends) * self.tone.level
    }
}
