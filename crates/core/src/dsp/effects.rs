//! Time-based and dynamics effects. All parameters can change between
//! samples without reallocating.

use std::f32::consts::TAU;

use super::{db_to_gain, gain_to_db, Biquad, FilterKind};

/// Circular buffer with fractional (linear interpolated) reads.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    pub fn new(max_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_samples.max(2)],
            write: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Reads `delay` samples behind the write head.
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1.0, (len - 1) as f32);
        let whole = delay.floor();
        let frac = delay - whole;
        let a = (self.write + len - whole as usize) % len;
        let b = (a + len - 1) % len;
        self.buffer[a] * (1.0 - frac) + self.buffer[b] * frac
    }

    #[inline]
    pub fn write(&mut self, x: f32) {
        self.buffer[self.write] = x;
        self.write = (self.write + 1) % self.buffer.len();
    }
}

/// Feedback echo with a damping low-pass in the loop.
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    line: DelayLine,
    damping: Biquad,
    sample_rate: f32,
    pub time: f32,
    pub feedback: f32,
    pub mix: f32,
}

impl FeedbackDelay {
    pub fn new(max_seconds: f32, damping_hz: f32, sample_rate: f32) -> Self {
        Self {
            line: DelayLine::new((max_seconds * sample_rate) as usize + 2),
            damping: Biquad::new(FilterKind::LowPass, damping_hz, 0.707, sample_rate),
            sample_rate,
            time: 0.4,
            feedback: 0.2,
            mix: 0.0,
        }
    }

    pub fn set(&mut self, time: f32, feedback: f32, mix: f32) {
        self.time = time.max(0.0);
        self.feedback = feedback.clamp(0.0, 0.95);
        self.mix = mix.max(0.0);
    }

    /// Returns the wet signal only.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let delayed = self.damping.process(self.line.read(self.time * self.sample_rate));
        self.line.write(x + delayed * self.feedback);
        delayed * self.mix
    }
}

#[derive(Debug, Clone)]
struct Comb {
    line: DelayLine,
    length: f32,
    store: f32,
}

impl Comb {
    fn process(&mut self, x: f32, feedback: f32, damp: f32) -> f32 {
        let out = self.line.read(self.length);
        self.store = out * (1.0 - damp) + self.store * damp;
        self.line.write(x + self.store * feedback);
        out
    }
}

#[derive(Debug, Clone)]
struct AllPassStage {
    line: DelayLine,
    length: f32,
}

impl AllPassStage {
    fn process(&mut self, x: f32) -> f32 {
        let delayed = self.line.read(self.length);
        let out = delayed - x;
        self.line.write(x + delayed * 0.5);
        out
    }
}

const COMB_TUNING: [f32; 4] = [1116.0, 1188.0, 1277.0, 1356.0];
const ALLPASS_TUNING: [f32; 2] = [556.0, 441.0];

/// Small Schroeder/Freeverb-style room. Tunings are given at 44.1 kHz and
/// rescaled to the running rate.
#[derive(Debug, Clone)]
pub struct Reverb {
    combs: Vec<Comb>,
    allpasses: Vec<AllPassStage>,
    feedback: f32,
    damp: f32,
    pub mix: f32,
}

impl Reverb {
    pub fn new(room_size: f32, damp: f32, sample_rate: f32) -> Self {
        let scale = sample_rate / 44_100.0;
        let combs = COMB_TUNING
            .iter()
            .map(|t| {
                let length = (t * scale).max(2.0);
                Comb {
                    line: DelayLine::new(length as usize + 2),
                    length,
                    store: 0.0,
                }
            })
            .collect();
        let allpasses = ALLPASS_TUNING
            .iter()
            .map(|t| {
                let length = (t * scale).max(2.0);
                AllPassStage {
                    line: DelayLine::new(length as usize + 2),
                    length,
                }
            })
            .collect();
        Self {
            combs,
            allpasses,
            feedback: 0.7 + 0.28 * room_size.clamp(0.0, 1.0),
            damp: damp.clamp(0.0, 1.0),
            mix: 0.0,
        }
    }

    /// Returns the wet signal only.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let input = x * 0.15;
        let mut acc = 0.0;
        for comb in &mut self.combs {
            acc += comb.process(input, self.feedback, self.damp);
        }
        for stage in &mut self.allpasses {
            acc = stage.process(acc);
        }
        acc * self.mix
    }
}

/// Feed-forward peak compressor with a soft knee.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
    attack: f32,
    release: f32,
    makeup: f32,
    envelope_db: f32,
}

impl Compressor {
    pub fn new(
        threshold_db: f32,
        ratio: f32,
        attack_seconds: f32,
        release_seconds: f32,
        sample_rate: f32,
    ) -> Self {
        let coeff = |seconds: f32| (-1.0 / (seconds.max(1e-4) * sample_rate)).exp();
        Self {
            threshold_db,
            ratio: ratio.max(1.0),
            knee_db: 6.0,
            attack: coeff(attack_seconds),
            release: coeff(release_seconds),
            makeup: 1.0,
            envelope_db: 0.0,
        }
    }

    pub fn with_makeup_db(mut self, db: f32) -> Self {
        self.makeup = db_to_gain(db);
        self
    }

    fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        let slope = 1.0 - 1.0 / self.ratio;
        if over <= -self.knee_db * 0.5 {
            0.0
        } else if over >= self.knee_db * 0.5 {
            over * slope
        } else {
            let x = over + self.knee_db * 0.5;
            slope * x * x / (2.0 * self.knee_db)
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let target = self.gain_reduction_db(gain_to_db(x.abs()));
        let coeff = if target > self.envelope_db {
            self.attack
        } else {
            self.release
        };
        self.envelope_db = target + coeff * (self.envelope_db - target);
        x * db_to_gain(-self.envelope_db) * self.makeup
    }
}

/// Modulated short delay mixed back onto the dry signal.
#[derive(Debug, Clone)]
pub struct Chorus {
    line: DelayLine,
    sample_rate: f32,
    phase: f32,
    rate: f32,
    base: f32,
    depth: f32,
    pub mix: f32,
}

impl Chorus {
    pub fn new(base_seconds: f32, depth_seconds: f32, rate_hz: f32, sample_rate: f32) -> Self {
        let max = ((base_seconds + depth_seconds) * sample_rate) as usize + 4;
        Self {
            line: DelayLine::new(max),
            sample_rate,
            phase: 0.0,
            rate: rate_hz,
            base: base_seconds,
            depth: depth_seconds,
            mix: 0.4,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let delay = (self.base + self.depth * (TAU * self.phase).sin()) * self.sample_rate;
        let wet = self.line.read(delay);
        self.line.write(x);
        self.phase = (self.phase + self.rate / self.sample_rate).fract();
        x + wet * self.mix
    }
}

/// Cascade of all-pass stages swept by a sine LFO.
#[derive(Debug, Clone)]
pub struct Phaser {
    stages: Vec<Biquad>,
    sample_rate: f32,
    phase: f32,
    rate: f32,
    center: f32,
    sweep: f32,
    counter: u32,
}

impl Phaser {
    pub fn new(stages: usize, center_hz: f32, sweep_hz: f32, rate_hz: f32, sample_rate: f32) -> Self {
        Self {
            stages: (0..stages)
                .map(|_| Biquad::new(FilterKind::AllPass, center_hz, 0.5, sample_rate))
                .collect(),
            sample_rate,
            phase: 0.0,
            rate: rate_hz,
            center: center_hz,
            sweep: sweep_hz,
            counter: 0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        // Coefficients are refreshed every 32 samples.
        if self.counter % 32 == 0 {
            let frequency =
                (self.center + self.sweep * (TAU * self.phase).sin()).max(40.0);
            for stage in &mut self.stages {
                stage.set(FilterKind::AllPass, frequency, 0.5, self.sample_rate);
            }
        }
        self.counter = self.counter.wrapping_add(1);
        self.phase = (self.phase + self.rate / self.sample_rate).fract();
        self.stages.iter_mut().fold(x, |acc, stage| stage.process(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_line_reads_back_written_samples() {
        let mut line = DelayLine::new(16);
        for i in 0..8 {
            line.write(i as f32);
        }
        // Last written value is 7, one sample behind the head.
        assert_eq!(line.read(1.0), 7.0);
        assert_eq!(line.read(3.0), 5.0);
        assert!((line.read(1.5) - 6.5).abs() < 1e-6);
    }

    #[test]
    fn feedback_delay_echoes_after_its_time() {
        let rate = 1_000.0;
        let mut delay = FeedbackDelay::new(1.0, 400.0, rate);
        delay.set(0.1, 0.0, 1.0);
        let mut out = Vec::new();
        out.push(delay.process(1.0));
        for _ in 0..200 {
            out.push(delay.process(0.0));
        }
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap_or_default();
        assert!((98..=106).contains(&peak), "echo peak at {peak}");
    }

    #[test]
    fn reverb_tail_decays() {
        let mut reverb = Reverb::new(0.5, 0.4, 8_000.0);
        reverb.mix = 1.0;
        reverb.process(1.0);
        let early: f32 = (0..2_000).map(|_| reverb.process(0.0).abs()).sum();
        for _ in 0..20_000 {
            reverb.process(0.0);
        }
        let late: f32 = (0..2_000).map(|_| reverb.process(0.0).abs()).sum();
        assert!(early > 0.0);
        assert!(late < early);
    }

    #[test]
    fn compressor_reduces_loud_signals_only() {
        let mut comp = Compressor::new(-6.0, 14.0, 0.001, 0.1, 8_000.0);
        let mut quiet = 0.0;
        for _ in 0..800 {
            quiet = comp.process(0.1);
        }
        assert!((quiet - 0.1).abs() < 1e-3);

        let mut loud = 0.0;
        for _ in 0..800 {
            loud = comp.process(1.0);
        }
        assert!(loud < 0.6);
    }

    #[test]
    fn modulated_effects_stay_finite() {
        let mut chorus = Chorus::new(0.015, 0.004, 0.7, 8_000.0);
        let mut phaser = Phaser::new(4, 1_000.0, 800.0, 0.3, 8_000.0);
        for i in 0..8_000 {
            let x = ((i as f32) * 0.05).sin();
            assert!(chorus.process(x).is_finite());
            assert!(phaser.process(x).is_finite());
        }
    }
}
