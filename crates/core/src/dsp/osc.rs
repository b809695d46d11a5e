//! Phase-accumulator oscillators with PolyBLEP correction on the
//! discontinuous shapes, plus a cheap white noise source.

use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
}

#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    /// Phase in [0, 1).
    phase: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
        }
    }

    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase.rem_euclid(1.0);
        self
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Returns the current sample and advances by `frequency * dt` cycles.
    #[inline]
    pub fn next(&mut self, frequency: f32, dt: f32) -> f32 {
        let inc = (frequency * dt).clamp(0.0, 0.5);
        let t = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (TAU * t).sin(),
            Waveform::Saw => 2.0 * t - 1.0 - poly_blep(t, inc),
            Waveform::Square => {
                let naive = if t < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(t, inc) - poly_blep((t + 0.5).fract(), inc)
            }
            Waveform::Triangle => 1.0 - 4.0 * (t - 0.5).abs(),
        };
        self.phase = (self.phase + inc).fract();
        out
    }
}

/// Polynomial band-limited step residual around the wrap point.
#[inline]
fn poly_blep(t: f32, inc: f32) -> f32 {
    if inc <= 0.0 {
        return 0.0;
    }
    if t < inc {
        let x = t / inc;
        x + x - x * x - 1.0
    } else if t > 1.0 - inc {
        let x = (t - 1.0) / inc;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

/// Xorshift white noise in [-1, 1].
#[derive(Debug, Clone)]
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(waveform: Waveform, frequency: f32, rate: f32, n: usize) -> Vec<f32> {
        let mut osc = Oscillator::new(waveform);
        (0..n).map(|_| osc.next(frequency, 1.0 / rate)).collect()
    }

    #[test]
    fn every_shape_stays_bounded() {
        for waveform in [
            Waveform::Sine,
            Waveform::Saw,
            Waveform::Square,
            Waveform::Triangle,
        ] {
            for sample in collect(waveform, 1_234.5, 48_000.0, 4_800) {
                assert!(sample.abs() <= 1.01, "{waveform:?} produced {sample}");
            }
        }
    }

    #[test]
    fn sine_completes_one_cycle_per_period() {
        let samples = collect(Waveform::Sine, 100.0, 8_000.0, 80);
        assert!(samples[0].abs() < 1e-6);
        assert!((samples[20] - 1.0).abs() < 1e-3);
        assert!((samples[60] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn noise_is_zero_mean_ish_and_bounded() {
        let mut noise = Noise::new(42);
        let samples: Vec<f32> = (0..10_000).map(|_| noise.next()).collect();
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!(mean.abs() < 0.05);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }
}
