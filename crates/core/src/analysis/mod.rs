use std::{collections::VecDeque, f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{Result, StonerizmError};

/// Decibel window mapped onto [0, 1] band levels.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Instantaneous spectrum summary of the master output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandLevels {
    /// Mean of every bin.
    pub level: f32,
    /// Mean of the lowest third of the bins.
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub rms: f32,
}

/// Rolling spectral analyser over the most recent `fft_size` samples.
///
/// Blocks of any length are pushed as they are rendered; [`BandAnalyzer::analyze`]
/// always looks at the newest window, so callers can sample it at their own
/// frame rate.
pub struct BandAnalyzer {
    fft_size: usize,
    window: VecDeque<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl BandAnalyzer {
    pub fn new(fft_size: usize) -> Result<Self> {
        if fft_size < 8 || !fft_size.is_power_of_two() {
            return Err(StonerizmError::InvalidInput(
                "fft size must be a power of two of at least 8",
            ));
        }

        Ok(Self {
            fft_size,
            window: VecDeque::from(vec![0.0; fft_size]),
            fft_planner: RealFftPlanner::new(),
            fft: None,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Appends rendered samples, discarding the oldest beyond the window.
    pub fn push(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.fft_size);
        for &sample in &samples[skip..] {
            if self.window.len() == self.fft_size {
                self.window.pop_front();
            }
            self.window.push_back(sample);
        }
    }

    /// Zeroes the window, e.g. when the output device restarts.
    pub fn reset(&mut self) {
        self.window.iter_mut().for_each(|sample| *sample = 0.0);
    }

    /// Transforms the current window and averages the bins into three equal
    /// bands.
    pub fn analyze(&mut self) -> Result<BandLevels> {
        let len = self.fft_size;
        let rms = compute_rms(self.window.make_contiguous());
        let fft = self.prepare_fft(len)?;

        for (index, (slot, value)) in fft.input.iter_mut().zip(&fft.history).enumerate() {
            *slot = *value * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let bins: Vec<f32> = fft
            .spectrum
            .iter()
            .take(len / 2)
            .map(|bin| normalise_db(bin.norm() / len as f32))
            .collect();

        let third = bins.len() / 3;
        let mean = |slice: &[f32]| slice.iter().sum::<f32>() / slice.len().max(1) as f32;

        Ok(BandLevels {
            level: mean(&bins),
            bass: mean(&bins[..third]),
            mid: mean(&bins[third..third * 2]),
            high: mean(&bins[third * 2..]),
            rms,
        })
    }

    fn prepare_fft(&mut self, size: usize) -> Result<&mut FftResources> {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.fft_planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
                history: Vec::with_capacity(size),
            });
        }

        let fft = self
            .fft
            .as_mut()
            .ok_or_else(|| StonerizmError::msg("fft resources were not initialised"))?;
        fft.history.clear();
        fft.history.extend(self.window.iter().copied());
        Ok(fft)
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
    history: Vec<f32>,
}

impl fmt::Debug for BandAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BandAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("window", &self.window.len())
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn normalise_db(magnitude: f32) -> f32 {
    if magnitude <= f32::EPSILON {
        return 0.0;
    }
    let db = 20.0 * magnitude.log10();
    ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0)
}

fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn silence_reads_as_zero() {
        let mut analyzer = BandAnalyzer::new(256).unwrap();
        analyzer.push(&[0.0; 512]);
        let levels = analyzer.analyze().unwrap();

        assert_eq!(levels, BandLevels::default());
    }

    #[test]
    fn low_tone_lands_in_the_bass_band() {
        let mut analyzer = BandAnalyzer::new(256).unwrap();
        analyzer.push(&tone(500.0, 48_000.0, 1_024));
        let levels = analyzer.analyze().unwrap();

        assert!(levels.bass > levels.high, "{levels:?}");
        assert!(levels.rms > 0.3);
    }

    #[test]
    fn high_tone_lands_in_the_high_band() {
        let mut analyzer = BandAnalyzer::new(256).unwrap();
        analyzer.push(&tone(20_000.0, 48_000.0, 1_024));
        let levels = analyzer.analyze().unwrap();

        assert!(levels.high > levels.bass, "{levels:?}");
    }

    #[test]
    fn rejects_odd_sizes() {
        assert!(matches!(
            BandAnalyzer::new(100),
            Err(StonerizmError::InvalidInput(_))
        ));
    }

    #[test]
    fn short_pushes_roll_the_window() {
        let mut analyzer = BandAnalyzer::new(8).unwrap();
        analyzer.push(&[1.0; 4]);
        analyzer.push(&[1.0; 4]);
        assert!((analyzer.analyze().unwrap().rms - 1.0).abs() < 1e-6);
        analyzer.reset();
        assert_eq!(analyzer.analyze().unwrap().rms, 0.0);
    }
}
