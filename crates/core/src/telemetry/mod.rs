//! Numeric side channel for the visual renderer.
//!
//! The audio side publishes raw [`EngineSignals`] once per rendered block
//! with `try_lock`, so a busy reader never stalls rendering. Readers call
//! [`TelemetryHandle::frame`] at their own frame rate; smoothing is applied
//! there and corrected for the frame length.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use serde::{Deserialize, Serialize};

use crate::analysis::BandLevels;
use crate::config::TelemetryConfig;
use crate::dsp::frame_corrected;
use crate::score::VisualMode;
use crate::tone::{GenreLabel, GenreSmoother};
use crate::{Result, StonerizmError};

/// What is playing, as last announced by a section change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub song: String,
    pub section: String,
    pub label: Option<GenreLabel>,
    pub visual_mode: VisualMode,
    pub target_genre: f32,
}

/// Raw per-block state written by the audio side.
#[derive(Debug, Clone, Default)]
pub struct EngineSignals {
    pub time: f64,
    pub bands: BandLevels,
    pub note_on: bool,
    pub note_frequency: f32,
    pub riff_flash: bool,
    pub kick: bool,
    pub snare: bool,
    pub section: Arc<SectionInfo>,
}

/// One smoothed sample of the telemetry stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub time: f64,
    pub level: f32,
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
    pub genre: f32,
    pub note_on: f32,
    pub note_frequency: f32,
    pub riff_flash: f32,
    pub kick: f32,
    pub snare: f32,
    pub visual_mode: u8,
}

#[derive(Debug)]
struct TelemetryState {
    signals: EngineSignals,
    bass: f32,
    mid: f32,
    high: f32,
    genre: GenreSmoother,
    band_smoothing: f32,
    reference_rate: f32,
}

/// Shared, cloneable view over the telemetry state.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    shared: Arc<Mutex<TelemetryState>>,
}

impl TelemetryHandle {
    pub fn new(config: &TelemetryConfig) -> Self {
        let state = TelemetryState {
            signals: EngineSignals::default(),
            bass: 0.0,
            mid: 0.0,
            high: 0.0,
            genre: GenreSmoother::new(config.genre_smoothing, config.reference_frame_rate),
            band_smoothing: config.band_smoothing,
            reference_rate: config.reference_frame_rate,
        };
        Self {
            shared: Arc::new(Mutex::new(state)),
        }
    }

    /// Advances the smoothers by a frame of `dt` seconds and returns the
    /// result.
    pub fn frame(&self, dt: f32) -> Result<TelemetryFrame> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let k = frame_corrected(state.band_smoothing, dt, state.reference_rate);
        let bands = state.signals.bands;
        state.bass += (bands.bass - state.bass) * k;
        state.mid += (bands.mid - state.mid) * k;
        state.high += (bands.high - state.high) * k;
        let target = state.signals.section.target_genre;
        let genre = state.genre.step(target, dt);

        let signals = &state.signals;
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        Ok(TelemetryFrame {
            time: signals.time,
            level: bands.level,
            bass: state.bass,
            mid: state.mid,
            high: state.high,
            genre,
            note_on: flag(signals.note_on),
            note_frequency: signals.note_frequency,
            riff_flash: flag(signals.riff_flash),
            kick: flag(signals.kick),
            snare: flag(signals.snare),
            visual_mode: signals.section.visual_mode.index(),
        })
    }

    /// Song and section currently announced, with the genre label.
    pub fn status(&self) -> Result<SectionInfo> {
        let state = self.lock()?;
        Ok(state.signals.section.as_ref().clone())
    }

    /// Publishes without blocking. Returns `false` when the lock is busy
    /// or poisoned; the next block simply tries again.
    pub(crate) fn publish(&self, signals: &EngineSignals) -> bool {
        match self.shared.try_lock() {
            Ok(mut state) => {
                state.signals.clone_from(signals);
                true
            }
            Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => false,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TelemetryState>> {
        self.shared
            .lock()
            .map_err(|_| StonerizmError::msg("telemetry state has been poisoned"))
    }
}
