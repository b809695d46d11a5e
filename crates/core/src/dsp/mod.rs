//! Sample-level building blocks shared by the instrument engines.

pub mod automation;
pub mod effects;
pub mod filter;
pub mod osc;
pub mod shaper;

pub use automation::Automation;
pub use effects::{Chorus, Compressor, DelayLine, FeedbackDelay, Phaser, Reverb};
pub use filter::{Biquad, FilterKind};
pub use osc::{Noise, Oscillator, Waveform};
pub use shaper::ShaperCurve;

/// Linear gain for a level in decibels.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-9).log10()
}

/// Frequency ratio for a detune in cents.
pub fn cents_to_ratio(cents: f32) -> f32 {
    2f32.powf(cents / 1200.0)
}

/// Per-frame smoothing coefficient rescaled from `reference_rate` frames
/// per second to a frame of `dt` seconds.
pub fn frame_corrected(coefficient: f32, dt: f32, reference_rate: f32) -> f32 {
    let frames = (dt * reference_rate).max(0.0);
    1.0 - (1.0 - coefficient.clamp(0.0, 1.0)).powf(frames)
}
