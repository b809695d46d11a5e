//! Core library for the Stonerizm generative music engine.
//!
//! A declarative score of songs and sections is performed live by five
//! synthesised instruments. A look-ahead [`Scheduler`] lays whole section
//! passes onto the [`AudioEngine`]'s sample clock, the tone controller morphs
//! every engine along a doom-to-krautrock genre axis, and a
//! [`TelemetryHandle`] exposes smoothed numbers for an external visualiser.
//! [`Session`] ties scheduler and engine together for offline rendering.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod drums;
pub mod dsp;
pub mod error;
pub mod instruments;
pub mod score;
pub mod session;
pub mod telemetry;
pub mod timeline;
pub mod tone;
pub mod voice;

pub use analysis::{BandAnalyzer, BandLevels};
pub use audio::{AudioEngine, CommandSink, EngineClock, EngineCommand, Part};
pub use config::{AppConfig, AudioConfig, EngineConfig, SchedulerConfig, TelemetryConfig};
pub use drums::{DrumHit, DrumPattern, Humanizer};
pub use error::{Result, StonerizmError};
pub use instruments::{Articulation, Instrument, Melodic, Pitch, RoomState, ToneState};
pub use score::{Note, Score, Section, Song, StyleTag, VisualMode};
pub use session::Session;
pub use telemetry::{SectionInfo, TelemetryFrame, TelemetryHandle};
pub use timeline::{PlaybackCursor, Scheduler, TransportState};
pub use tone::{GenreLabel, TonePlan, TonePreset};
