use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tracing::debug;

use crate::analysis::{BandAnalyzer, BandLevels};
use crate::config::AppConfig;
use crate::drums::DrumHit;
use crate::dsp::Compressor;
use crate::instruments::{
    Articulation, BassGuitar, DrumKit, Instrument, LeadGuitar, Melodic, Organ, PadSynth, Pitch,
    RoomState, ToneState,
};
use crate::telemetry::{EngineSignals, SectionInfo, TelemetryHandle};
use crate::tone::Fade;
use crate::Result;

const KICK_PULSE: f64 = 0.12;
const SNARE_PULSE: f64 = 0.08;
const LIMITER_THRESHOLD_DB: f32 = -6.0;
const LIMITER_RATIO: f32 = 14.0;

/// Melodic engine addressed by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    Lead,
    Bass,
    Pad,
    Organ,
}

/// Everything the control side can ask of the audio side. Note and hit
/// times are absolute engine-clock seconds; the other commands act at the
/// engine's current time when they are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Note {
        part: Part,
        pitch: Pitch,
        start: f64,
        duration: f64,
        articulation: Articulation,
    },
    Hit {
        hit: DrumHit,
        time: f64,
        velocity: f32,
    },
    SetTone {
        part: Part,
        tone: ToneState,
    },
    SetRoom(RoomState),
    Fade {
        part: Part,
        fade: Fade,
    },
    /// Silences every engine on a song jump.
    MuteAll,
    RiffFlash(bool),
    SectionChanged(SectionInfo),
}

/// Destination for scheduler output.
pub trait CommandSink {
    fn submit(&mut self, command: EngineCommand);
}

/// Collects commands for inspection, e.g. in tests or offline analysis.
impl CommandSink for Vec<EngineCommand> {
    fn submit(&mut self, command: EngineCommand) {
        self.push(command);
    }
}

/// Sample-position clock shared between the audio side and the control
/// thread.
#[derive(Debug, Clone)]
pub struct EngineClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl EngineClock {
    fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Seconds of audio rendered so far.
    pub fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate.max(1))
    }

    fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cue {
    NoteOn(f32),
    NoteOff,
    Kick(bool),
    Snare(bool),
}

/// Mixer of the five engines, master bus and the telemetry tap.
#[derive(Debug)]
pub struct AudioEngine {
    sample_rate: u32,
    clock: EngineClock,
    lead: LeadGuitar,
    bass: BassGuitar,
    pad: PadSynth,
    organ: Organ,
    drums: DrumKit,
    master_gain: f32,
    limiter: Compressor,
    analyzer: BandAnalyzer,
    telemetry: TelemetryHandle,
    signals: EngineSignals,
    cues: Vec<(f64, Cue)>,
    due: Vec<(f64, Cue)>,
}

impl AudioEngine {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let sample_rate = config.audio.sample_rate.max(1);
        let rate = sample_rate as f32;
        let engine = &config.engine;
        Ok(Self {
            sample_rate,
            clock: EngineClock::new(sample_rate),
            lead: LeadGuitar::new(engine, rate),
            bass: BassGuitar::new(engine, rate),
            pad: PadSynth::new(engine, rate, config.scheduler.seed),
            organ: Organ::new(engine, rate),
            drums: DrumKit::new(engine, rate),
            master_gain: config.audio.master_gain,
            limiter: Compressor::new(LIMITER_THRESHOLD_DB, LIMITER_RATIO, 0.002, 0.15, rate),
            analyzer: BandAnalyzer::new(config.telemetry.fft_size)?,
            telemetry: TelemetryHandle::new(&config.telemetry),
            signals: EngineSignals::default(),
            cues: Vec::new(),
            due: Vec::new(),
        })
    }

    /// Returns the sample rate the engine renders at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Engine time in seconds: the position of the next rendered sample.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn clock(&self) -> EngineClock {
        self.clock.clone()
    }

    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry.clone()
    }

    pub fn lead(&self) -> &LeadGuitar {
        &self.lead
    }

    pub fn bass(&self) -> &BassGuitar {
        &self.bass
    }

    pub fn pad(&self) -> &PadSynth {
        &self.pad
    }

    pub fn organ(&self) -> &Organ {
        &self.organ
    }

    pub fn drums(&self) -> &DrumKit {
        &self.drums
    }

    pub fn active_voices(&self) -> usize {
        self.instruments().iter().map(|i| i.active_voices()).sum()
    }

    fn instruments(&self) -> [&dyn Instrument; 5] {
        [&self.lead, &self.bass, &self.pad, &self.organ, &self.drums]
    }

    fn part_mut(&mut self, part: Part) -> &mut dyn Melodic {
        match part {
            Part::Lead => &mut self.lead,
            Part::Bass => &mut self.bass,
            Part::Pad => &mut self.pad,
            Part::Organ => &mut self.organ,
        }
    }

    pub fn apply(&mut self, command: EngineCommand) {
        let now = self.now();
        match command {
            EngineCommand::Note {
                part,
                pitch,
                start,
                duration,
                articulation,
            } => {
                let voice = self
                    .part_mut(part)
                    .trigger(&pitch, start, duration, &articulation);
                if let (Some(_), Part::Lead, Pitch::Single(frequency)) = (voice, part, &pitch) {
                    self.cues.push((start, Cue::NoteOn(*frequency)));
                    self.cues.push((start + duration, Cue::NoteOff));
                }
            }
            EngineCommand::Hit {
                hit,
                time,
                velocity,
            } => {
                self.drums.hit(hit, time, velocity);
                match hit {
                    DrumHit::Kick => {
                        self.cues.push((time, Cue::Kick(true)));
                        self.cues.push((time + KICK_PULSE, Cue::Kick(false)));
                    }
                    DrumHit::Snare => {
                        self.cues.push((time, Cue::Snare(true)));
                        self.cues.push((time + SNARE_PULSE, Cue::Snare(false)));
                    }
                    _ => {}
                }
            }
            EngineCommand::SetTone { part, tone } => self.part_mut(part).set_tone(&tone, now),
            EngineCommand::SetRoom(room) => self.drums.set_room(room),
            EngineCommand::Fade { part, fade } => {
                let engine = self.part_mut(part);
                match fade {
                    Fade::In(seconds) => engine.fade_in(seconds, now),
                    Fade::Out(seconds) => engine.fade_out(seconds, now),
                }
            }
            EngineCommand::MuteAll => {
                self.lead.mute_all(now);
                self.bass.mute_all(now);
                self.pad.mute_all(now);
                self.organ.mute_all(now);
                self.drums.mute_all(now);
                // The pending off cues go with the queue.
                self.cues.clear();
                self.signals.note_on = false;
                self.signals.kick = false;
                self.signals.snare = false;
                self.signals.riff_flash = false;
                debug!(now, "muted all engines");
            }
            EngineCommand::RiffFlash(on) => self.signals.riff_flash = on,
            EngineCommand::SectionChanged(info) => self.signals.section = Arc::new(info),
        }
    }

    /// Renders one mono block starting at the current engine time and
    /// advances the clock past it.
    pub fn render(&mut self, out: &mut [f32]) {
        let start = self.now();
        let dt = 1.0 / f64::from(self.sample_rate);
        out.fill(0.0);

        self.lead.render(start, dt, out);
        self.bass.render(start, dt, out);
        self.pad.render(start, dt, out);
        self.organ.render(start, dt, out);
        self.drums.render(start, dt, out);

        for sample in out.iter_mut() {
            *sample = self.limiter.process(*sample * self.master_gain);
        }

        self.clock.advance(out.len());
        let end = self.now();
        self.fire_cues(end);

        self.analyzer.push(out);
        self.signals.bands = self.analyzer.analyze().unwrap_or(BandLevels::default());
        self.signals.time = end;
        self.telemetry.publish(&self.signals);
    }

    fn fire_cues(&mut self, until: f64) {
        let mut index = 0;
        while index < self.cues.len() {
            if self.cues[index].0 < until {
                self.due.push(self.cues.swap_remove(index));
            } else {
                index += 1;
            }
        }
        self.due.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, cue) in self.due.drain(..) {
            match cue {
                Cue::NoteOn(frequency) => {
                    self.signals.note_on = true;
                    self.signals.note_frequency = frequency;
                }
                Cue::NoteOff => self.signals.note_on = false,
                Cue::Kick(on) => self.signals.kick = on,
                Cue::Snare(on) => self.signals.snare = on,
            }
        }
    }
}

impl CommandSink for AudioEngine {
    fn submit(&mut self, command: EngineCommand) {
        self.apply(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AudioEngine {
        let mut config = AppConfig::default();
        config.audio.sample_rate = 8_000;
        config.scheduler.seed = Some(1);
        AudioEngine::new(&config).unwrap()
    }

    fn render_seconds(engine: &mut AudioEngine, seconds: f64) {
        let mut block = vec![0.0; 80];
        let blocks = (seconds * 100.0).round() as usize;
        for _ in 0..blocks {
            engine.render(&mut block);
            assert!(block.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        }
    }

    #[test]
    fn clock_follows_rendered_samples() {
        let mut engine = engine();
        let clock = engine.clock();
        render_seconds(&mut engine, 0.5);
        assert!((clock.now() - 0.5).abs() < 1e-9);
        assert!((engine.now() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn kick_raises_a_short_pulse() {
        let mut engine = engine();
        let telemetry = engine.telemetry();
        engine.submit(EngineCommand::Hit {
            hit: DrumHit::Kick,
            time: 0.05,
            velocity: 1.0,
        });

        render_seconds(&mut engine, 0.1);
        assert_eq!(telemetry.frame(0.016).unwrap().kick, 1.0);
        render_seconds(&mut engine, 0.1);
        assert_eq!(telemetry.frame(0.016).unwrap().kick, 0.0);
    }

    #[test]
    fn lead_notes_drive_note_telemetry() {
        let mut engine = engine();
        let telemetry = engine.telemetry();
        engine.submit(EngineCommand::Note {
            part: Part::Lead,
            pitch: Pitch::Single(110.0),
            start: 0.0,
            duration: 0.3,
            articulation: Articulation::default(),
        });

        render_seconds(&mut engine, 0.1);
        let frame = telemetry.frame(0.016).unwrap();
        assert_eq!(frame.note_on, 1.0);
        assert_eq!(frame.note_frequency, 110.0);

        render_seconds(&mut engine, 0.3);
        assert_eq!(telemetry.frame(0.016).unwrap().note_on, 0.0);
    }

    #[test]
    fn mute_all_clears_pending_cues_and_voices() {
        let mut engine = engine();
        engine.submit(EngineCommand::Note {
            part: Part::Bass,
            pitch: Pitch::Single(55.0),
            start: 0.0,
            duration: 4.0,
            articulation: Articulation::default(),
        });
        engine.submit(EngineCommand::Hit {
            hit: DrumHit::Snare,
            time: 1.0,
            velocity: 1.0,
        });
        render_seconds(&mut engine, 0.2);
        assert_eq!(engine.active_voices(), 2);

        engine.submit(EngineCommand::MuteAll);
        render_seconds(&mut engine, 0.1);
        assert_eq!(engine.active_voices(), 0);
        assert!(engine.cues.is_empty());
    }

    #[test]
    fn mute_inside_a_pulse_releases_the_flags() {
        let mut engine = engine();
        let telemetry = engine.telemetry();
        engine.submit(EngineCommand::Hit {
            hit: DrumHit::Kick,
            time: 0.0,
            velocity: 0.5,
        });
        engine.submit(EngineCommand::Hit {
            hit: DrumHit::Snare,
            time: 0.0,
            velocity: 0.5,
        });
        engine.submit(EngineCommand::RiffFlash(true));
        render_seconds(&mut engine, 0.01);
        let frame = telemetry.frame(0.016).unwrap();
        assert_eq!((frame.kick, frame.snare, frame.riff_flash), (1.0, 1.0, 1.0));

        engine.submit(EngineCommand::MuteAll);
        render_seconds(&mut engine, 2.0);
        let frame = telemetry.frame(0.016).unwrap();
        assert_eq!((frame.kick, frame.snare, frame.riff_flash), (0.0, 0.0, 0.0));
    }

    #[test]
    fn section_changes_reach_the_status() {
        let mut engine = engine();
        let telemetry = engine.telemetry();
        engine.submit(EngineCommand::SectionChanged(SectionInfo {
            song: "TAR PIT".into(),
            section: "sludge".into(),
            ..SectionInfo::default()
        }));
        render_seconds(&mut engine, 0.01);
        assert_eq!(telemetry.status().unwrap().song, "TAR PIT");
    }
}
