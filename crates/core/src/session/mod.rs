//! Offline driver: the scheduler and the engine advanced together on the
//! engine's own clock, with no audio device or wall clock involved.

use tracing::debug;

use crate::audio::AudioEngine;
use crate::config::AppConfig;
use crate::score::Score;
use crate::telemetry::TelemetryHandle;
use crate::timeline::Scheduler;
use crate::Result;

#[derive(Debug)]
pub struct Session {
    scheduler: Scheduler,
    engine: AudioEngine,
    block_size: usize,
    tick_interval: f64,
    next_tick: f64,
}

impl Session {
    pub fn new(score: Score, config: &AppConfig) -> Result<Self> {
        let engine = AudioEngine::new(config)?;
        Ok(Self {
            scheduler: Scheduler::new(score, config.scheduler.clone()),
            engine,
            block_size: config.audio.block_size.max(1),
            tick_interval: config.scheduler.tick_interval().as_secs_f64(),
            next_tick: 0.0,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn telemetry(&self) -> TelemetryHandle {
        self.engine.telemetry()
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    pub fn now(&self) -> f64 {
        self.engine.now()
    }

    pub fn start(&mut self) {
        let now = self.engine.now();
        self.scheduler.start(now, &mut self.engine);
        self.next_tick = now;
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn play_song(&mut self, index: usize) -> Result<()> {
        let now = self.engine.now();
        self.scheduler.play_song(index, now, &mut self.engine)
    }

    pub fn next_song(&mut self) {
        let now = self.engine.now();
        self.scheduler.next_song(now, &mut self.engine);
    }

    pub fn prev_song(&mut self) {
        let now = self.engine.now();
        self.scheduler.prev_song(now, &mut self.engine);
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.scheduler.toggle_shuffle()
    }

    /// Fills `out` with mono samples, ticking the scheduler every tick
    /// interval of rendered time.
    pub fn render(&mut self, out: &mut [f32]) {
        for block in out.chunks_mut(self.block_size) {
            let now = self.engine.now();
            if now >= self.next_tick {
                self.scheduler.tick(now, &mut self.engine);
                self.next_tick += self.tick_interval;
                if self.next_tick <= now {
                    // Blocks longer than a tick: never fall further behind.
                    self.next_tick = now + self.tick_interval;
                }
            }
            self.engine.render(block);
        }
    }

    /// Renders `seconds` of audio into a fresh buffer.
    pub fn render_seconds(&mut self, seconds: f64) -> Vec<f32> {
        let frames = (seconds.max(0.0) * self.sample_rate() as f64).round() as usize;
        let mut out = vec![0.0; frames];
        self.render(&mut out);
        debug!(frames, voices = self.engine.active_voices(), "rendered offline");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::Instrument;
    use crate::score::{Note, Section, Song};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.audio.sample_rate = 8_000;
        config.audio.block_size = 80;
        config.scheduler.seed = Some(3);
        config
    }

    fn score() -> Score {
        let section = Section::new("riff", 0.1, 120.0, 2)
            .with_guitar(vec![Note::new(82.41, 1.0), Note::rest(1.0)])
            .with_bass(vec![Note::new(41.2, 2.0)])
            .with_drums("K-S-")
            .unwrap();
        Score::new(vec![
            Song::new("one", vec![section.clone()]),
            Song::new("two", vec![section]),
        ])
        .unwrap()
    }

    #[test]
    fn nothing_plays_before_start() {
        let mut session = Session::new(score(), &config()).unwrap();
        let out = session.render_seconds(0.5);
        assert_eq!(out.len(), 4_000);
        assert!(out.iter().all(|s| *s == 0.0));
        assert!((session.now() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn started_session_makes_sound_after_the_offset() {
        let mut session = Session::new(score(), &config()).unwrap();
        session.start();
        let out = session.render_seconds(1.5);

        assert!(out.iter().all(|s| s.is_finite()));
        let head = &out[..3_600];
        assert!(head.iter().all(|s| s.abs() < 1e-6), "sound before the first downbeat");
        assert!(out[4_000..].iter().any(|s| s.abs() > 1e-3));
        assert_eq!(session.scheduler().cursor().song_index, 0);
    }

    #[test]
    fn arp_without_a_pad_chord_is_heard() {
        let section = Section::new("orbit", 0.9, 120.0, 1)
            .with_guitar(vec![Note::rest(4.0)])
            .with_arp(vec![440.0, 660.0]);
        let score = Score::new(vec![Song::new("arp only", vec![section])]).unwrap();
        let mut session = Session::new(score, &config()).unwrap();
        session.start();
        let out = session.render_seconds(5.0);

        let tail = &out[16_000..];
        let peak = tail.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        assert!(peak > 1e-4, "peak {peak}");
        assert!(session.engine().pad().active_voices() > 0);
    }

    #[test]
    fn transport_passes_through() {
        let mut session = Session::new(score(), &config()).unwrap();
        session.start();
        session.render_seconds(0.2);
        session.next_song();
        assert_eq!(session.scheduler().cursor().song_index, 1);
        session.prev_song();
        assert_eq!(session.scheduler().cursor().song_index, 0);
        assert!(session.play_song(5).is_err());
        session.stop();
        assert!(!session.scheduler().is_playing());
    }
}
