//! Look-ahead scheduler.
//!
//! A coarse control-rate timer calls [`Scheduler::tick`]. Whenever the
//! already-scheduled audio runs out within the look-ahead window, the whole
//! next pass of the current section is laid out on the engine clock in one
//! go and the cursor advances. Song jumps bump the cursor's generation so
//! section changes deferred under an older generation never fire.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info, warn};

use crate::audio::{CommandSink, EngineCommand, Part};
use crate::config::SchedulerConfig;
use crate::drums::{decode, Humanizer};
use crate::instruments::{Articulation, Pitch};
use crate::score::{Score, Section, Song};
use crate::telemetry::SectionInfo;
use crate::tone::{plan_section, ARP_GENRE_THRESHOLD, PAD_GENRE_THRESHOLD};
use crate::{drums::DrumHit, Result, StonerizmError};

/// Fraction of its notated length a lead note sounds for.
pub const LEAD_GATE: f64 = 0.93;
/// Arp plucks sound for this fraction of a 16th step.
pub const ARP_GATE: f64 = 0.8;
pub const RIFF_FLASH_SECONDS: f64 = 0.15;
pub const CRASH_VELOCITY: f32 = 0.9;

const SHUFFLE_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

/// The scheduler's transport position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackCursor {
    pub song_index: usize,
    pub section_index: usize,
    pub repeat_count: u32,
    /// Engine time up to which audio has been handed to the engines.
    pub scheduled_until: f64,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DeferredAction {
    ApplySection { song: usize, section: usize },
    RiffFlash(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DeferredTask {
    due: f64,
    generation: u64,
    action: DeferredAction,
}

/// Fisher–Yates permutation of song indices, consumed front to back.
#[derive(Debug, Clone)]
pub struct ShuffleOrder {
    order: Vec<usize>,
    position: usize,
}

impl ShuffleOrder {
    /// New permutation of `0..len`. `first`, when given, is moved to the
    /// front so the song already playing counts as visited.
    fn build(len: usize, rng: &mut StdRng, first: Option<usize>) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(rng);
        if let Some(position) = first.and_then(|song| order.iter().position(|&i| i == song)) {
            order.swap(0, position);
        }
        Self { order, position: 0 }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn current(&self) -> usize {
        self.order[self.position]
    }

    /// Next song; a fresh permutation is drawn once every song has played,
    /// never starting with the song that just ended.
    fn advance(&mut self, rng: &mut StdRng) -> usize {
        self.position += 1;
        if self.position >= self.order.len() {
            let last = self.order.last().copied();
            *self = Self::build(self.order.len(), rng, None);
            let len = self.order.len();
            if len > 1 && self.order.first().copied() == last {
                self.order.swap(0, len - 1);
            }
        }
        self.current()
    }

    fn retreat(&mut self) -> usize {
        let len = self.order.len();
        self.position = (self.position + len - 1) % len;
        self.current()
    }
}

#[derive(Debug)]
pub struct Scheduler {
    score: Score,
    config: SchedulerConfig,
    state: TransportState,
    cursor: PlaybackCursor,
    deferred: Vec<DeferredTask>,
    shuffle: Option<ShuffleOrder>,
    rng: StdRng,
    humanizer: Humanizer,
    /// Pitch of the previous lead note, the origin of a slide. Zero after
    /// a rest.
    last_lead: f32,
}

impl Scheduler {
    pub fn new(score: Score, config: SchedulerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ SHUFFLE_SEED_SALT),
            None => StdRng::from_os_rng(),
        };
        Self {
            humanizer: Humanizer::new(config.seed),
            score,
            config,
            state: TransportState::Stopped,
            cursor: PlaybackCursor::default(),
            deferred: Vec::new(),
            shuffle: None,
            rng,
            last_lead: 0.0,
        }
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle.is_some()
    }

    pub fn shuffle_order(&self) -> Option<&ShuffleOrder> {
        self.shuffle.as_ref()
    }

    /// Song and section under the cursor.
    pub fn current(&self) -> Option<(&Song, &Section)> {
        let song = self.score.song(self.cursor.song_index)?;
        let section = song.sections.get(self.cursor.section_index)?;
        Some((song, section))
    }

    /// Starts from song 0. A restart while playing silences what the old
    /// cursor already handed to the engines.
    pub fn start(&mut self, now: f64, sink: &mut impl CommandSink) {
        if self.is_playing() {
            sink.submit(EngineCommand::MuteAll);
        }
        self.state = TransportState::Playing;
        self.cursor = PlaybackCursor {
            song_index: 0,
            section_index: 0,
            repeat_count: 0,
            scheduled_until: now + self.config.start_offset,
            generation: self.cursor.generation + 1,
        };
        self.deferred.clear();
        self.last_lead = 0.0;
        if self.shuffle.is_some() {
            self.shuffle = Some(ShuffleOrder::build(self.score.len(), &mut self.rng, Some(0)));
        }
        info!(songs = self.score.len(), "transport started");
        self.apply_section(0, 0, sink);
    }

    /// Stops scheduling. Audio already handed to the engines plays out.
    pub fn stop(&mut self) {
        if self.is_playing() {
            info!("transport stopped");
        }
        self.state = TransportState::Stopped;
        self.deferred.clear();
    }

    pub fn play_song(&mut self, index: usize, now: f64, sink: &mut impl CommandSink) -> Result<()> {
        if index >= self.score.len() {
            return Err(StonerizmError::InvalidInput("song index is out of range"));
        }
        if self.is_playing() {
            self.jump_to_song(index, now, sink);
        }
        Ok(())
    }

    pub fn next_song(&mut self, now: f64, sink: &mut impl CommandSink) {
        if !self.is_playing() {
            return;
        }
        let index = self.following_song();
        self.jump_to_song(index, now, sink);
    }

    pub fn prev_song(&mut self, now: f64, sink: &mut impl CommandSink) {
        if !self.is_playing() {
            return;
        }
        let len = self.score.len();
        let index = match &mut self.shuffle {
            Some(order) => order.retreat(),
            None => (self.cursor.song_index + len - 1) % len,
        };
        self.jump_to_song(index, now, sink);
    }

    /// Flips shuffle mode and returns the new setting. Works while stopped.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = match self.shuffle {
            Some(_) => None,
            None => Some(ShuffleOrder::build(
                self.score.len(),
                &mut self.rng,
                Some(self.cursor.song_index),
            )),
        };
        info!(enabled = self.shuffle.is_some(), "shuffle toggled");
        self.shuffle.is_some()
    }

    /// One control-rate step.
    pub fn tick(&mut self, now: f64, sink: &mut impl CommandSink) {
        if !self.is_playing() {
            return;
        }
        self.run_deferred(now, sink);

        if self.cursor.scheduled_until > now + self.config.look_ahead {
            return;
        }
        if self.cursor.scheduled_until < now {
            warn!(
                behind = now - self.cursor.scheduled_until,
                "tick arrived after the scheduled audio ran out"
            );
        }
        self.schedule_section(now, sink);
    }

    fn following_song(&mut self) -> usize {
        match &mut self.shuffle {
            Some(order) => order.advance(&mut self.rng),
            None => (self.cursor.song_index + 1) % self.score.len(),
        }
    }

    fn jump_to_song(&mut self, index: usize, now: f64, sink: &mut impl CommandSink) {
        self.cursor = PlaybackCursor {
            song_index: index,
            section_index: 0,
            repeat_count: 0,
            scheduled_until: now + self.config.jump_offset,
            generation: self.cursor.generation + 1,
        };
        self.last_lead = 0.0;
        sink.submit(EngineCommand::MuteAll);
        info!(song = index, generation = self.cursor.generation, "jumped to song");
        self.apply_section(index, 0, sink);
    }

    fn run_deferred(&mut self, now: f64, sink: &mut impl CommandSink) {
        let mut due: Vec<DeferredTask> = Vec::new();
        self.deferred.retain(|task| {
            if task.due <= now {
                due.push(*task);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due.total_cmp(&b.due));

        for task in due {
            match task.action {
                DeferredAction::ApplySection { song, section } => {
                    if task.generation == self.cursor.generation {
                        self.apply_section(song, section, sink);
                    } else {
                        debug!(song, section, generation = task.generation, "dropped stale section change");
                    }
                }
                DeferredAction::RiffFlash(on) => sink.submit(EngineCommand::RiffFlash(on)),
            }
        }
    }

    fn defer(&mut self, due: f64, action: DeferredAction) {
        self.deferred.push(DeferredTask {
            due,
            generation: self.cursor.generation,
            action,
        });
    }

    /// Tone, room, fades and status for a section, effective immediately.
    fn apply_section(&mut self, song_index: usize, section_index: usize, sink: &mut impl CommandSink) {
        let Some(song) = self.score.song(song_index) else {
            return;
        };
        let Some(section) = song.sections.get(section_index) else {
            return;
        };

        let plan = plan_section(song, section, section_index);
        sink.submit(EngineCommand::SetTone {
            part: Part::Lead,
            tone: plan.lead,
        });
        sink.submit(EngineCommand::SetTone {
            part: Part::Bass,
            tone: plan.bass,
        });
        sink.submit(EngineCommand::SetTone {
            part: Part::Pad,
            tone: plan.pad,
        });
        sink.submit(EngineCommand::SetTone {
            part: Part::Organ,
            tone: plan.organ,
        });
        sink.submit(EngineCommand::SetRoom(plan.room));
        sink.submit(EngineCommand::Fade {
            part: Part::Pad,
            fade: plan.pad_fade,
        });
        sink.submit(EngineCommand::Fade {
            part: Part::Organ,
            fade: plan.organ_fade,
        });
        sink.submit(EngineCommand::SectionChanged(SectionInfo {
            song: song.name.clone(),
            section: section.name.clone(),
            label: Some(plan.label),
            visual_mode: section.visual_mode,
            target_genre: plan.genre,
        }));

        info!(
            song = %song.name,
            section = %section.name,
            genre = plan.genre,
            label = %plan.label,
            "section applied"
        );
    }

    fn schedule_section(&mut self, now: f64, sink: &mut impl CommandSink) {
        let PlaybackCursor {
            song_index,
            section_index,
            ..
        } = self.cursor;
        let Some(section) = self.score.section(song_index, section_index).cloned() else {
            warn!(song_index, section_index, "cursor points outside the score");
            self.stop();
            return;
        };

        let start = self.cursor.scheduled_until;
        let beat = section.beat_seconds();
        let length = section.realized_seconds();

        self.schedule_lead(&section, start, beat, sink);
        let bass_onsets = schedule_bass(&section, start, beat, sink);

        let step = section.step_seconds();
        let steps = decode(&section.drums, length, step);
        for hit in self.humanizer.humanize(&steps, start, step, &bass_onsets) {
            sink.submit(EngineCommand::Hit {
                hit: hit.hit,
                time: hit.time,
                velocity: hit.velocity,
            });
        }

        schedule_space(&section, start, length, sink);

        self.defer(start, DeferredAction::RiffFlash(true));
        self.defer(start + RIFF_FLASH_SECONDS, DeferredAction::RiffFlash(false));

        self.cursor.scheduled_until = start + length;
        debug!(
            section = %section.name,
            start,
            length,
            ahead = start - now,
            drum_hits = steps.len(),
            "scheduled section"
        );
        self.advance_cursor(section.repeats, sink);
    }

    fn schedule_lead(&mut self, section: &Section, start: f64, beat: f64, sink: &mut impl CommandSink) {
        let mut at = start;
        for note in &section.guitar {
            let duration = note.duration * beat;
            if note.is_rest() {
                self.last_lead = 0.0;
            } else {
                let slide_from = (note.slide && self.last_lead > 0.0).then_some(self.last_lead);
                sink.submit(EngineCommand::Note {
                    part: Part::Lead,
                    pitch: Pitch::Single(note.frequency),
                    start: at,
                    duration: duration * LEAD_GATE,
                    articulation: Articulation {
                        palm_mute: note.palm_mute,
                        slide_from,
                        ..Articulation::default()
                    },
                });
                self.last_lead = note.frequency;
            }
            at += duration;
        }
    }

    fn advance_cursor(&mut self, repeats: u32, sink: &mut impl CommandSink) {
        self.cursor.repeat_count += 1;
        if self.cursor.repeat_count < repeats {
            return;
        }

        self.cursor.repeat_count = 0;
        self.cursor.section_index += 1;
        let sections = self
            .score
            .song(self.cursor.song_index)
            .map_or(0, |song| song.sections.len());
        if self.cursor.section_index >= sections {
            self.cursor.section_index = 0;
            self.cursor.song_index = self.following_song();
            info!(song = self.cursor.song_index, "advancing to next song");
        }

        let boundary = self.cursor.scheduled_until;
        sink.submit(EngineCommand::Hit {
            hit: DrumHit::Crash,
            time: boundary,
            velocity: CRASH_VELOCITY,
        });
        self.defer(
            boundary,
            DeferredAction::ApplySection {
                song: self.cursor.song_index,
                section: self.cursor.section_index,
            },
        );
    }
}

/// Returns the onset times of the sounding bass notes.
fn schedule_bass(section: &Section, start: f64, beat: f64, sink: &mut impl CommandSink) -> Vec<f64> {
    let mut onsets = Vec::with_capacity(section.bass.len());
    let mut at = start;
    for note in &section.bass {
        let duration = note.duration * beat;
        if !note.is_rest() {
            sink.submit(EngineCommand::Note {
                part: Part::Bass,
                pitch: Pitch::Single(note.frequency),
                start: at,
                duration,
                articulation: Articulation::default(),
            });
            onsets.push(at);
        }
        at += duration;
    }
    onsets
}

/// Pad, arp and organ parts. Pad and arp are gated on genre, the organ
/// plays whenever the section carries a chord for it.
fn schedule_space(section: &Section, start: f64, length: f64, sink: &mut impl CommandSink) {
    if let Some(chord) = section
        .pad_chord
        .as_ref()
        .filter(|_| section.genre > PAD_GENRE_THRESHOLD)
    {
        sink.submit(EngineCommand::Note {
            part: Part::Pad,
            pitch: Pitch::Chord(chord.clone()),
            start,
            duration: length,
            articulation: Articulation::default(),
        });
    }

    if let Some(line) = section
        .arp_line
        .as_ref()
        .filter(|line| !line.is_empty() && section.genre > ARP_GENRE_THRESHOLD)
    {
        let step = section.step_seconds();
        let mut index = 0;
        let mut at = start;
        while at < start + length {
            sink.submit(EngineCommand::Note {
                part: Part::Pad,
                pitch: Pitch::Single(line[index % line.len()]),
                start: at,
                duration: step * ARP_GATE,
                articulation: Articulation::default(),
            });
            index += 1;
            at = start + index as f64 * step;
        }
    }

    if let Some(organ) = &section.organ_chord {
        sink.submit(EngineCommand::Note {
            part: Part::Organ,
            pitch: Pitch::Chord(organ.frequencies.clone()),
            start,
            duration: length,
            articulation: Articulation {
                registration: Some((organ.drawbars, organ.leslie)),
                ..Articulation::default()
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Note, Song};

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            seed: Some(11),
            ..SchedulerConfig::default()
        }
    }

    fn song(name: &str, sections: usize) -> Song {
        let sections = (0..sections)
            .map(|i| {
                Section::new(format!("{name}-{i}"), 0.1, 60.0, 1)
                    .with_guitar(vec![Note::new(110.0, 2.0), Note::new(146.83, 2.0).sliding()])
                    .with_bass(vec![Note::new(55.0, 4.0)])
                    .with_drums("K---S---")
                    .unwrap()
            })
            .collect();
        Song::new(name, sections)
    }

    fn scheduler(songs: usize) -> Scheduler {
        let songs = (0..songs).map(|i| song(&format!("song{i}"), 2)).collect();
        Scheduler::new(Score::new(songs).unwrap(), config())
    }

    fn section_names(commands: &[EngineCommand]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|c| match c {
                EngineCommand::SectionChanged(info) => Some(info.section.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_applies_first_section_and_waits_for_the_window() {
        let mut scheduler = scheduler(1);
        let mut out = Vec::new();
        scheduler.start(0.0, &mut out);

        assert!(scheduler.is_playing());
        assert_eq!(scheduler.cursor().scheduled_until, 0.5);
        assert_eq!(section_names(&out), vec!["song0-0"]);
        assert!(!out.iter().any(|c| matches!(c, EngineCommand::Note { .. })));

        // 0.5 > 0.0 + 0.2: nothing is due yet.
        out.clear();
        scheduler.tick(0.0, &mut out);
        assert!(out.is_empty());

        scheduler.tick(0.3, &mut out);
        assert_eq!(scheduler.cursor().scheduled_until, 4.5);
        assert_eq!(scheduler.cursor().section_index, 1);
    }

    #[test]
    fn lead_notes_are_gated_and_slides_carry_the_previous_pitch() {
        let mut scheduler = scheduler(1);
        let mut out = Vec::new();
        scheduler.start(0.0, &mut out);
        out.clear();
        scheduler.tick(0.3, &mut out);

        let lead: Vec<(f64, f64, Option<f32>)> = out
            .iter()
            .filter_map(|c| match c {
                EngineCommand::Note {
                    part: Part::Lead,
                    start,
                    duration,
                    articulation,
                    ..
                } => Some((*start, *duration, articulation.slide_from)),
                _ => None,
            })
            .collect();
        assert_eq!(lead.len(), 2);
        assert!((lead[0].1 - 2.0 * LEAD_GATE).abs() < 1e-9);
        assert_eq!(lead[0].2, None);
        assert!((lead[1].0 - 2.5).abs() < 1e-9);
        assert_eq!(lead[1].2, Some(110.0));
    }

    #[test]
    fn section_change_crashes_and_defers_the_tone() {
        let mut scheduler = scheduler(1);
        let mut out = Vec::new();
        scheduler.start(0.0, &mut out);
        out.clear();
        scheduler.tick(0.3, &mut out);

        let crash = out.iter().any(|c| {
            matches!(c, EngineCommand::Hit { hit: DrumHit::Crash, time, velocity }
                if (*time - 4.5).abs() < 1e-9 && *velocity == CRASH_VELOCITY)
        });
        assert!(crash);
        assert!(section_names(&out).is_empty());

        out.clear();
        scheduler.tick(4.5, &mut out);
        assert_eq!(section_names(&out), vec!["song0-1"]);
    }

    #[test]
    fn jumps_bump_the_generation_and_drop_stale_section_changes() {
        let mut scheduler = scheduler(3);
        let mut out = Vec::new();
        scheduler.start(0.0, &mut out);
        scheduler.tick(0.3, &mut out);
        let before = scheduler.cursor().generation;

        out.clear();
        scheduler.next_song(1.0, &mut out);
        assert!(scheduler.cursor().generation > before);
        assert_eq!(out.first(), Some(&EngineCommand::MuteAll));
        assert_eq!(scheduler.cursor().song_index, 1);
        assert!((scheduler.cursor().scheduled_until - 1.3).abs() < 1e-9);

        // The old song's boundary at 4.5 must not switch sections, but the
        // new song's own schedule continues.
        out.clear();
        scheduler.tick(4.6, &mut out);
        assert!(!section_names(&out).contains(&"song0-1".to_string()));

        let mut generations = vec![scheduler.cursor().generation];
        scheduler.prev_song(5.0, &mut out);
        generations.push(scheduler.cursor().generation);
        scheduler.play_song(2, 5.5, &mut out).unwrap();
        generations.push(scheduler.cursor().generation);
        assert!(generations.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn song_changes_are_ignored_while_stopped() {
        let mut scheduler = scheduler(2);
        let mut out = Vec::new();
        scheduler.play_song(1, 0.0, &mut out).unwrap();
        scheduler.next_song(0.0, &mut out);
        assert!(out.is_empty());
        assert_eq!(scheduler.cursor().song_index, 0);

        assert!(matches!(
            scheduler.play_song(7, 0.0, &mut out),
            Err(StonerizmError::InvalidInput(_))
        ));
        // Shuffle toggles even while stopped.
        assert!(scheduler.toggle_shuffle());
        assert!(!scheduler.toggle_shuffle());
    }

    #[test]
    fn shuffle_visits_every_song_once() {
        let mut scheduler = scheduler(5);
        let mut out = Vec::new();
        scheduler.start(0.0, &mut out);
        scheduler.toggle_shuffle();

        let mut visited = vec![scheduler.cursor().song_index];
        for i in 0..4 {
            scheduler.next_song(i as f64, &mut out);
            visited.push(scheduler.cursor().song_index);
        }
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1, 2, 3, 4]);

        // A fresh permutation never repeats the song that just played.
        let last = scheduler.cursor().song_index;
        scheduler.next_song(10.0, &mut out);
        assert_ne!(scheduler.cursor().song_index, last);
    }

    #[test]
    fn restarting_while_playing_mutes_first() {
        let mut scheduler = scheduler(2);
        let mut out = Vec::new();
        scheduler.start(0.0, &mut out);
        assert!(!out.contains(&EngineCommand::MuteAll));
        scheduler.tick(0.3, &mut out);
        let before = scheduler.cursor().generation;

        out.clear();
        scheduler.start(1.0, &mut out);
        assert_eq!(out.first(), Some(&EngineCommand::MuteAll));
        assert!(scheduler.cursor().generation > before);
        assert!((scheduler.cursor().scheduled_until - 1.5).abs() < 1e-9);
        assert_eq!(section_names(&out), vec!["song0-0"]);
    }

    #[test]
    fn stop_halts_scheduling() {
        let mut scheduler = scheduler(1);
        let mut out = Vec::new();
        scheduler.start(0.0, &mut out);
        scheduler.stop();
        out.clear();
        scheduler.tick(0.4, &mut out);
        assert!(out.is_empty());
        assert_eq!(scheduler.state(), TransportState::Stopped);
    }
}
