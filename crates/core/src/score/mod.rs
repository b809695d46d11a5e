//! Declarative score: songs made of sections, each section carrying its own
//! tempo, genre position and instrument parts.
//!
//! Scores are validated once, when [`Score::new`] runs. Everything downstream
//! (scheduler, decoder, instruments) assumes validated data and never
//! re-checks it.

pub mod library;

use serde::{Deserialize, Serialize};

use crate::{drums::DrumPattern, Result, StonerizmError};

/// Named sound character that overrides the genre-derived tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTag {
    /// Octave fuzz wall on guitar and bass.
    Fuzz,
    /// Wall-of-fuzz that alternates with octave fuzz between sections.
    Sleep,
    /// Nearly clean guitar under a driven, bass-heavy lead bass.
    Om,
}

/// Scene selector forwarded untouched to the visual renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualMode {
    #[default]
    Abyss,
    Smoke,
    Nebula,
    Warp,
}

impl VisualMode {
    pub fn index(self) -> u8 {
        match self {
            VisualMode::Abyss => 0,
            VisualMode::Smoke => 1,
            VisualMode::Nebula => 2,
            VisualMode::Warp => 3,
        }
    }
}

/// A single melodic event. Durations are in beats, so the same line plays
/// correctly at any section tempo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Fundamental in Hz; `0.0` is a rest.
    pub frequency: f32,
    pub duration: f64,
    #[serde(default)]
    pub palm_mute: bool,
    #[serde(default)]
    pub slide: bool,
}

impl Note {
    pub const fn new(frequency: f32, duration: f64) -> Self {
        Self {
            frequency,
            duration,
            palm_mute: false,
            slide: false,
        }
    }

    pub const fn rest(duration: f64) -> Self {
        Self::new(0.0, duration)
    }

    pub const fn palm_muted(mut self) -> Self {
        self.palm_mute = true;
        self
    }

    pub const fn sliding(mut self) -> Self {
        self.slide = true;
        self
    }

    pub fn is_rest(&self) -> bool {
        self.frequency <= 0.0
    }
}

/// Drawbar registration for the organ, one level (0..=8) per footage:
/// 16', 5⅓', 8', 4', 2⅔', 2', 1⅗', 1⅓', 1'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawbarPreset {
    #[default]
    Rock,
    Full,
    Mellow,
    Gospel,
}

impl DrawbarPreset {
    pub fn levels(self) -> [u8; 9] {
        match self {
            DrawbarPreset::Rock => [8, 8, 8, 8, 0, 0, 0, 0, 0],
            DrawbarPreset::Full => [8, 8, 8, 8, 8, 8, 8, 8, 8],
            DrawbarPreset::Mellow => [0, 0, 8, 4, 0, 0, 0, 0, 0],
            DrawbarPreset::Gospel => [8, 8, 8, 0, 0, 0, 0, 0, 8],
        }
    }
}

/// Rotor speed of the rotating speaker simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeslieSpeed {
    Brake,
    #[default]
    Chorale,
    Tremolo,
}

impl LeslieSpeed {
    pub fn rate_hz(self) -> f32 {
        match self {
            LeslieSpeed::Brake => 0.0,
            LeslieSpeed::Chorale => 0.8,
            LeslieSpeed::Tremolo => 6.7,
        }
    }
}

/// Sustained organ chord held for a whole section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganChord {
    pub frequencies: Vec<f32>,
    #[serde(default)]
    pub drawbars: DrawbarPreset,
    #[serde(default)]
    pub leslie: LeslieSpeed,
}

impl OrganChord {
    pub fn new(frequencies: Vec<f32>, drawbars: DrawbarPreset, leslie: LeslieSpeed) -> Self {
        Self {
            frequencies,
            drawbars,
            leslie,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub genre: f32,
    pub bpm: f64,
    pub repeats: u32,
    #[serde(default)]
    pub visual_mode: VisualMode,
    #[serde(default)]
    pub style: Option<StyleTag>,
    #[serde(default)]
    pub guitar: Vec<Note>,
    #[serde(default)]
    pub bass: Vec<Note>,
    #[serde(default)]
    pub drums: DrumPattern,
    #[serde(default)]
    pub pad_chord: Option<Vec<f32>>,
    #[serde(default)]
    pub arp_line: Option<Vec<f32>>,
    #[serde(default)]
    pub organ_chord: Option<OrganChord>,
}

impl Section {
    pub fn new(name: impl Into<String>, genre: f32, bpm: f64, repeats: u32) -> Self {
        Self {
            name: name.into(),
            genre,
            bpm,
            repeats,
            visual_mode: VisualMode::default(),
            style: None,
            guitar: Vec::new(),
            bass: Vec::new(),
            drums: DrumPattern::default(),
            pad_chord: None,
            arp_line: None,
            organ_chord: None,
        }
    }

    pub fn with_visual(mut self, mode: VisualMode) -> Self {
        self.visual_mode = mode;
        self
    }

    pub fn with_style(mut self, style: StyleTag) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_guitar(mut self, notes: Vec<Note>) -> Self {
        self.guitar = notes;
        self
    }

    pub fn with_bass(mut self, notes: Vec<Note>) -> Self {
        self.bass = notes;
        self
    }

    /// Parses and attaches a drum pattern string.
    pub fn with_drums(mut self, pattern: &str) -> Result<Self> {
        self.drums = DrumPattern::parse(pattern)?;
        Ok(self)
    }

    pub fn with_pad(mut self, chord: Vec<f32>) -> Self {
        self.pad_chord = Some(chord);
        self
    }

    pub fn with_arp(mut self, line: Vec<f32>) -> Self {
        self.arp_line = Some(line);
        self
    }

    pub fn with_organ(mut self, chord: OrganChord) -> Self {
        self.organ_chord = Some(chord);
        self
    }

    /// Seconds per beat at this section's tempo.
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Seconds per 16th-note step, the drum grid.
    pub fn step_seconds(&self) -> f64 {
        self.beat_seconds() * 0.25
    }

    /// Length of the longest melodic line in beats.
    pub fn realized_beats(&self) -> f64 {
        line_beats(&self.guitar).max(line_beats(&self.bass))
    }

    /// Wall-clock length of one pass through the section.
    pub fn realized_seconds(&self) -> f64 {
        self.realized_beats() * self.beat_seconds()
    }

    /// The section's own style tag wins over the song-wide one.
    pub fn effective_style(&self, song: &Song) -> Option<StyleTag> {
        self.style.or(song.style)
    }
}

pub(crate) fn line_beats(notes: &[Note]) -> f64 {
    notes.iter().map(|note| note.duration).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub name: String,
    #[serde(default)]
    pub style: Option<StyleTag>,
    pub sections: Vec<Section>,
}

impl Song {
    pub fn new(name: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            name: name.into(),
            style: None,
            sections,
        }
    }

    pub fn with_style(mut self, style: StyleTag) -> Self {
        self.style = Some(style);
        self
    }
}

/// A validated, immutable song table.
#[derive(Debug, Clone)]
pub struct Score {
    songs: Vec<Song>,
}

impl Score {
    /// Validates every song and section. Any malformed value rejects the
    /// whole score so playback never starts on partially corrupt data.
    pub fn new(songs: Vec<Song>) -> Result<Self> {
        if songs.is_empty() {
            return Err(StonerizmError::score("score", "contains no songs"));
        }

        for (index, song) in songs.iter().enumerate() {
            validate_song(index, song)?;
        }

        Ok(Self { songs })
    }

    /// Deserialises a JSON array of songs and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let songs: Vec<Song> = serde_json::from_str(json)?;
        Self::new(songs)
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn song(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    pub fn section(&self, song: usize, section: usize) -> Option<&Section> {
        self.song(song).and_then(|song| song.sections.get(section))
    }
}

fn validate_song(index: usize, song: &Song) -> Result<()> {
    let location = format!("song {index} `{}`", song.name);
    if song.sections.is_empty() {
        return Err(StonerizmError::score(location, "has no sections"));
    }

    for (section_index, section) in song.sections.iter().enumerate() {
        let location = format!("{location} / section {section_index} `{}`", section.name);
        validate_section(&location, section)?;
    }

    Ok(())
}

fn validate_section(location: &str, section: &Section) -> Result<()> {
    if !section.genre.is_finite() || !(0.0..=1.0).contains(&section.genre) {
        return Err(StonerizmError::score(
            location,
            format!("genre {} is outside [0, 1]", section.genre),
        ));
    }
    if !section.bpm.is_finite() || section.bpm <= 0.0 {
        return Err(StonerizmError::score(
            location,
            format!("bpm {} must be positive", section.bpm),
        ));
    }
    if section.repeats == 0 {
        return Err(StonerizmError::score(location, "repeats must be at least 1"));
    }

    validate_line(location, "guitar", &section.guitar)?;
    validate_line(location, "bass", &section.bass)?;

    if section.realized_beats() <= 0.0 {
        return Err(StonerizmError::score(
            location,
            "needs a guitar or bass line to define its length",
        ));
    }

    if let Some(chord) = &section.pad_chord {
        validate_pitches(location, "pad chord", chord)?;
    }
    if let Some(line) = &section.arp_line {
        validate_pitches(location, "arp line", line)?;
    }
    if let Some(organ) = &section.organ_chord {
        validate_pitches(location, "organ chord", &organ.frequencies)?;
    }

    Ok(())
}

fn validate_line(location: &str, part: &str, notes: &[Note]) -> Result<()> {
    for (index, note) in notes.iter().enumerate() {
        if !note.duration.is_finite() || note.duration <= 0.0 {
            return Err(StonerizmError::score(
                location,
                format!("{part} note {index} has non-positive duration {}", note.duration),
            ));
        }
        if !note.frequency.is_finite() || note.frequency < 0.0 {
            return Err(StonerizmError::score(
                location,
                format!("{part} note {index} has invalid frequency {}", note.frequency),
            ));
        }
    }
    Ok(())
}

fn validate_pitches(location: &str, part: &str, pitches: &[f32]) -> Result<()> {
    if pitches.is_empty() {
        return Err(StonerizmError::score(location, format!("{part} is empty")));
    }
    if let Some(bad) = pitches.iter().find(|f| !f.is_finite() || **f <= 0.0) {
        return Err(StonerizmError::score(
            location,
            format!("{part} contains invalid frequency {bad}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> Section {
        Section::new("TEST", 0.5, 120.0, 1)
            .with_guitar(vec![Note::new(100.0, 2.0), Note::rest(1.0)])
            .with_bass(vec![Note::new(50.0, 4.0)])
    }

    #[test]
    fn realized_duration_is_longest_line() {
        let section = section();
        assert_eq!(section.realized_beats(), 4.0);
        assert!((section.realized_seconds() - 2.0).abs() < 1e-9);
        assert!((section.step_seconds() - 0.125).abs() < 1e-9);
    }

    #[test]
    fn accepts_valid_score() {
        let score = Score::new(vec![Song::new("A", vec![section()])]).unwrap();
        assert_eq!(score.len(), 1);
        assert!(score.section(0, 0).is_some());
        assert!(score.section(0, 1).is_none());
    }

    #[test]
    fn rejects_zero_length_rest() {
        let bad = section().with_guitar(vec![Note::rest(0.0)]);
        let err = Score::new(vec![Song::new("A", vec![bad])]).unwrap_err();
        assert!(format!("{err}").contains("non-positive duration"));
    }

    #[test]
    fn rejects_out_of_range_genre_and_repeats() {
        let mut bad = section();
        bad.genre = 1.5;
        assert!(Score::new(vec![Song::new("A", vec![bad])]).is_err());

        let mut bad = section();
        bad.repeats = 0;
        let err = Score::new(vec![Song::new("A", vec![bad])]).unwrap_err();
        assert!(format!("{err}").contains("repeats"));
    }

    #[test]
    fn rejects_section_without_melody() {
        let bad = Section::new("EMPTY", 0.0, 60.0, 1);
        let err = Score::new(vec![Song::new("A", vec![bad])]).unwrap_err();
        assert!(format!("{err}").contains("EMPTY"));
    }

    #[test]
    fn rejects_empty_song_table_and_empty_chords() {
        assert!(Score::new(Vec::new()).is_err());
        let bad = section().with_pad(Vec::new());
        assert!(Score::new(vec![Song::new("A", vec![bad])]).is_err());
    }

    #[test]
    fn section_style_overrides_song_style() {
        let song = Song::new("A", vec![section()]).with_style(StyleTag::Om);
        assert_eq!(song.sections[0].effective_style(&song), Some(StyleTag::Om));
        let fuzz = section().with_style(StyleTag::Fuzz);
        assert_eq!(fuzz.effective_style(&song), Some(StyleTag::Fuzz));
    }

    #[test]
    fn loads_score_from_json() {
        let json = r#"[{
            "name": "JSON SONG",
            "style": "fuzz",
            "sections": [{
                "name": "ONLY",
                "genre": 0.2,
                "bpm": 60,
                "repeats": 2,
                "guitar": [{ "frequency": 73.42, "duration": 4, "palm_mute": true }],
                "drums": "K---|s---",
                "organ_chord": { "frequencies": [146.83, 220.0], "leslie": "tremolo" }
            }]
        }]"#;

        let score = Score::from_json_str(json).unwrap();
        let section = score.section(0, 0).unwrap();
        assert!(section.guitar[0].palm_mute);
        assert_eq!(section.drums.len(), 8);
        assert_eq!(
            section.organ_chord.as_ref().unwrap().leslie,
            LeslieSpeed::Tremolo
        );
    }

    #[test]
    fn json_with_bad_pattern_fails_at_load() {
        let json = r#"[{ "name": "X", "sections": [{
            "name": "S", "genre": 0.0, "bpm": 60, "repeats": 1,
            "guitar": [{ "frequency": 50.0, "duration": 1 }],
            "drums": "K-X-"
        }]}]"#;
        assert!(Score::from_json_str(json).is_err());
    }

    #[test]
    fn builtin_library_validates() {
        let score = library::builtin().unwrap();
        assert!(score.len() >= 4);
    }
}
