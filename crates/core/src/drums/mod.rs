//! Drum pattern strings, the 16th-grid decoder and the humaniser that turns
//! decoded steps into timed, velocity-graded hits.

use std::fmt;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Result, StonerizmError};

/// Kick steps this close to a bass onset (in steps) get the lock boost.
pub const KICK_LOCK_WINDOW_STEPS: f64 = 1.5;
pub const KICK_LOCK_BOOST: f32 = 1.15;

const TIGHT_JITTER: f64 = 0.002;
const LOOSE_JITTER: f64 = 0.006;

/// One of the fixed one-shot recipes of the drum kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrumHit {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Ride,
    RideBell,
    TomHigh,
    TomMid,
    TomLow,
    Crash,
}

impl DrumHit {
    fn from_letter(letter: char) -> Option<Self> {
        let hit = match letter.to_ascii_uppercase() {
            'K' => DrumHit::Kick,
            'S' => DrumHit::Snare,
            'H' => DrumHit::ClosedHat,
            'O' => DrumHit::OpenHat,
            'R' => DrumHit::Ride,
            'B' => DrumHit::RideBell,
            'T' => DrumHit::TomHigh,
            'M' => DrumHit::TomMid,
            'L' => DrumHit::TomLow,
            'C' => DrumHit::Crash,
            _ => return None,
        };
        Some(hit)
    }

    fn letter(self) -> char {
        match self {
            DrumHit::Kick => 'K',
            DrumHit::Snare => 'S',
            DrumHit::ClosedHat => 'H',
            DrumHit::OpenHat => 'O',
            DrumHit::Ride => 'R',
            DrumHit::RideBell => 'B',
            DrumHit::TomHigh => 'T',
            DrumHit::TomMid => 'M',
            DrumHit::TomLow => 'L',
            DrumHit::Crash => 'C',
        }
    }

    /// Kick and snare carry the backbone and get tighter timing.
    pub fn is_backbone(self) -> bool {
        matches!(self, DrumHit::Kick | DrumHit::Snare)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PatternCell {
    hit: DrumHit,
    ghost: bool,
}

/// A validated drum pattern, one optional cell per 16th step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DrumPattern {
    cells: Vec<Option<PatternCell>>,
}

impl DrumPattern {
    /// Parses a pattern string. `|` bar separators and whitespace are
    /// ignored; any other character outside the alphabet is rejected.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut cells = Vec::with_capacity(pattern.len());
        for (column, ch) in pattern.chars().enumerate() {
            if ch == '|' || ch.is_whitespace() {
                continue;
            }
            if ch == '-' {
                cells.push(None);
                continue;
            }
            match DrumHit::from_letter(ch) {
                Some(hit) if ch.is_ascii_alphabetic() => cells.push(Some(PatternCell {
                    hit,
                    ghost: ch.is_ascii_lowercase(),
                })),
                _ => {
                    return Err(StonerizmError::InvalidPattern {
                        pattern: pattern.to_owned(),
                        found: ch,
                        column,
                    })
                }
            }
        }
        Ok(Self { cells })
    }

    /// Number of steps in one cycle.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl fmt::Display for DrumPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            let ch = match cell {
                None => '-',
                Some(PatternCell { hit, ghost: true }) => hit.letter().to_ascii_lowercase(),
                Some(PatternCell { hit, ghost: false }) => hit.letter(),
            };
            write!(f, "{ch}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for DrumPattern {
    type Error = StonerizmError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DrumPattern> for String {
    fn from(pattern: DrumPattern) -> Self {
        pattern.to_string()
    }
}

/// A non-silent step of the decoded grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumStep {
    pub step: usize,
    pub hit: DrumHit,
    pub ghost: bool,
}

/// Replays `pattern` cyclically over a section of `section_seconds`, one
/// cell per `step_seconds`.
pub fn decode(pattern: &DrumPattern, section_seconds: f64, step_seconds: f64) -> Vec<DrumStep> {
    if pattern.is_empty() || step_seconds <= 0.0 || section_seconds <= 0.0 {
        return Vec::new();
    }

    let total = (section_seconds / step_seconds).round() as usize;
    (0..total)
        .filter_map(|step| {
            pattern.cells[step % pattern.len()].map(|cell| DrumStep {
                step,
                hit: cell.hit,
                ghost: cell.ghost,
            })
        })
        .collect()
}

/// A decoded step placed on the engine clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedHit {
    pub time: f64,
    pub hit: DrumHit,
    pub velocity: f32,
}

/// Random velocity and timing variation for decoded steps.
#[derive(Debug)]
pub struct Humanizer {
    rng: StdRng,
}

impl Humanizer {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    pub fn velocity(&mut self, ghost: bool) -> f32 {
        if ghost {
            self.rng.random_range(0.25..0.40)
        } else {
            self.rng.random_range(0.80..=1.00)
        }
    }

    pub fn jitter(&mut self, hit: DrumHit) -> f64 {
        let spread = if hit.is_backbone() {
            TIGHT_JITTER
        } else {
            LOOSE_JITTER
        };
        self.rng.random_range(-spread..=spread)
    }

    /// Places decoded steps at absolute times starting at `section_start`.
    /// `bass_onsets` are absolute onset times of non-rest bass notes.
    pub fn humanize(
        &mut self,
        steps: &[DrumStep],
        section_start: f64,
        step_seconds: f64,
        bass_onsets: &[f64],
    ) -> Vec<TimedHit> {
        let lock_window = KICK_LOCK_WINDOW_STEPS * step_seconds;
        steps
            .iter()
            .map(|step| {
                let grid_time = section_start + step.step as f64 * step_seconds;
                let mut velocity = self.velocity(step.ghost);
                if step.hit == DrumHit::Kick
                    && bass_onsets
                        .iter()
                        .any(|onset| (onset - grid_time).abs() <= lock_window)
                {
                    velocity = (velocity * KICK_LOCK_BOOST).min(1.0);
                }
                let time = (grid_time + self.jitter(step.hit)).max(section_start);
                TimedHit {
                    time,
                    hit: step.hit,
                    velocity,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_kick_and_snare_on_the_grid() {
        let pattern = DrumPattern::parse("K---S---").unwrap();
        // 2 beats at 120 bpm.
        let steps = decode(&pattern, 1.0, 0.125);

        assert_eq!(
            steps,
            vec![
                DrumStep { step: 0, hit: DrumHit::Kick, ghost: false },
                DrumStep { step: 4, hit: DrumHit::Snare, ghost: false },
            ]
        );

        let mut humanizer = Humanizer::new(Some(3));
        for hit in humanizer.humanize(&steps, 0.0, 0.125, &[]) {
            assert!((0.80..=1.00).contains(&hit.velocity));
        }
    }

    #[test]
    fn pattern_cycles_until_section_is_covered() {
        let pattern = DrumPattern::parse("K-").unwrap();
        let steps = decode(&pattern, 1.0, 0.25);
        let kicks: Vec<usize> = steps.iter().map(|s| s.step).collect();
        assert_eq!(kicks, vec![0, 2]);
    }

    #[test]
    fn strips_bar_separators_and_keeps_case() {
        let pattern = DrumPattern::parse("K-h-|s-OC").unwrap();
        assert_eq!(pattern.len(), 8);
        assert_eq!(pattern.to_string(), "K-h-s-OC");

        let steps = decode(&pattern, 8.0, 1.0);
        assert!(steps[1].ghost && steps[1].hit == DrumHit::ClosedHat);
        assert!(!steps[3].ghost && steps[3].hit == DrumHit::OpenHat);
    }

    #[test]
    fn rejects_characters_outside_the_alphabet() {
        let err = DrumPattern::parse("K-X-").unwrap_err();
        match err {
            StonerizmError::InvalidPattern { found, column, .. } => {
                assert_eq!(found, 'X');
                assert_eq!(column, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(DrumPattern::parse("K-1-").is_err());
    }

    #[test]
    fn ghosts_are_always_quieter_than_accents() {
        let mut humanizer = Humanizer::new(Some(11));
        for _ in 0..1000 {
            let ghost = humanizer.velocity(true);
            let accent = humanizer.velocity(false);
            assert!((0.25..0.40).contains(&ghost));
            assert!(ghost < accent);
        }
    }

    #[test]
    fn jitter_is_tighter_on_the_backbone() {
        let mut humanizer = Humanizer::new(Some(5));
        for _ in 0..500 {
            assert!(humanizer.jitter(DrumHit::Snare).abs() <= TIGHT_JITTER);
            assert!(humanizer.jitter(DrumHit::Ride).abs() <= LOOSE_JITTER);
        }
    }

    #[test]
    fn hits_never_land_before_the_section() {
        let pattern = DrumPattern::parse("R").unwrap();
        let steps = decode(&pattern, 0.25, 0.25);
        let mut humanizer = Humanizer::new(Some(1));
        for _ in 0..200 {
            let hits = humanizer.humanize(&steps, 10.0, 0.25, &[]);
            assert!(hits[0].time >= 10.0);
        }
    }

    #[test]
    fn kicks_near_bass_onsets_are_boosted() {
        let pattern = DrumPattern::parse("k").unwrap();
        let steps = decode(&pattern, 0.25, 0.25);

        let mut plain = Humanizer::new(Some(9));
        let mut locked = Humanizer::new(Some(9));
        let free = plain.humanize(&steps, 0.0, 0.25, &[5.0])[0];
        let boosted = locked.humanize(&steps, 0.0, 0.25, &[0.3])[0];

        assert!((boosted.velocity - (free.velocity * KICK_LOCK_BOOST).min(1.0)).abs() < 1e-6);
        assert!(boosted.velocity > free.velocity);
    }
}
