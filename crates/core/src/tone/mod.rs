//! Genre axis to instrument tone.
//!
//! A section's style tag picks a fixed preset. Untagged sections sit on the
//! doom/space axis: below 0.3 they take the heavy preset, above 0.6 the
//! spacious one, and in between every parameter is blended linearly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dsp::{frame_corrected, ShaperCurve};
use crate::instruments::{
    bass::default_bass_tone, organ::default_organ_tone, pad::default_pad_tone, RoomState,
    ToneState,
};
use crate::score::{Section, Song, StyleTag};

pub const HEAVY_BELOW: f32 = 0.3;
pub const SPACIOUS_ABOVE: f32 = 0.6;
pub const PAD_GENRE_THRESHOLD: f32 = 0.2;
pub const ARP_GENRE_THRESHOLD: f32 = 0.5;
pub const PAD_FADE_SECONDS: f64 = 3.0;
pub const ORGAN_FADE_SECONDS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TonePreset {
    Heavy,
    Spacious,
    Fuzz,
    Sleep,
    OmClean,
}

impl TonePreset {
    pub fn lead(self) -> ToneState {
        let base = ToneState::default();
        match self {
            TonePreset::Heavy => ToneState {
                drive: 7.0,
                low_db: 4.0,
                mid_db: -2.0,
                high_db: -8.0,
                cabinet_hz: 4_000.0,
                delay_time: 0.45,
                delay_feedback: 0.18,
                delay_mix: 0.06,
                reverb_mix: 0.1,
                level: 0.16,
                ..base
            },
            TonePreset::Spacious => ToneState {
                drive: 3.0,
                second_drive: 1.0,
                low_db: 1.0,
                mid_db: 1.0,
                high_db: -3.0,
                cabinet_hz: 5_500.0,
                highpass_hz: 80.0,
                delay_time: 0.55,
                delay_feedback: 0.35,
                delay_mix: 0.18,
                reverb_mix: 0.2,
                level: 0.15,
                ..base
            },
            TonePreset::Fuzz => ToneState {
                curve: ShaperCurve::OctaveFuzz,
                drive: 8.0,
                second_drive: 4.0,
                low_db: 7.0,
                mid_db: -5.0,
                high_db: -6.0,
                presence_db: 5.0,
                cabinet_hz: 3_800.0,
                highpass_hz: 90.0,
                delay_time: 0.3,
                delay_feedback: 0.08,
                delay_mix: 0.03,
                reverb_mix: 0.08,
                level: 0.18,
            },
            TonePreset::Sleep => ToneState {
                drive: 9.0,
                second_drive: 5.0,
                low_db: 6.0,
                mid_db: 0.0,
                high_db: -10.0,
                presence_db: 1.0,
                cabinet_hz: 3_500.0,
                highpass_hz: 60.0,
                delay_time: 0.35,
                delay_feedback: 0.1,
                delay_mix: 0.03,
                reverb_mix: 0.06,
                level: 0.2,
                ..base
            },
            TonePreset::OmClean => ToneState {
                drive: 2.0,
                second_drive: 1.5,
                low_db: 2.0,
                mid_db: -1.0,
                high_db: -4.0,
                presence_db: 1.0,
                cabinet_hz: 5_000.0,
                highpass_hz: 80.0,
                delay_time: 0.55,
                delay_feedback: 0.3,
                delay_mix: 0.15,
                reverb_mix: 0.25,
                level: 0.08,
                ..base
            },
        }
    }

    pub fn bass(self) -> ToneState {
        let base = default_bass_tone();
        match self {
            TonePreset::Heavy => base,
            TonePreset::Spacious => ToneState {
                drive: 1.8,
                low_db: 4.0,
                mid_db: -2.0,
                cabinet_hz: 3_800.0,
                level: 0.2,
                ..base
            },
            TonePreset::Fuzz => ToneState {
                curve: ShaperCurve::FuzzBlend,
                drive: 3.0,
                low_db: 9.0,
                mid_db: -3.0,
                cabinet_hz: 2_800.0,
                level: 0.26,
                ..base
            },
            TonePreset::Sleep => ToneState {
                drive: 5.0,
                low_db: 8.0,
                mid_db: -6.0,
                cabinet_hz: 2_500.0,
                level: 0.28,
                ..base
            },
            // Om puts the bass up front under a clean guitar.
            TonePreset::OmClean => ToneState {
                drive: 4.0,
                low_db: 10.0,
                mid_db: -1.0,
                cabinet_hz: 3_500.0,
                level: 0.3,
                ..base
            },
        }
    }

    pub fn pad(self) -> ToneState {
        let base = default_pad_tone();
        match self {
            TonePreset::Spacious => ToneState {
                delay_feedback: 0.45,
                delay_mix: 0.28,
                ..base
            },
            TonePreset::OmClean => ToneState {
                delay_mix: 0.25,
                ..base
            },
            _ => ToneState {
                delay_feedback: 0.3,
                delay_mix: 0.12,
                ..base
            },
        }
    }

    pub fn organ(self) -> ToneState {
        let base = default_organ_tone();
        match self {
            TonePreset::Heavy | TonePreset::Fuzz | TonePreset::Sleep => ToneState {
                drive: 3.0,
                reverb_mix: 0.12,
                ..base
            },
            TonePreset::Spacious => ToneState {
                drive: 1.2,
                reverb_mix: 0.3,
                ..base
            },
            TonePreset::OmClean => base,
        }
    }

    pub fn room(self) -> RoomState {
        match self {
            TonePreset::Spacious => RoomState::SPACE,
            _ => RoomState::DOOM,
        }
    }
}

/// Display name of where the music currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenreLabel {
    StonerDoom,
    DoomRising,
    SpaceRock,
    Krautrock,
    FuzzDoom,
    Sleep,
    Om,
}

impl GenreLabel {
    pub fn for_section(style: Option<StyleTag>, genre: f32) -> Self {
        match style {
            Some(StyleTag::Fuzz) => GenreLabel::FuzzDoom,
            Some(StyleTag::Sleep) => GenreLabel::Sleep,
            Some(StyleTag::Om) => GenreLabel::Om,
            None if genre < 0.2 => GenreLabel::StonerDoom,
            None if genre < 0.5 => GenreLabel::DoomRising,
            None if genre < 0.75 => GenreLabel::SpaceRock,
            None => GenreLabel::Krautrock,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GenreLabel::StonerDoom => "STONER DOOM",
            GenreLabel::DoomRising => "DOOM RISING",
            GenreLabel::SpaceRock => "SPACE ROCK",
            GenreLabel::Krautrock => "KRAUTROCK",
            GenreLabel::FuzzDoom => "FUZZ DOOM",
            GenreLabel::Sleep => "SLEEP",
            GenreLabel::Om => "OM",
        }
    }
}

impl fmt::Display for GenreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a secondary engine's fader for the coming section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fade {
    In(f64),
    Out(f64),
}

/// Everything a section change does to the instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct TonePlan {
    pub genre: f32,
    /// `None` while blending between heavy and spacious.
    pub preset: Option<TonePreset>,
    pub lead: ToneState,
    pub bass: ToneState,
    pub pad: ToneState,
    pub organ: ToneState,
    pub room: RoomState,
    pub pad_fade: Fade,
    pub organ_fade: Fade,
    pub arp_enabled: bool,
    pub label: GenreLabel,
}

/// Fixed preset of a style tag; Sleep depends on the section position.
pub fn style_preset(style: StyleTag, section_index: usize) -> TonePreset {
    match style {
        StyleTag::Fuzz => TonePreset::Fuzz,
        // Sleep alternates its wall of fuzz with octave fuzz.
        StyleTag::Sleep if section_index % 2 == 1 => TonePreset::Fuzz,
        StyleTag::Sleep => TonePreset::Sleep,
        StyleTag::Om => TonePreset::OmClean,
    }
}

/// Works out the tone plan for section `section_index` of `song`.
pub fn plan_section(song: &Song, section: &Section, section_index: usize) -> TonePlan {
    let genre = section.genre.clamp(0.0, 1.0);
    let style = section.effective_style(song);

    let (preset, lead, bass, pad, organ, room) = match style {
        Some(style) => {
            let preset = style_preset(style, section_index);
            (
                Some(preset),
                preset.lead(),
                preset.bass(),
                preset.pad(),
                preset.organ(),
                preset.room(),
            )
        }
        None if genre < HEAVY_BELOW => preset_parts(TonePreset::Heavy),
        None if genre > SPACIOUS_ABOVE => preset_parts(TonePreset::Spacious),
        None => {
            let t = (genre - HEAVY_BELOW) / (SPACIOUS_ABOVE - HEAVY_BELOW);
            let (heavy, space) = (TonePreset::Heavy, TonePreset::Spacious);
            (
                None,
                heavy.lead().lerp(&space.lead(), t),
                heavy.bass().lerp(&space.bass(), t),
                heavy.pad().lerp(&space.pad(), t),
                heavy.organ().lerp(&space.organ(), t),
                heavy.room().lerp(&space.room(), t),
            )
        }
    };

    // The arp plays through the pad engine, so the fader follows genre alone.
    let pad_fade = if genre > PAD_GENRE_THRESHOLD {
        Fade::In(PAD_FADE_SECONDS)
    } else {
        Fade::Out(PAD_FADE_SECONDS)
    };
    let organ_fade = if section.organ_chord.is_some() {
        Fade::In(ORGAN_FADE_SECONDS)
    } else {
        Fade::Out(ORGAN_FADE_SECONDS)
    };

    TonePlan {
        genre,
        preset,
        lead,
        bass,
        pad,
        organ,
        room,
        pad_fade,
        organ_fade,
        arp_enabled: genre > ARP_GENRE_THRESHOLD,
        label: GenreLabel::for_section(style, genre),
    }
}

type PresetParts = (
    Option<TonePreset>,
    ToneState,
    ToneState,
    ToneState,
    ToneState,
    RoomState,
);

fn preset_parts(preset: TonePreset) -> PresetParts {
    (
        Some(preset),
        preset.lead(),
        preset.bass(),
        preset.pad(),
        preset.organ(),
        preset.room(),
    )
}

/// First-order glide of the displayed genre toward the section's target.
#[derive(Debug, Clone)]
pub struct GenreSmoother {
    value: f32,
    coefficient: f32,
    reference_rate: f32,
}

impl GenreSmoother {
    /// `coefficient` is the fraction of the remaining distance covered per
    /// frame at `reference_rate` frames per second.
    pub fn new(coefficient: f32, reference_rate: f32) -> Self {
        Self {
            value: 0.0,
            coefficient,
            reference_rate,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Advances by a frame of `dt` seconds and returns the new value. Never
    /// overshoots `target`.
    pub fn step(&mut self, target: f32, dt: f32) -> f32 {
        let k = frame_corrected(self.coefficient, dt, self.reference_rate);
        let next = self.value + (target - self.value) * k;
        self.value = if target >= self.value {
            next.min(target)
        } else {
            next.max(target)
        };
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Note, OrganChord};

    fn section(genre: f32) -> Section {
        Section::new("riff", genre, 60.0, 1).with_guitar(vec![Note::new(110.0, 4.0)])
    }

    #[test]
    fn genre_ranges_pick_presets() {
        let song = Song::new("song", vec![section(0.1)]);
        let heavy = plan_section(&song, &section(0.1), 0);
        assert_eq!(heavy.preset, Some(TonePreset::Heavy));
        assert_eq!(heavy.lead, TonePreset::Heavy.lead());
        assert_eq!(heavy.label, GenreLabel::StonerDoom);

        let space = plan_section(&song, &section(0.9), 0);
        assert_eq!(space.preset, Some(TonePreset::Spacious));
        assert_eq!(space.room, RoomState::SPACE);
        assert_eq!(space.label, GenreLabel::Krautrock);
    }

    #[test]
    fn middle_genres_blend() {
        let song = Song::new("song", vec![section(0.45)]);
        let plan = plan_section(&song, &section(0.45), 0);
        assert_eq!(plan.preset, None);

        let heavy = TonePreset::Heavy.lead();
        let space = TonePreset::Spacious.lead();
        let expected = (heavy.delay_mix + space.delay_mix) / 2.0;
        assert!((plan.lead.delay_mix - expected).abs() < 1e-5);
        assert_eq!(plan.label, GenreLabel::DoomRising);
    }

    #[test]
    fn style_tags_override_genre() {
        let sleep = Song::new("sleep", vec![section(0.9), section(0.9)]).with_style(StyleTag::Sleep);
        let first = plan_section(&sleep, &sleep.sections[0], 0);
        let second = plan_section(&sleep, &sleep.sections[1], 1);
        assert_eq!(first.preset, Some(TonePreset::Sleep));
        assert_eq!(second.preset, Some(TonePreset::Fuzz));
        assert_eq!(first.room, RoomState::DOOM);
        assert_eq!(first.label, GenreLabel::Sleep);

        let song = Song::new("song", vec![section(0.1)]);
        let om = section(0.1).with_style(StyleTag::Om);
        assert_eq!(plan_section(&song, &om, 0).preset, Some(TonePreset::OmClean));
    }

    #[test]
    fn secondary_engines_are_gated_by_genre() {
        let song = Song::new("song", vec![section(0.1)]);
        let low = section(0.1).with_pad(vec![110.0]);
        let plan = plan_section(&song, &low, 0);
        assert_eq!(plan.pad_fade, Fade::Out(PAD_FADE_SECONDS));
        assert!(!plan.arp_enabled);

        let high = section(0.7)
            .with_pad(vec![110.0])
            .with_organ(OrganChord::new(vec![110.0], Default::default(), Default::default()));
        let plan = plan_section(&song, &high, 0);
        assert_eq!(plan.pad_fade, Fade::In(PAD_FADE_SECONDS));
        assert_eq!(plan.organ_fade, Fade::In(ORGAN_FADE_SECONDS));
        assert!(plan.arp_enabled);

        // The organ needs a chord; the pad opens on genre alone.
        let bare = plan_section(&song, &section(0.7), 0);
        assert_eq!(bare.pad_fade, Fade::In(PAD_FADE_SECONDS));
        assert_eq!(bare.organ_fade, Fade::Out(ORGAN_FADE_SECONDS));
    }

    #[test]
    fn arp_only_section_opens_the_pad_engine() {
        let song = Song::new("song", vec![section(0.1)]);
        let arp = section(0.9).with_arp(vec![440.0, 660.0]);
        let plan = plan_section(&song, &arp, 0);
        assert!(plan.arp_enabled);
        assert_eq!(plan.pad_fade, Fade::In(PAD_FADE_SECONDS));
    }

    #[test]
    fn smoother_converges_without_overshoot() {
        let mut smoother = GenreSmoother::new(0.02, 60.0);
        let mut previous = smoother.value();
        for _ in 0..600 {
            let value = smoother.step(0.8, 1.0 / 60.0);
            assert!(value >= previous && value <= 0.8);
            previous = value;
        }
        assert!((0.8 - previous) < 0.01);
    }

    #[test]
    fn step_from_zero_to_one_never_passes_one() {
        for dt in [1.0 / 60.0, 0.25, 1.0, 5.0] {
            let mut smoother = GenreSmoother::new(0.02, 60.0);
            let mut previous = smoother.value();
            for _ in 0..2_000 {
                let value = smoother.step(1.0, dt);
                assert!(value >= previous, "dt {dt}: {value} < {previous}");
                assert!(value <= 1.0, "dt {dt}: {value}");
                previous = value;
            }
            assert!(1.0 - previous < 1e-3, "dt {dt}: settled at {previous}");
        }

        let mut smoother = GenreSmoother::new(0.02, 60.0);
        smoother.step(1.0, 10.0);
        let mut previous = smoother.value();
        for _ in 0..600 {
            let value = smoother.step(0.0, 1.0);
            assert!(value <= previous && value >= 0.0);
            previous = value;
        }
    }

    #[test]
    fn smoother_is_frame_rate_independent() {
        let mut fast = GenreSmoother::new(0.02, 60.0);
        let mut slow = GenreSmoother::new(0.02, 60.0);
        for _ in 0..120 {
            fast.step(1.0, 1.0 / 120.0);
        }
        for _ in 0..30 {
            slow.step(1.0, 1.0 / 30.0);
        }
        assert!((fast.value() - slow.value()).abs() < 1e-3);
    }
}
