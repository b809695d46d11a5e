//! Built-in song table, tuned to drop D.

use super::{
    DrawbarPreset, LeslieSpeed, Note, OrganChord, Score, Section, Song, StyleTag, VisualMode,
};
use crate::Result;

/// Equal-tempered pitches in Hz.
pub mod pitch {
    pub const D1: f32 = 36.71;
    pub const EB1: f32 = 38.89;
    pub const E1: f32 = 41.20;
    pub const F1: f32 = 43.65;
    pub const G1: f32 = 49.00;
    pub const A1: f32 = 55.00;
    pub const BB1: f32 = 58.27;
    pub const B1: f32 = 61.74;
    pub const D2: f32 = 73.42;
    pub const E2: f32 = 82.41;
    pub const F2: f32 = 87.31;
    pub const G2: f32 = 98.00;
    pub const A2: f32 = 110.00;
    pub const BB2: f32 = 116.54;
    pub const B2: f32 = 123.47;
    pub const D3: f32 = 146.83;
    pub const E3: f32 = 164.81;
    pub const F3: f32 = 174.61;
    pub const G3: f32 = 196.00;
    pub const A3: f32 = 220.00;
    pub const BB3: f32 = 233.08;
    pub const B3: f32 = 246.94;
    pub const D4: f32 = 293.66;
    pub const E4: f32 = 329.63;
    pub const F4: f32 = 349.23;
    pub const G4: f32 = 392.00;
    pub const A4: f32 = 440.00;
    pub const BB4: f32 = 466.16;
    pub const B4: f32 = 493.88;
    pub const D5: f32 = 587.33;
    pub const E5: f32 = 659.26;
    pub const G5: f32 = 783.99;
    pub const A5: f32 = 880.00;
    pub const B5: f32 = 987.77;
}

use pitch::*;

fn n(frequency: f32, beats: f64) -> Note {
    Note::new(frequency, beats)
}

fn r(beats: f64) -> Note {
    Note::rest(beats)
}

/// The full built-in score, validated.
pub fn builtin() -> Result<Score> {
    Score::new(vec![
        monolith_rising()?,
        void_traveler()?,
        dopesmoker()?,
        advaitic_songs()?,
        tar_pit()?,
    ])
}

fn monolith_rising() -> Result<Song> {
    Ok(Song::new(
        "MONOLITH RISING",
        vec![
            Section::new("DOOM AWAKENS", 0.0, 56.0, 3)
                .with_guitar(vec![
                    n(D1, 4.0).palm_muted(),
                    r(1.0),
                    n(D1, 2.0).palm_muted(),
                    n(EB1, 2.0).sliding(),
                    n(D1, 4.0),
                    r(1.0),
                    n(A1, 2.0),
                    n(G1, 2.0).sliding(),
                ])
                .with_bass(vec![
                    n(D1, 4.0),
                    r(1.0),
                    n(D1, 3.0),
                    n(D1, 4.0),
                    r(1.0),
                    n(A1, 2.0),
                    n(G1, 1.0),
                ])
                .with_drums("K---S---K-K-S---|K---S---K-K-S-OH")?,
            Section::new("MAMMOTH MARCH", 0.1, 58.0, 3)
                .with_visual(VisualMode::Smoke)
                .with_style(StyleTag::Fuzz)
                .with_guitar(vec![
                    n(D1, 3.0),
                    n(F1, 1.0),
                    n(G1, 2.0),
                    n(D1, 2.0),
                    n(BB1, 3.0),
                    n(A1, 1.0),
                    n(G1, 2.0),
                    n(F1, 1.0),
                    n(D1, 1.0),
                ])
                .with_bass(vec![
                    n(D1, 3.0),
                    n(F1, 1.0),
                    n(G1, 2.0),
                    n(D1, 2.0),
                    n(BB1, 3.0),
                    n(A1, 1.0),
                    n(G1, 2.0),
                    n(F1, 2.0),
                ])
                .with_drums("K--K--S-K--Kh-S-|K--K--S-K--KT-TL")?,
            Section::new("ASCENDING", 0.35, 62.0, 3)
                .with_visual(VisualMode::Nebula)
                .with_guitar(vec![
                    n(D2, 2.0),
                    n(F2, 2.0),
                    n(G2, 2.0),
                    n(A2, 2.0),
                    n(BB2, 3.0),
                    n(A2, 1.0),
                    n(G2, 2.0),
                    n(F2, 1.0),
                    n(D2, 1.0),
                ])
                .with_bass(vec![n(D1, 4.0), n(G1, 4.0), n(BB1, 4.0), n(A1, 2.0), n(D1, 2.0)])
                .with_drums("K-H-S-HhK-H-S-Hh|K-H-S-H-K-H-SOH-")?
                .with_pad(vec![D3, F3, A3]),
            Section::new("COSMIC DRIFT", 0.7, 82.0, 4)
                .with_visual(VisualMode::Warp)
                .with_guitar(vec![
                    n(D3, 2.0),
                    n(G3, 1.0),
                    n(A3, 1.0),
                    n(BB3, 2.0),
                    n(A3, 1.0),
                    n(G3, 1.0),
                    n(F3, 2.0),
                    n(D3, 2.0),
                    n(E3, 2.0),
                    n(F3, 1.0),
                    n(G3, 1.0),
                ])
                .with_bass(vec![
                    n(D2, 2.0),
                    n(G2, 2.0),
                    n(BB2, 2.0),
                    n(A2, 2.0),
                    n(F2, 2.0),
                    n(D2, 2.0),
                    n(E2, 2.0),
                    n(G2, 2.0),
                ])
                .with_drums("K-R-S-RrK-R-S-R-|K-R-S-R-K-R-S-RB")?
                .with_pad(vec![D4, G4, BB4])
                .with_arp(vec![D4, F4, G4, A4, BB4, A4, G4, F4]),
            Section::new("LEVIATHAN DIRGE", 0.0, 50.0, 2)
                .with_style(StyleTag::Fuzz)
                .with_guitar(vec![
                    n(D1, 6.0),
                    n(EB1, 2.0).sliding(),
                    n(D1, 4.0),
                    r(2.0),
                    n(G1, 3.0),
                    n(F1, 1.0),
                    n(D1, 4.0),
                    r(2.0),
                ])
                .with_bass(vec![
                    n(D1, 6.0),
                    n(EB1, 2.0),
                    n(D1, 6.0),
                    r(2.0),
                    n(G1, 3.0),
                    n(F1, 1.0),
                    n(D1, 4.0),
                    r(2.0),
                ])
                .with_drums("K-------S-------|K-------S---T-TL")?,
        ],
    ))
}

fn void_traveler() -> Result<Song> {
    Ok(Song::new(
        "VOID TRAVELER",
        vec![
            Section::new("STAR BIRTH", 0.85, 78.0, 3)
                .with_visual(VisualMode::Warp)
                .with_guitar(vec![
                    n(E3, 2.0),
                    n(G3, 1.0),
                    n(A3, 1.0),
                    n(B3, 2.0),
                    n(A3, 1.0),
                    n(G3, 1.0),
                    n(E3, 2.0),
                    n(D3, 2.0),
                    n(E3, 2.0),
                    n(G3, 2.0),
                ])
                .with_bass(vec![n(E2, 4.0), n(B2, 4.0), n(E2, 2.0), n(D2, 2.0), n(E2, 2.0), n(G2, 2.0)])
                .with_drums("K-R-S-RrK-R-S-R-|K-RBS-R-K-R-SOH-")?
                .with_pad(vec![E3, G3, B3, D4])
                .with_arp(vec![E4, G4, B4, D5, E5, D5, B4, G4])
                .with_organ(OrganChord::new(
                    vec![E3, B3, E4],
                    DrawbarPreset::Mellow,
                    LeslieSpeed::Chorale,
                )),
            Section::new("GRAVITY WELL", 0.5, 66.0, 3)
                .with_visual(VisualMode::Nebula)
                .with_guitar(vec![
                    n(E2, 3.0),
                    n(G2, 1.0),
                    n(A2, 2.0),
                    n(E2, 2.0),
                    n(D2, 3.0),
                    n(E2, 1.0),
                    n(F2, 2.0),
                    n(E2, 2.0),
                ])
                .with_bass(vec![n(E1, 4.0), n(A1, 4.0), n(D2, 2.0), n(E1, 2.0), n(F1, 2.0), n(E1, 2.0)])
                .with_drums("K--KS-H-K--KS-H-|K--KS-H-K--KS-OHT")?
                .with_pad(vec![E3, A3, B3])
                .with_arp(vec![E4, A4, B4, E5])
                .with_organ(OrganChord::new(vec![E3, A3], DrawbarPreset::Rock, LeslieSpeed::Chorale)),
            Section::new("ESCAPE VELOCITY", 0.6, 74.0, 3)
                .with_visual(VisualMode::Nebula)
                .with_guitar(vec![
                    n(A2, 2.0),
                    n(D3, 1.0),
                    n(E3, 1.0),
                    n(G3, 2.0),
                    n(E3, 1.0),
                    n(D3, 1.0),
                    n(A2, 2.0),
                    n(G2, 2.0),
                    n(A2, 2.0),
                    n(D3, 2.0),
                ])
                .with_bass(vec![n(A1, 4.0), n(G1, 4.0), n(A1, 2.0), n(G1, 2.0), n(A1, 2.0), n(D2, 2.0)])
                .with_drums("K-H-S-H-K-H-S-H-|K-H-S-H-K-H-SOH-")?
                .with_pad(vec![A3, D4, E4])
                .with_arp(vec![A4, D5, E5, A5, E5, D5]),
            Section::new("KOSMISCHE MUSIK", 0.95, 88.0, 4)
                .with_visual(VisualMode::Warp)
                .with_guitar(vec![
                    n(D3, 1.0),
                    n(E3, 1.0),
                    n(G3, 1.0),
                    n(A3, 1.0),
                    n(D4, 2.0),
                    n(B3, 1.0),
                    n(A3, 1.0),
                    n(G3, 1.0),
                    n(E3, 1.0),
                    n(D3, 2.0),
                    n(E3, 1.0),
                    n(G3, 1.0),
                    n(A3, 1.0),
                    n(B3, 1.0),
                ])
                .with_bass(vec![
                    n(D2, 2.0),
                    n(G2, 2.0),
                    n(D3, 2.0),
                    n(B2, 2.0),
                    n(G2, 2.0),
                    n(D2, 2.0),
                    n(E2, 2.0),
                    n(A2, 2.0),
                ])
                .with_drums("K-RBS-R-K-RBS-R-|K-RBS-RBK-RBSOH-")?
                .with_pad(vec![D4, G4, A4, B4])
                .with_arp(vec![D5, G5, A5, B4, D5, A5, G5, E5])
                .with_organ(OrganChord::new(
                    vec![D3, A3, D4, G4],
                    DrawbarPreset::Full,
                    LeslieSpeed::Tremolo,
                )),
        ],
    ))
}

fn dopesmoker() -> Result<Song> {
    Ok(Song::new(
        "DOPESMOKER",
        vec![
            Section::new("THE WEEDIAN", 0.0, 52.0, 4)
                .with_guitar(vec![
                    n(D1, 4.0),
                    r(1.0),
                    n(D1, 2.0).palm_muted(),
                    n(EB1, 1.0).sliding(),
                    n(D1, 4.0),
                    n(G1, 2.0),
                    n(F1, 1.0),
                    n(D1, 1.0),
                ])
                .with_bass(vec![n(D1, 5.0), n(D1, 3.0), n(D1, 4.0), n(G1, 2.0), n(F1, 1.0), n(D1, 1.0)])
                .with_drums("K-------S-------|K-------S-----TL")?,
            Section::new("HOLY MOUNTAIN", 0.0, 62.0, 4)
                .with_visual(VisualMode::Smoke)
                .with_guitar(vec![
                    n(D1, 2.0),
                    n(F1, 1.0),
                    n(G1, 1.0),
                    n(D1, 2.0),
                    n(BB1, 2.0).sliding(),
                    n(A1, 2.0),
                    n(G1, 1.0),
                    n(F1, 1.0),
                    n(D1, 4.0),
                ])
                .with_bass(vec![n(D1, 4.0), n(D1, 4.0), n(A1, 4.0), n(D1, 4.0)])
                .with_drums("K-K-S---K-K-S---|K-K-S-s-K-K-S-TL")?,
            Section::new("SMOKE CARAVAN", 0.1, 64.0, 3)
                .with_visual(VisualMode::Smoke)
                .with_guitar(vec![
                    n(D2, 2.0),
                    n(F2, 2.0),
                    n(G2, 3.0),
                    n(F2, 1.0),
                    n(D2, 4.0),
                    r(2.0),
                    n(A1, 2.0).sliding(),
                ])
                .with_bass(vec![n(D1, 4.0), n(G1, 4.0), n(D1, 4.0), n(A1, 4.0)])
                .with_drums("K-H-S-H-K-H-S-OH|K-H-S-h-K-H-S-OH")?,
        ],
    )
    .with_style(StyleTag::Sleep))
}

fn advaitic_songs() -> Result<Song> {
    Ok(Song::new(
        "ADVAITIC SONGS",
        vec![
            Section::new("STATE OF NON-RETURN", 0.0, 62.0, 4)
                .with_guitar(vec![n(D2, 4.0), r(4.0), n(A2, 4.0), r(4.0)])
                .with_bass(vec![
                    n(D1, 2.0),
                    n(D1, 1.0),
                    n(F1, 1.0),
                    n(G1, 2.0),
                    n(A1, 2.0),
                    n(D1, 2.0),
                    n(D1, 1.0),
                    n(F1, 1.0),
                    n(G1, 2.0),
                    n(F1, 2.0),
                ])
                .with_drums("K---R---K---R---|K---R---K---R-RB")?,
            Section::new("GEBEL BARKAL", 0.1, 66.0, 3)
                .with_visual(VisualMode::Smoke)
                .with_guitar(vec![n(D3, 4.0), n(G3, 4.0), n(F3, 4.0), n(D3, 4.0)])
                .with_bass(vec![
                    n(D1, 2.0),
                    n(A1, 2.0),
                    n(G1, 2.0),
                    n(F1, 2.0),
                    n(D1, 2.0),
                    n(A1, 2.0),
                    n(BB1, 2.0),
                    n(A1, 2.0),
                ])
                .with_drums("K-r-R-RBK-r-R-RB|K-R-R-RBK-R-SORB")?
                .with_organ(OrganChord::new(vec![D3, A3], DrawbarPreset::Gospel, LeslieSpeed::Chorale)),
            Section::new("MEDITATION IS THE PRACTICE", 0.3, 68.0, 3)
                .with_visual(VisualMode::Nebula)
                .with_guitar(vec![n(D3, 2.0), n(G3, 2.0), n(BB3, 4.0), n(A3, 4.0), n(D3, 4.0)])
                .with_bass(vec![n(D2, 4.0), n(G1, 4.0), n(BB1, 4.0), n(A1, 4.0)])
                .with_drums("K-R-S-R-K-R-S-OH|K-R-S-R-K-R-SORB")?
                .with_pad(vec![D3, G3, BB3]),
        ],
    )
    .with_style(StyleTag::Om))
}

fn tar_pit() -> Result<Song> {
    Ok(Song::new(
        "TAR PIT",
        vec![
            Section::new("THE BLACKENING", 0.05, 56.0, 4)
                .with_visual(VisualMode::Smoke)
                .with_guitar(vec![
                    n(E1, 3.0),
                    n(G1, 1.0),
                    n(A1, 2.0),
                    n(E1, 2.0),
                    n(B1, 3.0),
                    n(A1, 1.0),
                    n(G1, 2.0),
                    n(F1, 1.0),
                    n(E1, 1.0),
                ])
                .with_bass(vec![
                    n(E1, 3.0),
                    n(G1, 1.0),
                    n(A1, 2.0),
                    n(E1, 2.0),
                    n(B1, 3.0),
                    n(A1, 1.0),
                    n(G1, 2.0),
                    n(F1, 1.0),
                    n(E1, 1.0),
                ])
                .with_drums("K---S---K-K-S---|K---S--sK-K-S-OH")?,
            Section::new("TECTONIC GRIND", 0.0, 50.0, 3)
                .with_guitar(vec![
                    n(E1, 4.0).palm_muted(),
                    r(1.0),
                    n(E1, 2.0).palm_muted(),
                    n(G1, 1.0),
                    n(E1, 4.0).palm_muted(),
                    r(1.0),
                    n(F1, 2.0).sliding(),
                    n(E1, 1.0),
                ])
                .with_bass(vec![
                    n(E1, 4.0),
                    r(1.0),
                    n(E1, 2.0),
                    n(G1, 1.0),
                    n(E1, 4.0),
                    r(1.0),
                    n(F1, 2.0),
                    n(E1, 1.0),
                ])
                .with_drums("K--K--S-K--K--S-|K--K--S-K--KT-TL")?,
            Section::new("BURIAL RITES", 0.0, 46.0, 2)
                .with_guitar(vec![n(E1, 8.0), r(4.0), n(F1, 2.0).sliding(), n(E1, 8.0), r(2.0)])
                .with_bass(vec![n(E1, 8.0), n(F1, 4.0), n(E1, 10.0)])
                .with_drums("K-------S-------|K-----------S-TL")?
                .with_organ(OrganChord::new(vec![E2, B2], DrawbarPreset::Rock, LeslieSpeed::Brake)),
        ],
    )
    .with_style(StyleTag::Fuzz))
}
