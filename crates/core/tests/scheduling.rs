use stonerizm_core::{
    drums::{decode, DrumStep},
    AppConfig, AudioEngine, DrumHit, DrumPattern, EngineCommand, Humanizer, Note, Part, Pitch,
    Scheduler, SchedulerConfig, Score, Section, Song, StonerizmError,
};

fn one_section_score() -> Score {
    let section = Section::new("drone", 0.0, 60.0, 1)
        .with_guitar(vec![Note::new(110.0, 4.0)])
        .with_bass(vec![Note::new(55.0, 4.0)])
        .with_drums("K---")
        .unwrap();
    Score::new(vec![Song::new("single", vec![section])]).unwrap()
}

#[test]
fn single_section_song_triggers_lead_and_one_downbeat_kick() {
    let config = SchedulerConfig {
        start_offset: 0.0,
        seed: Some(5),
        ..SchedulerConfig::default()
    };
    let mut scheduler = Scheduler::new(one_section_score(), config);
    let mut commands = Vec::new();
    scheduler.start(0.0, &mut commands);
    scheduler.tick(0.0, &mut commands);

    let lead: Vec<(f64, f64)> = commands
        .iter()
        .filter_map(|c| match c {
            EngineCommand::Note {
                part: Part::Lead,
                pitch: Pitch::Single(f),
                start,
                duration,
                ..
            } if *f == 110.0 => Some((*start, *duration)),
            _ => None,
        })
        .collect();
    assert_eq!(lead.len(), 1);
    assert_eq!(lead[0].0, 0.0);
    assert!((lead[0].1 - 3.72).abs() < 1e-9);

    let kicks_near_zero = commands
        .iter()
        .filter(|c| {
            matches!(c, EngineCommand::Hit { hit: DrumHit::Kick, time, .. } if *time < 0.01)
        })
        .count();
    assert_eq!(kicks_near_zero, 1);

    // One song with one section wraps to itself.
    assert_eq!(scheduler.cursor().song_index, 0);
    assert_eq!(scheduler.cursor().section_index, 0);
    assert!((scheduler.cursor().scheduled_until - 4.0).abs() < 1e-9);
}

#[test]
fn kick_snare_pattern_decodes_onto_the_grid() {
    let pattern = DrumPattern::parse("K---S---").unwrap();
    let steps = decode(&pattern, 2.0, 0.125);
    assert_eq!(
        steps,
        vec![
            DrumStep { step: 0, hit: DrumHit::Kick, ghost: false },
            DrumStep { step: 4, hit: DrumHit::Snare, ghost: false },
            DrumStep { step: 8, hit: DrumHit::Kick, ghost: false },
            DrumStep { step: 12, hit: DrumHit::Snare, ghost: false },
        ]
    );
}

#[test]
fn ghost_notes_are_always_quieter_than_accents() {
    let mut humanizer = Humanizer::new(Some(99));
    let loudest_ghost = (0..1000)
        .map(|_| humanizer.velocity(true))
        .fold(f32::MIN, f32::max);
    let softest_accent = (0..1000)
        .map(|_| humanizer.velocity(false))
        .fold(f32::MAX, f32::min);
    assert!(loudest_ghost < softest_accent);
}

#[test]
fn bad_scores_fail_at_load() {
    let err = Section::new("broken", 0.5, 90.0, 1).with_drums("K--X").unwrap_err();
    assert!(matches!(err, StonerizmError::InvalidPattern { found: 'X', .. }));

    let zero_repeats = Section::new("never", 0.5, 90.0, 0).with_guitar(vec![Note::new(82.41, 1.0)]);
    assert!(matches!(
        Score::new(vec![Song::new("bad", vec![zero_repeats])]),
        Err(StonerizmError::InvalidScore { .. })
    ));
}

#[test]
fn muting_twice_is_harmless() {
    let mut config = AppConfig::default();
    config.audio.sample_rate = 8_000;
    config.scheduler.seed = Some(2);
    let mut engine = AudioEngine::new(&config).unwrap();

    engine.apply(EngineCommand::Note {
        part: Part::Bass,
        pitch: Pitch::Single(41.2),
        start: 0.0,
        duration: 2.0,
        articulation: Default::default(),
    });
    let mut block = vec![0.0; 800];
    engine.render(&mut block);
    assert!(engine.active_voices() > 0);

    engine.apply(EngineCommand::MuteAll);
    engine.apply(EngineCommand::MuteAll);
    for _ in 0..3 {
        engine.render(&mut block);
    }
    assert!(block.iter().all(|s| s.is_finite()));
    assert_eq!(engine.active_voices(), 0);
}
