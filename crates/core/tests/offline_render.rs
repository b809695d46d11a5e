use stonerizm_core::{score::library, AppConfig, Session};

fn config() -> AppConfig {
    AppConfig::from_json_str(
        r#"{ "audio": { "sample_rate": 16000, "block_size": 256 }, "scheduler": { "seed": 42 } }"#,
    )
    .unwrap()
}

#[test]
fn builtin_score_renders_finite_audible_output() {
    let mut session = Session::new(library::builtin().unwrap(), &config()).unwrap();
    session.start();
    let out = session.render_seconds(6.0);

    assert_eq!(out.len(), 96_000);
    assert!(out.iter().all(|s| s.is_finite()));
    let peak = out.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
    assert!(peak > 0.01, "peak {peak}");
    assert!(peak < 2.0, "peak {peak}");

    let status = session.telemetry().status().unwrap();
    assert_eq!(status.song, library::builtin().unwrap().songs()[0].name);
    assert!(status.label.is_some());
}

#[test]
fn telemetry_follows_the_render() {
    let mut session = Session::new(library::builtin().unwrap(), &config()).unwrap();
    session.start();
    let telemetry = session.telemetry();

    let mut frames = Vec::new();
    for _ in 0..180 {
        session.render_seconds(1.0 / 60.0);
        frames.push(telemetry.frame(1.0 / 60.0).unwrap());
    }

    assert!(frames.iter().any(|f| f.bass > 0.0));
    assert!(frames.iter().any(|f| f.kick == 1.0 || f.note_on == 1.0));
    assert!(frames.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn jumping_songs_offline_changes_the_status() {
    let score = library::builtin().unwrap();
    let second = score.songs()[1].name.clone();
    let mut session = Session::new(score, &config()).unwrap();
    session.start();
    session.render_seconds(1.0);
    session.play_song(1).unwrap();
    session.render_seconds(1.0);

    assert_eq!(session.telemetry().status().unwrap().song, second);
    assert_eq!(session.scheduler().cursor().song_index, 1);
}
