//! Offline render to a mono 32-bit float WAV, optionally with a JSON-lines
//! telemetry dump sampled at the reference frame rate.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use stonerizm_core::{AppConfig, Result, Score, Session, StonerizmError};
use tracing::info;

pub fn run(
    score: Score,
    config: &AppConfig,
    output: &Path,
    seconds: f64,
    song: Option<usize>,
    telemetry: Option<&Path>,
) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(StonerizmError::InvalidInput("render length must be positive"));
    }

    let mut session = Session::new(score, config)?;
    session.start();
    if let Some(song) = song {
        session.play_song(song)?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: session.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, spec).map_err(wav_error)?;
    let mut dump = telemetry
        .map(|path| File::create(path).map(BufWriter::new))
        .transpose()?;

    let frame_rate = f64::from(config.telemetry.reference_frame_rate.max(1.0));
    let frame_len = (f64::from(session.sample_rate()) / frame_rate).round().max(1.0) as usize;
    let dt = (frame_len as f64 / f64::from(session.sample_rate())) as f32;
    let total = (seconds * f64::from(session.sample_rate())).round() as usize;

    let handle = session.telemetry();
    let mut block = vec![0.0f32; frame_len];
    let mut peak = 0.0f32;
    let mut written = 0;
    while written < total {
        let len = frame_len.min(total - written);
        let block = &mut block[..len];
        session.render(block);
        for &sample in block.iter() {
            peak = peak.max(sample.abs());
            writer.write_sample(sample).map_err(wav_error)?;
        }
        if let Some(dump) = dump.as_mut() {
            serde_json::to_writer(&mut *dump, &handle.frame(dt)?)?;
            dump.write_all(b"\n")?;
        }
        written += len;
    }

    writer.finalize().map_err(wav_error)?;
    if let Some(mut dump) = dump {
        dump.flush()?;
    }

    let status = handle.status()?;
    info!(
        ?output,
        seconds,
        peak,
        last_song = %status.song,
        last_section = %status.section,
        "render finished"
    );
    Ok(())
}

fn wav_error(err: hound::Error) -> StonerizmError {
    StonerizmError::msg(format!("wav output failed: {err}"))
}
