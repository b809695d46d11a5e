//! Live performance: the engine renders inside the cpal output callback,
//! the scheduler runs on the main thread and reaches the engine through a
//! bounded command channel.

use std::io::BufRead;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use stonerizm_core::{
    AppConfig, AudioEngine, CommandSink, EngineClock, EngineCommand, Result, Scheduler, Score,
    StonerizmError, TelemetryHandle,
};
use tracing::{info, warn};

const COMMAND_CAPACITY: usize = 4096;
const TELEMETRY_EVERY: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct PlayOptions {
    pub song: Option<usize>,
    pub shuffle: bool,
    pub seconds: Option<f64>,
    pub telemetry: bool,
}

/// Hands scheduler commands to the audio thread without blocking.
struct ChannelSink(Sender<EngineCommand>);

impl CommandSink for ChannelSink {
    fn submit(&mut self, command: EngineCommand) {
        if self.0.try_send(command).is_err() {
            warn!("engine command queue is full; command dropped");
        }
    }
}

/// Keyboard transport requests read from stdin.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Key {
    Next,
    Prev,
    Shuffle,
    Song(usize),
    Quit,
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim() {
        "n" => Some(Key::Next),
        "p" => Some(Key::Prev),
        "s" => Some(Key::Shuffle),
        "q" => Some(Key::Quit),
        other => other.parse().ok().map(Key::Song),
    }
}

enum Clock {
    Engine(EngineClock),
    /// No output device: schedule against elapsed wall time.
    Wall(Instant),
}

impl Clock {
    fn now(&self) -> f64 {
        match self {
            Clock::Engine(clock) => clock.now(),
            Clock::Wall(started) => started.elapsed().as_secs_f64(),
        }
    }
}

pub fn run(score: Score, mut config: AppConfig, options: PlayOptions) -> Result<()> {
    let (tx, rx) = crossbeam_channel::bounded::<EngineCommand>(COMMAND_CAPACITY);

    let output = match open_output(&mut config, rx.clone()) {
        Ok(output) => Some(output),
        Err(err) => {
            warn!(%err, "no usable output device; scheduling silently against the wall clock");
            None
        }
    };
    let (clock, telemetry) = match &output {
        Some(output) => (Clock::Engine(output.clock.clone()), output.telemetry.clone()),
        None => (
            Clock::Wall(Instant::now()),
            TelemetryHandle::new(&config.telemetry),
        ),
    };

    let mut sink = ChannelSink(tx);
    let mut scheduler = Scheduler::new(score, config.scheduler.clone());
    if options.shuffle {
        scheduler.toggle_shuffle();
    }
    scheduler.start(clock.now(), &mut sink);
    if let Some(song) = options.song {
        scheduler.play_song(song, clock.now(), &mut sink)?;
    }

    let keys = spawn_key_reader();
    let interval = config.scheduler.tick_interval();
    let ticker = crossbeam_channel::tick(interval);
    let started = Instant::now();
    let mut ticks = 0u32;

    'transport: while ticker.recv().is_ok() {
        if output.is_none() {
            // Nothing consumes commands without a device.
            while rx.try_recv().is_ok() {}
        }

        // A closed stdin just leaves the keys silent.
        while let Ok(key) = keys.try_recv() {
            let now = clock.now();
            match key {
                Key::Quit => break 'transport,
                Key::Next => scheduler.next_song(now, &mut sink),
                Key::Prev => scheduler.prev_song(now, &mut sink),
                Key::Shuffle => {
                    let enabled = scheduler.toggle_shuffle();
                    println!("shuffle {}", if enabled { "on" } else { "off" });
                }
                Key::Song(index) => {
                    if let Err(err) = scheduler.play_song(index, now, &mut sink) {
                        warn!(%err, index, "cannot play song");
                    }
                }
            }
        }

        scheduler.tick(clock.now(), &mut sink);
        ticks = ticks.wrapping_add(1);
        if options.telemetry && ticks % TELEMETRY_EVERY == 0 {
            print_frame(&telemetry, interval * TELEMETRY_EVERY)?;
        }
        if options
            .seconds
            .is_some_and(|limit| started.elapsed().as_secs_f64() >= limit)
        {
            break;
        }
    }

    scheduler.stop();
    sink.submit(EngineCommand::MuteAll);
    info!("stopping");
    // Let the mute ramp reach the device before the stream is dropped.
    std::thread::sleep(Duration::from_millis(50));
    drop(output);
    Ok(())
}

fn print_frame(telemetry: &TelemetryHandle, dt: Duration) -> Result<()> {
    let frame = telemetry.frame(dt.as_secs_f32())?;
    println!("{}", serde_json::to_string(&frame)?);
    Ok(())
}

fn spawn_key_reader() -> Receiver<Key> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_key(&line) {
                Some(key) => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                None => println!("keys: n next, p previous, s shuffle, <number> song, q quit"),
            }
        }
    });
    rx
}

struct Output {
    clock: EngineClock,
    telemetry: TelemetryHandle,
    _stream: cpal::Stream,
}

/// Opens the default output device and moves a fresh engine into its
/// callback. The engine runs at the device's sample rate.
fn open_output(config: &mut AppConfig, rx: Receiver<EngineCommand>) -> Result<Output> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| StonerizmError::msg("no default output device"))?;
    let supported = device
        .default_output_config()
        .map_err(|err| StonerizmError::msg(format!("no default output config: {err}")))?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(StonerizmError::msg(format!(
            "unsupported sample format {:?}",
            supported.sample_format()
        )));
    }

    let stream_config: cpal::StreamConfig = supported.into();
    let channels = usize::from(stream_config.channels.max(1));
    config.audio.sample_rate = stream_config.sample_rate.0;

    let mut engine = AudioEngine::new(config)?;
    let clock = engine.clock();
    let telemetry = engine.telemetry();
    let mut mono = vec![0.0f32; config.audio.block_size.max(1)];

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                while let Ok(command) = rx.try_recv() {
                    engine.apply(command);
                }
                let frames = data.len() / channels;
                if mono.len() < frames {
                    mono.resize(frames, 0.0);
                }
                let block = &mut mono[..frames];
                engine.render(block);
                for (frame, sample) in data.chunks_exact_mut(channels).zip(block.iter()) {
                    frame.fill(*sample);
                }
            },
            |err| tracing::error!(%err, "audio output stream error"),
            None,
        )
        .map_err(|err| StonerizmError::msg(format!("cannot build output stream: {err}")))?;
    stream
        .play()
        .map_err(|err| StonerizmError::msg(format!("cannot start output stream: {err}")))?;

    info!(
        sample_rate = config.audio.sample_rate,
        channels, "audio output running"
    );
    Ok(Output {
        clock,
        telemetry,
        _stream: stream,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_transport_requests() {
        assert_eq!(parse_key("n\n"), Some(Key::Next));
        assert_eq!(parse_key(" p"), Some(Key::Prev));
        assert_eq!(parse_key("s"), Some(Key::Shuffle));
        assert_eq!(parse_key("q"), Some(Key::Quit));
        assert_eq!(parse_key("3"), Some(Key::Song(3)));
        assert_eq!(parse_key("jump"), None);
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink(tx);
        sink.submit(EngineCommand::MuteAll);
        sink.submit(EngineCommand::RiffFlash(true));
        assert_eq!(rx.try_recv(), Ok(EngineCommand::MuteAll));
        assert!(rx.try_recv().is_err());
    }
}
