use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stonerizm_core::{score::library, tone::GenreLabel, AppConfig, Result, Score};
use tracing_subscriber::EnvFilter;

mod live;
mod render;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let score = load_score(cli.score.as_deref())?;

    match cli.command {
        Commands::Songs => {
            list_songs(&score);
            Ok(())
        }
        Commands::Play {
            song,
            shuffle,
            seconds,
            telemetry,
        } => live::run(
            score,
            config,
            live::PlayOptions {
                song,
                shuffle,
                seconds,
                telemetry,
            },
        ),
        Commands::Render {
            output,
            seconds,
            song,
            telemetry,
        } => render::run(score, &config, &output, seconds, song, telemetry.as_deref()),
    }
}

fn load_score(path: Option<&Path>) -> Result<Score> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading score");
            Score::from_json_str(&std::fs::read_to_string(path)?)
        }
        None => library::builtin(),
    }
}

fn list_songs(score: &Score) {
    for (index, song) in score.songs().iter().enumerate() {
        let seconds: f64 = song
            .sections
            .iter()
            .map(|section| section.realized_seconds() * f64::from(section.repeats))
            .sum();
        println!("{index}: {} ({:.0}s)", song.name, seconds);
        for section in &song.sections {
            let label = GenreLabel::for_section(section.effective_style(song), section.genre);
            println!(
                "    {:<20} {:>5.1} bpm  x{}  {}",
                section.name, section.bpm, section.repeats, label
            );
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Generative doom-to-krautrock music engine", long_about = None)]
struct Cli {
    /// JSON configuration file; missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON score to perform instead of the built-in song table.
    #[arg(long, global = true)]
    score: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the songs and sections of the score.
    Songs,
    /// Perform live on the default output device.
    ///
    /// Type n, p, s or a song number followed by enter to change songs; q quits.
    Play {
        /// Song to start with.
        #[arg(long)]
        song: Option<usize>,
        /// Start in shuffle mode.
        #[arg(long)]
        shuffle: bool,
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<f64>,
        /// Print telemetry frames to stdout as JSON lines.
        #[arg(long)]
        telemetry: bool,
    },
    /// Render offline to a WAV file.
    Render {
        /// Destination WAV path.
        output: PathBuf,
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,
        #[arg(long)]
        song: Option<usize>,
        /// Also write telemetry frames as JSON lines to this path.
        #[arg(long)]
        telemetry: Option<PathBuf>,
    },
}
