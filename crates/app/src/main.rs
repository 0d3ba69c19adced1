use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use rewind_core::{PlaybackClock, PropertyTarget, Record, Recorder, RecorderConfig, TrackHooks};
use tracing_subscriber::EnvFilter;

fn main() -> rewind_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            ticks,
            step,
            max_window,
            smooth,
            config,
            dump,
        } => {
            let mut settings = match config {
                Some(path) => RecorderConfig::from_path(path)?,
                None => RecorderConfig::default(),
            };
            if max_window.is_some() {
                settings.max_recording_duration = max_window;
            }
            settings.smooth |= smooth;
            run_demo(&settings, ticks, step, dump)
        }
    }
}

fn run_demo(
    settings: &RecorderConfig,
    ticks: usize,
    step: f64,
    dump: bool,
) -> rewind_core::Result<()> {
    if step <= 0.0 {
        return Err("--step must be positive".into());
    }
    tracing::info!(?settings, ticks, step, "recording demo scene");

    let character = Arc::new(Mutex::new(Actor::new(60.0, 60.0)));
    let food = Arc::new(Mutex::new(Actor::new(63.0, 60.0)));

    let mut recorder = Recorder::with_config(PlaybackClock::new(), settings)?
        .on_start_playing(|| tracing::info!("replay started"));
    recorder.start_track(
        "character",
        character.clone(),
        ["x", "y"],
        TrackHooks::new().on_exit(|| tracing::info!("character left the replay window")),
    )?;
    recorder.start_track("food", food.clone(), ["x", "y"], TrackHooks::new())?;

    recorder.set_recording(true);
    recorder.update(0.0)?;
    let mut score = 0u32;
    for tick in 0..ticks {
        {
            let mut character = lock(&character)?;
            let mut food = lock(&food)?;
            character.walk(tick);
            if character.x == food.x && character.y == food.y {
                food.relocate(tick);
                score += 1;
            }
        }
        recorder.tick(step)?;
    }
    tracing::info!(score, slack = recorder.slack_time(), "recording finished");

    recorder.set_playing(true);
    let duration = recorder.duration();
    let mut elapsed = 0.0;
    while elapsed < duration {
        recorder.tick(step)?;
        elapsed += step;
        let character = lock(&character)?;
        tracing::info!(elapsed, x = character.x, y = character.y, "replayed character");
    }

    if dump {
        let history: BTreeMap<&str, Vec<&Record>> = recorder
            .labels()
            .filter_map(|label| Some((label, recorder.track(label)?.records().collect())))
            .collect();
        println!("{}", serde_json::to_string_pretty(&history)?);
    }
    Ok(())
}

fn lock(actor: &Mutex<Actor>) -> rewind_core::Result<std::sync::MutexGuard<'_, Actor>> {
    actor
        .lock()
        .map_err(|_| rewind_core::RewindError::msg("demo actor has been poisoned"))
}

/// Scripted scene object exposing `x` and `y`.
#[derive(Debug)]
struct Actor {
    x: f64,
    y: f64,
}

impl Actor {
    fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Walks a 20-step square, one unit per tick.
    fn walk(&mut self, tick: usize) {
        match (tick / 5) % 4 {
            0 => self.x += 1.0,
            1 => self.y += 1.0,
            2 => self.x -= 1.0,
            _ => self.y -= 1.0,
        }
    }

    fn relocate(&mut self, tick: usize) {
        self.x = ((tick * 37) % 100) as f64;
        self.y = ((tick * 61) % 100) as f64;
    }
}

impl PropertyTarget for Actor {
    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "x" => Some(self.x),
            "y" => Some(self.y),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> bool {
        match name {
            "x" => self.x = value,
            "y" => self.y = value,
            _ => return false,
        }
        true
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Record and replay object properties over time", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a scripted scene, then replay the retained window.
    Demo {
        /// Number of simulation ticks to record.
        #[arg(short, long, default_value_t = 40)]
        ticks: usize,
        /// Seconds per tick.
        #[arg(short, long, default_value_t = 0.1)]
        step: f64,
        /// Maximum recording window in seconds.
        #[arg(short, long)]
        max_window: Option<f64>,
        /// Interpolate between records during playback.
        #[arg(long)]
        smooth: bool,
        /// JSON recorder configuration to start from.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the retained history as JSON once replay ends.
        #[arg(long)]
        dump: bool,
    },
}
