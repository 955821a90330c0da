//! Block Arcade headless runner
//!
//! Runs one level with the reference program for its game, prints the
//! run report as JSON and records it in the progress file.
//!
//! Usage: `block-arcade <level.json> [settings.json] [progress.json]`

use std::process::ExitCode;

use block_arcade::audio::{AudioSink, SoundCue};
use block_arcade::games::{Bounce, Flappy, Maze};
use block_arcade::sim::{AudioObserver, GameEvent, GameLoop, RunObserver, RunReport, Simulation};
use block_arcade::{ConfigError, GameKind, LevelConfig, Progress, Settings, demo};

/// Longest run the runner will step before giving up
const MAX_TICKS: u64 = 100_000;

/// Progress file used when none is given
const DEFAULT_PROGRESS_PATH: &str = "block-arcade-progress.json";

/// Sink that logs cues instead of playing them
struct LogSink;

impl AudioSink for LogSink {
    fn play(&mut self, cue: SoundCue, volume: f32) {
        log::debug!("Cue {} at volume {:.2}", cue.as_str(), volume);
    }
}

/// Forwards cues to the log sink and counts trigger events
struct Headless {
    audio: AudioObserver<LogSink>,
    triggers: u64,
}

impl<S> RunObserver<S> for Headless {
    fn on_event(&mut self, event: &GameEvent) {
        if let GameEvent::Trigger { name } = event {
            self.triggers += 1;
            log::trace!("Trigger {}", name);
        }
        RunObserver::<S>::on_event(&mut self.audio, event);
    }
}

/// Step a simulation until it reports, letting `steer` play between ticks
fn drive<S: Simulation>(
    sim: S,
    settings: &Settings,
    mut steer: impl FnMut(&mut S),
) -> Option<RunReport> {
    let mut audio = AudioObserver::new(LogSink);
    audio.volume = settings.cue_volume();
    let mut observer = Headless { audio, triggers: 0 };

    let mut game = GameLoop::new(sim).with_max_substeps(settings.max_substeps);
    for _ in 0..MAX_TICKS {
        steer(game.sim_mut());
        if let Some(report) = game.step(&mut observer) {
            log::info!("{} triggers fired", observer.triggers);
            return Some(report);
        }
        if !game.sim().phase().is_running() {
            break;
        }
    }
    log::warn!("Run did not finish within {} ticks", MAX_TICKS);
    None
}

fn run(level: &LevelConfig, settings: &Settings) -> Result<Option<RunReport>, ConfigError> {
    let report = match level.game {
        GameKind::Maze => {
            let mut maze = Maze::new(level, settings)?;
            let mut program = demo::maze_wall_follower();
            maze.start(&mut program);
            drive(maze, settings, |_| {})
        }
        GameKind::Bounce => {
            let mut bounce = Bounce::new(level, settings)?;
            bounce.start(demo::bounce_classic());
            drive(bounce, settings, demo::steer_paddle)
        }
        GameKind::Flappy => {
            let mut flappy = Flappy::new(level, settings)?;
            flappy.start(demo::flappy_classic());
            drive(flappy, settings, demo::steer_avatar)
        }
    };
    Ok(report)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(level_path) = args.next() else {
        eprintln!("Usage: block-arcade <level.json> [settings.json] [progress.json]");
        return ExitCode::from(2);
    };

    let settings_path = args.next();
    let progress_path = args.next().unwrap_or_else(|| DEFAULT_PROGRESS_PATH.to_string());

    let settings = match settings_path.map(Settings::load).unwrap_or_else(|| Ok(Settings::default())) {
        Ok(settings) => settings,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let level = match LevelConfig::load(&level_path) {
        Ok(level) => level,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    log::info!("Block Arcade (native) running {} level '{}'", level.game.as_str(), level.id);
    let report = match run(&level, &settings) {
        Ok(Some(report)) => report,
        Ok(None) => {
            eprintln!("Run did not finish");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let level_id = if level.id.is_empty() { level_path.as_str() } else { level.id.as_str() };
    match Progress::record_to(&progress_path, level_id, &report) {
        Ok(true) => log::info!("New best recorded in {}", progress_path),
        Ok(false) => log::info!("Run recorded in {}", progress_path),
        Err(err) => log::warn!("Could not record progress: {err}"),
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            log::error!("Failed to serialize report: {err}");
            return ExitCode::FAILURE;
        }
    }
    if report.result {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
