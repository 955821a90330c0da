//! Ball and paddle game
//!
//! Balls fly at a constant speed along their heading. Nothing bounces on its
//! own: the user's handlers decide what happens on each wall or paddle
//! contact, usually by calling [`BounceWorld::bounce_ball`].

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use super::{EventLog, checked, fire};
use crate::audio::SoundCue;
use crate::consts::{DEFAULT_BALL_DIRECTION, OFFSCREEN_POSITION, Y_TOP_BOUNDARY};
use crate::error::{ConfigError, HandlerError};
use crate::level::{GameKind, GoalCondition, LevelConfig};
use crate::settings::Settings;
use crate::sim::collision::{rebound_off_paddle, reflect_off_bounds, touches_paddle};
use crate::sim::grid::{Grid, SquareType, single_marker};
use crate::sim::handlers::{HandlerResult, HandlerTable, Trigger, UserProgram};
use crate::sim::input::{Arrow, InputState};
use crate::sim::outcome::{Outcome, RunReport, TickLimit, at_position, update_finishes};
use crate::sim::scheduler::{RunPhase, Simulation, TaskQueue, ms_to_ticks};
use crate::sim::state::{Ball, FinishMarker, GameEvent, Paddle};
use crate::speed;

/// Conditions that invoke bounce handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BounceTrigger {
    WhenLeft,
    WhenUp,
    WhenRight,
    WhenDown,
    WhenWallCollided,
    WhenBallInGoal,
    WhenBallMissesPaddle,
    WhenPaddleCollided,
}

impl BounceTrigger {
    pub fn for_arrow(arrow: Arrow) -> Self {
        match arrow {
            Arrow::Left => BounceTrigger::WhenLeft,
            Arrow::Up => BounceTrigger::WhenUp,
            Arrow::Right => BounceTrigger::WhenRight,
            Arrow::Down => BounceTrigger::WhenDown,
        }
    }
}

impl Trigger for BounceTrigger {
    fn name(self) -> &'static str {
        match self {
            BounceTrigger::WhenLeft => "whenLeft",
            BounceTrigger::WhenUp => "whenUp",
            BounceTrigger::WhenRight => "whenRight",
            BounceTrigger::WhenDown => "whenDown",
            BounceTrigger::WhenWallCollided => "whenWallCollided",
            BounceTrigger::WhenBallInGoal => "whenBallInGoal",
            BounceTrigger::WhenBallMissesPaddle => "whenBallMissesPaddle",
            BounceTrigger::WhenPaddleCollided => "whenPaddleCollided",
        }
    }
}

/// Compiled bounce program
pub type BounceProgram = UserProgram<BounceTrigger, BounceWorld>;

/// Deferred per-ball work after a goal or a miss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BounceTask {
    Park(usize),
    Respawn(usize),
}

/// Mutable bounce state; also the API surface handed to handlers
#[derive(Debug, Clone)]
pub struct BounceWorld {
    cols: usize,
    rows: usize,
    /// Balls in spawn order
    pub balls: Vec<Ball>,
    pub paddle: Paddle,
    pub player_score: u32,
    pub opponent_score: u32,
    events: Vec<GameEvent>,
    rng: Pcg32,
}

impl EventLog for BounceWorld {
    fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

impl BounceWorld {
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn max_pos(&self) -> DVec2 {
        DVec2::new((self.cols - 1) as f64, (self.rows - 1) as f64)
    }

    fn move_paddle(&mut self, dir: DVec2) {
        let max = self.max_pos();
        let step = self.paddle.speed;
        self.paddle.nudge(dir * step, max);
    }

    pub fn move_left(&mut self) {
        self.move_paddle(DVec2::NEG_X);
    }

    pub fn move_right(&mut self) {
        self.move_paddle(DVec2::X);
    }

    pub fn move_up(&mut self) {
        self.move_paddle(DVec2::NEG_Y);
    }

    pub fn move_down(&mut self) {
        self.move_paddle(DVec2::Y);
    }

    /// Reflect every ball off the walls it crossed and off the paddle
    pub fn bounce_ball(&mut self) {
        let max_x = (self.cols - 1) as f64;
        let paddle = self.paddle.pos;
        for ball in &mut self.balls {
            reflect_off_bounds(ball, max_x, Y_TOP_BOUNDARY);
            rebound_off_paddle(ball, paddle);
        }
    }

    /// Speed of every ball, grid units per tick
    pub fn set_ball_speed(&mut self, speed: f64) -> HandlerResult {
        let speed = checked("ball_speed", speed, 0.0)?;
        for ball in &mut self.balls {
            ball.speed = speed;
        }
        Ok(())
    }

    pub fn set_ball_speed_named(&mut self, name: &str) -> HandlerResult {
        let value = speed::from_name(name).ok_or_else(|| HandlerError::UnknownValue(name.into()))?;
        self.set_ball_speed(value)
    }

    /// Distance the paddle moves per move command
    pub fn set_paddle_speed(&mut self, speed: f64) -> HandlerResult {
        self.paddle.speed = checked("paddle_speed", speed, 0.0)?;
        Ok(())
    }

    pub fn set_paddle_speed_named(&mut self, name: &str) -> HandlerResult {
        let value = speed::from_name(name).ok_or_else(|| HandlerError::UnknownValue(name.into()))?;
        self.set_paddle_speed(value)
    }

    pub fn play(&mut self, cue: SoundCue) {
        self.emit(GameEvent::Sound { cue });
    }

    /// Play a cue by its block name
    pub fn play_sound(&mut self, name: &str) -> HandlerResult {
        let cue = SoundCue::from_name(name).ok_or_else(|| HandlerError::UnknownValue(name.into()))?;
        self.play(cue);
        Ok(())
    }

    pub fn increment_player_score(&mut self) {
        self.player_score += 1;
    }

    pub fn increment_opponent_score(&mut self) {
        self.opponent_score += 1;
    }

    /// Pick one of `values` with the run's seeded RNG
    pub fn random<T: Clone>(&mut self, values: &[T]) -> Option<T> {
        if values.is_empty() {
            return None;
        }
        let i = self.rng.random_range(0..values.len());
        values.get(i).cloned()
    }
}

/// Authoritative bounce state after a tick
#[derive(Debug, Clone, Serialize)]
pub struct BounceSnapshot {
    pub tick: u64,
    pub balls: Vec<Ball>,
    pub paddle: DVec2,
    pub paddle_finishes: Vec<FinishMarker>,
    pub player_score: u32,
    pub opponent_score: u32,
}

/// The bounce game
pub struct Bounce {
    grid: Grid,
    world: BounceWorld,
    /// World as loaded, restored on reset
    initial: BounceWorld,
    handlers: HandlerTable<BounceTrigger, BounceWorld>,
    input: InputState,
    tasks: TaskQueue<BounceTask>,
    phase: RunPhase,
    tick_count: u64,
    tick_interval_ms: u32,
    tick_limit: TickLimit,
    offscreen_delay: u64,
    reset_delay: u64,
    paddle_finishes: Vec<FinishMarker>,
    ball_finish: Option<DVec2>,
    goal: Option<GoalCondition>,
}

impl Bounce {
    pub fn new(level: &LevelConfig, settings: &Settings) -> Result<Self, ConfigError> {
        level.expect_game(GameKind::Bounce)?;
        level.validate()?;
        let grid = level.grid()?;
        let markers = grid.scan_markers();

        let paddle_start = single_marker(&markers.paddle_starts, SquareType::PaddleStart)?;
        let heading = level.ball_direction.unwrap_or(DEFAULT_BALL_DIRECTION);
        let balls = markers
            .ball_starts
            .iter()
            .enumerate()
            .map(|(i, cell)| Ball::new(i as u32, cell.as_dvec2(), heading, level.ball_speed))
            .collect();

        let world = BounceWorld {
            cols: grid.cols(),
            rows: grid.rows(),
            balls,
            paddle: Paddle::new(paddle_start.as_dvec2(), level.paddle_speed),
            player_score: 0,
            opponent_score: 0,
            events: Vec::new(),
            rng: Pcg32::seed_from_u64(level.seed),
        };

        let tick_interval_ms = level.tick_interval_ms(settings);
        Ok(Self {
            initial: world.clone(),
            world,
            handlers: HandlerTable::default(),
            input: InputState::default(),
            tasks: TaskQueue::new(),
            phase: RunPhase::Idle,
            tick_count: 0,
            tick_interval_ms,
            tick_limit: level.tick_limit(tick_interval_ms),
            offscreen_delay: ms_to_ticks(settings.ball_offscreen_delay_ms, tick_interval_ms),
            reset_delay: ms_to_ticks(settings.ball_reset_delay_ms, tick_interval_ms),
            paddle_finishes: markers.paddle_finishes.iter().map(|&c| FinishMarker::at(c)).collect(),
            ball_finish: markers.ball_finishes.first().map(|c| c.as_dvec2()),
            goal: level.goal,
            grid,
        })
    }

    /// Reset, install the program and begin ticking
    pub fn start(&mut self, program: BounceProgram) {
        self.reset();
        self.handlers.install(program);
        self.phase = RunPhase::Running;
        log::info!(
            "Bounce run started: {} balls, {} paddle finishes",
            self.world.balls.len(),
            self.paddle_finishes.len()
        );
    }

    /// Stop ticking and drop handlers and pending tasks, keeping positions
    pub fn stop(&mut self) {
        self.tasks.clear();
        self.handlers.clear();
        if self.phase.is_running() {
            self.phase = RunPhase::Idle;
        }
    }

    pub fn world(&self) -> &BounceWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut BounceWorld {
        &mut self.world
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn paddle_finishes(&self) -> &[FinishMarker] {
        &self.paddle_finishes
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn handler_failures(&self) -> u32 {
        self.handlers.failures()
    }

    fn schedule_respawn(&mut self, index: usize) {
        let now = self.tick_count;
        self.tasks.schedule_at(now + self.offscreen_delay, BounceTask::Park(index));
        self.tasks.schedule_at(now + self.reset_delay, BounceTask::Respawn(index));
    }

    fn run_task(&mut self, task: BounceTask) {
        log::debug!("Tick {}: {:?}", self.tick_count, task);
        match task {
            BounceTask::Park(index) => {
                if let Some(ball) = self.world.balls.get_mut(index) {
                    ball.park_offscreen(OFFSCREEN_POSITION);
                    self.world.emit(GameEvent::BallParked { index });
                }
            }
            BounceTask::Respawn(index) => {
                if let Some(ball) = self.world.balls.get_mut(index) {
                    ball.respawn();
                    self.world.emit(GameEvent::BallRespawned { index });
                    self.world.play(SoundCue::Start);
                }
            }
        }
    }

    /// Move every ball and fire the triggers its new position causes
    fn move_balls(&mut self) {
        let max_x = (self.world.cols - 1) as f64;
        let bottom = (self.world.rows - 1) as f64;
        for i in 0..self.world.balls.len() {
            let before = self.world.balls[i].pos;
            self.world.balls[i].advance();
            let after = self.world.balls[i].pos;

            let x_ok = |x: f64| (0.0..=max_x).contains(&x);
            if x_ok(before.x) && !x_ok(after.x) {
                fire(&mut self.handlers, BounceTrigger::WhenWallCollided, &mut self.world);
            }

            if before.y >= 0.0 && after.y < 0.0 {
                let column = self.world.balls[i].pos.x.floor() as i32;
                if self.grid.classify(column, 0) == SquareType::Goal {
                    fire(&mut self.handlers, BounceTrigger::WhenBallInGoal, &mut self.world);
                    self.schedule_respawn(i);
                } else {
                    fire(&mut self.handlers, BounceTrigger::WhenWallCollided, &mut self.world);
                }
            }

            // Handlers may have moved the ball or the paddle
            if touches_paddle(self.world.balls[i].pos, self.world.paddle.pos) {
                fire(&mut self.handlers, BounceTrigger::WhenPaddleCollided, &mut self.world);
            } else if before.y <= bottom && after.y > bottom {
                fire(&mut self.handlers, BounceTrigger::WhenBallMissesPaddle, &mut self.world);
                self.schedule_respawn(i);
            }
        }
    }

    /// Mark reached finishes; true once the level's finish condition holds
    fn finishes_complete(&mut self) -> bool {
        if !self.paddle_finishes.is_empty() {
            let progress = update_finishes(&mut self.paddle_finishes, self.world.paddle.pos);
            for &index in &progress.newly_finished {
                self.world.emit(GameEvent::FinishReached { index });
            }
            if !progress.newly_finished.is_empty() {
                let cue = if progress.all_finished {
                    SoundCue::Win
                } else {
                    SoundCue::WinGoal
                };
                self.world.play(cue);
            }
            return progress.all_finished;
        }
        let Some(target) = self.ball_finish else {
            return false;
        };
        if self.world.balls.iter().any(|b| at_position(b.pos, target)) {
            self.world.emit(GameEvent::FinishReached { index: 0 });
            self.world.play(SoundCue::Win);
            return true;
        }
        false
    }

    fn goal_met(&self) -> bool {
        match self.goal {
            Some(GoalCondition::PlayerScore { at_least }) => self.world.player_score >= at_least,
            Some(GoalCondition::ObstaclesPassed { .. } | GoalCondition::Survive) | None => false,
        }
    }

    fn evaluate(&mut self) -> Outcome {
        if self.finishes_complete() || self.goal_met() {
            Outcome::Success
        } else if self.tick_limit.expired(self.tick_count) {
            Outcome::Failure
        } else {
            Outcome::Unset
        }
    }

    fn finish(&mut self, outcome: Outcome) -> RunReport {
        self.tasks.clear();
        self.handlers.clear();
        self.phase = RunPhase::Finished(outcome.clone());
        RunReport::new(outcome, self.tick_count)
    }
}

impl Simulation for Bounce {
    type Snapshot = BounceSnapshot;

    fn phase(&self) -> &RunPhase {
        &self.phase
    }

    fn tick(&mut self) -> Option<RunReport> {
        if !self.phase.is_running() {
            return None;
        }
        self.tick_count += 1;

        for task in self.tasks.pop_due(self.tick_count) {
            self.run_task(task);
        }

        for arrow in self.input.held() {
            fire(&mut self.handlers, BounceTrigger::for_arrow(arrow), &mut self.world);
        }

        self.move_balls();

        let outcome = self.evaluate();
        outcome.is_terminal().then(|| self.finish(outcome))
    }

    fn tick_interval_ms(&self) -> u32 {
        self.tick_interval_ms
    }

    fn snapshot(&self) -> BounceSnapshot {
        BounceSnapshot {
            tick: self.tick_count,
            balls: self.world.balls.clone(),
            paddle: self.world.paddle.pos,
            paddle_finishes: self.paddle_finishes.clone(),
            player_score: self.world.player_score,
            opponent_score: self.world.opponent_score,
        }
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.world.events)
    }

    fn reset(&mut self) {
        self.tasks.clear();
        self.handlers.clear();
        self.input.clear();
        self.world = self.initial.clone();
        for marker in &mut self.paddle_finishes {
            marker.finished = false;
        }
        self.tick_count = 0;
        self.phase = RunPhase::Idle;
    }

    fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::MapCell;
    use crate::sim::scheduler::{GameLoop, RunObserver};
    use std::cell::RefCell;
    use std::f64::consts::{FRAC_PI_2, PI};
    use std::rc::Rc;

    fn level(map: &[&[i64]]) -> LevelConfig {
        LevelConfig {
            game: GameKind::Bounce,
            map: map
                .iter()
                .map(|row| row.iter().map(|&c| MapCell::Code(c)).collect())
                .collect(),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct Events(Vec<GameEvent>);

    impl RunObserver<BounceSnapshot> for Events {
        fn on_event(&mut self, event: &GameEvent) {
            self.0.push(event.clone());
        }
    }

    fn triggered(events: &[GameEvent], name: &str) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, GameEvent::Trigger { name: n } if *n == name))
            .count()
    }

    #[test]
    fn test_paddle_rebound_leaves_flat_band() {
        let level = level(&[&[0, 0, 0, 0, 0], &[0, 6, 0, 0, 0], &[0, 0, 0, 7, 0]]);
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        bounce.start(BounceProgram::new().on(BounceTrigger::WhenPaddleCollided, |w| {
            w.bounce_ball();
            Ok(())
        }));
        let paddle = bounce.world().paddle.pos;
        let ball = &mut bounce.world_mut().balls[0];
        ball.pos = paddle - DVec2::new(0.0, 0.05);
        ball.set_heading(PI);

        bounce.tick();
        let heading = bounce.world().balls[0].heading;
        assert!(heading <= FRAC_PI_2 - 0.2 || heading >= 3.0 * FRAC_PI_2 + 0.2);
        assert!(heading.cos() > 0.0, "ball now travels upward");
    }

    #[test]
    fn test_timeout_stops_ticking() {
        let mut level = level(&[&[0, 0, 0], &[0, 7, 0]]);
        level.timeout_failure_tick = Some(2);
        let mut game = GameLoop::new(Bounce::new(&level, &Settings::default()).unwrap());
        game.sim_mut().start(BounceProgram::new());

        let mut events = Events::default();
        let report = game.run_to_completion(100, &mut events).unwrap();
        assert_eq!(report.outcome, Outcome::Failure);
        assert_eq!(report.tick_count, 3);
        assert!(!report.result);

        assert!(game.step(&mut events).is_none());
        assert_eq!(game.sim().tick_count(), 3);
    }

    #[test]
    fn test_multi_finish() {
        let mut level = level(&[&[0, 0, 0, 0, 0], &[7, 0, 3, 0, 3]]);
        level.paddle_speed = 1.0;
        let mut game = GameLoop::new(Bounce::new(&level, &Settings::default()).unwrap());
        game.sim_mut().start(BounceProgram::new().on(BounceTrigger::WhenRight, |w| {
            w.move_right();
            Ok(())
        }));
        game.sim_mut().input_mut().key_down(Arrow::Right);

        let mut events = Events::default();
        game.step(&mut events);
        game.step(&mut events);
        assert!(game.sim().paddle_finishes()[0].finished);
        assert!(!game.sim().paddle_finishes()[1].finished);
        assert!(game.sim().phase().is_running());
        assert!(events.0.contains(&GameEvent::Sound { cue: SoundCue::WinGoal }));

        game.step(&mut events);
        let report = game.step(&mut events).unwrap();
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.tick_count, 4);
        assert!(events.0.contains(&GameEvent::Sound { cue: SoundCue::Win }));
    }

    fn falling_ball_level() -> LevelConfig {
        let mut level = level(&[&[0, 0, 0, 0, 0], &[6, 0, 0, 0, 0], &[0, 0, 0, 0, 7]]);
        level.ball_direction = Some(PI);
        level.ball_speed = 0.5;
        level
    }

    #[test]
    fn test_miss_schedules_respawn() {
        let settings = Settings {
            ball_offscreen_delay_ms: 33,
            ball_reset_delay_ms: 99,
            ..Default::default()
        };
        let mut game = GameLoop::new(Bounce::new(&falling_ball_level(), &settings).unwrap());
        game.sim_mut().start(BounceProgram::new());
        let mut events = Events::default();

        game.run_to_completion(3, &mut events);
        assert_eq!(triggered(&events.0, "whenBallMissesPaddle"), 1);
        assert_eq!(game.sim().pending_tasks(), 2);

        // Parked at the start of tick 4, then moved east by that tick's motion
        game.step(&mut events);
        assert!(events.0.contains(&GameEvent::BallParked { index: 0 }));
        assert!(game.sim().world().balls[0].pos.x >= OFFSCREEN_POSITION);
        assert_eq!(game.sim().world().balls[0].pos.y, OFFSCREEN_POSITION);

        // Respawned at the start of tick 6, then one step of falling
        game.run_to_completion(2, &mut events);
        let ball = &game.sim().world().balls[0];
        assert!(ball.pos.x.abs() < 1e-9);
        assert_eq!(ball.pos.y, 1.5);
        assert!(events.0.contains(&GameEvent::BallRespawned { index: 0 }));
        assert!(events.0.contains(&GameEvent::Sound { cue: SoundCue::Start }));
    }

    #[test]
    fn test_reset_cancels_pending_respawn() {
        let mut game = GameLoop::new(Bounce::new(&falling_ball_level(), &Settings::default()).unwrap());
        game.sim_mut().start(BounceProgram::new());
        let mut events = Events::default();
        game.run_to_completion(3, &mut events);
        assert_eq!(game.sim().pending_tasks(), 2);

        game.reset();
        assert_eq!(game.sim().pending_tasks(), 0);
        // Advancing an idle game does nothing
        game.advance(10_000.0, &mut events);
        assert_eq!(game.sim().world().balls[0].pos, DVec2::new(0.0, 1.0));

        // A fresh run where the ball flies up never sees the old respawn
        game.sim_mut().start(BounceProgram::new());
        game.sim_mut().world_mut().balls[0].set_heading(0.0);
        events.0.clear();
        game.run_to_completion(200, &mut events);
        assert!(!events.0.iter().any(|e| matches!(e, GameEvent::BallParked { .. })));
        assert!(game.sim().world().balls[0].pos.y < 0.0);
    }

    #[test]
    fn test_unhandled_trigger_is_noop() {
        let mut level = level(&[&[0, 0, 0], &[0, 6, 0], &[0, 0, 7]]);
        level.ball_direction = Some(0.0);
        level.ball_speed = 1.5;
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        bounce.start(BounceProgram::new());
        bounce.tick();
        let events = bounce.drain_events();
        assert_eq!(triggered(&events, "whenWallCollided"), 1);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::HandlerFailed { .. })));
        // Pure motion, no reflection
        let ball = &bounce.world().balls[0];
        assert!((ball.pos.y + 0.5).abs() < 1e-12);
        assert_eq!(ball.heading, 0.0);
    }

    #[test]
    fn test_held_keys_fire_before_motion() {
        let mut level = level(&[&[0, 0, 0], &[0, 6, 0], &[0, 0, 7]]);
        level.ball_direction = Some(FRAC_PI_2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let record = Rc::clone(&seen);
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        bounce.start(BounceProgram::new().on(BounceTrigger::WhenLeft, move |w| {
            record.borrow_mut().push(w.balls[0].pos);
            w.move_left();
            Ok(())
        }));
        bounce.input_mut().key_down(Arrow::Left);
        bounce.tick();
        assert_eq!(seen.borrow()[0], DVec2::new(1.0, 1.0));
        assert!(bounce.world().balls[0].pos.x > 1.0);
        assert!((bounce.world().paddle.pos.x - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_ball_in_goal() {
        // Goal square above column 1
        let mut level = level(&[&[1, 2, 1], &[0, 6, 0], &[0, 0, 7]]);
        level.ball_direction = Some(0.0);
        level.ball_speed = 0.6;
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        bounce.start(BounceProgram::new().on(BounceTrigger::WhenBallInGoal, |w| {
            w.increment_player_score();
            Ok(())
        }));
        bounce.tick();
        bounce.tick();
        assert_eq!(bounce.world().player_score, 1);
        assert_eq!(bounce.pending_tasks(), 2);
    }

    #[test]
    fn test_score_goal_succeeds() {
        let mut level = level(&[&[0, 0, 0], &[0, 7, 0]]);
        level.goal = Some(GoalCondition::PlayerScore { at_least: 2 });
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        bounce.start(BounceProgram::new().on(BounceTrigger::WhenUp, |w| {
            w.increment_player_score();
            Ok(())
        }));
        bounce.input_mut().button_down(Arrow::Up);
        assert!(bounce.tick().is_none());
        let report = bounce.tick().unwrap();
        assert!(report.result);
        assert_eq!(report.outcome_code, 1);
    }

    #[test]
    fn test_failing_handler_is_swallowed() {
        let level = level(&[&[0, 0, 0], &[0, 7, 0]]);
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        bounce.start(
            BounceProgram::new()
                .on(BounceTrigger::WhenLeft, |w| w.play_sound("kazoo"))
                .on(BounceTrigger::WhenRight, |w| {
                    w.move_right();
                    Ok(())
                }),
        );
        bounce.input_mut().key_down(Arrow::Left);
        bounce.input_mut().key_down(Arrow::Right);
        bounce.tick();
        let events = bounce.drain_events();
        assert!(events.contains(&GameEvent::HandlerFailed { trigger: "whenLeft" }));
        assert_eq!(bounce.handler_failures(), 1);
        // The right handler still ran
        assert!((bounce.world().paddle.pos.x - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_set_ball_speed_rejects_nan() {
        let level = level(&[&[0, 0, 0, 0, 0], &[0, 0, 6, 0, 0], &[0, 0, 0, 0, 0], &[0, 0, 7, 0, 0]]);
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        let speed = bounce.world().balls[0].speed;
        bounce.start(BounceProgram::new().on(BounceTrigger::WhenLeft, |w: &mut BounceWorld| {
            w.set_ball_speed(f64::NAN)
        }));
        bounce.input_mut().key_down(Arrow::Left);
        for _ in 0..3 {
            bounce.tick();
        }
        assert_eq!(bounce.handler_failures(), 3);
        let ball = &bounce.world().balls[0];
        assert_eq!(ball.speed, speed);
        assert!(ball.pos.is_finite());
    }

    #[test]
    fn test_set_paddle_speed_rejects_non_finite() {
        let level = level(&[&[6, 0, 0], &[0, 7, 0]]);
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        let world = bounce.world_mut();
        let speed = world.paddle.speed;
        assert!(world.set_paddle_speed(f64::INFINITY).is_err());
        assert!(world.set_paddle_speed(f64::NAN).is_err());
        assert!(world.set_paddle_speed(-1.0).is_err());
        assert_eq!(world.paddle.speed, speed);
        world.move_left();
        assert!(world.paddle.pos.is_finite());
        assert!(world.set_ball_speed(f64::NEG_INFINITY).is_err());
        assert!(world.set_ball_speed(0.2).is_ok());
        assert_eq!(world.balls[0].speed, 0.2);
    }

    #[test]
    fn test_api_speeds_and_random() {
        let level = level(&[&[6, 0, 0], &[0, 7, 0]]);
        let mut bounce = Bounce::new(&level, &Settings::default()).unwrap();
        let world = bounce.world_mut();
        world.set_ball_speed_named("very_fast").unwrap();
        assert_eq!(world.balls[0].speed, speed::VERY_FAST);
        assert!(world.set_paddle_speed_named("warp").is_err());
        assert_eq!(world.random::<u8>(&[]), None);
        let pick = world.random(&[1, 2, 3]).unwrap();
        assert!((1..=3).contains(&pick));
    }

    #[test]
    fn test_wrong_game_rejected() {
        let mut level = level(&[&[0, 7]]);
        level.game = GameKind::Flappy;
        assert!(matches!(
            Bounce::new(&level, &Settings::default()),
            Err(ConfigError::WrongGame { .. })
        ));
    }
}
