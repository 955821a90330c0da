//! Side-scrolling obstacle game
//!
//! The avatar stays at a fixed column while obstacles scroll left past it.
//! Nothing moves until the first click; after that gravity pulls the avatar
//! down every tick and handlers usually answer clicks with a flap.

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use super::{EventLog, MIN_GAP_HEIGHT, checked, fire};
use crate::audio::SoundCue;
use crate::error::{ConfigError, HandlerError};
use crate::level::{FlappyTuning, GameKind, GoalCondition, LevelConfig};
use crate::settings::Settings;
use crate::sim::collision::{Aabb, GapColumn};
use crate::sim::grid::{Grid, SquareType, single_marker};
use crate::sim::handlers::{HandlerResult, HandlerTable, Trigger, UserProgram};
use crate::sim::input::{Arrow, InputState};
use crate::sim::outcome::{Outcome, RunReport, TickLimit, update_finishes};
use crate::sim::scheduler::{RunPhase, Simulation};
use crate::sim::state::{Avatar, FinishMarker, GameEvent};

/// Side of the avatar's square hit box, in cells
const AVATAR_SIZE: f64 = 0.8;

/// Conditions that invoke flappy handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlappyTrigger {
    WhenClick,
    WhenLeft,
    WhenUp,
    WhenRight,
    WhenDown,
    WhenCollideGround,
    WhenEnterObstacle,
    WhenCollideObstacle,
    WhenGameStarts,
}

impl FlappyTrigger {
    pub fn for_arrow(arrow: Arrow) -> Self {
        match arrow {
            Arrow::Left => FlappyTrigger::WhenLeft,
            Arrow::Up => FlappyTrigger::WhenUp,
            Arrow::Right => FlappyTrigger::WhenRight,
            Arrow::Down => FlappyTrigger::WhenDown,
        }
    }
}

impl Trigger for FlappyTrigger {
    fn name(self) -> &'static str {
        match self {
            FlappyTrigger::WhenClick => "whenClick",
            FlappyTrigger::WhenLeft => "whenLeft",
            FlappyTrigger::WhenUp => "whenUp",
            FlappyTrigger::WhenRight => "whenRight",
            FlappyTrigger::WhenDown => "whenDown",
            FlappyTrigger::WhenCollideGround => "whenCollideGround",
            FlappyTrigger::WhenEnterObstacle => "whenEnterObstacle",
            FlappyTrigger::WhenCollideObstacle => "whenCollideObstacle",
            FlappyTrigger::WhenGameStarts => "whenGameStarts",
        }
    }
}

/// Compiled flappy program
pub type FlappyProgram = UserProgram<FlappyTrigger, FlappyWorld>;

/// A scrolling column with an open band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Obstacle {
    /// Spawn order, stable for the whole run
    pub id: usize,
    /// Left edge
    pub x: f64,
    pub width: f64,
    pub gap_center: f64,
    pub gap_height: f64,
    entered: bool,
    collided: bool,
    passed: bool,
}

impl Obstacle {
    fn new(id: usize, x: f64, width: f64, gap_center: f64, gap_height: f64) -> Self {
        Self {
            id,
            x,
            width,
            gap_center,
            gap_height,
            entered: false,
            collided: false,
            passed: false,
        }
    }

    pub fn column(&self) -> GapColumn {
        let half = self.gap_height * 0.5;
        GapColumn {
            x: self.x,
            width: self.width,
            gap_top: self.gap_center - half,
            gap_bottom: self.gap_center + half,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Mutable flappy state; also the API surface handed to handlers
#[derive(Debug, Clone)]
pub struct FlappyWorld {
    cols: usize,
    rows: usize,
    pub avatar: Avatar,
    /// Obstacles still on screen or to its right, in spawn order
    pub obstacles: Vec<Obstacle>,
    pub player_score: u32,
    pub obstacles_passed: u32,
    tuning: FlappyTuning,
    /// Set by the first click; gravity and scrolling wait for it
    started: bool,
    ended: bool,
    next_obstacle_id: usize,
    events: Vec<GameEvent>,
    rng: Pcg32,
}

impl EventLog for FlappyWorld {
    fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

impl FlappyWorld {
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn floor(&self) -> f64 {
        (self.rows - 1) as f64
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn tuning(&self) -> &FlappyTuning {
        &self.tuning
    }

    /// Kick the avatar upward
    pub fn flap(&mut self) {
        self.avatar.velocity = -self.tuning.flap_velocity;
    }

    pub fn set_gravity(&mut self, gravity: f64) -> HandlerResult {
        self.tuning.gravity = checked("gravity", gravity, 0.0)?;
        Ok(())
    }

    pub fn set_scroll_speed(&mut self, speed: f64) -> HandlerResult {
        self.tuning.scroll_speed = checked("scroll_speed", speed, 0.0)?;
        Ok(())
    }

    /// Applies to obstacles spawned from now on
    pub fn set_gap_height(&mut self, height: f64) -> HandlerResult {
        self.tuning.gap_height = checked("gap_height", height, MIN_GAP_HEIGHT)?;
        Ok(())
    }

    /// Ask for the run to end after this tick
    pub fn end_game(&mut self) {
        self.ended = true;
    }

    pub fn increment_player_score(&mut self) {
        self.player_score += 1;
    }

    pub fn play(&mut self, cue: SoundCue) {
        self.emit(GameEvent::Sound { cue });
    }

    pub fn play_sound(&mut self, name: &str) -> HandlerResult {
        let cue = SoundCue::from_name(name).ok_or_else(|| HandlerError::UnknownValue(name.into()))?;
        self.play(cue);
        Ok(())
    }

    fn hit_box(&self) -> Aabb {
        Aabb::centered(self.avatar.pos, DVec2::splat(AVATAR_SIZE))
    }

    /// Gap center drawn so the whole band fits between ceiling and floor
    fn random_gap_center(&mut self) -> f64 {
        let half = self.tuning.gap_height * 0.5;
        let floor = self.floor();
        if floor - half > half {
            self.rng.random_range(half..=floor - half)
        } else {
            floor * 0.5
        }
    }

    fn push_obstacle(&mut self, x: f64, gap_center: f64) {
        let id = self.next_obstacle_id;
        self.next_obstacle_id += 1;
        self.obstacles.push(Obstacle::new(
            id,
            x,
            self.tuning.obstacle_width,
            gap_center,
            self.tuning.gap_height,
        ));
    }

    /// Keep one obstacle per `obstacle_spacing` entering from the right edge
    fn spawn_obstacles(&mut self) {
        if !self.tuning.spawn_obstacles {
            return;
        }
        let right_edge = self.cols as f64;
        let next_x = match self.obstacles.last() {
            Some(last) => last.x + self.tuning.obstacle_spacing,
            None => right_edge,
        };
        if next_x <= right_edge {
            let center = self.random_gap_center();
            self.push_obstacle(next_x, center);
            log::debug!("Spawned obstacle at x={:.2}, gap center {:.2}", next_x, center);
        }
    }
}

/// Authoritative flappy state after a tick
#[derive(Debug, Clone, Serialize)]
pub struct FlappySnapshot {
    pub tick: u64,
    pub avatar: DVec2,
    pub velocity: f64,
    pub obstacles: Vec<Obstacle>,
    pub paddle_finishes: Vec<FinishMarker>,
    pub player_score: u32,
    pub obstacles_passed: u32,
}

/// The flappy game
pub struct Flappy {
    grid: Grid,
    world: FlappyWorld,
    initial: FlappyWorld,
    handlers: HandlerTable<FlappyTrigger, FlappyWorld>,
    input: InputState,
    phase: RunPhase,
    tick_count: u64,
    tick_interval_ms: u32,
    tick_limit: TickLimit,
    paddle_finishes: Vec<FinishMarker>,
    goal: Option<GoalCondition>,
}

impl Flappy {
    pub fn new(level: &LevelConfig, settings: &Settings) -> Result<Self, ConfigError> {
        level.expect_game(GameKind::Flappy)?;
        level.validate()?;
        let grid = level.grid()?;
        let markers = grid.scan_markers();
        let start = single_marker(&markers.paddle_starts, SquareType::PaddleStart)?;

        let mut world = FlappyWorld {
            cols: grid.cols(),
            rows: grid.rows(),
            avatar: Avatar::new(start.as_dvec2()),
            obstacles: Vec::new(),
            player_score: 0,
            obstacles_passed: 0,
            tuning: level.flappy.clone(),
            started: false,
            ended: false,
            next_obstacle_id: 0,
            events: Vec::new(),
            rng: Pcg32::seed_from_u64(level.seed),
        };
        // An OBSTACLE square marks a column centered on that square, gap included
        let half_width = level.flappy.obstacle_width * 0.5;
        let mut columns: Vec<i32> = Vec::new();
        for cell in &markers.obstacles {
            if columns.contains(&cell.x) {
                continue;
            }
            columns.push(cell.x);
            world.push_obstacle(cell.x as f64 - half_width, cell.y as f64);
        }
        world.obstacles.sort_by(|a, b| a.x.total_cmp(&b.x));

        let tick_interval_ms = level.tick_interval_ms(settings);
        Ok(Self {
            initial: world.clone(),
            world,
            handlers: HandlerTable::default(),
            input: InputState::default(),
            phase: RunPhase::Idle,
            tick_count: 0,
            tick_interval_ms,
            tick_limit: level.tick_limit(tick_interval_ms),
            paddle_finishes: markers.paddle_finishes.iter().map(|&c| FinishMarker::at(c)).collect(),
            goal: level.goal,
            grid,
        })
    }

    pub fn start(&mut self, program: FlappyProgram) {
        self.reset();
        self.handlers.install(program);
        self.phase = RunPhase::Running;
        log::info!(
            "Flappy run started: {} obstacles, {} paddle finishes",
            self.world.obstacles.len(),
            self.paddle_finishes.len()
        );
    }

    pub fn stop(&mut self) {
        self.handlers.clear();
        if self.phase.is_running() {
            self.phase = RunPhase::Idle;
        }
    }

    pub fn world(&self) -> &FlappyWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut FlappyWorld {
        &mut self.world
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn handler_failures(&self) -> u32 {
        self.handlers.failures()
    }

    /// Scroll every obstacle and fire the triggers the avatar causes
    fn scroll_obstacles(&mut self) {
        let speed = self.world.tuning.scroll_speed;
        for obstacle in &mut self.world.obstacles {
            obstacle.x -= speed;
        }

        for i in 0..self.world.obstacles.len() {
            let body = self.world.hit_box();
            let obstacle = self.world.obstacles[i];
            let column = obstacle.column();

            if !obstacle.entered && column.spans(&body) {
                self.world.obstacles[i].entered = true;
                fire(&mut self.handlers, FlappyTrigger::WhenEnterObstacle, &mut self.world);
            }
            if !obstacle.collided && column.collides(&body) {
                self.world.obstacles[i].collided = true;
                fire(&mut self.handlers, FlappyTrigger::WhenCollideObstacle, &mut self.world);
            }
            if !obstacle.passed && obstacle.right() < body.min.x {
                self.world.obstacles[i].passed = true;
                self.world.obstacles_passed += 1;
                self.world.emit(GameEvent::ObstaclePassed { index: obstacle.id });
            }
        }

        self.world.obstacles.retain(|o| o.right() >= 0.0);
        self.world.spawn_obstacles();
    }

    fn goal_met(&self) -> bool {
        match self.goal {
            Some(GoalCondition::PlayerScore { at_least }) => self.world.player_score >= at_least,
            Some(GoalCondition::ObstaclesPassed { at_least }) => {
                self.world.obstacles_passed >= at_least
            }
            Some(GoalCondition::Survive) | None => false,
        }
    }

    fn evaluate(&mut self) -> Outcome {
        if !self.paddle_finishes.is_empty() {
            let progress = update_finishes(&mut self.paddle_finishes, self.world.avatar.pos);
            for &index in &progress.newly_finished {
                self.world.emit(GameEvent::FinishReached { index });
            }
            if progress.all_finished {
                self.world.play(SoundCue::Win);
                return Outcome::Success;
            }
            if !progress.newly_finished.is_empty() {
                self.world.play(SoundCue::WinGoal);
            }
        }
        if self.goal_met() {
            self.world.play(SoundCue::Win);
            return Outcome::Success;
        }
        if self.world.ended {
            return if self.goal == Some(GoalCondition::Survive) {
                self.world.play(SoundCue::Win);
                Outcome::Success
            } else {
                self.world.play(SoundCue::Failure);
                Outcome::Failure
            };
        }
        if self.tick_limit.expired(self.tick_count) {
            self.world.play(SoundCue::Failure);
            return Outcome::Failure;
        }
        Outcome::Unset
    }

    fn finish(&mut self, outcome: Outcome) -> RunReport {
        self.handlers.clear();
        self.phase = RunPhase::Finished(outcome.clone());
        RunReport::new(outcome, self.tick_count)
    }
}

impl Simulation for Flappy {
    type Snapshot = FlappySnapshot;

    fn phase(&self) -> &RunPhase {
        &self.phase
    }

    fn tick(&mut self) -> Option<RunReport> {
        if !self.phase.is_running() {
            return None;
        }
        self.tick_count += 1;

        if self.tick_count == 1 {
            fire(&mut self.handlers, FlappyTrigger::WhenGameStarts, &mut self.world);
        }

        if self.input.take_click() {
            self.world.started = true;
            fire(&mut self.handlers, FlappyTrigger::WhenClick, &mut self.world);
        }

        for arrow in self.input.held() {
            fire(&mut self.handlers, FlappyTrigger::for_arrow(arrow), &mut self.world);
        }

        if self.world.started {
            let gravity = self.world.tuning.gravity;
            let floor = self.world.floor();
            if self.world.avatar.fall(gravity, 0.0, floor) {
                fire(&mut self.handlers, FlappyTrigger::WhenCollideGround, &mut self.world);
            }
            self.scroll_obstacles();
        }

        let outcome = self.evaluate();
        outcome.is_terminal().then(|| self.finish(outcome))
    }

    fn tick_interval_ms(&self) -> u32 {
        self.tick_interval_ms
    }

    fn snapshot(&self) -> FlappySnapshot {
        FlappySnapshot {
            tick: self.tick_count,
            avatar: self.world.avatar.pos,
            velocity: self.world.avatar.velocity,
            obstacles: self.world.obstacles.clone(),
            paddle_finishes: self.paddle_finishes.clone(),
            player_score: self.world.player_score,
            obstacles_passed: self.world.obstacles_passed,
        }
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.world.events)
    }

    fn reset(&mut self) {
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
    use crate::sim::scheduler::{GameLoop, NullObserver};

    fn level(map: &[&[i64]], tuning: FlappyTuning) -> LevelConfig {
        LevelConfig {
            game: GameKind::Flappy,
            map: map
                .iter()
                .map(|row| row.iter().map(|&c| MapCell::Code(c)).collect())
                .collect(),
            flappy: tuning,
            ..Default::default()
        }
    }

    fn still_air() -> FlappyTuning {
        FlappyTuning {
            gravity: 0.0,
            scroll_speed: 0.5,
            gap_height: 1.0,
            spawn_obstacles: false,
            ..Default::default()
        }
    }

    /// Avatar at (1, 2); obstacle column centered on x = 3 with its gap on row `gap_row`
    fn corridor(gap_row: usize) -> LevelConfig {
        let mut rows: Vec<Vec<i64>> = vec![vec![0; 6]; 5];
        rows[2][1] = 7;
        rows[gap_row][3] = 5;
        let refs: Vec<&[i64]> = rows.iter().map(|r| r.as_slice()).collect();
        level(&refs, still_air())
    }

    #[test]
    fn test_gravity_waits_for_first_click() {
        let lvl = level(&[&[0, 0, 0], &[0, 7, 0], &[0, 0, 0], &[0, 0, 0]], FlappyTuning::default());
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new());
        for _ in 0..5 {
            flappy.tick();
        }
        assert_eq!(flappy.world().avatar.pos.y, 1.0);

        flappy.input_mut().click();
        flappy.tick();
        assert!(flappy.world().started());
        assert!((flappy.world().avatar.velocity - 0.005).abs() < 1e-12);
        assert!((flappy.world().avatar.pos.y - 1.005).abs() < 1e-12);
    }

    #[test]
    fn test_click_handler_flaps_before_gravity() {
        let lvl = level(&[&[0, 0, 0], &[0, 7, 0], &[0, 0, 0], &[0, 0, 0]], FlappyTuning::default());
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenClick, |w: &mut FlappyWorld| {
            w.flap();
            Ok(())
        }));
        flappy.input_mut().click();
        flappy.tick();
        assert!((flappy.world().avatar.velocity + 0.105).abs() < 1e-12);

        // Click is edge-triggered: no second flap
        flappy.tick();
        assert!((flappy.world().avatar.velocity + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_game_starts_fires_once() {
        let lvl = level(&[&[0, 7, 0], &[0, 0, 0]], FlappyTuning::default());
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenGameStarts, |w: &mut FlappyWorld| {
            w.increment_player_score();
            Ok(())
        }));
        for _ in 0..4 {
            flappy.tick();
        }
        assert_eq!(flappy.world().player_score, 1);
        assert_eq!(
            flappy.drain_events().first(),
            Some(&GameEvent::Trigger {
                name: "whenGameStarts"
            })
        );
    }

    #[test]
    fn test_ground_collision_fires_on_landing() {
        let tuning = FlappyTuning {
            gravity: 0.2,
            spawn_obstacles: false,
            ..Default::default()
        };
        let lvl = level(&[&[0, 7, 0], &[0, 0, 0], &[0, 0, 0]], tuning);
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenCollideGround, |w: &mut FlappyWorld| {
            w.increment_player_score();
            Ok(())
        }));
        flappy.input_mut().click();
        for _ in 0..20 {
            flappy.tick();
        }
        assert_eq!(flappy.world().avatar.pos.y, 2.0);
        assert_eq!(flappy.world().player_score, 1);
    }

    #[test]
    fn test_obstacle_enter_and_collide_fire_once() {
        let mut flappy = Flappy::new(&corridor(0), &Settings::default()).unwrap();
        flappy.start(
            FlappyProgram::new()
                .on(FlappyTrigger::WhenEnterObstacle, |w: &mut FlappyWorld| {
                    w.increment_player_score();
                    Ok(())
                })
                .on(FlappyTrigger::WhenCollideObstacle, |w: &mut FlappyWorld| {
                    w.player_score += 10;
                    Ok(())
                }),
        );
        flappy.input_mut().click();
        assert_eq!(flappy.world().obstacles[0].x, 2.5);
        for _ in 0..2 {
            flappy.tick();
        }
        assert_eq!(flappy.world().player_score, 0);

        // Column left edge reaches x = 1.0 on tick 3
        flappy.tick();
        assert_eq!(flappy.world().player_score, 11);
        flappy.tick();
        flappy.tick();
        assert_eq!(flappy.world().player_score, 11);
        assert_eq!(flappy.world().obstacles_passed, 0);

        flappy.drain_events();
        flappy.tick();
        assert_eq!(flappy.world().obstacles_passed, 1);
        assert!(flappy
            .drain_events()
            .contains(&GameEvent::ObstaclePassed { index: 0 }));
    }

    #[test]
    fn test_clean_pass_meets_obstacle_goal() {
        let mut lvl = corridor(2);
        lvl.goal = Some(GoalCondition::ObstaclesPassed { at_least: 1 });
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenCollideObstacle, |w: &mut FlappyWorld| {
            w.end_game();
            Ok(())
        }));
        flappy.input_mut().click();

        let mut game = GameLoop::new(flappy);
        let report = game.run_to_completion(100, &mut NullObserver).unwrap();
        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.tick_count, 6);
    }

    #[test]
    fn test_end_game_outcome_depends_on_goal() {
        let end_on_start = || {
            FlappyProgram::new().on(FlappyTrigger::WhenGameStarts, |w: &mut FlappyWorld| {
                w.end_game();
                Ok(())
            })
        };
        let mut lvl = level(&[&[0, 7, 0], &[0, 0, 0]], FlappyTuning::default());
        lvl.goal = Some(GoalCondition::Survive);
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(end_on_start());
        assert_eq!(flappy.tick().unwrap().outcome, Outcome::Success);

        lvl.goal = Some(GoalCondition::PlayerScore { at_least: 3 });
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(end_on_start());
        assert_eq!(flappy.tick().unwrap().outcome, Outcome::Failure);
    }

    #[test]
    fn test_falling_onto_finish_succeeds() {
        let tuning = FlappyTuning {
            spawn_obstacles: false,
            ..Default::default()
        };
        let lvl = level(&[&[0, 0, 0], &[0, 7, 0], &[0, 0, 0], &[0, 3, 0]], tuning);
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new());
        flappy.input_mut().click();
        let mut game = GameLoop::new(flappy);
        let report = game.run_to_completion(500, &mut NullObserver).unwrap();
        assert!(report.result);
        assert!(game.sim().snapshot().paddle_finishes[0].finished);
    }

    #[test]
    fn test_timeout_is_failure_with_cue() {
        let mut lvl = level(&[&[0, 7, 0], &[0, 0, 0]], FlappyTuning::default());
        lvl.timeout_failure_tick = Some(3);
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new());
        for _ in 0..3 {
            assert!(flappy.tick().is_none());
        }
        let report = flappy.tick().unwrap();
        assert_eq!(report.outcome, Outcome::Failure);
        assert_eq!(report.outcome_code, -1);
        assert!(flappy
            .drain_events()
            .contains(&GameEvent::Sound { cue: SoundCue::Failure }));
        assert!(flappy.tick().is_none());
    }

    #[test]
    fn test_spawned_gaps_follow_seed() {
        let mut rows: Vec<Vec<i64>> = vec![vec![0; 8]; 8];
        rows[4][1] = 7;
        let refs: Vec<&[i64]> = rows.iter().map(|r| r.as_slice()).collect();
        let tuning = FlappyTuning {
            gravity: 0.0,
            ..Default::default()
        };
        let mut lvl = level(&refs, tuning);
        lvl.seed = 7;

        let run = |lvl: &LevelConfig| {
            let mut flappy = Flappy::new(lvl, &Settings::default()).unwrap();
            flappy.start(FlappyProgram::new());
            flappy.input_mut().click();
            for _ in 0..200 {
                flappy.tick();
            }
            flappy.world().obstacles.clone()
        };
        let a = run(&lvl);
        let b = run(&lvl);
        assert!(a.len() >= 2);
        assert_eq!(a, b);
        for pair in a.windows(2) {
            assert!((pair[1].x - pair[0].x - 4.0).abs() < 1e-9);
        }
        for o in &a {
            assert!(o.gap_center - o.gap_height / 2.0 >= 0.0);
            assert!(o.gap_center + o.gap_height / 2.0 <= 7.0);
        }
    }

    #[test]
    fn test_failing_handler_is_swallowed() {
        let lvl = level(&[&[0, 7, 0], &[0, 0, 0]], FlappyTuning::default());
        let mut flappy = Flappy::new(&lvl, &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenGameStarts, |w: &mut FlappyWorld| {
            w.play_sound("kazoo")
        }));
        assert!(flappy.tick().is_none());
        assert_eq!(flappy.handler_failures(), 1);
        assert!(flappy.phase().is_running());
    }

    fn open_sky() -> LevelConfig {
        let mut rows: Vec<Vec<i64>> = vec![vec![0; 8]; 8];
        rows[4][1] = 7;
        let refs: Vec<&[i64]> = rows.iter().map(|r| r.as_slice()).collect();
        level(
            &refs,
            FlappyTuning {
                gravity: 0.0,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_set_gap_height_rejects_non_finite() {
        let mut flappy = Flappy::new(&open_sky(), &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenClick, |w: &mut FlappyWorld| {
            w.set_gap_height(f64::NEG_INFINITY)
        }));
        flappy.input_mut().click();
        for _ in 0..200 {
            flappy.tick();
        }
        assert_eq!(flappy.handler_failures(), 1);
        assert_eq!(flappy.world().tuning().gap_height, 3.0);
        assert!(flappy.world().obstacles.iter().all(|o| o.gap_center.is_finite()));

        let world = flappy.world_mut();
        assert!(world.set_gap_height(f64::NAN).is_err());
        assert!(world.set_gap_height(0.0).is_err());
        assert!(world.set_gap_height(2.0).is_ok());
        assert_eq!(world.tuning().gap_height, 2.0);
    }

    #[test]
    fn test_set_gravity_rejects_nan() {
        let mut flappy = Flappy::new(&open_sky(), &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenClick, |w: &mut FlappyWorld| {
            w.set_gravity(f64::NAN)
        }));
        flappy.input_mut().click();
        for _ in 0..5 {
            flappy.tick();
        }
        assert_eq!(flappy.handler_failures(), 1);
        assert_eq!(flappy.world().avatar.pos, DVec2::new(1.0, 4.0));
        assert!(flappy.world_mut().set_gravity(f64::INFINITY).is_err());
        assert!(flappy.world_mut().set_gravity(-0.1).is_err());
    }

    #[test]
    fn test_set_scroll_speed_rejects_non_finite() {
        let mut flappy = Flappy::new(&corridor(2), &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new().on(FlappyTrigger::WhenClick, |w: &mut FlappyWorld| {
            w.set_scroll_speed(f64::INFINITY)
        }));
        flappy.input_mut().click();
        flappy.tick();
        assert_eq!(flappy.handler_failures(), 1);
        // Still scrolling at the level's speed
        assert_eq!(flappy.world().obstacles[0].x, 2.0);
        assert!(flappy.world_mut().set_scroll_speed(f64::NAN).is_err());
        assert!(flappy.world_mut().set_scroll_speed(0.25).is_ok());
    }

    #[test]
    fn test_reset_restores_level() {
        let mut flappy = Flappy::new(&corridor(0), &Settings::default()).unwrap();
        flappy.start(FlappyProgram::new());
        flappy.input_mut().click();
        for _ in 0..5 {
            flappy.tick();
        }
        assert!(flappy.world().obstacles[0].x < 2.5);
        flappy.reset();
        assert_eq!(flappy.world().obstacles[0].x, 2.5);
        assert!(!flappy.world().started());
        assert!(flappy.tick().is_none());
    }

    #[test]
    fn test_wrong_game_rejected() {
        let mut lvl = level(&[&[0, 7, 0]], FlappyTuning::default());
        lvl.game = GameKind::Bounce;
        assert!(matches!(
            Flappy::new(&lvl, &Settings::default()),
            Err(ConfigError::WrongGame { .. })
        ));
    }
}
