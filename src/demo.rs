//! Reference programs
//!
//! Hand-written equivalents of typical block programs, plus autopilots that
//! stand in for a player's key presses when running headless.

use crate::audio::SoundCue;
use crate::games::{
    Bounce, BounceProgram, BounceTrigger, BounceWorld, Flappy, FlappyProgram, FlappyTrigger,
    FlappyWorld, MazeProgram,
};
use crate::sim::input::Arrow;

/// Keep the wall on the right until the finish
pub fn maze_wall_follower() -> MazeProgram {
    Box::new(|api| {
        while !api.at_finish() {
            api.check_timeout()?;
            if api.is_path_right()? {
                api.turn_right()?;
                api.move_forward()?;
            } else if api.is_path_forward()? {
                api.move_forward()?;
            } else {
                api.turn_left()?;
            }
        }
        Ok(())
    })
}

/// Arrow keys move the paddle; every contact bounces
pub fn bounce_classic() -> BounceProgram {
    BounceProgram::new()
        .on(BounceTrigger::WhenLeft, |w: &mut BounceWorld| {
            w.move_left();
            Ok(())
        })
        .on(BounceTrigger::WhenRight, |w: &mut BounceWorld| {
            w.move_right();
            Ok(())
        })
        .on(BounceTrigger::WhenUp, |w: &mut BounceWorld| {
            w.move_up();
            Ok(())
        })
        .on(BounceTrigger::WhenDown, |w: &mut BounceWorld| {
            w.move_down();
            Ok(())
        })
        .on(BounceTrigger::WhenWallCollided, |w: &mut BounceWorld| {
            w.play(SoundCue::Wall);
            w.bounce_ball();
            Ok(())
        })
        .on(BounceTrigger::WhenPaddleCollided, |w: &mut BounceWorld| {
            w.play(SoundCue::Wall);
            w.bounce_ball();
            Ok(())
        })
        .on(BounceTrigger::WhenBallInGoal, |w: &mut BounceWorld| {
            w.increment_player_score();
            w.play(SoundCue::WinGoal);
            Ok(())
        })
        .on(BounceTrigger::WhenBallMissesPaddle, |w: &mut BounceWorld| {
            w.increment_opponent_score();
            w.play(SoundCue::Failure);
            Ok(())
        })
}

/// Clicks flap; hitting anything ends the game
pub fn flappy_classic() -> FlappyProgram {
    FlappyProgram::new()
        .on(FlappyTrigger::WhenClick, |w: &mut FlappyWorld| {
            w.flap();
            w.play(SoundCue::Flap);
            Ok(())
        })
        .on(FlappyTrigger::WhenEnterObstacle, |w: &mut FlappyWorld| {
            w.increment_player_score();
            Ok(())
        })
        .on(FlappyTrigger::WhenCollideObstacle, |w: &mut FlappyWorld| {
            w.play(SoundCue::Obstacle);
            w.end_game();
            Ok(())
        })
        .on(FlappyTrigger::WhenCollideGround, |w: &mut FlappyWorld| {
            w.end_game();
            Ok(())
        })
}

/// Hold the arrow that moves the paddle under the lowest ball still in play
pub fn steer_paddle(game: &mut Bounce) {
    let world = game.world();
    let bottom = (world.rows() - 1) as f64;
    let paddle = world.paddle.pos.x;
    let dead_band = world.paddle.speed * 0.5;
    let target = world
        .balls
        .iter()
        .filter(|b| b.pos.y <= bottom && b.pos.x >= 0.0 && b.pos.x <= (world.cols() - 1) as f64)
        .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
        .map(|b| b.pos.x);

    let input = game.input_mut();
    input.key_up(Arrow::Left);
    input.key_up(Arrow::Right);
    match target {
        Some(x) if x < paddle - dead_band => input.key_down(Arrow::Left),
        Some(x) if x > paddle + dead_band => input.key_down(Arrow::Right),
        _ => {}
    }
}

/// Click while the avatar sits below the gap it is heading for
pub fn steer_avatar(game: &mut Flappy) {
    let world = game.world();
    let avatar = world.avatar.pos;
    let target = world
        .obstacles
        .iter()
        .find(|o| o.right() >= avatar.x - 0.5)
        .map(|o| o.gap_center)
        .unwrap_or(world.floor() * 0.5);
    let click = !world.started() || avatar.y > target + 0.3;
    if click {
        game.input_mut().click();
    }
}
