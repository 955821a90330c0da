//! Sound cue boundary
//!
//! The simulation never plays audio. It emits cues as events and a front end
//! implements [`AudioSink`] to play them.

use serde::{Deserialize, Serialize};

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    /// Run started or a ball respawned
    Start,
    /// Level completed
    Win,
    /// One of several finish markers reached
    WinGoal,
    /// Run failed
    Failure,
    /// Pegman walked into a wall
    Whack,
    /// Wall bounce
    Wall,
    /// Obstacle hit
    Obstacle,
    /// Avatar flap
    Flap,
    /// Cue requested by name from user code that has no typed equivalent
    Custom(u32),
}

impl SoundCue {
    /// Resolve a sound name as used by the `play_sound` block
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(SoundCue::Start),
            "win" => Some(SoundCue::Win),
            "wingoal" | "win_goal" => Some(SoundCue::WinGoal),
            "failure" => Some(SoundCue::Failure),
            "whack" => Some(SoundCue::Whack),
            "wall" => Some(SoundCue::Wall),
            "obstacle" => Some(SoundCue::Obstacle),
            "flap" => Some(SoundCue::Flap),
            other => other
                .strip_prefix("wall")
                .and_then(|n| n.parse::<u32>().ok())
                .map(SoundCue::Custom),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundCue::Start => "start",
            SoundCue::Win => "win",
            SoundCue::WinGoal => "winGoal",
            SoundCue::Failure => "failure",
            SoundCue::Whack => "whack",
            SoundCue::Wall => "wall",
            SoundCue::Obstacle => "obstacle",
            SoundCue::Flap => "flap",
            SoundCue::Custom(_) => "custom",
        }
    }
}

/// Something that can play cues (Web Audio, native mixer, test recorder)
pub trait AudioSink {
    fn play(&mut self, cue: SoundCue, volume: f32);
}
