//! Collision detection and response
//!
//! Boundary reflection for balls, the offset-biased paddle rebound, gap-band
//! obstacle tests for the side-scroller, and grid path lookups for the maze.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec2;

use super::grid::Grid;
use super::state::{Ball, Pegman, RelativeDirection};
use crate::consts::PADDLE_BALL_COLLIDE_DISTANCE;
use crate::{distance, normalize_heading};

/// Which boundaries a ball crossed during a reflection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reflection {
    pub horizontal: bool,
    pub top: bool,
}

impl Reflection {
    pub fn any(&self) -> bool {
        self.horizontal || self.top
    }
}

/// Mirror a heading across the vertical axis (left/right walls)
#[inline]
pub fn reflect_horizontal(heading: f64) -> f64 {
    normalize_heading(TAU - heading)
}

/// Mirror a heading across the horizontal axis (top wall)
#[inline]
pub fn reflect_vertical(heading: f64) -> f64 {
    normalize_heading(PI - heading)
}

/// Clamp a ball into `[0, max_x]` horizontally and below `top_y`, reflecting
/// its heading for every boundary it had crossed
pub fn reflect_off_bounds(ball: &mut Ball, max_x: f64, top_y: f64) -> Reflection {
    let mut out = Reflection::default();
    if ball.pos.x < 0.0 {
        ball.pos.x = 0.0;
        ball.heading = reflect_horizontal(ball.heading);
        out.horizontal = true;
    } else if ball.pos.x > max_x {
        ball.pos.x = max_x;
        ball.heading = reflect_horizontal(ball.heading);
        out.horizontal = true;
    }
    if ball.pos.y < top_y {
        ball.pos.y = top_y;
        ball.heading = reflect_vertical(ball.heading);
        out.top = true;
    }
    out
}

/// Whether a ball is close enough to the paddle to collide
#[inline]
pub fn touches_paddle(ball_pos: DVec2, paddle_pos: DVec2) -> bool {
    let d = ball_pos - paddle_pos;
    distance(d.x, d.y) < PADDLE_BALL_COLLIDE_DISTANCE
}

/// Rebound heading after a paddle hit
///
/// Hitting off-center sends the ball away at a sharper angle. The result is
/// then kept out of the flat band around horizontal. The clamp deliberately
/// uses `min` against π/2 - 0.2 below π and `max` against 3π/2 + 0.2 above.
pub fn paddle_rebound(heading: f64, lateral_offset: f64) -> f64 {
    let bias = (3.0 * PI / 8.0) * (lateral_offset / PADDLE_BALL_COLLIDE_DISTANCE);
    // 5π rather than π keeps the dividend positive
    let rebound = (PI * 5.0 + bias - heading) % TAU;
    if rebound < PI {
        rebound.min(FRAC_PI_2 - 0.2)
    } else {
        rebound.max(3.0 * FRAC_PI_2 + 0.2)
    }
}

/// Apply the paddle rebound to a ball if it is touching the paddle and
/// still travelling toward it. Returns true if the heading changed.
pub fn rebound_off_paddle(ball: &mut Ball, paddle_pos: DVec2) -> bool {
    if !touches_paddle(ball.pos, paddle_pos) {
        return false;
    }
    if ball.heading.cos() >= 0.0 {
        return false;
    }
    let lateral = ball.pos.x - paddle_pos.x;
    ball.set_heading(paddle_rebound(ball.heading, lateral));
    true
}

/// Axis-aligned box given by its min corner and size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec2,
    pub size: DVec2,
}

impl Aabb {
    /// Box of `size` centered on `center`
    pub fn centered(center: DVec2, size: DVec2) -> Self {
        Self {
            min: center - size * 0.5,
            size,
        }
    }

    #[inline]
    pub fn max(&self) -> DVec2 {
        self.min + self.size
    }

    /// Overlap on the x axis only
    pub fn overlaps_x(&self, left: f64, right: f64) -> bool {
        self.min.x < right && self.max().x > left
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.overlaps_x(other.min.x, other.max().x)
            && self.min.y < other.max().y
            && self.max().y > other.min.y
    }
}

/// A vertical obstacle column with an open gap band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapColumn {
    /// Left edge
    pub x: f64,
    pub width: f64,
    /// Top and bottom of the open band
    pub gap_top: f64,
    pub gap_bottom: f64,
}

impl GapColumn {
    /// Colliding when horizontally inside the column and vertically outside the gap
    pub fn collides(&self, body: &Aabb) -> bool {
        if !body.overlaps_x(self.x, self.x + self.width) {
            return false;
        }
        body.min.y < self.gap_top || body.max().y > self.gap_bottom
    }

    /// Horizontally inside the column, regardless of the gap
    pub fn spans(&self, body: &Aabb) -> bool {
        body.overlaps_x(self.x, self.x + self.width)
    }
}

/// Is there an open square one step away in a heading-relative direction?
pub fn is_path(grid: &Grid, pegman: &Pegman, rel: RelativeDirection) -> bool {
    let next = pegman.neighbor(rel);
    grid.classify(next.x, next.y).is_passable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::grid::SquareType::*;
    use crate::sim::state::Direction;
    use glam::IVec2;
    use proptest::prelude::*;

    fn angle_eq(a: f64, b: f64) -> bool {
        let d = (a - b).rem_euclid(TAU);
        d < 1e-9 || TAU - d < 1e-9
    }

    #[test]
    fn test_reflect_off_left_wall() {
        let mut ball = Ball::new(0, DVec2::new(-0.05, 3.0), 1.5 * PI, 0.1);
        let hit = reflect_off_bounds(&mut ball, 7.0, -0.2);
        assert!(hit.horizontal && !hit.top);
        assert_eq!(ball.pos.x, 0.0);
        assert!(angle_eq(ball.heading, 0.5 * PI));
    }

    #[test]
    fn test_reflect_off_top() {
        let mut ball = Ball::new(0, DVec2::new(3.0, -0.3), 0.25 * PI, 0.1);
        let hit = reflect_off_bounds(&mut ball, 7.0, -0.2);
        assert!(hit.top);
        assert_eq!(ball.pos.y, -0.2);
        assert!(angle_eq(ball.heading, 0.75 * PI));
    }

    #[test]
    fn test_inside_bounds_untouched() {
        let mut ball = Ball::new(0, DVec2::new(3.0, 3.0), 1.0, 0.1);
        assert!(!reflect_off_bounds(&mut ball, 7.0, -0.2).any());
        assert_eq!(ball.heading, 1.0);
    }

    #[test]
    fn test_paddle_rebound_centered_hit() {
        // Straight down onto the middle of the paddle
        let out = paddle_rebound(PI, 0.0);
        // 5π - π = 4π ≡ 0, below π so min(π/2 - 0.2, 0) = 0 (straight up)
        assert!(angle_eq(out, 0.0));
    }

    #[test]
    fn test_paddle_rebound_offset_sharpens() {
        let left = paddle_rebound(PI, -0.35);
        let right = paddle_rebound(PI, 0.35);
        assert!(left > PI);
        assert!(right < PI);
        assert_ne!(left, right);
    }

    #[test]
    fn test_rebound_requires_downward_motion() {
        let paddle = DVec2::new(3.0, 7.0);
        let mut ball = Ball::new(0, DVec2::new(3.0, 6.95), 0.0, 0.1);
        // Moving up (cos > 0): no rebound
        assert!(!rebound_off_paddle(&mut ball, paddle));
        ball.set_heading(PI);
        assert!(rebound_off_paddle(&mut ball, paddle));
    }

    #[test]
    fn test_gap_column() {
        let column = GapColumn {
            x: 2.0,
            width: 1.0,
            gap_top: 2.0,
            gap_bottom: 5.0,
        };
        let inside_gap = Aabb::centered(DVec2::new(2.5, 3.5), DVec2::splat(0.5));
        let above_gap = Aabb::centered(DVec2::new(2.5, 1.5), DVec2::splat(0.5));
        let before = Aabb::centered(DVec2::new(0.5, 1.5), DVec2::splat(0.5));
        assert!(!column.collides(&inside_gap));
        assert!(column.spans(&inside_gap));
        assert!(column.collides(&above_gap));
        assert!(!column.collides(&before));
    }

    #[test]
    fn test_is_path() {
        let grid = Grid::new(vec![vec![Open, Open], vec![Start, Finish]]).unwrap();
        let pegman = Pegman::new(IVec2::new(0, 1), Direction::East);
        assert!(is_path(&grid, &pegman, RelativeDirection::Forward));
        assert!(is_path(&grid, &pegman, RelativeDirection::Left));
        assert!(!is_path(&grid, &pegman, RelativeDirection::Right));
        assert!(!is_path(&grid, &pegman, RelativeDirection::Backward));
    }

    proptest! {
        #[test]
        fn prop_horizontal_reflection(x in -1.0f64..-0.0001, h in 0.0f64..TAU) {
            let mut ball = Ball::new(0, DVec2::new(x, 3.0), h, 0.1);
            let before = ball.heading;
            reflect_off_bounds(&mut ball, 7.0, -0.2);
            prop_assert_eq!(ball.pos.x, 0.0);
            prop_assert!(angle_eq(ball.heading, TAU - before));
        }

        #[test]
        fn prop_vertical_reflection(y in -2.0f64..-0.2001, h in 0.0f64..TAU) {
            let mut ball = Ball::new(0, DVec2::new(3.0, y), h, 0.1);
            let before = ball.heading;
            reflect_off_bounds(&mut ball, 7.0, -0.2);
            prop_assert_eq!(ball.pos.y, -0.2);
            prop_assert!(angle_eq(ball.heading, PI - before));
        }

        #[test]
        fn prop_rebound_deterministic_and_not_flat(h in 0.0f64..TAU, off in -0.7f64..0.7) {
            let a = paddle_rebound(h, off);
            let b = paddle_rebound(h, off);
            prop_assert_eq!(a.to_bits(), b.to_bits());
            prop_assert!(a <= FRAC_PI_2 - 0.2 || a >= 3.0 * FRAC_PI_2 + 0.2);
        }
    }
}
