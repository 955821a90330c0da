//! Static tile map
//!
//! The grid is fixed for the duration of a run. Anything outside the map
//! reads as a wall.

use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Classification of a single map square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SquareType {
    Wall,
    #[default]
    Open,
    Start,
    Finish,
    Obstacle,
    BallStart,
    BallFinish,
    PaddleStart,
    PaddleFinish,
    Goal,
}

impl SquareType {
    /// Numeric codes used by maze level maps
    pub fn from_maze_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SquareType::Wall),
            1 => Some(SquareType::Open),
            2 => Some(SquareType::Start),
            3 => Some(SquareType::Finish),
            4 => Some(SquareType::Obstacle),
            _ => None,
        }
    }

    /// Numeric codes used by bounce and flappy level maps
    pub fn from_arcade_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SquareType::Open),
            1 => Some(SquareType::Wall),
            2 => Some(SquareType::Goal),
            3 => Some(SquareType::PaddleFinish),
            4 => Some(SquareType::BallFinish),
            5 => Some(SquareType::Obstacle),
            6 => Some(SquareType::BallStart),
            7 => Some(SquareType::PaddleStart),
            _ => None,
        }
    }

    /// Whether an entity stepping on grid cells may enter this square
    pub fn is_passable(self) -> bool {
        !matches!(self, SquareType::Wall | SquareType::Obstacle)
    }
}

/// Typed marker locations found by scanning the map, in row-major order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Markers {
    pub starts: Vec<IVec2>,
    pub finishes: Vec<IVec2>,
    pub obstacles: Vec<IVec2>,
    pub goals: Vec<IVec2>,
    pub ball_starts: Vec<IVec2>,
    pub ball_finishes: Vec<IVec2>,
    pub paddle_starts: Vec<IVec2>,
    pub paddle_finishes: Vec<IVec2>,
}

/// Immutable rectangular tile map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    /// Row-major cells
    cells: Vec<SquareType>,
}

impl Grid {
    /// Build a grid from rows of squares. Rows must be non-empty and equal length.
    pub fn new(rows: Vec<Vec<SquareType>>) -> Result<Self, ConfigError> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(ConfigError::EmptyMap);
        }
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ConfigError::RaggedRow {
                    row: y,
                    expected: cols,
                    found: row.len(),
                });
            }
            cells.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            cells,
        })
    }

    /// Build a grid from numeric codes using the given decoder
    pub fn from_codes(
        codes: &[Vec<i64>],
        decode: fn(i64) -> Option<SquareType>,
    ) -> Result<Self, ConfigError> {
        let mut rows = Vec::with_capacity(codes.len());
        for (y, row) in codes.iter().enumerate() {
            let mut decoded = Vec::with_capacity(row.len());
            for (x, &code) in row.iter().enumerate() {
                decoded.push(decode(code).ok_or(ConfigError::UnknownSquare { code, x, y })?);
            }
            rows.push(decoded);
        }
        Self::new(rows)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Square at integer coordinates; out of range reads as a wall
    pub fn classify(&self, x: i32, y: i32) -> SquareType {
        if x < 0 || y < 0 || x as usize >= self.cols || y as usize >= self.rows {
            return SquareType::Wall;
        }
        self.cells[y as usize * self.cols + x as usize]
    }

    #[inline]
    pub fn in_bounds(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.cols && (cell.y as usize) < self.rows
    }

    /// Scan once for every marker square
    pub fn scan_markers(&self) -> Markers {
        let mut markers = Markers::default();
        for y in 0..self.rows {
            for x in 0..self.cols {
                let cell = IVec2::new(x as i32, y as i32);
                let list = match self.cells[y * self.cols + x] {
                    SquareType::Start => &mut markers.starts,
                    SquareType::Finish => &mut markers.finishes,
                    SquareType::Obstacle => &mut markers.obstacles,
                    SquareType::Goal => &mut markers.goals,
                    SquareType::BallStart => &mut markers.ball_starts,
                    SquareType::BallFinish => &mut markers.ball_finishes,
                    SquareType::PaddleStart => &mut markers.paddle_starts,
                    SquareType::PaddleFinish => &mut markers.paddle_finishes,
                    SquareType::Wall | SquareType::Open => continue,
                };
                list.push(cell);
            }
        }
        markers
    }
}

/// Exactly one marker of `kind`, or a load-time error
pub fn single_marker(list: &[IVec2], kind: SquareType) -> Result<IVec2, ConfigError> {
    match list {
        [] => Err(ConfigError::MissingMarker(kind)),
        [only] => Ok(*only),
        _ => Err(ConfigError::DuplicateMarker(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SquareType::*;

    fn small() -> Grid {
        Grid::new(vec![vec![Open, Wall, Finish], vec![Start, Obstacle, Open]]).unwrap()
    }

    #[test]
    fn test_classify_in_and_out_of_bounds() {
        let grid = small();
        assert_eq!(grid.classify(0, 0), Open);
        assert_eq!(grid.classify(1, 0), Wall);
        assert_eq!(grid.classify(0, 1), Start);
        assert_eq!(grid.classify(-1, 0), Wall);
        assert_eq!(grid.classify(3, 0), Wall);
        assert_eq!(grid.classify(0, 2), Wall);
    }

    #[test]
    fn test_scan_markers_row_major() {
        let grid = Grid::new(vec![
            vec![BallStart, Open, BallStart],
            vec![Open, BallStart, PaddleStart],
        ])
        .unwrap();
        let markers = grid.scan_markers();
        assert_eq!(
            markers.ball_starts,
            vec![IVec2::new(0, 0), IVec2::new(2, 0), IVec2::new(1, 1)]
        );
        assert_eq!(markers.paddle_starts, vec![IVec2::new(2, 1)]);
        assert!(markers.finishes.is_empty());
    }

    #[test]
    fn test_ragged_and_empty_maps_rejected() {
        assert!(matches!(Grid::new(vec![]), Err(ConfigError::EmptyMap)));
        assert!(matches!(
            Grid::new(vec![vec![Open, Open], vec![Open]]),
            Err(ConfigError::RaggedRow { row: 1, .. })
        ));
    }

    #[test]
    fn test_from_codes() {
        let grid = Grid::from_codes(&[vec![1, 1], vec![2, 3]], SquareType::from_maze_code).unwrap();
        assert_eq!(grid.classify(0, 1), Start);
        assert_eq!(grid.classify(1, 1), Finish);

        let err = Grid::from_codes(&[vec![9]], SquareType::from_maze_code).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSquare { code: 9, .. }));
    }

    #[test]
    fn test_single_marker() {
        assert!(single_marker(&[], Start).is_err());
        assert_eq!(single_marker(&[IVec2::ONE], Start).unwrap(), IVec2::ONE);
        assert!(matches!(
            single_marker(&[IVec2::ONE, IVec2::ZERO], Start),
            Err(ConfigError::DuplicateMarker(Start))
        ));
    }
}
