//! Error types
//!
//! Configuration errors are fatal at load time. Handler errors never leave
//! the dispatch boundary.

use crate::sim::grid::SquareType;

/// Level or settings data that cannot be turned into a runnable game
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Level map is empty")]
    EmptyMap,

    #[error("Level map row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Unknown square code {code} at ({x}, {y})")]
    UnknownSquare { code: i64, x: usize, y: usize },

    #[error("Level is missing a required {0:?} square")]
    MissingMarker(SquareType),

    #[error("Level has more than one {0:?} square")]
    DuplicateMarker(SquareType),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("Level is for {found:?}, expected {expected:?}")]
    WrongGame {
        expected: crate::level::GameKind,
        found: crate::level::GameKind,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure raised by a user-supplied handler
///
/// The dispatcher logs and discards these; they exist so compiled user code
/// has something to return besides panicking.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerError {
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Unknown value: {0}")]
    UnknownValue(String),

    #[error("Invalid {field}: {value}")]
    InvalidNumber { field: &'static str, value: f64 },
}

impl HandlerError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        HandlerError::Runtime(msg.into())
    }
}
