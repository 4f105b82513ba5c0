//! Error types for maze planning and control.

use super::maze::Cell;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("maze has no cells")]
    EmptyMaze,

    #[error("maze row {row} has {found} cells, expected {expected}")]
    RaggedMaze {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("maze has no empty cells")]
    NoOpenCells,

    #[error("unexpected character {found:?} on maze line {line}")]
    Parse { line: usize, found: char },

    #[error("cell {0:?} is outside the maze")]
    OutOfBounds(Cell),

    #[error("point ({x}, {y}) is outside the maze")]
    OutsideMaze { x: f64, y: f64 },

    #[error("cell {0:?} is a wall")]
    WallCell(Cell),

    #[error("start cell {0:?} is already the goal")]
    StartIsGoal(Cell),

    #[error("goal {goal:?} is unreachable from {start:?}")]
    Unreachable { start: Cell, goal: Cell },

    #[error("policy revisited cell {0:?} before reaching the goal")]
    PolicyCycle(Cell),

    #[error("no waypoint follows cell {0:?}")]
    MissingWaypoint(Cell),

    #[error("malformed observation: {0}")]
    MalformedObservation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
