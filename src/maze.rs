//! Discrete maze layouts and the continuous frame agents move in.
//!
//! A [`Maze`] is an immutable grid of [cells](CellKind). The continuous frame is centred on the
//! maze: `x` grows with the column index and `y` shrinks with the row index, so row 0 is the top
//! of the maze.

use super::{
    error::{Error, Result},
    Point,
};
use std::{fmt, str::FromStr};

/// A grid location, as `(row, col)`.
pub type Cell = (usize, usize);

/// Whether a cell can be occupied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellKind {
    Empty,
    Wall,
}

/// An immutable grid of empty cells and walls.
#[derive(Clone, Debug, PartialEq)]
pub struct Maze {
    cells: Vec<CellKind>,
    rows: usize,
    cols: usize,
    scale: f64,
}

impl Maze {
    /// Constructs a new `Maze` from rows of cells, with a cell size of one world unit.
    ///
    /// Every row must have the same length and at least one cell must be empty.
    pub fn new(grid: Vec<Vec<CellKind>>) -> Result<Self> {
        let rows = grid.len();
        let cols = grid.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyMaze);
        }
        let mut cells = Vec::with_capacity(rows * cols);
        for (row, line) in grid.into_iter().enumerate() {
            if line.len() != cols {
                return Err(Error::RaggedMaze {
                    row,
                    expected: cols,
                    found: line.len(),
                });
            }
            cells.extend(line);
        }
        if !cells.contains(&CellKind::Empty) {
            return Err(Error::NoOpenCells);
        }
        Ok(Maze {
            cells,
            rows,
            cols,
            scale: 1.0,
        })
    }

    /// Constructs a new `Maze` from a numeric layout, where `1` marks a wall and `0` an empty
    /// cell.
    pub fn from_grid<R: AsRef<[u8]>>(grid: &[R]) -> Result<Self> {
        Self::new(
            grid.iter()
                .map(|row| {
                    row.as_ref()
                        .iter()
                        .map(|&c| if c == 0 { CellKind::Empty } else { CellKind::Wall })
                        .collect()
                })
                .collect(),
        )
    }

    /// Sets the side length of a cell in world units.
    pub fn with_scale(mut self, scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::Config(format!(
                "maze scale must be positive, got {}",
                scale
            )));
        }
        self.scale = scale;
        Ok(self)
    }

    /// The number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The side length of a cell in world units.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The total number of cells, walls included.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Checks if a cell lies inside the grid.
    pub fn contains(&self, (row, col): Cell) -> bool {
        row < self.rows && col < self.cols
    }

    /// Returns the kind of a cell, or `None` if it lies outside the grid.
    pub fn kind(&self, cell: Cell) -> Option<CellKind> {
        self.contains(cell)
            .then(|| self.cells[cell.0 * self.cols + cell.1])
    }

    /// Checks if a cell is a wall. Cells outside the grid count as walls.
    pub fn is_wall(&self, cell: Cell) -> bool {
        self.kind(cell) != Some(CellKind::Empty)
    }

    /// Checks if a cell is inside the grid and empty.
    pub fn is_open(&self, cell: Cell) -> bool {
        !self.is_wall(cell)
    }

    /// Iterates over every empty cell in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &kind)| kind == CellKind::Empty)
            .map(move |(i, _)| (i / cols, i % cols))
    }

    /// Returns the empty cells sharing an edge with `cell`.
    pub fn open_neighbors(&self, (row, col): Cell) -> Vec<Cell> {
        let mut neighbors = Vec::with_capacity(4);
        if row > 0 {
            neighbors.push((row - 1, col));
        }
        neighbors.push((row + 1, col));
        if col > 0 {
            neighbors.push((row, col - 1));
        }
        neighbors.push((row, col + 1));
        neighbors.retain(|&c| self.is_open(c));
        neighbors
    }

    /// Returns the world coordinates of the centre of a cell.
    ///
    /// The cell is not required to be inside the grid.
    pub fn cell_to_world(&self, (row, col): Cell) -> Point {
        let x = (col as f64 + 0.5) * self.scale - self.half_width();
        let y = self.half_height() - (row as f64 + 0.5) * self.scale;
        Point::new(x, y)
    }

    /// Returns the cell containing a world point.
    pub fn world_to_cell(&self, point: &Point) -> Result<Cell> {
        let row = ((self.half_height() - point.y) / self.scale).floor();
        let col = ((point.x + self.half_width()) / self.scale).floor();
        // NaN fails both comparisons
        let inside = |v: f64, bound: usize| v >= 0.0 && v < bound as f64;
        if inside(row, self.rows) && inside(col, self.cols) {
            Ok((row as usize, col as usize))
        } else {
            Err(Error::OutsideMaze {
                x: point.x,
                y: point.y,
            })
        }
    }

    fn half_width(&self) -> f64 {
        self.cols as f64 * self.scale / 2.0
    }

    fn half_height(&self) -> f64 {
        self.rows as f64 * self.scale / 2.0
    }
}

impl FromStr for Maze {
    type Err = Error;

    /// Parses a text layout, one row per line.
    ///
    /// `#` or `1` mark a wall, `.` or `0` an empty cell. Whitespace inside a line is ignored and
    /// blank lines are skipped.
    fn from_str(s: &str) -> Result<Self> {
        let mut grid = Vec::new();
        for (line, text) in s.lines().enumerate() {
            let row = text
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| match c {
                    '#' | '1' => Ok(CellKind::Wall),
                    '.' | '0' => Ok(CellKind::Empty),
                    found => Err(Error::Parse {
                        line: line + 1,
                        found,
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            if !row.is_empty() {
                grid.push(row);
            }
        }
        Self::new(grid)
    }
}

impl fmt::Display for Maze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.cols) {
            for kind in row {
                let c = match kind {
                    CellKind::Empty => '.',
                    CellKind::Wall => '#',
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Layouts of the PointMaze family, `1` for walls and `0` for empty cells.
pub mod layouts {
    /// A walled room with no interior walls.
    pub const OPEN: &[&[u8]] = &[
        &[1, 1, 1, 1, 1, 1, 1],
        &[1, 0, 0, 0, 0, 0, 1],
        &[1, 0, 0, 0, 0, 0, 1],
        &[1, 0, 0, 0, 0, 0, 1],
        &[1, 1, 1, 1, 1, 1, 1],
    ];

    pub const U_MAZE: &[&[u8]] = &[
        &[1, 1, 1, 1, 1],
        &[1, 0, 0, 0, 1],
        &[1, 1, 1, 0, 1],
        &[1, 0, 0, 0, 1],
        &[1, 1, 1, 1, 1],
    ];

    pub const MEDIUM_MAZE: &[&[u8]] = &[
        &[1, 1, 1, 1, 1, 1, 1, 1],
        &[1, 0, 0, 1, 1, 0, 0, 1],
        &[1, 0, 0, 1, 0, 0, 0, 1],
        &[1, 1, 0, 0, 0, 1, 1, 1],
        &[1, 0, 0, 1, 0, 0, 0, 1],
        &[1, 0, 1, 0, 0, 1, 0, 1],
        &[1, 0, 0, 0, 1, 0, 0, 1],
        &[1, 1, 1, 1, 1, 1, 1, 1],
    ];

    pub const LARGE_MAZE: &[&[u8]] = &[
        &[1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
        &[1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1],
        &[1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 0, 1],
        &[1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1],
        &[1, 0, 1, 1, 1, 1, 0, 1, 1, 1, 0, 1],
        &[1, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1],
        &[1, 1, 0, 1, 0, 1, 0, 1, 0, 1, 1, 1],
        &[1, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1],
        &[1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    ];
}
