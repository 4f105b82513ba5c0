//! Grid path planning by Q-value iteration.
//!
//! The maze is treated as a deterministic Markov decision process: states are cells flattened
//! row-major, actions are the four [directions](Direction), and a move succeeds only into an
//! empty in-bounds neighbor. Entering the goal pays a reward of one. A fixed number of Bellman
//! backups gives a Q-table whose greedy policy leads to the goal along a shortest route.

use super::{
    config::SolverConfig,
    error::{Error, Result},
    maze::{Cell, Maze},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, trace, warn};

/// The number of discrete actions.
pub const NUM_ACTIONS: usize = 4;

/// A unit move on the grid.
///
/// The declaration order is the action index order, which also decides ties in the greedy
/// policy. Each move is a fixed `(row, col)` displacement, see [`delta`](Direction::delta).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in index order.
    pub const ALL: [Direction; NUM_ACTIONS] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// The action index of the move.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The cell displacement of the move, added component-wise to `(row, col)`.
    ///
    /// `Up` and `Down` step along columns, `Left` and `Right` along rows.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Applies the move to a cell, returning `None` if it would leave the first quadrant of the
    /// grid index space.
    pub fn apply(self, (row, col): Cell) -> Option<Cell> {
        let (drow, dcol) = self.delta();
        Some((offset(row, drow)?, offset(col, dcol)?))
    }
}

fn offset(v: usize, d: i32) -> Option<usize> {
    if d < 0 {
        v.checked_sub(d.unsigned_abs() as usize)
    } else {
        v.checked_add(d as usize)
    }
}

/// Action values for every `(state, action)` pair, for one goal.
#[derive(Clone, Debug, PartialEq)]
pub struct QTable {
    values: Vec<[f64; NUM_ACTIONS]>,
}

impl QTable {
    /// The value of taking `direction` from `state`.
    pub fn get(&self, state: usize, direction: Direction) -> f64 {
        self.values[state][direction.index()]
    }

    /// All action values of a state, in index order.
    pub fn row(&self, state: usize) -> &[f64; NUM_ACTIONS] {
        &self.values[state]
    }

    /// The state value, `max_a Q(s, a)`.
    pub fn value(&self, state: usize) -> f64 {
        max_value(&self.values[state])
    }

    /// The highest-valued action of a state; ties go to the lowest index.
    ///
    /// Returns `None` when no action has a positive value, i.e. the goal is not reachable from
    /// `state` within the iteration horizon.
    pub fn greedy(&self, state: usize) -> Option<Direction> {
        let row = &self.values[state];
        let mut best = 0;
        for a in 1..NUM_ACTIONS {
            if row[a] > row[best] {
                best = a;
            }
        }
        (row[best] > 0.0).then(|| Direction::ALL[best])
    }

    /// Returns the number of states in the table.
    pub fn num_states(&self) -> usize {
        self.values.len()
    }
}

fn max_value(row: &[f64; NUM_ACTIONS]) -> f64 {
    row.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// The route found by [`GridPolicySolver::solve_path`]: each visited cell mapped to the next one.
#[derive(Clone, Debug, PartialEq)]
pub struct PathMap {
    start: Cell,
    goal: Cell,
    next: HashMap<Cell, Cell>,
}

impl PathMap {
    fn new(start: Cell, goal: Cell) -> Self {
        PathMap {
            start,
            goal,
            next: HashMap::new(),
        }
    }

    /// The cell the route starts from.
    pub fn start(&self) -> Cell {
        self.start
    }

    /// The cell the route ends in.
    pub fn goal(&self) -> Cell {
        self.goal
    }

    /// Returns the cell following `cell` on the route, if `cell` is on it.
    pub fn get(&self, cell: Cell) -> Option<Cell> {
        self.next.get(&cell).copied()
    }

    /// Checks if the route leaves from `cell`. The goal itself is never contained.
    pub fn contains(&self, cell: Cell) -> bool {
        self.next.contains_key(&cell)
    }

    /// The number of hops from the start to the goal.
    pub fn len(&self) -> usize {
        self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    /// The cells of the route in travel order, from the start to the goal inclusive.
    pub fn route(&self) -> Vec<Cell> {
        let mut cells = vec![self.start];
        let mut current = self.start;
        while let Some(next) = self.get(current) {
            cells.push(next);
            if next == self.goal || cells.len() > self.next.len() + 1 {
                break;
            }
            current = next;
        }
        cells
    }

    /// Iterates over `(cell, next)` hops in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (Cell, Cell)> + '_ {
        self.next.iter().map(|(&from, &to)| (from, to))
    }
}

/// Solves shortest routes on a fixed maze by Q-value iteration.
///
/// The transition structure is computed once in [`new`](GridPolicySolver::new) and never
/// mutated, so one solver can be shared between controllers behind an [`Arc`].
#[derive(Debug)]
pub struct GridPolicySolver {
    maze: Arc<Maze>,
    config: SolverConfig,
    transitions: Vec<[Option<usize>; NUM_ACTIONS]>,
}

impl GridPolicySolver {
    /// Constructs a new `GridPolicySolver`, precomputing every transition of the maze.
    pub fn new(maze: Arc<Maze>, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let cols = maze.cols();
        let transitions = (0..maze.num_cells())
            .map(|state| {
                let cell = (state / cols, state % cols);
                let mut row = [None; NUM_ACTIONS];
                if maze.is_open(cell) {
                    for direction in Direction::ALL.iter() {
                        row[direction.index()] = direction
                            .apply(cell)
                            .filter(|&next| maze.is_open(next))
                            .map(|(r, c)| r * cols + c);
                    }
                }
                row
            })
            .collect();
        Ok(GridPolicySolver {
            maze,
            config,
            transitions,
        })
    }

    /// Returns the maze being solved.
    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Returns the number of states, one per cell including walls.
    pub fn num_states(&self) -> usize {
        self.transitions.len()
    }

    /// Flattens a cell row-major.
    pub fn cell_to_state(&self, (row, col): Cell) -> usize {
        row * self.maze.cols() + col
    }

    pub fn state_to_cell(&self, state: usize) -> Cell {
        (state / self.maze.cols(), state % self.maze.cols())
    }

    /// The state reached by taking `direction` from `state`, or `None` if the move is blocked.
    pub fn next_state(&self, state: usize, direction: Direction) -> Option<usize> {
        self.transitions
            .get(state)
            .and_then(|row| row[direction.index()])
    }

    /// Runs value iteration towards `goal` and returns the resulting Q-table.
    pub fn q_values(&self, goal: Cell) -> Result<QTable> {
        self.check_open(goal)?;
        Ok(self.iterate(self.cell_to_state(goal)))
    }

    /// The greedy action of every state for `goal`; `None` where the goal is out of reach.
    pub fn policy(&self, goal: Cell) -> Result<Vec<Option<Direction>>> {
        let q = self.q_values(goal)?;
        Ok((0..q.num_states()).map(|s| q.greedy(s)).collect())
    }

    /// Computes the greedy route from `start` to `goal`.
    ///
    /// The walk is bounded by the number of states and fails with [`Error::PolicyCycle`] if the
    /// policy revisits a cell, or [`Error::Unreachable`] if it has no move towards the goal.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn solve_path(&self, start: Cell, goal: Cell) -> Result<PathMap> {
        self.check_open(start)?;
        self.check_open(goal)?;
        if start == goal {
            return Err(Error::StartIsGoal(start));
        }

        let q = self.iterate(self.cell_to_state(goal));
        self.walk(&q, start, goal)
    }

    /// Follows the greedy actions of `q` from `start` until `goal` is entered.
    fn walk(&self, q: &QTable, start: Cell, goal: Cell) -> Result<PathMap> {
        let goal_state = self.cell_to_state(goal);
        let mut path = PathMap::new(start, goal);
        let mut current = self.cell_to_state(start);
        for _ in 0..self.num_states() {
            let cell = self.state_to_cell(current);
            let next = q
                .greedy(current)
                .and_then(|direction| self.next_state(current, direction))
                .ok_or_else(|| {
                    warn!(?start, ?goal, ?cell, "no greedy move towards goal");
                    Error::Unreachable { start, goal }
                })?;
            if path.next.insert(cell, self.state_to_cell(next)).is_some() {
                warn!(?start, ?goal, ?cell, "greedy policy cycles");
                return Err(Error::PolicyCycle(cell));
            }
            if next == goal_state {
                debug!(hops = path.len(), "path found");
                return Ok(path);
            }
            current = next;
        }
        // the goal is never a key, so a revisit is caught before the bound runs out
        Err(Error::PolicyCycle(self.state_to_cell(current)))
    }

    fn check_open(&self, cell: Cell) -> Result<()> {
        if !self.maze.contains(cell) {
            Err(Error::OutOfBounds(cell))
        } else if self.maze.is_wall(cell) {
            Err(Error::WallCell(cell))
        } else {
            Ok(())
        }
    }

    /// Reward for each `(state, action)`: one if the move enters the goal.
    fn rewards(&self, goal_state: usize) -> Vec<[f64; NUM_ACTIONS]> {
        self.transitions
            .iter()
            .map(|row| {
                let mut r = [0.0; NUM_ACTIONS];
                for (a, next) in row.iter().enumerate() {
                    if *next == Some(goal_state) {
                        r[a] = 1.0;
                    }
                }
                r
            })
            .collect()
    }

    fn iterate(&self, goal_state: usize) -> QTable {
        let rewards = self.rewards(goal_state);
        let discount = self.config.discount;
        let mut q = vec![[0.0; NUM_ACTIONS]; self.num_states()];
        let mut v = vec![0.0; self.num_states()];
        for _ in 0..self.config.iterations {
            for (value, row) in v.iter_mut().zip(q.iter()) {
                *value = max_value(row);
            }
            for (s, row) in q.iter_mut().enumerate() {
                for a in 0..NUM_ACTIONS {
                    row[a] = rewards[s][a]
                        + self.transitions[s][a].map_or(0.0, |next| discount * v[next]);
                }
            }
        }
        trace!(
            iterations = self.config.iterations,
            goal_value = max_value(&q[goal_state]),
            "value iteration finished"
        );
        QTable { values: q }
    }
}
