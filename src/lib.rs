//! Planning and control for a point agent in a grid maze.
//!
//! A [`GridPolicySolver`] computes shortest cell routes by Q-value iteration, and a
//! [`WaypointController`] turns those routes into bounded 2D force commands with PD feedback.
//! The task is continuing: the controller replans whenever the desired goal moves and never
//! stops on arrival.
//!
//! ```no_run
//! use pointmaze::{
//!     maze::layouts, Maze, Observation, PlannerConfig, Point, Vector, WaypointController,
//! };
//! use std::sync::Arc;
//!
//! let maze = Arc::new(Maze::from_grid(layouts::U_MAZE).unwrap());
//! let mut controller = WaypointController::from_config(maze, &PlannerConfig::default()).unwrap();
//! let obs = Observation::new(Point::new(-1.0, 1.0), Vector::zeros(), Point::new(-1.0, -1.0));
//! let action = controller.compute_action(&obs).unwrap();
//! ```

use nalgebra as na;

pub mod config;
pub mod controller;
pub mod error;
pub mod maze;
pub mod noise;
pub mod solver;

/// A position in the maze's continuous frame.
pub type Point = na::Point2<f64>;
/// A displacement, velocity or action in the maze's continuous frame.
pub type Vector = na::Vector2<f64>;

pub use config::{ControllerConfig, NoiseConfig, PlannerConfig, SolverConfig};
pub use controller::{ControllerState, Observation, Plan, WaypointController, WaypointPolicy};
pub use error::{Error, Result};
pub use maze::{Cell, CellKind, Maze};
pub use noise::{NoNoise, UniformJitter, WaypointNoise};
pub use solver::{Direction, GridPolicySolver, PathMap, QTable};
