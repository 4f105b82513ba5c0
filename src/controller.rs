//! Waypoint following with PD feedback.
//!
//! Each tick the controller checks whether the desired goal moved, replans through the
//! [solver](GridPolicySolver) if it did, advances to the next waypoint once the current one is
//! reached, and steers towards the active waypoint with
//! `Kp * (target - position) + Kd * velocity`, clamped to the actuation range.
//!
//! [`WaypointPolicy::step`] is a pure transition `(state, observation) -> (state, action)`;
//! [`WaypointController`] wraps it with owned state and noise for use in a control loop.

use super::{
    config::{ControllerConfig, PlannerConfig},
    error::{Error, Result},
    maze::{Cell, Maze},
    noise::WaypointNoise,
    solver::{GridPolicySolver, PathMap},
    Point, Vector,
};
use nalgebra as na;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What the controller sees of the agent each tick, in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// The agent position.
    pub achieved_goal: Point,
    /// The agent velocity.
    pub velocity: Vector,
    /// The position the agent should reach.
    pub desired_goal: Point,
}

impl Observation {
    /// Constructs a new `Observation`.
    pub fn new(achieved_goal: Point, velocity: Vector, desired_goal: Point) -> Self {
        Observation {
            achieved_goal,
            velocity,
            desired_goal,
        }
    }

    /// Builds an observation from raw arrays, checking their shapes once.
    ///
    /// `observation` is the pose vector `[x, y, vx, vy]`; the velocity is read from `[2..4]`.
    /// `achieved_goal` and `desired_goal` must hold exactly two values. Every value must be
    /// finite.
    pub fn from_slices(
        observation: &[f64],
        achieved_goal: &[f64],
        desired_goal: &[f64],
    ) -> Result<Self> {
        if observation.len() < 4 {
            return Err(Error::MalformedObservation(format!(
                "pose vector has {} values, expected at least 4",
                observation.len()
            )));
        }
        for (name, values) in [("achieved_goal", achieved_goal), ("desired_goal", desired_goal)] {
            if values.len() != 2 {
                return Err(Error::MalformedObservation(format!(
                    "{} has {} values, expected 2",
                    name,
                    values.len()
                )));
            }
        }
        let mut values = observation[..4]
            .iter()
            .chain(achieved_goal)
            .chain(desired_goal);
        if let Some(v) = values.find(|v| !v.is_finite()) {
            return Err(Error::MalformedObservation(format!(
                "non-finite value {}",
                v
            )));
        }
        Ok(Self::new(
            Point::new(achieved_goal[0], achieved_goal[1]),
            Vector::new(observation[2], observation[3]),
            Point::new(desired_goal[0], desired_goal[1]),
        ))
    }
}

/// The plan the controller is executing.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    goal: Point,
    goal_cell: Cell,
    target: Point,
    target_cell: Cell,
    path: Option<Arc<PathMap>>,
    best_distance: f64,
    stalled_ticks: u32,
}

impl Plan {
    /// The global goal being tracked.
    pub fn goal(&self) -> Point {
        self.goal
    }

    /// The cell containing the global goal.
    pub fn goal_cell(&self) -> Cell {
        self.goal_cell
    }

    /// The intermediate waypoint the agent is steered towards.
    pub fn target(&self) -> Point {
        self.target
    }

    /// The cell of the active waypoint.
    pub fn target_cell(&self) -> Cell {
        self.target_cell
    }

    /// The route to the goal; `None` when the plan started inside the goal cell.
    pub fn path(&self) -> Option<&PathMap> {
        self.path.as_deref()
    }

    /// Checks if the active waypoint is the global goal.
    pub fn is_final(&self) -> bool {
        self.target_cell == self.goal_cell
    }

    fn retarget(&mut self, cell: Cell, target: Point) {
        self.target_cell = cell;
        self.target = target;
        self.best_distance = f64::INFINITY;
        self.stalled_ticks = 0;
    }
}

/// Controller state between ticks. The default state has no plan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControllerState {
    plan: Option<Plan>,
}

impl ControllerState {
    /// Returns the active plan, or `None` before the first tick.
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }
}

/// The stateless part of a waypoint controller: shared solver plus gains.
#[derive(Clone, Debug)]
pub struct WaypointPolicy {
    solver: Arc<GridPolicySolver>,
    config: ControllerConfig,
}

impl WaypointPolicy {
    /// Constructs a new `WaypointPolicy`, rejecting invalid gains or thresholds.
    pub fn new(solver: Arc<GridPolicySolver>, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(WaypointPolicy { solver, config })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn solver(&self) -> &GridPolicySolver {
        &self.solver
    }

    fn maze(&self) -> &Maze {
        self.solver.maze()
    }

    /// Advances the controller by one tick.
    ///
    /// `noise` offsets intermediate waypoints; it is never applied to the global goal.
    pub fn step(
        &self,
        state: &ControllerState,
        obs: &Observation,
        noise: &mut dyn WaypointNoise,
    ) -> Result<(ControllerState, Vector)> {
        let position = obs.achieved_goal;
        let mut plan = match &state.plan {
            Some(plan)
                if na::distance(&plan.goal, &obs.desired_goal) <= self.config.goal_tolerance =>
            {
                plan.clone()
            }
            _ => self.replan(obs)?,
        };

        if na::distance(&plan.target, &position) <= self.config.waypoint_threshold
            && !plan.is_final()
        {
            self.advance(&mut plan, noise)?;
        }

        if self.config.stall_ticks > 0 && !plan.is_final() {
            let distance = na::distance(&plan.target, &position);
            if distance < plan.best_distance - self.config.stall_progress {
                plan.best_distance = distance;
                plan.stalled_ticks = 0;
            } else {
                plan.stalled_ticks += 1;
            }
            if plan.stalled_ticks >= self.config.stall_ticks {
                warn!(
                    target_cell = ?plan.target_cell,
                    distance,
                    "no progress towards waypoint, replanning"
                );
                plan = self.replan(obs)?;
            }
        }

        let action = self.pd_action(&plan.target, obs);
        trace!(?action, cell = ?plan.target_cell, "control tick");
        Ok((ControllerState { plan: Some(plan) }, action))
    }

    /// Plans from the agent's current cell to the desired goal.
    fn replan(&self, obs: &Observation) -> Result<Plan> {
        let maze = self.maze();
        let start = maze.world_to_cell(&obs.achieved_goal)?;
        let goal_cell = maze.world_to_cell(&obs.desired_goal)?;
        let mut plan = Plan {
            goal: obs.desired_goal,
            goal_cell,
            target: obs.desired_goal,
            target_cell: goal_cell,
            path: None,
            best_distance: f64::INFINITY,
            stalled_ticks: 0,
        };
        if start == goal_cell {
            debug!(cell = ?start, "already in goal cell");
            return Ok(plan);
        }

        let path = self.solver.solve_path(start, goal_cell)?;
        let first = path.get(start).ok_or(Error::MissingWaypoint(start))?;
        debug!(?start, goal = ?goal_cell, hops = path.len(), "replanned");
        if first != goal_cell {
            plan.retarget(first, maze.cell_to_world(first));
        }
        plan.path = Some(Arc::new(path));
        Ok(plan)
    }

    /// Moves the plan on to the waypoint after the current one.
    fn advance(&self, plan: &mut Plan, noise: &mut dyn WaypointNoise) -> Result<()> {
        let next = plan
            .path
            .as_ref()
            .and_then(|path| path.get(plan.target_cell))
            .ok_or(Error::MissingWaypoint(plan.target_cell))?;
        if next == plan.goal_cell {
            let goal = plan.goal;
            plan.retarget(next, goal);
        } else {
            let target = self.maze().cell_to_world(next) + noise.sample();
            plan.retarget(next, target);
        }
        debug!(cell = ?next, "waypoint reached, advancing");
        Ok(())
    }

    fn pd_action(&self, target: &Point, obs: &Observation) -> Vector {
        let raw = (*target - obs.achieved_goal) * self.config.kp + obs.velocity * self.config.kd;
        let (low, high) = (self.config.action_low, self.config.action_high);
        raw.map(|a| a.max(low).min(high))
    }
}

/// A waypoint follower for one agent, owning its state and jitter source.
///
/// Controllers over the same maze can share one [`GridPolicySolver`].
pub struct WaypointController<N: WaypointNoise> {
    policy: WaypointPolicy,
    state: ControllerState,
    noise: N,
}

impl<N: WaypointNoise> WaypointController<N> {
    /// Constructs a new `WaypointController` with no plan.
    pub fn new(solver: Arc<GridPolicySolver>, config: ControllerConfig, noise: N) -> Result<Self> {
        Ok(WaypointController {
            policy: WaypointPolicy::new(solver, config)?,
            state: ControllerState::default(),
            noise,
        })
    }

    /// Computes the action for this tick and updates the controller state.
    ///
    /// On error the previous state is kept.
    pub fn compute_action(&mut self, obs: &Observation) -> Result<Vector> {
        let (state, action) = self.policy.step(&self.state, obs, &mut self.noise)?;
        self.state = state;
        Ok(action)
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn policy(&self) -> &WaypointPolicy {
        &self.policy
    }

    /// Drops the current plan; the next tick replans.
    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }
}

impl WaypointController<Box<dyn WaypointNoise + Send>> {
    /// Builds a solver and a controller for `maze` from a complete configuration.
    pub fn from_config(maze: Arc<Maze>, config: &PlannerConfig) -> Result<Self> {
        config.validate()?;
        let solver = Arc::new(GridPolicySolver::new(maze, config.solver.clone())?);
        Self::new(solver, config.controller.clone(), config.noise.build())
    }
}
