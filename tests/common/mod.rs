//! A minimal point mass for driving the controller in closed loop.

#![allow(dead_code)]

use pointmaze::{Cell, Observation, Point, Result, Vector, WaypointController, WaypointNoise};

pub const DT: f64 = 0.02;
pub const FORCE_GAIN: f64 = 5.0;

pub struct PointMass {
    pub position: Point,
    pub velocity: Vector,
}

impl PointMass {
    pub fn at(position: Point) -> Self {
        PointMass {
            position,
            velocity: Vector::zeros(),
        }
    }

    pub fn observe(&self, goal: Point) -> Observation {
        Observation::new(self.position, self.velocity, goal)
    }

    /// Integrates one step of `action` with semi-implicit Euler.
    pub fn act(&mut self, action: Vector) {
        self.velocity += action * FORCE_GAIN * DT;
        self.position += self.velocity * DT;
    }
}

/// Runs the closed loop for `ticks` steps, returning every distinct waypoint cell in the order
/// they became active.
pub fn drive<N: WaypointNoise>(
    controller: &mut WaypointController<N>,
    body: &mut PointMass,
    goal: Point,
    ticks: usize,
) -> Result<Vec<Cell>> {
    let mut targets: Vec<Cell> = Vec::new();
    for _ in 0..ticks {
        let action = controller.compute_action(&body.observe(goal))?;
        if let Some(plan) = controller.state().plan() {
            if targets.last() != Some(&plan.target_cell()) {
                targets.push(plan.target_cell());
            }
        }
        body.act(action);
    }
    Ok(targets)
}
