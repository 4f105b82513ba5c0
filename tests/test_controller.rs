//! Tests for the waypoint controller, open loop and in closed loop with a point mass.

mod common;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use common::{drive, PointMass};
use nalgebra as na;
use pointmaze::{
    maze::layouts, ControllerConfig, ControllerState, Error, GridPolicySolver, Maze, NoNoise,
    Observation, PlannerConfig, Point, SolverConfig, UniformJitter, Vector, WaypointController,
    WaypointNoise,
};
use std::sync::Arc;

fn shared_solver(layout: &[&[u8]]) -> Arc<GridPolicySolver> {
    let maze = Arc::new(Maze::from_grid(layout).unwrap());
    Arc::new(GridPolicySolver::new(maze, SolverConfig::default()).unwrap())
}

fn controller<N: WaypointNoise>(
    layout: &[&[u8]],
    config: ControllerConfig,
    noise: N,
) -> WaypointController<N> {
    WaypointController::new(shared_solver(layout), config, noise).unwrap()
}

#[test]
fn test_action_is_clamped() {
    let mut c = controller(layouts::U_MAZE, ControllerConfig::default(), NoNoise);
    let obs = Observation::new(
        Point::new(-1.0, 1.0),
        Vector::new(0.0, 5.0),
        Point::new(-1.0, -1.0),
    );
    // raw output is (10, -5)
    let action = c.compute_action(&obs).unwrap();
    assert_eq!(action, Vector::new(1.0, -1.0));
}

#[test]
fn test_custom_action_range() {
    let config = ControllerConfig {
        action_low: -0.25,
        action_high: 0.5,
        ..ControllerConfig::default()
    };
    let mut c = controller(layouts::U_MAZE, config, NoNoise);
    let obs = Observation::new(
        Point::new(-1.0, 1.0),
        Vector::new(0.0, 5.0),
        Point::new(-1.0, -1.0),
    );
    assert_eq!(c.compute_action(&obs).unwrap(), Vector::new(0.5, -0.25));
}

#[test]
fn test_arrival_on_first_call_targets_goal() {
    let mut c = controller(layouts::U_MAZE, ControllerConfig::default(), NoNoise);
    let goal = Point::new(-0.9, 1.05);
    let obs = Observation::new(Point::new(-1.0, 1.0), Vector::new(0.1, 0.0), goal);
    let action = c.compute_action(&obs).unwrap();

    let plan = c.state().plan().unwrap();
    assert!(plan.path().is_none());
    assert!(plan.is_final());
    assert_eq!(plan.target(), goal);
    assert_relative_eq!(action.x, 10.0 * 0.1 - 0.1, epsilon = 1e-9);
    assert_relative_eq!(action.y, 10.0 * 0.05, epsilon = 1e-9);
}

#[test]
fn test_goal_change_triggers_replanning() {
    let mut c = controller(layouts::U_MAZE, ControllerConfig::default(), NoNoise);
    let position = Point::new(-1.0, 1.0);
    c.compute_action(&Observation::new(position, Vector::zeros(), Point::new(-1.0, -1.0)))
        .unwrap();
    assert_eq!(c.state().plan().unwrap().goal_cell(), (3, 1));

    // a shift inside the tolerance keeps the plan
    let nudged = Point::new(-1.0005, -1.0);
    c.compute_action(&Observation::new(position, Vector::zeros(), nudged))
        .unwrap();
    assert_eq!(c.state().plan().unwrap().goal(), Point::new(-1.0, -1.0));

    let moved = Point::new(1.0, -1.0);
    c.compute_action(&Observation::new(position, Vector::zeros(), moved))
        .unwrap();
    let plan = c.state().plan().unwrap();
    assert_eq!(plan.goal(), moved);
    assert_eq!(plan.goal_cell(), (3, 3));
    assert_eq!(plan.path().unwrap().goal(), (3, 3));
    assert_eq!(plan.path().unwrap().len(), 4);
}

#[test]
fn test_waypoint_advances_within_threshold() {
    let mut c = controller(layouts::U_MAZE, ControllerConfig::default(), NoNoise);
    let goal = Point::new(-1.0, -1.0);
    c.compute_action(&Observation::new(Point::new(-1.0, 1.0), Vector::zeros(), goal))
        .unwrap();
    assert_eq!(c.state().plan().unwrap().target_cell(), (1, 2));

    // within 0.1 of the centre of (1, 2)
    c.compute_action(&Observation::new(Point::new(-0.05, 1.05), Vector::zeros(), goal))
        .unwrap();
    let plan = c.state().plan().unwrap();
    assert_eq!(plan.target_cell(), (1, 3));
    assert_eq!(plan.target(), Point::new(1.0, 1.0));
}

#[test]
fn test_jitter_offsets_intermediate_waypoints_only() {
    let mut c = controller(
        layouts::U_MAZE,
        ControllerConfig::default(),
        UniformJitter::seeded(11, 0.2),
    );
    let goal = Point::new(-0.9, -0.9);
    c.compute_action(&Observation::new(Point::new(-1.0, 1.0), Vector::zeros(), goal))
        .unwrap();
    c.compute_action(&Observation::new(Point::new(0.0, 1.0), Vector::zeros(), goal))
        .unwrap();
    let target = c.state().plan().unwrap().target();
    let offset = target - Point::new(1.0, 1.0);
    assert!(offset.x <= 0.0 && offset.x > -0.2);
    assert!(offset.y <= 0.0 && offset.y > -0.2);

    // the last hop goes to the exact goal
    let mut state = c.state().clone();
    let policy = c.policy();
    let mut noise = UniformJitter::seeded(12, 0.2);
    for &(x, y) in &[(1.0, 0.0), (1.0, -1.0), (0.0, -1.0), (-1.0, -1.0)] {
        let near = state.plan().unwrap().target();
        let obs = Observation::new(near, Vector::zeros(), goal);
        state = policy.step(&state, &obs, &mut noise).unwrap().0;
        let plan = state.plan().unwrap();
        if plan.is_final() {
            assert_eq!(plan.target(), goal);
        } else {
            assert!(na::distance(&plan.target(), &Point::new(x, y)) < 0.3);
        }
    }
    assert!(state.plan().unwrap().is_final());
}

#[test]
fn test_step_is_pure() {
    let c = controller(layouts::MEDIUM_MAZE, ControllerConfig::default(), NoNoise);
    let policy = c.policy();
    let start = ControllerState::default();
    let obs = Observation::new(Point::new(-2.5, 2.5), Vector::zeros(), Point::new(2.5, -2.5));
    let (a, action_a) = policy.step(&start, &obs, &mut NoNoise).unwrap();
    let (b, action_b) = policy.step(&start, &obs, &mut NoNoise).unwrap();
    assert_eq!(a, b);
    assert_eq!(action_a, action_b);
    assert!(start.plan().is_none());
}

#[test]
fn test_converges_through_every_waypoint() {
    let config = ControllerConfig {
        stall_ticks: 0,
        ..ControllerConfig::default()
    };
    let mut c = controller(layouts::U_MAZE, config, NoNoise);
    let goal = Point::new(-1.0, -1.0);
    let mut body = PointMass::at(Point::new(-1.0, 1.0));
    let targets = drive(&mut c, &mut body, goal, 3000).unwrap();

    assert_eq!(
        targets,
        vec![(1, 2), (1, 3), (2, 3), (3, 3), (3, 2), (3, 1)]
    );
    assert_abs_diff_eq!(body.position.x, goal.x, epsilon = 0.05);
    assert_abs_diff_eq!(body.position.y, goal.y, epsilon = 0.05);
}

#[test]
fn test_converges_with_jitter_and_stall_detection() {
    let mut c = controller(
        layouts::U_MAZE,
        ControllerConfig::default(),
        UniformJitter::seeded(5, 0.2),
    );
    let goal = Point::new(-1.1, -0.8);
    let mut body = PointMass::at(Point::new(-1.0, 1.0));
    let targets = drive(&mut c, &mut body, goal, 3000).unwrap();
    assert_eq!(targets.last(), Some(&(3, 1)));
    assert!(na::distance(&body.position, &goal) < 0.05);
}

#[test]
fn test_continuing_task_follows_new_goals() {
    let mut c = WaypointController::from_config(
        Arc::new(Maze::from_grid(layouts::MEDIUM_MAZE).unwrap()),
        &PlannerConfig::from_toml_str("[noise]\nkind = \"seeded\"\nmagnitude = 0.2\nseed = 3")
            .unwrap(),
    )
    .unwrap();
    let maze = Maze::from_grid(layouts::MEDIUM_MAZE).unwrap();
    let mut body = PointMass::at(maze.cell_to_world((1, 1)));
    for &cell in &[(6, 6), (1, 5), (4, 1)] {
        let goal = maze.cell_to_world(cell);
        drive(&mut c, &mut body, goal, 4000).unwrap();
        assert!(
            na::distance(&body.position, &goal) < 0.05,
            "did not reach {:?}",
            cell
        );
    }
}

#[test]
fn test_failed_tick_keeps_state() {
    let mut c = controller(layouts::U_MAZE, ControllerConfig::default(), NoNoise);
    let position = Point::new(-1.0, 1.0);
    c.compute_action(&Observation::new(position, Vector::zeros(), Point::new(-1.0, -1.0)))
        .unwrap();
    let before = c.state().clone();

    // goal inside the wall cell (2, 1)
    let err = c
        .compute_action(&Observation::new(position, Vector::zeros(), Point::new(-1.0, 0.0)))
        .unwrap_err();
    assert!(matches!(err, Error::WallCell((2, 1))));
    assert_eq!(c.state(), &before);

    let err = c
        .compute_action(&Observation::new(position, Vector::zeros(), Point::new(9.0, 0.0)))
        .unwrap_err();
    assert!(matches!(err, Error::OutsideMaze { .. }));
}

#[test]
fn test_reset_drops_plan() {
    let mut c = controller(layouts::U_MAZE, ControllerConfig::default(), NoNoise);
    c.compute_action(&Observation::new(
        Point::new(-1.0, 1.0),
        Vector::zeros(),
        Point::new(-1.0, -1.0),
    ))
    .unwrap();
    assert!(c.state().plan().is_some());
    c.reset();
    assert!(c.state().plan().is_none());
}

#[test]
fn test_rejects_invalid_gains() {
    let config = ControllerConfig {
        waypoint_threshold: 0.0,
        ..ControllerConfig::default()
    };
    assert!(matches!(
        WaypointController::new(shared_solver(layouts::OPEN), config, NoNoise),
        Err(Error::Config(_))
    ));
}
