use nalgebra as na;
use pointmaze::{
    maze::layouts, Maze, Observation, PlannerConfig, Point, Result, Vector, WaypointController,
};
use rand::prelude::*;
use std::{path::Path, sync::Arc};
use tracing::info;

/// Integration time step, in seconds.
const DT: f64 = 0.02;
/// Acceleration per unit of action.
const FORCE_GAIN: f64 = 5.0;
/// Distance at which a goal counts as reached.
const SUCCESS_RADIUS: f64 = 0.45;

/// A point mass that cannot enter walls.
struct Ball {
    position: Point,
    velocity: Vector,
}

impl Ball {
    /// Applies a force for one time step.
    ///
    /// Each axis is integrated separately; an axis whose move would end inside a wall is
    /// stopped.
    fn act(&mut self, maze: &Maze, action: Vector) {
        self.velocity += action * FORCE_GAIN * DT;
        for axis in 0..2 {
            let mut next = self.position;
            next[axis] += self.velocity[axis] * DT;
            match maze.world_to_cell(&next) {
                Ok(cell) if maze.is_open(cell) => self.position = next,
                _ => self.velocity[axis] = 0.0,
            }
        }
    }
}

fn random_goal(maze: &Maze, rng: &mut impl Rng) -> Point {
    let cells: Vec<_> = maze.empty_cells().collect();
    let cell = cells[rng.gen_range(0..cells.len())];
    let jitter = Vector::new(rng.gen_range(-0.25..0.25), rng.gen_range(-0.25..0.25));
    maze.cell_to_world(cell) + jitter * maze.scale()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pointmaze=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = match args.get(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            PlannerConfig::load(Path::new(path))?
        }
        None => PlannerConfig::default(),
    };
    let steps: usize = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(20_000);

    let maze = Arc::new(Maze::from_grid(layouts::MEDIUM_MAZE)?);
    println!("{}", maze);
    let mut controller = WaypointController::from_config(Arc::clone(&maze), &config)?;

    let mut rng = thread_rng();
    let mut ball = Ball {
        position: random_goal(&maze, &mut rng),
        velocity: Vector::zeros(),
    };
    let mut goal = random_goal(&maze, &mut rng);
    let mut reached = 0;

    // Continuing task: a new goal is drawn on arrival and the ball carries on from where it is
    for step in 0..steps {
        let obs = Observation::new(ball.position, ball.velocity, goal);
        let mut action = controller.compute_action(&obs)?;
        action += Vector::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5));
        ball.act(&maze, action);

        if na::distance(&ball.position, &goal) <= SUCCESS_RADIUS {
            reached += 1;
            info!(step, reached, x = goal.x, y = goal.y, "goal reached");
            goal = random_goal(&maze, &mut rng);
        }
    }

    println!("Reached {} goals in {} steps", reached, steps);
    Ok(())
}
