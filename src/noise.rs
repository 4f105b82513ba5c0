//! Jitter sources for intermediate waypoints.
//!
//! Offsetting each intermediate waypoint from its cell centre varies the trajectories the
//! controller produces. Tests use [`NoNoise`] to get exact, repeatable targets.

use super::Vector;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Provides the offset added to the next intermediate waypoint.
pub trait WaypointNoise {
    /// Draws a new offset.
    fn sample(&mut self) -> Vector;
}

impl<N: WaypointNoise + ?Sized> WaypointNoise for Box<N> {
    fn sample(&mut self) -> Vector {
        (**self).sample()
    }
}

/// A noise source that always returns a zero offset.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNoise;

impl WaypointNoise for NoNoise {
    fn sample(&mut self) -> Vector {
        Vector::zeros()
    }
}

/// Uniform jitter in `(-magnitude, 0]` on each axis.
#[derive(Clone, Debug)]
pub struct UniformJitter<R> {
    rng: R,
    magnitude: f64,
}

impl<R: Rng> UniformJitter<R> {
    /// Constructs a new `UniformJitter` drawing from `rng`.
    pub fn new(rng: R, magnitude: f64) -> Self {
        UniformJitter { rng, magnitude }
    }

    /// The largest offset, per axis.
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }
}

impl UniformJitter<StdRng> {
    /// Constructs a reproducible `UniformJitter`.
    pub fn seeded(seed: u64, magnitude: f64) -> Self {
        Self::new(StdRng::seed_from_u64(seed), magnitude)
    }

    pub fn from_entropy(magnitude: f64) -> Self {
        Self::new(StdRng::from_entropy(), magnitude)
    }
}

impl<R: Rng> WaypointNoise for UniformJitter<R> {
    fn sample(&mut self) -> Vector {
        let dx: f64 = self.rng.gen();
        let dy: f64 = self.rng.gen();
        -Vector::new(dx, dy) * self.magnitude
    }
}
