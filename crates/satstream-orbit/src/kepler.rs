//! Anomaly conversions and the Newton-Raphson solver for Kepler's equation.
//!
//! All functions take and return radians. Conversions between true and
//! eccentric anomaly use the half-angle `atan2` forms, which stay well
//! defined at `e = 0` (circular orbits) and never divide by `sin` or `e`.

use crate::constants::TWO_PI;
use crate::error::PropagationError;

/// Default convergence tolerance on `|E_{k+1} - E_k|`, in radians.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default iteration cap for the Newton solver.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Newton-Raphson solver for `M = E - e*sin(E)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerSolver {
    /// Stop once successive iterates differ by less than this (radians).
    pub tolerance: f64,
    /// Give up after this many iterations.
    pub max_iterations: u32,
}

impl Default for KeplerSolver {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl KeplerSolver {
    /// Solve Kepler's equation for the eccentric anomaly `E`.
    ///
    /// `mean_anomaly` may be any finite value; it is reduced to
    /// `[0, 2*pi)` first. The initial guess is `E0 = M`.
    ///
    /// # Errors
    ///
    /// Returns [`PropagationError::KeplerDidNotConverge`] if the step size
    /// is still above tolerance after `max_iterations` steps.
    pub fn solve(&self, mean_anomaly: f64, eccentricity: f64) -> Result<f64, PropagationError> {
        let m = mean_anomaly.rem_euclid(TWO_PI);
        let mut e_anom = m;

        for _ in 0..self.max_iterations {
            let (sin_e, cos_e) = e_anom.sin_cos();
            let f = eccentricity.mul_add(-sin_e, e_anom) - m;
            let f_prime = eccentricity.mul_add(-cos_e, 1.0);
            let step = f / f_prime;
            e_anom -= step;
            if step.abs() < self.tolerance {
                return Ok(e_anom);
            }
        }

        Err(PropagationError::KeplerDidNotConverge {
            mean_anomaly: m,
            eccentricity,
            iterations: self.max_iterations,
        })
    }
}

/// Eccentric anomaly from true anomaly.
pub fn true_to_eccentric(true_anomaly: f64, eccentricity: f64) -> f64 {
    let (sin_half, cos_half) = (true_anomaly / 2.0).sin_cos();
    2.0 * ((1.0 - eccentricity).sqrt() * sin_half).atan2((1.0 + eccentricity).sqrt() * cos_half)
}

/// True anomaly from eccentric anomaly.
pub fn eccentric_to_true(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    let (sin_half, cos_half) = (eccentric_anomaly / 2.0).sin_cos();
    2.0 * ((1.0 + eccentricity).sqrt() * sin_half).atan2((1.0 - eccentricity).sqrt() * cos_half)
}

/// Mean anomaly from eccentric anomaly, reduced to `[0, 2*pi)`.
pub fn eccentric_to_mean(eccentric_anomaly: f64, eccentricity: f64) -> f64 {
    eccentricity
        .mul_add(-eccentric_anomaly.sin(), eccentric_anomaly)
        .rem_euclid(TWO_PI)
}

/// Mean anomaly from true anomaly, reduced to `[0, 2*pi)`.
pub fn true_to_mean(true_anomaly: f64, eccentricity: f64) -> f64 {
    eccentric_to_mean(true_to_eccentric(true_anomaly, eccentricity), eccentricity)
}
