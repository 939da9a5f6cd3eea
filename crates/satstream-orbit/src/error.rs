//! Error types for orbit construction and propagation.

/// Reasons a set of orbital elements is rejected at construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElementsError {
    /// Semi-major axis must be finite and strictly positive.
    #[error("semi-major axis must be > 0 km, got {0}")]
    SemiMajorAxis(f64),

    /// Eccentricity must lie in `[0, 1)` (elliptical orbits only).
    #[error("eccentricity must be in [0, 1), got {0}")]
    Eccentricity(f64),

    /// Gravitational parameter must be finite and strictly positive.
    #[error("gravitational parameter must be > 0, got {0}")]
    GravitationalParameter(f64),

    /// An angle was NaN or infinite.
    #[error("angle `{name}` is not finite")]
    NonFiniteAngle {
        /// Which element was invalid.
        name: &'static str,
    },
}

/// Failure to produce a state vector for one sample.
///
/// Local to a single sample; callers decide whether to skip it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropagationError {
    /// Newton iteration on Kepler's equation hit the iteration cap.
    #[error(
        "Kepler's equation did not converge after {iterations} iterations \
         (M = {mean_anomaly} rad, e = {eccentricity})"
    )]
    KeplerDidNotConverge {
        /// Mean anomaly that was being solved, in radians.
        mean_anomaly: f64,
        /// Orbit eccentricity.
        eccentricity: f64,
        /// Number of iterations attempted.
        iterations: u32,
    },

    /// The elapsed time was NaN or infinite.
    #[error("elapsed time is not finite: {0}")]
    NonFiniteElapsed(f64),
}
