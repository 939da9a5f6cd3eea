//! Orbit propagation and reference-frame math for Satstream.
//!
//! Everything in this crate is a pure function of its inputs: no I/O, no
//! async, no shared state. Session tasks call into it concurrently without
//! any locking.
//!
//! # Pipeline
//!
//! ```text
//! OrbitalElements --(KeplerPropagator, dt)--> OrbitState (ECI)
//!                 --(EarthFrame, instant)---> position (ECEF)
//!                 --(geodetic)--------------> latitude / longitude / altitude
//! ```
//!
//! # Modules
//!
//! - [`constants`] -- Physical constants (Earth `mu`, WGS-84, J2000 epoch)
//! - [`elements`] -- Validated classical orbital elements
//! - [`kepler`] -- Anomaly conversions and the Newton solver for Kepler's equation
//! - [`propagator`] -- Two-body propagation to inertial position/velocity
//! - [`frame`] -- ECI to ECEF rotation with Earth-orientation parameters
//! - [`geodetic`] -- ECEF to WGS-84 geodetic coordinates

pub mod constants;
pub mod elements;
pub mod error;
pub mod frame;
pub mod geodetic;
pub mod kepler;
pub mod propagator;

pub use elements::OrbitalElements;
pub use error::{ElementsError, PropagationError};
pub use frame::{EarthFrame, EarthOrientation};
pub use geodetic::Geodetic;
pub use kepler::KeplerSolver;
pub use propagator::{KeplerPropagator, OrbitState};
