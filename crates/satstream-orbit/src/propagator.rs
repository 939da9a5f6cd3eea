//! Two-body (Keplerian) propagation.
//!
//! [`KeplerPropagator::propagate`] advances a set of [`OrbitalElements`] by
//! an arbitrary elapsed time and returns the inertial (ECI) state. The
//! mean anomaly is reduced modulo `2*pi`, so propagation over many periods
//! costs the same as propagation within one.
//!
//! No perturbations are modelled (no J2, drag or third-body terms).

use nalgebra::{Rotation3, Vector3};

use crate::constants::TWO_PI;
use crate::elements::OrbitalElements;
use crate::error::PropagationError;
use crate::kepler::{self, KeplerSolver};

/// Inertial position and velocity at a single instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitState {
    /// Position in km, ECI frame.
    pub position_km: Vector3<f64>,
    /// Velocity in km/s, ECI frame.
    pub velocity_km_s: Vector3<f64>,
    /// True anomaly at this instant, in radians.
    pub true_anomaly: f64,
}

impl OrbitState {
    /// Distance from the central body in km.
    pub fn radius_km(&self) -> f64 {
        self.position_km.norm()
    }

    /// Speed in km/s.
    pub fn speed_km_s(&self) -> f64 {
        self.velocity_km_s.norm()
    }
}

/// Analytic two-body propagator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeplerPropagator {
    solver: KeplerSolver,
}

impl KeplerPropagator {
    /// Create a propagator using the given Kepler solver settings.
    pub const fn new(solver: KeplerSolver) -> Self {
        Self { solver }
    }

    /// The solver settings in use.
    pub const fn solver(&self) -> KeplerSolver {
        self.solver
    }

    /// Propagate `elements` by `dt_seconds` (may be negative or span many
    /// periods) and return the ECI state.
    ///
    /// `dt = 0` reproduces the element-defined true anomaly to within the
    /// solver tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`PropagationError::KeplerDidNotConverge`] when the Newton
    /// solver exhausts its iteration cap, or
    /// [`PropagationError::NonFiniteElapsed`] for a NaN/infinite `dt`.
    pub fn propagate(
        &self,
        elements: &OrbitalElements,
        dt_seconds: f64,
    ) -> Result<OrbitState, PropagationError> {
        if !dt_seconds.is_finite() {
            return Err(PropagationError::NonFiniteElapsed(dt_seconds));
        }

        let e = elements.eccentricity();
        let mu = elements.mu_km3_s2();

        let mean_anomaly = elements
            .mean_motion()
            .mul_add(dt_seconds, elements.mean_anomaly_at_epoch());

        let ecc_anomaly = self.solver.solve(mean_anomaly, e)?;
        let true_anomaly = kepler::eccentric_to_true(ecc_anomaly, e).rem_euclid(TWO_PI);

        let p = elements.semi_latus_rectum_km();
        let (sin_nu, cos_nu) = true_anomaly.sin_cos();
        let radius = p / e.mul_add(cos_nu, 1.0);

        let r_pf = Vector3::new(radius * cos_nu, radius * sin_nu, 0.0);
        let speed_scale = (mu / p).sqrt();
        let v_pf = Vector3::new(-speed_scale * sin_nu, speed_scale * (e + cos_nu), 0.0);

        let to_eci = perifocal_to_inertial(elements);

        Ok(OrbitState {
            position_km: to_eci * r_pf,
            velocity_km_s: to_eci * v_pf,
            true_anomaly,
        })
    }
}

/// Rotation from the perifocal (PQW) frame to ECI: `R3(Omega) * R1(i) * R3(omega)`.
fn perifocal_to_inertial(elements: &OrbitalElements) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), elements.raan())
        * Rotation3::from_axis_angle(&Vector3::x_axis(), elements.inclination())
        * Rotation3::from_axis_angle(&Vector3::z_axis(), elements.arg_perigee())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::elements::Angles;

    fn reference_orbit() -> OrbitalElements {
        OrbitalElements::new(
            7000.0,
            0.01,
            Angles::from_degrees(45.0, 80.0, 0.0, 0.0),
            Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn orbit(a: f64, e: f64, angles: Angles) -> OrbitalElements {
        OrbitalElements::new(a, e, angles, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .unwrap()
    }

    #[test]
    fn epoch_of_reference_orbit_is_at_perigee() {
        let state = KeplerPropagator::default()
            .propagate(&reference_orbit(), 0.0)
            .unwrap();
        assert!((state.radius_km() - 6930.0).abs() < 1.0, "r = {}", state.radius_km());
    }

    #[test]
    fn zero_elapsed_reproduces_element_anomaly() {
        let angles = Angles::from_degrees(51.6, 10.0, 30.0, 123.0);
        let el = orbit(6800.0, 0.2, angles);
        let state = KeplerPropagator::default().propagate(&el, 0.0).unwrap();
        assert!((state.true_anomaly - 123.0_f64.to_radians()).abs() < 1e-9);

        let circular = orbit(7000.0, 0.0, angles);
        let state = KeplerPropagator::default().propagate(&circular, 0.0).unwrap();
        assert!((state.true_anomaly - 123.0_f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn radius_stays_between_perigee_and_apogee() {
        let prop = KeplerPropagator::default();
        for e in [0.0, 0.01, 0.3, 0.75] {
            let el = orbit(8000.0, e, Angles::from_degrees(98.0, 200.0, 45.0, 10.0));
            let lo = el.perigee_radius_km() - 1e-6;
            let hi = el.apogee_radius_km() + 1e-6;
            let mut dt = -20_000.0;
            while dt < 200_000.0 {
                let r = prop.propagate(&el, dt).unwrap().radius_km();
                assert!(r >= lo && r <= hi, "e={e} dt={dt} r={r}");
                dt += 777.0;
            }
        }
    }

    #[test]
    fn state_repeats_after_one_period() {
        let prop = KeplerPropagator::default();
        let el = orbit(7000.0, 0.1, Angles::from_degrees(45.0, 80.0, 20.0, 0.0));
        let period = el.period_seconds();
        for dt in [0.0, 123.4, 4000.0, 1.0e6] {
            let a = prop.propagate(&el, dt).unwrap();
            let b = prop.propagate(&el, dt + period).unwrap();
            assert!(
                (a.position_km - b.position_km).norm() < 1e-3,
                "dt={dt} drift={}",
                (a.position_km - b.position_km).norm()
            );
        }
    }

    #[test]
    fn circular_orbit_has_constant_radius_and_speed() {
        let prop = KeplerPropagator::default();
        let el = orbit(7000.0, 0.0, Angles::from_degrees(0.0, 0.0, 0.0, 0.0));
        let expected_speed = (el.mu_km3_s2() / 7000.0).sqrt();
        for dt in [0.0, 600.0, 1234.5, 5000.0] {
            let s = prop.propagate(&el, dt).unwrap();
            assert!((s.radius_km() - 7000.0).abs() < 1e-6);
            assert!((s.speed_km_s() - expected_speed).abs() < 1e-9);
            assert!(s.position_km.z.abs() < 1e-9);
        }
    }

    #[test]
    fn energy_is_conserved() {
        let prop = KeplerPropagator::default();
        let el = orbit(12_000.0, 0.4, Angles::from_degrees(63.4, 15.0, 270.0, 0.0));
        let expected = -el.mu_km3_s2() / (2.0 * el.semi_major_axis_km());
        for dt in [0.0, 1500.0, 9000.0, 30_000.0] {
            let s = prop.propagate(&el, dt).unwrap();
            let energy = 0.5 * s.velocity_km_s.norm_squared() - el.mu_km3_s2() / s.radius_km();
            assert!((energy - expected).abs() < 1e-8, "dt={dt} energy={energy}");
        }
    }

    #[test]
    fn inclination_sets_angular_momentum_tilt() {
        let el = orbit(7000.0, 0.05, Angles::from_degrees(45.0, 80.0, 0.0, 0.0));
        let s = KeplerPropagator::default().propagate(&el, 321.0).unwrap();
        let h = s.position_km.cross(&s.velocity_km_s);
        let tilt = (h.z / h.norm()).acos();
        assert!((tilt - 45.0_f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn solver_failure_is_reported_per_sample() {
        let prop = KeplerPropagator::new(KeplerSolver {
            tolerance: 1e-10,
            max_iterations: 0,
        });
        let el = reference_orbit();
        for dt in [0.0, 10.0] {
            assert!(matches!(
                prop.propagate(&el, dt),
                Err(PropagationError::KeplerDidNotConverge { .. })
            ));
        }
    }

    #[test]
    fn non_finite_elapsed_is_rejected() {
        let err = KeplerPropagator::default()
            .propagate(&reference_orbit(), f64::NAN)
            .unwrap_err();
        assert!(matches!(err, PropagationError::NonFiniteElapsed(_)));
    }
}
