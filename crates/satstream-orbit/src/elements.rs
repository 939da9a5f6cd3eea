//! Classical orbital elements.
//!
//! [`OrbitalElements`] is immutable once built. Every invariant is checked
//! in the constructor so that propagation never has to re-validate:
//!
//! - `a > 0` and finite
//! - `0 <= e < 1` (elliptical orbits only)
//! - `mu > 0` and finite
//! - all angles finite, stored normalized to `[0, 2*pi)`

use chrono::{DateTime, Utc};

use crate::constants::{MU_EARTH_KM3_S2, TWO_PI};
use crate::error::ElementsError;
use crate::kepler;

/// The four orientation/phase angles of a classical element set, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Angles {
    /// Inclination `i`.
    pub inclination: f64,
    /// Right ascension of the ascending node `Omega`.
    pub raan: f64,
    /// Argument of perigee `omega`.
    pub arg_perigee: f64,
    /// True anomaly `nu` at the reference epoch.
    pub true_anomaly: f64,
}

impl Angles {
    /// Build from angles given in degrees.
    pub fn from_degrees(inclination: f64, raan: f64, arg_perigee: f64, true_anomaly: f64) -> Self {
        Self {
            inclination: inclination.to_radians(),
            raan: raan.to_radians(),
            arg_perigee: arg_perigee.to_radians(),
            true_anomaly: true_anomaly.to_radians(),
        }
    }
}

/// Validated, immutable classical orbital elements about Earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    semi_major_axis_km: f64,
    eccentricity: f64,
    inclination: f64,
    raan: f64,
    arg_perigee: f64,
    true_anomaly: f64,
    epoch: DateTime<Utc>,
    mu_km3_s2: f64,
}

impl OrbitalElements {
    /// Build an Earth orbit from its shape, orientation and epoch.
    ///
    /// # Errors
    ///
    /// Returns [`ElementsError`] if `a <= 0`, `e` is outside `[0, 1)`, or
    /// any angle is not finite.
    pub fn new(
        semi_major_axis_km: f64,
        eccentricity: f64,
        angles: Angles,
        epoch: DateTime<Utc>,
    ) -> Result<Self, ElementsError> {
        Self::with_mu(semi_major_axis_km, eccentricity, angles, epoch, MU_EARTH_KM3_S2)
    }

    /// Build an orbit around a body with gravitational parameter `mu` (km^3/s^2).
    ///
    /// # Errors
    ///
    /// Same as [`OrbitalElements::new`], plus
    /// [`ElementsError::GravitationalParameter`] for a non-positive `mu`.
    pub fn with_mu(
        semi_major_axis_km: f64,
        eccentricity: f64,
        angles: Angles,
        epoch: DateTime<Utc>,
        mu_km3_s2: f64,
    ) -> Result<Self, ElementsError> {
        if !(semi_major_axis_km.is_finite() && semi_major_axis_km > 0.0) {
            return Err(ElementsError::SemiMajorAxis(semi_major_axis_km));
        }
        if !(0.0..1.0).contains(&eccentricity) {
            return Err(ElementsError::Eccentricity(eccentricity));
        }
        if !(mu_km3_s2.is_finite() && mu_km3_s2 > 0.0) {
            return Err(ElementsError::GravitationalParameter(mu_km3_s2));
        }

        Ok(Self {
            semi_major_axis_km,
            eccentricity,
            inclination: normalize_angle("inclination", angles.inclination)?,
            raan: normalize_angle("raan", angles.raan)?,
            arg_perigee: normalize_angle("arg_perigee", angles.arg_perigee)?,
            true_anomaly: normalize_angle("true_anomaly", angles.true_anomaly)?,
            epoch,
            mu_km3_s2,
        })
    }

    /// Semi-major axis `a` in km.
    pub const fn semi_major_axis_km(&self) -> f64 {
        self.semi_major_axis_km
    }

    /// Eccentricity `e`.
    pub const fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    /// Inclination in radians, `[0, 2*pi)`.
    pub const fn inclination(&self) -> f64 {
        self.inclination
    }

    /// Right ascension of the ascending node in radians, `[0, 2*pi)`.
    pub const fn raan(&self) -> f64 {
        self.raan
    }

    /// Argument of perigee in radians, `[0, 2*pi)`.
    pub const fn arg_perigee(&self) -> f64 {
        self.arg_perigee
    }

    /// True anomaly at epoch in radians, `[0, 2*pi)`.
    pub const fn true_anomaly(&self) -> f64 {
        self.true_anomaly
    }

    /// Reference epoch `t0`.
    pub const fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Central-body gravitational parameter in km^3/s^2.
    pub const fn mu_km3_s2(&self) -> f64 {
        self.mu_km3_s2
    }

    /// Mean motion `n = sqrt(mu / a^3)` in rad/s.
    pub fn mean_motion(&self) -> f64 {
        (self.mu_km3_s2 / self.semi_major_axis_km.powi(3)).sqrt()
    }

    /// Orbital period `T = 2*pi*sqrt(a^3 / mu)` in seconds.
    pub fn period_seconds(&self) -> f64 {
        TWO_PI / self.mean_motion()
    }

    /// Semi-latus rectum `p = a(1 - e^2)` in km.
    pub fn semi_latus_rectum_km(&self) -> f64 {
        self.semi_major_axis_km * self.eccentricity.mul_add(-self.eccentricity, 1.0)
    }

    /// Perigee radius `a(1 - e)` in km.
    pub fn perigee_radius_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 - self.eccentricity)
    }

    /// Apogee radius `a(1 + e)` in km.
    pub fn apogee_radius_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 + self.eccentricity)
    }

    /// Mean anomaly `M0` at epoch, derived from the true anomaly.
    pub fn mean_anomaly_at_epoch(&self) -> f64 {
        kepler::true_to_mean(self.true_anomaly, self.eccentricity)
    }
}

fn normalize_angle(name: &'static str, value: f64) -> Result<f64, ElementsError> {
    if value.is_finite() {
        // rem_euclid rounds tiny negatives up to exactly 2*pi.
        let reduced = value.rem_euclid(TWO_PI);
        Ok(if reduced >= TWO_PI { 0.0 } else { reduced })
    } else {
        Err(ElementsError::NonFiniteAngle { name })
    }
}
