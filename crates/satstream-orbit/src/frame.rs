//! Inertial (ECI) to Earth-fixed (ECEF) frame transformation.
//!
//! The rotation applied at instant `t` is
//!
//! ```text
//! r_ecef = W(xp, yp) * R3(GMST(UT1)) * r_eci
//! ```
//!
//! where GMST is the IAU 1982 Greenwich mean sidereal time evaluated at
//! `UT1 = UTC + dUT1`, and `W` is the polar-motion matrix. With all
//! [`EarthOrientation`] parameters at zero this reduces to a
//! sidereal-rotation-only transform. Precession and nutation are not
//! modelled, so the inertial frame is effectively the true-of-date frame.
//!
//! Every step is a proper rotation, so vector magnitude is preserved.
//!
//! # Malformed timestamps
//!
//! [`EarthFrame::to_earth_fixed`] accepts the timestamp as text. If the
//! text cannot be parsed, the current wall-clock instant is used instead
//! and a warning is logged. The caller always gets a finite vector back
//! for a finite input; the stream is never interrupted by a bad timestamp.

use chrono::{DateTime, NaiveDateTime, Utc};
use nalgebra::{Rotation3, Vector3};
use serde::Deserialize;
use tracing::warn;

use crate::constants::{
    ARCSEC_PER_RADIAN, DAYS_PER_JULIAN_CENTURY, J2000_UNIX_SECONDS, SECONDS_PER_DAY,
};

const GMST_BASE_DEG: f64 = 280.460_618_37;
const GMST_ROTATION_PER_DAY_DEG: f64 = 360.985_647_366_29;
const GMST_T2_DEG: f64 = 0.000_387_933;
const GMST_T3_DIVISOR: f64 = 38_710_000.0;

/// Naive formats accepted in addition to RFC 3339; interpreted as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Earth-orientation parameters applied on top of sidereal rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct EarthOrientation {
    /// `UT1 - UTC` in seconds.
    #[serde(default)]
    pub ut1_minus_utc_seconds: f64,
    /// Polar motion `xp` in arcseconds.
    #[serde(default)]
    pub polar_motion_x_arcsec: f64,
    /// Polar motion `yp` in arcseconds.
    #[serde(default)]
    pub polar_motion_y_arcsec: f64,
}

/// Stateless ECI to ECEF transformer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarthFrame {
    orientation: EarthOrientation,
    polar_motion: Rotation3<f64>,
}

impl EarthFrame {
    /// Build a transformer using the given Earth-orientation parameters.
    pub fn new(orientation: EarthOrientation) -> Self {
        let xp = orientation.polar_motion_x_arcsec / ARCSEC_PER_RADIAN;
        let yp = orientation.polar_motion_y_arcsec / ARCSEC_PER_RADIAN;
        // W = R1(-yp) * R2(-xp) as frame rotations.
        let polar_motion = Rotation3::from_axis_angle(&Vector3::x_axis(), yp)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), xp);
        Self {
            orientation,
            polar_motion,
        }
    }

    /// The Earth-orientation parameters in use.
    pub const fn orientation(&self) -> EarthOrientation {
        self.orientation
    }

    /// Greenwich mean sidereal time at `instant`, in radians `[0, 2*pi)`.
    pub fn gmst(&self, instant: &DateTime<Utc>) -> f64 {
        let days = days_since_j2000(instant)
            + self.orientation.ut1_minus_utc_seconds / SECONDS_PER_DAY;
        let centuries = days / DAYS_PER_JULIAN_CENTURY;
        let t2 = centuries * centuries;
        let degrees = GMST_T2_DEG.mul_add(
            t2,
            GMST_ROTATION_PER_DAY_DEG.mul_add(days, GMST_BASE_DEG),
        ) - t2 * centuries / GMST_T3_DIVISOR;
        degrees.rem_euclid(360.0).to_radians()
    }

    /// Full ECI to ECEF rotation at `instant`.
    pub fn rotation_at(&self, instant: &DateTime<Utc>) -> Rotation3<f64> {
        let sidereal = Rotation3::from_axis_angle(&Vector3::z_axis(), -self.gmst(instant));
        self.polar_motion * sidereal
    }

    /// Rotate an ECI vector into the Earth-fixed frame at `instant`.
    pub fn to_earth_fixed_at(&self, position: &Vector3<f64>, instant: &DateTime<Utc>) -> Vector3<f64> {
        self.rotation_at(instant) * position
    }

    /// Rotate an ECI vector into the Earth-fixed frame at the instant
    /// written in `timestamp`.
    ///
    /// Falls back to the current wall-clock time if `timestamp` cannot be
    /// parsed. Never fails.
    pub fn to_earth_fixed(&self, position: &Vector3<f64>, timestamp: &str) -> Vector3<f64> {
        let instant = parse_instant(timestamp).unwrap_or_else(|| {
            warn!(timestamp, "Unparseable timestamp, rotating at current time");
            Utc::now()
        });
        self.to_earth_fixed_at(position, &instant)
    }

    /// Rotate at `instant` if one could be computed, otherwise at the
    /// current wall-clock time.
    ///
    /// Used when the caller's time arithmetic overflowed.
    pub fn to_earth_fixed_or_now(
        &self,
        position: &Vector3<f64>,
        instant: Option<DateTime<Utc>>,
    ) -> Vector3<f64> {
        let instant = instant.unwrap_or_else(|| {
            warn!("Instant out of range, rotating at current time");
            Utc::now()
        });
        self.to_earth_fixed_at(position, &instant)
    }
}

impl Default for EarthFrame {
    fn default() -> Self {
        Self::new(EarthOrientation::default())
    }
}

/// Parse an absolute UTC instant from RFC 3339 or naive ISO-8601 text.
///
/// Naive timestamps (no offset) are taken to be UTC.
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Fractional days elapsed since J2000.0 (UTC scale).
#[allow(clippy::cast_precision_loss)]
fn days_since_j2000(instant: &DateTime<Utc>) -> f64 {
    let seconds = instant.timestamp().saturating_sub(J2000_UNIX_SECONDS) as f64;
    let fraction = f64::from(instant.timestamp_subsec_nanos()) / 1e9;
    (seconds + fraction) / SECONDS_PER_DAY
}
