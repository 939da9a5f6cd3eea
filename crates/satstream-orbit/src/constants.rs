//! Physical constants used throughout the orbit crate.

use std::f64::consts::PI;

/// Earth's standard gravitational parameter in km^3/s^2 (EGM-96 / WGS-84).
pub const MU_EARTH_KM3_S2: f64 = 398_600.441_8;

/// WGS-84 equatorial radius in km.
pub const WGS84_A_KM: f64 = 6_378.137;

/// WGS-84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Days in one Julian century.
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Full turn in radians.
pub const TWO_PI: f64 = 2.0 * PI;

/// Arcseconds per radian.
pub const ARCSEC_PER_RADIAN: f64 = 180.0 * 3600.0 / PI;

/// Unix timestamp of the J2000.0 epoch (2000-01-01T12:00:00 UTC).
pub const J2000_UNIX_SECONDS: i64 = 946_728_000;
