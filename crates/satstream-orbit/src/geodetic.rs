//! Earth-fixed Cartesian to WGS-84 geodetic coordinates.

use nalgebra::Vector3;
use serde::Serialize;

use crate::constants::{WGS84_A_KM, WGS84_F};

const MAX_ITERATIONS: u32 = 10;
const LATITUDE_TOLERANCE: f64 = 1e-12;

/// Geodetic latitude/longitude (degrees) and height above the ellipsoid (km).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geodetic {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude_deg: f64,
    /// Longitude in degrees, `(-180, 180]`.
    pub longitude_deg: f64,
    /// Height above the WGS-84 ellipsoid in km.
    pub altitude_km: f64,
}

impl Geodetic {
    /// Convert an ECEF position in km to geodetic coordinates.
    pub fn from_ecef(position: &Vector3<f64>) -> Self {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let p = position.x.hypot(position.y);
        let longitude = position.y.atan2(position.x);

        let mut latitude = position.z.atan2(p * (1.0 - e2));
        let mut altitude = 0.0;
        for _ in 0..MAX_ITERATIONS {
            let (sin_lat, cos_lat) = latitude.sin_cos();
            let n = WGS84_A_KM / (e2 * sin_lat).mul_add(-sin_lat, 1.0).sqrt();
            altitude = p.mul_add(cos_lat, position.z * sin_lat) - WGS84_A_KM * WGS84_A_KM / n;
            let next = position.z.atan2(p * (1.0 - e2 * n / (n + altitude)));
            let converged = (next - latitude).abs() < LATITUDE_TOLERANCE;
            latitude = next;
            if converged {
                break;
            }
        }

        Self {
            latitude_deg: latitude.to_degrees(),
            longitude_deg: longitude.to_degrees(),
            altitude_km: altitude,
        }
    }
}
