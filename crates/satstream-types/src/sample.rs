//! The unit of data streamed to connected clients.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One Earth-fixed satellite position at an absolute UTC instant.
///
/// Serialized as:
///
/// ```json
/// { "timestamp": "2024-03-01T12:00:10.000000Z", "position": [x, y, z] }
/// ```
///
/// `position` is in kilometres in the Earth-centred, Earth-fixed frame.
/// The timestamp is always written as ISO-8601 UTC with microsecond
/// fractional seconds and a `Z` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PositionSample {
    /// Instant the position is valid for.
    #[serde(with = "iso_utc")]
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    /// Earth-fixed position `[x, y, z]` in kilometres.
    #[ts(type = "[number, number, number]")]
    pub position: [f64; 3],
}

impl PositionSample {
    /// Create a sample from a timestamp and an `[x, y, z]` position in km.
    pub const fn new(timestamp: DateTime<Utc>, position: [f64; 3]) -> Self {
        Self {
            timestamp,
            position,
        }
    }

    /// Distance from the Earth's centre in kilometres.
    pub fn radius_km(&self) -> f64 {
        let [x, y, z] = self.position;
        z.mul_add(z, x.mul_add(x, y * y)).sqrt()
    }

    /// Whether every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
    }
}

/// Serde adapter writing `DateTime<Utc>` as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
mod iso_utc {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Format a timestamp exactly as it appears on the wire.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
