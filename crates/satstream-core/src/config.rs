//! Configuration loading and typed config structures for Satstream.
//!
//! The canonical configuration lives in `satstream-config.yaml` next to the
//! binary's working directory. Every field has a default matching the
//! reference deployment (a 7000 km, e = 0.01, 45 degree orbit streamed as
//! 60 samples over a 600 s horizon, one message per second), so an empty
//! or missing file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use satstream_orbit::constants::MU_EARTH_KM3_S2;
use satstream_orbit::elements::Angles;
use satstream_orbit::{EarthOrientation, ElementsError, KeplerSolver, OrbitalElements};
use serde::Deserialize;

use crate::window::SampleSchedule;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configured orbit violates an element invariant.
    #[error("invalid orbit: {source}")]
    Orbit {
        /// The underlying element validation error.
        #[from]
        source: ElementsError,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Satstream configuration.
///
/// Mirrors the structure of `satstream-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SatstreamConfig {
    /// Listen address for the HTTP/WebSocket server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Orbital elements of the streamed satellite.
    #[serde(default)]
    pub orbit: OrbitConfig,

    /// Kepler solver settings.
    #[serde(default)]
    pub propagation: PropagationConfig,

    /// Earth-orientation parameters for the ECI to ECEF rotation.
    #[serde(default)]
    pub earth_orientation: EarthOrientation,

    /// Window shape, pacing and delivery.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Process shutdown behaviour.
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SatstreamConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SATSTREAM_HOST` overrides `server.host`
    /// - `SATSTREAM_PORT` overrides `server.port`
    /// - `SATSTREAM_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or a
    /// validation error if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults. Environment overrides are
    /// not applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override fields with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SATSTREAM_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("SATSTREAM_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "Ignoring invalid SATSTREAM_PORT"),
            }
        }
        if let Ok(val) = std::env::var("SATSTREAM_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Check cross-field invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::Orbit`] for the
    /// first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()?;
        self.propagation.validate()?;
        self.orbit.to_elements()?;
        Ok(())
    }
}

/// HTTP/WebSocket listen address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Classical orbital elements as written in the config file (degrees).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrbitConfig {
    /// Semi-major axis in km.
    #[serde(default = "default_semi_major_axis_km")]
    pub semi_major_axis_km: f64,

    /// Eccentricity, `[0, 1)`.
    #[serde(default = "default_eccentricity")]
    pub eccentricity: f64,

    /// Inclination in degrees.
    #[serde(default = "default_inclination_deg")]
    pub inclination_deg: f64,

    /// Right ascension of the ascending node in degrees.
    #[serde(default = "default_raan_deg")]
    pub raan_deg: f64,

    /// Argument of perigee in degrees.
    #[serde(default)]
    pub arg_perigee_deg: f64,

    /// True anomaly at epoch in degrees.
    #[serde(default)]
    pub true_anomaly_deg: f64,

    /// Reference epoch, RFC 3339.
    #[serde(default = "default_epoch")]
    pub epoch: String,

    /// Central-body gravitational parameter in km^3/s^2.
    #[serde(default = "default_mu")]
    pub mu_km3_s2: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            semi_major_axis_km: default_semi_major_axis_km(),
            eccentricity: default_eccentricity(),
            inclination_deg: default_inclination_deg(),
            raan_deg: default_raan_deg(),
            arg_perigee_deg: 0.0,
            true_anomaly_deg: 0.0,
            epoch: default_epoch(),
            mu_km3_s2: default_mu(),
        }
    }
}

impl OrbitConfig {
    /// Build validated [`OrbitalElements`] from this section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unparseable epoch or
    /// [`ConfigError::Orbit`] if an element invariant is violated.
    pub fn to_elements(&self) -> Result<OrbitalElements, ConfigError> {
        let epoch = DateTime::parse_from_rfc3339(&self.epoch)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ConfigError::Invalid {
                reason: format!("orbit.epoch `{}` is not RFC 3339: {e}", self.epoch),
            })?;
        let angles = Angles::from_degrees(
            self.inclination_deg,
            self.raan_deg,
            self.arg_perigee_deg,
            self.true_anomaly_deg,
        );
        Ok(OrbitalElements::with_mu(
            self.semi_major_axis_km,
            self.eccentricity,
            angles,
            epoch,
            self.mu_km3_s2,
        )?)
    }
}

/// Newton solver settings for Kepler's equation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PropagationConfig {
    /// Convergence tolerance on successive eccentric-anomaly iterates (rad).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Iteration cap before a sample is reported as failed.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl PropagationConfig {
    /// Solver built from these settings.
    pub const fn solver(&self) -> KeplerSolver {
        KeplerSolver {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Invalid {
                reason: format!("propagation.tolerance must be > 0, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}

/// How a session's samples reach clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Each session's samples go only to its own connection.
    #[default]
    Session,
    /// Each session's samples are broadcast to every registered connection.
    Broadcast,
}

/// How propagation time relates across successive windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Every window restarts offsets at 0 from a freshly captured instant.
    #[default]
    Restart,
    /// Offsets are shifted by elapsed session time, so propagation is
    /// continuous across windows.
    Continuous,
}

/// Window shape, pacing and delivery parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// Propagation horizon covered by one window, in seconds.
    #[serde(default = "default_horizon_seconds")]
    pub horizon_seconds: u64,

    /// Propagation offset between consecutive samples, in seconds.
    #[serde(default = "default_sample_spacing_seconds")]
    pub sample_spacing_seconds: u64,

    /// Real-time wait between consecutive samples, in milliseconds.
    #[serde(default = "default_pacing_interval_ms")]
    pub pacing_interval_ms: u64,

    /// Deadline for handing one sample to a connection, in milliseconds.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Per-connection outbound queue depth.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Which connections receive a session's samples.
    #[serde(default)]
    pub delivery: DeliveryMode,

    /// Whether windows restart or continue propagation time.
    #[serde(default)]
    pub window_mode: WindowMode,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            horizon_seconds: default_horizon_seconds(),
            sample_spacing_seconds: default_sample_spacing_seconds(),
            pacing_interval_ms: default_pacing_interval_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            delivery: DeliveryMode::default(),
            window_mode: WindowMode::default(),
        }
    }
}

impl StreamConfig {
    /// Offsets sampled in every window.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero horizon or spacing.
    pub fn schedule(&self) -> Result<SampleSchedule, ConfigError> {
        SampleSchedule::new(self.horizon_seconds, self.sample_spacing_seconds).ok_or_else(|| {
            ConfigError::Invalid {
                reason: format!(
                    "stream.horizon_seconds ({}) and stream.sample_spacing_seconds ({}) must both be > 0",
                    self.horizon_seconds, self.sample_spacing_seconds
                ),
            }
        })
    }

    /// Wait between consecutive samples.
    pub const fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    /// Per-send deadline.
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.schedule()?;
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "stream.channel_capacity must be at least 1".to_owned(),
            });
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "stream.send_timeout_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Process shutdown configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for active sessions to close, in milliseconds.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl ShutdownConfig {
    /// Drain deadline as a [`Duration`].
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8000
}

const fn default_semi_major_axis_km() -> f64 {
    7000.0
}

const fn default_eccentricity() -> f64 {
    0.01
}

const fn default_inclination_deg() -> f64 {
    45.0
}

const fn default_raan_deg() -> f64 {
    80.0
}

fn default_epoch() -> String {
    "2000-01-01T12:00:00Z".to_owned()
}

const fn default_mu() -> f64 {
    MU_EARTH_KM3_S2
}

const fn default_tolerance() -> f64 {
    satstream_orbit::kepler::DEFAULT_TOLERANCE
}

const fn default_max_iterations() -> u32 {
    satstream_orbit::kepler::DEFAULT_MAX_ITERATIONS
}

const fn default_horizon_seconds() -> u64 {
    600
}

const fn default_sample_spacing_seconds() -> u64 {
    10
}

const fn default_pacing_interval_ms() -> u64 {
    1000
}

const fn default_send_timeout_ms() -> u64 {
    5000
}

const fn default_channel_capacity() -> usize {
    64
}

const fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_reference_deployment() {
        let config = SatstreamConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.stream.horizon_seconds, 600);
        assert_eq!(config.stream.sample_spacing_seconds, 10);
        assert_eq!(config.stream.pacing_interval(), Duration::from_secs(1));
        assert_eq!(config.stream.schedule().unwrap().len(), 60);
        assert_eq!(config.stream.delivery, DeliveryMode::Session);
        assert_eq!(config.stream.window_mode, WindowMode::Restart);
        assert!(config.validate().is_ok());

        let elements = config.orbit.to_elements().unwrap();
        assert!((elements.semi_major_axis_km() - 7000.0).abs() < 1e-12);
        assert!((elements.eccentricity() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9100

orbit:
  semi_major_axis_km: 26560
  eccentricity: 0.7
  inclination_deg: 63.4
  raan_deg: 120
  arg_perigee_deg: 270
  true_anomaly_deg: 15
  epoch: "2024-03-01T00:00:00Z"

propagation:
  tolerance: 1.0e-12
  max_iterations: 80

earth_orientation:
  ut1_minus_utc_seconds: -0.1
  polar_motion_x_arcsec: 0.2
  polar_motion_y_arcsec: 0.3

stream:
  horizon_seconds: 120
  sample_spacing_seconds: 30
  pacing_interval_ms: 250
  send_timeout_ms: 1000
  channel_capacity: 8
  delivery: broadcast
  window_mode: continuous

shutdown:
  drain_timeout_ms: 2000

logging:
  level: "debug"
  json: true
"#;

        let config = SatstreamConfig::parse(yaml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9100);
        assert!((config.orbit.eccentricity - 0.7).abs() < 1e-12);
        assert_eq!(config.propagation.max_iterations, 80);
        assert!((config.earth_orientation.polar_motion_y_arcsec - 0.3).abs() < 1e-12);
        assert_eq!(config.stream.schedule().unwrap().len(), 4);
        assert_eq!(config.stream.delivery, DeliveryMode::Broadcast);
        assert_eq!(config.stream.window_mode, WindowMode::Continuous);
        assert_eq!(config.shutdown.drain_timeout(), Duration::from_secs(2));
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SatstreamConfig::parse("stream:\n  pacing_interval_ms: 10\n").unwrap();
        assert_eq!(config.stream.pacing_interval_ms, 10);
        // Everything else uses defaults
        assert_eq!(config.stream.horizon_seconds, 600);
        assert_eq!(config.orbit, OrbitConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SatstreamConfig::parse("").unwrap();
        assert_eq!(config, SatstreamConfig::default());
    }

    #[test]
    fn rejects_unknown_delivery_mode() {
        assert!(SatstreamConfig::parse("stream:\n  delivery: carrier_pigeon\n").is_err());
    }

    #[test]
    fn validate_rejects_zero_spacing() {
        let config = SatstreamConfig::parse("stream:\n  sample_spacing_seconds: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let config = SatstreamConfig::parse("stream:\n  channel_capacity: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn validate_rejects_hyperbolic_orbit() {
        let config = SatstreamConfig::parse("orbit:\n  eccentricity: 1.2\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Orbit { .. })));
    }

    #[test]
    fn validate_rejects_bad_epoch() {
        let config = SatstreamConfig::parse("orbit:\n  epoch: \"J2000\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("satstream-config.yaml");
        if path.exists() {
            let config = SatstreamConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
