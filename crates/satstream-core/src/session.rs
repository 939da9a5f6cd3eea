//! Per-client streaming session.
//!
//! A [`BroadcastSession`] moves through three states:
//!
//! ```text
//! Connecting --register()--> Streaming --(send failure | cancel | propagation)--> Closed
//!      \--fail_handshake()------------------------------------------------------^
//! ```
//!
//! `Closed` is terminal. While `Streaming`, the session repeatedly runs a
//! window: capture `t_now`, then for every scheduled offset propagate the
//! orbit, rotate into the Earth-fixed frame at `t_now + offset`, hand the
//! sample to the registry, and wait one pacing interval. After the last
//! offset a new window starts from a freshly captured `t_now`.
//!
//! A sample whose propagation fails is skipped; the pacing wait still
//! happens so cadence is unaffected. A window in which every sample fails
//! closes the session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use satstream_orbit::{EarthFrame, KeplerPropagator, OrbitalElements, PropagationError};
use satstream_types::{PositionSample, SessionId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, DeliveryMode, SatstreamConfig, WindowMode};
use crate::registry::{ConnectionRegistry, ConnectionSendError, SessionHandle};
use crate::window::{SampleSchedule, Window};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake in progress; not yet registered.
    Connecting,
    /// Registered and producing samples.
    Streaming,
    /// Terminal. Deregistered and no longer producing samples.
    Closed,
}

/// Why a session reached [`SessionState::Closed`].
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// The connection never completed its handshake or registration.
    HandshakeFailed,
    /// The peer disconnected or the process is shutting down.
    Cancelled,
    /// Handing a sample to this session's connection failed.
    SendFailed(ConnectionSendError),
    /// Another session's broadcast found this connection dead and removed it.
    Evicted,
    /// Every sample of a window failed to propagate.
    PropagationFailed(PropagationError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandshakeFailed => f.write_str("handshake failed"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::SendFailed(e) => write!(f, "send failed: {e}"),
            Self::Evicted => f.write_str("evicted by broadcast"),
            Self::PropagationFailed(e) => write!(f, "propagation failed: {e}"),
        }
    }
}

/// Everything a session needs to turn a window offset into a sample.
///
/// Shared read-only across all sessions.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    /// Orbit being streamed.
    pub elements: OrbitalElements,
    /// Two-body propagator.
    pub propagator: KeplerPropagator,
    /// ECI to ECEF transformer.
    pub frame: EarthFrame,
    /// Offsets sampled per window.
    pub schedule: SampleSchedule,
    /// Real-time wait after each sample.
    pub pacing: Duration,
    /// Which connections receive the samples.
    pub delivery: DeliveryMode,
    /// Whether propagation time restarts each window.
    pub window_mode: WindowMode,
}

impl StreamPlan {
    /// Build a plan from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the orbit or stream section is invalid.
    pub fn from_config(config: &SatstreamConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            elements: config.orbit.to_elements()?,
            propagator: KeplerPropagator::new(config.propagation.solver()),
            frame: EarthFrame::new(config.earth_orientation),
            schedule: config.stream.schedule()?,
            pacing: config.stream.pacing_interval(),
            delivery: config.stream.delivery,
            window_mode: config.stream.window_mode,
        })
    }

    /// Open a window starting at `now` for a session that began at `session_start`.
    pub fn open_window(&self, now: DateTime<Utc>, session_start: DateTime<Utc>) -> Window {
        match self.window_mode {
            WindowMode::Restart => Window::restart(now),
            WindowMode::Continuous => Window::continuing(now, session_start),
        }
    }

    /// Produce the Earth-fixed sample for `offset_seconds` in `window`.
    ///
    /// # Errors
    ///
    /// Returns [`PropagationError`] if Kepler's equation does not converge.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample(
        &self,
        window: &Window,
        offset_seconds: u64,
    ) -> Result<PositionSample, PropagationError> {
        let dt = window.elapsed_seconds(offset_seconds) as f64;
        let state = self.propagator.propagate(&self.elements, dt)?;
        let instant = window.instant_at(offset_seconds);
        let ecef = self.frame.to_earth_fixed_or_now(&state.position_km, instant);
        let timestamp = instant.unwrap_or_else(Utc::now);
        Ok(PositionSample::new(timestamp, [ecef.x, ecef.y, ecef.z]))
    }

    /// Sample for the current instant at zero offset.
    ///
    /// # Errors
    ///
    /// Returns [`PropagationError`] if Kepler's equation does not converge.
    pub fn sample_now(&self) -> Result<PositionSample, PropagationError> {
        let now = Utc::now();
        self.sample(&Window::restart(now), 0)
    }
}

/// One client's streaming loop and lifecycle.
#[derive(Debug)]
pub struct BroadcastSession {
    id: SessionId,
    state: SessionState,
    registry: Arc<ConnectionRegistry>,
    plan: Arc<StreamPlan>,
}

impl BroadcastSession {
    /// A new session in [`SessionState::Connecting`].
    pub const fn new(
        id: SessionId,
        registry: Arc<ConnectionRegistry>,
        plan: Arc<StreamPlan>,
    ) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            registry,
            plan,
        }
    }

    /// This session's identity.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Complete the handshake by registering `handle`.
    ///
    /// Moves `Connecting -> Streaming` and returns `true`. If the session is
    /// not connecting, or the identity is already registered, moves to
    /// `Closed` and returns `false`.
    pub async fn register(&mut self, handle: SessionHandle) -> bool {
        if self.state != SessionState::Connecting || handle.id() != self.id {
            self.state = SessionState::Closed;
            return false;
        }
        if self.registry.add(handle).await {
            self.state = SessionState::Streaming;
            true
        } else {
            warn!(session_id = %self.id, "Session identity already registered");
            self.state = SessionState::Closed;
            false
        }
    }

    /// Record a failed handshake: `Connecting -> Closed` without registering.
    pub const fn fail_handshake(&mut self) -> CloseReason {
        self.state = SessionState::Closed;
        CloseReason::HandshakeFailed
    }

    /// Stream windows until the connection fails or `cancel` fires.
    ///
    /// Always returns with the session deregistered.
    pub async fn run(mut self, cancel: CancellationToken) -> CloseReason {
        if self.state != SessionState::Streaming {
            self.state = SessionState::Closed;
            return CloseReason::HandshakeFailed;
        }

        let session_start = Utc::now();
        info!(
            session_id = %self.id,
            samples_per_window = self.plan.schedule.len(),
            pacing_ms = u64::try_from(self.plan.pacing.as_millis()).unwrap_or(u64::MAX),
            "Session streaming"
        );

        let reason = loop {
            if let Err(reason) = self.run_window(session_start, &cancel).await {
                break reason;
            }
        };

        self.close(reason).await
    }

    /// Run one window. `Ok(())` means the window completed and another
    /// should start.
    async fn run_window(
        &self,
        session_start: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), CloseReason> {
        let window = self.plan.open_window(Utc::now(), session_start);
        debug!(
            session_id = %self.id,
            t_now = %window.started_at,
            base_seconds = window.base_seconds,
            "Window started"
        );

        let mut delivered_any = false;
        let mut last_error = None;

        for offset in self.plan.schedule.offsets() {
            match self.plan.sample(&window, offset) {
                Ok(sample) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(CloseReason::Cancelled),
                        result = self.deliver(sample) => result?,
                    }
                    delivered_any = true;
                }
                Err(e) => {
                    warn!(session_id = %self.id, offset_s = offset, error = %e, "Skipping sample");
                    last_error = Some(e);
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(CloseReason::Cancelled),
                () = tokio::time::sleep(self.plan.pacing) => {}
            }
        }

        match last_error {
            Some(e) if !delivered_any => Err(CloseReason::PropagationFailed(e)),
            _ => Ok(()),
        }
    }

    async fn deliver(&self, sample: PositionSample) -> Result<(), CloseReason> {
        match self.plan.delivery {
            DeliveryMode::Session => self
                .registry
                .send_to(self.id, sample)
                .await
                .map_err(|e| match e {
                    ConnectionSendError::NotRegistered => CloseReason::Evicted,
                    other => CloseReason::SendFailed(other),
                }),
            DeliveryMode::Broadcast => {
                self.registry.broadcast(sample).await;
                if self.registry.contains(self.id).await {
                    Ok(())
                } else {
                    Err(CloseReason::Evicted)
                }
            }
        }
    }

    async fn close(&mut self, reason: CloseReason) -> CloseReason {
        self.registry.remove(self.id).await;
        self.state = SessionState::Closed;
        info!(session_id = %self.id, reason = %reason, "Session closed");
        reason
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use nalgebra::Vector3;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;
    use crate::config::{OrbitConfig, PropagationConfig};

    const SEND_TIMEOUT: Duration = Duration::from_millis(200);

    fn plan_with(config: &SatstreamConfig) -> Arc<StreamPlan> {
        Arc::new(StreamPlan::from_config(config).unwrap())
    }

    fn reference_plan() -> Arc<StreamPlan> {
        plan_with(&SatstreamConfig::default())
    }

    async fn streaming_session(
        registry: &Arc<ConnectionRegistry>,
        plan: &Arc<StreamPlan>,
        capacity: usize,
    ) -> (BroadcastSession, mpsc::Receiver<PositionSample>) {
        let id = SessionId::new();
        let (handle, rx) = SessionHandle::channel(id, capacity);
        let mut session = BroadcastSession::new(id, Arc::clone(registry), Arc::clone(plan));
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.register(handle).await);
        assert_eq!(session.state(), SessionState::Streaming);
        (session, rx)
    }

    /// Undo the Earth rotation to recover the inertial position of a sample.
    fn inertial(plan: &StreamPlan, sample: &PositionSample) -> Vector3<f64> {
        let [x, y, z] = sample.position;
        plan.frame.rotation_at(&sample.timestamp).inverse() * Vector3::new(x, y, z)
    }

    #[tokio::test(start_paused = true)]
    async fn first_window_streams_sixty_samples_then_restarts() {
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let plan = reference_plan();
        let (session, mut rx) = streaming_session(&registry, &plan, 128).await;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(session.run(cancel.clone()));

        let mut samples = Vec::new();
        let mut first_arrival = None;
        let mut sixtieth_arrival = None;
        for i in 0..61 {
            samples.push(rx.recv().await.unwrap());
            if i == 0 {
                first_arrival = Some(Instant::now());
            }
            if i == 59 {
                sixtieth_arrival = Some(Instant::now());
            }
        }

        // Receiver sees one sample per pacing interval.
        let span = sixtieth_arrival.unwrap() - first_arrival.unwrap();
        assert!(span >= Duration::from_secs(59), "span {span:?}");
        assert!(span < Duration::from_millis(59_500), "span {span:?}");

        // Propagation offsets are 10 s apart within the window.
        for pair in samples[..60].windows(2) {
            let step = pair[1].timestamp - pair[0].timestamp;
            assert_eq!(step.num_seconds(), 10);
        }

        // The 61st sample starts a new window: timestamp resets near the
        // fresh wall-clock capture and propagation offset is back to zero.
        let restarted = &samples[60];
        assert!(restarted.timestamp < samples[59].timestamp);
        assert!(restarted.timestamp >= samples[0].timestamp);
        let drift = (inertial(&plan, restarted) - inertial(&plan, &samples[0])).norm();
        assert!(drift < 1e-6, "inertial drift {drift} km");

        // Offset-zero sample of the reference orbit sits at perigee.
        assert!((samples[0].radius_km() - 6930.0).abs() < 1.0);

        cancel.cancel();
        assert_eq!(task.await.unwrap(), CloseReason::Cancelled);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_connection_ends_only_its_session() {
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let plan = reference_plan();
        let (doomed, doomed_rx) = streaming_session(&registry, &plan, 8).await;
        let (healthy, mut healthy_rx) = streaming_session(&registry, &plan, 8).await;
        let healthy_id = healthy.id();
        drop(doomed_rx);

        let cancel = CancellationToken::new();
        let doomed_task = tokio::spawn(doomed.run(cancel.child_token()));
        let healthy_task = tokio::spawn(healthy.run(cancel.child_token()));

        assert_eq!(
            doomed_task.await.unwrap(),
            CloseReason::SendFailed(ConnectionSendError::Closed)
        );
        for _ in 0..3 {
            assert!(healthy_rx.recv().await.is_some());
        }
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(healthy_id).await);

        cancel.cancel();
        assert_eq!(healthy_task.await.unwrap(), CloseReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_peer_is_dropped_after_send_timeout() {
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let plan = reference_plan();
        let (session, _rx) = streaming_session(&registry, &plan, 1).await;

        let reason = session.run(CancellationToken::new()).await;
        assert_eq!(
            reason,
            CloseReason::SendFailed(ConnectionSendError::TimedOut(SEND_TIMEOUT))
        );
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_samples_are_skipped_without_breaking_cadence() {
        // A tight iteration cap on an eccentric orbit fails most offsets
        // but not all of them.
        let config = SatstreamConfig {
            orbit: OrbitConfig {
                eccentricity: 0.6,
                ..OrbitConfig::default()
            },
            propagation: PropagationConfig {
                tolerance: 1e-10,
                max_iterations: 3,
            },
            ..SatstreamConfig::default()
        };
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let plan = plan_with(&config);
        let (session, mut rx) = streaming_session(&registry, &plan, 128).await;
        let id = session.id();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(session.run(cancel.clone()));

        let first = rx.recv().await.unwrap();
        let window_start = Instant::now();
        let mut first_window = vec![first];
        let next_window_arrival = loop {
            let sample = rx.recv().await.unwrap();
            let elapsed = window_start.elapsed();
            if elapsed >= Duration::from_millis(59_500) {
                break elapsed;
            }
            first_window.push(sample);
        };

        assert!(first_window.len() < 60, "got {} samples", first_window.len());
        assert!(first_window.iter().all(PositionSample::is_finite));
        // Skipped samples still consume their pacing interval.
        assert!(next_window_arrival >= Duration::from_secs(60), "{next_window_arrival:?}");
        assert!(next_window_arrival < Duration::from_millis(60_500), "{next_window_arrival:?}");

        assert!(!task.is_finished());
        assert!(registry.contains(id).await);

        cancel.cancel();
        assert_eq!(task.await.unwrap(), CloseReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn window_of_failed_propagations_closes_session() {
        let config = SatstreamConfig {
            propagation: PropagationConfig {
                tolerance: 1e-10,
                max_iterations: 0,
            },
            ..SatstreamConfig::default()
        };
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let plan = plan_with(&config);
        let (session, mut rx) = streaming_session(&registry, &plan, 8).await;

        let started = Instant::now();
        let reason = session.run(CancellationToken::new()).await;

        assert!(matches!(reason, CloseReason::PropagationFailed(_)));
        // Failed samples are skipped but still paced through the whole window.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(60_500), "elapsed {elapsed:?}");
        assert!(rx.try_recv().is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_mode_fans_out_and_evicts_dead_peers() {
        let config = SatstreamConfig {
            stream: crate::config::StreamConfig {
                delivery: DeliveryMode::Broadcast,
                ..crate::config::StreamConfig::default()
            },
            ..SatstreamConfig::default()
        };
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let plan = plan_with(&config);
        let (a, mut rx_a) = streaming_session(&registry, &plan, 64).await;
        let (b, rx_b) = streaming_session(&registry, &plan, 64).await;
        let b_id = b.id();

        let cancel = CancellationToken::new();
        let task_a = tokio::spawn(a.run(cancel.child_token()));
        let task_b = tokio::spawn(b.run(cancel.child_token()));

        // Within the first pacing interval `a` hears from both sessions.
        assert!(rx_a.recv().await.is_some());
        assert!(rx_a.recv().await.is_some());

        drop(rx_b);
        assert_eq!(task_b.await.unwrap(), CloseReason::Evicted);
        assert!(!registry.contains(b_id).await);

        assert!(rx_a.recv().await.is_some());
        cancel.cancel();
        assert_eq!(task_a.await.unwrap(), CloseReason::Cancelled);
        assert!(registry.is_empty().await);
    }

    #[test]
    fn continuous_mode_keeps_offsets_monotonic_across_windows() {
        let config = SatstreamConfig {
            stream: crate::config::StreamConfig {
                horizon_seconds: 30,
                sample_spacing_seconds: 10,
                window_mode: WindowMode::Continuous,
                ..crate::config::StreamConfig::default()
            },
            ..SatstreamConfig::default()
        };
        let plan = plan_with(&config);
        let start = Utc::now();
        let later = start + chrono::Duration::seconds(3);
        let first = plan.open_window(start, start);
        let second = plan.open_window(later, start);
        assert_eq!(first.elapsed_seconds(20), 20);
        assert_eq!(second.elapsed_seconds(0), 3);
    }

    #[tokio::test]
    async fn duplicate_identity_fails_registration() {
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let plan = reference_plan();
        let (existing, _rx) = streaming_session(&registry, &plan, 4).await;

        let (handle, _rx2) = SessionHandle::channel(existing.id(), 4);
        let mut clash = BroadcastSession::new(existing.id(), Arc::clone(&registry), plan);
        assert!(!clash.register(handle).await);
        assert_eq!(clash.state(), SessionState::Closed);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn failed_handshake_never_registers_or_streams() {
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let mut session =
            BroadcastSession::new(SessionId::new(), Arc::clone(&registry), reference_plan());
        assert_eq!(session.fail_handshake(), CloseReason::HandshakeFailed);
        assert_eq!(session.state(), SessionState::Closed);
        let reason = session.run(CancellationToken::new()).await;
        assert_eq!(reason, CloseReason::HandshakeFailed);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn closed_session_cannot_re_register() {
        let registry = Arc::new(ConnectionRegistry::new(SEND_TIMEOUT));
        let id = SessionId::new();
        let mut session = BroadcastSession::new(id, Arc::clone(&registry), reference_plan());
        session.fail_handshake();
        let (handle, _rx) = SessionHandle::channel(id, 4);
        assert!(!session.register(handle).await);
        assert!(registry.is_empty().await);
    }

    #[test]
    fn sample_now_is_finite_and_on_orbit() {
        let plan = reference_plan();
        let sample = plan.sample_now().unwrap();
        assert!(sample.is_finite());
        let r = sample.radius_km();
        assert!((6930.0 - 1e-6..=7070.0 + 1e-6).contains(&r));
    }
}
