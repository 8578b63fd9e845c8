//! Eye tracking orchestrator.
//!
//! [`EyeTracker`] glues an external tracking session to the spatial model
//! and fans results out to subscribers. Every tracking-domain condition
//! (missing hardware, lost camera, session failure) surfaces as a broadcast
//! or a [`StartOutcome`], never as an error.
//!
//! A tracker owned by one task is driven with [`EyeTracker::next_event`].
//! A tracker shared behind a lock, such as [`shared`], is driven with
//! [`pump_events`], which only takes the lock to dispatch.

use crate::config::{RecoveryPolicy, TrackerConfig, TrackerSettings};
use crate::error::{SessionError, TrackerError};
use crate::session::{
    first_face, Anchor, CameraTrackingState, SessionEvent, SessionEvents, TrackingBackend,
    TrackingSession, UnsupportedBackend,
};
use crate::subscription::SubscriptionManager;
use glam::Vec3;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use youeye_core::{EyeModel, FaceAnchor, FaceNode};

/// Receiver of eye tracking callbacks.
pub trait EyePositionSubscriber: Send + Sync {
    /// The tracked eye moved to `(x, y, z)` in session space.
    fn position_moved(&self, x: f32, y: f32, z: f32);

    /// Tracking stopped or was interrupted.
    fn tracking_interrupted(&self);
}

/// Result of [`EyeTracker::start`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh session is running and delivering events.
    Started,
    /// The host cannot face-track; nothing was changed.
    Unsupported,
}

type EventReceiver = Arc<AsyncMutex<mpsc::UnboundedReceiver<SessionEvent>>>;

struct AttachedSession {
    session: Box<dyn TrackingSession>,
    events: EventReceiver,
    detached: CancellationToken,
}

/// Receiving side of the attached session, usable without the tracker.
#[derive(Clone)]
struct EventStream {
    events: EventReceiver,
    detached: CancellationToken,
}

pub struct EyeTracker {
    backend: Box<dyn TrackingBackend>,
    attached: Option<AttachedSession>,
    model: Box<dyn EyeModel>,
    config: TrackerConfig,
    tracked_position: Option<Vec3>,
    subscriptions: SubscriptionManager<dyn EyePositionSubscriber>,
    recovery: RecoveryPolicy,
    consecutive_restarts: u32,
}

impl EyeTracker {
    /// Independent tracker over `backend` with default settings.
    pub fn new(backend: impl TrackingBackend + 'static) -> Self {
        Self::with_settings(backend, TrackerSettings::default())
    }

    pub fn with_settings(backend: impl TrackingBackend + 'static, settings: TrackerSettings) -> Self {
        Self::with_model(backend, FaceNode::new(), settings)
    }

    /// Tracker with a caller-supplied spatial model.
    pub fn with_model(
        backend: impl TrackingBackend + 'static,
        model: impl EyeModel + 'static,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            backend: Box::new(backend),
            attached: None,
            model: Box::new(model),
            config: TrackerConfig::default(),
            tracked_position: None,
            subscriptions: SubscriptionManager::with_interval(settings.compaction_interval),
            recovery: settings.recovery,
            consecutive_restarts: 0,
        }
    }

    /// Replace the configuration. The visualization flag is forwarded to the
    /// model immediately.
    pub fn configure(&mut self, config: TrackerConfig) {
        tracing::info!(
            pov = ?config.point_of_view,
            visualization = config.show_tracking_visualization,
            "tracker configured"
        );
        self.config = config;
        self.set_marker_visible(config.show_tracking_visualization);
    }

    pub fn config(&self) -> TrackerConfig {
        self.config
    }

    /// Load a TOML configuration file and apply it with [`configure`].
    ///
    /// [`configure`]: EyeTracker::configure
    pub fn configure_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), TrackerError> {
        let config = TrackerConfig::from_file(path)?;
        self.configure(config);
        Ok(())
    }

    /// Start tracking with a fresh session, discarding any running one.
    pub fn start(&mut self) -> StartOutcome {
        self.consecutive_restarts = 0;
        self.reset_session()
    }

    /// Detach from the session and broadcast an interruption.
    ///
    /// Safe to call repeatedly and before `start`; every call broadcasts.
    pub fn stop(&mut self) {
        if self.detach() {
            tracing::info!("tracking stopped");
        }
        self.broadcast_interruption();
    }

    /// Register a subscriber without taking ownership of it.
    pub fn subscribe<S>(&self, subscriber: &Arc<S>)
    where
        S: EyePositionSubscriber + 'static,
    {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        self.subscriptions.subscribe(weak);
    }

    /// Live subscribers currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.live_count()
    }

    pub fn is_running(&self) -> bool {
        self.attached.is_some()
    }

    pub fn tracked_position(&self) -> Option<Vec3> {
        self.tracked_position
    }

    /// Spatial model, e.g. for projection positions or marker inspection.
    pub fn model(&self) -> &dyn EyeModel {
        self.model.as_ref()
    }

    pub fn set_marker_visible(&mut self, visible: bool) {
        self.model.set_marker_visible(visible);
    }

    /// Dispatch one session event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AnchorsUpdated(anchors) => self.update_from_anchors(&anchors),
            SessionEvent::CameraTrackingStateChanged(state) => {
                self.camera_tracking_state_changed(state)
            }
            SessionEvent::Failed(error) => self.session_failed(error),
        }
    }

    /// Handle every event already queued by the attached session.
    ///
    /// Returns how many were handled. Events queued by a session that was
    /// replaced mid-drain are discarded with it.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.attached.as_ref() {
                Some(attached) => match attached.events.try_lock() {
                    Ok(mut rx) => match rx.try_recv() {
                        Ok(event) => event,
                        Err(_) => break,
                    },
                    // A pump is waiting on this session and will handle it.
                    Err(_) => break,
                },
                None => break,
            };
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next event from the attached session.
    ///
    /// Returns `None` when detached or once the session has dropped every
    /// sender.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let events = self.attached.as_ref()?.events.clone();
        let mut rx = events.lock().await;
        let event = rx.recv().await;
        event
    }

    fn event_stream(&self) -> Option<EventStream> {
        self.attached.as_ref().map(|attached| EventStream {
            events: attached.events.clone(),
            detached: attached.detached.clone(),
        })
    }

    fn is_attached_to(&self, stream: &EventStream) -> bool {
        self.attached
            .as_ref()
            .is_some_and(|attached| Arc::ptr_eq(&attached.events, &stream.events))
    }

    /// Apply the first face anchor of a frame.
    pub fn update_from_anchors(&mut self, anchors: &[Anchor]) {
        self.update_from_anchor(first_face(anchors));
    }

    /// Apply one face anchor. `None` keeps the last position and broadcasts
    /// nothing.
    pub fn update_from_anchor(&mut self, anchor: Option<&FaceAnchor>) {
        let Some(anchor) = anchor else {
            return;
        };
        self.model.update(
            anchor.transform,
            anchor.left_eye_transform,
            anchor.right_eye_transform,
        );
        self.consecutive_restarts = 0;
        let position = self.model.eye_position(self.config.point_of_view);
        tracing::debug!(x = position.x, y = position.y, z = position.z, "eye position updated");
        self.set_tracked_position(position);
    }

    /// Only `NotAvailable` is acted on; recovery is signalled by the next
    /// anchor update.
    pub fn camera_tracking_state_changed(&mut self, state: CameraTrackingState) {
        match state {
            CameraTrackingState::NotAvailable => {
                tracing::info!("camera tracking unavailable");
                self.broadcast_interruption();
            }
            CameraTrackingState::Limited(reason) => {
                tracing::debug!(?reason, "camera tracking limited");
            }
            CameraTrackingState::Normal => {}
        }
    }

    /// Broadcast an interruption, then restart the session as allowed by
    /// the recovery policy.
    pub fn session_failed(&mut self, error: SessionError) {
        self.broadcast_interruption();

        self.consecutive_restarts = self.consecutive_restarts.saturating_add(1);
        let attempt = self.consecutive_restarts;
        if !self.recovery.allows_restart(attempt) {
            tracing::error!(
                %error,
                attempt,
                max = ?self.recovery.max_consecutive_restarts,
                "session restart limit reached; tracking detached"
            );
            self.detach();
            return;
        }

        tracing::warn!(%error, attempt, "tracking session failed; restarting");
        let _ = self.reset_session();
    }

    fn reset_session(&mut self) -> StartOutcome {
        if !self.backend.is_supported() {
            tracing::warn!("face tracking is not supported on this device");
            return StartOutcome::Unsupported;
        }

        self.detach();
        let (events, rx) = SessionEvents::channel();
        let session = self.backend.open_session(events);
        self.attached = Some(AttachedSession {
            session,
            events: Arc::new(AsyncMutex::new(rx)),
            detached: CancellationToken::new(),
        });
        tracing::info!("tracking session started");
        StartOutcome::Started
    }

    /// Pause and drop the current session. Returns whether one was attached.
    fn detach(&mut self) -> bool {
        match self.attached.take() {
            Some(mut attached) => {
                attached.detached.cancel();
                attached.session.pause();
                true
            }
            None => false,
        }
    }

    /// Every assignment broadcasts, even when the value is unchanged.
    /// Interruptions leave the last position in place.
    fn set_tracked_position(&mut self, position: Vec3) {
        self.tracked_position = Some(position);
        self.subscriptions
            .broadcast(|s| s.position_moved(position.x, position.y, position.z));
    }

    fn broadcast_interruption(&self) {
        self.subscriptions.broadcast(|s| s.tracking_interrupted());
    }
}

/// Drive a tracker shared behind a lock until it detaches or its session
/// stops sending. Returns the number of events handled.
///
/// The lock is taken only to look up the attached session and to dispatch
/// each event, so `stop`, `configure` and `subscribe` from other tasks never
/// wait on a frame. When the session is replaced, the pump follows the new
/// one and drops anything the old one still had queued.
pub async fn pump_events(tracker: &Mutex<EyeTracker>) -> usize {
    let mut handled = 0;
    loop {
        let Some(stream) = current_stream(tracker) else {
            break;
        };
        let event = tokio::select! {
            _ = stream.detached.cancelled() => continue,
            event = async { stream.events.lock().await.recv().await } => event,
        };
        let Some(event) = event else {
            break;
        };
        if dispatch(tracker, &stream, event) {
            handled += 1;
        }
    }
    tracing::debug!(handled, "event pump finished");
    handled
}

fn current_stream(tracker: &Mutex<EyeTracker>) -> Option<EventStream> {
    tracker.lock().event_stream()
}

fn dispatch(tracker: &Mutex<EyeTracker>, stream: &EventStream, event: SessionEvent) -> bool {
    let mut tracker = tracker.lock();
    if !tracker.is_attached_to(stream) {
        return false;
    }
    tracker.handle_event(event);
    true
}

static SHARED: OnceLock<Mutex<EyeTracker>> = OnceLock::new();

/// Process-wide tracker, built on first access.
///
/// Unless [`init_shared`] ran first, it uses [`UnsupportedBackend`] and
/// settings from the environment. Trackers built with [`EyeTracker::new`]
/// are always independent of this one.
pub fn shared() -> &'static Mutex<EyeTracker> {
    SHARED.get_or_init(|| {
        Mutex::new(EyeTracker::with_settings(
            UnsupportedBackend,
            TrackerSettings::from_env(),
        ))
    })
}

/// Build the process-wide tracker over `backend`.
///
/// Fails if the shared tracker already exists.
pub fn init_shared(
    backend: impl TrackingBackend + 'static,
) -> Result<&'static Mutex<EyeTracker>, TrackerError> {
    let mut pending = Some(backend);
    let tracker = SHARED.get_or_init(|| {
        let settings = TrackerSettings::from_env();
        let tracker = match pending.take() {
            Some(backend) => EyeTracker::with_settings(backend, settings),
            None => EyeTracker::with_settings(UnsupportedBackend, settings),
        };
        Mutex::new(tracker)
    });
    if pending.is_some() {
        return Err(TrackerError::SharedAlreadyInitialized);
    }
    Ok(tracker)
}
