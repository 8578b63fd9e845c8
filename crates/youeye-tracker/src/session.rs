//! Boundary with the external face-tracking session.
//!
//! A [`TrackingBackend`] opens sessions; each session reports back through
//! the [`SessionEvents`] handle it was opened with. The tracker owns the
//! receiving end, so detaching (dropping the receiver) silences a stale
//! session: its sends start returning `false`.

use crate::error::SessionError;
use tokio::sync::mpsc;
use youeye_core::FaceAnchor;

/// Something a tracking frame reported.
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    Face(FaceAnchor),
    /// Any non-face anchor (planes, images, ...). Ignored by the tracker.
    Other { kind: String },
}

impl Anchor {
    pub fn as_face(&self) -> Option<&FaceAnchor> {
        match self {
            Anchor::Face(face) => Some(face),
            Anchor::Other { .. } => None,
        }
    }
}

/// First face anchor in a frame, if any.
pub fn first_face(anchors: &[Anchor]) -> Option<&FaceAnchor> {
    anchors.iter().find_map(Anchor::as_face)
}

/// Why tracking quality is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedReason {
    Initializing,
    Relocalizing,
    ExcessiveMotion,
    InsufficientFeatures,
}

/// Camera tracking state as reported by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraTrackingState {
    NotAvailable,
    Limited(LimitedReason),
    Normal,
}

/// Notification delivered from a session to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AnchorsUpdated(Vec<Anchor>),
    CameraTrackingStateChanged(CameraTrackingState),
    Failed(SessionError),
}

/// Sending half handed to a session when it is opened.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. Returns `false` once the tracker has detached.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn anchors_updated(&self, anchors: Vec<Anchor>) -> bool {
        self.send(SessionEvent::AnchorsUpdated(anchors))
    }

    pub fn camera_tracking_state_changed(&self, state: CameraTrackingState) -> bool {
        self.send(SessionEvent::CameraTrackingStateChanged(state))
    }

    pub fn failed(&self, error: SessionError) -> bool {
        self.send(SessionEvent::Failed(error))
    }

    /// Whether the tracker is still listening.
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A running face-tracking session.
pub trait TrackingSession: Send {
    /// Stop producing frames. Called once when the tracker detaches.
    fn pause(&mut self);
}

/// Factory for face-tracking sessions on the host device.
pub trait TrackingBackend: Send {
    /// Whether face tracking works on this device at all.
    fn is_supported(&self) -> bool;

    /// Open and run a fresh session that reports through `events`.
    fn open_session(&mut self, events: SessionEvents) -> Box<dyn TrackingSession>;
}

/// Backend for hosts without face tracking.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

struct IdleSession;

impl TrackingSession for IdleSession {
    fn pause(&mut self) {}
}

impl TrackingBackend for UnsupportedBackend {
    fn is_supported(&self) -> bool {
        false
    }

    fn open_session(&mut self, _events: SessionEvents) -> Box<dyn TrackingSession> {
        Box::new(IdleSession)
    }
}
