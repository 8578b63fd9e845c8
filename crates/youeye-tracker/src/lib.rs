//! youeye-tracker — Eye position tracking orchestrator.
//!
//! Receives face anchors and camera state changes from an external
//! face-tracking session, resolves the configured eye position through a
//! spatial model, and broadcasts it to weakly held subscribers.

pub mod config;
pub mod error;
pub mod session;
pub mod subscription;
pub mod tracker;

pub use config::{RecoveryPolicy, TrackerConfig, TrackerSettings};
pub use error::{ConfigError, SessionError, TrackerError};
pub use session::{
    first_face, Anchor, CameraTrackingState, LimitedReason, SessionEvent, SessionEvents,
    TrackingBackend, TrackingSession, UnsupportedBackend,
};
pub use subscription::{SubscriptionManager, DEFAULT_COMPACTION_INTERVAL};
pub use tracker::{
    init_shared, pump_events, shared, EyePositionSubscriber, EyeTracker, StartOutcome,
};
pub use youeye_core::PointOfView;
