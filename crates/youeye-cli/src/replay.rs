//! JSON-lines recording playback.
//!
//! Each non-empty line not starting with `#` is one event:
//!
//! ```text
//! {"event":"anchor","face":[16 floats],"left_eye":[16 floats],"right_eye":[16 floats]}
//! {"event":"no_face"}
//! {"event":"camera","state":"not_available"}
//! {"event":"camera","state":"limited","reason":"excessive_motion"}
//! {"event":"failed","message":"camera disconnected"}
//! ```
//!
//! Matrices are column-major. A session ends at its failure line; the
//! restarted session picks up after it rather than replaying from the top.

use anyhow::{Context, Result};
use glam::Mat4;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use youeye_core::FaceAnchor;
use youeye_tracker::{
    Anchor, CameraTrackingState, LimitedReason, SessionError, SessionEvent, SessionEvents,
    TrackingBackend, TrackingSession,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordedEvent {
    Anchor {
        face: Mat4,
        left_eye: Mat4,
        right_eye: Mat4,
    },
    NoFace,
    Camera {
        state: RecordedState,
        #[serde(default)]
        reason: Option<RecordedReason>,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedState {
    NotAvailable,
    Limited,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedReason {
    Initializing,
    Relocalizing,
    ExcessiveMotion,
    InsufficientFeatures,
}

impl RecordedEvent {
    pub fn to_session_event(&self) -> SessionEvent {
        match self {
            RecordedEvent::Anchor {
                face,
                left_eye,
                right_eye,
            } => SessionEvent::AnchorsUpdated(vec![Anchor::Face(FaceAnchor::new(
                *face, *left_eye, *right_eye,
            ))]),
            RecordedEvent::NoFace => SessionEvent::AnchorsUpdated(Vec::new()),
            RecordedEvent::Camera { state, reason } => {
                SessionEvent::CameraTrackingStateChanged(match state {
                    RecordedState::NotAvailable => CameraTrackingState::NotAvailable,
                    RecordedState::Normal => CameraTrackingState::Normal,
                    RecordedState::Limited => CameraTrackingState::Limited(
                        match reason.unwrap_or(RecordedReason::Initializing) {
                            RecordedReason::Initializing => LimitedReason::Initializing,
                            RecordedReason::Relocalizing => LimitedReason::Relocalizing,
                            RecordedReason::ExcessiveMotion => LimitedReason::ExcessiveMotion,
                            RecordedReason::InsufficientFeatures => {
                                LimitedReason::InsufficientFeatures
                            }
                        },
                    ),
                })
            }
            RecordedEvent::Failed { message } => {
                SessionEvent::Failed(SessionError::new(message.clone()))
            }
        }
    }
}

/// Parse a recording, reporting the 1-based line of the first bad entry.
pub fn parse_recording(text: &str) -> Result<Vec<RecordedEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: invalid event", idx + 1))
        })
        .collect()
}

pub fn load_recording(path: &Path) -> Result<Vec<RecordedEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read recording {}", path.display()))?;
    parse_recording(&text)
}

/// Backend whose sessions play a shared recording.
pub struct ReplayBackend {
    events: Arc<Vec<RecordedEvent>>,
    cursor: Arc<AtomicUsize>,
    frame_interval: Duration,
}

impl ReplayBackend {
    pub fn new(events: Vec<RecordedEvent>, frame_interval: Duration) -> Self {
        Self {
            events: Arc::new(events),
            cursor: Arc::new(AtomicUsize::new(0)),
            frame_interval,
        }
    }
}

/// Session backed by a tokio task; pausing aborts the task.
pub struct TaskSession {
    task: JoinHandle<()>,
}

impl TaskSession {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }
}

impl TrackingSession for TaskSession {
    fn pause(&mut self) {
        self.task.abort();
    }
}

impl TrackingBackend for ReplayBackend {
    fn is_supported(&self) -> bool {
        true
    }

    fn open_session(&mut self, sink: SessionEvents) -> Box<dyn TrackingSession> {
        let events = self.events.clone();
        let cursor = self.cursor.clone();
        let interval = self.frame_interval;
        tracing::debug!(
            from = cursor.load(Ordering::SeqCst),
            total = events.len(),
            "replay session opened"
        );

        let task = tokio::spawn(async move {
            loop {
                let idx = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(event) = events.get(idx) else {
                    break;
                };
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                let failed = matches!(event, RecordedEvent::Failed { .. });
                if !sink.send(event.to_session_event()) || failed {
                    break;
                }
            }
        });
        Box::new(TaskSession::new(task))
    }
}
