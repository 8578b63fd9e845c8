//! Generated face motion for exercising the tracker without hardware.

use crate::replay::TaskSession;
use glam::{Mat4, Quat, Vec3};
use std::time::Duration;
use youeye_core::FaceAnchor;
use youeye_tracker::{Anchor, SessionEvents, TrackingBackend, TrackingSession};

/// Half the interpupillary distance, in meters.
const HALF_IPD: f32 = 0.032;
/// Resting distance between face and camera, in meters.
const BASE_DEPTH: f32 = -0.4;

/// Face anchor for frame `i` of `total`: a slow orbit in front of the
/// camera with a gentle head turn.
pub fn orbit_frame(i: usize, total: usize) -> FaceAnchor {
    let t = if total == 0 {
        0.0
    } else {
        i as f32 / total as f32 * std::f32::consts::TAU
    };

    let face = Mat4::from_rotation_translation(
        Quat::from_rotation_y(0.2 * t.sin()),
        Vec3::new(0.05 * t.sin(), 0.03 * t.cos(), BASE_DEPTH + 0.05 * (t / 2.0).sin()),
    );
    let left = Mat4::from_translation(Vec3::new(-HALF_IPD, 0.03, 0.02));
    let right = Mat4::from_translation(Vec3::new(HALF_IPD, 0.03, 0.02));
    FaceAnchor::new(face, left, right)
}

/// Backend that emits `frames` orbit frames per session.
pub struct SyntheticBackend {
    frames: usize,
    frame_interval: Duration,
}

impl SyntheticBackend {
    pub fn new(frames: usize, frame_interval: Duration) -> Self {
        Self {
            frames,
            frame_interval,
        }
    }
}

impl TrackingBackend for SyntheticBackend {
    fn is_supported(&self) -> bool {
        true
    }

    fn open_session(&mut self, sink: SessionEvents) -> Box<dyn TrackingSession> {
        let frames = self.frames;
        let interval = self.frame_interval;
        let task = tokio::spawn(async move {
            for i in 0..frames {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if !sink.anchors_updated(vec![Anchor::Face(orbit_frame(i, frames))]) {
                    break;
                }
            }
        });
        Box::new(TaskSession::new(task))
    }
}
