use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Which eye (or the midpoint of both) the tracked position follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOfView {
    LeftEye,
    RightEye,
    EyeAverage,
}

impl PointOfView {
    pub const ALL: [PointOfView; 3] = [Self::LeftEye, Self::RightEye, Self::EyeAverage];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::EyeAverage => "eye_average",
        }
    }
}

impl fmt::Display for PointOfView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown point of view: {0} (expected left_eye, right_eye or eye_average)")]
pub struct ParsePointOfViewError(String);

impl FromStr for PointOfView {
    type Err = ParsePointOfViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "left" | "left_eye" => Ok(Self::LeftEye),
            "right" | "right_eye" => Ok(Self::RightEye),
            "average" | "eye_average" => Ok(Self::EyeAverage),
            _ => Err(ParsePointOfViewError(s.to_string())),
        }
    }
}

/// One frame of face tracking output.
///
/// All three transforms share the tracking session's coordinate space.
/// Eye transforms are relative to the face, matching how the spatial model
/// nests eye nodes under the face node. Matrices serialize as 16 floats in
/// column-major order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceAnchor {
    pub transform: Mat4,
    pub left_eye_transform: Mat4,
    pub right_eye_transform: Mat4,
}

impl FaceAnchor {
    pub fn new(transform: Mat4, left_eye_transform: Mat4, right_eye_transform: Mat4) -> Self {
        Self {
            transform,
            left_eye_transform,
            right_eye_transform,
        }
    }
}

impl Default for FaceAnchor {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// Geometry of a debug marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerShape {
    Cuboid { size: Vec3 },
    Sphere { radius: f32 },
}

/// Flat color of a debug marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerColor {
    Blue,
    Black,
    Red,
}

static NEXT_MARKER_ID: AtomicU64 = AtomicU64::new(1);

/// A visual marker attached to a spatial node for debugging.
///
/// Rendering is left to whoever consumes the model; this only records what
/// should be drawn. Every marker gets a process-unique `id`.
#[derive(Debug, PartialEq)]
pub struct Marker {
    pub id: u64,
    pub shape: MarkerShape,
    pub color: MarkerColor,
}

impl Marker {
    pub fn new(shape: MarkerShape, color: MarkerColor) -> Self {
        Self {
            id: NEXT_MARKER_ID.fetch_add(1, Ordering::Relaxed),
            shape,
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_of_view_parse() {
        assert_eq!("left".parse::<PointOfView>().unwrap(), PointOfView::LeftEye);
        assert_eq!("Right-Eye".parse::<PointOfView>().unwrap(), PointOfView::RightEye);
        assert_eq!("eye_average".parse::<PointOfView>().unwrap(), PointOfView::EyeAverage);
        assert!("nose".parse::<PointOfView>().is_err());
    }

    #[test]
    fn test_point_of_view_display_parses_back() {
        for pov in PointOfView::ALL {
            assert_eq!(pov.to_string().parse::<PointOfView>().unwrap(), pov);
        }
    }

    #[test]
    fn test_marker_ids_unique() {
        let a = Marker::new(MarkerShape::Sphere { radius: 0.01 }, MarkerColor::Black);
        let b = Marker::new(MarkerShape::Sphere { radius: 0.01 }, MarkerColor::Black);
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn test_face_anchor_default_is_identity() {
        let anchor = FaceAnchor::default();
        assert_eq!(anchor.transform, Mat4::IDENTITY);
        assert_eq!(anchor.left_eye_transform, Mat4::IDENTITY);
        assert_eq!(anchor.right_eye_transform, Mat4::IDENTITY);
    }
}
