//! youeye-core — Eye position math and the face/eye spatial model.
//!
//! Turns per-frame face anchor transforms into world-space eye positions,
//! using a fixed face → eye → projection node hierarchy and numerically
//! careful averaging.

pub mod average;
pub mod face_node;
pub mod transform;
pub mod types;

pub use average::{clamp_then_mean, mean, Averaged};
pub use face_node::{EyeModel, FaceNode, SpatialNode, EYE_PROJECTION_DISTANCE};
pub use transform::Translation;
pub use types::{FaceAnchor, Marker, MarkerColor, MarkerShape, ParsePointOfViewError, PointOfView};
