//! Face/eye spatial model.
//!
//! A fixed node hierarchy that mirrors how face tracking reports its
//! transforms: eye transforms are relative to the face, and each eye carries
//! a projection child pushed forward along its local +Z axis.
//!
//! ```text
//! root (face)
//! ├── left eye ── left eye projection   (+Z × EYE_PROJECTION_DISTANCE)
//! └── right eye ─ right eye projection  (+Z × EYE_PROJECTION_DISTANCE)
//! ```
//!
//! The shape never changes after construction, so world positions are
//! resolved by composing each node's statically known ancestor chain.

use crate::average::Averaged;
use crate::transform::Translation;
use crate::types::{Marker, MarkerColor, MarkerShape, PointOfView};
use glam::{Mat4, Vec3};
use std::sync::Arc;

/// Forward distance of each eye projection node from its eye, in the
/// tracking session's units (typically meters).
pub const EYE_PROJECTION_DISTANCE: f32 = 1.0;

/// Capability surface of an eye spatial model.
///
/// The tracker only talks to its model through this trait, so a test double
/// can stand in for [`FaceNode`].
pub trait EyeModel: Send {
    /// Apply a frame's face, left eye and right eye transforms.
    fn update(&mut self, face: Mat4, left_eye: Mat4, right_eye: Mat4);

    /// World position of the selected eye. `None` yields `Vec3::ZERO`.
    fn eye_position(&self, pov: Option<PointOfView>) -> Vec3;

    /// World position of the selected eye's forward projection point.
    fn eye_projection_position(&self, pov: PointOfView) -> Vec3;

    /// Attach (idempotently) or remove the debug markers.
    fn set_marker_visible(&mut self, visible: bool);
}

/// A node in the face hierarchy.
#[derive(Debug, Clone)]
pub struct SpatialNode {
    transform: Mat4,
    offset: Vec3,
    marker: Option<Arc<Marker>>,
}

impl SpatialNode {
    fn new() -> Self {
        Self::with_offset(Vec3::ZERO)
    }

    fn with_offset(offset: Vec3) -> Self {
        Self {
            transform: Mat4::IDENTITY,
            offset,
            marker: None,
        }
    }

    /// Local transform relative to the parent node.
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Fixed local offset applied on top of the transform.
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn marker(&self) -> Option<&Arc<Marker>> {
        self.marker.as_ref()
    }

    /// Full parent-relative matrix: offset composed with the transform.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.offset) * self.transform
    }

    fn attach_marker(&mut self, shape: MarkerShape, color: MarkerColor) {
        self.marker = Some(Arc::new(Marker::new(shape, color)));
    }
}

/// Compose a root-first ancestor chain into a world matrix.
fn world_matrix(chain: &[&SpatialNode]) -> Mat4 {
    chain
        .iter()
        .fold(Mat4::IDENTITY, |world, node| world * node.local_matrix())
}

#[derive(Debug, Clone)]
struct EyeBranch {
    eye: SpatialNode,
    projection: SpatialNode,
}

impl EyeBranch {
    fn new() -> Self {
        Self {
            eye: SpatialNode::new(),
            projection: SpatialNode::with_offset(Vec3::new(0.0, 0.0, EYE_PROJECTION_DISTANCE)),
        }
    }
}

/// Face node with both eyes and their projection points.
#[derive(Debug, Clone)]
pub struct FaceNode {
    root: SpatialNode,
    left: EyeBranch,
    right: EyeBranch,
}

impl Default for FaceNode {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceNode {
    pub fn new() -> Self {
        Self {
            root: SpatialNode::new(),
            left: EyeBranch::new(),
            right: EyeBranch::new(),
        }
    }

    pub fn root(&self) -> &SpatialNode {
        &self.root
    }

    pub fn left_eye(&self) -> &SpatialNode {
        &self.left.eye
    }

    pub fn right_eye(&self) -> &SpatialNode {
        &self.right.eye
    }

    pub fn left_eye_projection(&self) -> &SpatialNode {
        &self.left.projection
    }

    pub fn right_eye_projection(&self) -> &SpatialNode {
        &self.right.projection
    }

    /// All five nodes, root first.
    pub fn nodes(&self) -> [&SpatialNode; 5] {
        [
            &self.root,
            &self.left.eye,
            &self.right.eye,
            &self.left.projection,
            &self.right.projection,
        ]
    }

    fn branch(&self, side: Side) -> &EyeBranch {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn eye_world_position(&self, side: Side) -> Vec3 {
        world_matrix(&[&self.root, &self.branch(side).eye]).translation()
    }

    fn projection_world_position(&self, side: Side) -> Vec3 {
        let branch = self.branch(side);
        world_matrix(&[&self.root, &branch.eye, &branch.projection]).translation()
    }

    fn markers_present(&self) -> bool {
        self.nodes().iter().any(|n| n.marker.is_some())
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl EyeModel for FaceNode {
    fn update(&mut self, face: Mat4, left_eye: Mat4, right_eye: Mat4) {
        self.root.transform = face;
        self.left.eye.transform = left_eye;
        self.right.eye.transform = right_eye;
    }

    fn eye_position(&self, pov: Option<PointOfView>) -> Vec3 {
        let Some(pov) = pov else {
            return Vec3::ZERO;
        };
        match pov {
            PointOfView::LeftEye => self.eye_world_position(Side::Left),
            PointOfView::RightEye => self.eye_world_position(Side::Right),
            PointOfView::EyeAverage => self
                .eye_position(Some(PointOfView::LeftEye))
                .averaged(self.eye_position(Some(PointOfView::RightEye))),
        }
    }

    fn eye_projection_position(&self, pov: PointOfView) -> Vec3 {
        match pov {
            PointOfView::LeftEye => self.projection_world_position(Side::Left),
            PointOfView::RightEye => self.projection_world_position(Side::Right),
            PointOfView::EyeAverage => self
                .eye_projection_position(PointOfView::LeftEye)
                .averaged(self.eye_projection_position(PointOfView::RightEye)),
        }
    }

    fn set_marker_visible(&mut self, visible: bool) {
        if !visible {
            for node in [
                &mut self.root,
                &mut self.left.eye,
                &mut self.right.eye,
                &mut self.left.projection,
                &mut self.right.projection,
            ] {
                node.marker = None;
            }
            tracing::debug!("face markers removed");
            return;
        }

        if self.markers_present() {
            return;
        }

        let eye = MarkerShape::Sphere { radius: 0.01 };
        let ray = MarkerShape::Cuboid {
            size: Vec3::new(0.001, 0.001, 2.0),
        };
        self.root.attach_marker(
            MarkerShape::Cuboid {
                size: Vec3::splat(0.02),
            },
            MarkerColor::Blue,
        );
        self.left.eye.attach_marker(eye, MarkerColor::Black);
        self.right.eye.attach_marker(eye, MarkerColor::Black);
        self.left.projection.attach_marker(ray, MarkerColor::Red);
        self.right.projection.attach_marker(ray, MarkerColor::Red);
        tracing::debug!("face markers attached");
    }
}
