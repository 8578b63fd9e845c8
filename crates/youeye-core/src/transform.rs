//! Affine transform helpers.

use glam::{Mat4, Vec3};

/// Access to the translation component of a 4×4 affine transform.
pub trait Translation {
    /// The x/y/z of the 4th column. The upper-left 3×3 block is not
    /// inspected, so non-orthonormal matrices are accepted as-is.
    fn translation(&self) -> Vec3;
}

impl Translation for Mat4 {
    fn translation(&self) -> Vec3 {
        self.w_axis.truncate()
    }
}
