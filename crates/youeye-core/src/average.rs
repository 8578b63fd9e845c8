//! Averaging primitives.
//!
//! Pairwise averages use `a + (b - a) / 2` rather than `(a + b) / 2` so the
//! intermediate never exceeds the magnitude of the operands. Sequence means
//! shift every sample by the minimum before summing, which bounds the
//! accumulator by the value range instead of the value magnitudes.

use glam::{Vec3, Vec4};

/// Midpoint between two values.
pub trait Averaged {
    fn averaged(self, other: Self) -> Self;
}

impl Averaged for f32 {
    #[inline]
    fn averaged(self, other: f32) -> f32 {
        self + (other - self) / 2.0
    }
}

impl Averaged for f64 {
    #[inline]
    fn averaged(self, other: f64) -> f64 {
        self + (other - self) / 2.0
    }
}

impl Averaged for Vec3 {
    fn averaged(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.x.averaged(other.x),
            self.y.averaged(other.y),
            self.z.averaged(other.z),
        )
    }
}

impl Averaged for Vec4 {
    fn averaged(self, other: Vec4) -> Vec4 {
        Vec4::new(
            self.x.averaged(other.x),
            self.y.averaged(other.y),
            self.z.averaged(other.z),
            self.w.averaged(other.w),
        )
    }
}

/// Mean of a sequence. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let shifted: f64 = values.iter().map(|v| v - min).sum();
    shifted / values.len() as f64 + min
}

/// Trim `values` to its newest `max_count` entries, then return their mean.
///
/// Entries are evicted from the front (oldest first), so repeated
/// push-then-call acts as a fixed-capacity trailing window.
pub fn clamp_then_mean(values: &mut Vec<f64>, max_count: usize) -> f64 {
    if values.len() > max_count {
        let excess = values.len() - max_count;
        values.drain(..excess);
    }
    mean(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIRS: [(f64, f64); 6] = [
        (3.0, 5.0),
        (-1.0, 2.0),
        (0.5, 0.25),
        (1.0e6, -3.0),
        (-12.75, -12.75),
        (0.0, -8.5),
    ];

    #[test]
    fn test_average_scalar_commutative() {
        for (a, b) in PAIRS {
            assert_eq!(a.averaged(b), b.averaged(a), "a={a}, b={b}");
            assert_eq!((a as f32).averaged(b as f32), (b as f32).averaged(a as f32));
        }
    }

    #[test]
    fn test_average_scalar_idempotent() {
        for (a, _) in PAIRS {
            assert_eq!(a.averaged(a), a);
        }
        assert_eq!(f32::MAX.averaged(f32::MAX), f32::MAX);
    }

    #[test]
    fn test_average_scalar_does_not_overflow() {
        // (a + b) / 2 would overflow to infinity here.
        let avg = f32::MAX.averaged(f32::MAX / 2.0);
        assert!(avg.is_finite());
        assert!((avg - f32::MAX * 0.75).abs() / f32::MAX < 1e-6);
    }

    #[test]
    fn test_average_vec3() {
        let a = Vec3::new(-1.0, -2.0, -3.0);
        let b = Vec3::new(2.0, 4.0, 6.0);
        assert_eq!(a.averaged(b), Vec3::new(0.5, 1.0, 1.5));
        assert_eq!(b.averaged(a), Vec3::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn test_average_vec3_mixed_values() {
        let a = Vec3::new(-267.3, -247.11, -3.255);
        let b = Vec3::new(2.664, 424.24, -6.245);
        let avg = a.averaged(b);
        let expected = Vec3::new(-132.318, 88.565, -4.75);
        assert!((avg - expected).abs().max_element() < 1e-3, "avg = {avg:?}");
    }

    #[test]
    fn test_average_vec4() {
        let a = Vec4::new(0.0, 2.0, -4.0, 1.0);
        let b = Vec4::new(10.0, 4.0, 4.0, 1.0);
        assert_eq!(a.averaged(b), Vec4::new(5.0, 3.0, 0.0, 1.0));
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_mean_known_values() {
        assert_eq!(mean(&[3.0, 5.0, 8.0, 12.0]), 7.0);
        assert_eq!(mean(&[4.0]), 4.0);
        assert_eq!(mean(&[-2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_mean_order_independent() {
        let a = mean(&[3.0, 5.0, 8.0, 12.0, -6.0]);
        let b = mean(&[12.0, -6.0, 8.0, 3.0, 5.0]);
        let c = mean(&[5.0, 12.0, 3.0, -6.0, 8.0]);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_mean_large_offset_keeps_precision() {
        // Accumulates offsets from the minimum, not the raw magnitudes.
        let base = 1.0e16;
        let values = [base + 2.0, base + 4.0, base + 6.0];
        assert_eq!(mean(&values), base + 4.0);
    }

    #[test]
    fn test_clamp_then_mean_trims_front() {
        let mut values = vec![1.0, 43.0, 2.0, 3.0, 5.0, 8.0, 12.0];
        assert_eq!(clamp_then_mean(&mut values, 4), 7.0);
        assert_eq!(values, vec![3.0, 5.0, 8.0, 12.0]);
    }

    #[test]
    fn test_clamp_then_mean_under_capacity() {
        let mut values = vec![2.0, 4.0];
        assert_eq!(clamp_then_mean(&mut values, 10), 3.0);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_clamp_then_mean_empty() {
        let mut values = Vec::new();
        assert_eq!(clamp_then_mean(&mut values, 0), 0.0);
        assert_eq!(clamp_then_mean(&mut values, 5), 0.0);
    }

    #[test]
    fn test_clamp_then_mean_zero_capacity() {
        let mut values = vec![1.0, 2.0, 3.0];
        assert_eq!(clamp_then_mean(&mut values, 0), 0.0);
        assert!(values.is_empty());
    }

    #[test]
    fn test_clamp_then_mean_rolling_window() {
        let mut window = Vec::new();
        for sample in [10.0, 20.0, 30.0, 40.0] {
            window.push(sample);
            clamp_then_mean(&mut window, 2);
        }
        assert_eq!(window, vec![30.0, 40.0]);
        assert_eq!(mean(&window), 35.0);
    }
}
