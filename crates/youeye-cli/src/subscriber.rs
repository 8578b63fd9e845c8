//! Console subscriber with depth smoothing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use youeye_core::clamp_then_mean;
use youeye_tracker::EyePositionSubscriber;

/// Prints every broadcast and keeps a trailing mean of recent depth samples.
pub struct LoggingSubscriber {
    window: usize,
    depths: Mutex<Vec<f64>>,
    moved: AtomicUsize,
    interrupted: AtomicUsize,
    quiet: bool,
}

impl LoggingSubscriber {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            depths: Mutex::new(Vec::with_capacity(window + 1)),
            moved: AtomicUsize::new(0),
            interrupted: AtomicUsize::new(0),
            quiet: false,
        }
    }

    /// Same bookkeeping, no output.
    pub fn quiet(window: usize) -> Self {
        Self {
            quiet: true,
            ..Self::new(window)
        }
    }

    /// Record a depth sample and return the mean of the trailing window.
    pub fn push_depth(&self, z: f32) -> f64 {
        let mut depths = self.depths.lock();
        depths.push(z as f64);
        clamp_then_mean(&mut depths, self.window)
    }

    pub fn smoothed_depth(&self) -> f64 {
        let mut depths = self.depths.lock();
        clamp_then_mean(&mut depths, self.window)
    }

    pub fn moved_count(&self) -> usize {
        self.moved.load(Ordering::Relaxed)
    }

    pub fn interrupted_count(&self) -> usize {
        self.interrupted.load(Ordering::Relaxed)
    }
}

impl EyePositionSubscriber for LoggingSubscriber {
    fn position_moved(&self, x: f32, y: f32, z: f32) {
        self.moved.fetch_add(1, Ordering::Relaxed);
        let depth = self.push_depth(z);
        if !self.quiet {
            println!("eye  x={x:+.4}  y={y:+.4}  z={z:+.4}  depth~{depth:+.4}");
        }
    }

    fn tracking_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::Relaxed);
        if !self.quiet {
            println!("eye  tracking interrupted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_window_is_trailing() {
        let sub = LoggingSubscriber::quiet(3);
        for z in [-1.0, -0.5, -0.4, -0.3, -0.2] {
            sub.position_moved(0.0, 0.0, z);
        }
        assert_eq!(sub.moved_count(), 5);
        assert!((sub.smoothed_depth() - (-0.3)).abs() < 1e-6);
    }

    #[test]
    fn test_depth_empty_is_zero() {
        let sub = LoggingSubscriber::quiet(4);
        assert_eq!(sub.smoothed_depth(), 0.0);
    }

    #[test]
    fn test_zero_window_treated_as_one() {
        let sub = LoggingSubscriber::quiet(0);
        sub.position_moved(0.0, 0.0, -0.25);
        sub.position_moved(0.0, 0.0, -0.5);
        assert_eq!(sub.smoothed_depth(), -0.5);
    }

    #[test]
    fn test_interruptions_counted() {
        let sub = LoggingSubscriber::quiet(2);
        sub.tracking_interrupted();
        sub.tracking_interrupted();
        assert_eq!(sub.interrupted_count(), 2);
        assert_eq!(sub.moved_count(), 0);
    }
}
