// Pointer velocity estimate over the most recent samples of a drag.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples older than this (relative to the newest) are ignored.
const HORIZON: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    major: f32,
    minor: f32,
}

#[derive(Debug, Default)]
pub struct VelocityTracker {
    samples: VecDeque<Sample>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn add(&mut self, at: Instant, major: f32, minor: f32) {
        self.samples.push_back(Sample { at, major, minor });
        while let Some(front) = self.samples.front() {
            if at.saturating_duration_since(front.at) > HORIZON {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// `(major, minor)` velocity in pixels per `units_ms` milliseconds.
    /// Zero until two samples with distinct timestamps exist.
    pub fn velocity(&self, units_ms: i32) -> (f32, f32) {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return (0.0, 0.0);
        };
        let elapsed = last.at.saturating_duration_since(first.at).as_secs_f32();
        if elapsed <= f32::EPSILON {
            return (0.0, 0.0);
        }
        let scale = units_ms as f32 / 1000.0 / elapsed;
        (
            (last.major - first.major) * scale,
            (last.minor - first.minor) * scale,
        )
    }
}
