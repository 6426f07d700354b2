//! Time management utilities
//!
//! Frames are driven by the host (an animation-frame callback), which hands
//! the engine a timestamp. The timer turns successive timestamps into deltas.

/// Frame timer fed by host timestamps in seconds
#[derive(Debug, Clone, Default)]
pub struct Timer {
    last_timestamp: Option<f64>,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to `timestamp` and return the delta since the previous frame
    ///
    /// The first frame has a delta of zero. Timestamps that go backwards are
    /// clamped to a zero delta.
    pub fn advance(&mut self, timestamp: f64) -> f32 {
        self.delta_time = self
            .last_timestamp
            .map_or(0.0, |last| (timestamp - last).max(0.0) as f32);
        self.last_timestamp = Some(timestamp);
        self.total_time += self.delta_time;
        self.frame_count += 1;
        self.delta_time
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time since the first frame
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since the first frame
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_has_zero_delta() {
        let mut timer = Timer::new();
        assert_eq!(timer.advance(12.5), 0.0);
        assert_eq!(timer.frame_count(), 1);
    }

    #[test]
    fn test_delta_between_frames() {
        let mut timer = Timer::new();
        timer.advance(1.0);
        let dt = timer.advance(1.25);
        assert!((dt - 0.25).abs() < 1e-6);
        assert!((timer.total_time() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_backwards_timestamp_clamps() {
        let mut timer = Timer::new();
        timer.advance(2.0);
        assert_eq!(timer.advance(1.0), 0.0);
    }
}
