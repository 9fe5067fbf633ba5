/// Seconds elapsed since the map session started.
///
/// This is the timebase stored in fade timestamps, so it stays `f32` to match
/// what the renderer reads back from GPU buffers.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Time(pub f32);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn seconds(self) -> f32 {
        self.0
    }

    pub fn since(self, earlier: Time) -> f32 {
        self.0 - earlier.0
    }
}

/// Fixed-length window used to keep stale data alive until its fade finishes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FadeWindow {
    pub duration_s: f32,
}

impl FadeWindow {
    pub fn new(duration_s: f32) -> Self {
        Self {
            duration_s: duration_s.max(0.0),
        }
    }

    /// `true` while an entry stamped at `started` is still animating.
    pub fn is_running(&self, started: Time, now: Time) -> bool {
        now.since(started) < self.duration_s
    }
}

#[cfg(test)]
mod tests {
    use super::{FadeWindow, Time};

    #[test]
    fn fade_window_expires_after_duration() {
        let w = FadeWindow::new(0.5);
        assert!(w.is_running(Time(1.0), Time(1.0)));
        assert!(w.is_running(Time(1.0), Time(1.49)));
        assert!(!w.is_running(Time(1.0), Time(1.5)));
    }

    #[test]
    fn negative_duration_is_clamped() {
        let w = FadeWindow::new(-1.0);
        assert_eq!(w.duration_s, 0.0);
        assert!(!w.is_running(Time(2.0), Time(2.0)));
    }
}
