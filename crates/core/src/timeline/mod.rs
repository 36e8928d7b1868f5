use std::time::{Duration, Instant};

use crate::{Result, VisualiserError};

/// Time between frames at `frame_rate`. Rates so small that the interval
/// does not fit a [`Duration`] are rejected along with non-positive ones.
pub fn frame_interval(frame_rate: f32) -> Result<Duration> {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(VisualiserError::config("frame_rate must be positive"));
    }
    Duration::try_from_secs_f32(1.0 / frame_rate).map_err(|_| {
        VisualiserError::config(format!("frame_rate {frame_rate} is too small"))
    })
}

/// Paces the frame loop at a fixed rate.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    started: Instant,
    next_deadline: Instant,
    frame: u64,
}

impl FrameClock {
    pub fn new(frame_rate: f32) -> Result<Self> {
        let interval = frame_interval(frame_rate)?;
        let now = Instant::now();
        Ok(Self {
            interval,
            started: now,
            next_deadline: now,
            frame: 0,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Frames handed out so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Sleeps until the next frame is due and returns its index. When the
    /// loop has fallen a whole interval behind, the schedule restarts from
    /// now instead of firing a burst of catch-up frames.
    pub fn tick(&mut self) -> u64 {
        let now = Instant::now();
        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
            self.next_deadline += self.interval;
        } else if now - self.next_deadline > self.interval {
            tracing::debug!(frame = self.frame, "frame loop fell behind; resynchronising");
            self.next_deadline = now + self.interval;
        } else {
            self.next_deadline += self.interval;
        }

        let frame = self.frame;
        self.frame += 1;
        frame
    }

    pub fn reset(&mut self) {
        let now = Instant::now();
        self.started = now;
        self.next_deadline = now;
        self.frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_rates() {
        assert!(FrameClock::new(0.0).is_err());
        assert!(FrameClock::new(-30.0).is_err());
        assert!(FrameClock::new(f32::NAN).is_err());
    }

    #[test]
    fn rejects_rates_whose_interval_overflows() {
        let err = FrameClock::new(1e-39).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidConfig(_)));
        assert!(frame_interval(1e-30).is_err());
        assert!((frame_interval(50.0).unwrap().as_secs_f64() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn ticks_are_paced_by_the_interval() {
        let mut clock = FrameClock::new(200.0).unwrap();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);

        // two full intervals must have elapsed before the third frame
        assert!(clock.elapsed() >= clock.interval() * 2);
        assert_eq!(clock.frames(), 3);
    }

    #[test]
    fn falling_behind_does_not_burst() {
        let mut clock = FrameClock::new(1_000.0).unwrap();
        clock.tick();
        std::thread::sleep(Duration::from_millis(20));

        let before = Instant::now();
        clock.tick();
        clock.tick();
        assert!(before.elapsed() >= clock.interval());
    }

    #[test]
    fn reset_restarts_frame_count() {
        let mut clock = FrameClock::new(500.0).unwrap();
        clock.tick();
        clock.reset();
        assert_eq!(clock.frames(), 0);
    }
}
