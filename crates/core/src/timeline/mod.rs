//! Frame pacing, playback time and keyframed property animation.

mod keyframes;

use std::time::Duration;

use crate::{Result, VisualiserError};

pub use keyframes::{Easing, Keyframe, KeyframeTrack};

/// Playback position in seconds.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }

    pub fn seek(&mut self, time_seconds: f64) {
        self.time_seconds = time_seconds.max(0.0);
    }
}

/// Time between frames at `fps`. Rejects rates that are not positive or
/// whose step does not fit a [`Duration`].
pub fn frame_step(fps: f64) -> Result<Duration> {
    if fps.is_nan() || fps <= 0.0 {
        return Err(VisualiserError::configuration(format!(
            "frame rate must be positive, got {fps}"
        )));
    }
    Duration::try_from_secs_f64(1.0 / fps).map_err(|_| {
        VisualiserError::configuration(format!("frame rate {fps} is too low to schedule"))
    })
}

/// Decides which display ticks run a logic pass for a target rate.
#[derive(Debug, Clone)]
pub struct FramePacer {
    fps: f64,
    interval: Duration,
    last: Option<Duration>,
}

impl FramePacer {
    pub fn new(fps: f64) -> Result<Self> {
        Ok(Self {
            fps,
            interval: frame_step(fps)?,
            last: None,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Changes the target rate. Unschedulable rates leave it untouched.
    pub fn set_fps(&mut self, fps: f64) -> Result<()> {
        self.interval = frame_step(fps)?;
        self.fps = fps;
        Ok(())
    }

    /// Minimum time between two passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Forgets the baseline so the next tick runs immediately.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Time since the last pass if a new one is due at `now`, `None` when
    /// throttled. The first tick after a reset is always due with zero
    /// elapsed time.
    pub fn due(&self, now: Duration) -> Option<Duration> {
        match self.last {
            None => Some(Duration::ZERO),
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                (elapsed >= self.interval()).then_some(elapsed)
            }
        }
    }

    /// Makes `now` the baseline for the next decision.
    pub fn record(&mut self, now: Duration) {
        self.last = Some(now);
    }
}
