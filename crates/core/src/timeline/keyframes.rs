use serde::{Deserialize, Serialize};

/// Interpolation curve from one keyframe to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Maps progress `t` in `[0, 1]` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Playback time in seconds.
    pub time: f64,
    pub value: f64,
    /// Curve used towards the following keyframe.
    #[serde(default)]
    pub easing: Easing,
}

impl Keyframe {
    pub fn new(time: f64, value: f64) -> Self {
        Self {
            time,
            value,
            easing: Easing::Linear,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

/// Time-sorted keyframes for one numeric property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct KeyframeTrack {
    keyframes: Vec<Keyframe>,
}

impl KeyframeTrack {
    pub fn new(mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keyframes }
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Value at `time`. `None` before the first keyframe; the last value
    /// holds after the final one.
    pub fn sample(&self, time: f64) -> Option<f64> {
        let reached = self.keyframes.partition_point(|keyframe| keyframe.time <= time);
        let current = self.keyframes.get(reached.checked_sub(1)?)?;

        match self.keyframes.get(reached) {
            Some(next) => {
                let span = next.time - current.time;
                let progress = if span > 0.0 {
                    ((time - current.time) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let eased = current.easing.apply(progress);
                Some(current.value + (next.value - current.value) * eased)
            }
            None => Some(current.value),
        }
    }
}

impl From<Vec<Keyframe>> for KeyframeTrack {
    fn from(keyframes: Vec<Keyframe>) -> Self {
        Self::new(keyframes)
    }
}

impl From<KeyframeTrack> for Vec<Keyframe> {
    fn from(track: KeyframeTrack) -> Self {
        track.keyframes
    }
}
