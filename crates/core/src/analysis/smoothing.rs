/// Exponential smoother for per-frame feature values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedValue {
    alpha: f32,
    value: f32,
}

impl SmoothedValue {
    /// `alpha` is the weight of each new sample.
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: 0.0,
        }
    }

    pub fn update(&mut self, next: f32) -> f32 {
        self.value = self.alpha * next + (1.0 - self.alpha) * self.value;
        self.value
    }

    pub fn get(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self, value: f32) {
        self.value = value;
    }
}

impl Default for SmoothedValue {
    fn default() -> Self {
        Self::new(0.8)
    }
}
