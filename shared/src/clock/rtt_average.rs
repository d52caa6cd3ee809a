use std::collections::VecDeque;

/// Arithmetic mean of the last `window` samples
#[derive(Clone, Debug)]
pub struct RttAverage {
    window: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl RttAverage {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(sample);
        self.sum += sample;
    }

    /// Mean of the retained samples, `0.0` before the first one
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}
