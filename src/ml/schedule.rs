//! Learning-rate schedule.
//!
//! Optional linear warmup followed by optional exponential decay,
//! both keyed on the global step:
//!
//! - warmup:  lr_g = base * g / warmup_steps            (g < warmup_steps)
//! - decay:   lr_g = base * decay_rate^((g - warmup_steps) / decay_steps)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRateSchedule {
    pub base: f64,
    pub warmup_steps: usize,
    pub decay_steps: usize,
    pub decay_rate: f64,
}

impl LearningRateSchedule {
    pub fn constant(base: f64) -> Self {
        Self { base, warmup_steps: 0, decay_steps: 0, decay_rate: 1.0 }
    }

    pub fn at(&self, global_step: usize) -> f64 {
        if self.warmup_steps > 0 && global_step < self.warmup_steps {
            return self.base * global_step as f64 / self.warmup_steps as f64;
        }
        if self.decay_steps == 0 || self.decay_rate <= 0.0 {
            return self.base;
        }
        let progress = (global_step - self.warmup_steps) as f64 / self.decay_steps as f64;
        self.base * self.decay_rate.powf(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_schedule() {
        let s = LearningRateSchedule::constant(1e-3);
        assert_eq!(s.at(0), 1e-3);
        assert_eq!(s.at(100_000), 1e-3);
    }

    #[test]
    fn test_warmup_ramps_linearly() {
        let s = LearningRateSchedule { warmup_steps: 10, ..LearningRateSchedule::constant(1.0) };
        assert_eq!(s.at(0), 0.0);
        assert!((s.at(5) - 0.5).abs() < 1e-12);
        assert_eq!(s.at(10), 1.0);
    }

    #[test]
    fn test_decay_after_warmup() {
        let s = LearningRateSchedule {
            base: 1.0,
            warmup_steps: 10,
            decay_steps: 100,
            decay_rate: 0.5,
        };
        assert_eq!(s.at(10), 1.0);
        assert!((s.at(110) - 0.5).abs() < 1e-12);
        assert!((s.at(210) - 0.25).abs() < 1e-12);
    }
}
