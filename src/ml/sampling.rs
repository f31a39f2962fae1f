// ============================================================
// Layer 5 — Scheduled Sampling
// ============================================================
// The mixing coefficient is the probability of feeding the
// ground-truth previous token to the decoder. It decays in
// "stairs" of `step_interval` global steps:
//
//   k = floor(g / step_interval)
//
//   linear           max(1 - rate·k, 1.0)
//   exponential      rate^k
//   inverse sigmoid  rate / (rate + exp(k / rate))
//
// The linear form clamps with max(), so its value never drops
// below 1.0 and a linear schedule stays on pure teacher forcing.
// Existing run configs rely on this; a decaying floor needs min().

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingDecay {
    Linear,
    Exponential,
    InverseSigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSampling {
    pub decay: SamplingDecay,
    pub rate: f64,
    pub step_interval: usize,
}

impl ScheduledSampling {
    pub fn is_active(&self) -> bool {
        self.rate > 0.0 && self.step_interval > 0
    }

    /// Stair index for a global step.
    pub fn stair(&self, global_step: usize) -> usize {
        global_step / self.step_interval.max(1)
    }

    pub fn coefficient(&self, global_step: usize) -> f64 {
        let k = self.stair(global_step) as f64;
        let r = self.rate;
        match self.decay {
            SamplingDecay::Linear => (1.0 - r * k).max(1.0),
            SamplingDecay::Exponential => r.powf(k),
            SamplingDecay::InverseSigmoid => r / (r + (k / r).exp()),
        }
    }
}

/// Blend ground-truth decoder inputs with the model's own previous
/// predictions.
///
/// Position 0 always keeps the start token. At position t > 0 the
/// ground-truth token is kept with probability `teacher_forcing`,
/// otherwise it is replaced by the prediction made at t - 1.
pub fn mix_decoder_inputs<R: Rng + ?Sized>(
    truth: &[Vec<usize>],
    predicted: &[Vec<usize>],
    teacher_forcing: f64,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    if teacher_forcing >= 1.0 {
        return truth.to_vec();
    }

    truth
        .iter()
        .zip(predicted)
        .map(|(truth_row, predicted_row)| {
            truth_row
                .iter()
                .enumerate()
                .map(|(t, &gold)| {
                    if t == 0 || rng.gen::<f64>() < teacher_forcing {
                        gold
                    } else {
                        predicted_row[t - 1]
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn schedule(decay: SamplingDecay, rate: f64) -> ScheduledSampling {
        ScheduledSampling { decay, rate, step_interval: 10 }
    }

    #[test]
    fn test_inactive_without_rate_or_interval() {
        assert!(!schedule(SamplingDecay::Exponential, 0.0).is_active());
        let s = ScheduledSampling { step_interval: 0, ..schedule(SamplingDecay::Exponential, 0.9) };
        assert!(!s.is_active());
        assert!(schedule(SamplingDecay::Exponential, 0.9).is_active());
    }

    #[test]
    fn test_step_zero_is_identity_value() {
        assert_eq!(schedule(SamplingDecay::Linear, 0.1).coefficient(0), 1.0);
        assert_eq!(schedule(SamplingDecay::Exponential, 0.9).coefficient(0), 1.0);
        let r: f64 = 5.0;
        let expected = r / (r + 1.0);
        assert!((schedule(SamplingDecay::InverseSigmoid, r).coefficient(0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_stairs_hold_within_interval() {
        let s = schedule(SamplingDecay::Exponential, 0.5);
        assert_eq!(s.coefficient(9), 1.0);
        assert_eq!(s.coefficient(10), 0.5);
        assert_eq!(s.coefficient(19), 0.5);
        assert_eq!(s.coefficient(25), 0.25);
    }

    #[test]
    fn test_linear_is_clamped_at_one() {
        let s = schedule(SamplingDecay::Linear, 0.1);
        for g in [0, 10, 50, 1000] {
            assert_eq!(s.coefficient(g), 1.0);
        }
    }

    #[test]
    fn test_exponential_and_inverse_sigmoid_decrease() {
        for s in [
            schedule(SamplingDecay::Exponential, 0.8),
            schedule(SamplingDecay::InverseSigmoid, 3.0),
        ] {
            let values: Vec<f64> = (0..6).map(|k| s.coefficient(k * 10)).collect();
            for w in values.windows(2) {
                assert!(w[1] < w[0], "{:?}", values);
            }
        }
    }

    #[test]
    fn test_inverse_sigmoid_matches_formula() {
        let s = schedule(SamplingDecay::InverseSigmoid, 2.0);
        let k = 3.0_f64;
        assert!((s.coefficient(30) - 2.0 / (2.0 + (k / 2.0).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_full_teacher_forcing_keeps_truth() {
        let mut rng = StdRng::seed_from_u64(3);
        let truth = vec![vec![1, 5, 6, 7]];
        let predicted = vec![vec![9, 9, 9, 9]];
        assert_eq!(mix_decoder_inputs(&truth, &predicted, 1.0, &mut rng), truth);
    }

    #[test]
    fn test_zero_teacher_forcing_uses_previous_predictions() {
        let mut rng = StdRng::seed_from_u64(3);
        let truth = vec![vec![1, 5, 6, 7]];
        let predicted = vec![vec![10, 11, 12, 13]];
        assert_eq!(
            mix_decoder_inputs(&truth, &predicted, 0.0, &mut rng),
            vec![vec![1, 10, 11, 12]]
        );
    }
}
