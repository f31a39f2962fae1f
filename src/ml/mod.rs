// ============================================================
// Layer 5 — ML / Training Layer
// ============================================================
// The training driver and the Burn runtime behind it.
//
// The driver half (trainer, evaluator, sampling, schedule,
// diagnostics) only sees the TranslationRuntime trait and plain
// id matrices, so it is testable without a GPU. The Burn half
// (model, runtime) is the one concrete runtime.
//
//   sampling.rs    — scheduled-sampling coefficient per global
//                    step (linear / exponential / inverse sigmoid)
//                    and the gold/predicted decoder input mix
//
//   schedule.rs    — learning rate: warmup, then exponential decay
//
//   diagnostics.rs — NaN scan and global min/max parameter scan
//
//   trainer.rs     — epochs × batches, loss history, NaN abort,
//                    periodic evaluation callback
//
//   evaluator.rs   — teacher-forced vs greedy decoding of the
//                    evaluation sample, strip, BLEU
//
//   model.rs       — pre-norm transformer encoder-decoder
//
//   runtime.rs     — TranslationRuntime over the model + Adam
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Bengio et al. (2015) Scheduled Sampling

/// Scheduled-sampling decay and decoder input mixing
pub mod sampling;

/// Learning-rate warmup and decay
pub mod schedule;

/// Read-only parameter inspection
pub mod diagnostics;

/// Training loop controller
pub mod trainer;

/// Evaluation / decoding driver
pub mod evaluator;

/// Transformer encoder-decoder architecture
pub mod model;

/// Burn-backed TranslationRuntime
pub mod runtime;
