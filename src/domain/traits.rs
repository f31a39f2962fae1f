// ============================================================
// Layer 3 — Core Traits (Collaborator Seams)
// ============================================================
// The training driver never talks to a tensor library or a
// metric implementation directly. It programs against these
// traits, so the controller and evaluation driver can be tested
// with in-memory fakes and the backend can be swapped freely.
//
//   TranslationRuntime — the numeric-graph runtime that owns the
//                        encoder/decoder parameters
//   BleuScorer         — black-box corpus BLEU

use std::path::Path;

use anyhow::Result;

use crate::domain::batch::{DecodeMode, Feed};

/// A trainable parameter, flattened for introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParameter {
    pub name: String,
    pub values: Vec<f32>,
}

impl NamedParameter {
    pub fn new(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self { name: name.into(), values }
    }
}

pub trait TranslationRuntime {
    /// Run one optimizer step and return the batch loss.
    ///
    /// `teacher_forcing` is the probability of feeding the ground-truth
    /// previous token at each decoder position: 1.0 is pure teacher
    /// forcing, 0.0 is fully self-generated input. Values above 1.0
    /// behave like 1.0.
    fn train_step(&mut self, feed: &Feed<'_>, teacher_forcing: f64, learning_rate: f64) -> Result<f64>;

    /// Forward pass without updating parameters; returns one id
    /// sequence of length `feed.max_unroll` per batch row.
    fn decode(&self, feed: &Feed<'_>, mode: DecodeMode) -> Result<Vec<Vec<usize>>>;

    /// Every trainable parameter with a stable dotted name.
    fn parameters(&self) -> Vec<NamedParameter>;

    /// Persist parameters plus the manifest needed to rebuild them.
    fn save(&self, dir: &Path) -> Result<()>;
}

pub trait BleuScorer {
    /// Score in [0, 1]; `hypotheses[i]` is compared with `references[i]`.
    fn score(&self, hypotheses: &[String], references: &[String]) -> f64;
}
