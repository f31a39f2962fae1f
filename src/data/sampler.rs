// ============================================================
// Layer 4 — Evaluation Sample Selection
// ============================================================
// When no dev corpus is given, evaluation runs on a random
// subset of the accepted training pairs instead. The subset is
// drawn once, before training, and reused at every evaluation so
// BLEU numbers stay comparable across epochs.
//
// Uses rand::seq::SliceRandom (partial Fisher-Yates), so no pair
// is picked twice.

use rand::{seq::SliceRandom, Rng};

use crate::domain::batch::{Batch, SentencePair};

/// Up to `count` distinct pairs, in random order.
pub fn sample_pairs<R: Rng + ?Sized>(pairs: &[SentencePair], count: usize, rng: &mut R) -> Vec<SentencePair> {
    let picked: Vec<SentencePair> = pairs.choose_multiple(rng, count).cloned().collect();
    tracing::debug!("Sampled {} of {} pairs for evaluation", picked.len(), pairs.len());
    picked
}

/// A random batch from a cached batch list.
pub fn sample_batch<'b, R: Rng + ?Sized>(batches: &'b [Batch], rng: &mut R) -> Option<&'b Batch> {
    batches.choose(rng)
}

/// Two row indices into a sample of `size` rows, for the printed
/// side-by-side comparisons. They may coincide.
pub fn pick_display_rows<R: Rng + ?Sized>(size: usize, rng: &mut R) -> (usize, usize) {
    if size == 0 {
        return (0, 0);
    }
    (rng.gen_range(0..size), rng.gen_range(0..size))
}
