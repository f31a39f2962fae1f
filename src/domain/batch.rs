// ============================================================
// Layer 3 — Sentences, Batches and Feeds
// ============================================================
// A Batch is five parallel structures, all with batch_size rows:
//
//   source_ids         [B][max_src]  padded with the source end id
//   target_ids         [B][max_tgt]  padded with the target end id
//   source_lengths     [B]           pre-pad lengths
//   target_lengths     [B]           pre-pad lengths
//   decoder_input_ids  [B][max_tgt]  [start] + target[..len-1], padded
//
// A Feed is the borrowed view of one batch handed to the runtime
// for a single training step or decode call.

use serde::{Deserialize, Serialize};

/// One line of each parallel file, split into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    pub source: Vec<String>,
    pub target: Vec<String>,
}

impl SentencePair {
    pub fn new(source: Vec<String>, target: Vec<String>) -> Self {
        Self { source, target }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub source_ids: Vec<Vec<usize>>,
    pub target_ids: Vec<Vec<usize>>,
    pub source_lengths: Vec<usize>,
    pub target_lengths: Vec<usize>,
    pub decoder_input_ids: Vec<Vec<usize>>,
}

impl Batch {
    pub fn size(&self) -> usize {
        self.source_ids.len()
    }

    /// Longest target before padding; the decoder unroll bound.
    pub fn max_target_len(&self) -> usize {
        self.target_lengths.iter().copied().max().unwrap_or(0)
    }

    /// Training-mode view with the given dropout keep-probability.
    pub fn feed(&self, keep_prob: f64) -> Feed<'_> {
        Feed {
            source_ids: &self.source_ids,
            source_lengths: &self.source_lengths,
            target_ids: &self.target_ids,
            target_lengths: &self.target_lengths,
            decoder_input_ids: &self.decoder_input_ids,
            batch_size: self.size(),
            max_unroll: self.max_target_len(),
            keep_prob,
        }
    }

    /// Evaluation view: dropout is always disabled.
    pub fn eval_feed(&self) -> Feed<'_> {
        self.feed(1.0)
    }
}

/// Source-only batch for pure translation; no target side exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBatch {
    pub source_ids: Vec<Vec<usize>>,
    pub source_lengths: Vec<usize>,
}

impl SourceBatch {
    pub fn size(&self) -> usize {
        self.source_ids.len()
    }

    pub fn feed(&self, max_unroll: usize) -> Feed<'_> {
        Feed {
            source_ids: &self.source_ids,
            source_lengths: &self.source_lengths,
            target_ids: &[],
            target_lengths: &[],
            decoder_input_ids: &[],
            batch_size: self.size(),
            max_unroll,
            keep_prob: 1.0,
        }
    }
}

/// Everything one runtime call consumes.
#[derive(Debug, Clone, Copy)]
pub struct Feed<'a> {
    pub source_ids: &'a [Vec<usize>],
    pub source_lengths: &'a [usize],
    pub target_ids: &'a [Vec<usize>],
    pub target_lengths: &'a [usize],
    pub decoder_input_ids: &'a [Vec<usize>],
    pub batch_size: usize,
    pub max_unroll: usize,
    pub keep_prob: f64,
}

/// Which decoder path a forward pass takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeMode {
    /// Conditioned on the ground-truth previous token.
    TeacherForced,
    /// Conditioned on its own previous prediction.
    Greedy,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Batch {
        Batch {
            source_ids: vec![vec![4, 5, 2], vec![6, 2, 2]],
            target_ids: vec![vec![7, 8], vec![9, 3]],
            source_lengths: vec![3, 1],
            target_lengths: vec![2, 1],
            decoder_input_ids: vec![vec![1, 7], vec![1, 9]],
        }
    }

    #[test]
    fn test_feed_uses_longest_target_as_unroll() {
        let batch = sample();
        let feed = batch.feed(0.8);
        assert_eq!(feed.batch_size, 2);
        assert_eq!(feed.max_unroll, 2);
        assert_eq!(feed.keep_prob, 0.8);
    }

    #[test]
    fn test_eval_feed_disables_dropout() {
        assert_eq!(sample().eval_feed().keep_prob, 1.0);
    }
}
