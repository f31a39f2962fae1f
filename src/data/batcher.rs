// ============================================================
// Layer 4 — Batch Generator
// ============================================================
// Turns sorted sentence pairs into padded rectangular batches.
//
// How batching works here:
//   Stream the pairs in corpus order, look every token up
//   (unseen -> unknown id), and collect rows until batch_size
//   rows are pending. Then:
//
//     1. pad source rows with the SOURCE end id
//     2. pad target rows with the TARGET end id
//     3. decoder input = ([start] + padded target)[..max_tgt]
//
//   and emit. Whatever is pending at the end is flushed as one
//   smaller batch. Single-batch mode never flushes early, so the
//   whole input becomes one batch (evaluation samples).
//
//   Example, batch of 2, target end id 3, start id 1:
//     targets   [7, 8]    [9]
//     padded    [7, 8]    [9, 3]       lengths [2, 1]
//     decoder   [1, 7]    [1, 9]
//
// Source padding and target padding use their own end ids: the
// two vocabularies are independent id spaces.

use crate::domain::batch::{Batch, SentencePair, SourceBatch};
use crate::domain::error::DataError;
use crate::domain::vocabulary::VocabularyPair;

/// Right-pad every row to the longest row's length in place.
/// Returns the original lengths.
pub fn pad_matrix(matrix: &mut [Vec<usize>], pad: usize) -> Vec<usize> {
    let lengths: Vec<usize> = matrix.iter().map(Vec::len).collect();
    let max_len = lengths.iter().copied().max().unwrap_or(0);
    for row in matrix.iter_mut() {
        row.resize(max_len, pad);
    }
    lengths
}

/// Teacher-forcing input: the padded target shifted right by one.
pub fn shift_right(padded_targets: &[Vec<usize>], start_id: usize) -> Vec<Vec<usize>> {
    padded_targets
        .iter()
        .map(|row| {
            let mut shifted = Vec::with_capacity(row.len());
            if !row.is_empty() {
                shifted.push(start_id);
                shifted.extend_from_slice(&row[..row.len() - 1]);
            }
            shifted
        })
        .collect()
}

/// Accumulates id rows and finalises them into a `Batch`.
struct PendingBatch<'v> {
    vocab:   &'v VocabularyPair,
    sources: Vec<Vec<usize>>,
    targets: Vec<Vec<usize>>,
}

impl<'v> PendingBatch<'v> {
    fn new(vocab: &'v VocabularyPair) -> Self {
        Self { vocab, sources: Vec::new(), targets: Vec::new() }
    }

    fn push(&mut self, pair: &SentencePair) {
        let v = self.vocab;
        self.sources.push(v.source.encode(&pair.source, v.source_unknown_id));
        self.targets.push(v.target.encode(&pair.target, v.target_unknown_id));
    }

    fn len(&self) -> usize {
        self.sources.len()
    }

    fn take(&mut self) -> Batch {
        let mut source_ids = std::mem::take(&mut self.sources);
        let mut target_ids = std::mem::take(&mut self.targets);

        let source_lengths = pad_matrix(&mut source_ids, self.vocab.source_end_id);
        let target_lengths = pad_matrix(&mut target_ids, self.vocab.target_end_id);
        let decoder_input_ids = shift_right(&target_ids, self.vocab.target_start_id);

        Batch {
            source_ids,
            target_ids,
            source_lengths,
            target_lengths,
            decoder_input_ids,
        }
    }
}

/// Greedily cut `pairs` into batches of `batch_size`, flushing the
/// remainder as a final smaller batch.
pub fn make_batches(pairs: &[SentencePair], vocab: &VocabularyPair, batch_size: usize) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut pending = PendingBatch::new(vocab);

    for pair in pairs {
        pending.push(pair);
        if pending.len() == batch_size {
            batches.push(pending.take());
        }
    }
    if pending.len() > 0 {
        batches.push(pending.take());
    }

    tracing::debug!("Built {} batches from {} pairs", batches.len(), pairs.len());
    batches
}

/// The whole input as one batch.
pub fn single_batch(pairs: &[SentencePair], vocab: &VocabularyPair) -> Result<Batch, DataError> {
    if pairs.is_empty() {
        return Err(DataError::EmptyBatch);
    }
    let mut pending = PendingBatch::new(vocab);
    for pair in pairs {
        pending.push(pair);
    }
    Ok(pending.take())
}

/// Inference path: id-map source sentences, drop the ones over
/// `max_len`, and chunk into source-only batches.
pub fn make_source_batches(
    sentences: &[Vec<String>],
    vocab: &VocabularyPair,
    batch_size: usize,
    max_len: usize,
) -> Vec<SourceBatch> {
    let rows: Vec<Vec<usize>> = sentences
        .iter()
        .filter(|s| s.len() <= max_len)
        .map(|s| vocab.source.encode(s, vocab.source_unknown_id))
        .collect();

    let skipped = sentences.len() - rows.len();
    if skipped > 0 {
        tracing::warn!("Skipped {} input sentences longer than {} tokens", skipped, max_len);
    }

    rows.chunks(batch_size.max(1))
        .map(|chunk| {
            let mut source_ids = chunk.to_vec();
            let source_lengths = pad_matrix(&mut source_ids, vocab.source_end_id);
            SourceBatch { source_ids, source_lengths }
        })
        .collect()
}
