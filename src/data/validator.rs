// ============================================================
// Layer 4 — Batch Validator
// ============================================================
// A batch must be rectangular: one row per sentence in every
// matrix and length list, every row of a matrix as wide as its
// first, and decoder inputs as wide as the targets. Every id must
// also be inside its side's vocabulary.
// Batches straight from the generator always pass; the check
// exists for cached batch files that were built against a
// different vocabulary or written by hand. It runs once per
// batch, before any training step sees it.

use crate::domain::batch::Batch;
use crate::domain::error::DataError;
use crate::domain::vocabulary::VocabularyPair;

fn check_rows(rows: &[Vec<usize>], bound: usize, structure: &'static str) -> Result<(), DataError> {
    match rows.iter().flatten().find(|&&id| id >= bound) {
        Some(&id) => Err(DataError::IdOutOfRange { structure, id, bound }),
        None => Ok(()),
    }
}

fn check_row_count(found: usize, expected: usize, structure: &'static str) -> Result<(), DataError> {
    if found == expected {
        Ok(())
    } else {
        Err(DataError::BatchRowCount { structure, found, expected })
    }
}

/// Every row `width` wide; returns the first ragged row.
fn check_width(rows: &[Vec<usize>], width: usize, structure: &'static str) -> Result<(), DataError> {
    match rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        Some((row, r)) => Err(DataError::RaggedBatch { structure, row, found: r.len(), expected: width }),
        None => Ok(()),
    }
}

fn check_shape(batch: &Batch) -> Result<(), DataError> {
    let rows = batch.source_ids.len();
    check_row_count(batch.target_ids.len(), rows, "target ids")?;
    check_row_count(batch.decoder_input_ids.len(), rows, "decoder input ids")?;
    check_row_count(batch.source_lengths.len(), rows, "source lengths")?;
    check_row_count(batch.target_lengths.len(), rows, "target lengths")?;

    let source_width = batch.source_ids.first().map_or(0, Vec::len);
    let target_width = batch.target_ids.first().map_or(0, Vec::len);
    check_width(&batch.source_ids, source_width, "source ids")?;
    check_width(&batch.target_ids, target_width, "target ids")?;
    check_width(&batch.decoder_input_ids, target_width, "decoder input ids")?;
    Ok(())
}

pub fn check_batch_validity(batch: &Batch, vocab: &VocabularyPair) -> Result<(), DataError> {
    check_shape(batch)?;

    let source_bound = vocab.source.len();
    let target_bound = vocab.target.len();

    check_rows(&batch.source_ids, source_bound, "source ids")?;
    check_rows(&batch.target_ids, target_bound, "target ids")?;
    check_rows(&batch.decoder_input_ids, target_bound, "decoder input ids")?;
    Ok(())
}

/// Validate a whole batch list, reporting which batch failed.
pub fn check_all(batches: &[Batch], vocab: &VocabularyPair) -> anyhow::Result<()> {
    for (index, batch) in batches.iter().enumerate() {
        check_batch_validity(batch, vocab)
            .map_err(|e| anyhow::anyhow!("Batch {} is invalid: {}", index, e))?;
    }
    tracing::debug!("Validated {} batches", batches.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::{make_batches, tests::toy_vocab};
    use crate::domain::batch::SentencePair;

    fn batches() -> Vec<Batch> {
        let pairs = vec![
            SentencePair::new(vec!["a".into(), "b".into()], vec!["x".into()]),
            SentencePair::new(vec!["c".into()], vec!["y".into(), "z".into()]),
        ];
        make_batches(&pairs, &toy_vocab(), 2)
    }

    #[test]
    fn test_generated_batches_are_valid() {
        let vocab = toy_vocab();
        for b in batches() {
            assert!(check_batch_validity(&b, &vocab).is_ok());
        }
    }

    #[test]
    fn test_out_of_range_source_id_is_reported() {
        let vocab = toy_vocab();
        let mut b = batches().remove(0);
        b.source_ids[1][0] = 5;
        assert_eq!(
            check_batch_validity(&b, &vocab).unwrap_err(),
            DataError::IdOutOfRange { structure: "source ids", id: 5, bound: 5 }
        );
    }

    #[test]
    fn test_out_of_range_decoder_input_is_reported() {
        let vocab = toy_vocab();
        let mut b = batches().remove(0);
        b.decoder_input_ids[0][1] = 42;
        let err = check_batch_validity(&b, &vocab).unwrap_err();
        assert!(matches!(err, DataError::IdOutOfRange { structure: "decoder input ids", id: 42, bound: 6 }));
    }

    #[test]
    fn test_ragged_row_is_reported() {
        let vocab = toy_vocab();
        let mut b = batches().remove(0);
        b.target_ids[1].push(1);
        assert_eq!(
            check_batch_validity(&b, &vocab).unwrap_err(),
            DataError::RaggedBatch { structure: "target ids", row: 1, found: 3, expected: 2 }
        );
    }

    #[test]
    fn test_decoder_input_must_match_target_width() {
        let vocab = toy_vocab();
        let mut b = batches().remove(0);
        for row in &mut b.decoder_input_ids {
            row.pop();
        }
        let err = check_batch_validity(&b, &vocab).unwrap_err();
        assert!(matches!(err, DataError::RaggedBatch { structure: "decoder input ids", row: 0, found: 1, expected: 2 }));
    }

    #[test]
    fn test_missing_length_entry_is_reported() {
        let vocab = toy_vocab();
        let mut b = batches().remove(0);
        b.source_lengths.pop();
        assert_eq!(
            check_batch_validity(&b, &vocab).unwrap_err(),
            DataError::BatchRowCount { structure: "source lengths", found: 1, expected: 2 }
        );
    }

    #[test]
    fn test_check_all_names_the_batch() {
        let vocab = toy_vocab();
        let mut all = batches();
        all[0].target_ids[0][0] = 99;
        let msg = check_all(&all, &vocab).unwrap_err().to_string();
        assert!(msg.contains("Batch 0"));
    }
}
