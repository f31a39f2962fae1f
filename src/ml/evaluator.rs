// ============================================================
// Layer 5 — Evaluation / Decoding Driver
// ============================================================
// Runs a fixed sample through the runtime twice:
//
//   train  — teacher forced, conditioned on the reference
//   infer  — greedy, conditioned on its own predictions
//
// Dropout is always off (keep-prob 1.0) and the unroll bound is
// the longest reference in the sample. Both outputs are scored
// against the reference with BLEU, each row trimmed to its
// reference length, and two fixed rows are printed side by side.
//
// The gap between the two scores drives the greedy-training
// switch: when enabled and BLEU@train > BLEU@infer, training
// moves to the free-running path.

use std::time::Instant;

use anyhow::{ensure, Result};

use crate::domain::batch::{Batch, DecodeMode};
use crate::domain::traits::{BleuScorer, TranslationRuntime};
use crate::domain::vocabulary::{Vocabulary, VocabularyPair};

/// Decoded ids for every sample row, one sequence per decoder path.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub train: Vec<Vec<usize>>,
    pub infer: Vec<Vec<usize>>,
}

pub fn evaluate<R: TranslationRuntime + ?Sized>(runtime: &R, sample: &Batch) -> Result<EvaluationResult> {
    let feed = sample.eval_feed();
    Ok(EvaluationResult {
        train: runtime.decode(&feed, DecodeMode::TeacherForced)?,
        infer: runtime.decode(&feed, DecodeMode::Greedy)?,
    })
}

/// Everything before the first `end_id`; the whole sentence if absent.
pub fn strip(sentence: &[usize], end_id: usize) -> &[usize] {
    match sentence.iter().position(|&id| id == end_id) {
        Some(pos) => &sentence[..pos],
        None => sentence,
    }
}

/// Corpus BLEU over id sequences rendered as space-joined strings.
///
/// With `trim_lengths`, row i of both sides is cut to
/// `min(trim_lengths[i], len(correct[i]), len(result[i]))` first.
pub fn calculate_bleu<S: BleuScorer + ?Sized>(
    scorer: &S,
    correct: &[Vec<usize>],
    result: &[Vec<usize>],
    trim_lengths: Option<&[usize]>,
) -> Result<f64> {
    ensure!(
        correct.len() == result.len(),
        "BLEU needs one hypothesis per reference ({} vs {})",
        result.len(),
        correct.len()
    );
    if let Some(trim) = trim_lengths {
        ensure!(trim.len() == correct.len(), "One trim length per row expected");
    }

    let mut references = Vec::with_capacity(correct.len());
    let mut hypotheses = Vec::with_capacity(result.len());
    for (i, (c, r)) in correct.iter().zip(result).enumerate() {
        let (c, r) = match trim_lengths {
            Some(trim) => {
                let n = trim[i].min(c.len()).min(r.len());
                (&c[..n], &r[..n])
            }
            None => (c.as_slice(), r.as_slice()),
        };
        references.push(join_ids(c));
        hypotheses.push(join_ids(r));
    }
    Ok(scorer.score(&hypotheses, &references))
}

fn join_ids(ids: &[usize]) -> String {
    ids.iter().map(usize::to_string).collect::<Vec<_>>().join(" ")
}

/// Ids to a space-joined sentence; a missing id is a hard error.
pub fn render(vocab: &Vocabulary, ids: &[usize]) -> Result<String> {
    Ok(vocab.decode(ids)?.join(" "))
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub epoch: usize,
    pub bleu_train: f64,
    pub bleu_infer: f64,
    /// Mean of the losses since the previous evaluation.
    pub mean_loss: Option<f64>,
}

impl EvaluationReport {
    pub fn next_decoder_path(&self, train_greedy: bool) -> DecodeMode {
        if train_greedy && self.bleu_train > self.bleu_infer {
            DecodeMode::Greedy
        } else {
            DecodeMode::TeacherForced
        }
    }
}

/// The periodic evaluation the training loop calls back into.
pub struct SampleEvaluator<'v, S> {
    sample: Batch,
    vocab: &'v VocabularyPair,
    scorer: S,
    display_rows: (usize, usize),
    evaluation_step: usize,
    started: Instant,
}

impl<'v, S: BleuScorer> SampleEvaluator<'v, S> {
    pub fn new(
        sample: Batch,
        vocab: &'v VocabularyPair,
        scorer: S,
        display_rows: (usize, usize),
        evaluation_step: usize,
    ) -> Self {
        Self { sample, vocab, scorer, display_rows, evaluation_step, started: Instant::now() }
    }

    pub fn sample(&self) -> &Batch {
        &self.sample
    }

    pub fn run<R: TranslationRuntime + ?Sized>(
        &self,
        epoch: usize,
        losses: &[f64],
        runtime: &R,
    ) -> Result<EvaluationReport> {
        let result = evaluate(runtime, &self.sample)?;

        let (a, b) = self.display_rows;
        for row in [a, b] {
            if row < self.sample.size() {
                self.print_row(row, &result)?;
            }
        }

        // Raw decoded rows: an early end token must still count against the score.
        let trim = Some(self.sample.target_lengths.as_slice());
        let correct = &self.sample.target_ids;
        let bleu_train = calculate_bleu(&self.scorer, correct, &result.train, trim)?;
        let bleu_infer = calculate_bleu(&self.scorer, correct, &result.infer, trim)?;

        let window = &losses[losses.len().saturating_sub(self.evaluation_step)..];
        let mean_loss = (!window.is_empty()).then(|| window.iter().sum::<f64>() / window.len() as f64);

        println!(
            "Epoch {:>4} | {:.2}s | BLEU {:>6.2} (@train) {:>6.2} (@infer)",
            epoch,
            self.started.elapsed().as_secs_f64(),
            bleu_train * 100.0,
            bleu_infer * 100.0
        );
        println!("Losses during this cycle: {:?}", window);

        Ok(EvaluationReport { epoch, bleu_train, bleu_infer, mean_loss })
    }

    fn print_row(&self, row: usize, result: &EvaluationResult) -> Result<()> {
        let source = render(&self.vocab.source, strip(&self.sample.source_ids[row], self.vocab.source_end_id))?;
        let end_id = self.vocab.target_end_id;
        let target = &self.vocab.target;
        let reference = render(target, strip(&self.sample.target_ids[row], end_id))?;

        for (label, output) in [("TRAIN", &result.train), ("INFER", &result.infer)] {
            let decoded = match output.get(row) {
                Some(ids) => render(target, strip(ids, end_id))?,
                None => String::new(),
            };
            println!("{}\n=> {}: {}\n=  {}", source, label, decoded, reference);
        }
        Ok(())
    }
}
