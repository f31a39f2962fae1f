//! Corpus-level BLEU-4 (Papineni et al., 2002).
//!
//! Clipped n-gram precisions for n = 1..=4 are pooled over the whole
//! corpus, combined as a geometric mean and scaled by the brevity
//! penalty `exp(1 - r/c)` when the hypotheses are shorter than the
//! references. No smoothing: any zero precision gives a score of 0.

use std::collections::HashMap;

use crate::domain::traits::BleuScorer;

const MAX_ORDER: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusBleu;

impl BleuScorer for CorpusBleu {
    fn score(&self, hypotheses: &[String], references: &[String]) -> f64 {
        let mut matches = [0usize; MAX_ORDER];
        let mut totals = [0usize; MAX_ORDER];
        let mut hyp_len = 0usize;
        let mut ref_len = 0usize;

        for (hyp, reference) in hypotheses.iter().zip(references) {
            let hyp: Vec<&str> = hyp.split_whitespace().collect();
            let reference: Vec<&str> = reference.split_whitespace().collect();
            hyp_len += hyp.len();
            ref_len += reference.len();

            for n in 1..=MAX_ORDER {
                let ref_counts = ngram_counts(&reference, n);
                for (gram, count) in ngram_counts(&hyp, n) {
                    matches[n - 1] += count.min(ref_counts.get(&gram).copied().unwrap_or(0));
                }
                totals[n - 1] += hyp.len().saturating_sub(n - 1);
            }
        }

        if hyp_len == 0 || matches.iter().any(|&m| m == 0) {
            return 0.0;
        }

        let log_precision: f64 = matches
            .iter()
            .zip(&totals)
            .map(|(&m, &t)| (m as f64 / t as f64).ln())
            .sum::<f64>()
            / MAX_ORDER as f64;

        let brevity = if hyp_len >= ref_len {
            1.0
        } else {
            (1.0 - ref_len as f64 / hyp_len as f64).exp()
        };
        brevity * log_precision.exp()
    }
}

fn ngram_counts<'a>(tokens: &[&'a str], n: usize) -> HashMap<Vec<&'a str>, usize> {
    let mut counts = HashMap::new();
    for gram in tokens.windows(n) {
        *counts.entry(gram.to_vec()).or_insert(0) += 1;
    }
    counts
}
