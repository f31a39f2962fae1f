// ============================================================
// Layer 4 — Corpus Coupler
// ============================================================
// Reads two parallel files line by line and zips them into
// sentence pairs.
//
//   line -> tokens   split on the delimiter; a line without the
//                    delimiter is a one-token sentence
//   zip              both files must have the same line count
//   filter           drop a pair when either side is longer than
//                    the maximum sentence length
//   sort             (target length, source length) ascending, so
//                    neighbouring pairs have similar lengths and
//                    batches carry little padding. Target length is
//                    the primary key: decoder unrolling dominates.
//
// The dev corpus goes through the same steps except the sort.

use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::domain::batch::SentencePair;
use crate::domain::error::DataError;

/// Split one line into tokens.
pub fn tokenize_line(line: &str, delimiter: &str) -> Vec<String> {
    let line = line.trim();
    if !delimiter.is_empty() && line.contains(delimiter) {
        line.split(delimiter).map(str::to_string).collect()
    } else {
        vec![line.to_string()]
    }
}

/// Read every line of a corpus file as a token sequence.
pub fn read_sentences(path: &Path, delimiter: &str) -> Result<Vec<Vec<String>>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
    Ok(text.lines().map(|line| tokenize_line(line, delimiter)).collect())
}

/// Zip two token-sequence lists, keeping pairs within `max_len`.
pub fn couple(
    source: Vec<Vec<String>>,
    target: Vec<Vec<String>>,
    max_len: usize,
) -> Result<Vec<SentencePair>, DataError> {
    if source.len() != target.len() {
        return Err(DataError::LengthMismatch {
            source_lines: source.len(),
            target_lines: target.len(),
        });
    }

    Ok(source
        .into_iter()
        .zip(target)
        .filter(|(s, t)| s.len() <= max_len && t.len() <= max_len)
        .map(|(s, t)| SentencePair::new(s, t))
        .collect())
}

/// Stable sort by (target length, source length).
pub fn sort_for_batching(pairs: &mut [SentencePair]) {
    pairs.sort_by_key(|p| (p.target.len(), p.source.len()));
}

/// Training corpus: read, zip, filter and sort.
pub fn couple_files(
    source_path: &Path,
    target_path: &Path,
    max_len: usize,
    delimiter: &str,
) -> Result<Vec<SentencePair>> {
    let source = read_sentences(source_path, delimiter)?;
    let target = read_sentences(target_path, delimiter)?;
    let read = source.len();

    let mut pairs = couple(source, target, max_len).with_context(|| {
        format!(
            "Cannot pair '{}' with '{}'",
            source_path.display(),
            target_path.display()
        )
    })?;
    sort_for_batching(&mut pairs);

    tracing::info!("Sentences read from training files: {}", read);
    tracing::info!("Sentences accepted from training files: {}", pairs.len());
    Ok(pairs)
}

/// Dev corpus: same as training but order is kept.
pub fn couple_dev_files(
    source_path: &Path,
    target_path: &Path,
    max_len: usize,
    delimiter: &str,
) -> Result<Vec<SentencePair>> {
    let source = read_sentences(source_path, delimiter)?;
    let target = read_sentences(target_path, delimiter)?;
    let read = source.len();

    let pairs = couple(source, target, max_len).with_context(|| {
        format!(
            "Cannot pair dev files '{}' and '{}'",
            source_path.display(),
            target_path.display()
        )
    })?;

    tracing::info!("Sentences read from dev files: {}", read);
    tracing::info!("Sentences accepted from dev files: {}", pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn toks(s: &str) -> Vec<String> {
        tokenize_line(s, " ")
    }

    #[test]
    fn test_line_without_delimiter_is_one_token() {
        assert_eq!(tokenize_line("hello\n", " "), vec!["hello".to_string()]);
        assert_eq!(tokenize_line("a|b", "|"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_mismatched_line_counts_fail() {
        let err = couple(vec![toks("a b")], vec![toks("x"), toks("y")], 10).unwrap_err();
        assert_eq!(err, DataError::LengthMismatch { source_lines: 1, target_lines: 2 });
    }

    #[test]
    fn test_long_pairs_are_filtered() {
        let pairs = couple(
            vec![toks("a b c"), toks("a")],
            vec![toks("x"), toks("x y z w")],
            3,
        )
        .unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source.len(), 3);
    }

    #[test]
    fn test_sort_uses_target_then_source_length() {
        let mut pairs = vec![
            SentencePair::new(toks("a b c"), toks("x y")),
            SentencePair::new(toks("a"), toks("x y")),
            SentencePair::new(toks("a b"), toks("x")),
        ];
        sort_for_batching(&mut pairs);
        let lens: Vec<_> = pairs.iter().map(|p| (p.target.len(), p.source.len())).collect();
        assert_eq!(lens, vec![(1, 2), (2, 1), (2, 3)]);
    }

    #[test]
    fn test_couple_files_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("train.vi");
        let tgt = dir.path().join("train.en");
        writeln!(fs::File::create(&src).unwrap(), "xin chao\ncam on ban").unwrap();
        writeln!(fs::File::create(&tgt).unwrap(), "hello there\nthanks").unwrap();

        let pairs = couple_files(&src, &tgt, 50, " ").unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].target, vec!["thanks".to_string()]);
    }

    fn sentence() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,3}", 1..8)
    }

    proptest! {
        #[test]
        fn prop_equal_counts_never_fail_and_stay_sorted(
            rows in prop::collection::vec((sentence(), sentence()), 0..30),
            max_len in 1usize..8,
        ) {
            let (source, target): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
            let mut pairs = couple(source, target, max_len).unwrap();
            sort_for_batching(&mut pairs);

            for p in &pairs {
                prop_assert!(p.source.len() <= max_len && p.target.len() <= max_len);
            }
            for w in pairs.windows(2) {
                let a = (w[0].target.len(), w[0].source.len());
                let b = (w[1].target.len(), w[1].source.len());
                prop_assert!(a <= b);
            }
        }

        #[test]
        fn prop_unequal_counts_always_fail(
            source in prop::collection::vec(sentence(), 0..10),
            extra in 1usize..4,
        ) {
            let target: Vec<_> = (0..source.len() + extra).map(|_| vec!["x".to_string()]).collect();
            prop_assert!(couple(source, target, 50).is_err());
        }
    }
}
