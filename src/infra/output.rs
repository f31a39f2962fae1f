// ============================================================
// Layer 6 — Inference Output Writer
// ============================================================
// One decoded sentence per line, cut at the first end token.
// Words come from the target id → word table; an id with no word
// aborts the write instead of being replaced by the unknown word.
// With `leave_as_index` the raw ids are written instead.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};

use crate::domain::vocabulary::Vocabulary;
use crate::ml::evaluator::{render, strip};

pub fn format_line(ids: &[usize], vocab: &Vocabulary, end_id: usize, leave_as_index: bool) -> Result<String> {
    let ids = strip(ids, end_id);
    if leave_as_index {
        Ok(ids.iter().map(usize::to_string).collect::<Vec<_>>().join(" "))
    } else {
        render(vocab, ids)
    }
}

pub fn write_translations(
    path: &Path,
    outputs: &[Vec<usize>],
    vocab: &Vocabulary,
    end_id: usize,
    leave_as_index: bool,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Cannot create output file '{}'", path.display()))?;
    let mut out = BufWriter::new(file);
    for (line, ids) in outputs.iter().enumerate() {
        let text = format_line(ids, vocab, end_id, leave_as_index)
            .with_context(|| format!("Output sentence {line}"))?;
        writeln!(out, "{text}")?;
    }
    out.flush()?;
    tracing::info!("Wrote {} translations to '{}'", outputs.len(), path.display());
    Ok(())
}
