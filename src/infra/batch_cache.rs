// ============================================================
// Layer 6 — Batch Cache
// ============================================================
// The full batch list of a training run, serialised with bincode.
// A later run that finds the file skips corpus processing
// entirely; the caller must validate the loaded batches against
// the current vocabulary before training on them.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use anyhow::{Context, Result};

use crate::domain::batch::Batch;

pub fn save_batches(path: &Path, batches: &[Batch]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Cannot create batch file '{}'", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), batches)
        .with_context(|| format!("Cannot write batches to '{}'", path.display()))?;
    tracing::info!("Saved {} batches to '{}'", batches.len(), path.display());
    Ok(())
}

pub fn load_batches(path: &Path) -> Result<Vec<Batch>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open batch file '{}'", path.display()))?;
    let batches: Vec<Batch> = bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("Batch file '{}' is corrupted", path.display()))?;
    tracing::info!("Loaded {} cached batches from '{}'", batches.len(), path.display());
    Ok(batches)
}
