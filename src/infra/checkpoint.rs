// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the network with Burn's CompactRecorder.
//
// One checkpoint is one directory:
//
//   <directory>/<save_path>/
//     model.mpk.gz     ← every learned parameter (MessagePack + gzip)
//     manifest.json    ← ModelManifest: how to rebuild the network
//
// The manifest is the typed registry of everything a restored run
// needs before weights can be loaded into it: the model options
// (vocabulary sizes, width, depth, heads) and the special-token
// ids the decoder is driven with. The network is rebuilt from it
// first, then the record is loaded; a shape mismatch fails the load.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::ml::model::{Seq2SeqConfig, Seq2SeqModel};

const MODEL_FILE: &str = "model";
const MANIFEST_FILE: &str = "manifest.json";

/// Everything needed to rebuild a runtime around saved weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model:           Seq2SeqConfig,
    /// Target id fed as the first decoder input.
    pub start_id:        usize,
    /// Target id that terminates a decoded sentence.
    pub end_id:          usize,
    /// When false, both embedding tables are frozen.
    pub train_embedding: bool,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A checkpoint is usable once its manifest has been written.
    pub fn exists(&self) -> bool {
        self.dir.join(MANIFEST_FILE).is_file()
    }

    pub fn save<B: Backend>(&self, model: &Seq2SeqModel<B>, manifest: &ModelManifest) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", self.dir.display()))?;

        let path = self.dir.join(MODEL_FILE);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let manifest_path = self.dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Cannot write manifest to '{}'", manifest_path.display()))?;

        tracing::info!("Checkpoint saved to '{}'", self.dir.display());
        Ok(())
    }

    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let path = self.dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read manifest '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Manifest '{}' is malformed", path.display()))
    }

    /// Rebuild the network from `manifest` and load the saved weights into it.
    pub fn load_model<B: Backend>(&self, manifest: &ModelManifest, device: &B::Device) -> Result<Seq2SeqModel<B>> {
        let path = self.dir.join(MODEL_FILE);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Has this model been trained?", path.display())
            })?;

        tracing::info!("Restored weights from '{}'", self.dir.display());
        Ok(manifest.model.init::<B>(device).load_record(record))
    }
}
