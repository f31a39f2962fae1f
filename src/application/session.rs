// ============================================================
// Layer 2 — Session Startup
// ============================================================
// The startup steps shared by `train` and `infer`:
//
//   Step 1: Check the save path, load or save the params file
//   Step 2: Read the vocabularies / embeddings     (Layer 4 + 6)
//   Step 3: Build the model manifest               (Layer 5)
//   Step 4: Open the runtime, restoring a checkpoint when one
//           exists at <directory>/<save_path>/      (Layer 5 + 6)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use burn::optim::Optimizer;

use crate::application::config::{ReadMode, RunConfig};
use crate::data::vocab_builder::{
    build_from_embeddings, build_from_word_lists, read_vocab_file, VocabularyBundle,
};
use crate::domain::error::ConfigError;
use crate::infra::checkpoint::{CheckpointManager, ModelManifest};
use crate::infra::embedding_file::read_embedding_file;
use crate::infra::params::{load_params, params_file_name, save_params, ParamsSelection};
use crate::ml::model::Seq2SeqModel;
use crate::ml::runtime::{open_runtime, BurnRuntime, TrainBackend, WeightSource};

/// What to do with the params file at startup.
#[derive(Debug, Clone, Default)]
pub struct ParamsOptions {
    pub load: bool,
    pub save: Option<ParamsSelection>,
    /// Defaults to `<directory>/<save_path>`.
    pub path: Option<String>,
}

impl ParamsOptions {
    fn file(&self, config: &RunConfig) -> Result<PathBuf, ConfigError> {
        let base = match &self.path {
            Some(path) => path.clone(),
            None => config.checkpoint_dir()?.to_string_lossy().into_owned(),
        };
        Ok(PathBuf::from(params_file_name(&base)))
    }
}

/// Step 1. Loading wins over saving when both are requested.
pub fn prepare_config(config: RunConfig, params: &ParamsOptions) -> Result<RunConfig> {
    config.save_path()?;
    config.validate()?;

    let config = if params.load {
        let loaded = load_params(&config, &params.file(&config)?)?;
        loaded.save_path()?;
        loaded.validate()?;
        loaded
    } else {
        if let Some(selection) = &params.save {
            save_params(&config, selection, &params.file(&config)?)?;
        }
        config
    };
    Ok(config.normalise())
}

/// Step 2.
pub fn load_vocabularies(config: &RunConfig) -> Result<VocabularyBundle> {
    let tokens = config.special_tokens();
    let (source_path, target_path) = config.file_pair(&config.embedding_file_name);

    let bundle = match config.read_mode {
        ReadMode::Embedding => {
            let source = read_embedding_file(&source_path, config.import_default_dict)?;
            let target = read_embedding_file(&target_path, config.import_default_dict)?;
            build_from_embeddings(source, target, &tokens)?
        }
        ReadMode::Vocab => {
            let source = read_vocab_file(&source_path)?;
            let target = read_vocab_file(&target_path)?;
            build_from_word_lists(source, target, &tokens)?
        }
    };

    tracing::info!(
        "Vocabularies: {} source words, {} target words",
        bundle.vocab.source.len(),
        bundle.vocab.target.len()
    );
    Ok(bundle)
}

/// Step 3. In embedding mode the model width is the embedding width.
pub fn build_manifest(config: &RunConfig, bundle: &VocabularyBundle) -> Result<ModelManifest, ConfigError> {
    let width = match (&bundle.source_embedding, &bundle.target_embedding) {
        (Some(source), Some(target)) if source.width != target.width => {
            return Err(ConfigError::EmbeddingWidthMismatch {
                source_dim: source.width,
                target_dim: target.width,
            });
        }
        (_, Some(target)) => {
            if target.width != config.size_hidden_layer {
                tracing::info!(
                    "Hidden size {} replaced by embedding width {}",
                    config.size_hidden_layer,
                    target.width
                );
            }
            target.width
        }
        _ => config.size_hidden_layer,
    };

    let vocab = &bundle.vocab;
    Ok(ModelManifest {
        model: config.model_config(vocab.source.len(), vocab.target.len(), width)?,
        start_id: vocab.target_start_id,
        end_id: vocab.target_end_id,
        train_embedding: config.train_embedding,
    })
}

/// Step 4. A stored checkpoint must match the vocabulary sizes of
/// this run; its manifest replaces the freshly built one.
pub fn open_training_runtime(
    config: &RunConfig,
    bundle: &VocabularyBundle,
) -> Result<BurnRuntime<TrainBackend, impl Optimizer<Seq2SeqModel<TrainBackend>, TrainBackend>>> {
    let manifest = build_manifest(config, bundle)?;
    let checkpoint = CheckpointManager::new(config.checkpoint_dir()?);
    let device = Default::default();

    if checkpoint.exists() {
        let stored = restored_manifest(&checkpoint, &manifest)?;
        tracing::info!("Resuming from checkpoint '{}'", checkpoint.dir().display());
        return open_runtime::<TrainBackend>(
            stored,
            WeightSource::Checkpoint(&checkpoint),
            config.gradient_clip,
            device,
        );
    }

    let weights = match (&bundle.source_embedding, &bundle.target_embedding) {
        (Some(source), Some(target)) => WeightSource::Pretrained(source, target),
        _ => WeightSource::Random,
    };
    open_runtime::<TrainBackend>(manifest, weights, config.gradient_clip, device)
}

/// Inference needs a trained checkpoint; there is nothing to fall back to.
pub fn open_inference_runtime(
    config: &RunConfig,
    bundle: &VocabularyBundle,
) -> Result<BurnRuntime<TrainBackend, impl Optimizer<Seq2SeqModel<TrainBackend>, TrainBackend>>> {
    let manifest = build_manifest(config, bundle)?;
    let checkpoint = CheckpointManager::new(config.checkpoint_dir()?);
    if !checkpoint.exists() {
        bail!(
            "No checkpoint at '{}'. Train a model with this save path first.",
            checkpoint.dir().display()
        );
    }
    let stored = restored_manifest(&checkpoint, &manifest)?;
    open_runtime::<TrainBackend>(stored, WeightSource::Checkpoint(&checkpoint), None, Default::default())
}

fn restored_manifest(checkpoint: &CheckpointManager, current: &ModelManifest) -> Result<ModelManifest> {
    let mut stored = checkpoint.load_manifest()?;
    let sizes = |m: &ModelManifest| (m.model.src_vocab_size, m.model.tgt_vocab_size);
    if sizes(&stored) != sizes(current) {
        bail!(
            "Checkpoint '{}' was trained with vocabularies of size {:?}, this run has {:?}",
            checkpoint.dir().display(),
            sizes(&stored),
            sizes(current)
        );
    }
    stored.train_embedding = current.train_embedding;
    Ok(stored)
}
