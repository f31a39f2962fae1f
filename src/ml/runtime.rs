// ============================================================
// Layer 5 — Burn Runtime
// ============================================================
// The concrete TranslationRuntime: owns the encoder-decoder, the
// Adam optimiser and the manifest it was built from.
//
// Key Burn insight (same split as any Burn training loop):
//   - train_step runs on B (Autodiff<...>) so gradients exist
//   - decode and the scheduled-sampling look-ahead run on
//     model.valid(), i.e. B::InnerBackend, with no graph recorded
//
// Scheduled sampling: when teacher_forcing < 1, the model first
// predicts every target position from the gold decoder inputs,
// then mix_decoder_inputs swaps gold tokens for those predictions
// and the gradient step runs on the mixed inputs.

use std::path::Path;

use anyhow::{ensure, Result};
use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::batch::{DecodeMode, Feed};
use crate::domain::traits::{NamedParameter, TranslationRuntime};
use crate::domain::vocabulary::EmbeddingMatrix;
use crate::infra::checkpoint::{CheckpointManager, ModelManifest};
use crate::ml::model::{id_rows, ids_tensor, loss_mask, masked_cross_entropy, Seq2SeqModel};
use crate::ml::sampling::mix_decoder_inputs;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub struct BurnRuntime<B: AutodiffBackend, O> {
    model:     Seq2SeqModel<B>,
    optimizer: O,
    manifest:  ModelManifest,
    device:    B::Device,
}

/// Where the initial weights come from.
pub enum WeightSource<'a> {
    /// Random initialisation over the configured range.
    Random,
    /// Stored source and target embedding tables.
    Pretrained(&'a EmbeddingMatrix, &'a EmbeddingMatrix),
    /// A previously saved checkpoint.
    Checkpoint(&'a CheckpointManager),
}

/// Build the model and an Adam optimiser with optional global-norm
/// gradient clipping.
pub fn open_runtime<B: AutodiffBackend>(
    manifest:      ModelManifest,
    weights:       WeightSource<'_>,
    gradient_clip: Option<f64>,
    device:        B::Device,
) -> Result<BurnRuntime<B, impl Optimizer<Seq2SeqModel<B>, B>>> {
    let model: Seq2SeqModel<B> = match weights {
        WeightSource::Random => manifest.model.init(&device),
        WeightSource::Pretrained(source, target) => {
            manifest.model.init_with_embeddings(source, target, &device)
        }
        WeightSource::Checkpoint(checkpoint) => checkpoint.load_model(&manifest, &device)?,
    };
    tracing::info!(
        "Model ready: {} layers, d_model={}, heads={}, vocab {}→{}",
        manifest.model.num_layers,
        manifest.model.d_model,
        manifest.model.num_heads,
        manifest.model.src_vocab_size,
        manifest.model.tgt_vocab_size
    );

    let optim_cfg = AdamConfig::new()
        .with_epsilon(1e-8)
        .with_grad_clipping(gradient_clip.map(|c| GradientClippingConfig::Norm(c as f32)));
    let optimizer = optim_cfg.init();

    Ok(BurnRuntime::new(model, optimizer, manifest, device))
}

impl<B, O> BurnRuntime<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Seq2SeqModel<B>, B>,
{
    pub fn new(model: Seq2SeqModel<B>, optimizer: O, manifest: ModelManifest, device: B::Device) -> Self {
        let model = if manifest.train_embedding { model } else { model.freeze_embeddings() };
        Self { model, optimizer, manifest, device }
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    /// Argmax of every target position, conditioned on the gold inputs.
    fn predict_teacher_forced(&self, feed: &Feed<'_>) -> Vec<Vec<usize>> {
        let model = self.model.valid();
        let source = ids_tensor::<B::InnerBackend>(feed.source_ids, &self.device);
        let input = ids_tensor::<B::InnerBackend>(feed.decoder_input_ids, &self.device);
        let [batch, width] = input.dims();
        let logits = model.forward(source, feed.source_lengths, input, 1.0);
        id_rows(logits.argmax(2).reshape([batch, width]))
    }
}

impl<B, O> TranslationRuntime for BurnRuntime<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Seq2SeqModel<B>, B>,
{
    fn train_step(&mut self, feed: &Feed<'_>, teacher_forcing: f64, learning_rate: f64) -> Result<f64> {
        ensure!(feed.batch_size > 0, "Cannot train on an empty batch");

        let decoder_rows = if teacher_forcing >= 1.0 {
            feed.decoder_input_ids.to_vec()
        } else {
            let predicted = self.predict_teacher_forced(feed);
            mix_decoder_inputs(feed.decoder_input_ids, &predicted, teacher_forcing, &mut rand::thread_rng())
        };

        let source = ids_tensor::<B>(feed.source_ids, &self.device);
        let decoder_input = ids_tensor::<B>(&decoder_rows, &self.device);
        let targets = ids_tensor::<B>(feed.target_ids, &self.device);
        let width = targets.dims()[1];
        let (mask, count) = loss_mask(feed.target_lengths, width);
        let mask = Tensor::<B, 1>::from_floats(mask.as_slice(), &self.device).reshape([feed.batch_size, width]);

        let logits = self.model.forward(source, feed.source_lengths, decoder_input, feed.keep_prob);
        let loss = masked_cross_entropy(logits, targets, mask, count);
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
        if loss_val.is_nan() {
            // Parameters stay as they were; the caller aborts the run.
            return Ok(loss_val);
        }

        // Backward pass + Adam update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optimizer.step(learning_rate, self.model.clone(), grads);
        Ok(loss_val)
    }

    fn decode(&self, feed: &Feed<'_>, mode: DecodeMode) -> Result<Vec<Vec<usize>>> {
        if feed.batch_size == 0 {
            return Ok(Vec::new());
        }
        match mode {
            DecodeMode::TeacherForced => {
                ensure!(
                    !feed.decoder_input_ids.is_empty(),
                    "Teacher-forced decoding needs reference decoder inputs"
                );
                Ok(self.predict_teacher_forced(feed))
            }
            DecodeMode::Greedy => {
                let model = self.model.valid();
                let source = ids_tensor::<B::InnerBackend>(feed.source_ids, &self.device);
                Ok(model.greedy(source, feed.source_lengths, self.manifest.start_id, feed.max_unroll))
            }
        }
    }

    fn parameters(&self) -> Vec<NamedParameter> {
        self.model.named_parameters()
    }

    fn save(&self, dir: &Path) -> Result<()> {
        CheckpointManager::new(dir).save(&self.model, &self.manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::Batch;
    use crate::ml::model::Seq2SeqConfig;
    use burn::backend::{Autodiff, NdArray};
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn manifest(train_embedding: bool) -> ModelManifest {
        ModelManifest {
            model: Seq2SeqConfig::new(5, 6, 8, -0.1, 0.1).with_num_heads(2).with_num_layers(1),
            start_id: 3,
            end_id: 4,
            train_embedding,
        }
    }

    fn batch() -> Batch {
        Batch {
            source_ids: vec![vec![1, 2, 3], vec![2, 4, 4]],
            target_ids: vec![vec![1, 2, 5], vec![2, 4, 4]],
            source_lengths: vec![3, 1],
            target_lengths: vec![3, 1],
            decoder_input_ids: vec![vec![3, 1, 2], vec![3, 2, 4]],
        }
    }

    #[test]
    fn test_train_step_returns_finite_loss_and_updates() {
        let mut runtime =
            open_runtime::<TestBackend>(manifest(true), WeightSource::Random, Some(1.0), Default::default()).unwrap();
        let before = runtime.parameters();
        let b = batch();

        let loss = runtime.train_step(&b.feed(0.9), 1.0, 1e-2).unwrap();
        assert!(loss.is_finite() && loss > 0.0);
        assert_ne!(runtime.parameters(), before);

        let loss = runtime.train_step(&b.feed(1.0), 0.5, 1e-2).unwrap();
        assert!(loss.is_finite());
    }

    #[test]
    fn test_decode_shapes_follow_feed() {
        let runtime =
            open_runtime::<TestBackend>(manifest(true), WeightSource::Random, None, Default::default()).unwrap();
        let b = batch();

        let forced = runtime.decode(&b.eval_feed(), DecodeMode::TeacherForced).unwrap();
        let greedy = runtime.decode(&b.eval_feed(), DecodeMode::Greedy).unwrap();
        for out in [forced, greedy] {
            assert_eq!(out.len(), 2);
            assert!(out.iter().all(|row| row.len() == 3 && row.iter().all(|&id| id < 6)));
        }
    }

    #[test]
    fn test_frozen_embeddings_do_not_move() {
        let mut runtime =
            open_runtime::<TestBackend>(manifest(false), WeightSource::Random, None, Default::default()).unwrap();
        let before = runtime.parameters();
        runtime.train_step(&batch().feed(1.0), 1.0, 1e-2).unwrap();
        let after = runtime.parameters();

        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[1]);
        assert_ne!(after.last(), before.last());
    }

    #[test]
    fn test_save_and_reopen_from_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let runtime =
            open_runtime::<TestBackend>(manifest(true), WeightSource::Random, None, Default::default()).unwrap();
        runtime.save(tmp.path()).unwrap();

        let ckpt = CheckpointManager::new(tmp.path());
        let restored = open_runtime::<TestBackend>(
            ckpt.load_manifest().unwrap(),
            WeightSource::Checkpoint(&ckpt),
            None,
            Default::default(),
        )
        .unwrap();
        assert_eq!(restored.parameters(), runtime.parameters());
        assert_eq!(restored.manifest().end_id, 4);
    }
}
