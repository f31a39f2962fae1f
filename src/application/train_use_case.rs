// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Read vocabularies / embeddings     (Layer 4 + 6)
//   Step 2: Load cached batches, or couple the
//           training files and batch them      (Layer 4 + 6)
//   Step 3: Validate every batch               (Layer 4)
//   Step 4: Pick the evaluation sample         (Layer 4)
//   Step 5: Open the runtime                   (Layer 5)
//   Step 6: Evaluate once before training      (Layer 5)
//   Step 7: Run the training loop              (Layer 5)
//   Step 8: Save checkpoint (+ batch cache)    (Layer 6)

use anyhow::{Context, Result};
use rand::Rng;

use crate::application::config::RunConfig;
use crate::application::session::{load_vocabularies, open_training_runtime};
use crate::data::{
    batcher::{make_batches, single_batch},
    corpus::{couple_dev_files, couple_files},
    sampler::{pick_display_rows, sample_batch, sample_pairs},
    validator::{check_all, check_batch_validity},
    vocab_builder::VocabularyBundle,
};
use crate::domain::batch::{Batch, SentencePair};
use crate::domain::traits::TranslationRuntime;
use crate::domain::vocabulary::VocabularyPair;
use crate::infra::{
    batch_cache::{load_batches, save_batches},
    bleu::CorpusBleu,
    metrics::MetricsLogger,
};
use crate::ml::evaluator::SampleEvaluator;
use crate::ml::trainer::{train, TrainingState};

pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingState> {
        let bundle = load_vocabularies(&self.config)?;
        let mut runtime = open_training_runtime(&self.config, &bundle)?;
        self.run(&mut runtime, &bundle, &mut rand::thread_rng())
    }

    /// Steps 2–8 against any runtime.
    pub fn run<R, G>(&self, runtime: &mut R, bundle: &VocabularyBundle, rng: &mut G) -> Result<TrainingState>
    where
        R: TranslationRuntime,
        G: Rng,
    {
        let cfg = &self.config;
        let vocab = &bundle.vocab;

        // ── Step 2: batches ──────────────────────────────────────────────────
        let (batches, pairs) = self.load_or_build_batches(vocab)?;

        // ── Step 3: validation ───────────────────────────────────────────────
        check_all(&batches, vocab)?;

        // ── Step 4: evaluation sample ────────────────────────────────────────
        let sample = self.evaluation_sample(vocab, &batches, pairs.as_deref(), rng)?;
        check_batch_validity(&sample, vocab).context("Evaluation sample is invalid")?;
        tracing::info!("Evaluation sample: {} sentence pairs", sample.size());

        let display_rows = pick_display_rows(sample.size(), rng);
        let evaluator = SampleEvaluator::new(sample, vocab, CorpusBleu, display_rows, cfg.evaluation_step);
        let metrics = MetricsLogger::new(cfg.metrics_file()?)?;

        // ── Step 6: baseline evaluation ──────────────────────────────────────
        let baseline = evaluator.run(0, &[], &*runtime)?;
        metrics.log(&(&baseline).into())?;

        // ── Step 7: training loop ────────────────────────────────────────────
        let options = cfg.training_options();
        let state = train(runtime, &batches, &options, TrainingState::default(), |epoch, losses, rt| {
            let report = evaluator.run(epoch, losses, rt)?;
            metrics.log(&(&report).into())?;
            let path = report.next_decoder_path(cfg.train_greedy);
            tracing::debug!("Decoder path until next evaluation: {:?}", path);
            Ok(path)
        })?;

        // ── Step 8: persist ──────────────────────────────────────────────────
        let checkpoint_dir = cfg.checkpoint_dir()?;
        runtime.save(&checkpoint_dir)?;
        if cfg.save_batch {
            save_batches(&cfg.batch_file_to_write()?, &batches)?;
        }

        tracing::info!(
            "Training finished after {} steps; metrics in '{}'",
            state.global_step,
            metrics.csv_path().display()
        );
        Ok(state)
    }

    /// Cached batches skip corpus processing; the pairs are only
    /// available when the corpus was actually read.
    fn load_or_build_batches(&self, vocab: &VocabularyPair) -> Result<(Vec<Batch>, Option<Vec<SentencePair>>)> {
        let cfg = &self.config;
        if let Some(cache) = cfg.existing_batch_file()? {
            return Ok((load_batches(&cache)?, None));
        }

        let (source, target) = cfg.file_pair(&cfg.training_file_name);
        let pairs = couple_files(&source, &target, cfg.maximum_sentence_length, &cfg.delimiter)?;
        let batches = make_batches(&pairs, vocab, cfg.batch_size);
        tracing::info!("Built {} batches of up to {} pairs", batches.len(), cfg.batch_size);
        Ok((batches, Some(pairs)))
    }

    /// The dev corpus when given; otherwise random training pairs,
    /// or a random batch when the pairs came from the cache.
    fn evaluation_sample<G: Rng>(
        &self,
        vocab: &VocabularyPair,
        batches: &[Batch],
        pairs: Option<&[SentencePair]>,
        rng: &mut G,
    ) -> Result<Batch> {
        let cfg = &self.config;
        if let Some(dev) = &cfg.dev_file_name {
            let (source, target) = cfg.file_pair(dev);
            let dev_pairs = couple_dev_files(&source, &target, cfg.maximum_sentence_length, &cfg.delimiter)?;
            return single_batch(&dev_pairs, vocab).context("Dev corpus has no usable sentence pairs");
        }

        match pairs {
            Some(pairs) => {
                let picked = sample_pairs(pairs, cfg.batch_size, rng);
                single_batch(&picked, vocab).context("Training corpus has no usable sentence pairs")
            }
            None => sample_batch(batches, rng)
                .cloned()
                .context("Batch cache holds no batches"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::ReadMode;
    use crate::application::session::load_vocabularies;
    use crate::domain::error::DataError;
    use crate::ml::trainer::tests::FakeRuntime;
    use rand::{rngs::StdRng, SeedableRng};
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, RunConfig) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("vocab.fr"), "le\nchat\nnoir\ndort\n").unwrap();
        fs::write(dir.join("vocab.en"), "the\ncat\nblack\nsleeps\n").unwrap();
        fs::write(dir.join("train.fr"), "le chat\nle chat noir\nle chat dort\nchat\n").unwrap();
        fs::write(dir.join("train.en"), "the cat\nthe black cat\nthe cat sleeps\ncat\n").unwrap();

        let config = RunConfig {
            directory: dir.to_string_lossy().into_owned(),
            src: "fr".into(),
            tgt: "en".into(),
            save_path: Some("run".into()),
            read_mode: ReadMode::Vocab,
            batch_size: 2,
            epoch: 4,
            evaluation_step: 2,
            ..RunConfig::default()
        }
        .normalise();
        (tmp, config)
    }

    #[test]
    fn test_training_run_writes_metrics_and_batch_cache() {
        let (tmp, config) = workspace();
        let config = RunConfig { save_batch: true, ..config };
        let bundle = load_vocabularies(&config).unwrap();
        let mut runtime = FakeRuntime::default();
        let mut rng = StdRng::seed_from_u64(3);

        let state = TrainUseCase::new(config).run(&mut runtime, &bundle, &mut rng).unwrap();
        assert_eq!(state.global_step, 8);
        assert_eq!(state.loss_history.len(), 4);

        // header, baseline, epochs 2 and 4
        let csv = fs::read_to_string(tmp.path().join("run.metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 4);
        assert!(tmp.path().join("run.bat").is_file());
    }

    #[test]
    fn test_cached_batches_are_reused() {
        let (tmp, config) = workspace();
        let bundle = load_vocabularies(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let first = RunConfig { save_batch: true, ..config.clone() };
        TrainUseCase::new(first).run(&mut FakeRuntime::default(), &bundle, &mut rng).unwrap();

        fs::remove_file(tmp.path().join("train.fr")).unwrap();
        let state = TrainUseCase::new(config).run(&mut FakeRuntime::default(), &bundle, &mut rng).unwrap();
        assert_eq!(state.global_step, 8);
    }

    #[test]
    fn test_ragged_cached_batch_aborts_before_training() {
        let (tmp, config) = workspace();
        let bundle = load_vocabularies(&config).unwrap();
        let first = RunConfig { save_batch: true, ..config.clone() };
        TrainUseCase::new(first)
            .run(&mut FakeRuntime::default(), &bundle, &mut StdRng::seed_from_u64(1))
            .unwrap();

        let cache = tmp.path().join("run.bat");
        let mut batches = load_batches(&cache).unwrap();
        batches[1].source_ids[0].push(1);
        save_batches(&cache, &batches).unwrap();

        let mut runtime = FakeRuntime::default();
        let err = TrainUseCase::new(config)
            .run(&mut runtime, &bundle, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(err.to_string().contains("Batch 1 is invalid"));
        assert!(runtime.steps.is_empty());
    }

    #[test]
    fn test_dev_corpus_is_used_for_evaluation() {
        let (tmp, config) = workspace();
        fs::write(tmp.path().join("dev.fr"), "le chat\n").unwrap();
        fs::write(tmp.path().join("dev.en"), "the cat\n").unwrap();
        let config = RunConfig { dev_file_name: Some("dev".into()), ..config };
        let bundle = load_vocabularies(&config).unwrap();
        let use_case = TrainUseCase::new(config);

        let sample = use_case
            .evaluation_sample(&bundle.vocab, &[], None, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(sample.size(), 1);
    }

    #[test]
    fn test_mismatched_corpus_aborts_before_training() {
        let (tmp, config) = workspace();
        fs::write(tmp.path().join("train.en"), "the cat\n").unwrap();
        let bundle = load_vocabularies(&config).unwrap();
        let mut runtime = FakeRuntime::default();

        let err = TrainUseCase::new(config)
            .run(&mut runtime, &bundle, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(err.chain().any(|e| matches!(
            e.downcast_ref::<DataError>(),
            Some(DataError::LengthMismatch { .. })
        )));
        assert!(runtime.steps.is_empty());
    }
}
