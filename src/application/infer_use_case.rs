// ============================================================
// Layer 2 — InferUseCase
// ============================================================
// Translates a source-language file with a trained checkpoint:
//
//   Step 1: Read vocabularies and restore the runtime
//   Step 2: Read <input>.<src>, id-map, drop over-long lines,
//           chunk into source-only batches          (Layer 4)
//   Step 3: Greedy-decode every batch               (Layer 5)
//   Step 4: Write one translation per line          (Layer 6)
//   Step 5: If <input>.<tgt> exists, report BLEU    (Layer 5 + 6)

use std::path::PathBuf;

use anyhow::Result;

use crate::application::config::RunConfig;
use crate::application::session::{load_vocabularies, open_inference_runtime};
use crate::data::{batcher::make_source_batches, corpus::read_sentences, vocab_builder::VocabularyBundle};
use crate::domain::batch::DecodeMode;
use crate::domain::error::DataError;
use crate::domain::traits::TranslationRuntime;
use crate::infra::{bleu::CorpusBleu, output::write_translations};
use crate::ml::evaluator::{calculate_bleu, strip};

#[derive(Debug, Clone)]
pub struct InferOptions {
    /// Base name of the input; the language code is added as for training files.
    pub input_file_name: String,
    /// Defaults to `<directory>/<save_path>.out`.
    pub output: Option<PathBuf>,
    pub leave_as_index: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferReport {
    pub output: PathBuf,
    pub translated: usize,
    /// Only when a reference file sits next to the input.
    pub bleu: Option<f64>,
}

pub struct InferUseCase {
    config: RunConfig,
    options: InferOptions,
}

impl InferUseCase {
    pub fn new(config: RunConfig, options: InferOptions) -> Self {
        Self { config, options }
    }

    pub fn execute(&self) -> Result<InferReport> {
        let bundle = load_vocabularies(&self.config)?;
        let runtime = open_inference_runtime(&self.config, &bundle)?;
        self.run(&runtime, &bundle)
    }

    pub fn run<R: TranslationRuntime + ?Sized>(&self, runtime: &R, bundle: &VocabularyBundle) -> Result<InferReport> {
        let cfg = &self.config;
        let vocab = &bundle.vocab;
        let max_len = cfg.maximum_sentence_length;

        // ── Step 2: source-only batches ──────────────────────────────────────
        let (source_path, reference_path) = cfg.file_pair(&self.options.input_file_name);
        let sentences = read_sentences(&source_path, &cfg.delimiter)?;
        let batches = make_source_batches(&sentences, vocab, cfg.batch_size, max_len);
        tracing::info!("Translating {} sentences from '{}'", sentences.len(), source_path.display());

        // ── Step 3: greedy decoding ──────────────────────────────────────────
        let mut outputs = Vec::with_capacity(sentences.len());
        for batch in &batches {
            let decoded = runtime.decode(&batch.feed(max_len), DecodeMode::Greedy)?;
            outputs.extend(decoded);
        }

        // ── Step 4: output file ──────────────────────────────────────────────
        let output = match &self.options.output {
            Some(path) => path.clone(),
            None => cfg.default_output_file()?,
        };
        write_translations(&output, &outputs, &vocab.target, vocab.target_end_id, self.options.leave_as_index)?;

        // ── Step 5: optional reference BLEU ──────────────────────────────────
        let bleu = if reference_path.is_file() {
            let references = read_sentences(&reference_path, &cfg.delimiter)?;
            if references.len() != sentences.len() {
                let mismatch = DataError::LengthMismatch {
                    source_lines: sentences.len(),
                    target_lines: references.len(),
                };
                return Err(anyhow::Error::new(mismatch)
                    .context(format!("Reference file '{}'", reference_path.display())));
            }
            // Same length filter as the source side, so rows stay aligned.
            let correct: Vec<Vec<usize>> = sentences
                .iter()
                .zip(&references)
                .filter(|(source, _)| source.len() <= max_len)
                .map(|(_, reference)| vocab.target.encode(reference, vocab.target_unknown_id))
                .collect();
            let hypotheses: Vec<Vec<usize>> = outputs
                .iter()
                .map(|ids| strip(ids, vocab.target_end_id).to_vec())
                .collect();
            let score = calculate_bleu(&CorpusBleu, &correct, &hypotheses, None)?;
            println!("BLEU against '{}': {:.2}", reference_path.display(), score * 100.0);
            Some(score)
        } else {
            tracing::debug!("No reference file at '{}'", reference_path.display());
            None
        };

        Ok(InferReport { output, translated: outputs.len(), bleu })
    }
}
