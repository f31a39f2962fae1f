// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Every recognised setting for a run, in one serialisable struct.
// Built from the CLI (Layer 1), optionally overlaid from a params
// file, adjusted once for the read mode, then frozen: nothing
// mutates it after startup. Mutable training state lives in
// ml::trainer::TrainingState instead.
//
// File naming: every per-language file is either
//   <directory>/<lang><name>     with --prefix
//   <directory>/<name>.<lang>    otherwise

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::vocabulary::SpecialTokens;
use crate::ml::model::Seq2SeqConfig;
use crate::ml::sampling::{SamplingDecay, ScheduledSampling};
use crate::ml::schedule::LearningRateSchedule;
use crate::ml::trainer::TrainingOptions;

/// How the vocabularies are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// Bincode word → vector dictionaries; ids and vectors from the file.
    Embedding,
    /// Plain word lists; vectors initialised randomly and trained.
    Vocab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabInit {
    Uniform,
    Normal,
}

impl FromStr for VocabInit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "normal" | "gaussian" | "xavier" => Ok(Self::Normal),
            other => Err(ConfigError::UnknownInitializer(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    // ── files ──
    pub directory:           String,
    pub src:                 String,
    pub tgt:                 String,
    pub prefix:              bool,
    pub embedding_file_name: String,
    pub training_file_name:  String,
    pub dev_file_name:       Option<String>,
    pub save_path:           Option<String>,
    pub batch_file_name:     Option<String>,
    pub save_batch:          bool,
    pub delimiter:           String,

    // ── vocabulary ──
    pub read_mode:           ReadMode,
    pub import_default_dict: bool,
    pub train_embedding:     bool,
    pub vocab_init:          VocabInit,
    pub init_min:            f64,
    pub init_max:            f64,
    pub unknown_word:        String,
    pub start_token:         String,
    pub end_token:           String,

    // ── model ──
    pub size_hidden_layer:   usize,
    pub num_layers:          usize,
    pub num_heads:           usize,

    // ── training ──
    pub epoch:                   usize,
    pub evaluation_step:         usize,
    pub maximum_sentence_length: usize,
    pub batch_size:              usize,
    pub learning_rate:           f64,
    pub keep_prob:               f64,
    pub gradient_clip:           Option<f64>,
    pub warmup_steps:            usize,
    pub decay_steps:             usize,
    pub decay_rate:              f64,
    pub sampling_decay:          SamplingDecay,
    pub sampling_rate:           f64,
    pub sampling_step:           usize,
    pub train_greedy:            bool,
    pub debug_steps:             Option<usize>,
    pub verbose:                 bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            directory:           ".".to_string(),
            src:                 String::new(),
            tgt:                 String::new(),
            prefix:              false,
            embedding_file_name: "vocab".to_string(),
            training_file_name:  "train".to_string(),
            dev_file_name:       None,
            save_path:           None,
            batch_file_name:     None,
            save_batch:          false,
            delimiter:           " ".to_string(),

            read_mode:           ReadMode::Embedding,
            import_default_dict: true,
            train_embedding:     false,
            vocab_init:          VocabInit::Uniform,
            init_min:            -1.0,
            init_max:            1.0,
            unknown_word:        "*UNKNOWN*".to_string(),
            start_token:         "<s>".to_string(),
            end_token:           "<\\s>".to_string(),

            size_hidden_layer:   128,
            num_layers:          2,
            num_heads:           4,

            epoch:                   100,
            evaluation_step:         20,
            maximum_sentence_length: 50,
            batch_size:              128,
            learning_rate:           1e-3,
            keep_prob:               1.0,
            gradient_clip:           None,
            warmup_steps:            0,
            decay_steps:             0,
            decay_rate:              1.0,
            sampling_decay:          SamplingDecay::Linear,
            sampling_rate:           0.0,
            sampling_step:           0,
            train_greedy:            false,
            debug_steps:             None,
            verbose:                 false,
        }
    }
}

impl RunConfig {
    /// Startup adjustments that depend on the read mode.
    pub fn normalise(mut self) -> Self {
        if self.read_mode == ReadMode::Vocab && !self.train_embedding {
            tracing::debug!("Vocab read mode: embeddings will be trained");
            self.train_embedding = true;
        }
        self
    }

    /// Numeric settings no run can work with. Checked for CLI values and
    /// for anything restored from a params file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(ConfigError::KeepProbOutOfRange(self.keep_prob));
        }
        Ok(())
    }

    pub fn save_path(&self) -> Result<&str, ConfigError> {
        self.save_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingSavePath)
    }

    pub fn language_file(&self, name: &str, lang: &str) -> PathBuf {
        let file = if self.prefix {
            format!("{lang}{name}")
        } else {
            format!("{name}.{lang}")
        };
        Path::new(&self.directory).join(file)
    }

    /// (source, target) paths for a base name.
    pub fn file_pair(&self, name: &str) -> (PathBuf, PathBuf) {
        (self.language_file(name, &self.src), self.language_file(name, &self.tgt))
    }

    /// `<directory>/<save_path><suffix>`
    fn run_file(&self, suffix: &str) -> Result<PathBuf, ConfigError> {
        Ok(Path::new(&self.directory).join(format!("{}{suffix}", self.save_path()?)))
    }

    pub fn checkpoint_dir(&self) -> Result<PathBuf, ConfigError> {
        self.run_file("")
    }

    pub fn default_batch_file(&self) -> Result<PathBuf, ConfigError> {
        self.run_file(".bat")
    }

    /// The cache to read: the default location wins, then --batch-file-name.
    pub fn existing_batch_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        let default = self.default_batch_file()?;
        if default.is_file() {
            return Ok(Some(default));
        }
        Ok(self
            .batch_file_name
            .as_ref()
            .map(PathBuf::from)
            .filter(|p| p.is_file()))
    }

    /// The cache to write: --batch-file-name, else the default location.
    pub fn batch_file_to_write(&self) -> Result<PathBuf, ConfigError> {
        match &self.batch_file_name {
            Some(name) => Ok(PathBuf::from(name)),
            None => self.default_batch_file(),
        }
    }

    pub fn metrics_file(&self) -> Result<PathBuf, ConfigError> {
        self.run_file(".metrics.csv")
    }

    pub fn default_output_file(&self) -> Result<PathBuf, ConfigError> {
        self.run_file(".out")
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            unknown: self.unknown_word.clone(),
            start:   self.start_token.clone(),
            end:     self.end_token.clone(),
        }
    }

    /// Network options. `width` is the embedding width in embedding
    /// mode and `size_hidden_layer` otherwise.
    pub fn model_config(
        &self,
        src_vocab_size: usize,
        tgt_vocab_size: usize,
        width: usize,
    ) -> Result<Seq2SeqConfig, ConfigError> {
        if self.num_heads == 0 || width % self.num_heads != 0 {
            return Err(ConfigError::HeadsDoNotDivide { d_model: width, num_heads: self.num_heads });
        }
        Ok(Seq2SeqConfig::new(src_vocab_size, tgt_vocab_size, width, self.init_min, self.init_max)
            .with_num_heads(self.num_heads)
            .with_num_layers(self.num_layers)
            .with_normal_init(self.vocab_init == VocabInit::Normal))
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            epochs:          self.epoch,
            evaluation_step: self.evaluation_step,
            keep_prob:       self.keep_prob,
            verbose:         self.verbose,
            debug_every:     self.debug_steps,
            learning_rate:   LearningRateSchedule {
                base:         self.learning_rate,
                warmup_steps: self.warmup_steps,
                decay_steps:  self.decay_steps,
                decay_rate:   self.decay_rate,
            },
            sampling: Some(ScheduledSampling {
                decay:         self.sampling_decay,
                rate:          self.sampling_rate,
                step_interval: self.sampling_step,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            directory: "data".into(),
            src: "vi".into(),
            tgt: "en".into(),
            save_path: Some("run1".into()),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_suffix_and_prefix_naming() {
        let c = config();
        assert_eq!(c.language_file("train", "vi"), Path::new("data").join("train.vi"));
        let c = RunConfig { prefix: true, ..c };
        assert_eq!(c.file_pair("train"), (Path::new("data").join("vitrain"), Path::new("data").join("entrain")));
    }

    #[test]
    fn test_missing_save_path_is_a_config_error() {
        let c = RunConfig { save_path: None, ..config() };
        assert_eq!(c.checkpoint_dir().unwrap_err(), ConfigError::MissingSavePath);
        let c = RunConfig { save_path: Some(String::new()), ..config() };
        assert_eq!(c.save_path().unwrap_err(), ConfigError::MissingSavePath);
    }

    #[test]
    fn test_run_files_live_next_to_each_other() {
        let c = config();
        assert_eq!(c.checkpoint_dir().unwrap(), Path::new("data").join("run1"));
        assert_eq!(c.default_batch_file().unwrap(), Path::new("data").join("run1.bat"));
        let c = RunConfig { batch_file_name: Some("cache.bin".into()), ..c };
        assert_eq!(c.batch_file_to_write().unwrap(), PathBuf::from("cache.bin"));
    }

    #[test]
    fn test_vocab_mode_forces_embedding_training() {
        let c = RunConfig { read_mode: ReadMode::Vocab, ..config() }.normalise();
        assert!(c.train_embedding);
        let c = config().normalise();
        assert!(!c.train_embedding);
    }

    #[test]
    fn test_model_config_checks_heads() {
        let c = config();
        assert!(c.model_config(10, 12, 128).is_ok());
        assert_eq!(
            c.model_config(10, 12, 30).unwrap_err(),
            ConfigError::HeadsDoNotDivide { d_model: 30, num_heads: 4 }
        );
    }

    #[test]
    fn test_unusable_batch_size_and_keep_prob() {
        assert_eq!(config().validate(), Ok(()));
        assert_eq!(RunConfig { keep_prob: 0.5, ..config() }.validate(), Ok(()));
        assert_eq!(RunConfig { batch_size: 0, ..config() }.validate(), Err(ConfigError::ZeroBatchSize));
        for keep_prob in [0.0, -0.2, 1.5, f64::NAN] {
            let err = RunConfig { keep_prob, ..config() }.validate().unwrap_err();
            assert!(matches!(err, ConfigError::KeepProbOutOfRange(_)));
        }
    }

    #[test]
    fn test_initializer_names() {
        assert_eq!("Gaussian".parse::<VocabInit>(), Ok(VocabInit::Normal));
        assert_eq!("uniform".parse::<VocabInit>(), Ok(VocabInit::Uniform));
        assert_eq!(
            "zeros".parse::<VocabInit>(),
            Err(ConfigError::UnknownInitializer("zeros".into()))
        );
    }

    #[test]
    fn test_defaults() {
        let c = RunConfig::default();
        assert_eq!(c.batch_size, 128);
        assert_eq!(c.epoch, 100);
        assert_eq!(c.evaluation_step, 20);
        assert_eq!(c.maximum_sentence_length, 50);
        assert_eq!(c.end_token, "<\\s>");
        assert_eq!((c.init_min, c.init_max), (-1.0, 1.0));
    }
}
