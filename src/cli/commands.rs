// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `infer`, and all their
// configurable flags. Flags both commands need live in
// `SharedArgs` and are flattened into each.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args and unknown modes
//   - type conversion (string → usize, f64, ParamsSelection, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::config::{ReadMode, RunConfig, VocabInit};
use crate::application::infer_use_case::InferOptions;
use crate::application::session::ParamsOptions;
use crate::infra::params::ParamsSelection;
use crate::ml::sampling::SamplingDecay;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train (or keep training) a translation model
    Train(TrainArgs),

    /// Translate a file with a trained checkpoint
    Infer(InferArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ReadModeArg {
    /// Stored word → vector dictionaries
    Embedding,
    /// Plain word lists, embeddings trained from scratch
    Vocab,
}

impl From<ReadModeArg> for ReadMode {
    fn from(a: ReadModeArg) -> Self {
        match a {
            ReadModeArg::Embedding => ReadMode::Embedding,
            ReadModeArg::Vocab => ReadMode::Vocab,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DecayArg {
    Linear,
    Exponential,
    InverseSigmoid,
}

impl From<DecayArg> for SamplingDecay {
    fn from(a: DecayArg) -> Self {
        match a {
            DecayArg::Linear => SamplingDecay::Linear,
            DecayArg::Exponential => SamplingDecay::Exponential,
            DecayArg::InverseSigmoid => SamplingDecay::InverseSigmoid,
        }
    }
}

fn parse_batch_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_keep_prob(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
    if p > 0.0 && p <= 1.0 {
        Ok(p)
    } else {
        Err(format!("{} is outside (0, 1]", p))
    }
}

/// Flags shared by `train` and `infer`: files, vocabulary, model shape.
#[derive(Args, Debug)]
pub struct SharedArgs {
    /// Source language code, used as file extension (or prefix)
    #[arg(short, long)]
    pub src: String,

    /// Target language code
    #[arg(short, long)]
    pub tgt: String,

    /// Directory holding every input and output file
    #[arg(short, long, default_value = ".")]
    pub directory: String,

    /// Name files <lang><name> instead of <name>.<lang>
    #[arg(long)]
    pub prefix: bool,

    /// Checkpoint name under --directory; also names the batch cache,
    /// params, metrics and output files
    #[arg(long)]
    pub save_path: Option<String>,

    /// How the vocabularies are read
    #[arg(short, long, value_enum, default_value_t = ReadModeArg::Embedding)]
    pub read_mode: ReadModeArg,

    /// Base name of the vocabulary / embedding files
    #[arg(short, long, default_value = "vocab")]
    pub embedding_file_name: String,

    /// Use the first dictionary of a two-dictionary embedding file
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub import_default_dict: bool,

    /// Keep updating the embedding tables (forced on in vocab mode)
    #[arg(long)]
    pub train_embedding: bool,

    /// Random embedding initialiser: uniform, normal (gaussian, xavier)
    #[arg(long, default_value = "uniform")]
    pub vocab_init: VocabInit,

    /// Range of the random initialiser
    #[arg(
        long,
        num_args = 2,
        value_names = ["MIN", "MAX"],
        default_values_t = [-1.0, 1.0],
        allow_negative_numbers = true
    )]
    pub init_range: Vec<f64>,

    #[arg(long, default_value = "*UNKNOWN*")]
    pub unknown_word: String,

    #[arg(long, default_value = "<s>")]
    pub start_token: String,

    #[arg(long, default_value = "<\\s>")]
    pub end_token: String,

    /// Token delimiter of the corpus files
    #[arg(long, default_value = " ")]
    pub delimiter: String,

    /// Model width; replaced by the embedding width in embedding mode
    #[arg(long, default_value_t = 128)]
    pub size_hidden_layer: usize,

    /// Encoder and decoder depth
    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    /// Attention heads; must divide the model width
    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    /// Sentences longer than this many tokens are dropped
    #[arg(long, default_value_t = 50)]
    pub maximum_sentence_length: usize,

    #[arg(long, default_value_t = 128, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Progress logging and debug-level tracing
    #[arg(short, long)]
    pub verbose: bool,

    /// Override every setting found in the params file
    #[arg(long)]
    pub load_params: bool,

    /// Save settings to the params file: all, i[a, b] or e[a, b]
    #[arg(long)]
    pub save_params: Option<ParamsSelection>,

    /// Params file path, default <directory>/<save_path>.params
    #[arg(short, long)]
    pub params_path: Option<String>,
}

impl SharedArgs {
    pub fn params_options(&self) -> ParamsOptions {
        ParamsOptions {
            load: self.load_params,
            save: self.save_params.clone(),
            path: self.params_path.clone(),
        }
    }

    /// Shared fields over the defaults; command-specific fields are
    /// filled in by the caller.
    fn into_config(self) -> RunConfig {
        let defaults = RunConfig::default();
        let (init_min, init_max) = match self.init_range.as_slice() {
            [min, max] => (*min, *max),
            _ => (defaults.init_min, defaults.init_max),
        };
        RunConfig {
            directory:               self.directory,
            src:                     self.src,
            tgt:                     self.tgt,
            prefix:                  self.prefix,
            embedding_file_name:     self.embedding_file_name,
            save_path:               self.save_path,
            delimiter:               self.delimiter,
            read_mode:               self.read_mode.into(),
            import_default_dict:     self.import_default_dict,
            train_embedding:         self.train_embedding,
            vocab_init:              self.vocab_init,
            init_min,
            init_max,
            unknown_word:            self.unknown_word,
            start_token:             self.start_token,
            end_token:               self.end_token,
            size_hidden_layer:       self.size_hidden_layer,
            num_layers:              self.num_layers,
            num_heads:               self.num_heads,
            maximum_sentence_length: self.maximum_sentence_length,
            batch_size:              self.batch_size,
            verbose:                 self.verbose,
            ..defaults
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Base name of the parallel training files
    #[arg(long, default_value = "train")]
    pub training_file_name: String,

    /// Base name of the parallel dev files used for evaluation
    #[arg(long)]
    pub dev_file_name: Option<String>,

    /// Batch cache path, default <directory>/<save_path>.bat
    #[arg(short, long)]
    pub batch_file_name: Option<String>,

    /// Write the batch cache after training
    #[arg(long)]
    pub save_batch: bool,

    /// Switch to greedy decoder inputs while BLEU@train > BLEU@infer
    #[arg(long)]
    pub train_greedy: bool,

    #[arg(long, default_value_t = 100)]
    pub epoch: usize,

    /// Evaluate every N epochs
    #[arg(long, default_value_t = 20)]
    pub evaluation_step: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Dropout keep-probability during training
    #[arg(long, default_value_t = 1.0, value_parser = parse_keep_prob)]
    pub keep_prob: f64,

    /// Clip gradients to this global norm
    #[arg(long)]
    pub gradient_clip: Option<f64>,

    /// Linear learning-rate warmup over this many steps
    #[arg(long, default_value_t = 0)]
    pub warmup_steps: usize,

    /// Decay the learning rate by --decay-rate every N steps after warmup
    #[arg(long, default_value_t = 0)]
    pub decay_steps: usize,

    #[arg(long, default_value_t = 1.0)]
    pub decay_rate: f64,

    /// Scheduled-sampling decay curve
    #[arg(long, value_enum, default_value_t = DecayArg::Linear)]
    pub sampling_decay: DecayArg,

    /// Scheduled-sampling rate; 0 disables scheduled sampling
    #[arg(long, default_value_t = 0.0)]
    pub sampling_rate: f64,

    /// Global steps per scheduled-sampling stair; 0 disables it
    #[arg(long, default_value_t = 0)]
    pub sampling_step: usize,

    /// Print the parameter value range every N steps
    #[arg(long)]
    pub debug_steps: Option<usize>,
}

/// Convert CLI TrainArgs into the application-layer RunConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for RunConfig {
    fn from(a: TrainArgs) -> Self {
        RunConfig {
            training_file_name: a.training_file_name,
            dev_file_name:      a.dev_file_name,
            batch_file_name:    a.batch_file_name,
            save_batch:         a.save_batch,
            train_greedy:       a.train_greedy,
            epoch:              a.epoch,
            evaluation_step:    a.evaluation_step,
            learning_rate:      a.learning_rate,
            keep_prob:          a.keep_prob,
            gradient_clip:      a.gradient_clip,
            warmup_steps:       a.warmup_steps,
            decay_steps:        a.decay_steps,
            decay_rate:         a.decay_rate,
            sampling_decay:     a.sampling_decay.into(),
            sampling_rate:      a.sampling_rate,
            sampling_step:      a.sampling_step,
            debug_steps:        a.debug_steps,
            ..a.shared.into_config()
        }
    }
}

/// All arguments for the `infer` command
#[derive(Args, Debug)]
pub struct InferArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Base name of the file to translate (<name>.<src>); a <name>.<tgt>
    /// next to it is used as BLEU reference
    #[arg(short, long)]
    pub input_file_name: String,

    /// Output path, default <directory>/<save_path>.out
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write raw target ids instead of words
    #[arg(long)]
    pub leave_as_index: bool,
}

impl InferArgs {
    pub fn infer_options(&self) -> InferOptions {
        InferOptions {
            input_file_name: self.input_file_name.clone(),
            output: self.output.clone(),
            leave_as_index: self.leave_as_index,
        }
    }
}

impl From<InferArgs> for RunConfig {
    fn from(a: InferArgs) -> Self {
        a.shared.into_config()
    }
}
