// ============================================================
// Layer 5 — Training Loop Controller
// ============================================================
// State machine over epochs × batches, driving any
// TranslationRuntime. Per batch:
//
//   1. global_step += 1
//   2. build the feed (keep-prob from the options)
//   3. pick the decoder input policy:
//        greedy path            → 0.0 (self-generated inputs)
//        scheduled sampling on  → coefficient(global_step)
//        otherwise              → 1.0 (teacher forcing)
//   4. one optimizer step, loss accumulated
//   5. NaN loss → diagnostics, then DivergenceError
//
// After each epoch the mean loss is appended to the history and,
// every `evaluation_step` epochs, the caller's evaluation callback
// picks the decoder path for the following epochs.
//
// All mutable run state lives in TrainingState, which is moved in
// and handed back out; there are no process-wide counters.

use std::time::Instant;

use anyhow::{bail, Result};

use crate::domain::batch::{Batch, DecodeMode, Feed};
use crate::domain::error::DivergenceError;
use crate::domain::traits::TranslationRuntime;
use crate::ml::diagnostics::{debug_session, find_nan};
use crate::ml::sampling::ScheduledSampling;
use crate::ml::schedule::LearningRateSchedule;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub epochs: usize,
    pub evaluation_step: usize,
    pub keep_prob: f64,
    pub verbose: bool,
    /// Run the value-range diagnostic every N global steps.
    pub debug_every: Option<usize>,
    pub learning_rate: LearningRateSchedule,
    pub sampling: Option<ScheduledSampling>,
}

impl TrainingOptions {
    /// Probability of feeding the ground-truth previous token.
    pub fn teacher_forcing(&self, state: &TrainingState) -> f64 {
        match state.decoder_path {
            DecodeMode::Greedy => 0.0,
            DecodeMode::TeacherForced => match self.sampling {
                Some(s) if s.is_active() => s.coefficient(state.global_step),
                _ => 1.0,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingState {
    pub global_step: usize,
    /// One mean loss per finished epoch.
    pub loss_history: Vec<f64>,
    pub decoder_path: DecodeMode,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            global_step: 0,
            loss_history: Vec::new(),
            decoder_path: DecodeMode::TeacherForced,
        }
    }
}

/// Run `options.epochs` epochs over `batches`.
///
/// `on_evaluate(epoch, loss_history, runtime)` returns the decoder
/// path to train on until the next evaluation.
pub fn train<R, F>(
    runtime: &mut R,
    batches: &[Batch],
    options: &TrainingOptions,
    mut state: TrainingState,
    mut on_evaluate: F,
) -> Result<TrainingState>
where
    R: TranslationRuntime,
    F: FnMut(usize, &[f64], &R) -> Result<DecodeMode>,
{
    if batches.is_empty() {
        bail!("No training batches to run on");
    }

    let started = Instant::now();
    tracing::info!(
        "Training {} epochs over {} batches (eval every {} epochs)",
        options.epochs,
        batches.len(),
        options.evaluation_step
    );

    for epoch in 1..=options.epochs {
        let mut epoch_loss = 0.0f64;

        for batch in batches {
            state.global_step += 1;
            let feed = batch.feed(options.keep_prob);
            let teacher_forcing = options.teacher_forcing(&state);
            let learning_rate = options.learning_rate.at(state.global_step);

            let loss = runtime.train_step(&feed, teacher_forcing, learning_rate)?;
            if loss.is_nan() {
                report_divergence(&*runtime, &feed, state.global_step);
                return Err(DivergenceError { global_step: state.global_step }.into());
            }
            epoch_loss += loss;

            if options.verbose && state.global_step % PROGRESS_EVERY == 0 {
                tracing::info!(
                    "step {:>7} | loss={:.4} | tf={:.3} | lr={:.2e} | {:.1}s",
                    state.global_step,
                    loss,
                    teacher_forcing,
                    learning_rate,
                    started.elapsed().as_secs_f64()
                );
            }

            if let Some(every) = options.debug_every.filter(|&n| n > 0) {
                if state.global_step % every == 0 {
                    match debug_session(&runtime.parameters()) {
                        Some(range) => tracing::debug!("step {}: {}", state.global_step, range),
                        None => tracing::debug!("step {}: no parameters to inspect", state.global_step),
                    }
                }
            }
        }

        let mean_loss = epoch_loss / batches.len() as f64;
        state.loss_history.push(mean_loss);
        tracing::debug!("Epoch {} mean loss {:.4}", epoch, mean_loss);

        if options.evaluation_step > 0 && epoch % options.evaluation_step == 0 {
            let next = on_evaluate(epoch, &state.loss_history, &*runtime)?;
            if next != state.decoder_path {
                tracing::info!("Decoder path for training switches to {:?}", next);
            }
            state.decoder_path = next;
        }
    }

    tracing::info!(
        "Training finished after {} steps in {:.1}s",
        state.global_step,
        started.elapsed().as_secs_f64()
    );
    Ok(state)
}

fn report_divergence<R: TranslationRuntime + ?Sized>(runtime: &R, feed: &Feed<'_>, global_step: usize) {
    tracing::error!("Loss is NaN at global step {}", global_step);
    tracing::error!(
        "Feed: batch_size={} max_unroll={} keep_prob={}",
        feed.batch_size,
        feed.max_unroll,
        feed.keep_prob
    );
    tracing::error!("source_ids: {:?}", feed.source_ids);
    tracing::error!("source_lengths: {:?}", feed.source_lengths);
    tracing::error!("target_ids: {:?}", feed.target_ids);
    tracing::error!("target_lengths: {:?}", feed.target_lengths);
    tracing::error!("decoder_input_ids: {:?}", feed.decoder_input_ids);

    let broken = find_nan(&runtime.parameters());
    if broken.is_empty() {
        tracing::error!("No parameter holds a non-finite value");
    }
    for name in broken {
        tracing::error!("Non-finite values in parameter '{}'", name);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::path::Path;

    use super::*;
    use crate::data::batcher::make_batches;
    use crate::data::corpus::couple;
    use crate::data::vocab_builder::build_from_word_lists;
    use crate::domain::traits::NamedParameter;
    use crate::domain::vocabulary::SpecialTokens;
    use crate::ml::sampling::SamplingDecay;

    /// In-memory runtime: scripted losses, echoes targets when
    /// teacher forced and returns `greedy_output` otherwise.
    #[derive(Default)]
    pub(crate) struct FakeRuntime {
        pub losses: VecDeque<f64>,
        pub steps: Vec<(f64, f64)>,
        pub params: Vec<NamedParameter>,
        pub greedy_output: Option<Vec<Vec<usize>>>,
    }

    impl TranslationRuntime for FakeRuntime {
        fn train_step(&mut self, _feed: &Feed<'_>, teacher_forcing: f64, learning_rate: f64) -> Result<f64> {
            self.steps.push((teacher_forcing, learning_rate));
            Ok(self.losses.pop_front().unwrap_or(1.0))
        }

        fn decode(&self, feed: &Feed<'_>, mode: DecodeMode) -> Result<Vec<Vec<usize>>> {
            Ok(match (mode, &self.greedy_output) {
                (DecodeMode::Greedy, Some(out)) => out.clone(),
                _ => feed.target_ids.to_vec(),
            })
        }

        fn parameters(&self) -> Vec<NamedParameter> {
            self.params.clone()
        }

        fn save(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn options(epochs: usize, evaluation_step: usize) -> TrainingOptions {
        TrainingOptions {
            epochs,
            evaluation_step,
            keep_prob: 0.8,
            verbose: true,
            debug_every: Some(1),
            learning_rate: LearningRateSchedule::constant(1e-3),
            sampling: None,
        }
    }

    /// Four sentence pairs over a six-word dictionary.
    fn toy_batches(batch_size: usize) -> Vec<Batch> {
        let w = |s: &str| s.split(' ').map(str::to_string).collect::<Vec<_>>();
        let dictionary = w("le chat noir dort <s> </s>");
        let tokens = SpecialTokens {
            unknown: "*UNKNOWN*".into(),
            start: "<s>".into(),
            end: "</s>".into(),
        };
        let bundle = build_from_word_lists(dictionary.clone(), dictionary, &tokens).unwrap();
        let source = vec![w("le chat"), w("chat noir"), w("le chat dort"), w("noir")];
        let target = vec![w("le chat"), w("chat noir"), w("le chat dort"), w("noir")];
        let mut pairs = couple(source, target, 10).unwrap();
        crate::data::corpus::sort_for_batching(&mut pairs);
        make_batches(&pairs, &bundle.vocab, batch_size)
    }

    #[test]
    fn test_one_epoch_records_one_loss() {
        let batches = toy_batches(2);
        let mut runtime = FakeRuntime { losses: VecDeque::from(vec![2.0, 4.0]), ..Default::default() };

        let state = train(&mut runtime, &batches, &options(1, 20), TrainingState::default(), |_, _, _| {
            Ok(DecodeMode::TeacherForced)
        })
        .unwrap();

        assert_eq!(state.loss_history, vec![3.0]);
        assert_eq!(state.global_step, 2);
        assert_eq!(runtime.steps.len(), 2);
    }

    #[test]
    fn test_nan_loss_is_a_divergence_error() {
        let batches = toy_batches(1);
        let mut runtime = FakeRuntime {
            losses: VecDeque::from(vec![1.0, f64::NAN]),
            params: vec![NamedParameter::new("projection.weight", vec![f32::NAN])],
            ..Default::default()
        };

        let err = train(&mut runtime, &batches, &options(3, 1), TrainingState::default(), |_, _, _| {
            Ok(DecodeMode::TeacherForced)
        })
        .unwrap_err();

        assert_eq!(err.downcast_ref::<DivergenceError>(), Some(&DivergenceError { global_step: 2 }));
        assert_eq!(runtime.steps.len(), 2);
    }

    #[test]
    fn test_evaluation_cadence_and_history_passed() {
        let batches = toy_batches(4);
        let mut runtime = FakeRuntime::default();
        let mut seen = Vec::new();

        train(&mut runtime, &batches, &options(6, 2), TrainingState::default(), |epoch, history, _| {
            seen.push((epoch, history.len()));
            Ok(DecodeMode::TeacherForced)
        })
        .unwrap();

        assert_eq!(seen, vec![(2, 2), (4, 4), (6, 6)]);
    }

    #[test]
    fn test_callback_switches_to_greedy_path() {
        let batches = toy_batches(4);
        let mut runtime = FakeRuntime::default();

        let state = train(&mut runtime, &batches, &options(2, 1), TrainingState::default(), |_, _, _| {
            Ok(DecodeMode::Greedy)
        })
        .unwrap();

        assert_eq!(state.decoder_path, DecodeMode::Greedy);
        let forcing: Vec<f64> = runtime.steps.iter().map(|s| s.0).collect();
        assert_eq!(forcing, vec![1.0, 0.0]);
    }

    #[test]
    fn test_scheduled_sampling_feeds_coefficient() {
        let batches = toy_batches(1);
        let mut runtime = FakeRuntime::default();
        let mut opts = options(1, 0);
        opts.sampling = Some(ScheduledSampling {
            decay: SamplingDecay::Exponential,
            rate: 0.5,
            step_interval: 2,
        });

        train(&mut runtime, &batches, &opts, TrainingState::default(), |_, _, _| {
            Ok(DecodeMode::TeacherForced)
        })
        .unwrap();

        // global steps 1..=4 → stairs 0, 1, 1, 2
        let forcing: Vec<f64> = runtime.steps.iter().map(|s| s.0).collect();
        assert_eq!(forcing, vec![1.0, 0.5, 0.5, 0.25]);
    }

    #[test]
    fn test_state_carries_across_calls() {
        let batches = toy_batches(2);
        let mut runtime = FakeRuntime::default();
        let eval = |_: usize, _: &[f64], _: &FakeRuntime| -> Result<DecodeMode> { Ok(DecodeMode::TeacherForced) };

        let state = train(&mut runtime, &batches, &options(1, 0), TrainingState::default(), eval).unwrap();
        let state = train(&mut runtime, &batches, &options(1, 0), state, eval).unwrap();

        assert_eq!(state.global_step, 4);
        assert_eq!(state.loss_history.len(), 2);
    }

    #[test]
    fn test_empty_batch_list_is_rejected() {
        let mut runtime = FakeRuntime::default();
        assert!(train(&mut runtime, &[], &options(1, 1), TrainingState::default(), |_, _, _| {
            Ok(DecodeMode::TeacherForced)
        })
        .is_err());
    }
}
