// ============================================================
// Layer 5 — Encoder-Decoder Network (Burn)
// ============================================================
// A small pre-norm transformer encoder-decoder:
//
//   source ids ─► embedding + sinusoid ─► N × EncoderBlock ─► norm ─► memory
//   decoder ids ─► embedding + sinusoid ─► N × DecoderBlock ─► norm ─► projection
//                                          (causal self-attn,
//                                           cross-attn on memory)
//
// Masks are additive [batch, 1, queries, keys] tensors built on
// the host from the batch lengths: 0.0 where a key is visible,
// MASKED where it is padding (or in the future, for the causal
// decoder mask).
//
// Dropout is driven by the feed's keep-probability rather than a
// fixed module rate, so one model serves training (keep < 1) and
// evaluation (keep = 1) without reconfiguration.

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::{activation, Distribution},
};

use crate::domain::traits::NamedParameter;
use crate::domain::vocabulary::EmbeddingMatrix;

const MASKED: f32 = -1.0e9;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub src_vocab_size: usize,
    pub tgt_vocab_size: usize,
    pub d_model:        usize,
    /// Lower bound of the random embedding initialisation.
    pub init_min:       f64,
    /// Upper bound of the random embedding initialisation.
    pub init_max:       f64,
    #[config(default = 4)]
    pub num_heads:      usize,
    #[config(default = 2)]
    pub num_layers:     usize,
    #[config(default = 4)]
    pub ff_multiplier:  usize,
    /// Normal instead of uniform embedding initialisation.
    #[config(default = false)]
    pub normal_init:    bool,
}

impl Seq2SeqConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2SeqModel<B> {
        let init = self.embedding_initializer();
        let source_embedding = EmbeddingConfig::new(self.src_vocab_size, self.d_model)
            .with_initializer(init.clone())
            .init(device);
        let target_embedding = EmbeddingConfig::new(self.tgt_vocab_size, self.d_model)
            .with_initializer(init)
            .init(device);
        let encoder = (0..self.num_layers).map(|_| self.build_encoder_block(device)).collect();
        let decoder = (0..self.num_layers).map(|_| self.build_decoder_block(device)).collect();

        Seq2SeqModel {
            source_embedding,
            target_embedding,
            encoder,
            decoder,
            encoder_norm: Norm::new(self.d_model, device),
            decoder_norm: Norm::new(self.d_model, device),
            projection:   LinearConfig::new(self.d_model, self.tgt_vocab_size).init(device),
            num_heads:    self.num_heads,
        }
    }

    /// Like `init`, with embedding tables copied from stored vectors.
    pub fn init_with_embeddings<B: Backend>(
        &self,
        source: &EmbeddingMatrix,
        target: &EmbeddingMatrix,
        device: &B::Device,
    ) -> Seq2SeqModel<B> {
        let mut model = self.init(device);
        model.source_embedding.weight = Param::from_tensor(matrix_tensor(source, device));
        model.target_embedding.weight = Param::from_tensor(matrix_tensor(target, device));
        model
    }

    /// uniform(min, max), or normal with mean (max+min)/2 and std (max-min)/2.
    fn embedding_initializer(&self) -> Initializer {
        if self.normal_init {
            Initializer::Normal {
                mean: (self.init_max + self.init_min) / 2.0,
                std:  (self.init_max - self.init_min) / 2.0,
            }
        } else {
            Initializer::Uniform { min: self.init_min, max: self.init_max }
        }
    }

    fn build_attention<B: Backend>(&self, device: &B::Device) -> Attention<B> {
        let linear = || LinearConfig::new(self.d_model, self.d_model).init(device);
        Attention { query: linear(), key: linear(), value: linear(), output: linear() }
    }

    fn build_feed_forward<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        let d_ff = self.d_model * self.ff_multiplier;
        FeedForward {
            inner: LinearConfig::new(self.d_model, d_ff).init(device),
            outer: LinearConfig::new(d_ff, self.d_model).init(device),
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            self_attn:    self.build_attention(device),
            feed_forward: self.build_feed_forward(device),
            norm1:        Norm::new(self.d_model, device),
            norm2:        Norm::new(self.d_model, device),
        }
    }

    fn build_decoder_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        DecoderBlock {
            self_attn:    self.build_attention(device),
            cross_attn:   self.build_attention(device),
            feed_forward: self.build_feed_forward(device),
            norm1:        Norm::new(self.d_model, device),
            norm2:        Norm::new(self.d_model, device),
            norm3:        Norm::new(self.d_model, device),
        }
    }
}

// ── Building blocks ──────────────────────────────────────────────────────────

/// Layer norm with a named gain vector and no bias.
#[derive(Module, Debug)]
pub struct Norm<B: Backend> {
    pub gain: Param<Tensor<B, 1>>,
}

impl<B: Backend> Norm<B> {
    pub fn new(d_model: usize, device: &B::Device) -> Self {
        Self { gain: Param::from_tensor(Tensor::ones([d_model], device)) }
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let mean = x.clone().mean_dim(2);
        let centered = x - mean;
        let variance = (centered.clone() * centered.clone()).mean_dim(2);
        let normed = centered / variance.add_scalar(1e-5).sqrt();
        normed * self.gain.val().unsqueeze::<3>()
    }
}

#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    pub query:  Linear<B>,
    pub key:    Linear<B>,
    pub value:  Linear<B>,
    pub output: Linear<B>,
}

impl<B: Backend> Attention<B> {
    /// queries: [batch, q, d], keys_values: [batch, k, d], mask: [batch, 1, q, k]
    pub fn forward(
        &self,
        queries:     Tensor<B, 3>,
        keys_values: Tensor<B, 3>,
        mask:        Tensor<B, 4>,
        num_heads:   usize,
    ) -> Tensor<B, 3> {
        let [batch, q_len, d_model] = queries.dims();
        let k_len = keys_values.dims()[1];
        let head_dim = d_model / num_heads;

        let split = |x: Tensor<B, 3>, len: usize| {
            x.reshape([batch, len, num_heads, head_dim]).swap_dims(1, 2)
        };
        let q = split(self.query.forward(queries), q_len);
        let k = split(self.key.forward(keys_values.clone()), k_len);
        let v = split(self.value.forward(keys_values), k_len);

        // [batch, heads, q, k]
        let scores = q.matmul(k.swap_dims(2, 3)).div_scalar((head_dim as f64).sqrt()) + mask;
        let weights = activation::softmax(scores, 3);
        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, q_len, d_model]);
        self.output.forward(context)
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub inner: Linear<B>,
    pub outer: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.outer.forward(activation::relu(self.inner.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:    Attention<B>,
    pub feed_forward: FeedForward<B>,
    pub norm1:        Norm<B>,
    pub norm2:        Norm<B>,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 4>, heads: usize, keep_prob: f64) -> Tensor<B, 3> {
        let h = self.norm1.forward(x.clone());
        let x = x + dropout(self.self_attn.forward(h.clone(), h, mask, heads), keep_prob);
        let h = self.norm2.forward(x.clone());
        x + dropout(self.feed_forward.forward(h), keep_prob)
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:    Attention<B>,
    pub cross_attn:   Attention<B>,
    pub feed_forward: FeedForward<B>,
    pub norm1:        Norm<B>,
    pub norm2:        Norm<B>,
    pub norm3:        Norm<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(
        &self,
        x:           Tensor<B, 3>,
        memory:      Tensor<B, 3>,
        self_mask:   Tensor<B, 4>,
        cross_mask:  Tensor<B, 4>,
        heads:       usize,
        keep_prob:   f64,
    ) -> Tensor<B, 3> {
        let h = self.norm1.forward(x.clone());
        let x = x + dropout(self.self_attn.forward(h.clone(), h, self_mask, heads), keep_prob);
        let h = self.norm2.forward(x.clone());
        let x = x + dropout(self.cross_attn.forward(h, memory, cross_mask, heads), keep_prob);
        let h = self.norm3.forward(x.clone());
        x + dropout(self.feed_forward.forward(h), keep_prob)
    }
}

// ── Full model ───────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub source_embedding: Embedding<B>,
    pub target_embedding: Embedding<B>,
    pub encoder:          Vec<EncoderBlock<B>>,
    pub decoder:          Vec<DecoderBlock<B>>,
    pub encoder_norm:     Norm<B>,
    pub decoder_norm:     Norm<B>,
    pub projection:       Linear<B>,
    pub num_heads:        usize,
}

impl<B: Backend> Seq2SeqModel<B> {
    /// source: [batch, src_len] → memory: [batch, src_len, d_model]
    pub fn encode(&self, source: Tensor<B, 2, Int>, source_lengths: &[usize], keep_prob: f64) -> Tensor<B, 3> {
        let device = source.device();
        let [batch, src_len] = source.dims();
        let mask = attention_mask::<B>(batch, src_len, src_len, Some(source_lengths), false, &device);

        let mut x = dropout(add_positional_encoding(self.source_embedding.forward(source)), keep_prob);
        for block in &self.encoder {
            x = block.forward(x, mask.clone(), self.num_heads, keep_prob);
        }
        self.encoder_norm.forward(x)
    }

    /// decoder_input: [batch, tgt_len] → logits: [batch, tgt_len, tgt_vocab]
    pub fn decode(
        &self,
        memory:         Tensor<B, 3>,
        source_lengths: &[usize],
        decoder_input:  Tensor<B, 2, Int>,
        keep_prob:      f64,
    ) -> Tensor<B, 3> {
        let device = decoder_input.device();
        let [batch, tgt_len] = decoder_input.dims();
        let src_len = memory.dims()[1];
        let self_mask = attention_mask::<B>(batch, tgt_len, tgt_len, None, true, &device);
        let cross_mask = attention_mask::<B>(batch, tgt_len, src_len, Some(source_lengths), false, &device);

        let mut x = dropout(add_positional_encoding(self.target_embedding.forward(decoder_input)), keep_prob);
        for block in &self.decoder {
            x = block.forward(x, memory.clone(), self_mask.clone(), cross_mask.clone(), self.num_heads, keep_prob);
        }
        self.projection.forward(self.decoder_norm.forward(x))
    }

    pub fn forward(
        &self,
        source:         Tensor<B, 2, Int>,
        source_lengths: &[usize],
        decoder_input:  Tensor<B, 2, Int>,
        keep_prob:      f64,
    ) -> Tensor<B, 3> {
        let memory = self.encode(source, source_lengths, keep_prob);
        self.decode(memory, source_lengths, decoder_input, keep_prob)
    }

    /// Free-running decode: each step is fed the argmax of the step before.
    /// Returns `steps` ids per row, the start token not included.
    pub fn greedy(
        &self,
        source:         Tensor<B, 2, Int>,
        source_lengths: &[usize],
        start_id:       usize,
        steps:          usize,
    ) -> Vec<Vec<usize>> {
        let device = source.device();
        let batch = source.dims()[0];
        let memory = self.encode(source, source_lengths, 1.0);
        let mut rows = vec![vec![start_id]; batch];

        for step in 0..steps {
            let input = ids_tensor::<B>(&rows, &device);
            let logits = self.decode(memory.clone(), source_lengths, input, 1.0);
            let vocab = logits.dims()[2];
            let next = logits
                .slice([0..batch, step..step + 1, 0..vocab])
                .argmax(2)
                .reshape([batch, 1]);
            for (row, id) in rows.iter_mut().zip(id_rows(next)) {
                row.push(id[0]);
            }
        }
        rows.into_iter().map(|r| r[1..].to_vec()).collect()
    }

    /// Stop gradients from reaching both embedding tables.
    pub fn freeze_embeddings(mut self) -> Self {
        self.source_embedding = self.source_embedding.no_grad();
        self.target_embedding = self.target_embedding.no_grad();
        self
    }

    /// Every trainable tensor, flattened, under a dotted path name.
    pub fn named_parameters(&self) -> Vec<NamedParameter> {
        let mut out = Vec::new();
        out.push(NamedParameter::new("source_embedding.weight", values(self.source_embedding.weight.val())));
        out.push(NamedParameter::new("target_embedding.weight", values(self.target_embedding.weight.val())));
        for (i, block) in self.encoder.iter().enumerate() {
            let p = format!("encoder.{i}");
            push_attention(&mut out, &format!("{p}.self_attn"), &block.self_attn);
            push_feed_forward(&mut out, &format!("{p}.feed_forward"), &block.feed_forward);
            push_norm(&mut out, &format!("{p}.norm1"), &block.norm1);
            push_norm(&mut out, &format!("{p}.norm2"), &block.norm2);
        }
        for (i, block) in self.decoder.iter().enumerate() {
            let p = format!("decoder.{i}");
            push_attention(&mut out, &format!("{p}.self_attn"), &block.self_attn);
            push_attention(&mut out, &format!("{p}.cross_attn"), &block.cross_attn);
            push_feed_forward(&mut out, &format!("{p}.feed_forward"), &block.feed_forward);
            push_norm(&mut out, &format!("{p}.norm1"), &block.norm1);
            push_norm(&mut out, &format!("{p}.norm2"), &block.norm2);
            push_norm(&mut out, &format!("{p}.norm3"), &block.norm3);
        }
        push_norm(&mut out, "encoder_norm", &self.encoder_norm);
        push_norm(&mut out, "decoder_norm", &self.decoder_norm);
        push_linear(&mut out, "projection", &self.projection);
        out
    }
}

/// Mean token cross-entropy over the positions where `mask` is 1.
///
/// logits: [batch, len, vocab], targets: [batch, len], mask: [batch, len]
pub fn masked_cross_entropy<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    mask:    Tensor<B, 2>,
    count:   usize,
) -> Tensor<B, 1> {
    let [batch, len, _] = logits.dims();
    let log_probs = activation::log_softmax(logits, 2);
    let picked = log_probs
        .gather(2, targets.unsqueeze_dim::<3>(2))
        .reshape([batch, len]);
    (picked * mask).sum().neg().div_scalar(count.max(1) as f64)
}

/// Host-side 0/1 mask over positions `< min(target_len + 1, width)`:
/// every real token plus the first end token.
pub fn loss_mask(target_lengths: &[usize], width: usize) -> (Vec<f32>, usize) {
    let mut mask = Vec::with_capacity(target_lengths.len() * width);
    let mut count = 0;
    for &len in target_lengths {
        let visible = (len + 1).min(width);
        for t in 0..width {
            let on = t < visible;
            count += on as usize;
            mask.push(if on { 1.0 } else { 0.0 });
        }
    }
    (mask, count)
}

// ── Tensor helpers ───────────────────────────────────────────────────────────

/// Apply inverted dropout with the given keep-probability.
fn dropout<B: Backend, const D: usize>(x: Tensor<B, D>, keep_prob: f64) -> Tensor<B, D> {
    if keep_prob >= 1.0 {
        return x;
    }
    let keep = x.random_like(Distribution::Bernoulli(keep_prob));
    (x * keep).div_scalar(keep_prob)
}

/// Additive attention mask, [batch, 1, queries, keys].
pub fn attention_mask<B: Backend>(
    batch:       usize,
    queries:     usize,
    keys:        usize,
    key_lengths: Option<&[usize]>,
    causal:      bool,
    device:      &B::Device,
) -> Tensor<B, 4> {
    let mut values = Vec::with_capacity(batch * queries * keys);
    for b in 0..batch {
        let visible = key_lengths.map_or(keys, |l| l[b].clamp(1, keys.max(1)));
        for q in 0..queries {
            for k in 0..keys {
                let hidden = k >= visible || (causal && k > q);
                values.push(if hidden { MASKED } else { 0.0 });
            }
        }
    }
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([batch, 1, queries, keys])
}

fn add_positional_encoding<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 3> {
    let [_, seq_len, d_model] = x.dims();
    let mut table = Vec::with_capacity(seq_len * d_model);
    for pos in 0..seq_len {
        for i in 0..d_model {
            let angle = pos as f32 / 10000_f32.powf((i - i % 2) as f32 / d_model as f32);
            table.push(if i % 2 == 0 { angle.sin() } else { angle.cos() });
        }
    }
    let encoding = Tensor::<B, 1>::from_floats(table.as_slice(), &x.device())
        .reshape([seq_len, d_model])
        .unsqueeze::<3>();
    x + encoding
}

pub fn ids_tensor<B: Backend>(rows: &[Vec<usize>], device: &B::Device) -> Tensor<B, 2, Int> {
    let width = rows.first().map_or(0, Vec::len);
    let flat: Vec<i32> = rows.iter().flatten().map(|&id| id as i32).collect();
    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([rows.len(), width])
}

pub fn id_rows<B: Backend>(ids: Tensor<B, 2, Int>) -> Vec<Vec<usize>> {
    let [_, width] = ids.dims();
    let flat: Vec<usize> = ids.into_data().iter::<i64>().map(|v| v.max(0) as usize).collect();
    if width == 0 {
        return Vec::new();
    }
    flat.chunks(width).map(<[usize]>::to_vec).collect()
}

fn matrix_tensor<B: Backend>(matrix: &EmbeddingMatrix, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(matrix.values.as_slice(), device).reshape([matrix.rows, matrix.width])
}

fn values<B: Backend, const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
    t.into_data().iter::<f32>().collect()
}

fn push_linear<B: Backend>(out: &mut Vec<NamedParameter>, name: &str, linear: &Linear<B>) {
    out.push(NamedParameter::new(format!("{name}.weight"), values(linear.weight.val())));
    if let Some(bias) = &linear.bias {
        out.push(NamedParameter::new(format!("{name}.bias"), values(bias.val())));
    }
}

fn push_attention<B: Backend>(out: &mut Vec<NamedParameter>, name: &str, attn: &Attention<B>) {
    push_linear(out, &format!("{name}.query"), &attn.query);
    push_linear(out, &format!("{name}.key"), &attn.key);
    push_linear(out, &format!("{name}.value"), &attn.value);
    push_linear(out, &format!("{name}.output"), &attn.output);
}

fn push_feed_forward<B: Backend>(out: &mut Vec<NamedParameter>, name: &str, ff: &FeedForward<B>) {
    push_linear(out, &format!("{name}.inner"), &ff.inner);
    push_linear(out, &format!("{name}.outer"), &ff.outer);
}

fn push_norm<B: Backend>(out: &mut Vec<NamedParameter>, name: &str, norm: &Norm<B>) {
    out.push(NamedParameter::new(format!("{name}.gain"), values(norm.gain.val())));
}
