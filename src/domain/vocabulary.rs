// ============================================================
// Layer 3 — Vocabulary Mapping
// ============================================================
// A dense, bidirectional word <-> id table for one language side.
//
//   ids are contiguous in [0, N)
//   the unknown word always sits at id 0
//   id order == construction order (list order or stored
//   dictionary order), never hash order
//
// Built once at startup, then shared read-only by the batch
// generator (words -> ids) and the evaluation driver (ids -> words).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::{DataError, LookupError};

/// Which side of the parallel corpus a vocabulary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn name(self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Vocabulary {
    side: Side,
    word_to_id: HashMap<String, usize>,
    id_to_word: Vec<String>,
}

impl Vocabulary {
    /// Assign ids by position. A repeated word keeps its last position
    /// in `word_to_id`, mirroring a plain dictionary rebuild.
    pub fn from_words(side: Side, words: Vec<String>) -> Self {
        let word_to_id = words
            .iter()
            .enumerate()
            .map(|(id, w)| (w.clone(), id))
            .collect();
        Self { side, word_to_id, id_to_word: words }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.id_to_word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_word.is_empty()
    }

    pub fn id(&self, word: &str) -> Option<usize> {
        self.word_to_id.get(word).copied()
    }

    /// Like `id`, but a missing special token is a data error.
    pub fn require(&self, word: &str) -> Result<usize, DataError> {
        self.id(word).ok_or_else(|| DataError::MissingToken {
            token: word.to_string(),
            side: self.side.name(),
        })
    }

    pub fn word(&self, id: usize) -> Result<&str, LookupError> {
        self.id_to_word
            .get(id)
            .map(String::as_str)
            .ok_or(LookupError { id, side: self.side.name() })
    }

    /// Words -> ids, with anything unseen mapped to `unknown_id`.
    pub fn encode<S: AsRef<str>>(&self, words: &[S], unknown_id: usize) -> Vec<usize> {
        words
            .iter()
            .map(|w| self.id(w.as_ref()).unwrap_or(unknown_id))
            .collect()
    }

    /// Ids -> words. Fails on the first id with no entry.
    pub fn decode(&self, ids: &[usize]) -> Result<Vec<&str>, LookupError> {
        ids.iter().map(|&id| self.word(id)).collect()
    }

    pub fn words(&self) -> &[String] {
        &self.id_to_word
    }
}

/// Source and target vocabularies plus the special-token ids the
/// batching and decoding stages need.
#[derive(Debug, Clone)]
pub struct VocabularyPair {
    pub source: Vocabulary,
    pub target: Vocabulary,
    pub source_unknown_id: usize,
    pub target_unknown_id: usize,
    pub source_end_id: usize,
    pub target_start_id: usize,
    pub target_end_id: usize,
}

/// The special token strings, as configured for the run.
#[derive(Debug, Clone)]
pub struct SpecialTokens {
    pub unknown: String,
    pub start: String,
    pub end: String,
}

impl VocabularyPair {
    pub fn new(source: Vocabulary, target: Vocabulary, tokens: &SpecialTokens) -> Result<Self, DataError> {
        Ok(Self {
            source_unknown_id: source.require(&tokens.unknown)?,
            target_unknown_id: target.require(&tokens.unknown)?,
            source_end_id: source.require(&tokens.end)?,
            target_start_id: target.require(&tokens.start)?,
            target_end_id: target.require(&tokens.end)?,
            source,
            target,
        })
    }
}

/// A stored word -> vector dictionary. Kept as an ordered list: the
/// stored order is the id order, so an unordered map must never be
/// used here or ids and vectors drift apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDictionary(pub Vec<(String, Vec<f32>)>);

impl EmbeddingDictionary {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Row-major `[vocabulary size, width]` matrix; row i is the vector for id i.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    pub rows: usize,
    pub width: usize,
    pub values: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn row(&self, id: usize) -> &[f32] {
        &self.values[id * self.width..(id + 1) * self.width]
    }
}
