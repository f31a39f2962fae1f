// ============================================================
// Layer 4 — Vocabulary / Embedding Index Builder
// ============================================================
// Two ways to build the id tables, chosen by --read-mode:
//
//   vocab mode      plain word lists, one word per line.
//                   The end token is added to both sides and the
//                   start token to the target side when missing;
//                   the unknown word is moved to position 0 of
//                   both lists. No vectors: the runtime initialises
//                   embeddings randomly and trains them.
//
//   embedding mode  stored word -> vector dictionaries. id = stored
//                   position, vector i = row i. Nothing is reordered
//                   or deduplicated; the file must already hold the
//                   special tokens.

use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::domain::error::DataError;
use crate::domain::vocabulary::{
    EmbeddingDictionary, EmbeddingMatrix, Side, SpecialTokens, Vocabulary, VocabularyPair,
};

/// Id tables plus the pretrained vectors, when there are any.
#[derive(Debug, Clone)]
pub struct VocabularyBundle {
    pub vocab: VocabularyPair,
    pub source_embedding: Option<EmbeddingMatrix>,
    pub target_embedding: Option<EmbeddingMatrix>,
}

impl VocabularyBundle {
    /// Width shared by both embedding matrices, if they were loaded.
    pub fn embedding_width(&self) -> Option<usize> {
        self.target_embedding.as_ref().map(|m| m.width)
    }
}

/// Read a vocabulary file: one word per line, surrounding newlines
/// and spaces stripped.
pub fn read_vocab_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read vocabulary file '{}'", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.trim_matches(|c| c == '\n' || c == '\r' || c == ' ').to_string())
        .collect())
}

/// Vocab mode: place the special tokens, then assign ids by position.
pub fn build_from_word_lists(
    mut source_words: Vec<String>,
    mut target_words: Vec<String>,
    tokens: &SpecialTokens,
) -> Result<VocabularyBundle, DataError> {
    if !source_words.contains(&tokens.end) {
        source_words.push(tokens.end.clone());
    }
    if !target_words.contains(&tokens.start) {
        target_words.push(tokens.start.clone());
    }
    if !target_words.contains(&tokens.end) {
        target_words.push(tokens.end.clone());
    }

    for words in [&mut source_words, &mut target_words] {
        words.retain(|w| w != &tokens.unknown);
        words.insert(0, tokens.unknown.clone());
    }

    tracing::debug!(
        "Vocab mode: {} source words, {} target words",
        source_words.len(),
        target_words.len()
    );

    let vocab = VocabularyPair::new(
        Vocabulary::from_words(Side::Source, source_words),
        Vocabulary::from_words(Side::Target, target_words),
        tokens,
    )?;
    Ok(VocabularyBundle { vocab, source_embedding: None, target_embedding: None })
}

/// Embedding mode: ids and matrix rows both follow stored order.
pub fn build_from_embeddings(
    source: EmbeddingDictionary,
    target: EmbeddingDictionary,
    tokens: &SpecialTokens,
) -> Result<VocabularyBundle, DataError> {
    let (source_vocab, source_matrix) = index_dictionary(Side::Source, source)?;
    let (target_vocab, target_matrix) = index_dictionary(Side::Target, target)?;

    tracing::debug!(
        "Embedding mode: {}x{} source, {}x{} target",
        source_matrix.rows,
        source_matrix.width,
        target_matrix.rows,
        target_matrix.width
    );

    let vocab = VocabularyPair::new(source_vocab, target_vocab, tokens)?;
    Ok(VocabularyBundle {
        vocab,
        source_embedding: Some(source_matrix),
        target_embedding: Some(target_matrix),
    })
}

fn index_dictionary(
    side: Side,
    dictionary: EmbeddingDictionary,
) -> Result<(Vocabulary, EmbeddingMatrix), DataError> {
    let width = dictionary.0.first().map(|(_, v)| v.len()).unwrap_or(0);
    let mut words  = Vec::with_capacity(dictionary.len());
    let mut values = Vec::with_capacity(dictionary.len() * width);

    for (row, (word, vector)) in dictionary.0.into_iter().enumerate() {
        if vector.len() != width {
            return Err(DataError::RaggedEmbedding {
                word,
                row,
                found: vector.len(),
                expected: width,
            });
        }
        values.extend_from_slice(&vector);
        words.push(word);
    }

    let matrix = EmbeddingMatrix { rows: words.len(), width, values };
    Ok((Vocabulary::from_words(side, words), matrix))
}
