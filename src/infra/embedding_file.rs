// ============================================================
// Layer 6 — Embedding File Reader
// ============================================================
// An embedding file is a bincode blob holding either
//
//   Single(dict)           one word → vector dictionary
//   Pair([default, alt])   two dictionaries; `import_default`
//                          picks the first, otherwise the second
//
// Dictionaries are ordered (word, vector) lists: their stored
// order is the id order downstream.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;
use crate::domain::vocabulary::EmbeddingDictionary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmbeddingPayload {
    Single(EmbeddingDictionary),
    Pair(Vec<EmbeddingDictionary>),
}

impl EmbeddingPayload {
    pub fn select(self, import_default: bool) -> Result<EmbeddingDictionary, DataError> {
        match self {
            Self::Single(dict) => Ok(dict),
            Self::Pair(dicts) if dicts.len() == 2 => {
                let index = if import_default { 0 } else { 1 };
                dicts
                    .into_iter()
                    .nth(index)
                    .ok_or_else(|| DataError::EmbeddingFormat("missing dictionary".into()))
            }
            Self::Pair(dicts) => Err(DataError::EmbeddingFormat(format!(
                "sequence of {} dictionaries, expected 2",
                dicts.len()
            ))),
        }
    }
}

pub fn read_embedding_file(path: &Path, import_default: bool) -> Result<EmbeddingDictionary> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open embedding file '{}'", path.display()))?;
    let payload: EmbeddingPayload = bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| DataError::EmbeddingFormat(e.to_string()))
        .with_context(|| format!("Cannot decode embedding file '{}'", path.display()))?;
    let dict = payload
        .select(import_default)
        .with_context(|| format!("Embedding file '{}'", path.display()))?;
    tracing::info!("Loaded {} embeddings from '{}'", dict.len(), path.display());
    Ok(dict)
}

pub fn write_embedding_file(path: &Path, payload: &EmbeddingPayload) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Cannot create embedding file '{}'", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), payload)
        .with_context(|| format!("Cannot write embedding file '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn dict(words: &[&str], value: f32) -> EmbeddingDictionary {
        EmbeddingDictionary(words.iter().map(|w| (w.to_string(), vec![value; 2])).collect())
    }

    #[test]
    fn test_single_dictionary_ignores_default_flag() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("emb.en");
        write_embedding_file(&path, &EmbeddingPayload::Single(dict(&["a", "b"], 1.0))).unwrap();
        assert_eq!(read_embedding_file(&path, false).unwrap(), dict(&["a", "b"], 1.0));
    }

    #[test]
    fn test_pair_selects_by_default_flag() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("emb.en");
        let payload = EmbeddingPayload::Pair(vec![dict(&["a"], 1.0), dict(&["z"], 2.0)]);
        write_embedding_file(&path, &payload).unwrap();
        assert_eq!(read_embedding_file(&path, true).unwrap(), dict(&["a"], 1.0));
        assert_eq!(read_embedding_file(&path, false).unwrap(), dict(&["z"], 2.0));
    }

    #[test]
    fn test_wrong_arity_is_a_format_error() {
        let payload = EmbeddingPayload::Pair(vec![dict(&["a"], 1.0)]);
        assert!(matches!(payload.select(true), Err(DataError::EmbeddingFormat(_))));
    }

    #[test]
    fn test_undecodable_payload_is_a_format_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("emb.en");
        fs::write(&path, [9u8, 0, 0, 0]).unwrap();
        let err = read_embedding_file(&path, true).unwrap_err();
        assert!(err.downcast_ref::<DataError>().is_some());
    }
}
