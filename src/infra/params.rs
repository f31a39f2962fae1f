// ============================================================
// Layer 6 — Params File
// ============================================================
// Persists a subset of the run configuration as a JSON object so
// a later run can start from the same settings:
//
//   --save-params all       every key
//   --save-params i[a, b]   only the listed keys (unknown ones dropped)
//   --save-params e[a, b]   every key except the listed ones
//
//   --load-params           every key in the file overrides the
//                           current configuration
//
// Works on any serde struct through serde_json::Value, so this
// module never needs to know the configuration's fields.

use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsSelection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl FromStr for ParamsSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "all" {
            return Ok(Self::All);
        }
        let malformed = || ConfigError::MalformedParamsSpec(s.to_string());
        let mut chars = s.chars();
        let mode = chars.next().ok_or_else(malformed)?;
        let keys: Vec<String> = chars
            .as_str()
            .trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace())
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        match mode {
            'i' => Ok(Self::Include(keys)),
            'e' => Ok(Self::Exclude(keys)),
            _ => Err(malformed()),
        }
    }
}

impl ParamsSelection {
    fn apply(&self, all: Map<String, Value>) -> Result<Map<String, Value>, ConfigError> {
        let selected: Map<String, Value> = match self {
            Self::All => all,
            Self::Include(keys) => all.into_iter().filter(|(k, _)| keys.contains(k)).collect(),
            Self::Exclude(keys) => all.into_iter().filter(|(k, _)| !keys.contains(k)).collect(),
        };
        if selected.is_empty() {
            return Err(ConfigError::EmptyParamsSelection);
        }
        Ok(selected)
    }
}

/// `<path>` with a `.params` suffix appended unless already present.
pub fn params_file_name(path: &str) -> String {
    if path.ends_with(".params") {
        path.to_string()
    } else {
        format!("{path}.params")
    }
}

pub fn save_params<T: Serialize>(config: &T, selection: &ParamsSelection, path: &Path) -> Result<()> {
    let selected = selection.apply(to_object(config)?)?;
    let keys = selected.len();
    let json = serde_json::to_string_pretty(&Value::Object(selected))?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write params file '{}'", path.display()))?;
    tracing::info!("Saved {} params to '{}'", keys, path.display());
    Ok(())
}

/// Overlay every key stored at `path` onto `config`.
pub fn load_params<T: Serialize + DeserializeOwned>(config: &T, path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read params file '{}'", path.display()))?;
    let stored: Map<String, Value> = serde_json::from_str(&json)
        .with_context(|| format!("Params file '{}' is not a JSON object", path.display()))?;

    let mut merged = to_object(config)?;
    tracing::info!("Loading {} params from '{}'", stored.len(), path.display());
    for (key, value) in stored {
        tracing::debug!("param {} = {}", key, value);
        merged.insert(key, value);
    }
    serde_json::from_value(Value::Object(merged))
        .with_context(|| format!("Params file '{}' does not fit this configuration", path.display()))
}

fn to_object<T: Serialize>(config: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(config)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Configuration must serialise to an object, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Settings {
        batch_size: usize,
        learning_rate: f64,
        save_path: Option<String>,
    }

    fn settings() -> Settings {
        Settings { batch_size: 128, learning_rate: 1e-3, save_path: Some("run".into()) }
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!("all".parse::<ParamsSelection>().unwrap(), ParamsSelection::All);
        assert_eq!(
            "i[batch_size, learning_rate]".parse::<ParamsSelection>().unwrap(),
            ParamsSelection::Include(vec!["batch_size".into(), "learning_rate".into()])
        );
        assert_eq!(
            "e[save_path]".parse::<ParamsSelection>().unwrap(),
            ParamsSelection::Exclude(vec!["save_path".into()])
        );
        assert_eq!(
            "x[a]".parse::<ParamsSelection>().unwrap_err(),
            ConfigError::MalformedParamsSpec("x[a]".into())
        );
        assert!("".parse::<ParamsSelection>().is_err());
    }

    #[test]
    fn test_suffix_is_appended_once() {
        assert_eq!(params_file_name("out/run"), "out/run.params");
        assert_eq!(params_file_name("out/run.params"), "out/run.params");
    }

    #[test]
    fn test_include_then_load_overrides_only_saved_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.params");
        let mut saved = settings();
        saved.batch_size = 32;
        save_params(&saved, &"i[batch_size, not_a_key]".parse().unwrap(), &path).unwrap();

        let loaded = load_params(&settings(), &path).unwrap();
        assert_eq!(loaded, Settings { batch_size: 32, ..settings() });
    }

    #[test]
    fn test_exclude_keeps_the_rest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.params");
        save_params(&settings(), &"e[save_path]".parse().unwrap(), &path).unwrap();
        let stored: Map<String, Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(stored.contains_key("batch_size"));
        assert!(!stored.contains_key("save_path"));
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = save_params(&settings(), &"i[nothing]".parse().unwrap(), &tmp.path().join("p")).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::EmptyParamsSelection));
    }
}
