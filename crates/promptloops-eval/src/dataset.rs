use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::{FieldMap, Sample};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported dataset format: {0} (expected .jsonl or .json)")]
    UnsupportedFormat(String),

    #[error("Invalid record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Load samples from a `.jsonl` or `.json` file, keeping file order.
///
/// A record carries its input under `source_text` or `input`, and its ground
/// truth either as an object under `ground_truth`/`expected` or as a
/// `privacy_mask` list of `{label, value}` entries.
pub fn load_samples(path: &Path, limit: Option<usize>) -> Result<Vec<Sample>, DatasetError> {
    let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let records = match extension.as_str() {
        "jsonl" => parse_jsonl(&content, limit)?,
        "json" => parse_json(&content, limit)?,
        other => return Err(DatasetError::UnsupportedFormat(other.to_string())),
    };

    let samples = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect::<Result<Vec<_>, _>>()?;

    info!(count = samples.len(), path = %path.display(), "Loaded samples");
    Ok(samples)
}

fn parse_jsonl(content: &str, limit: Option<usize>) -> Result<Vec<Value>, DatasetError> {
    let mut records = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if limit.is_some_and(|max| records.len() >= max) {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = serde_json::from_str(line).map_err(|source| DatasetError::Parse {
            line: i + 1,
            source,
        })?;
        records.push(value);
    }
    Ok(records)
}

fn parse_json(content: &str, limit: Option<usize>) -> Result<Vec<Value>, DatasetError> {
    let value: Value =
        serde_json::from_str(content).map_err(|source| DatasetError::Parse { line: 1, source })?;
    let mut records = match value {
        Value::Array(items) => items,
        single => vec![single],
    };
    if let Some(max) = limit {
        records.truncate(max);
    }
    Ok(records)
}

fn parse_record(index: usize, record: Value) -> Result<Sample, DatasetError> {
    let invalid = |reason: &str| DatasetError::InvalidRecord {
        index,
        reason: reason.to_string(),
    };

    let Value::Object(object) = record else {
        return Err(invalid("record is not an object"));
    };

    let input = match object.get("source_text").or_else(|| object.get("input")) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => return Err(invalid("missing `source_text` or `input`")),
    };

    let ground_truth = if let Some(truth) = object.get("ground_truth").or_else(|| object.get("expected")) {
        match truth {
            Value::Object(map) => object_fields(map),
            _ => return Err(invalid("ground truth must be an object")),
        }
    } else if let Some(mask) = object.get("privacy_mask") {
        match mask {
            Value::Array(entries) => privacy_mask_fields(entries),
            _ => return Err(invalid("`privacy_mask` must be a list")),
        }
    } else {
        return Err(invalid("missing `ground_truth`, `expected` or `privacy_mask`"));
    };

    if let Some(name) = ground_truth
        .iter()
        .find(|(_, value)| value.is_array() || value.is_object())
        .map(|(name, _)| name)
    {
        return Err(invalid(&format!("ground-truth field `{}` is not a scalar", name)));
    }

    Ok(Sample::new(index, input, ground_truth))
}

fn object_fields(map: &Map<String, Value>) -> FieldMap {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// `[{label, value}, ...]` to a field map; first value per label wins
fn privacy_mask_fields(entries: &[Value]) -> FieldMap {
    let mut fields = FieldMap::new();
    for entry in entries {
        let label = entry.get("label").and_then(Value::as_str);
        let value = entry.get("value");
        if let (Some(label), Some(value)) = (label, value) {
            fields
                .entry(label.to_lowercase())
                .or_insert_with(|| value.clone());
        }
    }
    fields
}
