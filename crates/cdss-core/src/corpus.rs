//! Corpus source: reads `Document`s from JSON record files or plain text.
//!
//! A JSON file holds an array of records. The `content` field of each record
//! is the document text and every other field becomes metadata; a record
//! without `content` is indexed as its serialized JSON. Directories are walked
//! recursively for `.json` and `.txt` files in file-name order.

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{Document, Meta};

/// Three-record mock EHR written when the configured corpus is missing.
pub fn mock_ehr_records() -> Value {
    json!([
        { "type": "Condition", "content": "Patient has Type 2 Diabetes, diagnosed 2020." },
        { "type": "Medication", "content": "Prescribed Metformin 500mg BID." },
        { "type": "Lab", "content": "HbA1c level 7.5% recorded last month." }
    ])
}

/// Write the mock EHR to `path` if the file is absent or empty. Returns
/// whether a file was written.
pub fn seed_mock_if_missing(path: &Path) -> Result<bool> {
    let needs_seed = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };
    if !needs_seed {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(&mock_ehr_records())?)?;
    info!(path = %path.display(), "seeded mock EHR corpus");
    Ok(true)
}

/// Load every document under `path` (a file or a directory).
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    if !path.exists() {
        return Err(Error::Corpus(format!("corpus path not found: {}", path.display())));
    }
    let docs = if path.is_dir() { load_dir(path)? } else { load_file(path, path.parent().unwrap_or(path))? };
    info!(path = %path.display(), documents = docs.len(), "corpus loaded");
    Ok(docs)
}

fn load_dir(root: &Path) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        match entry.path().extension().and_then(|s| s.to_str()) {
            Some("json") | Some("txt") => docs.extend(load_file(entry.path(), root)?),
            _ => {}
        }
    }
    Ok(docs)
}

fn load_file(path: &Path, root: &Path) -> Result<Vec<Document>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let raw = fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&raw)?;
            Ok(records_to_documents(&value, path))
        }
        Some("txt") => Ok(vec![text_document(path, root)?]),
        _ => Err(Error::Corpus(format!("unsupported corpus file: {}", path.display()))),
    }
}

fn text_document(path: &Path, root: &Path) -> Result<Document> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => String::from_utf8_lossy(&fs::read(path)?).to_string(),
    };
    let relative = path.strip_prefix(root).unwrap_or(path);
    let category = relative
        .parent()
        .and_then(|p| p.to_str())
        .filter(|p| !p.is_empty())
        .unwrap_or("misc")
        .to_string();
    Ok(Document::new(relative.to_string_lossy(), content)
        .with_meta("source", path.to_string_lossy())
        .with_meta("category", category))
}

/// Turn a JSON array (or a single record) into documents.
pub fn records_to_documents(value: &Value, source: &Path) -> Vec<Document> {
    let stem = source.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "records".to_string());
    let records: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut docs = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        let seq_num = i + 1;
        let (content, mut metadata) = match record {
            Value::Object(fields) => {
                let mut meta = Meta::new();
                for (key, v) in fields {
                    if key != "content" {
                        meta.insert(key.clone(), scalar_to_string(v));
                    }
                }
                let content = match fields.get("content") {
                    Some(Value::String(s)) => s.clone(),
                    _ => record.to_string(),
                };
                (content, meta)
            }
            Value::String(s) => (s.clone(), Meta::new()),
            other => (other.to_string(), Meta::new()),
        };
        if content.trim().is_empty() {
            warn!(source = %source.display(), seq_num, "record has empty content");
        }
        metadata.insert("source".into(), source.to_string_lossy().to_string());
        metadata.insert("seq_num".into(), seq_num.to_string());
        docs.push(Document { id: format!("{stem}#{seq_num}"), content, metadata });
    }
    docs
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
