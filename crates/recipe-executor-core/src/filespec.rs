// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File specs: `{ path, content }` records passed between steps.

use crate::error::{ExecutorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A file to write (or one produced by an LLM call).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Relative or absolute path; may contain directory separators.
    pub path: String,

    /// UTF-8 text content.
    #[serde(default)]
    pub content: String,
}

impl FileSpec {
    /// Creates a file spec.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// A file spec with an empty path is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(ExecutorError::Config(
                "file spec has an empty path".to_string(),
            ));
        }
        Ok(())
    }
}

/// Extracts file specs from an artifact value: a list of specs, a single
/// spec, or a record carrying a `files` sequence.
pub fn file_specs_from_value(value: &Value) -> Result<Vec<FileSpec>> {
    let specs: Vec<FileSpec> = match value {
        Value::Array(_) => serde_json::from_value(value.clone())
            .map_err(|e| ExecutorError::Config(format!("not a list of file specs: {e}")))?,
        Value::Object(map) if map.contains_key("files") => {
            serde_json::from_value(map["files"].clone())
                .map_err(|e| ExecutorError::Config(format!("'files' is not a list of file specs: {e}")))?
        }
        Value::Object(_) => vec![serde_json::from_value(value.clone())
            .map_err(|e| ExecutorError::Config(format!("not a file spec: {e}")))?],
        other => {
            return Err(ExecutorError::Config(format!(
                "expected file specs, got: {other}"
            )))
        }
    };

    for spec in &specs {
        spec.validate()?;
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_path_is_invalid() {
        assert!(FileSpec::new("", "x").validate().is_err());
        assert!(FileSpec::new("a.txt", "").validate().is_ok());
    }

    #[test]
    fn test_from_list() {
        let specs = file_specs_from_value(&json!([
            {"path": "a.txt", "content": "A"},
            {"path": "b.txt", "content": "B"}
        ]))
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0], FileSpec::new("a.txt", "A"));
    }

    #[test]
    fn test_from_single_spec() {
        let specs = file_specs_from_value(&json!({"path": "a.txt", "content": "A"})).unwrap();
        assert_eq!(specs, vec![FileSpec::new("a.txt", "A")]);
    }

    #[test]
    fn test_from_record_with_files() {
        let specs =
            file_specs_from_value(&json!({"files": [{"path": "a.txt", "content": "A"}]})).unwrap();
        assert_eq!(specs, vec![FileSpec::new("a.txt", "A")]);
    }

    #[test]
    fn test_missing_content_defaults_empty() {
        let specs = file_specs_from_value(&json!([{"path": "a.txt"}])).unwrap();
        assert_eq!(specs[0].content, "");
    }

    #[test]
    fn test_non_spec_values_rejected() {
        assert!(file_specs_from_value(&json!("a.txt")).is_err());
        assert!(file_specs_from_value(&json!([{"content": "no path"}])).is_err());
        assert!(file_specs_from_value(&json!([{"path": "", "content": "x"}])).is_err());
    }
}
