// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured-output handling: JSON extraction and schema validation.

use crate::facade::FacadeError;
use serde_json::Value;

/// Builds the system instruction requesting schema-conforming JSON output.
pub(crate) fn schema_instruction(schema: &Value) -> String {
    format!(
        "Respond with a single JSON document that conforms to this JSON schema:\n{schema}\nOutput only the JSON document, with no surrounding prose."
    )
}

/// Extracts a JSON value from model output.
///
/// Accepts bare JSON, JSON inside a fenced code block, or JSON embedded in
/// surrounding prose (first `{`/`[` to the matching end).
pub(crate) fn extract_json(text: &str) -> Result<Value, FacadeError> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = extract_fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(fenced.trim()) {
            return Ok(value);
        }
    }

    if let Some(start) = trimmed.find(['{', '[']) {
        if let Some(end) = trimmed.rfind(['}', ']']) {
            if end > start {
                if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(FacadeError::Validation(format!(
        "validation failed: response is not JSON: {}",
        truncate(trimmed, 200)
    )))
}

/// Validates `instance` against `schema`, reporting every mismatch with its
/// instance path.
pub(crate) fn validate(schema: &Value, instance: &Value) -> Result<(), FacadeError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| FacadeError::Validation(format!("invalid schema: {e}")))?;

    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|error| {
            let path = error.instance_path().to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            format!("{error} (at {path})")
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(FacadeError::Validation(format!(
            "validation failed: {}",
            errors.join("; ")
        )))
    }
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
