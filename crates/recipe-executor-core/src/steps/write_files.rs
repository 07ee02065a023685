// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `write_files` step: write file specs to disk.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use crate::filespec::{file_specs_from_value, FileSpec};
use crate::step::{parse_config, Step};
use crate::template::render;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// `write_files` configuration.
#[derive(Debug, Deserialize)]
pub struct WriteFilesConfig {
    /// Inline file specs; path and content are templated.
    #[serde(default)]
    pub files: Option<Vec<FileSpec>>,

    /// Artifact key holding file specs produced by an earlier step.
    #[serde(default)]
    pub files_key: Option<String>,

    /// Directory the spec paths are joined to; templated. Empty means the
    /// current working directory.
    #[serde(default)]
    pub root: String,
}

/// Writes files under a root directory, creating intermediate directories.
pub struct WriteFilesStep {
    config: WriteFilesConfig,
}

impl WriteFilesStep {
    /// Registry factory.
    pub fn from_config(config: &Map<String, Value>) -> Result<Box<dyn Step>> {
        Ok(Box::new(Self {
            config: parse_config("write_files", config)?,
        }))
    }
}

#[async_trait]
impl Step for WriteFilesStep {
    async fn execute(&self, context: &mut Context) -> Result<()> {
        let root = render(&self.config.root, context)?;

        let specs: Vec<FileSpec> = if let Some(files) = &self.config.files {
            files
                .iter()
                .map(|spec| {
                    Ok(FileSpec {
                        path: render(&spec.path, context)?,
                        content: render(&spec.content, context)?,
                    })
                })
                .collect::<Result<_>>()?
        } else if let Some(files_key) = &self.config.files_key {
            let key = render(files_key, context)?;
            let value = context.get(&key).ok_or_else(|| {
                ExecutorError::Config(format!("write_files: artifact '{key}' not found"))
            })?;
            file_specs_from_value(value)?
        } else {
            return Err(ExecutorError::Config(
                "write_files requires either 'files' or 'files_key'".to_string(),
            ));
        };

        for spec in &specs {
            spec.validate()?;
            let target = if root.is_empty() {
                PathBuf::from(&spec.path)
            } else {
                Path::new(&root).join(&spec.path)
            };

            if let Some(parent) = target.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| ExecutorError::Io {
                            path: parent.to_path_buf(),
                            source: e,
                        })?;
                }
            }

            tokio::fs::write(&target, spec.content.as_bytes())
                .await
                .map_err(|e| ExecutorError::Io {
                    path: target.clone(),
                    source: e,
                })?;

            info!(path = %target.display(), bytes = spec.content.len(), "Wrote file");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(config: Value) -> Box<dyn Step> {
        let Value::Object(map) = config else {
            panic!("config must be an object")
        };
        WriteFilesStep::from_config(&map).unwrap()
    }

    #[tokio::test]
    async fn test_inline_files_templated() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::default();
        ctx.set("name", json!("greeting"));
        ctx.set("body", json!("hello"));

        step(json!({
            "files": [ { "path": "{{name}}.txt", "content": "{{body}}" } ],
            "root": dir.path().display().to_string()
        }))
        .execute(&mut ctx)
        .await
        .unwrap();

        let written = std::fs::read_to_string(dir.path().join("greeting.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn test_files_key_with_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::default();
        ctx.set(
            "generated",
            json!([{ "path": "src/lib/util.rs", "content": "pub fn noop() {}" }]),
        );

        step(json!({
            "files_key": "generated",
            "root": dir.path().display().to_string()
        }))
        .execute(&mut ctx)
        .await
        .unwrap();

        let written = std::fs::read_to_string(dir.path().join("src/lib/util.rs")).unwrap();
        assert_eq!(written, "pub fn noop() {}");
    }

    #[tokio::test]
    async fn test_files_key_accepts_record_with_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::default();
        ctx.set(
            "result",
            json!({ "files": [{ "path": "out.txt", "content": "X" }] }),
        );

        step(json!({
            "files_key": "result",
            "root": dir.path().display().to_string()
        }))
        .execute(&mut ctx)
        .await
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "X"
        );
    }

    #[tokio::test]
    async fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.txt"), "old").unwrap();

        let mut ctx = Context::default();
        step(json!({
            "files": [ { "path": "out.txt", "content": "new" } ],
            "root": dir.path().display().to_string()
        }))
        .execute(&mut ctx)
        .await
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_config_error() {
        let mut ctx = Context::default();
        let result = step(json!({})).execute(&mut ctx).await;
        assert!(matches!(result, Err(ExecutorError::Config(_))));

        let result = step(json!({"files_key": "absent"})).execute(&mut ctx).await;
        assert!(matches!(result, Err(ExecutorError::Config(_))));
    }

    #[tokio::test]
    async fn test_non_list_source_is_config_error() {
        let mut ctx = Context::default();
        ctx.set("bad", json!(42));
        let result = step(json!({"files_key": "bad"})).execute(&mut ctx).await;
        assert!(matches!(result, Err(ExecutorError::Config(_))));
    }
}
