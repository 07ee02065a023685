// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end recipe scenarios driven through the public API.

use recipe_executor_core::{Context, Executor, ExecutorError, Recipe};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;

fn seeded(pairs: &[(&str, Value)]) -> Context {
    let artifacts = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Context::new(artifacts, BTreeMap::new())
}

async fn run(recipe_json: &str, ctx: &mut Context) {
    Executor::new()
        .run(&Recipe::parse(recipe_json).unwrap(), ctx)
        .await
        .unwrap();
}

#[tokio::test]
async fn set_then_read() {
    let mut ctx = Context::default();
    run(
        r#"[ { "type": "set_context", "config": { "key": "greeting", "value": "hello" } } ]"#,
        &mut ctx,
    )
    .await;
    assert_eq!(ctx.get("greeting"), Some(&json!("hello")));
}

#[tokio::test]
async fn template_substitution() {
    let mut ctx = seeded(&[("name", json!("Ada"))]);
    run(
        r#"[ { "type": "set_context", "config": { "key": "msg", "value": "hi {{name}}" } } ]"#,
        &mut ctx,
    )
    .await;
    assert_eq!(ctx.get("msg"), Some(&json!("hi Ada")));
}

#[tokio::test]
async fn loop_over_sequence_sequential() {
    let mut ctx = seeded(&[("nums", json!(["a", "b", "c"]))]);
    run(
        r#"[ { "type": "loop",
            "config": {
                "items": "nums", "item_key": "n", "max_concurrency": 1,
                "substeps": [
                    { "type": "set_context", "config": { "key": "n", "value": "{{n}}!" } }
                ],
                "result_key": "out"
            } } ]"#,
        &mut ctx,
    )
    .await;
    assert_eq!(ctx.get("out"), Some(&json!(["a!", "b!", "c!"])));
}

#[tokio::test]
async fn conditional_picks_branch() {
    let recipe = r#"[ { "type": "conditional",
        "config": {
            "condition": "{{flag}}",
            "if_true":  { "steps": [ { "type": "set_context", "config": { "key": "taken", "value": "T" } } ] },
            "if_false": { "steps": [ { "type": "set_context", "config": { "key": "taken", "value": "F" } } ] }
        } } ]"#;

    let mut ctx = seeded(&[("flag", json!(true))]);
    run(recipe, &mut ctx).await;
    assert_eq!(ctx.get("taken"), Some(&json!("T")));

    let mut ctx = seeded(&[("flag", json!(false))]);
    run(recipe, &mut ctx).await;
    assert_eq!(ctx.get("taken"), Some(&json!("F")));
}

#[tokio::test]
async fn execute_sub_recipe_shares_context() {
    let dir = tempfile::tempdir().unwrap();
    let child = dir.path().join("child.json");
    let mut file = std::fs::File::create(&child).unwrap();
    file.write_all(
        br#"[ { "type": "set_context", "config": { "key": "child", "value": "done" } } ]"#,
    )
    .unwrap();

    let mut ctx = Context::default();
    run(
        &format!(
            r#"[ {{ "type": "execute_recipe", "config": {{ "recipe_path": "{}" }} }} ]"#,
            child.display()
        ),
        &mut ctx,
    )
    .await;
    assert_eq!(ctx.get("child"), Some(&json!("done")));
}

#[tokio::test]
async fn parallel_isolation() {
    let mut ctx = Context::default();
    run(
        r#"[ { "type": "parallel",
            "config": {
                "max_concurrency": 0,
                "substeps": [
                    { "type": "execute_recipe", "config": { "recipe_path":
                        [ { "type": "set_context", "config": { "key": "work", "value": "A" } } ] } },
                    { "type": "execute_recipe", "config": { "recipe_path":
                        [ { "type": "set_context", "config": { "key": "work", "value": "B" } } ] } }
                ]
            } } ]"#,
        &mut ctx,
    )
    .await;
    assert!(!ctx.has("work"));
}

#[tokio::test]
async fn loop_fail_fast_on_and_off() {
    let failing = r#""substeps": [
        { "type": "conditional", "config": {
            "condition": "{{n}} == boom",
            "if_true": [ { "type": "read_files", "config": { "path": "/no/such/file", "content_key": "x" } } ],
            "if_false": [ { "type": "set_context", "config": { "key": "n", "value": "{{n}}!" } } ]
        } } ]"#;

    // fail_fast = true: the loop raises and the aggregate is not written.
    let mut ctx = seeded(&[("items", json!(["a", "boom", "c"]))]);
    let recipe = format!(
        r#"[ {{ "type": "loop", "config": {{
            "items": "items", "item_key": "n", "result_key": "out", {failing}
        }} }} ]"#
    );
    let result = Executor::new()
        .run(&Recipe::parse(&recipe).unwrap(), &mut ctx)
        .await;
    assert!(matches!(result, Err(ExecutorError::FileNotFound(_))));
    assert!(!ctx.has("out"));

    // fail_fast = false: two successes, one error record for index 1.
    let mut ctx = seeded(&[("items", json!(["a", "boom", "c"]))]);
    let recipe = format!(
        r#"[ {{ "type": "loop", "config": {{
            "items": "items", "item_key": "n", "result_key": "out",
            "fail_fast": false, {failing}
        }} }} ]"#
    );
    Executor::new()
        .run(&Recipe::parse(&recipe).unwrap(), &mut ctx)
        .await
        .unwrap();
    assert_eq!(ctx.get("out"), Some(&json!(["a!", null, "c!"])));
    let errors = ctx.get("out__errors").unwrap().as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["index"], json!(1));
}

#[tokio::test]
async fn read_write_roundtrip_preserves_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let original = dir.path().join("in.txt");
    let content = "line one\nline two\n\ttabbed — and unicode ✓\n";
    std::fs::write(&original, content).unwrap();

    let mut ctx = Context::default();
    run(
        &format!(
            r#"[
                {{ "type": "read_files", "config": {{ "path": "{}", "content_key": "body" }} }},
                {{ "type": "write_files", "config": {{
                    "root": "{}",
                    "files": [ {{ "path": "out.txt", "content": "{{{{body}}}}" }} ]
                }} }}
            ]"#,
            original.display(),
            dir.path().display()
        ),
        &mut ctx,
    )
    .await;

    let written = std::fs::read(dir.path().join("out.txt")).unwrap();
    assert_eq!(written, content.as_bytes());
}

#[tokio::test]
async fn guarded_recipe_is_a_fixed_point_after_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("output.md");
    let recipe = format!(
        r#"[ {{ "type": "conditional", "config": {{
            "condition": "not file_exists({marker})",
            "if_true": [
                {{ "type": "write_files", "config": {{
                    "root": "{root}",
                    "files": [ {{ "path": "output.md", "content": "generation 1" }} ]
                }} }}
            ]
        }} }} ]"#,
        marker = marker.display(),
        root = dir.path().display()
    );

    let mut ctx = Context::default();
    run(&recipe, &mut ctx).await;
    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "generation 1");

    // Second run: the guard holds, nothing is rewritten.
    std::fs::write(&marker, "untouched").unwrap();
    let mut ctx = Context::default();
    run(&recipe, &mut ctx).await;
    assert_eq!(std::fs::read_to_string(&marker).unwrap(), "untouched");
}

#[tokio::test]
async fn nested_loop_in_sub_recipe_within_branch_stays_isolated() {
    // A loop branch runs an inline sub-recipe; the sub-recipe's writes land
    // in the branch clone, not the parent.
    let mut ctx = seeded(&[("items", json!([1, 2]))]);
    run(
        r#"[ { "type": "loop", "config": {
            "items": "items", "item_key": "n", "result_key": "out",
            "substeps": [
                { "type": "execute_recipe", "config": { "recipe_path":
                    [ { "type": "set_context", "config": { "key": "inner", "value": "{{n}}" } } ] } }
            ]
        } } ]"#,
        &mut ctx,
    )
    .await;
    assert!(!ctx.has("inner"));
    assert_eq!(ctx.get("out"), Some(&json!([1, 2])));
}

#[tokio::test]
async fn loop_over_mapping_source() {
    let mut ctx = seeded(&[("ports", json!({"auth": 8001, "billing": 8002}))]);
    run(
        r#"[ { "type": "loop", "config": {
            "items": "ports", "item_key": "p", "result_key": "out",
            "substeps": [
                { "type": "set_context", "config": { "key": "p", "value": "port {{p}}" } }
            ]
        } } ]"#,
        &mut ctx,
    )
    .await;
    assert_eq!(
        ctx.get("out"),
        Some(&json!({"auth": "port 8001", "billing": "port 8002"}))
    );
}
