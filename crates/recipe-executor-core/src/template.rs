// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Liquid-style template rendering against a Context.
//!
//! String fields in step configs are templates; they render against the
//! artifact map (top level) and the config map (under `config`). Rendering is
//! pure. Missing variables render as empty: referenced-but-absent top-level
//! names are seeded as nil before rendering so that the `default` filter and
//! conditionals behave the way recipe authors expect.

use crate::context::Context;
use crate::error::{ExecutorError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

static PARSER: Lazy<liquid::Parser> = Lazy::new(|| {
    liquid::ParserBuilder::with_stdlib()
        .build()
        .expect("Failed to build liquid parser")
});

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}|\{%(.*?)%\}").expect("tag regex"));

static STRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).expect("string regex"));

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("ident regex"));

/// Words that can appear inside Liquid tags without being variables.
const RESERVED: &[&str] = &[
    "if", "elsif", "else", "endif", "unless", "endunless", "for", "endfor", "in", "and", "or",
    "not", "contains", "true", "false", "nil", "null", "empty", "blank", "limit", "offset",
    "reversed", "break", "continue", "case", "when", "endcase", "assign", "capture", "endcapture",
    "increment", "decrement", "cycle", "include", "render", "with", "as", "forloop", "tablerow",
    "endtablerow", "raw", "endraw", "comment", "endcomment",
];

/// Renders a template string against the context.
pub fn render(template: &str, context: &Context) -> Result<String> {
    if !template.contains("{{") && !template.contains("{%") {
        return Ok(template.to_string());
    }

    let parsed = PARSER
        .parse(template)
        .map_err(|e| ExecutorError::Template(format!("{e} in {}", fragment(template))))?;

    let globals = build_globals(context, template)?;
    parsed
        .render(&globals)
        .map_err(|e| ExecutorError::Template(format!("{e} in {}", fragment(template))))
}

/// Renders every string inside a JSON value, recursing through arrays and
/// objects. Non-string leaves pass through unchanged.
pub fn render_value(value: &Value, context: &Context) -> Result<Value> {
    match value {
        Value::String(template) => Ok(Value::String(render(template, context)?)),
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(item, context))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| Ok((key.clone(), render_value(item, context)?)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

fn build_globals(context: &Context, template: &str) -> Result<liquid::Object> {
    let mut globals = liquid::Object::new();

    globals.insert(
        liquid::model::KString::from_static("config"),
        to_liquid(&Value::Object(
            context
                .config()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ))?,
    );

    for (key, value) in context.artifacts() {
        globals.insert(key.clone().into(), to_liquid(value)?);
    }

    for name in referenced_names(template) {
        if !globals.contains_key(name.as_str()) {
            globals.insert(name.into(), liquid::model::Value::Nil);
        }
    }

    Ok(globals)
}

fn to_liquid(value: &Value) -> Result<liquid::model::Value> {
    liquid::model::to_value(value)
        .map_err(|e| ExecutorError::Template(format!("unrenderable value: {e}")))
}

/// Top-level identifiers mentioned inside `{{ }}` / `{% %}` tags.
fn referenced_names(template: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    for capture in TAG_RE.captures_iter(template) {
        let inner = capture
            .get(1)
            .or_else(|| capture.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        let without_strings = STRING_RE.replace_all(inner, " ");
        for ident in IDENT_RE.find_iter(&without_strings) {
            let word = ident.as_str();
            if !RESERVED.contains(&word) {
                names.insert(word.to_string());
            }
        }
    }
    names
}

fn fragment(template: &str) -> String {
    const MAX: usize = 120;
    let mut out: String = template.chars().take(MAX).collect();
    if template.chars().nth(MAX).is_some() {
        out.push('…');
    }
    format!("template: {out}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn context_with(pairs: &[(&str, Value)]) -> Context {
        let artifacts = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Context::new(artifacts, BTreeMap::new())
    }

    #[test]
    fn test_plain_text_passes_through() {
        let ctx = Context::default();
        assert_eq!(render("no templates here", &ctx).unwrap(), "no templates here");
    }

    #[test]
    fn test_variable_interpolation() {
        let ctx = context_with(&[("name", json!("Ada"))]);
        assert_eq!(render("hi {{name}}", &ctx).unwrap(), "hi Ada");
        assert_eq!(render("hi {{ name }}", &ctx).unwrap(), "hi Ada");
    }

    #[test]
    fn test_dotted_traversal() {
        let ctx = context_with(&[("spec", json!({"meta": {"title": "Billing"}}))]);
        assert_eq!(render("{{ spec.meta.title }}", &ctx).unwrap(), "Billing");
    }

    #[test]
    fn test_sequence_index_traversal() {
        let ctx = context_with(&[("items", json!(["a", "b", "c"]))]);
        assert_eq!(render("{{ items[1] }}", &ctx).unwrap(), "b");
        assert_eq!(render("{{ items | first }}", &ctx).unwrap(), "a");
        assert_eq!(render("{{ items | last }}", &ctx).unwrap(), "c");
    }

    #[test]
    fn test_non_string_values_coerce() {
        let ctx = context_with(&[("n", json!(42)), ("flag", json!(true))]);
        assert_eq!(render("{{n}}/{{flag}}", &ctx).unwrap(), "42/true");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let ctx = Context::default();
        assert_eq!(render("[{{ absent }}]", &ctx).unwrap(), "[]");
    }

    #[test]
    fn test_missing_variable_with_default_filter() {
        let ctx = Context::default();
        assert_eq!(
            render(r#"{{ absent | default: "fallback" }}"#, &ctx).unwrap(),
            "fallback"
        );
    }

    #[test]
    fn test_filters() {
        let ctx = context_with(&[("word", json!("Rust")), ("csv", json!("a,b,c"))]);
        assert_eq!(render("{{ word | upcase }}", &ctx).unwrap(), "RUST");
        assert_eq!(render("{{ word | downcase }}", &ctx).unwrap(), "rust");
        assert_eq!(
            render(r#"{{ word | replace: "R", "D" }}"#, &ctx).unwrap(),
            "Dust"
        );
        assert_eq!(
            render(r#"{{ csv | split: "," | first }}"#, &ctx).unwrap(),
            "a"
        );
        assert_eq!(render("{{ word | size }}", &ctx).unwrap(), "4");
    }

    #[test]
    fn test_control_flow() {
        let ctx = context_with(&[("ready", json!(true)), ("items", json!([1, 2, 3]))]);
        assert_eq!(
            render("{% if ready %}go{% else %}wait{% endif %}", &ctx).unwrap(),
            "go"
        );
        assert_eq!(
            render("{% unless ready %}wait{% endunless %}", &ctx).unwrap(),
            ""
        );
        assert_eq!(
            render("{% for i in items %}{{ i }}-{% endfor %}", &ctx).unwrap(),
            "1-2-3-"
        );
    }

    #[test]
    fn test_config_namespace() {
        let mut config = BTreeMap::new();
        config.insert("model".to_string(), json!("openai/gpt-4o"));
        let ctx = Context::new(BTreeMap::new(), config);
        assert_eq!(render("{{ config.model }}", &ctx).unwrap(), "openai/gpt-4o");
    }

    #[test]
    fn test_rendering_is_pure_and_repeatable() {
        let ctx = context_with(&[("name", json!("Ada"))]);
        let once = render("hi {{name}}", &ctx).unwrap();
        let twice = render("hi {{name}}", &ctx).unwrap();
        assert_eq!(once, twice);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_syntax_error_is_template_error() {
        let ctx = Context::default();
        match render("{% if %}", &ctx) {
            Err(ExecutorError::Template(msg)) => assert!(msg.contains("template:"), "{msg}"),
            other => panic!("Expected TemplateError, got {other:?}"),
        }
    }

    #[test]
    fn test_render_value_recurses() {
        let ctx = context_with(&[("name", json!("Ada"))]);
        let value = json!({
            "greeting": "hi {{name}}",
            "nested": ["{{name}}", 7],
            "untouched": true
        });
        assert_eq!(
            render_value(&value, &ctx).unwrap(),
            json!({"greeting": "hi Ada", "nested": ["Ada", 7], "untouched": true})
        );
    }

    #[test]
    fn test_referenced_names_skips_reserved_and_strings() {
        let names = referenced_names(r#"{% if count and ready %}{{ msg | default: "none" }}{% endif %}"#);
        assert!(names.contains("count"));
        assert!(names.contains("ready"));
        assert!(names.contains("msg"));
        assert!(!names.contains("if"));
        assert!(!names.contains("none"));
    }
}
