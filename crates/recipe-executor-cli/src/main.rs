// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: Apache-2.0

//! Recipe Executor CLI.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use recipe_executor_core::{Context, Executor, Recipe, RecipeSource};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variables lowered into context config keys.
const CONFIG_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "OLLAMA_BASE_URL",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_BASE_URL",
    "AZURE_OPENAI_API_VERSION",
    "AZURE_OPENAI_DEPLOYMENT_NAME",
    "AZURE_USE_MANAGED_IDENTITY",
    "AZURE_CLIENT_ID",
    "GEMINI_API_KEY",
];

#[derive(Parser)]
#[command(name = "recipe-executor")]
#[command(version, about = "Recipe pipeline executor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory receiving structured JSON logs
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recipe
    Run {
        /// Path to the recipe JSON file
        #[arg(value_name = "RECIPE")]
        recipe: String,

        /// Context seeds as key=value pairs
        #[arg(value_name = "KEY=VALUE")]
        context: Vec<String>,
    },

    /// Validate a recipe without executing it
    Validate {
        /// Path to the recipe JSON file
        #[arg(value_name = "RECIPE")]
        recipe: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.log_dir.as_deref()) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Run { recipe, context } => run_recipe(&recipe, &context).await,
        Commands::Validate { recipe } => validate_recipe(&recipe).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool, log_dir: Option<&std::path::Path>) -> Result<()> {
    let log_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("recipe_executor={log_level}").into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .boxed();

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let name = format!(
                "recipe-{}.log",
                chrono::Utc::now().format("%Y%m%dT%H%M%SZ")
            );
            let file = std::fs::File::create(dir.join(&name))
                .with_context(|| format!("Failed to create log file: {name}"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(Arc::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

async fn run_recipe(recipe_path: &str, seeds: &[String]) -> Result<()> {
    info!("Running recipe: {recipe_path}");
    println!("{} {recipe_path}", "Running recipe:".cyan().bold());

    let mut ctx = build_context(seeds)?;
    install_ctrl_c_handler(&ctx);

    Executor::new()
        .execute(RecipeSource::Path(PathBuf::from(recipe_path)), &mut ctx)
        .await
        .with_context(|| format!("Recipe execution failed: {recipe_path}"))?;

    println!("{}", "✓ Recipe completed successfully".green().bold());
    debug!(artifacts = %ctx.dump(), "Final context");
    Ok(())
}

async fn validate_recipe(recipe_path: &str) -> Result<()> {
    info!("Validating recipe: {recipe_path}");
    println!("{} {recipe_path}", "Validating recipe:".cyan().bold());

    let recipe = Recipe::load(RecipeSource::Path(PathBuf::from(recipe_path)))
        .await
        .with_context(|| format!("Failed to load recipe: {recipe_path}"))?;

    Executor::new()
        .validate(&recipe)
        .with_context(|| "Recipe validation failed")?;

    println!("{}", "✓ Recipe is valid".green().bold());
    println!("  Steps: {}", recipe.steps.len());
    Ok(())
}

/// Builds the run context: artifacts from `key=value` seeds, config from the
/// well-known environment variables (lowercased).
fn build_context(seeds: &[String]) -> Result<Context> {
    let mut artifacts = BTreeMap::new();
    for seed in seeds {
        let (key, value) = seed.split_once('=').with_context(|| {
            format!("Invalid context seed '{seed}' (expected key=value)")
        })?;
        artifacts.insert(key.to_string(), Value::String(value.to_string()));
    }

    let mut config = BTreeMap::new();
    for name in CONFIG_ENV_VARS {
        if let Ok(value) = std::env::var(name) {
            if !value.is_empty() {
                config.insert(name.to_ascii_lowercase(), Value::String(value));
            }
        }
    }

    debug!(config = %masked_summary(&config), "Seeded context config");
    Ok(Context::new(artifacts, config))
}

/// Cancels the run's token on Ctrl-C; pending steps observe it at their next
/// suspension point.
fn install_ctrl_c_handler(ctx: &Context) {
    let token = ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, cancelling recipe...".yellow());
            token.cancel();
        }
    });
}

/// Config keys with their values masked when they look credential-bearing.
fn masked_summary(config: &BTreeMap<String, Value>) -> String {
    let entries: Vec<String> = config
        .iter()
        .map(|(key, value)| {
            if key.contains("api_key") || key.contains("token") || key.contains("secret") {
                format!("{key}=***")
            } else {
                format!("{key}={value}")
            }
        })
        .collect();
    entries.join(", ")
}
