//! Schema Reconcile CLI
//!
//! Reconciles the terminology table, class model and API schema into
//! per-entity template datasets.

use anyhow::Context;
use clap::Parser;
use schema_reconciler::{OutputFormat, Reconciler, ReconcilerConfig, Sources};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-reconcile")]
#[command(about = "Reconcile a class model, terminology table and API schema into entity templates")]
struct Cli {
    /// Config file (layered over reconciler.toml and the environment)
    #[arg(short, long)]
    config: Option<String>,

    /// Terminology table (JSON)
    #[arg(long)]
    terminology: Option<PathBuf>,

    /// Class model (JSON)
    #[arg(long)]
    class_model: Option<PathBuf>,

    /// OpenAPI document (JSON)
    #[arg(long)]
    api_schema: Option<PathBuf>,

    /// Deliverable output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Exit with status 2 when any warning was reported
    #[arg(long)]
    deny_warnings: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_directive = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = ReconcilerConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    let terminology = input(cli.terminology, &config.inputs.terminology, "--terminology")?;
    let class_model = input(cli.class_model, &config.inputs.class_model, "--class-model")?;
    let api_schema = input(cli.api_schema, &config.inputs.api_schema, "--api-schema")?;
    let output = cli.output.or_else(|| config.output.path.clone());
    let format = config.output.format;

    let sources = Sources::load(&terminology, &class_model, &api_schema)?;
    let deliverable = Reconciler::new(config, sources)?.run();

    let json = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(&deliverable)?,
        OutputFormat::Compact => serde_json::to_string(&deliverable)?,
    };
    match &output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("📦 Deliverable written to {}", path.display());
        }
        None => println!("{}", json),
    }

    let diagnostics = &deliverable.diagnostics;
    if !diagnostics.is_empty() {
        eprintln!();
        eprintln!("{}", diagnostics.format_all());
    }
    eprintln!(
        "✅ {} datasets, {} excluded, {} warnings, {} errors",
        deliverable.datasets.len(),
        deliverable.metadata.excluded.len(),
        diagnostics.warning_count(),
        diagnostics.error_count()
    );

    if cli.deny_warnings && (diagnostics.has_warnings() || diagnostics.has_errors()) {
        eprintln!("❌ Warnings denied");
        return Ok(2);
    }
    Ok(0)
}

fn input(flag: Option<PathBuf>, configured: &Option<PathBuf>, name: &str) -> anyhow::Result<PathBuf> {
    flag.or_else(|| configured.clone())
        .with_context(|| format!("no {} given on the command line or in [inputs]", name))
}
