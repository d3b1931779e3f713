//! CLI command definitions for question-certify.
//!
//! This module provides the command-line front-end over the batch
//! orchestrator: validating submission files and listing templates.

use crate::batch::{load_document, BatchConfig, BatchOrchestrator, BatchReport};
use crate::curriculum::CurriculumIndex;
use crate::validation::{Severity, TemplateContract};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Most invalid items listed in the human-readable summary.
const MAX_LISTED_FAILURES: usize = 20;

/// Certification of educational question items.
#[derive(Parser)]
#[command(name = "question-certify")]
#[command(about = "Certify educational question items before publication")]
#[command(version)]
#[command(
    long_about = "question-certify runs every item of a question submission through schema, template, metadata and quality checks and reports the results per item and per batch.\n\nExample usage:\n  question-certify validate bank.json --curriculum curriculum.yaml --csv report.csv"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Validate a submission file and report per-item and batch results.
    #[command(alias = "check")]
    Validate(ValidateArgs),

    /// List supported templates with their family and required payload fields.
    Templates(TemplatesArgs),
}

/// Arguments for `question-certify validate`.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Submission file (.json, .yaml or .yml): an item array or a document with `items`.
    pub input: PathBuf,

    /// Curriculum index file (.json, .yaml or .yml) enabling reference checks.
    #[arg(short = 'c', long)]
    pub curriculum: Option<PathBuf>,

    /// Number of items validated concurrently (overrides CERTIFY_MAX_PARALLEL).
    #[arg(short = 'p', long)]
    pub max_parallel: Option<usize>,

    /// Skip duplicate item id detection.
    #[arg(long)]
    pub no_duplicate_check: bool,

    /// Per-item timeout in seconds, 0 disables it (overrides CERTIFY_ITEM_TIMEOUT_SECS).
    #[arg(long)]
    pub item_timeout_secs: Option<u64>,

    /// Session id echoed in the report (overrides CERTIFY_SESSION_ID).
    #[arg(long)]
    pub session_id: Option<String>,

    /// Write the full JSON report to this file.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write the CSV projection to this file.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Print the JSON report instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Fail when any item is invalid or a CRITICAL batch issue exists.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `question-certify templates`.
#[derive(Parser, Debug)]
pub struct TemplatesArgs {
    /// Output the template list as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Validate(args) => run_validate_command(args).await,
        Commands::Templates(args) => run_templates_command(args),
    }
}

// ============================================================================
// Validate Command Implementation
// ============================================================================

/// Builds the batch configuration: defaults, then environment, then flags.
fn build_config(args: &ValidateArgs) -> anyhow::Result<BatchConfig> {
    let mut config = BatchConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Invalid environment configuration: {}", e))?;

    if let Some(max_parallel) = args.max_parallel {
        config = config.with_max_parallel(max_parallel);
    }
    if args.no_duplicate_check {
        config = config.with_duplicate_check(false);
    }
    if let Some(secs) = args.item_timeout_secs {
        config = config.with_item_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    if let Some(session_id) = &args.session_id {
        config = config.with_session_id(session_id.clone());
    }
    if let Some(path) = &args.curriculum {
        let index = CurriculumIndex::from_path(path).map_err(|e| {
            anyhow::anyhow!("Failed to load curriculum index {}: {}", path.display(), e)
        })?;
        config = config.with_curriculum_index(Arc::new(index));
    }

    config.validate()?;
    Ok(config)
}

async fn run_validate_command(args: ValidateArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        return Err(anyhow::anyhow!(
            "Input file does not exist: {}",
            args.input.display()
        ));
    }

    let document = load_document(&args.input)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", args.input.display(), e))?;

    let last_decile = Arc::new(AtomicUsize::new(0));
    let config = build_config(&args)?.with_progress_callback(move |progress| {
        let decile = (progress.percent_complete / 10.0).floor() as usize;
        if decile > last_decile.fetch_max(decile, Ordering::SeqCst) {
            info!(
                completed = progress.completed,
                total = progress.total,
                percent = progress.percent_complete,
                "Validation progress"
            );
        }
    });

    let orchestrator = BatchOrchestrator::new(config);
    let signal = orchestrator.cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling remaining items");
            signal.cancel();
        }
    });

    let report = orchestrator.validate_submission(document).await;
    interrupt.abort();

    if let Some(path) = &args.output {
        report.write_json(path)?;
        info!(path = %path.display(), "Wrote JSON report");
    }
    if let Some(path) = &args.csv {
        report.write_csv(path)?;
        info!(path = %path.display(), "Wrote CSV report");
    }

    if args.json {
        let json_output = report
            .to_json()
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
    } else {
        print_summary(&report);
    }

    if args.strict && report.has_blocking_issues() {
        anyhow::bail!(
            "Certification failed: {} invalid item(s), {} critical batch issue(s)",
            report.summary.invalid_items,
            report
                .global_issues
                .iter()
                .filter(|g| g.issue.severity == Severity::Critical)
                .count()
        );
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let summary = &report.summary;
    let status_icon = if report.has_blocking_issues() { "✗" } else { "✓" };

    println!("{} Certification completed", status_icon);
    println!("  Session: {}", report.session_id);
    println!(
        "  Items: {} total, {} valid, {} invalid, {} with warnings",
        report.total_items, summary.valid_items, summary.invalid_items, summary.with_warnings
    );

    let grades: Vec<String> = summary
        .quality_grade_distribution
        .iter()
        .map(|(grade, count)| format!("{}={}", grade, count))
        .collect();
    println!("  Quality grades: {}", grades.join(" "));
    println!(
        "  Elapsed: {}ms ({:.2}ms per item)",
        report.performance_metrics.total_time_ms,
        report.performance_metrics.average_time_per_item_ms
    );

    if !summary.error_code_frequency.is_empty() {
        println!("  Error codes:");
        for (code, count) in &summary.error_code_frequency {
            println!("    {}: {}", code, count);
        }
    }

    if !report.global_issues.is_empty() {
        println!("  Batch issues:");
        for global in &report.global_issues {
            println!(
                "    [{}] {}: {}",
                global.issue.severity, global.issue.code, global.issue.message
            );
        }
    }

    let failures: Vec<_> = report.item_results.iter().filter(|r| !r.is_valid).collect();
    if !failures.is_empty() {
        println!("  Invalid items:");
        for result in failures.iter().take(MAX_LISTED_FAILURES) {
            if let Some(first) = result.errors.first() {
                println!("    {} {}: {}", result.item_id, first.code, first.message);
            }
        }
        if failures.len() > MAX_LISTED_FAILURES {
            println!("    ... and {} more", failures.len() - MAX_LISTED_FAILURES);
        }
    }
}

// ============================================================================
// Templates Command Implementation
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct TemplateEntry {
    id: &'static str,
    family: &'static str,
    required_payload_fields: Vec<&'static str>,
}

fn template_entries() -> Vec<TemplateEntry> {
    TemplateContract::all()
        .into_iter()
        .map(|contract| TemplateEntry {
            id: contract.template.as_str(),
            family: contract.family().as_str(),
            required_payload_fields: contract.required_payload_fields.to_vec(),
        })
        .collect()
}

fn run_templates_command(args: TemplatesArgs) -> anyhow::Result<()> {
    let entries = template_entries();

    if args.json {
        let json_output = serde_json::to_string_pretty(&entries)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    println!("Templates ({}):", entries.len());
    for entry in &entries {
        let fields = if entry.required_payload_fields.is_empty() {
            "-".to_string()
        } else {
            entry.required_payload_fields.join(", ")
        };
        println!("  {:<18} {:<10} {}", entry.id, entry.family, fields);
    }
    Ok(())
}
