//! arbiter command-line interface.
//!
//! Three subcommands: `review` evaluates an artifact through the backend
//! registry, `resolve` computes a deterministic verdict from an existing
//! markdown summary, and `providers` lists slot availability.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use arbiter_core::{evaluate_summary, format_comparison_report, evaluate_verdicts, VerdictPolicy};
use arbiter_runtime::{BackendRegistry, ReviewOptions, ReviewRunner, TracingConfig};

#[derive(Parser)]
#[command(name = "arbiter", version, about = "LLM review orchestration and verdict resolution")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Worst,
    Majority,
}

impl From<PolicyArg> for VerdictPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Worst => VerdictPolicy::Worst,
            PolicyArg::Majority => VerdictPolicy::Majority,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReviewFormat {
    Text,
    Json,
    Report,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResolveFormat {
    Verdict,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate an artifact with one or two backends
    Review {
        /// Context markdown file; stdin when omitted
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Unified diff file
        #[arg(long)]
        diff_file: Option<PathBuf>,

        /// Model override for the first backend
        #[arg(long)]
        model: Option<String>,

        /// Model for the second backend in compare mode
        #[arg(long)]
        model2: Option<String>,

        /// Explicit provider (openai | anthropic | github-models)
        #[arg(long)]
        provider: Option<String>,

        /// Evaluate on two distinct backends and compare
        #[arg(long)]
        compare: bool,

        /// Policy for resolving compared verdicts
        #[arg(long, value_enum, default_value_t = PolicyArg::Worst)]
        policy: PolicyArg,

        #[arg(long, value_enum, default_value_t = ReviewFormat::Text)]
        format: ReviewFormat,

        /// Write output here instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
    },

    /// Resolve a verdict from an existing markdown summary
    Resolve {
        /// Summary file path; '-' reads stdin
        #[arg(long, default_value = "-")]
        summary_path: String,

        #[arg(long, value_enum, default_value_t = PolicyArg::Worst)]
        policy: PolicyArg,

        #[arg(long, value_enum, default_value_t = ResolveFormat::Verdict)]
        format: ResolveFormat,
    },

    /// List configured providers and credential availability
    Providers,
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read stdin")?;
    Ok(buffer)
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => read_stdin(),
    }
}

fn emit(output: &str, output_file: Option<&PathBuf>) -> Result<()> {
    match output_file {
        Some(path) => std::fs::write(path, output)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{}", output.trim_end());
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_review(
    context_file: Option<PathBuf>,
    diff_file: Option<PathBuf>,
    model: Option<String>,
    model2: Option<String>,
    provider: Option<String>,
    compare: bool,
    policy: PolicyArg,
    format: ReviewFormat,
    output_file: Option<PathBuf>,
) -> Result<()> {
    let context = read_input(context_file.as_ref())?;
    let diff = diff_file
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))
        })
        .transpose()?;

    let runner = ReviewRunner::new(BackendRegistry::from_env(), TracingConfig::from_env());
    let opts = ReviewOptions {
        provider,
        model,
        custom_prompt: None,
    };

    if compare {
        let reviews = runner
            .compare(&context, diff.as_deref(), &opts, model2.as_deref())
            .await;
        let report = format_comparison_report(&reviews);
        let verdicts: Vec<_> = reviews
            .iter()
            .enumerate()
            .map(|(index, review)| review.to_provider_verdict(index))
            .collect();
        let resolution = evaluate_verdicts(&verdicts, policy.into());

        let output = match format {
            ReviewFormat::Json => serde_json::to_string_pretty(&json!({
                "results": reviews,
                "report": report,
                "resolution": resolution,
            }))?,
            _ => {
                let mut out = report;
                out.push_str(&format!("\n### Resolution ({})\n", resolution.policy));
                out.push_str(&format!("- Verdict: {}\n", resolution.verdict));
                if resolution.needs_human {
                    out.push_str(&format!(
                        "- Needs human review: {}\n",
                        resolution.needs_human_reason
                    ));
                }
                out
            }
        };
        return emit(&output, output_file.as_ref());
    }

    let review = runner.evaluate(&context, diff.as_deref(), &opts).await;
    let output = match format {
        ReviewFormat::Json => serde_json::to_string_pretty(&review)?,
        ReviewFormat::Report => format_comparison_report(std::slice::from_ref(&review)),
        ReviewFormat::Text => {
            let mut out = format!("Verdict: {}\n", review.verdict);
            if let Some(summary) = &review.summary {
                out.push_str(&format!("Summary: {}\n", summary));
            }
            for concern in &review.concerns {
                out.push_str(&format!("Concern: {}\n", concern));
            }
            if let Some(error) = &review.error {
                out.push_str(&format!("Error: {}\n", error));
            }
            out
        }
    };
    emit(&output, output_file.as_ref())
}

fn run_resolve(summary_path: &str, policy: PolicyArg, format: ResolveFormat) -> Result<()> {
    let summary = if summary_path == "-" {
        read_stdin()?
    } else {
        std::fs::read_to_string(summary_path)
            .with_context(|| format!("failed to read {}", summary_path))?
    };

    let result = evaluate_summary(&summary, policy.into());
    match format {
        ResolveFormat::Verdict => {
            println!("{}", result.verdict);
            if result.needs_human {
                eprintln!("needs human review: {}", result.needs_human_reason);
            }
        }
        ResolveFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}

fn run_providers() -> Result<()> {
    let registry = BackendRegistry::from_env();
    let availability = registry.availability();
    for slot in registry.slots() {
        let canonical = arbiter_runtime::normalize_provider(&slot.provider);
        let mark = if availability.get(&canonical).copied().unwrap_or(false) {
            "✓"
        } else {
            "✗"
        };
        println!("{} {} ({})", mark, canonical, slot.model);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Review {
            context_file,
            diff_file,
            model,
            model2,
            provider,
            compare,
            policy,
            format,
            output_file,
        } => {
            run_review(
                context_file,
                diff_file,
                model,
                model2,
                provider,
                compare,
                policy,
                format,
                output_file,
            )
            .await
        }
        Command::Resolve {
            summary_path,
            policy,
            format,
        } => run_resolve(&summary_path, policy, format),
        Command::Providers => run_providers(),
    }
}
