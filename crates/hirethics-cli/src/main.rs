//! `hirethics` command line.
//!
//! Results go to stdout as JSON; logs go to stderr (`RUST_LOG`, default
//! `info`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hirethics_core::{BatchReport, CandidateAudit, JobProfile, ProxyBlinder};
use hirethics_runtime::{
    AuditEngine, CancellationFlag, CandidateInput, ProviderSettings, RuntimeConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "hirethics",
    version,
    about = "Score candidates against a weighted rubric and audit the scoring for proxy bias"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a job profile and its rubric
    Validate {
        /// Job profile (YAML or JSON)
        job: PathBuf,
    },

    /// Print the blinded text of a CV and what was removed
    Blind {
        /// CV as plain text
        cv: PathBuf,

        /// Runtime config (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Audit CVs against a job and print the batch report
    Audit {
        /// Job profile (YAML or JSON)
        #[arg(long)]
        job: PathBuf,

        /// CVs as plain text
        #[arg(required = true)]
        cvs: Vec<PathBuf>,

        /// Runtime config (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Top-k for the overlap statistic (default: config's default_top_k)
        #[arg(short, long)]
        k: Option<usize>,

        /// Primary scorer provider, e.g. "openai"
        #[arg(long)]
        provider: Option<String>,
    },
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    valid: bool,
    title: &'a str,
    criteria: usize,
    weight_sum: f64,
}

#[derive(Serialize)]
struct AuditOutput<'a> {
    job_id: &'a str,
    batch_id: &'a str,
    primary_scored: usize,
    fallback_scored: usize,
    candidates: &'a [CandidateAudit],
    report: &'a BatchReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { job } => validate(&job),
        Command::Blind { cv, config } => blind(&cv, config.as_deref()),
        Command::Audit {
            job,
            cvs,
            config,
            k,
            provider,
        } => audit(&job, &cvs, config.as_deref(), k, provider).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn validate(path: &Path) -> Result<()> {
    let profile = load_job(path)?;
    let weight_sum = profile.rubric.criteria().iter().map(|c| c.weight).sum();
    print_json(&ValidateOutput {
        valid: true,
        title: &profile.title,
        criteria: profile.rubric.len(),
        weight_sum,
    })
}

fn blind(cv: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let text = read_text(cv)?;
    let blinder = ProxyBlinder::from_config(&config.audit).context("Invalid blinding config")?;
    print_json(&blinder.blind(&text))
}

async fn audit(
    job: &Path,
    cvs: &[PathBuf],
    config: Option<&Path>,
    k: Option<usize>,
    provider: Option<String>,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(provider_type) = provider {
        let settings = config
            .provider
            .take()
            .filter(|p| p.provider_type == provider_type)
            .map(|p| p.settings)
            .unwrap_or_default();
        config.provider = Some(ProviderSettings {
            provider_type,
            settings,
        });
    }

    let engine = AuditEngine::builder()
        .config(config)
        .build()
        .context("Failed to start audit engine")?;

    let profile = load_job(job)?;
    let job_id = engine.create_job(profile)?;

    let inputs = cvs
        .iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(CandidateInput::new(read_text(path)?).with_display_name(name))
        })
        .collect::<Result<Vec<_>>>()?;
    let candidate_ids = engine.add_candidates(&job_id, inputs)?;

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight candidates");
            on_interrupt.cancel();
        }
    });

    let run = engine
        .run_batch(&job_id, &candidate_ids, &cancel)
        .await
        .context("Batch run failed")?;
    let report: Arc<BatchReport> = engine.get_report(run.batch_id(), k).await?;

    print_json(&AuditOutput {
        job_id: &job_id,
        batch_id: run.batch_id(),
        primary_scored: run.primary_scored,
        fallback_scored: run.fallback_scored,
        candidates: &run.record.candidates,
        report: &report,
    })
}

fn load_job(path: &Path) -> Result<JobProfile> {
    JobProfile::from_file(path)
        .with_context(|| format!("Invalid job profile: {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Invalid config: {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn read_text(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if text.trim().is_empty() {
        tracing::warn!(path = %path.display(), "CV is empty, all scores will be zero");
    }
    Ok(text)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
