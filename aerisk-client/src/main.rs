//! Aerisk CLI (aerisk) - Main entry point
//!
//! Submits aviation sensor CSVs to the prediction backend, shows the last
//! results as a terminal dashboard and exports them as a PDF report.
//! Results are shared between invocations through the session file.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aerisk_client::probe::HealthState;
use aerisk_client::upload::validate_selection;
use aerisk_client::{
    BackoffPolicy, Dashboard, HttpBackend, NavigationState, ProbeSnapshot, ReportGenerator,
    SelectedFile, UploadOrchestrator,
};
use aerisk_common::analysis::{ANALYSIS_TYPES, DEFAULT_ANALYSIS_KEY};
use aerisk_common::config::{self, TomlConfig};
use aerisk_common::SessionContext;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for aerisk
#[derive(Parser, Debug)]
#[command(name = "aerisk")]
#[command(about = "Aviation risk analysis and fault prediction client")]
#[command(version)]
struct Args {
    /// Prediction backend base URL (overrides AERISK_API_BASE_URL and the config file)
    #[arg(long, global = true)]
    api_base_url: Option<String>,

    /// Session file shared between invocations
    #[arg(long, global = true, env = "AERISK_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is reachable
    Status {
        /// Probe exactly once instead of waiting with backoff
        #[arg(long)]
        retry: bool,
    },

    /// List the models offered by the backend
    Models,

    /// List the available analysis types
    Analyses,

    /// Upload a CSV and show the prediction
    Submit {
        /// CSV file to upload
        file: PathBuf,

        /// Analysis type key (see `aerisk analyses`)
        #[arg(short, long, default_value = DEFAULT_ANALYSIS_KEY)]
        analysis: String,

        /// Declared media type of the file
        #[arg(long)]
        media_type: Option<String>,

        /// Also write a PDF report
        #[arg(long)]
        report: bool,

        /// Directory for the PDF report
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Show the last prediction of this session
    Dashboard {
        /// Print the raw prediction JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Write a PDF report of the last prediction
    Report {
        /// Directory for the PDF report
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::config_file_path();
    let (toml_config, config_problem) = match &config_path {
        Some(path) => match TomlConfig::load(path) {
            Ok(config) => (config, None),
            Err(e) => (TomlConfig::default(), Some(e)),
        },
        None => (TomlConfig::default(), None),
    };

    // Logs go to stderr; stdout carries command output only
    let level = &toml_config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("aerisk={level},aerisk_client={level},aerisk_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(e) = config_problem {
        warn!("Ignoring config file: {}", e);
    }

    let session_path = args
        .session_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("aerisk-session.json"));
    let session = Arc::new(SessionContext::open(&session_path));

    match args.command {
        Command::Analyses => {
            print_analyses();
            Ok(())
        }
        Command::Dashboard { json } => show_dashboard(&session, json),
        Command::Report { output_dir } => write_report(&session, output_dir),
        Command::Status { retry } => {
            let orchestrator = orchestrator(&args.api_base_url, &toml_config, session)?;
            let snapshot = if retry {
                orchestrator.retry_connection().await
            } else {
                connect(&orchestrator).await
            };
            match snapshot.state {
                HealthState::Ready => {
                    println!("Backend ready: {}", orchestrator.base_url());
                    Ok(())
                }
                _ => bail!(
                    "{}",
                    snapshot.last_error.unwrap_or_else(|| "Backend unavailable".to_string())
                ),
            }
        }
        Command::Models => {
            let orchestrator = orchestrator(&args.api_base_url, &toml_config, session)?;
            require_ready(&orchestrator).await?;
            let catalog = orchestrator.catalog().await;
            if let Some(problem) = catalog.problem {
                bail!("{}", problem);
            }
            for model in &catalog.models {
                println!("{}", model);
            }
            Ok(())
        }
        Command::Submit {
            file,
            analysis,
            media_type,
            report,
            output_dir,
        } => {
            let selected = SelectedFile::from_path(file, media_type);

            // Local checks first so a bad file never waits on the backend
            validate_selection(Some(&selected), Some(&analysis))?;

            let orchestrator = orchestrator(&args.api_base_url, &toml_config, session.clone())?;
            require_ready(&orchestrator).await?;

            let outcome = orchestrator.submit(Some(&selected), Some(&analysis)).await?;
            if !outcome.missing_columns.is_empty() {
                eprintln!(
                    "Warning: {} expects columns missing from this CSV: {}",
                    outcome.analysis.label,
                    outcome.missing_columns.join(", ")
                );
            }

            let dashboard = Dashboard::resolve(
                Some(NavigationState {
                    result: outcome.result,
                    file_name: Some(outcome.file_name),
                }),
                &session,
            );
            print!("{}", dashboard.render(std::io::stdout().is_terminal()));

            if report {
                write_report(&session, output_dir)?;
            }
            Ok(())
        }
    }
}

fn orchestrator(
    cli_base_url: &Option<String>,
    toml_config: &TomlConfig,
    session: Arc<SessionContext>,
) -> Result<UploadOrchestrator<HttpBackend>> {
    let base_url = config::resolve_api_base_url(cli_base_url.as_deref(), toml_config);
    info!("Prediction backend: {}", base_url);

    let backend = HttpBackend::new(
        base_url,
        Duration::from_millis(toml_config.probe.timeout_ms),
    )
    .context("Failed to create HTTP client")?;

    Ok(UploadOrchestrator::new(
        Arc::new(backend),
        BackoffPolicy::from_config(&toml_config.probe),
        session,
    ))
}

/// Automatic probe with progress on stderr
async fn connect(orchestrator: &UploadOrchestrator<HttpBackend>) -> ProbeSnapshot {
    let progress = tokio::spawn(report_progress(
        orchestrator.prober().subscribe(),
        orchestrator.prober().policy().max_attempts,
    ));
    let snapshot = orchestrator.connect().await;
    progress.abort();
    snapshot
}

async fn require_ready(orchestrator: &UploadOrchestrator<HttpBackend>) -> Result<()> {
    let snapshot = connect(orchestrator).await;
    if snapshot.is_ready() {
        Ok(())
    } else {
        bail!(
            "{}",
            snapshot.last_error.unwrap_or_else(|| "Backend unavailable".to_string())
        )
    }
}

async fn report_progress(mut rx: watch::Receiver<ProbeSnapshot>, max_attempts: u32) {
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.state == HealthState::Sleeping {
            eprintln!(
                "Backend is waking up (attempt {} of {})...",
                snapshot.attempts, max_attempts
            );
        }
    }
}

fn print_analyses() {
    for analysis in ANALYSIS_TYPES {
        let marker = if analysis.key == DEFAULT_ANALYSIS_KEY { " (default)" } else { "" };
        println!("{}{}", analysis.key, marker);
        println!("    {} - {}", analysis.label, analysis.description);
        println!("    model: {}", analysis.model_name);
        if !analysis.required_fields.is_empty() {
            println!("    columns: {}", analysis.required_fields.join(", "));
        }
    }
}

fn show_dashboard(session: &SessionContext, json: bool) -> Result<()> {
    let dashboard = Dashboard::resolve(None, session);
    match (&dashboard, json) {
        (Dashboard::Results(data), true) => println!("{}", data.result.to_pretty_json()),
        (Dashboard::Empty, true) => bail!("No prediction results in this session."),
        (_, false) => print!("{}", dashboard.render(std::io::stdout().is_terminal())),
    }
    Ok(())
}

fn write_report(session: &SessionContext, output_dir: PathBuf) -> Result<()> {
    let generator = ReportGenerator::new(output_dir);
    let path = generator.generate(session)?;
    println!("Report saved to {}", path.display());
    Ok(())
}
