//! CLI command implementations.
//!
//! Contains the business logic for the `run` command: resolving
//! configuration, constructing the provider/UI/session collaborators,
//! and driving [`crate::orchestrator::run_research`] to completion or
//! cancellation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::batch::load_batch;
use crate::cli::output::{OutputFormat, exit_status_for, format_json};
use crate::cli::parser::{Cli, Commands};
use crate::config::ResearchConfig;
use crate::error::Result;
use crate::llm::OpenAiProvider;
use crate::orchestrator::{RunOutcome, run_research};
use crate::prompt::PromptComposer;
use crate::ui::console::ConsoleUiBus;

/// Outcome of a CLI invocation: the text to print and the process exit
/// status it should map to.
pub struct CommandOutput {
    /// Text to write to stdout (already formatted per `--format`).
    pub text: String,
    /// Process exit code, per §6 (0 completed, 2 cancelled).
    pub code: u8,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if configuration resolution, batch loading, or the
/// research run itself fails. The caller maps the error to an exit
/// code via [`crate::cli::output::exit_status_for`].
pub async fn execute(cli: &Cli) -> Result<CommandOutput> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run { batch, resume, session } => {
            cmd_run(batch, *resume, session.as_deref(), format).await
        }
    }
}

async fn cmd_run(
    batch_id: &str,
    resume: bool,
    session_id: Option<&str>,
    format: OutputFormat,
) -> Result<CommandOutput> {
    let config = ResearchConfig::builder().build()?;
    let batch = load_batch(&config.batches_dir, batch_id)?;

    let session_path = config
        .sessions_dir
        .join(format!("session_{}.json", session_id.unwrap_or(batch_id)));
    if !resume && session_path.exists() {
        tracing::info!(path = %session_path.display(), "resuming existing session without --resume flag");
    }

    let composer = PromptComposer::new(config.prompts_dir.clone());
    let provider = OpenAiProvider::from_env()?;
    let ui = ConsoleUiBus::new(Duration::from_secs(config.prompt_timeout_secs));
    let cancellation = CancellationToken::new();
    let cancellation_watcher = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancellation_watcher.cancel();
        }
    });

    let outcome = run_research(
        batch_id,
        session_id,
        &batch,
        &config,
        &composer,
        &provider,
        &ui,
        &cancellation,
        unix_now,
    )
    .await?;

    let (text, code) = match outcome {
        RunOutcome::Completed => (render_outcome("completed", format), 0),
        RunOutcome::Cancelled | RunOutcome::OperatorCancelled => {
            (render_outcome("cancelled", format), 2)
        }
    };

    Ok(CommandOutput { text, code })
}

fn render_outcome(status: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("research run {status}\n"),
        OutputFormat::Json | OutputFormat::Ndjson => {
            format_json(&serde_json::json!({"success": true, "status": status}))
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Maps a top-level error to the exit code §6 prescribes, reusing
/// [`exit_status_for`]'s classification.
#[must_use]
pub fn exit_code_for_error(error: &crate::error::Error) -> u8 {
    exit_status_for(error).code()
}
