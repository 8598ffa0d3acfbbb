//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};

/// research-core: drives a scraped batch through preparation, goal
/// discovery, planning, execution, and synthesis.
#[derive(Parser, Debug)]
#[command(name = "research-core")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs (or resumes) a research session for a scraped batch.
    Run {
        /// The batch id to research; also the default session id.
        #[arg(long)]
        batch: String,

        /// Resume the most advanced persisted session for this batch
        /// instead of requiring a fresh one.
        #[arg(long)]
        resume: bool,

        /// Use an explicit session id instead of the batch id.
        #[arg(long)]
        session: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_requires_batch() {
        let result = Cli::try_parse_from(["research-core", "run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_parses_batch_and_resume() {
        let cli = Cli::try_parse_from(["research-core", "run", "--batch", "b1", "--resume"])
            .unwrap_or_else(|_| unreachable!());
        match cli.command {
            Commands::Run { batch, resume, session } => {
                assert_eq!(batch, "b1");
                assert!(resume);
                assert!(session.is_none());
            }
        }
    }

    #[test]
    fn test_run_parses_explicit_session() {
        let cli = Cli::try_parse_from(["research-core", "run", "--batch", "b1", "--session", "s1"])
            .unwrap_or_else(|_| unreachable!());
        match cli.command {
            Commands::Run { session, .. } => assert_eq!(session, Some("s1".to_string())),
        }
    }
}
