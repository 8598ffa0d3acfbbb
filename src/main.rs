//! Binary entry point for research-core.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use research_core::cli::output::{OutputFormat, format_error};
use research_core::cli::{Cli, execute};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);

    match execute(&cli).await {
        Ok(output) => {
            if !output.text.is_empty() {
                if let Err(e) = write!(io::stdout(), "{}", output.text)
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Error writing to stdout: {e}");
                    return ExitCode::from(3);
                }
            }
            ExitCode::from(output.code)
        }
        Err(e) => {
            let error_output = format_error(&e, format);
            match format {
                OutputFormat::Json | OutputFormat::Ndjson => {
                    println!("{error_output}");
                }
                OutputFormat::Text => {
                    eprintln!("Error: {error_output}");
                }
            }
            ExitCode::from(research_core::cli::commands::exit_code_for_error(&e))
        }
    }
}
