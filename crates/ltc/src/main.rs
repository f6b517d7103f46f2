//! `ltc` binary entrypoint.

use std::io::{self, BufReader, IsTerminal};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ltc::config::{Config, FilePersister};
use ltc::dispatcher::{Dispatcher, LATTICE_CLI_TIMEOUT_ENV, poll_timeout};
use ltc::error::ExitStatus;
use ltc::exit_handler::ExitHandler;
use ltc::target_verifier::HttpTargetVerifier;
use ltc::cli::usage_error;
use ltc::terminal::{TerminalUi, TtyReader, Ui};
use ltc::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_failure(&err),
    };

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(run(cli));
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn parse_failure(err: &clap::Error) -> ExitCode {
    match usage_error(err) {
        Some(message) => {
            println!("Incorrect Usage: {message}");
            ExitCode::from(u8::try_from(ExitStatus::InvalidSyntax.code()).unwrap_or(1))
        }
        None => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
    }
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to create async runtime")
}

async fn run(cli: Cli) -> i32 {
    let exit_handler = ExitHandler::new();
    let _interrupts = exit_handler.listen_for_interrupt();

    let mut ui = TerminalUi::new(BufReader::new(io::stdin()), io::stdout());
    if io::stdin().is_terminal() {
        ui = ui.with_tty_reader(TtyReader::new(exit_handler.clone()));
    }

    let home = FilePersister::default_home();
    let mut config = Config::new(FilePersister::new(FilePersister::config_file_path(&home)));
    if let Err(e) = config.load() {
        ui.say_line(&format!("Error loading config: {e}"));
        exit_handler.exit_with(ExitStatus::FileSystemError);
        return ExitStatus::FileSystemError.code();
    }

    let timeout = poll_timeout(std::env::var(LATTICE_CLI_TIMEOUT_ENV).ok().as_deref());
    let mut dispatcher = Dispatcher::new(config, HttpTargetVerifier, exit_handler.clone(), timeout);
    let code = match dispatcher.dispatch(&mut ui, cli.command).await {
        Ok(()) => 0,
        Err(status) => status.code(),
    };

    // Restores terminal state registered by live views before leaving.
    exit_handler.exit(code);
    code
}
