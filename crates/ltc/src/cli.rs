//! Command-line argument parsing with clap.
//!
//! Positional arguments are mostly optional here: commands validate them
//! themselves so that missing or malformed values produce the CLI's own
//! usage messages and exit codes.

use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use once_cell::sync::Lazy;
use regex::Regex;

/// Lattice command line client.
#[derive(Parser, Debug, Clone)]
#[command(name = "ltc")]
#[command(version, about, long_about = None)]
#[command(allow_external_subcommands = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show or set the lattice target.
    Target {
        /// Lattice system domain, e.g. `192.168.11.11.xip.io`.
        target: Option<String>,
    },

    /// Show or set the blob store target.
    TargetBlob {
        /// Blob store address as `HOST:PORT`.
        target: Option<String>,
    },

    /// Create a docker app on lattice.
    Create(CreateArgs),

    /// Submit a desired LRP from a JSON file.
    SubmitLrp {
        /// Path to the LRP document.
        path: Option<String>,
    },

    /// Scale a docker app on lattice.
    Scale {
        /// App name.
        name: Option<String>,
        /// Desired number of instances.
        instances: Option<String>,
    },

    /// Update the routes of an app.
    UpdateRoutes {
        /// App name.
        name: Option<String>,
        /// Comma-separated `HOST:PORT` pairs.
        routes: Option<String>,
    },

    /// Stop and remove apps.
    #[command(visible_alias = "rm")]
    Remove {
        /// Names of the apps to remove.
        names: Vec<String>,
    },

    /// List all apps and tasks on lattice.
    #[command(visible_alias = "li")]
    List,

    /// Show the status of an app.
    #[command(visible_alias = "st")]
    Status {
        /// App name.
        name: Option<String>,
        /// Refresh interval, e.g. `2s`.
        #[arg(short, long, value_parser = parse_duration)]
        rate: Option<Duration>,
        /// Show a compact table of instances.
        #[arg(short, long)]
        summary: bool,
    },

    /// Show the distribution of instances over cells.
    #[command(visible_alias = "vz")]
    Visualize {
        /// Refresh interval, e.g. `2s`.
        #[arg(short, long, value_parser = parse_duration)]
        rate: Option<Duration>,
        /// Show a full-screen bar chart.
        #[arg(short, long)]
        graphical: bool,
    },

    /// Show the cells of the cluster.
    Cells,

    /// Stream the logs of an app.
    Logs {
        /// App name.
        name: Option<String>,
    },

    /// Stream the debug logs of the lattice components.
    DebugLogs {
        /// Print messages without parsing component records.
        #[arg(long)]
        raw: bool,
    },

    /// Submit a task from a JSON file.
    SubmitTask {
        /// Path to the task document.
        path: Option<String>,
    },

    /// Show the status of a task.
    Task {
        /// Task guid.
        guid: Option<String>,
    },

    /// Cancel a task.
    CancelTask {
        /// Task guid.
        guid: Option<String>,
    },

    /// Delete a completed task.
    DeleteTask {
        /// Task guid.
        guid: Option<String>,
    },

    /// Run the cluster smoke test against the current target.
    Test {
        /// Time allowed for each step.
        #[arg(short, long, value_parser = parse_duration, default_value = "2m")]
        timeout: Duration,
        /// Echo the output of every step.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Anything else; reported as an unknown command.
    #[command(external_subcommand)]
    External(Vec<String>),
}

/// Arguments of `create`.
#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// `APP_NAME` and `DOCKER_IMAGE`.
    pub args: Vec<String>,

    /// Start command and its arguments, after `--`.
    #[arg(last = true)]
    pub start_command: Vec<String>,

    /// Working directory of the start command.
    #[arg(short, long)]
    pub working_dir: Option<String>,

    /// Environment variables, `NAME` or `NAME=VALUE` (repeatable).
    #[arg(short, long)]
    pub env: Vec<String>,

    /// Run the app as root.
    #[arg(short, long)]
    pub run_as_root: bool,

    /// Relative CPU weight, 1 to 100.
    #[arg(short, long, default_value_t = 100)]
    pub cpu_weight: u32,

    /// Memory limit in MB.
    #[arg(short, long, default_value_t = 128)]
    pub memory_mb: i32,

    /// Disk limit in MB.
    #[arg(short, long, default_value_t = 1024)]
    pub disk_mb: i32,

    /// Exposed ports, comma separated.
    #[arg(short, long, value_delimiter = ',')]
    pub ports: Vec<u16>,

    /// Port used for the health check.
    #[arg(short = 'M', long)]
    pub monitored_port: Option<u16>,

    /// Disable the health check.
    #[arg(long)]
    pub no_monitor: bool,

    /// Register no routes.
    #[arg(long)]
    pub no_routes: bool,

    /// Routes as comma-separated `HOST:PORT` pairs.
    #[arg(short = 'R', long)]
    pub routes: Option<String>,

    /// How long to wait for the app to start, e.g. `90s`.
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Number of instances.
    #[arg(short, long, default_value_t = 1)]
    pub instances: i32,
}

static DURATION_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)").unwrap_or_else(|_| unreachable!())
});

/// Parses a duration such as `500ms`, `2s`, `1m30s` or `1.5h`. A bare
/// integer is taken as seconds.
///
/// # Errors
///
/// Returns a message for anything else.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if let Ok(seconds) = input.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let invalid = || format!("invalid duration: {input}");
    let mut total = 0f64;
    let mut consumed = 0;
    for part in DURATION_PART.captures_iter(input) {
        let whole = part.get(0).ok_or_else(invalid)?;
        if whole.start() != consumed {
            return Err(invalid());
        }
        consumed = whole.end();

        let value: f64 = part[1].parse().map_err(|_| invalid())?;
        let unit = match &part[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            _ => 3600.0,
        };
        total += value * unit;
    }
    if input.is_empty() || consumed != input.len() {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}

/// Message for a parse failure that should be reported as incorrect
/// usage, or `None` when clap is only displaying help or the version.
#[must_use]
pub fn usage_error(err: &clap::Error) -> Option<String> {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => None,
        _ => {
            let rendered = err.render().to_string();
            let first = rendered.lines().next().unwrap_or_default();
            Some(first.strip_prefix("error: ").unwrap_or(first).trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("500ms", Duration::from_millis(500))]
    #[test_case("2s", Duration::from_secs(2))]
    #[test_case("1m30s", Duration::from_secs(90))]
    #[test_case("1.5h", Duration::from_secs(5400))]
    #[test_case("45", Duration::from_secs(45))]
    fn parses_durations(input: &str, expected: Duration) {
        assert_eq!(parse_duration(input), Ok(expected));
    }

    #[test_case("")]
    #[test_case("fast")]
    #[test_case("2x")]
    #[test_case("1m junk")]
    #[test_case("-1s")]
    fn rejects_malformed_durations(input: &str) {
        assert!(parse_duration(input).is_err());
    }

    #[test_case(&["ltc", "create", "app", "img", "--ports", "70000"], "--ports")]
    #[test_case(&["ltc", "create", "app", "img", "--instances", "many"], "--instances")]
    #[test_case(&["ltc", "test", "--timeout", "soon"], "invalid duration")]
    fn value_errors_are_usage_errors(argv: &[&str], mentions: &str) {
        let err = Cli::try_parse_from(argv).expect_err("parse should fail");
        let message = usage_error(&err).expect("usage error");
        assert!(message.contains(mentions), "{message}");
        assert!(!message.starts_with("error:"), "{message}");
    }

    #[test]
    fn help_is_not_a_usage_error() {
        let err = Cli::try_parse_from(["ltc", "--help"]).expect_err("help exits early");
        assert_eq!(usage_error(&err), None);
    }

    #[test]
    fn create_splits_start_command() {
        let cli = Cli::parse_from([
            "ltc", "create", "myapp", "my/image", "-m", "256", "--ports", "80,443", "--", "/run",
            "arg1", "arg2",
        ]);
        let Some(Commands::Create(args)) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.args, vec!["myapp", "my/image"]);
        assert_eq!(args.start_command, vec!["/run", "arg1", "arg2"]);
        assert_eq!(args.memory_mb, 256);
        assert_eq!(args.ports, vec![80, 443]);
        assert_eq!(args.disk_mb, 1024);
        assert_eq!(args.instances, 1);
    }

    #[test]
    fn unknown_commands_are_captured() {
        let cli = Cli::parse_from(["ltc", "foo", "bar"]);
        assert!(matches!(cli.command, Some(Commands::External(args)) if args == ["foo", "bar"]));
    }

    #[test]
    fn aliases() {
        assert!(matches!(Cli::parse_from(["ltc", "li"]).command, Some(Commands::List)));
        assert!(matches!(
            Cli::parse_from(["ltc", "status", "app", "--rate", "2s"]).command,
            Some(Commands::Status { rate: Some(rate), .. }) if rate == Duration::from_secs(2)
        ));
    }

    #[test]
    fn no_command() {
        assert!(Cli::parse_from(["ltc"]).command.is_none());
    }
}
