/*!
 * cmdjob - Command Line Entry Point
 *
 * Runs every given command concurrently, one thread each, with Ctrl-C
 * forwarded to all of them. Exits with the highest status seen.
 */

use clap::Parser;
use cmdjob::{
    init_tracing, CommandResult, ExecConfig, ExecResult, Executor, InterruptController, Outcome,
    ProcessRegistry, ReportFormat, ResultReporter, RunOptions,
};
use miette::{miette, IntoDiagnostic, WrapErr};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const EXIT_TIMED_OUT: i32 = 124;
const EXIT_LAUNCH_FAILED: i32 = 127;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "cmdjob")]
#[command(about = "Run shell commands concurrently with deadlines and clean cancellation")]
#[command(version)]
struct Cli {
    /// Shell command lines to run
    #[arg(required = true)]
    commands: Vec<String>,

    /// Per-command timeout in seconds (fractions allowed)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Wait-loop tick in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// File whose contents are fed to every command's stdin
    #[arg(long)]
    stdin_file: Option<PathBuf>,

    /// Stream output live to this terminal as well as capturing it
    #[arg(long)]
    tee: bool,

    /// Report results as JSON lines
    #[arg(long)]
    json: bool,

    /// Log the commands without running them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> miette::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = ExecConfig::from_env()?;
    if let Some(ms) = cli.tick_ms {
        config = config.with_tick(Duration::from_millis(ms));
    }
    if cli.dry_run {
        config = config.with_dry_run(true);
    }

    let timeout = cli
        .timeout
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|e| miette!("invalid --timeout {secs}: {e}"))
        })
        .transpose()?;
    let stdin = match cli.stdin_file {
        Some(ref path) => Some(
            std::fs::read(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    let format = if cli.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    let reporter = ResultReporter::stderr(io::stderr().is_terminal()).with_format(format);
    let registry = ProcessRegistry::new();
    let executor = Executor::new(config)?
        .with_registry(registry.clone())
        .with_reporter(reporter);

    InterruptController::install(&registry)?;
    info!(count = cli.commands.len(), "Running commands");

    let mut handles = Vec::with_capacity(cli.commands.len());
    for command in &cli.commands {
        let mut opts = RunOptions::new();
        if let Some(timeout) = timeout {
            opts = opts.with_timeout(timeout);
        }
        if let Some(ref payload) = stdin {
            opts = opts.with_stdin(payload.clone());
        }
        if cli.tee {
            opts = opts
                .with_stdout_tee(io::stdout())
                .with_stderr_tee(io::stderr())
                .with_flush_tee();
        }
        handles.push(executor.spawn(command.as_str(), opts)?);
    }

    let mut code = 0;
    for handle in handles {
        let status = match handle.join() {
            Ok(result) => exit_code(result),
            Err(_) => 1,
        };
        code = code.max(status);
    }

    InterruptController::remove()?;
    std::process::exit(code)
}

fn exit_code(result: ExecResult<CommandResult>) -> i32 {
    match result {
        Ok(result) => match result.outcome {
            Outcome::TimedOut => EXIT_TIMED_OUT,
            Outcome::Interrupted | Outcome::Cancelled => EXIT_INTERRUPTED,
            Outcome::Completed | Outcome::DryRun => result.exit_status.unwrap_or(1),
        },
        Err(e) => {
            let code = if e.is_launch_failure() {
                EXIT_LAUNCH_FAILED
            } else {
                1
            };
            eprintln!("{:?}", miette::Report::new(e));
            code
        }
    }
}
