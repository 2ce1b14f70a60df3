//! `pbxpatch`: apply configured, idempotent edits to an Xcode project
//! manifest.
//!
//! ```bash
//! pbxpatch apply fix-tests.json
//! pbxpatch apply fix-tests.json --dry-run --json
//! pbxpatch generate-id --count 3
//! pbxpatch show-entry App.xcodeproj/project.pbxproj "App Tests"
//! ```
//!
//! The step log goes to stdout; diagnostics go to stderr through
//! `tracing` (`RUST_LOG` or `-v` to see more).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pbxpatch_core::prelude::*;
use pbxpatch_tasks::prelude::*;

#[derive(Parser)]
#[command(
    name = "pbxpatch",
    version,
    about = "Idempotent, backed-up edits to project.pbxproj files"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the task described by a JSON configuration file
    Apply(ApplyArgs),

    /// Print fresh object identifiers
    GenerateId {
        /// How many identifiers to print
        #[arg(short, long, default_value_t = 1)]
        count: usize,

        /// Seed for a reproducible sequence
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the definition of an entry, looked up by token or label
    ShowEntry {
        /// Path to project.pbxproj
        project: PathBuf,

        /// Object identifier, or the label in its `/* ... */` comment
        token_or_label: String,
    },
}

#[derive(Args)]
struct ApplyArgs {
    /// Path to the task configuration (JSON)
    config: PathBuf,

    /// Patch this manifest instead of the configured one
    #[arg(long)]
    project: Option<PathBuf>,

    /// Run every step but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Seed for generated identifiers
    #[arg(long)]
    seed: Option<u64>,

    /// Print the run report as JSON instead of the step log
    #[arg(long)]
    json: bool,
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Apply(args) => apply(args),
        Command::GenerateId { count, seed } => generate_ids(count, seed).map(|()| 0),
        Command::ShowEntry {
            project,
            token_or_label,
        } => show_entry(&project, &token_or_label).map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn apply(args: ApplyArgs) -> Result<u8> {
    let mut config = PatchConfig::load(&args.config)
        .with_context(|| format!("failed to load config '{}'", args.config.display()))?;
    if let Some(project) = args.project {
        config.project = project;
    }

    let options = RunOptions {
        dry_run: args.dry_run,
        seed: args.seed,
    };
    let task = config.task.as_task();
    tracing::info!(
        task = task.name(),
        project = %config.project.display(),
        dry_run = options.dry_run,
        "applying task"
    );
    let report = execute(&config.project, task, &options);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }

    u8::try_from(report.exit_code()).context("exit code out of range")
}

fn print_report(report: &RunReport) {
    println!("{} -> {}", report.task, report.path.display());
    for step in &report.steps {
        println!("  {step}");
    }
    match (&report.saved, report.status) {
        (Some(SaveOutcome::Written { backup }), _) => {
            println!("saved; backup at {}", backup.display());
        }
        (Some(SaveOutcome::DryRun), _) => println!("dry run: changes not written"),
        (_, RunStatus::AlreadyCorrect) => println!("no changes needed, already correct"),
        (_, RunStatus::Aborted) => match report.steps.first_failure() {
            Some(step) => println!("aborted at '{}'; manifest left untouched", step.name),
            None => println!("aborted; manifest left untouched"),
        },
        (_, RunStatus::Failed) => {
            let reason = report.error.as_deref().unwrap_or("unknown error");
            match report.steps.first_failure() {
                Some(step) => println!("failed at '{}': {reason}", step.name),
                None => println!("failed: {reason}"),
            }
        }
        (_, RunStatus::Applied) => {}
    }
}

// ---------------------------------------------------------------------------
// generate-id / show-entry
// ---------------------------------------------------------------------------

fn generate_ids(count: usize, seed: Option<u64>) -> Result<()> {
    let mut ids = seed.map_or_else(IdGenerator::new, IdGenerator::seeded);
    for _ in 0..count {
        println!("{}", ids.generate());
    }
    Ok(())
}

fn show_entry(project: &std::path::Path, token_or_label: &str) -> Result<()> {
    let doc = load(project).with_context(|| format!("failed to read '{}'", project.display()))?;
    let entry = if is_token(token_or_label) {
        match find_entry_by_token(&doc, token_or_label) {
            Err(e) if e.is_not_found() => find_entry_by_label(&doc, token_or_label),
            other => other,
        }
    } else {
        find_entry_by_label(&doc, token_or_label)
    }
    .with_context(|| format!("no entry '{token_or_label}' in '{}'", project.display()))?;

    println!("{}", entry.span.slice(&doc));
    Ok(())
}
