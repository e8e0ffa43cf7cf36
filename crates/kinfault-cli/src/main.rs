//! `kinfault` – check recorded motions for kinematic faults.
//!
//! ```text
//! kinfault check --body arm.json --motion wave.json
//! kinfault check -b arm.json -m wave.json --no-collision --angle-margin 2 --json
//! kinfault check -b arm.json -m wave.json -m reach.json
//! kinfault config init
//! kinfault schema body
//! ```
//!
//! Exit status: `0` on success, `1` on error, `2` when `--fail-on-fault` is
//! given and at least one fault was reported.

mod error;
mod loader;
mod output;
mod settings;
mod telemetry;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use kinfault_body::{BodyDescription, MotionDescription};
use kinfault_kernel::{CheckReport, FaultChecker, Tee, TracingReporter, WriterReporter};
use kinfault_types::Fault;
use tracing::{info, warn};

use crate::error::CliError;
use crate::output::RunRecord;
use crate::settings::{CheckerSettings, TargetJoints};

#[derive(Parser)]
#[command(name = "kinfault")]
#[command(
    about = "Detect joint-limit, joint-velocity and self-collision faults in recorded motions"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a motion on a body and report faults
    Check(CheckArgs),

    /// Inspect or create ~/.kinfault/config.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the JSON Schema of an input file format
    Schema {
        #[arg(value_enum)]
        kind: SchemaKind,
    },
}

#[derive(Args, Debug, Default)]
struct CheckArgs {
    /// Body description (JSON)
    #[arg(short, long)]
    body: PathBuf,

    /// Motion description (JSON); repeat to check several motions in turn
    #[arg(short, long, required = true)]
    motion: Vec<PathBuf>,

    /// Settings file (default: ~/.kinfault/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the joint position check
    #[arg(long)]
    no_position: bool,

    /// Skip the joint velocity check
    #[arg(long)]
    no_velocity: bool,

    /// Skip the self-collision check
    #[arg(long)]
    no_collision: bool,

    /// Angle margin in degrees; negative values widen the limits
    #[arg(long, value_name = "DEG", allow_negative_numbers = true)]
    angle_margin: Option<f64>,

    /// Translation margin in meters; negative values widen the limits
    #[arg(long, value_name = "M", allow_negative_numbers = true)]
    translation_margin: Option<f64>,

    /// Allowed share of the velocity limits, in percent
    #[arg(long, value_name = "PERCENT")]
    velocity_limit: Option<f64>,

    /// Joints covered by the position and velocity checks
    #[arg(long, value_enum)]
    targets: Option<TargetJoints>,

    /// Link to select for --targets (repeatable); implies --targets selected
    /// unless --targets is given
    #[arg(long = "select", value_name = "LINK")]
    select: Vec<String>,

    /// Start of the checked time range in seconds
    #[arg(long, value_name = "S", allow_negative_numbers = true)]
    begin: Option<f64>,

    /// End of the checked time range in seconds
    #[arg(long, value_name = "S", allow_negative_numbers = true)]
    end: Option<f64>,

    /// Print a JSON array of run records instead of text
    #[arg(long)]
    json: bool,

    /// Exit with status 2 when a fault is reported
    #[arg(long)]
    fail_on_fault: bool,
}

impl CheckArgs {
    /// Layer the command-line options over the persisted settings.
    fn apply_to(&self, settings: &mut CheckerSettings, motion_length: f64) {
        if self.no_position {
            settings.check_joint_positions = false;
        }
        if self.no_velocity {
            settings.check_joint_velocities = false;
        }
        if self.no_collision {
            settings.check_self_collisions = false;
        }
        if let Some(deg) = self.angle_margin {
            settings.angle_margin_deg = deg;
        }
        if let Some(m) = self.translation_margin {
            settings.translation_margin = m;
        }
        if let Some(pct) = self.velocity_limit {
            settings.velocity_limit_percent = pct;
        }
        match self.targets {
            Some(targets) => settings.target_joints = targets,
            None if !self.select.is_empty() && settings.target_joints == TargetJoints::All => {
                settings.target_joints = TargetJoints::Selected;
            }
            None => {}
        }
        if self.begin.is_some() || self.end.is_some() {
            settings.only_time_range = true;
            settings.time_range = [
                self.begin.unwrap_or(0.0),
                self.end.unwrap_or(motion_length),
            ];
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Write the default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the settings file location
    Path,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaKind {
    Body,
    Motion,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let guard = telemetry::init_tracing("kinfault");
    if guard.is_exporting() {
        info!("exporting spans over OTLP");
    }

    let result = match cli.command {
        Commands::Check(args) => cmd_check(&args),
        Commands::Config { action } => cmd_config(action).map(|()| ExitCode::SUCCESS),
        Commands::Schema { kind } => cmd_schema(kind).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// check
// ────────────────────────────────────────────────────────────────────────────

fn cmd_check(args: &CheckArgs) -> Result<ExitCode, CliError> {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_ref = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("{}", "Ctrl-C received, stopping after the current frame".yellow().bold());
        cancel_ref.store(true, Ordering::Relaxed);
    }) {
        warn!("Could not install Ctrl-C handler: {e}");
    }

    let stdout = io::stdout();
    let reports = run_check(args, cancel, &mut stdout.lock())?;
    let fault_count: usize = reports.iter().map(|r| r.fault_count).sum();

    if args.fail_on_fault && fault_count > 0 {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Check every `--motion` in order on the same body.  A cancelled run
/// stops the batch; motions after it are not loaded.
fn run_check<W: Write>(
    args: &CheckArgs,
    cancel: Arc<AtomicBool>,
    out: &mut W,
) -> Result<Vec<CheckReport>, CliError> {
    let base_settings = load_settings(args.config.as_deref())?;
    let mut body = loader::load_body(&args.body)?;
    let selected = loader::resolve_links(&body, &args.select)?;
    let checker = FaultChecker::new().with_cancel_flag(cancel);

    let mut reports = Vec::with_capacity(args.motion.len());
    let mut records = Vec::new();
    for path in &args.motion {
        let motion = loader::load_motion(path)?;
        let mut settings = base_settings.clone();
        args.apply_to(&mut settings, motion.time_length());
        let config = settings.to_check_config(&selected);
        info!(motion = %path.display(), ?config, "starting check");

        let started_at = Utc::now();
        let report = if args.json {
            let mut faults: Vec<Fault> = Vec::new();
            let report = checker.check(
                &mut body,
                &motion,
                &config,
                &mut Tee(&mut faults, TracingReporter),
            )?;
            let source = path.display().to_string();
            records.push(RunRecord::new(body.name(), &source, started_at, &report, faults));
            report
        } else {
            let header = format!("Applying the Kinematic Fault Checker to {} ...", path.display());
            writeln!(out, "{}", header.bold())?;
            let mut sink = WriterReporter::new(&mut *out);
            let report = checker.check(&mut body, &motion, &config, &mut sink)?;
            sink.finish()?;
            output::write_summary(out, &report, config.check_collision)?;
            report
        };

        let cancelled = report.cancelled;
        reports.push(report);
        if cancelled {
            break;
        }
    }

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
    }
    Ok(reports)
}

/// An explicit settings path must exist; the default one is optional.
fn load_settings(path: Option<&Path>) -> Result<CheckerSettings, CliError> {
    match path {
        Some(p) => {
            settings::load_from(p)?.ok_or_else(|| CliError::MissingSettings(p.to_path_buf()))
        }
        None => Ok(settings::load()?.unwrap_or_else(|| {
            let mut defaults = CheckerSettings::default();
            settings::apply_env_overrides(&mut defaults);
            defaults
        })),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// config / schema
// ────────────────────────────────────────────────────────────────────────────

fn cmd_config(action: ConfigAction) -> Result<(), CliError> {
    let path = settings::config_path();
    match action {
        ConfigAction::Show => {
            let current = load_settings(None)?;
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&current)?);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                println!(
                    "{} {} already exists (use --force to overwrite)",
                    "!".yellow().bold(),
                    path.display().to_string().bold()
                );
            } else {
                settings::save(&CheckerSettings::default())?;
                println!(
                    "{} Settings written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
            }
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}

fn cmd_schema(kind: SchemaKind) -> Result<(), CliError> {
    let schema = match kind {
        SchemaKind::Body => schemars::schema_for!(BodyDescription),
        SchemaKind::Motion => schemars::schema_for!(MotionDescription),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
