//! Proctor CLI - Command-line interface for the proctoring core
//!
//! Commands:
//! - replay: Score a recorded session (batch mode)
//! - run: Process streaming detector output from stdin (streaming mode)
//! - score: Compute the integrity score of a report
//! - config: Print the effective configuration
//! - doctor: Diagnose configuration and environment

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use exam_proctor::replay::{parse_array, parse_ndjson, replay};
use exam_proctor::{
    DetectionState, IntegrityBand, ProctorConfig, ProctorError, RecordedFrame, SessionReport,
    PRODUCER_NAME, PROCTOR_VERSION,
};

/// Proctor - behavioral signal processing for remote exams
#[derive(Parser)]
#[command(name = "proctor")]
#[command(version = PROCTOR_VERSION)]
#[command(about = "Turn detector output into proctoring alerts and integrity scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a recorded session (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Process streaming detector output from stdin (streaming mode)
    Run {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only print the final report
        #[arg(long)]
        quiet: bool,

        /// Flush output after each record (`--flush false` to buffer)
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        flush: bool,
    },

    /// Compute the integrity score of a report
    Score {
        /// Report file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file providing the deduction table
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output the breakdown as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

/// Operator command interleaved with frames in streaming mode
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Control {
    Reset,
    Recalibrate,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamLine {
    Control { control: Control },
    Frame(RecordedFrame),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ProctorCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            config,
            pretty,
        } => cmd_replay(&input, input_format, config.as_deref(), pretty),

        Commands::Run {
            config,
            quiet,
            flush,
        } => cmd_run(config.as_deref(), quiet, flush),

        Commands::Score { input, config, json } => cmd_score(&input, config.as_deref(), json),

        Commands::Config { config } => cmd_config(config.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<String, ProctorCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    pretty: bool,
) -> Result<(), ProctorCliError> {
    let config = ProctorConfig::load(config)?;
    let input_data = read_input(input)?;

    let frames = match input_format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => parse_array(&input_data)?,
    };

    if frames.is_empty() {
        return Err(ProctorCliError::NoFrames);
    }

    tracing::info!(frames = frames.len(), "replaying recorded session");
    let scored = replay(config, frames);

    if pretty {
        println!("{}", serde_json::to_string_pretty(&scored)?);
    } else {
        println!("{}", serde_json::to_string(&scored)?);
    }
    Ok(())
}

fn cmd_run(config: Option<&Path>, quiet: bool, flush: bool) -> Result<(), ProctorCliError> {
    let config = ProctorConfig::load(config)?;
    let scoring = config.scoring.clone();
    let mut state = DetectionState::new(config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let parsed: StreamLine = serde_json::from_str(trimmed).map_err(|e| {
            ProctorCliError::ParseError(format!("line {}: {}", index + 1, e))
        })?;

        match parsed {
            StreamLine::Control { control } => {
                tracing::info!(?control, "operator command");
                match control {
                    Control::Reset => state.reset(),
                    Control::Recalibrate => state.recalibrate(),
                }
            }
            StreamLine::Frame(frame) => {
                let outcome = state.process(frame);
                if !quiet {
                    writeln!(stdout, "{}", serde_json::to_string(&outcome)?)?;
                    if flush {
                        stdout.flush()?;
                    }
                }
            }
        }
    }

    let scored = state.generate_report().scored(&scoring);
    writeln!(stdout, "{}", serde_json::to_string(&scored)?)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_score(input: &Path, config: Option<&Path>, json: bool) -> Result<(), ProctorCliError> {
    let config = ProctorConfig::load(config)?;
    let report: SessionReport = serde_json::from_str(&read_input(input)?)?;
    let breakdown = config
        .scoring
        .breakdown(&report.statistics, report.face_detection_rate);
    let band = IntegrityBand::from_score(breakdown.score);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "breakdown": breakdown,
                "integrity_band": band,
            }))?
        );
    } else {
        println!("Integrity Score");
        println!("===============");
        println!("Base:  {}", breakdown.base);
        for deduction in &breakdown.deductions {
            println!(
                "  -{:<3} {:?} ({:.1}%)",
                deduction.points, deduction.category, deduction.percentage
            );
        }
        println!("Bonus: +{}", breakdown.bonus);
        println!("Score: {} ({:?})", breakdown.score, band);
    }

    Ok(())
}

fn cmd_config(config: Option<&Path>) -> Result<(), ProctorCliError> {
    let config = ProctorConfig::load(config)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), ProctorCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, PROCTOR_VERSION),
    });

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist, defaults apply", path.display()),
        }),
        _ => match ProctorConfig::load(config) {
            Ok(loaded) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Configuration valid (frame_skip {}, baseline {} frames, debounce {} frames)",
                    loaded.frame_skip, loaded.baseline_frames, loaded.looking_away_threshold
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PROCTOR_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Proctor Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ProctorCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum ProctorCliError {
    Io(io::Error),
    Core(ProctorError),
    Json(serde_json::Error),
    NoFrames,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for ProctorCliError {
    fn from(e: io::Error) -> Self {
        ProctorCliError::Io(e)
    }
}

impl From<ProctorError> for ProctorCliError {
    fn from(e: ProctorError) -> Self {
        ProctorCliError::Core(e)
    }
}

impl From<serde_json::Error> for ProctorCliError {
    fn from(e: serde_json::Error) -> Self {
        ProctorCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ProctorCliError> for CliError {
    fn from(e: ProctorCliError) -> Self {
        match e {
            ProctorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ProctorCliError::Core(ProctorError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'proctor doctor --config <file>' for details".to_string()),
            },
            ProctorCliError::Core(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Each frame needs frame_width, faces and devices".to_string()),
            },
            ProctorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ProctorCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ProctorCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            ProctorCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Lines must be a frame or {\"control\": \"reset\" | \"recalibrate\"}".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
