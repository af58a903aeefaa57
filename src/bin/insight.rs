//! Insight CLI - Command-line interface for the NoBet insight engine
//!
//! Commands:
//! - assess: Score one user's bundle and print the assessment payload
//! - validate: Check every record of a bundle without scoring
//! - doctor: Diagnose configuration and environment
//! - defaults: Print the default engine configuration

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use nobet_insight::encoder::AssessmentEncoder;
use nobet_insight::schema::{AssessmentBundle, RecordAdapter};
use nobet_insight::{EngineConfig, EngineError, RiskEngine, ENGINE_NAME, ENGINE_VERSION};

/// Insight - Behavioral risk scoring for gambling-recovery diaries
#[derive(Parser)]
#[command(name = "insight")]
#[command(author = "NoBet Team")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score diary history into a combined risk assessment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one user's bundle
    Assess {
        /// Bundle file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Extra diary records as NDJSON, appended to the bundle's entries
        #[arg(long)]
        entries: Option<PathBuf>,

        /// Engine configuration file (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the payload
        #[arg(long)]
        pretty: bool,
    },

    /// Validate every record of a bundle
    Validate {
        /// Bundle file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Engine configuration file to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default engine configuration
    Defaults,
}

fn main() -> ExitCode {
    init_logging();
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

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();
}

fn run(cli: Cli) -> Result<(), InsightCliError> {
    match cli.command {
        Commands::Assess {
            input,
            output,
            entries,
            config,
            pretty,
        } => cmd_assess(&input, &output, entries.as_deref(), config.as_deref(), pretty),
        Commands::Validate { input, json } => cmd_validate(&input, json),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
        Commands::Defaults => {
            println!("{}", EngineConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn read_input(path: &Path) -> Result<String, InsightCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_bundle(path: &Path) -> Result<AssessmentBundle, InsightCliError> {
    let data = read_input(path)?;
    if data.trim().is_empty() {
        return Err(InsightCliError::NoInput);
    }
    Ok(RecordAdapter::parse_bundle(&data)?)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, InsightCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_file(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_assess(
    input: &Path,
    output: &Path,
    entries: Option<&Path>,
    config: Option<&Path>,
    pretty: bool,
) -> Result<(), InsightCliError> {
    let engine = RiskEngine::new(load_config(config)?)?;
    let mut bundle = load_bundle(input)?;

    if let Some(path) = entries {
        let extra = RecordAdapter::parse_ndjson(&fs::read_to_string(path)?)?;
        tracing::info!(records = extra.len(), "appending NDJSON diary records");
        bundle.entries.extend(extra);
    }

    let assessment = engine.assess_bundle(bundle)?;
    tracing::info!(
        user_id = %assessment.user_id,
        dropped = assessment.quality.dropped_records,
        modules = assessment.combined.modules_available.len(),
        "assessment complete"
    );

    let payload = if pretty {
        AssessmentEncoder::encode_to_json_pretty(&assessment)?
    } else {
        AssessmentEncoder::encode_to_json(&assessment)?
    };

    if output.to_string_lossy() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", payload)?;
    } else {
        fs::write(output, format!("{}\n", payload))?;
    }
    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), InsightCliError> {
    let bundle = load_bundle(input)?;
    let results = RecordAdapter::validate_records(&bundle)?;
    let total = bundle.entries.len() + bundle.block_events.len();

    let report = ValidationReport {
        total_records: total,
        valid_records: total - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                source: serde_json::to_value(r.source)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
                index: r.index,
                record_id: r.record_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - {} {} (index {}): {}",
                    err.source,
                    err.record_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(InsightCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), InsightCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", ENGINE_NAME, ENGINE_VERSION),
    });

    let engine_config = match config {
        Some(path) if !path.exists() => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: "Configuration file does not exist".to_string(),
            });
            None
        }
        Some(path) => match EngineConfig::from_file(path) {
            Ok(loaded) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Configuration valid ({} day window)", loaded.window_days),
                });
                Some(loaded)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "Using the built-in default configuration".to_string(),
            });
            Some(EngineConfig::default())
        }
    };

    if let Some(engine_config) = engine_config {
        let lexicon_terms = engine_config.lexicon.terms.len();
        let network_version = engine_config.network.version.clone();
        match RiskEngine::new(engine_config) {
            Ok(_) => {
                checks.push(DoctorCheck {
                    name: "network".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Network weights {} loaded", network_version),
                });
                checks.push(DoctorCheck {
                    name: "lexicon".to_string(),
                    status: if lexicon_terms == 0 {
                        CheckStatus::Warning
                    } else {
                        CheckStatus::Ok
                    },
                    message: format!("{} lexicon terms", lexicon_terms),
                });
            }
            Err(e) => checks.push(DoctorCheck {
                name: "network".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass bundles with --input)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - is ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        engine: ENGINE_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Insight Doctor Report");
        println!("=====================");
        println!("Engine:  {}", report.engine);
        println!("Version: {}", report.version);
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(InsightCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum InsightCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoInput,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for InsightCliError {
    fn from(e: io::Error) -> Self {
        InsightCliError::Io(e)
    }
}

impl From<EngineError> for InsightCliError {
    fn from(e: EngineError) -> Self {
        InsightCliError::Engine(e)
    }
}

impl From<serde_json::Error> for InsightCliError {
    fn from(e: serde_json::Error) -> Self {
        InsightCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InsightCliError> for CliError {
    fn from(e: InsightCliError) -> Self {
        match e {
            InsightCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InsightCliError::Engine(EngineError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'insight defaults' for a valid starting point".to_string()),
            },
            InsightCliError::Engine(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input is an assessment bundle with userId, now and accountCreatedAt".to_string()),
            },
            InsightCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InsightCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "Input is empty".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            InsightCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Malformed records are skipped by 'insight assess'".to_string()),
            },
            InsightCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    source: String,
    index: usize,
    record_id: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    engine: String,
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
