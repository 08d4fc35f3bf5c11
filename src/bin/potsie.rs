//! Potsie CLI - Command-line interface for Potsie
//!
//! Commands:
//! - extract: Convert LRS records into a metrics table
//! - distribution: Count metrics for a verb per calendar period or timecode
//! - generate: Emit synthetic xAPI video records
//! - fetch: Query video statements from the LRS (requires the `http` feature)
//! - doctor: Diagnose configuration

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use potsie::aggregate::{distribution, GroupBy, Period};
use potsie::config::{LrsConfig, ENV_LRS_API_URL};
use potsie::factories::VideoRecordFactory;
use potsie::pipeline::{records_to_metrics, RecordFormat};
use potsie::types::{MetricColumn, MetricsTable, Verb};
use potsie::{PotsieError, POTSIE_VERSION, PRODUCER_NAME};

/// Potsie - xAPI video statements to time series metrics
#[derive(Parser)]
#[command(name = "potsie")]
#[command(version = POTSIE_VERSION)]
#[command(about = "Turn xAPI video statements into metrics", long_about = None)]
struct Cli {
    /// Log filter (e.g. "potsie=debug"), defaults to RUST_LOG
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert LRS records into a metrics table
    Extract {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Count metrics for a verb per bucket
    Distribution {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Verb to count (completed, initialized, interacted, paused, played, seeked, terminated)
        #[arg(long)]
        verb: Verb,

        /// Calendar period used when no timecode column is given
        #[arg(long, default_value = "daily")]
        period: PeriodArg,

        /// Bucket by this timecode column instead (time, time_from, time_to, length, speed)
        #[arg(long)]
        timecode: Option<MetricColumn>,

        /// Timecode bucket width in seconds
        #[arg(long, default_value = "1")]
        resolution: f64,

        /// Count every statement instead of one per actor
        #[arg(long)]
        all: bool,
    },

    /// Emit synthetic xAPI video records as NDJSON
    Generate {
        /// Number of records
        #[arg(short, long, default_value = "100")]
        count: usize,

        /// Restrict to a single verb
        #[arg(long)]
        verb: Option<Verb>,

        /// Video uuid shared by every record
        #[arg(long)]
        video_id: Option<String>,

        /// Number of distinct learners
        #[arg(long, default_value = "20")]
        actors: usize,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Query video statements from the LRS and print their metrics
    Fetch {
        /// Video uuid
        #[arg(long)]
        video_id: String,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Diagnose configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

impl From<InputFormat> for RecordFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Ndjson => RecordFormat::Ndjson,
            InputFormat::Json => RecordFormat::Json,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one metric per line)
    Ndjson,
    /// JSON array of metrics
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Comma separated values with a header line
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum PeriodArg {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl From<PeriodArg> for Period {
    fn from(period: PeriodArg) -> Self {
        match period {
            PeriodArg::Hourly => Period::Hourly,
            PeriodArg::Daily => Period::Daily,
            PeriodArg::Weekly => Period::Weekly,
            PeriodArg::Monthly => Period::Monthly,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_filter.as_deref());

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

fn init_tracing(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("potsie=warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn run(cli: Cli) -> Result<(), PotsieCliError> {
    match cli.command {
        Commands::Extract {
            input,
            output,
            input_format,
            output_format,
        } => cmd_extract(&input, &output, input_format, output_format),

        Commands::Distribution {
            input,
            input_format,
            verb,
            period,
            timecode,
            resolution,
            all,
        } => {
            let group_by = match timecode {
                Some(column) => GroupBy::Timecode { column, resolution },
                None => GroupBy::Calendar(period.into()),
            };
            cmd_distribution(&input, input_format, verb, group_by, !all)
        }

        Commands::Generate {
            count,
            verb,
            video_id,
            actors,
            seed,
        } => cmd_generate(count, verb, video_id, actors, seed),

        Commands::Fetch {
            video_id,
            output_format,
        } => cmd_fetch(&video_id, output_format),

        Commands::Doctor { json } => cmd_doctor(json),
    }
}

fn read_input(input: &Path) -> Result<String, PotsieCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_extract(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), PotsieCliError> {
    let input_data = read_input(input)?;
    let table = records_to_metrics(&input_data, input_format.into())?;

    if table.is_empty() {
        return Err(PotsieCliError::NoRecords);
    }

    let output_data = format_output(&table, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_distribution(
    input: &Path,
    input_format: InputFormat,
    verb: Verb,
    group_by: GroupBy,
    unique: bool,
) -> Result<(), PotsieCliError> {
    let input_data = read_input(input)?;
    let table = records_to_metrics(&input_data, input_format.into())?;

    let buckets: Vec<DistributionBucket> = distribution(&table, verb, group_by, unique)
        .into_iter()
        .map(|(key, count)| DistributionBucket {
            bucket: serde_json::to_value(key).unwrap_or_default(),
            count,
        })
        .collect();

    let report = DistributionReport {
        verb: verb.to_string(),
        unique,
        buckets,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn cmd_generate(
    count: usize,
    verb: Option<Verb>,
    video_id: Option<String>,
    actors: usize,
    seed: Option<u64>,
) -> Result<(), PotsieCliError> {
    let mut factory = VideoRecordFactory {
        verb,
        actors,
        ..VideoRecordFactory::default()
    };
    if let Some(id) = video_id {
        factory = factory.with_object_id(format!("uuid://{}", id));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for record in factory.build(&mut rng, count) {
        println!("{}", serde_json::to_string(&record)?);
    }

    Ok(())
}

#[cfg(feature = "http")]
fn cmd_fetch(video_id: &str, output_format: OutputFormat) -> Result<(), PotsieCliError> {
    use potsie::lrs::{HttpTransport, LrsClient};
    use potsie::pipeline::metrics_for_video_id;

    let config = LrsConfig::from_env().map_err(PotsieError::from)?;
    let client = LrsClient::new(HttpTransport::new(&config)?);
    let table = metrics_for_video_id(&client, video_id)?;

    print!("{}", format_output(&table, &output_format)?);
    Ok(())
}

#[cfg(not(feature = "http"))]
fn cmd_fetch(_video_id: &str, _output_format: OutputFormat) -> Result<(), PotsieCliError> {
    Err(PotsieCliError::HttpDisabled)
}

fn cmd_doctor(json: bool) -> Result<(), PotsieCliError> {
    let mut report = DoctorReport::new();
    report.check(
        "potsie_version",
        CheckStatus::Ok,
        format!("Potsie version {}", POTSIE_VERSION),
    );
    record_source_checks(&mut report);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    if report.failed() {
        Err(PotsieCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

/// Checks on the two places records come from: the LRS and stdin
fn record_source_checks(report: &mut DoctorReport) {
    match LrsConfig::from_env() {
        Ok(config) => {
            report.check("lrs_auth_token", CheckStatus::Ok, "LRS authentication token is defined");
            match config.api_url {
                Some(url) => {
                    report.check("lrs_api_url", CheckStatus::Ok, format!("LRS API URL: {}", url))
                }
                None => report.check(
                    "lrs_api_url",
                    CheckStatus::Warning,
                    format!("{} is not defined, fetch is unavailable", ENV_LRS_API_URL),
                ),
            }
        }
        Err(e) => report.check("lrs_config", CheckStatus::Error, e.to_string()),
    }

    if cfg!(feature = "http") {
        report.check("lrs_transport", CheckStatus::Ok, "HTTP transport compiled in");
    } else {
        report.check("lrs_transport", CheckStatus::Warning, "Built without the http feature");
    }

    let piped = !atty::is(atty::Stream::Stdin);
    report.check(
        "stdin_records",
        CheckStatus::Ok,
        if piped {
            "records are piped in, read them with `--input -`"
        } else {
            "nothing piped in, pass a records file with `--input`"
        },
    );
}

fn format_output(table: &MetricsTable, format: &OutputFormat) -> Result<String, PotsieCliError> {
    match format {
        OutputFormat::Ndjson => Ok(table.to_ndjson()?),
        OutputFormat::Json => Ok(serde_json::to_string(table)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(table)?),
        OutputFormat::Csv => Ok(table.to_csv()?),
    }
}

// Error types

#[derive(Debug)]
enum PotsieCliError {
    Io(io::Error),
    Potsie(PotsieError),
    Json(serde_json::Error),
    NoRecords,
    DoctorFailed,
    #[cfg_attr(feature = "http", allow(dead_code))]
    HttpDisabled,
}

impl From<io::Error> for PotsieCliError {
    fn from(e: io::Error) -> Self {
        PotsieCliError::Io(e)
    }
}

impl From<PotsieError> for PotsieCliError {
    fn from(e: PotsieError) -> Self {
        PotsieCliError::Potsie(e)
    }
}

impl From<serde_json::Error> for PotsieCliError {
    fn from(e: serde_json::Error) -> Self {
        PotsieCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PotsieCliError> for CliError {
    fn from(e: PotsieCliError) -> Self {
        match e {
            PotsieCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PotsieCliError::Potsie(PotsieError::Parsing(e)) => CliError {
                code: "RECORD_PARSING_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Filter out malformed statements and retry".to_string()),
            },
            PotsieCliError::Potsie(PotsieError::Api(e)) => CliError {
                code: "LRS_API_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the LRS URL and authentication token".to_string()),
            },
            PotsieCliError::Potsie(PotsieError::Configuration(e)) => CliError {
                code: "CONFIGURATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'potsie doctor' for details".to_string()),
            },
            PotsieCliError::Potsie(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input contains LRS records ({\"_id\", \"statement\"})".to_string()),
            },
            PotsieCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PotsieCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PotsieCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PotsieCliError::HttpDisabled => CliError {
                code: "HTTP_DISABLED".to_string(),
                message: "This build cannot reach an LRS".to_string(),
                hint: Some("Rebuild with --features http".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DistributionReport {
    verb: String,
    unique: bool,
    buckets: Vec<DistributionBucket>,
}

#[derive(serde::Serialize)]
struct DistributionBucket {
    bucket: serde_json::Value,
    count: usize,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn new() -> Self {
        DoctorReport {
            producer: PRODUCER_NAME.to_string(),
            version: POTSIE_VERSION.to_string(),
            checks: Vec::new(),
        }
    }

    fn check(&mut self, name: &str, status: CheckStatus, message: impl Into<String>) {
        self.checks.push(DoctorCheck {
            name: name.to_string(),
            status,
            message: message.into(),
        });
    }

    fn failed(&self) -> bool {
        self.checks.iter().any(|c| c.status == CheckStatus::Error)
    }
}

impl std::fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {} doctor", self.producer, self.version)?;
        for check in &self.checks {
            let label = match check.status {
                CheckStatus::Ok => "ok",
                CheckStatus::Warning => "warn",
                CheckStatus::Error => "FAIL",
            };
            writeln!(f, "  {:<5} {:<16} {}", label, check.name, check.message)?;
        }
        Ok(())
    }
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize, PartialEq)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctor_report_fails_on_error_only() {
        let mut report = DoctorReport::new();
        report.check("lrs_transport", CheckStatus::Warning, "Built without the http feature");
        assert!(!report.failed());

        report.check("lrs_config", CheckStatus::Error, "POTSIE_LRS_AUTH_TOKEN environment variable should be defined");
        assert!(report.failed());

        let text = report.to_string();
        assert!(text.starts_with(&format!("potsie {} doctor\n", POTSIE_VERSION)));
        assert!(text.contains("  FAIL  lrs_config"));
    }
}
