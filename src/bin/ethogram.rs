//! Ethogram CLI - Command-line interface for ethogram-lens
//!
//! Commands:
//! - snapshot: Activity budget of one selection (plus deviations for an individual)
//! - compare: Several selections side by side
//! - history: One behavior over time
//! - colors: Behavior color legend
//! - doctor: Diagnose dataset and configuration health

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ethogram_lens::comparison::ComparisonPanel;
use ethogram_lens::config::DashboardConfig;
use ethogram_lens::filter::{FilterMode, FilterQuery, MonthWindow};
use ethogram_lens::pipeline::{Dashboard, HistoryRequest};
use ethogram_lens::table::{parse_month, RecordTable, Sex, TableLoader, REQUIRED_COLUMNS};
use ethogram_lens::{ComputeError, LENS_VERSION, PRODUCER_NAME};

/// Ethogram - behavior analysis for chimpanzee observation records
#[derive(Parser)]
#[command(name = "ethogram")]
#[command(version = LENS_VERSION)]
#[command(about = "Explore ethogram observation records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Activity budget of one selection
    Snapshot {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        window: WindowArgs,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Compare several selections side by side
    Compare {
        #[command(flatten)]
        data: DataArgs,

        /// JSON file with an array of panels (use - for stdin)
        #[arg(long)]
        panels: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// One behavior over time
    History {
        #[command(flatten)]
        data: DataArgs,

        /// Behavior to follow
        #[arg(short, long)]
        behavior: String,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Print the behavior color legend
    Colors {
        #[command(flatten)]
        data: DataArgs,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Diagnose dataset and configuration health
    Doctor {
        /// Dataset to check
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Dataset format
        #[arg(long, default_value = "csv")]
        input_format: InputFormat,

        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Dataset path (use - for stdin)
    #[arg(short, long)]
    data: PathBuf,

    /// Dataset format
    #[arg(long, default_value = "csv")]
    input_format: InputFormat,

    /// Dashboard configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct WindowArgs {
    /// Single month (YYYY-MM)
    #[arg(long, conflicts_with_all = ["start", "end"])]
    month: Option<String>,

    /// First month of the range (YYYY-MM); defaults to the earliest month
    #[arg(long)]
    start: Option<String>,

    /// Last month of the range (YYYY-MM); defaults to the latest month
    #[arg(long)]
    end: Option<String>,
}

#[derive(Args)]
struct SelectionArgs {
    /// Focal individual
    #[arg(long, conflicts_with_all = ["sex", "group"])]
    animal: Option<String>,

    /// Sex to include (repeatable); all when omitted
    #[arg(long)]
    sex: Vec<Sex>,

    /// Social group to include (repeatable); all when omitted
    #[arg(long)]
    group: Vec<String>,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EthogramCliError> {
    match cli.command {
        Commands::Snapshot {
            data,
            window,
            selection,
            output_format,
        } => cmd_snapshot(&data, &window, &selection, &output_format),

        Commands::Compare {
            data,
            panels,
            output_format,
        } => cmd_compare(&data, &panels, &output_format),

        Commands::History {
            data,
            behavior,
            selection,
            output_format,
        } => cmd_history(&data, behavior, &selection, &output_format),

        Commands::Colors {
            data,
            output_format,
        } => cmd_colors(&data, &output_format),

        Commands::Doctor {
            data,
            input_format,
            config,
            json,
        } => cmd_doctor(data.as_deref(), &input_format, config.as_deref(), json),
    }
}

fn cmd_snapshot(
    data: &DataArgs,
    window: &WindowArgs,
    selection: &SelectionArgs,
    output_format: &OutputFormat,
) -> Result<(), EthogramCliError> {
    let dashboard = open_dashboard(data)?;
    let window = resolve_window(window, dashboard.table())?;
    let query = FilterQuery::new(window, selection.to_mode());

    let report = dashboard.snapshot(&query)?;
    if report.body.is_empty() {
        warn!("no data available for the selected filters");
    }
    print_output(&report, output_format)
}

fn cmd_compare(
    data: &DataArgs,
    panels_path: &Path,
    output_format: &OutputFormat,
) -> Result<(), EthogramCliError> {
    let dashboard = open_dashboard(data)?;
    let panels: Vec<ComparisonPanel> = serde_json::from_str(&read_input(panels_path)?)?;
    if panels.is_empty() {
        return Err(EthogramCliError::NoPanels);
    }
    for (i, panel) in panels.iter().enumerate() {
        if panel.query.window.is_inverted() {
            warn!(panel = i + 1, "start date is after end date");
        }
    }

    let report = dashboard.compare(&panels);
    if report.body.report.is_empty() {
        warn!("no data available for comparison");
    }
    print_output(&report, output_format)
}

fn cmd_history(
    data: &DataArgs,
    behavior: String,
    selection: &SelectionArgs,
    output_format: &OutputFormat,
) -> Result<(), EthogramCliError> {
    let dashboard = open_dashboard(data)?;
    let request = HistoryRequest {
        behavior,
        mode: selection.to_mode(),
    };

    let report = dashboard.history(&request);
    if report.body.trend.is_none() {
        warn!("not enough data for a trend");
    }
    print_output(&report, output_format)
}

fn cmd_colors(data: &DataArgs, output_format: &OutputFormat) -> Result<(), EthogramCliError> {
    let dashboard = open_dashboard(data)?;
    print_output(&dashboard.legend(), output_format)
}

fn cmd_doctor(
    data: Option<&Path>,
    input_format: &InputFormat,
    config: Option<&Path>,
    json: bool,
) -> Result<(), EthogramCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "lens_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("ethogram-lens version {}", LENS_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema".to_string(),
        status: CheckStatus::Ok,
        message: format!("Required columns: {}", REQUIRED_COLUMNS.join(", ")),
    });

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match DashboardConfig::from_json(&content) {
                Ok(cfg) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid ({} palette colors, {:?} social group policy)",
                        cfg.palette.len(),
                        cfg.social_group_policy
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        };
        checks.push(check);
    }

    if let Some(data_path) = data {
        match read_input(data_path).map_err(EthogramCliError::from).and_then(|content| {
            parse_table(&content, input_format).map_err(EthogramCliError::from)
        }) {
            Ok(table) => dataset_checks(&table, &mut checks),
            Err(e) => checks.push(DoctorCheck {
                name: "dataset".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            }),
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass a dataset path with --data)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--data - reads from it)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: LENS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Ethogram Doctor Report");
        println!("======================");
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
        Err(EthogramCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn dataset_checks(table: &RecordTable, checks: &mut Vec<DoctorCheck>) {
    if table.is_empty() {
        checks.push(DoctorCheck {
            name: "dataset".to_string(),
            status: CheckStatus::Error,
            message: "Dataset has no rows".to_string(),
        });
        return;
    }

    let span = table
        .date_span()
        .map(|(min, max)| format!("{} to {}", min.format("%Y-%m"), max.format("%Y-%m")))
        .unwrap_or_default();
    checks.push(DoctorCheck {
        name: "dataset".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "{} rows, {} individuals, {} social groups, {} behaviors, {}",
            table.len(),
            table.individuals().len(),
            table.social_groups().len(),
            table.distinct_behaviors().len(),
            span
        ),
    });

    let movers: Vec<String> = table
        .groups_by_individual()
        .into_iter()
        .filter(|(_, groups)| groups.len() > 1)
        .map(|(name, groups)| {
            format!(
                "{} ({})",
                name,
                groups.into_iter().collect::<Vec<_>>().join(", ")
            )
        })
        .collect();
    checks.push(if movers.is_empty() {
        DoctorCheck {
            name: "social_groups".to_string(),
            status: CheckStatus::Ok,
            message: "Every individual stays in one social group".to_string(),
        }
    } else {
        DoctorCheck {
            name: "social_groups".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "Individuals observed in several groups (deviations over windows spanning a change follow social_group_policy): {}",
                movers.join("; ")
            ),
        }
    });

    let out_of_range = table
        .iter()
        .filter(|r| !(0.0..=100.0).contains(&r.percentage))
        .count();
    if out_of_range > 0 {
        checks.push(DoctorCheck {
            name: "percentages".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} rows outside 0-100", out_of_range),
        });
    }
}

// Helper functions

impl SelectionArgs {
    fn to_mode(&self) -> FilterMode {
        match &self.animal {
            Some(animal) => FilterMode::individual(animal.clone()),
            None => FilterMode::BySexAndGroup {
                sexes: (!self.sex.is_empty()).then(|| self.sex.iter().copied().collect()),
                groups: (!self.group.is_empty()).then(|| self.group.iter().cloned().collect()),
            },
        }
    }
}

fn resolve_window(args: &WindowArgs, table: &RecordTable) -> Result<MonthWindow, EthogramCliError> {
    if let Some(month) = &args.month {
        let date = parse_month(month)?;
        return MonthWindow::covering(date, date).ok_or(EthogramCliError::NoData);
    }

    if args.start.is_none() && args.end.is_none() {
        return MonthWindow::latest_month(table).ok_or(EthogramCliError::NoData);
    }

    let (min, max) = table.date_span().ok_or(EthogramCliError::NoData)?;
    let start = match &args.start {
        Some(s) => parse_month(s)?,
        None => min,
    };
    let end = match &args.end {
        Some(s) => parse_month(s)?,
        None => max,
    };

    let window = MonthWindow::covering(start, end).ok_or(EthogramCliError::NoData)?;
    if window.is_inverted() {
        warn!("start date cannot be after end date; the selection will be empty");
    }
    Ok(window)
}

fn open_dashboard(args: &DataArgs) -> Result<Dashboard, EthogramCliError> {
    let table = parse_table(&read_input(&args.data)?, &args.input_format)?;
    if table.is_empty() {
        return Err(EthogramCliError::NoData);
    }

    let config = match &args.config {
        Some(path) => DashboardConfig::from_json(&fs::read_to_string(path)?)?,
        None => DashboardConfig::default(),
    };

    Ok(Dashboard::with_config(table, config)?)
}

fn parse_table(content: &str, format: &InputFormat) -> Result<RecordTable, ComputeError> {
    match format {
        InputFormat::Csv => TableLoader::parse_csv(content),
        InputFormat::Ndjson => TableLoader::parse_ndjson(content),
        InputFormat::Json => TableLoader::parse_array(content),
    }
}

fn read_input(path: &Path) -> Result<String, io::Error> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
    }
}

fn print_output<T: serde::Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<(), EthogramCliError> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    println!("{}", output);
    Ok(())
}

// Error types

#[derive(Debug)]
enum EthogramCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoData,
    NoPanels,
    DoctorFailed,
}

impl From<io::Error> for EthogramCliError {
    fn from(e: io::Error) -> Self {
        EthogramCliError::Io(e)
    }
}

impl From<ComputeError> for EthogramCliError {
    fn from(e: ComputeError) -> Self {
        EthogramCliError::Compute(e)
    }
}

impl From<serde_json::Error> for EthogramCliError {
    fn from(e: serde_json::Error) -> Self {
        EthogramCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EthogramCliError> for CliError {
    fn from(e: EthogramCliError) -> Self {
        match e {
            EthogramCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EthogramCliError::Compute(e) => {
                let hint = match &e {
                    ComputeError::MissingColumns(_) | ComputeError::CsvError(_) => {
                        format!("Dataset needs columns: {}", REQUIRED_COLUMNS.join(", "))
                    }
                    ComputeError::MixedSocialGroups { .. } => {
                        "Narrow the date range or set social_group_policy to first_row".to_string()
                    }
                    ComputeError::ConfigError(_) => "Check the configuration file".to_string(),
                    _ => "Run 'ethogram doctor --data <file>' for details".to_string(),
                };
                CliError {
                    code: "COMPUTE_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint),
                }
            }
            EthogramCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EthogramCliError::NoData => CliError {
                code: "NO_DATA".to_string(),
                message: "Dataset has no rows".to_string(),
                hint: Some("Ensure the dataset file is not empty".to_string()),
            },
            EthogramCliError::NoPanels => CliError {
                code: "NO_PANELS".to_string(),
                message: "No comparison panels given".to_string(),
                hint: Some("Provide a JSON array with at least one panel".to_string()),
            },
            EthogramCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
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
