//! cgmflux CLI - Command-line interface for CGM Flux
//!
//! Commands:
//! - report: Full glucose report (JSON)
//! - agp: Ambulatory glucose profile percentiles per 5-minute slot
//! - tir: Time-in-range counts, overall or grouped
//! - roc: Rate-of-change points or summary
//! - hypo: Hypoglycemia episodes per local day
//! - iob: Hourly insulin delivery and insulin on board for one day
//! - validate: Check readings against the ingestion contract

use chrono::{FixedOffset, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

use cgm_flux::agp::AgpCalculator;
use cgm_flux::categorizer::{self, TimePeriod};
use cgm_flux::config::AnalysisConfig;
use cgm_flux::hypo::HypoDetector;
use cgm_flux::input::ReadingAdapter;
use cgm_flux::iob::IobEstimator;
use cgm_flux::logging;
use cgm_flux::normalizer::ReadingNormalizer;
use cgm_flux::pipeline::{build_report, LabelledStats, WeekdayBreakdown};
use cgm_flux::roc::{RocEngine, RocInterval};
use cgm_flux::types::{
    GlucoseReading, GlucoseSource, GlucoseThresholds, GlucoseUnit, InsulinHistory,
    RangeCategoryMode,
};
use cgm_flux::{ComputeError, FLUX_VERSION};

/// cgmflux - Deterministic analytics for CGM and insulin pump data
#[derive(Parser)]
#[command(name = "cgmflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Compute glucose analytics from CGM exports", long_about = None)]
struct Cli {
    /// Default log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the full report
    Report {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Insulin history JSON file
        #[arg(long)]
        insulin: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Ambulatory glucose profile (288 five-minute slots)
    Agp {
        #[command(flatten)]
        input: InputArgs,

        /// Report values in this unit
        #[arg(long, default_value = "mmol")]
        display_unit: UnitArg,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Time-in-range counts
    Tir {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Grouping
        #[arg(long, default_value = "overall")]
        group_by: GroupBy,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Rate-of-change points
    Roc {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Print the summary instead of every point
        #[arg(long)]
        summary: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Hypoglycemia episodes, one summary per local day
    Hypo {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Hourly insulin on board for one day
    Iob {
        /// Insulin history JSON file (use - for stdin)
        #[arg(short, long)]
        insulin: PathBuf,

        /// Local calendar date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// UTC offset of the local day, e.g. +01:00
        #[arg(long, default_value = "+00:00", allow_hyphen_values = true)]
        utc_offset: FixedOffset,

        /// Duration of insulin action in hours
        #[arg(long, default_value = "4.0")]
        insulin_duration: f64,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Validate readings
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Readings file path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Input format
    #[arg(long, default_value = "json")]
    input_format: InputFormat,

    /// Unit the readings were recorded in
    #[arg(long, default_value = "mmol")]
    input_unit: UnitArg,

    /// Keep only readings on this local date
    #[arg(long, conflicts_with_all = ["from", "to"])]
    date: Option<NaiveDate>,

    /// First local date to keep (inclusive)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last local date to keep (inclusive)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Keep only readings from this source
    #[arg(long)]
    source: Option<SourceArg>,
}

#[derive(Args)]
struct AnalysisArgs {
    /// Analysis config JSON file; replaces the threshold flags below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Very-low threshold in mmol/L
    #[arg(long, default_value = "3.0")]
    very_low: f64,

    /// Low threshold in mmol/L
    #[arg(long, default_value = "3.9")]
    low: f64,

    /// High threshold in mmol/L
    #[arg(long, default_value = "10.0")]
    high: f64,

    /// Very-high threshold in mmol/L
    #[arg(long, default_value = "13.9")]
    very_high: f64,

    /// Number of range categories
    #[arg(long, default_value = "5")]
    categories: CategoriesArg,

    /// RoC comparison interval in minutes (15, 30, 60 or 120)
    #[arg(long, default_value = "15")]
    roc_interval: u32,

    /// Duration of insulin action in hours
    #[arg(long, default_value = "4.0")]
    insulin_duration: f64,
}

#[derive(Args)]
struct OutputArgs {
    /// Output file path (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Output format
    #[arg(long, default_value = "json")]
    output_format: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one reading per line)
    Ndjson,
    /// JSON array of readings
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    /// mmol/L
    Mmol,
    /// mg/dL
    Mgdl,
}

impl From<UnitArg> for GlucoseUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Mmol => GlucoseUnit::MmolL,
            UnitArg::Mgdl => GlucoseUnit::MgDl,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Cgm,
    Bg,
}

impl From<SourceArg> for GlucoseSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Cgm => GlucoseSource::Cgm,
            SourceArg::Bg => GlucoseSource::Bg,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoriesArg {
    #[value(name = "3")]
    Three,
    #[value(name = "5")]
    Five,
}

impl From<CategoriesArg> for RangeCategoryMode {
    fn from(categories: CategoriesArg) -> Self {
        match categories {
            CategoriesArg::Three => RangeCategoryMode::Three,
            CategoriesArg::Five => RangeCategoryMode::Five,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum GroupBy {
    Overall,
    DayOfWeek,
    Week,
    Date,
    Hour,
    Period,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_with_level(&cli.log_level);

    match run(cli.command) {
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

fn run(command: Commands) -> Result<(), CgmCliError> {
    match command {
        Commands::Report {
            input,
            analysis,
            insulin,
            output,
        } => {
            let readings = load_readings(&input)?;
            let config = analysis.resolve()?;
            let history = insulin.as_deref().map(load_insulin).transpose()?;
            let report = build_report(&readings, history.as_ref(), &config);
            info!(readings = report.reading_count, days = report.days.len(), "report computed");
            write_output(&output, &format_single(&report, &output.output_format)?)
        }

        Commands::Agp {
            input,
            display_unit,
            output,
        } => {
            let readings = ReadingNormalizer::normalize(&load_readings(&input)?);
            let unit = GlucoseUnit::from(display_unit);
            let slots: Vec<_> = AgpCalculator::compute(&readings)
                .into_iter()
                .map(|mut slot| {
                    for value in [
                        &mut slot.lowest,
                        &mut slot.p10,
                        &mut slot.p25,
                        &mut slot.p50,
                        &mut slot.p75,
                        &mut slot.p90,
                        &mut slot.highest,
                    ] {
                        *value = unit.from_canonical(*value);
                    }
                    slot
                })
                .collect();
            write_output(&output, &format_list(&slots, &output.output_format)?)
        }

        Commands::Tir {
            input,
            analysis,
            group_by,
            output,
        } => {
            let readings = ReadingNormalizer::normalize(&load_readings(&input)?);
            let config = analysis.resolve()?;
            let (thresholds, mode) = (&config.thresholds, config.category_mode);
            let format = &output.output_format;

            let data = match group_by {
                GroupBy::Overall => format_single(&categorizer::overall(&readings, thresholds, mode), format)?,
                GroupBy::DayOfWeek => format_single(
                    &WeekdayBreakdown::from(&categorizer::by_day_of_week(&readings, thresholds, mode)),
                    format,
                )?,
                GroupBy::Week => format_list(&categorizer::by_week(&readings, thresholds, mode), format)?,
                GroupBy::Date => {
                    let rows: Vec<LabelledStats> = categorizer::by_date(&readings, thresholds, mode)
                        .into_iter()
                        .map(|(date, stats)| LabelledStats {
                            label: date.to_string(),
                            stats,
                        })
                        .collect();
                    format_list(&rows, format)?
                }
                GroupBy::Hour => format_list(&categorizer::by_hour(&readings, thresholds, mode), format)?,
                GroupBy::Period => format_list(
                    &categorizer::by_time_period(
                        &readings,
                        thresholds,
                        mode,
                        &TimePeriod::standard_periods(),
                        None,
                    ),
                    format,
                )?,
            };
            write_output(&output, &data)
        }

        Commands::Roc {
            input,
            analysis,
            summary,
            output,
        } => {
            let readings = ReadingNormalizer::normalize(&load_readings(&input)?);
            let config = analysis.resolve()?;
            let points = RocEngine::compute(&readings, config.roc_interval);
            debug!(points = points.len(), interval = config.roc_interval.minutes(), "rate of change computed");

            let data = if summary {
                format_single(&RocEngine::stats(&points), &output.output_format)?
            } else {
                format_list(&points, &output.output_format)?
            };
            write_output(&output, &data)
        }

        Commands::Hypo {
            input,
            analysis,
            output,
        } => {
            let readings = load_readings(&input)?;
            let config = analysis.resolve()?;
            let days = HypoDetector::detect_by_day(&readings, &config.thresholds);
            write_output(&output, &format_list(&days, &output.output_format)?)
        }

        Commands::Iob {
            insulin,
            date,
            utc_offset,
            insulin_duration,
            output,
        } => {
            if !insulin_duration.is_finite() || insulin_duration <= 0.0 {
                return Err(CgmCliError::Compute(ComputeError::InvalidConfig(format!(
                    "insulin duration must be positive, got {}",
                    insulin_duration
                ))));
            }
            let history = load_insulin(&insulin)?;
            let rows = IobEstimator::hourly(&history, date, utc_offset, insulin_duration);
            write_output(&output, &format_list(&rows, &output.output_format)?)
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, &input_format, json),
    }
}

impl AnalysisArgs {
    fn resolve(&self) -> Result<AnalysisConfig, CgmCliError> {
        let config = match &self.config {
            Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
            None => {
                let interval = RocInterval::try_from(self.roc_interval)
                    .map_err(|e| CgmCliError::Compute(ComputeError::InvalidConfig(e)))?;
                AnalysisConfig::new(
                    GlucoseThresholds::new(self.very_low, self.low, self.high, self.very_high),
                    self.categories.into(),
                    self.insulin_duration,
                )
                .with_roc_interval(interval)
            }
        };
        config.validate()?;
        Ok(config)
    }
}

fn cmd_validate(input: &Path, input_format: &InputFormat, json: bool) -> Result<(), CgmCliError> {
    let readings = parse_readings(&read_input(input)?, input_format)?;
    let errors = ReadingAdapter::validate_readings(&readings);

    let report = ValidationReport {
        total_readings: readings.len(),
        valid_readings: readings.len() - errors.len(),
        invalid_readings: errors.len(),
        errors: errors
            .iter()
            .map(|e| match e {
                ComputeError::InvalidReading { index, reason } => ValidationErrorDetail {
                    index: *index,
                    error: reason.clone(),
                },
                other => ValidationErrorDetail {
                    index: 0,
                    error: other.to_string(),
                },
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total readings:   {}", report.total_readings);
        println!("Valid readings:   {}", report.valid_readings);
        println!("Invalid readings: {}", report.invalid_readings);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Reading {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_readings > 0 {
        Err(CgmCliError::ValidationFailed(report.invalid_readings))
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(path: &Path) -> Result<String, CgmCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn parse_readings(data: &str, format: &InputFormat) -> Result<Vec<GlucoseReading>, CgmCliError> {
    Ok(match format {
        InputFormat::Ndjson => ReadingAdapter::parse_ndjson(data)?,
        InputFormat::Json => ReadingAdapter::parse_array(data)?,
    })
}

/// Read, check, convert and filter readings as the flags ask
fn load_readings(args: &InputArgs) -> Result<Vec<GlucoseReading>, CgmCliError> {
    let parsed = parse_readings(&read_input(&args.input)?, &args.input_format)?;
    if let Some(err) = ReadingAdapter::validate_readings(&parsed).into_iter().next() {
        return Err(err.into());
    }

    let mut readings = ReadingAdapter::to_canonical(parsed, args.input_unit.into());
    if let Some(date) = args.date {
        readings = ReadingNormalizer::readings_for_date(&readings, date);
    }
    if args.from.is_some() || args.to.is_some() {
        let start = args.from.unwrap_or(NaiveDate::MIN);
        let end = args.to.unwrap_or(NaiveDate::MAX);
        readings = ReadingNormalizer::filter_date_range(&readings, start, end);
    }
    if let Some(source) = args.source {
        readings = ReadingNormalizer::filter_source(&readings, source.into());
    }

    debug!(readings = readings.len(), "readings loaded");
    Ok(readings)
}

fn load_insulin(path: &Path) -> Result<InsulinHistory, CgmCliError> {
    let history = ReadingAdapter::parse_insulin_history(&read_input(path)?)?;
    if let Some(err) = ReadingAdapter::validate_insulin_history(&history).into_iter().next() {
        return Err(err.into());
    }
    Ok(history)
}

fn format_single<T: Serialize>(value: &T, format: &OutputFormat) -> Result<String, CgmCliError> {
    match format {
        OutputFormat::Ndjson | OutputFormat::Json => Ok(serde_json::to_string(value)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)? + "\n"),
    }
}

fn format_list<T: Serialize>(items: &[T], format: &OutputFormat) -> Result<String, CgmCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                lines.push(serde_json::to_string(item)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(items)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(items)? + "\n"),
    }
}

fn write_output(args: &OutputArgs, data: &str) -> Result<(), CgmCliError> {
    if args.output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(&args.output, data)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum CgmCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
}

impl From<io::Error> for CgmCliError {
    fn from(e: io::Error) -> Self {
        CgmCliError::Io(e)
    }
}

impl From<ComputeError> for CgmCliError {
    fn from(e: ComputeError) -> Self {
        CgmCliError::Compute(e)
    }
}

impl From<serde_json::Error> for CgmCliError {
    fn from(e: serde_json::Error) -> Self {
        CgmCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CgmCliError> for CliError {
    fn from(e: CgmCliError) -> Self {
        match e {
            CgmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CgmCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => {
                        ("PARSE_ERROR", "Readings need timestamp, value and source fields")
                    }
                    ComputeError::MissingField(_) => ("MISSING_FIELD", "Check the input records"),
                    ComputeError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Thresholds must ascend and insulin duration must be positive")
                    }
                    ComputeError::InvalidReading { .. } => {
                        ("INVALID_READING", "Run 'cgmflux validate' for details")
                    }
                    ComputeError::InvalidInsulin { .. } => {
                        ("INVALID_INSULIN", "Bolus units and basal rates must be non-negative numbers")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CgmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CgmCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} readings failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    total_readings: usize,
    valid_readings: usize,
    invalid_readings: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}
