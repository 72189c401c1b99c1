//! Narrative CLI - Command-line interface for Narrative Flux
//!
//! Commands:
//! - compute: Compute index series from messages or aggregates (batch mode)
//! - aggregate: Group classified messages into daily aggregates
//! - run: Process streaming messages from stdin (streaming mode)
//! - validate: Validate input records
//! - doctor: Diagnose configuration and store health

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use narrative_flux::aggregator::SignalAggregator;
use narrative_flux::pipeline::SeriesIndicators;
use narrative_flux::schema::{ClassifiedMessage, InputAdapter, ValidationResult, SCHEMA_VERSION};
use narrative_flux::types::{BatchResponse, DailyAggregate};
use narrative_flux::{
    ComputeError, SeriesFailure, IndexStore, NarrativeConfig, NarrativeProcessor, NARRATIVE_VERSION,
    PRODUCER_NAME,
};

/// Narrative - Deterministic compute engine for narrative-strength indices
#[derive(Parser)]
#[command(name = "narrative")]
#[command(author = "Synheart AI Inc")]
#[command(version = NARRATIVE_VERSION)]
#[command(about = "Turn classified social signals into narrative-strength indices", long_about = None)]
struct Cli {
    /// Log pipeline stages to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the computing commands
#[derive(clap::Args)]
struct ComputeOptions {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override index.alpha
    #[arg(long)]
    alpha: Option<f64>,

    /// Override index.lambda
    #[arg(long)]
    lambda: Option<f64>,

    /// Override forecast.forecast_days
    #[arg(long)]
    forecast_days: Option<u32>,

    /// Override aggregation.timezone ("UTC" or "+HH:MM")
    #[arg(long)]
    timezone: Option<String>,

    /// JSON array of auxiliary indicators ({entity_id, locale, sve?, sna?, cp?, nmi?})
    #[arg(long)]
    indicators: Option<PathBuf>,

    /// Load the index store from file
    #[arg(long)]
    load_store: Option<PathBuf>,

    /// Save the index store to file after processing
    #[arg(long)]
    save_store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute index series, forecasts and narrative scores (batch mode)
    Compute {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Kind of input records
        #[arg(long, default_value = "messages")]
        input_kind: InputKind,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        options: ComputeOptions,
    },

    /// Group classified messages into daily aggregates
    Aggregate {
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

        /// Day boundary timezone ("UTC" or "+HH:MM")
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Tracked entities that get zero-volume days when their locale has conversation
        #[arg(long, value_delimiter = ',')]
        entities: Vec<String>,
    },

    /// Process streaming NDJSON messages from stdin (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Flush output after each completed day
        #[arg(long, default_value = "true")]
        flush: bool,

        #[command(flatten)]
        options: ComputeOptions,
    },

    /// Validate input records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Kind of input records
        #[arg(long, default_value = "messages")]
        input_kind: InputKind,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and store health
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check an index store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputKind {
    Messages,
    Aggregates,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    Ndjson,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Ndjson,
    Json,
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaType {
    Input,
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error_json = serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| {
                r#"{"code":"UNKNOWN","message":"Failed to serialize error"}"#.to_string()
            });
            eprintln!("{}", error_json);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), NarrativeCliError> {
    match cli.command {
        Commands::Compute {
            input,
            output,
            input_kind,
            input_format,
            output_format,
            options,
        } => cmd_compute(&input, &output, input_kind, input_format, output_format, &options),
        Commands::Aggregate {
            input,
            output,
            input_format,
            output_format,
            timezone,
            entities,
        } => cmd_aggregate(&input, &output, input_format, output_format, &timezone, entities),
        Commands::Run {
            output_format,
            flush,
            options,
        } => cmd_run(output_format, flush, &options),
        Commands::Validate {
            input,
            input_kind,
            input_format,
            json,
        } => cmd_validate(&input, input_kind, input_format, json),
        Commands::Doctor {
            config,
            store,
            json,
        } => cmd_doctor(config.as_deref(), store.as_deref(), json),
        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_compute(
    input: &Path,
    output: &Path,
    input_kind: InputKind,
    input_format: InputFormat,
    output_format: OutputFormat,
    options: &ComputeOptions,
) -> Result<(), NarrativeCliError> {
    let input_data = read_input(input)?;
    let mut processor = build_processor(options)?;

    let touched = match input_kind {
        InputKind::Messages => {
            let messages = parse_messages(&input_data, input_format)?;
            if messages.is_empty() {
                return Err(NarrativeCliError::NoRecords);
            }
            processor.ingest_messages(&messages)?
        }
        InputKind::Aggregates => {
            let aggregates = parse_aggregates(&input_data, input_format)?;
            if aggregates.is_empty() {
                return Err(NarrativeCliError::NoRecords);
            }
            processor.ingest(aggregates)?
        }
    };
    debug!(series = touched.len(), "input ingested");

    let report = processor.process_batch();
    let response = report.to_response(processor.encoder(), processor.config());
    write_output(output, &format_output(&response, output_format)?)?;

    if let Some(path) = &options.save_store {
        fs::write(path, processor.save_store()?)?;
    }

    series_outcome(response.failures.len())
}

fn cmd_aggregate(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    timezone: &str,
    entities: Vec<String>,
) -> Result<(), NarrativeCliError> {
    let input_data = read_input(input)?;
    let messages = parse_messages(&input_data, input_format)?;
    if messages.is_empty() {
        return Err(NarrativeCliError::NoRecords);
    }

    let aggregator = SignalAggregator::from_timezone(timezone)?.with_tracked_entities(entities);
    let aggregates = aggregator.aggregate(&messages)?;
    write_output(output, &format_records(&aggregates, output_format)?)
}

fn cmd_run(
    output_format: OutputFormat,
    flush: bool,
    options: &ComputeOptions,
) -> Result<(), NarrativeCliError> {
    let mut processor = build_processor(options)?;
    let offset = processor.config().aggregation.offset()?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    // Messages are buffered per calendar day and flushed when the day changes
    let mut buffer: Vec<ClassifiedMessage> = Vec::new();
    let mut current_day: Option<NaiveDate> = None;
    let mut failed = 0;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: ClassifiedMessage = serde_json::from_str(trimmed)
            .map_err(|e| NarrativeCliError::ParseError(format!("Invalid JSON: {}", e)))?;
        let day = message.timestamp.with_timezone(&offset).date_naive();

        if current_day.is_some_and(|current| current != day) && !buffer.is_empty() {
            let (output, failures) = process_day(&mut processor, &buffer, output_format)?;
            failed = failures;
            write!(stdout, "{}", output)?;
            if flush {
                stdout.flush()?;
            }
            buffer.clear();
        }

        current_day = Some(day);
        buffer.push(message);
    }

    if !buffer.is_empty() {
        let (output, failures) = process_day(&mut processor, &buffer, output_format)?;
        failed = failures;
        write!(stdout, "{}", output)?;
        stdout.flush()?;
    }

    if let Some(path) = &options.save_store {
        fs::write(path, processor.save_store()?)?;
    }

    // Only the last flush counts; earlier failures may heal as history grows
    series_outcome(failed)
}

/// Formatted output of one flushed day and the number of failed series
fn process_day(
    processor: &mut NarrativeProcessor,
    messages: &[ClassifiedMessage],
    output_format: OutputFormat,
) -> Result<(String, usize), NarrativeCliError> {
    let touched = processor.ingest_messages(messages)?;
    debug!(messages = messages.len(), series = touched.len(), "day flushed");

    let report = processor.process_batch();
    let response = report.to_response(processor.encoder(), processor.config());
    Ok((format_output(&response, output_format)?, response.failures.len()))
}

fn cmd_validate(
    input: &Path,
    input_kind: InputKind,
    input_format: InputFormat,
    json: bool,
) -> Result<(), NarrativeCliError> {
    let input_data = read_input(input)?;

    let (total, failures) = match input_kind {
        InputKind::Messages => {
            let messages = parse_messages(&input_data, input_format)?;
            (messages.len(), InputAdapter::validate_messages(&messages))
        }
        InputKind::Aggregates => {
            let aggregates = parse_aggregates(&input_data, input_format)?;
            (aggregates.len(), InputAdapter::validate_aggregates(&aggregates))
        }
    };

    let report = ValidationReport::new(total, &failures);

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
                    "  - Record {} (index {}): {}",
                    err.record_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(NarrativeCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    store: Option<&Path>,
    json: bool,
) -> Result<(), NarrativeCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck::new(
            "narrative_version",
            CheckStatus::Ok,
            format!("Narrative Flux version {}", NARRATIVE_VERSION),
        ),
        DoctorCheck::new(
            "schema_version",
            CheckStatus::Ok,
            format!("Input schema: {}", SCHEMA_VERSION),
        ),
    ];

    if let Some(config_path) = config {
        checks.push(match NarrativeConfig::load(config_path) {
            Ok(loaded) => DoctorCheck::new(
                "config",
                CheckStatus::Ok,
                format!(
                    "Configuration valid (alpha {}, lambda {}, {} forecast days, timezone {})",
                    loaded.index.alpha,
                    loaded.index.lambda,
                    loaded.forecast.forecast_days,
                    loaded.aggregation.timezone
                ),
            ),
            Err(e) => DoctorCheck::new("config", CheckStatus::Error, format!("Invalid configuration: {}", e)),
        });
    }

    if let Some(store_path) = store {
        let check = if !store_path.exists() {
            DoctorCheck::new("store", CheckStatus::Warning, "Store file does not exist".to_string())
        } else {
            match fs::read_to_string(store_path) {
                Ok(content) => match IndexStore::from_json(&content) {
                    Ok(loaded) => {
                        let stale = loaded.stale_keys().len();
                        let status = if stale > 0 {
                            CheckStatus::Warning
                        } else {
                            CheckStatus::Ok
                        };
                        DoctorCheck::new(
                            "store",
                            status,
                            format!("Store valid ({} series, {} awaiting recompute)", loaded.len(), stale),
                        )
                    }
                    Err(e) => DoctorCheck::new("store", CheckStatus::Error, format!("Invalid store JSON: {}", e)),
                },
                Err(e) => DoctorCheck::new("store", CheckStatus::Error, format!("Cannot read store file: {}", e)),
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for streaming mode)
    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (interactive mode)"
    } else {
        "stdin is a pipe (streaming mode ready)"
    };
    checks.push(DoctorCheck::new("stdin", CheckStatus::Ok, stdin_message.to_string()));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: NARRATIVE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Narrative Doctor Report");
        println!("=======================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(NarrativeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), NarrativeCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("Two record kinds are accepted (JSON array or NDJSON):");
                println!();
                println!("1. message - One classified social-signal message");
                println!("   - timestamp (RFC 3339, UTC), entity_id, locale");
                println!("   - sentiment: positive, negative, neutral");
                println!("   - optional message_id, schema_version");
                println!();
                println!("2. aggregate - Pre-aggregated daily counts for one entity and locale");
                println!("   - entity_id, locale, date (YYYY-MM-DD)");
                println!("   - positive_count, negative_count, neutral_count");
                println!("   - entity_volume, market_volume");
                println!("   - counts must satisfy positive+negative+neutral <= entity_volume <= market_volume");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: narrative response");
                println!();
                println!("One response per (entity_id, locale) series:");
                println!();
                println!("- series: {{ dates, icce, icce_smooth, momentum }}");
                println!("- forecast: {{ dates, icce_pred, pred_low, pred_high }}");
                println!("- narrative: {{ sve, sna, cp, nmi, ivn: {{ value, risk_level, label }} }} or null");
                println!("- parameters: {{ alpha, lambda, forecast_days }}");
                println!("- quality: {{ low_confidence_days, interpolated_days, momentum_label, icce_bucket }}");
                println!("- producer: {{ name, version, instance_id, computed_at_utc }}");
                println!();
                println!("Batch output (json formats) wraps responses as {{ results, failures }}.");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, NarrativeCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, content: &str) -> Result<(), NarrativeCliError> {
    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        write!(stdout, "{}", content)?;
        stdout.flush()?;
    } else {
        fs::write(output, content)?;
    }
    Ok(())
}

fn parse_messages(
    input_data: &str,
    input_format: InputFormat,
) -> Result<Vec<ClassifiedMessage>, NarrativeCliError> {
    Ok(match input_format {
        InputFormat::Ndjson => InputAdapter::parse_messages_ndjson(input_data)?,
        InputFormat::Json => InputAdapter::parse_messages_array(input_data)?,
    })
}

fn parse_aggregates(
    input_data: &str,
    input_format: InputFormat,
) -> Result<Vec<DailyAggregate>, NarrativeCliError> {
    Ok(match input_format {
        InputFormat::Ndjson => InputAdapter::parse_aggregates_ndjson(input_data)?,
        InputFormat::Json => InputAdapter::parse_aggregates_array(input_data)?,
    })
}

/// Configuration file, then flag overrides, then validation
fn build_config(options: &ComputeOptions) -> Result<NarrativeConfig, NarrativeCliError> {
    let mut config = match &options.config {
        Some(path) => NarrativeConfig::load(path)?,
        None => NarrativeConfig::default(),
    };

    if let Some(alpha) = options.alpha {
        config.index.alpha = alpha;
    }
    if let Some(lambda) = options.lambda {
        config.index.lambda = lambda;
    }
    if let Some(forecast_days) = options.forecast_days {
        config.forecast.forecast_days = forecast_days;
    }
    if let Some(timezone) = &options.timezone {
        config.aggregation.timezone = timezone.clone();
    }

    config.validate()?;
    Ok(config)
}

fn build_processor(options: &ComputeOptions) -> Result<NarrativeProcessor, NarrativeCliError> {
    let mut processor = NarrativeProcessor::new(build_config(options)?)?;

    if let Some(path) = &options.load_store {
        processor.load_store(&fs::read_to_string(path)?)?;
    }

    if let Some(path) = &options.indicators {
        let entries: Vec<SeriesIndicators> = serde_json::from_str(&fs::read_to_string(path)?)?;
        let by_key: BTreeMap<_, _> = entries
            .into_iter()
            .map(|entry| (entry.key(), entry.indicators))
            .collect();
        for (key, indicators) in by_key {
            processor.set_indicators(&key, indicators);
        }
    }

    Ok(processor)
}

fn series_outcome(failed: usize) -> Result<(), NarrativeCliError> {
    if failed > 0 {
        Err(NarrativeCliError::SeriesFailed(failed))
    } else {
        Ok(())
    }
}

/// NDJSON failure line: `{"failure": {...}}`
#[derive(serde::Serialize)]
struct FailureLine<'a> {
    failure: &'a SeriesFailure,
}

fn format_output(response: &BatchResponse, format: OutputFormat) -> Result<String, NarrativeCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = format_records(&response.results, format)?;
            for failure in &response.failures {
                out.push_str(&serde_json::to_string(&FailureLine { failure })?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(response)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(response)? + "\n"),
    }
}

fn format_records<T: serde::Serialize>(
    records: &[T],
    format: OutputFormat,
) -> Result<String, NarrativeCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)? + "\n"),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/narrative.message.v1.json",
        "title": "narrative.message.v1",
        "description": "Classified social-signal message",
        "type": "object",
        "required": ["timestamp", "entity_id", "locale", "sentiment"],
        "properties": {
            "schema_version": {
                "type": "string",
                "const": "narrative.message.v1"
            },
            "message_id": { "type": "string" },
            "timestamp": { "type": "string", "format": "date-time" },
            "entity_id": { "type": "string", "minLength": 1 },
            "locale": { "type": "string", "minLength": 1 },
            "sentiment": {
                "type": "string",
                "enum": ["positive", "negative", "neutral"]
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    let number_array = serde_json::json!({ "type": "array", "items": { "type": "number" } });
    let date_array = serde_json::json!({ "type": "array", "items": { "type": "string", "format": "date" } });
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/narrative.response.v1.json",
        "title": "narrative.response.v1",
        "description": "Narrative-strength index response for one entity and locale",
        "type": "object",
        "required": ["entity_id", "locale", "series", "forecast", "narrative", "parameters", "quality", "producer"],
        "properties": {
            "entity_id": { "type": "string" },
            "locale": { "type": "string" },
            "series": {
                "type": "object",
                "properties": {
                    "dates": date_array,
                    "icce": number_array,
                    "icce_smooth": number_array,
                    "momentum": number_array
                }
            },
            "forecast": {
                "type": "object",
                "properties": {
                    "dates": date_array,
                    "icce_pred": number_array,
                    "pred_low": number_array,
                    "pred_high": number_array
                }
            },
            "narrative": {
                "type": ["object", "null"],
                "properties": {
                    "sve": { "type": "number" },
                    "sna": { "type": "number" },
                    "cp": { "type": "number" },
                    "nmi": { "type": "number" },
                    "ivn": {
                        "type": "object",
                        "properties": {
                            "value": { "type": "number" },
                            "risk_level": {
                                "type": "string",
                                "enum": ["low", "low-medium", "medium", "medium-high", "high"]
                            },
                            "label": { "type": "string" }
                        }
                    }
                }
            },
            "parameters": {
                "type": "object",
                "properties": {
                    "alpha": { "type": "number" },
                    "lambda": { "type": "number" },
                    "forecast_days": { "type": "integer" }
                }
            },
            "quality": {
                "type": "object",
                "properties": {
                    "low_confidence_days": { "type": "integer" },
                    "interpolated_days": { "type": "integer" },
                    "momentum_label": { "type": ["string", "null"] },
                    "icce_bucket": { "type": ["string", "null"] }
                }
            },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" },
                    "computed_at_utc": { "type": "string", "format": "date-time" }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum NarrativeCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
    SeriesFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for NarrativeCliError {
    fn from(e: io::Error) -> Self {
        NarrativeCliError::Io(e)
    }
}

impl From<ComputeError> for NarrativeCliError {
    fn from(e: ComputeError) -> Self {
        NarrativeCliError::Compute(e)
    }
}

impl From<serde_json::Error> for NarrativeCliError {
    fn from(e: serde_json::Error) -> Self {
        NarrativeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<NarrativeCliError> for CliError {
    fn from(e: NarrativeCliError) -> Self {
        match e {
            NarrativeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            NarrativeCliError::Compute(e) => {
                let hint = match &e {
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => {
                        "Ensure input matches the narrative.message.v1 or aggregate schema"
                    }
                    ComputeError::InvalidParameter { .. } | ComputeError::ConfigError(_) => {
                        "Check the configuration file and flag overrides"
                    }
                    ComputeError::InvalidTimezone(_) => "Use \"UTC\" or a fixed offset such as \"-06:00\"",
                    _ => "Run 'narrative validate' to check the input",
                };
                CliError {
                    code: e.kind().to_uppercase(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            NarrativeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            NarrativeCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            NarrativeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            NarrativeCliError::SeriesFailed(count) => CliError {
                code: "SERIES_FAILED".to_string(),
                message: format!("{} series failed", count),
                hint: Some("See the failure records in the output".to_string()),
            },
            NarrativeCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            NarrativeCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Streaming input must be NDJSON messages".to_string()),
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

impl ValidationReport {
    fn new(total: usize, failures: &[ValidationResult]) -> Self {
        Self {
            total_records: total,
            valid_records: total - failures.len(),
            invalid_records: failures.len(),
            errors: failures
                .iter()
                .map(|r| ValidationErrorDetail {
                    index: r.index,
                    record_id: r.record_id.clone(),
                    error: r.error.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    record_id: Option<String>,
    error: String,
}

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

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, message: String) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
