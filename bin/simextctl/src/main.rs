//! ---
//! simext_section: "05-operator-cli"
//! simext_subsection: "binary"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Operator CLI for validating configurations and driving engine runs."
//! simext_version: "v0.1.0"
//! simext_owner: "tbd"
//! ---
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use simext_common::{init_tracing, EngineConfig, LoadedSimextConfig, SimextConfig};
use simext_engine::{Bitacora, EngineError, RunParameters, Simulator};
use simext_model::validate_files;
use tracing::{info, warn};

mod inputs;

const DEFAULT_SETTINGS: [&str; 2] = ["simext.toml", "configs/simext.toml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "SimExt simulation engine control utility",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a run configuration against a model library and method registry
    Validate {
        /// Model library (JSON)
        #[arg(long, value_name = "FILE")]
        library: PathBuf,
        /// Integration-method registry (JSON)
        #[arg(long, value_name = "FILE")]
        methods: PathBuf,
        /// Run configuration (JSON)
        #[arg(long = "config", value_name = "FILE")]
        configuration: PathBuf,
    },
    /// Drive the engine through one sampling period per input row
    Run {
        /// Host settings file; defaults to simext.toml or $SIMEXT_CONFIG
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,
        /// CSV file with one column per engine input
        #[arg(long, value_name = "FILE")]
        inputs: PathBuf,
        /// Output file path. Use '-' for stdout.
        #[arg(long, default_value = "-")]
        output: PathBuf,
        /// Explicit output format when extension is ambiguous
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Label recorded on every log event of the run
        #[arg(long)]
        label: Option<String>,
    },
    /// Print the resolved engine location and run parameters
    Inspect {
        /// Host settings file; defaults to simext.toml or $SIMEXT_CONFIG
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate {
            library,
            methods,
            configuration,
        } => {
            simext_logging::init();
            validate(&library, &methods, &configuration)
        }
        Commands::Run {
            settings,
            inputs,
            output,
            format,
            label,
        } => {
            let loaded = load_settings(settings.as_deref())?;
            let label = label.unwrap_or_else(default_label);
            init_tracing("simextctl", &loaded.config.logging, Some(&label))?;
            info!(settings = %loaded.source.display(), "settings loaded");
            let format = determine_format(&output, format);
            run(&loaded.config, &inputs, &output, format, &label)
        }
        Commands::Inspect { settings } => {
            simext_logging::init();
            let loaded = load_settings(settings.as_deref())?;
            inspect(&loaded)
        }
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<LoadedSimextConfig> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(anyhow!("settings file {} not found", path.display()));
        }
        candidates.push(path.to_path_buf());
    }
    candidates.extend(DEFAULT_SETTINGS.iter().map(PathBuf::from));
    SimextConfig::load_with_source(&candidates)
}

fn validate(library: &Path, methods: &Path, configuration: &Path) -> Result<()> {
    let (_, config) = validate_files(library, methods, configuration)
        .with_context(|| format!("{} is not a valid run configuration", configuration.display()))?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}: ok", configuration.display())?;
    for model in &config.models {
        writeln!(
            stdout,
            "  {} = {}/{} ({})",
            model.id,
            model.module,
            model.class,
            config.method_for(model)
        )?;
    }
    writeln!(
        stdout,
        "  h = {}, kh = {}, logged = [{}]",
        config.simulation.h,
        config.simulation.kh,
        config.output_names().join(", ")
    )?;
    Ok(())
}

/// Run parameters from the `[model]` documents when present, else from `[run]`.
fn resolve_parameters(config: &SimextConfig) -> Result<RunParameters> {
    if let Some(model) = &config.model {
        let (validator, simulation) =
            validate_files(&model.library, &model.methods, &model.configuration).with_context(
                || format!("{} is not a valid run configuration", model.configuration.display()),
            )?;
        return RunParameters::from_simulation(&simulation, validator.library())
            .context("run configuration cannot be simulated");
    }
    let run = config
        .run
        .as_ref()
        .ok_or_else(|| anyhow!("settings contain neither a [run] nor a [model] section"))?;
    RunParameters::from_run_config(run).context("invalid [run] section")
}

fn run(
    config: &SimextConfig,
    inputs_path: &Path,
    output: &Path,
    format: OutputFormat,
    label: &str,
) -> Result<()> {
    let params = resolve_parameters(config)?;
    let periods = inputs::read_inputs_path(inputs_path, params.input_names())?;
    info!(run = label, periods = periods.len(), "input periods loaded");

    let (log, failure) = drive(&config.engine, params, &periods, label)?;
    write_log(&log, output, format)?;

    if let Some(err) = failure {
        return Err(anyhow::Error::new(err)
            .context(format!("run '{}' stopped after {} periods", label, log.len())));
    }
    if output.as_os_str() != "-" {
        eprintln!("{} periods logged -> {}", log.len(), output.display());
    }
    Ok(())
}

/// Step the engine through `periods`. A failing period ends the run; the
/// bitácora up to the last completed period is returned with the failure.
fn drive(
    engine: &EngineConfig,
    params: RunParameters,
    periods: &[Vec<f64>],
    label: &str,
) -> Result<(Bitacora, Option<EngineError>)> {
    let mut simulator = Simulator::launch(engine, params)
        .context("unable to launch the engine")?
        .with_label(label);
    simulator
        .start()
        .context("engine did not produce its initial observation")?;

    for input in periods {
        if let Err(err) = simulator.advance(input) {
            warn!(run = label, error = %err, "run aborted");
            return Ok((simulator.stop(), Some(err)));
        }
    }
    Ok((simulator.stop(), None))
}

fn determine_format(path: &Path, override_format: Option<OutputFormat>) -> OutputFormat {
    if let Some(format) = override_format {
        return format;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => OutputFormat::Json,
        _ => OutputFormat::Csv,
    }
}

fn write_log(log: &Bitacora, output: &Path, format: OutputFormat) -> Result<()> {
    let writer: Box<dyn Write> = if output.as_os_str() == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(File::create(output).with_context(|| {
            format!("failed to create output file {}", output.display())
        })?)
    };
    match format {
        OutputFormat::Csv => log.write_csv(writer)?,
        OutputFormat::Json => log.write_json(writer)?,
    }
    Ok(())
}

fn default_label() -> String {
    Utc::now().format("run-%Y%m%dT%H%M%SZ").to_string()
}

#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    settings: &'a Path,
    engine: PathBuf,
    working_directory: PathBuf,
    args: &'a [String],
    read_timeout_ms: Option<u128>,
    parameters: RunParameters,
}

fn inspect(loaded: &LoadedSimextConfig) -> Result<()> {
    let engine = &loaded.config.engine;
    let report = InspectReport {
        settings: &loaded.source,
        engine: engine.executable_path()?,
        working_directory: engine.install_dir()?,
        args: &engine.args,
        read_timeout_ms: engine.read_timeout.map(|timeout| timeout.as_millis()),
        parameters: resolve_parameters(&loaded.config)?,
    };
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report)?;
    stdout.write_all(b"\n")?;
    Ok(())
}
