//! ---
//! simext_section: "01-core-functionality"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Tracing subscriber setup for SimExt hosts."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! Console events go to stderr: stdout is reserved for exported bitácoras.
//! A run with a label gets its own log file named after it; without one the
//! host writes to a daily rolling file.
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{daily, never, RollingFileAppender};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "SIMEXT_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static STDERR_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Available console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Install the global subscriber for `service_name`.
///
/// `SIMEXT_LOG` takes precedence over `RUST_LOG`; with neither set the filter
/// is `info`. When `run_label` is given the file log is
/// `<prefix>-<label>.log` under `config.directory`, otherwise a daily
/// `<prefix>.log.<date>`. The prefix defaults to the service name.
pub fn init_tracing(
    service_name: &str,
    config: &LoggingConfig,
    run_label: Option<&str>,
) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let file_name = log_file_name(service_name, config, run_label);
    let appender: RollingFileAppender = match run_label {
        Some(_) => never(&config.directory, &file_name),
        None => daily(&config.directory, &file_name),
    };
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = FILE_GUARD.set(file_guard);
    let _ = STDERR_GUARD.set(stderr_guard);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer(config.format, stderr_writer))
        .with(file_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        run = run_label.unwrap_or("-"),
        log_file = %config.directory.join(&file_name).display(),
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

fn env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid {LOG_ENV} directive '{directive}' ({err}); using {DEFAULT_DIRECTIVE}"
            );
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn console_layer<S>(format: LogFormat, writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.with_target(true).boxed(),
    }
}

/// File name of the log written by `service_name`, optionally scoped to a run.
fn log_file_name(service_name: &str, config: &LoggingConfig, run_label: Option<&str>) -> String {
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    match run_label {
        Some(label) => format!("{}-{}.log", prefix, file_safe(label)),
        None => format!("{prefix}.log"),
    }
}

/// Run labels are free text; keep only characters that are safe in a file name.
fn file_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(prefix: Option<&str>) -> LoggingConfig {
        LoggingConfig {
            file_prefix: prefix.map(str::to_owned),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn log_format_uses_kebab_case() {
        let format: LogFormat = serde_json::from_str("\"structured-json\"").unwrap();
        assert_eq!(format, LogFormat::StructuredJson);
    }

    #[test]
    fn run_label_scopes_the_log_file() {
        assert_eq!(
            log_file_name("simextctl", &config(None), Some("run-20261018T120000Z")),
            "simextctl-run-20261018T120000Z.log"
        );
        assert_eq!(log_file_name("simextctl", &config(Some("bench")), None), "bench.log");
        assert_eq!(
            log_file_name("simextctl", &config(None), Some("motor 1/cold start")),
            "simextctl-motor_1_cold_start.log"
        );
    }

    #[test]
    fn init_tracing_creates_log_directory() {
        let dir = tempdir().unwrap();
        let config = LoggingConfig {
            directory: dir.path().join("logs"),
            format: LogFormat::Pretty,
            file_prefix: Some("test".into()),
        };
        init_tracing("simext-test", &config, Some("unit")).unwrap();
        assert!(config.directory.is_dir());
    }
}
