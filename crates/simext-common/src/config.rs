//! ---
//! simext_section: "01-core-functionality"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Host configuration loading and validation."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_executable() -> PathBuf {
    PathBuf::from(format!("Simulador{}", std::env::consts::EXE_SUFFIX))
}

fn default_shutdown_grace() -> Duration {
    Duration::from_millis(250)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for a SimExt host process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SimextConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub run: Option<RunConfig>,
    #[serde(default)]
    pub model: Option<ModelFilesConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`SimextConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedSimextConfig {
    pub config: SimextConfig,
    pub source: PathBuf,
}

impl SimextConfig {
    pub const ENV_CONFIG_PATH: &str = "SIMEXT_CONFIG";

    /// Load configuration from disk, respecting the `SIMEXT_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedSimextConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedSimextConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedSimextConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Parse a configuration file. Relative paths inside it are resolved
    /// against the directory holding the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let mut config = toml::from_str::<SimextConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Rebase every relative path in the configuration onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(dir) = &self.engine.install_dir {
            self.engine.install_dir = Some(rebase(base, dir));
        }
        if let Some(model) = &mut self.model {
            model.library = rebase(base, &model.library);
            model.methods = rebase(base, &model.methods);
            model.configuration = rebase(base, &model.configuration);
        }
        self.logging.directory = rebase(base, &self.logging.directory);
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.run.is_none() && self.model.is_none() {
            return Err(anyhow!(
                "configuration must contain a [run] section or a [model] section"
            ));
        }
        self.engine.validate()?;
        if let Some(run) = &self.run {
            run.validate()?;
        }
        Ok(())
    }
}

impl std::str::FromStr for SimextConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: SimextConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Where the engine executable lives and how the channel to it behaves.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Installation directory of the engine. Defaults to the directory of
    /// the running host executable.
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    /// Executable path, relative to `install_dir`.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Upper bound for a single blocking read. `None` waits forever.
    #[serde(default, rename = "read_timeout_ms")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub read_timeout: Option<Duration>,
    #[serde(default = "default_shutdown_grace", rename = "shutdown_grace_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            executable: default_executable(),
            args: Vec::new(),
            read_timeout: None,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl EngineConfig {
    /// Configuration for an engine living at `executable` inside `install_dir`.
    pub fn new(install_dir: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: Some(install_dir.into()),
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Effective installation directory of the engine.
    pub fn install_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.install_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe().context("unable to locate the host executable")?;
        exe.parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("host executable {} has no parent directory", exe.display()))
    }

    /// Absolute location of the engine executable.
    pub fn executable_path(&self) -> Result<PathBuf> {
        let joined = self.install_dir()?.join(&self.executable);
        if joined.is_absolute() {
            return Ok(joined);
        }
        let cwd = std::env::current_dir().context("unable to read the working directory")?;
        Ok(cwd.join(joined))
    }

    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(anyhow!("engine executable must not be empty"));
        }
        if matches!(self.read_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(anyhow!("engine read_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

/// Run parameters given directly in the host configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub h: f64,
    pub kh: u32,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.h.is_finite() && self.h > 0.0) {
            return Err(anyhow!("run.h must be a positive real, got {}", self.h));
        }
        if self.kh == 0 {
            return Err(anyhow!("run.kh must be at least 1"));
        }
        if self.outputs.is_empty() {
            return Err(anyhow!("run.outputs must name at least one observation"));
        }
        let mut seen = HashSet::new();
        for name in self.inputs.iter().chain(&self.outputs) {
            if !seen.insert(name.as_str()) {
                return Err(anyhow!("run variable '{}' is declared more than once", name));
            }
        }
        Ok(())
    }
}

/// Paths of the JSON documents consumed by the configuration validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelFilesConfig {
    pub library: PathBuf,
    pub methods: PathBuf,
    pub configuration: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
