//! ---
//! simext_section: "01-core-functionality"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Shared host primitives for SimExt."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! Shared primitives for the SimExt workspace: the host configuration file
//! (`simext.toml`) and tracing initialisation.

pub mod config;
pub mod logging;

pub use config::{
    EngineConfig, LoadedSimextConfig, LoggingConfig, ModelFilesConfig, RunConfig, SimextConfig,
};
pub use logging::{init_tracing, LogFormat};
