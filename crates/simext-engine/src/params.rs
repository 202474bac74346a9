//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Run parameters shared by the driver and the bitácora."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::collections::HashSet;

use serde::Serialize;
use simext_common::RunConfig;
use simext_model::{ModelLibrary, SimulationConfig};

use crate::errors::{EngineError, Result};

/// Step size, sub-step count and the ordered names of the I/O vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunParameters {
    h: f64,
    kh: u32,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl RunParameters {
    pub fn new(h: f64, kh: u32, input_names: Vec<String>, output_names: Vec<String>) -> Result<Self> {
        if !(h.is_finite() && h > 0.0) {
            return Err(EngineError::InvalidArgument(format!(
                "step size h must be a positive real, got {h}"
            )));
        }
        if kh == 0 {
            return Err(EngineError::InvalidArgument(
                "kh must be at least 1 sub-step per period".to_owned(),
            ));
        }
        if output_names.is_empty() {
            return Err(EngineError::InvalidArgument(
                "at least one output is required".to_owned(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = input_names
            .iter()
            .chain(&output_names)
            .find(|name| !seen.insert(name.as_str()))
        {
            return Err(EngineError::InvalidArgument(format!(
                "variable `{duplicate}` is named more than once"
            )));
        }
        Ok(Self {
            h,
            kh,
            input_names,
            output_names,
        })
    }

    /// Parameters from the `[run]` section of the host configuration.
    pub fn from_run_config(run: &RunConfig) -> Result<Self> {
        Self::new(run.h, run.kh, run.inputs.clone(), run.outputs.clone())
    }

    /// Parameters of a validated run configuration.
    pub fn from_simulation(config: &SimulationConfig, library: &ModelLibrary) -> Result<Self> {
        Self::new(
            config.simulation.h,
            config.simulation.kh,
            config.input_names(library),
            config.output_names(),
        )
    }

    pub fn h(&self) -> f64 {
        self.h
    }

    pub fn kh(&self) -> u32 {
        self.kh
    }

    /// Length of one sampling period, `h * kh`.
    pub fn period(&self) -> f64 {
        self.h * f64::from(self.kh)
    }

    /// Start time of sampling period `index`.
    pub fn time_of(&self, index: usize) -> f64 {
        index as f64 * self.period()
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Input arity `nEnt`.
    pub fn n_inputs(&self) -> usize {
        self.input_names.len()
    }

    /// Output arity `nSal`.
    pub fn n_outputs(&self) -> usize {
        self.output_names.len()
    }
}
