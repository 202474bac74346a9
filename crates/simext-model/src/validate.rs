//! ---
//! simext_section: "04-configuration"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Run-configuration validation against the model library."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::descriptor::{Descriptor, ModelDescriptor, SimulationSettings, SIMULATION_MARKER};
use crate::errors::{ConfigError, Result};
use crate::library::{parse_json, read_document, MethodRegistry, ModelLibrary};

/// A run configuration that passed every structural and semantic check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    pub models: Vec<ModelDescriptor>,
    pub simulation: SimulationSettings,
}

impl SimulationConfig {
    /// Split parsed descriptors into models and the trailing simulation descriptor.
    pub fn from_descriptors(mut descriptors: Vec<Descriptor>) -> Result<Self> {
        let simulation = match descriptors.pop() {
            Some(Descriptor::Simulation(settings)) => settings,
            Some(Descriptor::Model(model)) => {
                return Err(ConfigError::InvalidConfig(format!(
                    "the last descriptor must be `{SIMULATION_MARKER}`, found `{}` (model `{}`)",
                    model.module, model.id
                )))
            }
            None => {
                return Err(ConfigError::InvalidConfig(
                    "configuration list is empty".to_owned(),
                ))
            }
        };

        let models = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| match descriptor {
                Descriptor::Model(model) => Ok(model),
                Descriptor::Simulation(_) => Err(ConfigError::InvalidConfig(format!(
                    "`{SIMULATION_MARKER}` may only appear last, found it at #{index}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { models, simulation })
    }

    pub fn model(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|model| model.id == id)
    }

    /// Integration method used by `model`: its own override or the global one.
    pub fn method_for<'a>(&'a self, model: &'a ModelDescriptor) -> &'a str {
        model.method.as_deref().unwrap_or(&self.simulation.method)
    }

    /// Engine inputs in wire order: every model's declared inputs, qualified
    /// by model id, in model order.
    pub fn input_names(&self, library: &ModelLibrary) -> Vec<String> {
        self.models
            .iter()
            .filter_map(|model| {
                library
                    .class(&model.module, &model.class)
                    .map(|class| (model, class))
            })
            .flat_map(|(model, class)| {
                class
                    .inputs
                    .iter()
                    .map(move |input| format!("{}.{}", model.id, input))
            })
            .collect()
    }

    /// Engine outputs in wire order: the logged variables.
    pub fn output_names(&self) -> Vec<String> {
        self.simulation
            .logged
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

/// Checks run configurations against a model library and a method registry.
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    library: ModelLibrary,
    methods: MethodRegistry,
}

impl ConfigValidator {
    pub fn new(library: ModelLibrary, methods: MethodRegistry) -> Self {
        Self { library, methods }
    }

    /// Load the library and registry documents from disk.
    pub fn from_paths(library: impl AsRef<Path>, methods: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(
            ModelLibrary::from_path(library)?,
            MethodRegistry::from_path(methods)?,
        ))
    }

    pub fn library(&self) -> &ModelLibrary {
        &self.library
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// Validate the run configuration stored at `path`.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<SimulationConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }
        debug!(config_path = %path.display(), "validating run configuration");
        let data = read_document(path)?;
        let document: Value = parse_json(&data, &path.display().to_string())?;
        self.validate_value(&document)
    }

    /// Validate a run configuration given as JSON text.
    pub fn validate_str(&self, data: &str) -> Result<SimulationConfig> {
        let document: Value = parse_json(data, "<run configuration>")?;
        self.validate_value(&document)
    }

    pub fn validate_value(&self, document: &Value) -> Result<SimulationConfig> {
        let items = document.as_array().ok_or_else(|| {
            ConfigError::InvalidConfig("run configuration must be a JSON array".to_owned())
        })?;
        let (last, models) = items.split_last().ok_or_else(|| {
            ConfigError::InvalidConfig("configuration list is empty".to_owned())
        })?;
        // Trailing tag first, before any descriptor body.
        if Descriptor::tag_of(last) != Some(SIMULATION_MARKER) {
            return Err(ConfigError::InvalidConfig(format!(
                "the last descriptor must be tagged `{SIMULATION_MARKER}`, found {}",
                last.get("Modulo").map_or_else(|| "no tag".to_owned(), Value::to_string)
            )));
        }
        if let Some(index) = models
            .iter()
            .position(|item| Descriptor::tag_of(item) == Some(SIMULATION_MARKER))
        {
            return Err(ConfigError::InvalidConfig(format!(
                "`{SIMULATION_MARKER}` may only appear last, found it at #{index}"
            )));
        }

        let simulation = SimulationSettings::from_value(last)?;
        let mut descriptors = models
            .iter()
            .enumerate()
            .map(|(index, item)| Descriptor::from_value(index, item))
            .collect::<Result<Vec<_>>>()?;
        descriptors.push(Descriptor::Simulation(simulation));
        let config = SimulationConfig::from_descriptors(descriptors)?;
        self.check(&config)?;
        info!(
            models = config.models.len(),
            h = config.simulation.h,
            kh = config.simulation.kh,
            method = %config.simulation.method,
            "run configuration validated"
        );
        Ok(config)
    }

    /// Semantic checks of an already structured configuration.
    pub fn check(&self, config: &SimulationConfig) -> Result<()> {
        self.check_method(&config.simulation.method)?;

        let mut ids = HashSet::new();
        for model in &config.models {
            if !ids.insert(model.id.as_str()) {
                return Err(ConfigError::DuplicateModel(model.id.clone()));
            }
            self.check_model(model)?;
        }

        if config.simulation.logged.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "`bitacora` must list at least one variable".to_owned(),
            ));
        }
        for variable in &config.simulation.logged {
            let model = config.model(&variable.model).ok_or_else(|| {
                ConfigError::UnknownVariable {
                    variable: variable.to_string(),
                    reason: format!("no model with id `{}`", variable.model),
                }
            })?;
            let declared = self
                .library
                .class(&model.module, &model.class)
                .is_some_and(|class| class.declares_observation(&variable.field));
            if !declared {
                return Err(ConfigError::UnknownVariable {
                    variable: variable.to_string(),
                    reason: format!(
                        "`{}`/`{}` has no observation `{}`",
                        model.module, model.class, variable.field
                    ),
                });
            }
        }
        Ok(())
    }

    fn check_method(&self, method: &str) -> Result<()> {
        if self.methods.contains(method) {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedMethod(method.to_owned()))
        }
    }

    fn check_model(&self, model: &ModelDescriptor) -> Result<()> {
        let class = self
            .library
            .class(&model.module, &model.class)
            .ok_or_else(|| ConfigError::UnknownModel {
                id: model.id.clone(),
                module: model.module.clone(),
                class: model.class.clone(),
            })?;

        for (name, value) in &model.parameters {
            if !class.declares_parameter(name) {
                return Err(ConfigError::UnknownParameter {
                    id: model.id.clone(),
                    module: model.module.clone(),
                    class: model.class.clone(),
                    parameter: name.clone(),
                });
            }
            if !value.is_number() {
                return Err(ConfigError::type_mismatch(
                    format!("{}.Parametros.{}", model.id, name),
                    "number",
                    value,
                ));
            }
        }
        if let Some(missing) = class
            .parameters
            .iter()
            .find(|name| !model.parameters.contains_key(name.as_str()))
        {
            return Err(ConfigError::MissingParameter {
                id: model.id.clone(),
                parameter: missing.clone(),
            });
        }

        if let Some(method) = &model.method {
            self.check_method(method)?;
        }
        Ok(())
    }
}

/// Load the library and registry, then validate the run configuration.
pub fn validate_files(
    library: impl AsRef<Path>,
    methods: impl AsRef<Path>,
    configuration: impl AsRef<Path>,
) -> Result<(ConfigValidator, SimulationConfig)> {
    let configuration = configuration.as_ref();
    if !configuration.exists() {
        return Err(ConfigError::ConfigNotFound(configuration.to_path_buf()));
    }
    let validator = ConfigValidator::from_paths(library, methods)?;
    let config = validator.validate_path(configuration)?;
    Ok((validator, config))
}
