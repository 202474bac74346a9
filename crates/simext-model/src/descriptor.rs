//! ---
//! simext_section: "04-configuration"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Run-configuration descriptors."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! A run configuration is a JSON array of descriptors: one per simulated
//! model, followed by exactly one simulation descriptor tagged with
//! [`SIMULATION_MARKER`].
//!
//! ```json
//! [
//!   {"ID": "motor1", "Modulo": "MotorCD", "Clase": "Derivacion",
//!    "Parametros": {"R": 1.086, "L": 0.01216}, "Metodo": "RUNGEKUTTA4"},
//!   {"Modulo": "Config_Sim",
//!    "Config": {"h": 0.001, "kh": 10, "metodo": "EULER_PROG",
//!               "bitacora": ["motor1.ia", "motor1.w"]}}
//! ]
//! ```
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ConfigError, Result};

/// Reserved `Modulo` tag of the trailing simulation descriptor.
pub const SIMULATION_MARKER: &str = "Config_Sim";

const TAG_FIELD: &str = "Modulo";

/// One entry of a run configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Model(ModelDescriptor),
    Simulation(SimulationSettings),
}

impl Descriptor {
    /// Classify and parse the descriptor at `index` of the configuration array.
    pub fn from_value(index: usize, value: &Value) -> Result<Self> {
        let tag = value
            .get(TAG_FIELD)
            .ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "descriptor #{index} has no `{TAG_FIELD}` field"
                ))
            })?
            .as_str()
            .ok_or_else(|| ConfigError::type_mismatch(TAG_FIELD, "string", &value[TAG_FIELD]))?;

        if tag == SIMULATION_MARKER {
            return SimulationSettings::from_value(value).map(Descriptor::Simulation);
        }
        ModelDescriptor::deserialize(value)
            .map(Descriptor::Model)
            .map_err(|err| {
                ConfigError::InvalidConfig(format!("descriptor #{index} (`{tag}`): {err}"))
            })
    }

    /// `Modulo` tag of a raw descriptor, if it is a string.
    pub fn tag_of(value: &Value) -> Option<&str> {
        value.get(TAG_FIELD).and_then(Value::as_str)
    }

    pub fn tag(&self) -> &str {
        match self {
            Descriptor::Model(model) => &model.module,
            Descriptor::Simulation(_) => SIMULATION_MARKER,
        }
    }
}

/// A simulated component: its identifier, model, class and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Modulo")]
    pub module: String,
    #[serde(rename = "Clase")]
    pub class: String,
    #[serde(rename = "Parametros", default)]
    pub parameters: IndexMap<String, Value>,
    /// Integration method overriding the global one for this model.
    #[serde(rename = "Metodo", default)]
    pub method: Option<String>,
}

/// Global settings carried by the trailing `Config_Sim` descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSettings {
    pub h: f64,
    pub kh: u32,
    pub method: String,
    pub logged: Vec<LoggedVariable>,
}

impl SimulationSettings {
    /// Type-check the `Config` body of a simulation descriptor.
    pub fn from_value(value: &Value) -> Result<Self> {
        let body = value.get("Config").ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "`{SIMULATION_MARKER}` descriptor has no `Config` object"
            ))
        })?;
        if !body.is_object() {
            return Err(ConfigError::type_mismatch("Config", "object", body));
        }

        let h_value = field(body, "h")?;
        let h = match h_value.as_f64() {
            Some(h) if h_value.is_f64() => h,
            _ => return Err(ConfigError::type_mismatch("h", "real", h_value)),
        };

        let kh_value = field(body, "kh")?;
        let kh = kh_value
            .as_u64()
            .ok_or_else(|| ConfigError::type_mismatch("kh", "non-negative integer", kh_value))?;
        let kh = u32::try_from(kh)
            .map_err(|_| ConfigError::InvalidConfig(format!("`kh` = {kh} is out of range")))?;

        let method_value = field(body, "metodo")?;
        let method = method_value
            .as_str()
            .ok_or_else(|| ConfigError::type_mismatch("metodo", "string", method_value))?
            .to_owned();

        let logged = match body.get("bitacora") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| ConfigError::type_mismatch("bitacora[]", "string", item))?
                        .parse()
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => return Err(ConfigError::type_mismatch("bitacora", "array", other)),
        };

        Ok(Self {
            h,
            kh,
            method,
            logged,
        })
    }
}

fn field<'a>(body: &'a Value, name: &str) -> Result<&'a Value> {
    body.get(name).ok_or_else(|| {
        ConfigError::InvalidConfig(format!(
            "`{SIMULATION_MARKER}` descriptor is missing `Config.{name}`"
        ))
    })
}

/// A bitácora entry of the form `<model id>.<observation>`.
///
/// Observation names never contain a dot, so the entry splits at the last one
/// and model ids such as `motor.1` survive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LoggedVariable {
    pub model: String,
    pub field: String,
}

impl FromStr for LoggedVariable {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('.') {
            Some((model, field)) if !model.is_empty() && !field.is_empty() => Ok(Self {
                model: model.to_owned(),
                field: field.to_owned(),
            }),
            _ => Err(ConfigError::UnknownVariable {
                variable: s.to_owned(),
                reason: "expected `<model id>.<observation>`".to_owned(),
            }),
        }
    }
}

impl fmt::Display for LoggedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.model, self.field)
    }
}
