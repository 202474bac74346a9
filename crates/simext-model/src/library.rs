//! ---
//! simext_section: "04-configuration"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Model library and integration-method registry documents."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

/// Field declarations of one model class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelClass {
    #[serde(rename = "parametros", alias = "parameters", default)]
    pub parameters: Vec<String>,
    #[serde(rename = "entradas", alias = "inputs", default)]
    pub inputs: Vec<String>,
    #[serde(rename = "observaciones", alias = "observations", default)]
    pub observations: Vec<String>,
}

impl ModelClass {
    pub fn declares_parameter(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p == name)
    }

    pub fn declares_observation(&self, name: &str) -> bool {
        self.observations.iter().any(|o| o == name)
    }
}

/// Implemented models: model type, then class, then declared fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelLibrary {
    models: IndexMap<String, IndexMap<String, ModelClass>>,
}

impl ModelLibrary {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_document(path)?;
        parse_json(&data, &path.display().to_string())
    }

    pub fn insert(&mut self, module: impl Into<String>, class: impl Into<String>, model_class: ModelClass) {
        self.models
            .entry(module.into())
            .or_default()
            .insert(class.into(), model_class);
    }

    pub fn class(&self, module: &str, class: &str) -> Option<&ModelClass> {
        self.models.get(module)?.get(class)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl std::str::FromStr for ModelLibrary {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        parse_json(s, "<model library>")
    }
}

/// Names of the integration methods the engine implements.
///
/// Accepts either a JSON array of names or an object keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MethodRegistry {
    methods: IndexSet<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRegistry {
    List(Vec<String>),
    Keyed(IndexMap<String, serde_json::Value>),
}

impl<'de> Deserialize<'de> for MethodRegistry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let methods = match RawRegistry::deserialize(deserializer)? {
            RawRegistry::List(names) => names.into_iter().collect(),
            RawRegistry::Keyed(map) => map.into_keys().collect(),
        };
        Ok(Self { methods })
    }
}

impl MethodRegistry {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_document(path)?;
        parse_json(&data, &path.display().to_string())
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for MethodRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            methods: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::str::FromStr for MethodRegistry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        parse_json(s, "<method registry>")
    }
}

pub(crate) fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(data: &str, document: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|source| ConfigError::Json {
        document: document.to_owned(),
        source,
    })
}
