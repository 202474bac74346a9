//! ---
//! simext_section: "04-configuration"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Configuration validation errors."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("field `{field}` must be {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },
    #[error("integration method `{0}` is not implemented; check the method registry for the available methods")]
    UnsupportedMethod(String),
    #[error("model `{id}`: unknown model `{module}` of class `{class}`")]
    UnknownModel {
        id: String,
        module: String,
        class: String,
    },
    #[error("model `{id}`: parameter `{parameter}` is not declared by `{module}`/`{class}`")]
    UnknownParameter {
        id: String,
        module: String,
        class: String,
        parameter: String,
    },
    #[error("model `{id}`: required parameter `{parameter}` is missing")]
    MissingParameter { id: String, parameter: String },
    #[error("logged variable `{variable}`: {reason}")]
    UnknownVariable { variable: String, reason: String },
    #[error("model id `{0}` is declared more than once")]
    DuplicateModel(String),
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {document}: {source}")]
    Json {
        document: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn type_mismatch(
        field: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        ConfigError::TypeMismatch {
            field: field.into(),
            expected,
            found: json_type_name(found).to_owned(),
        }
    }
}

/// Name of the JSON type of `value`, distinguishing integers from reals.
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "real",
        Value::Number(n) if n.is_i64() && n.as_i64().is_some_and(|v| v < 0) => "negative integer",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
