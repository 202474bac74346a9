//! ---
//! simext_section: "04-configuration"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Model library, run-configuration parsing and validation."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! Validation of JSON run configurations before they are handed to the
//! simulation engine.

pub mod descriptor;
pub mod errors;
pub mod library;
pub mod validate;

pub use descriptor::{Descriptor, LoggedVariable, ModelDescriptor, SimulationSettings, SIMULATION_MARKER};
pub use errors::{json_type_name, ConfigError, Result};
pub use library::{MethodRegistry, ModelClass, ModelLibrary};
pub use validate::{validate_files, ConfigValidator, SimulationConfig};
