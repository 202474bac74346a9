//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "bootstrap"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Engine driver module exports."
//! simext_version: "v0.1.0"
//! simext_owner: "tbd"
//! ---
//! Host-side driver for external simulation engines that speak a
//! line-oriented text protocol over their standard streams.

pub mod bitacora;
pub mod channel;
pub mod driver;
pub mod errors;
pub mod params;
pub mod protocol;

pub use bitacora::{Bitacora, Columns, StepRecord};
pub use channel::{LineChannel, ProcessChannel};
pub use driver::Simulator;
pub use errors::{EngineError, Result};
pub use params::RunParameters;
pub use protocol::{decode_value, encode_value};
