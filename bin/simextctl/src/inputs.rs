//! ---
//! simext_section: "05-operator-cli"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Per-period input vectors read from CSV."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, Trim};

/// Read one input vector per CSV row, ordered like `names`.
///
/// Columns are matched by header name; extra columns (a `time` column, for
/// instance) are ignored.
pub fn read_inputs<R: Read>(reader: R, names: &[String]) -> Result<Vec<Vec<f64>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);
    let headers = reader.headers().context("input file has no header row")?.clone();
    let columns = names
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| anyhow!("input column '{}' missing from header", name))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut periods = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.with_context(|| format!("invalid input row {row}"))?;
        let values = columns
            .iter()
            .zip(names)
            .map(|(&column, name)| {
                let field = record.get(column).unwrap_or_default();
                field
                    .parse::<f64>()
                    .with_context(|| format!("row {row}, column '{name}': '{field}' is not a number"))
            })
            .collect::<Result<Vec<_>>>()?;
        periods.push(values);
    }
    Ok(periods)
}

pub fn read_inputs_path(path: &Path, names: &[String]) -> Result<Vec<Vec<f64>>> {
    let file = File::open(path)
        .with_context(|| format!("unable to open input file {}", path.display()))?;
    read_inputs(file, names).with_context(|| format!("invalid input file {}", path.display()))
}
