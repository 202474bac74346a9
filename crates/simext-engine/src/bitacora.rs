//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Time-indexed log of applied inputs and observations."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::io::Write;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::Result;
use crate::params::RunParameters;

/// One completed sampling period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// Start time of the period.
    pub time: f64,
    /// Input vector applied for the whole period.
    pub input: Vec<f64>,
    /// Observation returned after the period's final sub-step.
    pub observation: Vec<f64>,
}

/// Append-only log of a run. Only the driver adds records.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitacora {
    input_names: Vec<String>,
    output_names: Vec<String>,
    records: Vec<StepRecord>,
}

/// Column view of a [`Bitacora`]: every sequence is aligned by index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Columns {
    pub time: Vec<f64>,
    pub observations: IndexMap<String, Vec<f64>>,
    pub inputs: IndexMap<String, Vec<f64>>,
}

impl Bitacora {
    pub(crate) fn new(params: &RunParameters) -> Self {
        Self {
            input_names: params.input_names().to_vec(),
            output_names: params.output_names().to_vec(),
            records: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&StepRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|record| record.time).collect()
    }

    /// History of the observation called `name`.
    pub fn observation(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.output_names.iter().position(|n| n == name)?;
        Some(self.records.iter().map(|r| r.observation[index]).collect())
    }

    /// History of the input called `name`.
    pub fn input(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.input_names.iter().position(|n| n == name)?;
        Some(self.records.iter().map(|r| r.input[index]).collect())
    }

    pub fn columns(&self) -> Columns {
        Columns {
            time: self.times(),
            observations: self.series(&self.output_names, |r| r.observation.as_slice()),
            inputs: self.series(&self.input_names, |r| r.input.as_slice()),
        }
    }

    fn series(&self, names: &[String], pick: fn(&StepRecord) -> &[f64]) -> IndexMap<String, Vec<f64>> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let values = self.records.iter().map(|r| pick(r)[index]).collect();
                (name.clone(), values)
            })
            .collect()
    }

    /// Write one row per record: `time`, the observations, then the inputs.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        let header = std::iter::once("time")
            .chain(self.output_names.iter().map(String::as_str))
            .chain(self.input_names.iter().map(String::as_str));
        writer.write_record(header)?;
        for record in &self.records {
            let row = std::iter::once(record.time)
                .chain(record.observation.iter().copied())
                .chain(record.input.iter().copied())
                .map(|value| value.to_string());
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the column view as pretty JSON.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.columns())?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Bitacora {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bitacora {
        let params = RunParameters::new(
            0.5,
            2,
            vec!["Vt".into(), "Tlc".into()],
            vec!["ia".into(), "w".into()],
        )
        .unwrap();
        let mut log = Bitacora::new(&params);
        for i in 0..3 {
            let x = i as f64;
            log.push(StepRecord {
                time: params.time_of(i),
                input: vec![220.0, x],
                observation: vec![x * 10.0, x * 100.0],
            });
        }
        log
    }

    #[test]
    fn column_views_stay_aligned() {
        let log = sample();
        assert_eq!(log.len(), 3);
        assert_eq!(log.times(), vec![0.0, 1.0, 2.0]);
        assert_eq!(log.observation("w").unwrap(), vec![0.0, 100.0, 200.0]);
        assert_eq!(log.input("Tlc").unwrap(), vec![0.0, 1.0, 2.0]);
        assert!(log.observation("Vt").is_none());

        let columns = log.columns();
        assert_eq!(columns.observations.keys().collect::<Vec<_>>(), ["ia", "w"]);
        assert_eq!(columns.inputs["Vt"], vec![220.0; 3]);
        assert_eq!(log.last().unwrap().observation, vec![20.0, 200.0]);
        assert_eq!((&log).into_iter().count(), 3);
    }

    #[test]
    fn csv_export_has_named_columns() {
        let mut buffer = Vec::new();
        sample().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time,ia,w,Vt,Tlc"));
        assert_eq!(lines.next(), Some("0,0,0,220,0"));
        assert_eq!(lines.last(), Some("2,20,200,220,2"));
    }

    #[test]
    fn json_export_is_the_column_view() {
        let mut buffer = Vec::new();
        sample().write_json(&mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["time"][2], 2.0);
        assert_eq!(value["observations"]["ia"][1], 10.0);
        assert_eq!(value["inputs"]["Tlc"][2], 2.0);
    }
}
