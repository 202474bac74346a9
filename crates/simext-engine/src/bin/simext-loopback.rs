//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "bootstrap"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Deterministic reference engine speaking the line protocol."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! Reference engine used to exercise the driver end to end.
//!
//! It emits an all-zero initial observation, then for every sub-step reads
//! `--inputs` lines and answers with `--outputs` lines: the sub-step counter,
//! the first input, then the sum of all inputs for any further output.
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use simext_engine::protocol::{decode_value, encode_value};
use simext_logging::sim_debug;

#[derive(Debug, Parser)]
#[command(author, about = "Loopback engine for driver tests", long_about = None)]
struct Cli {
    /// Values read per sub-step
    #[arg(long, default_value_t = 1)]
    inputs: usize,

    /// Values written per sub-step
    #[arg(long, default_value_t = 2)]
    outputs: usize,

    /// Exit once this many sub-steps have been answered
    #[arg(long)]
    exit_after: Option<u64>,

    /// Answer this sub-step with text that is not a number
    #[arg(long)]
    garbage_at: Option<u64>,

    /// Go silent at this sub-step instead of answering
    #[arg(long)]
    stall_at: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    simext_logging::init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut lines = stdin.lock().lines();
    let mut out = stdout.lock();

    write_observation(&mut out, &vec![0.0; cli.outputs])?;

    let mut sub_step: u64 = 0;
    loop {
        if cli.exit_after.is_some_and(|limit| sub_step >= limit) {
            return Ok(());
        }

        let mut input = Vec::with_capacity(cli.inputs);
        for _ in 0..cli.inputs {
            match lines.next() {
                Some(line) => {
                    let line = line.context("reading engine input")?;
                    input.push(decode_value(&line).context("decoding engine input")?);
                }
                None => return Ok(()),
            }
        }
        sub_step += 1;
        sim_debug!("loopback sub-step {} input {:?}", sub_step, input);

        if cli.stall_at == Some(sub_step) {
            loop {
                thread::sleep(Duration::from_secs(3600));
            }
        }
        if cli.garbage_at == Some(sub_step) {
            for _ in 0..cli.outputs {
                writeln!(out, "#garbage")?;
            }
            out.flush()?;
            continue;
        }

        let first = input.first().copied().unwrap_or_default();
        let sum: f64 = input.iter().sum();
        let observation: Vec<f64> = (0..cli.outputs)
            .map(|index| match index {
                0 => sub_step as f64,
                1 => first,
                _ => sum,
            })
            .collect();
        write_observation(&mut out, &observation)?;
    }
}

fn write_observation(out: &mut impl Write, values: &[f64]) -> Result<()> {
    for value in values {
        writeln!(out, "{}", encode_value(*value)?)?;
    }
    out.flush()?;
    Ok(())
}
