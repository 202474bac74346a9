//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Request/response line protocol spoken with the engine."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! One sub-step is one exchange: every input value is written as its own
//! line, then exactly `nSal` observation lines are read back. Values travel
//! as decimal text with eight significant digits.
use crate::channel::LineChannel;
use crate::errors::{EngineError, Result};

/// Significant digits carried by every encoded value.
pub const SIGNIFICANT_DIGITS: usize = 8;

/// Format `value` like C's `%.8g`.
pub fn encode_value(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(EngineError::InvalidArgument(format!(
            "cannot send non-finite value {value} to the engine"
        )));
    }
    if value == 0.0 {
        return Ok("0".to_owned());
    }

    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .ok_or_else(|| EngineError::InvalidArgument(format!("unexpected float format {scientific}")))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| EngineError::InvalidArgument(format!("unexpected float format {scientific}")))?;

    let digits = SIGNIFICANT_DIGITS as i32;
    if exponent < -4 || exponent >= digits {
        let sign = if exponent < 0 { '-' } else { '+' };
        Ok(format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        ))
    } else {
        let decimals = (digits - 1 - exponent) as usize;
        Ok(trim_fraction(&format!("{value:.decimals$}")).to_owned())
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Parse one line of engine output.
pub fn decode_value(line: &str) -> Result<f64> {
    line.trim().parse::<f64>().map_err(|_| EngineError::Protocol {
        line: line.to_owned(),
    })
}

/// Read exactly `n_outputs` values, in order.
pub fn read_observation<C>(channel: &mut C, n_outputs: usize) -> Result<Vec<f64>>
where
    C: LineChannel + ?Sized,
{
    (0..n_outputs)
        .map(|_| decode_value(&channel.read_line()?))
        .collect()
}

/// Run one sub-step exchange.
///
/// Every value is encoded before anything is written, so a value that cannot
/// be sent leaves the stream untouched.
pub fn step<C>(channel: &mut C, input: &[f64], n_outputs: usize) -> Result<Vec<f64>>
where
    C: LineChannel + ?Sized,
{
    let lines = input
        .iter()
        .map(|value| encode_value(*value))
        .collect::<Result<Vec<_>>>()?;
    for line in &lines {
        channel.write_line(line)?;
    }
    read_observation(channel, n_outputs)
}
