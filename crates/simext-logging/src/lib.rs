//! ---
//! simext_section: "03-logging"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Structured logging context for engine runs."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Run-scoped logging helpers. Every event carries the run label, the engine
//! executable and the sampling period / sub-step it belongs to, so that log
//! lines can be lined up against the bitácora afterwards.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

#[macro_use]
pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and tools.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Label of the simulation run.
    pub run: Option<&'a str>,
    /// Engine executable driving the run.
    pub engine: Option<&'a str>,
    /// Sampling period (0-based) the event belongs to.
    pub period: Option<u64>,
    /// Integration sub-step (1-based) within the period.
    pub sub_step: Option<u32>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a run label.
    pub fn with_run(mut self, run: &'a str) -> Self {
        self.run = Some(run);
        self
    }

    /// Attach the engine executable.
    pub fn with_engine(mut self, engine: &'a str) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Attach a sampling period index.
    pub fn with_period(mut self, period: u64) -> Self {
        self.period = Some(period);
        self
    }

    /// Attach a sub-step number.
    pub fn with_sub_step(mut self, sub_step: u32) -> Self {
        self.sub_step = Some(sub_step);
        self
    }
}

/// Outcome of an engine lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The transition completed.
    Success,
    /// The transition failed or had to be forced.
    Fault,
}

impl LifecycleOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event (launch, terminate, ...) with its outcome.
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let ctx = context.copied().unwrap_or_default();
    match outcome {
        LifecycleOutcome::Success => sim_info!(
            context = ctx,
            "{} [{}]: {}",
            event,
            outcome.as_str(),
            message
        ),
        LifecycleOutcome::Fault => sim_error!(
            context = ctx,
            "{} [{}]: {}",
            event,
            outcome.as_str(),
            message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new().with_run("run-a").with_period(3);
        sim_info!(context = ctx, "period committed");
        sim_debug!("debug message");
        sim_warn!(context = ctx.with_sub_step(2), "slow sub-step");
        sim_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn context_builders_set_fields() {
        let ctx = LogContext::new()
            .with_run("run-a")
            .with_engine("Simulador")
            .with_period(7)
            .with_sub_step(2);
        assert_eq!(ctx.run, Some("run-a"));
        assert_eq!(ctx.engine, Some("Simulador"));
        assert_eq!(ctx.period, Some(7));
        assert_eq!(ctx.sub_step, Some(2));
    }

    #[test]
    fn lifecycle_helper_emits() {
        init();
        let ctx = LogContext::new().with_engine("Simulador");
        log_lifecycle_event(
            Some(&ctx),
            "engine.launch",
            "engine process started",
            LifecycleOutcome::Success,
        );
        log_lifecycle_event(
            None,
            "engine.terminate",
            "engine killed after grace period",
            LifecycleOutcome::Fault,
        );
    }
}
