//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Simulation stepping driver and sub-step aggregation."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! The driver advances the engine one sampling period at a time. A period is
//! `kh` sub-step exchanges with the same input vector; only the observation of
//! the last sub-step is kept, and it is committed to the bitácora together
//! with the input and the period's start time.
use simext_common::EngineConfig;
use simext_logging::{sim_debug, sim_error, sim_info, LogContext};

use crate::bitacora::{Bitacora, StepRecord};
use crate::channel::{LineChannel, ProcessChannel};
use crate::errors::{EngineError, Result};
use crate::params::RunParameters;
use crate::protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Launched,
    Running,
    Failed,
}

/// Drives one engine instance through a run.
#[derive(Debug)]
pub struct Simulator<C: LineChannel = ProcessChannel> {
    channel: C,
    params: RunParameters,
    log: Bitacora,
    initial: Option<Vec<f64>>,
    state: DriverState,
    label: Option<String>,
    engine: String,
}

impl Simulator<ProcessChannel> {
    /// Launch the engine and prepare an empty bitácora.
    pub fn launch(config: &EngineConfig, params: RunParameters) -> Result<Self> {
        let channel = ProcessChannel::start(config)?;
        let engine = channel.engine().to_owned();
        let mut simulator = Self::with_channel(channel, params);
        simulator.engine = engine;
        Ok(simulator)
    }
}

impl<C: LineChannel> Simulator<C> {
    /// Drive an already connected channel.
    pub fn with_channel(channel: C, params: RunParameters) -> Self {
        let log = Bitacora::new(&params);
        Self {
            channel,
            params,
            log,
            initial: None,
            state: DriverState::Launched,
            label: None,
            engine: String::new(),
        }
    }

    /// Label attached to every log event of this run.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn context(&self) -> LogContext<'_> {
        run_context(&self.engine, self.label.as_deref())
    }

    /// Read the engine's initial observation. Nothing is written and nothing
    /// is logged.
    pub fn start(&mut self) -> Result<Vec<f64>> {
        match self.state {
            DriverState::Launched => {}
            DriverState::Running => return Err(EngineError::AlreadyStarted),
            DriverState::Failed => return Err(closed_after_failure()),
        }
        match protocol::read_observation(&mut self.channel, self.params.n_outputs()) {
            Ok(observation) => {
                self.state = DriverState::Running;
                self.initial = Some(observation.clone());
                sim_info!(
                    context = self.context(),
                    "simulation started: h={} kh={} inputs={} outputs={}",
                    self.params.h(),
                    self.params.kh(),
                    self.params.n_inputs(),
                    self.params.n_outputs()
                );
                Ok(observation)
            }
            Err(err) => {
                self.fail();
                sim_error!(context = self.context(), "initial observation failed: {}", err);
                Err(err)
            }
        }
    }

    /// Apply `input` for one sampling period and return the observation of
    /// its last sub-step.
    ///
    /// The period is committed to the bitácora only when every sub-step
    /// succeeded. On a channel or protocol failure the engine is terminated
    /// and the error names the period and sub-step that broke.
    pub fn advance(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        match self.state {
            DriverState::Running => {}
            DriverState::Launched => return Err(EngineError::NotStarted),
            DriverState::Failed => return Err(closed_after_failure()),
        }
        if input.len() != self.params.n_inputs() {
            return Err(EngineError::InvalidArgument(format!(
                "expected {} input values, got {}",
                self.params.n_inputs(),
                input.len()
            )));
        }
        if let Some(value) = input.iter().find(|value| !value.is_finite()) {
            return Err(EngineError::InvalidArgument(format!(
                "input contains non-finite value {value}"
            )));
        }

        let period = self.log.len() as u64;
        let n_outputs = self.params.n_outputs();
        let mut observation = Vec::new();
        for sub_step in 1..=self.params.kh() {
            match protocol::step(&mut self.channel, input, n_outputs) {
                Ok(values) => observation = values,
                Err(source) => {
                    self.fail();
                    sim_error!(
                        context = self.context().with_period(period).with_sub_step(sub_step),
                        "period aborted: {}",
                        source
                    );
                    return Err(EngineError::Aborted {
                        period,
                        sub_step,
                        completed: period,
                        source: Box::new(source),
                    });
                }
            }
        }

        let time = self.params.time_of(self.log.len());
        self.log.push(StepRecord {
            time,
            input: input.to_vec(),
            observation: observation.clone(),
        });
        sim_debug!(
            context = self.context().with_period(period),
            "period committed at t={}",
            time
        );
        Ok(observation)
    }

    /// Terminate the engine and hand over the bitácora.
    pub fn stop(self) -> Bitacora {
        let Simulator {
            mut channel,
            log,
            label,
            engine,
            ..
        } = self;
        channel.terminate();
        sim_info!(
            context = run_context(&engine, label.as_deref()),
            "simulation stopped after {} periods",
            log.len()
        );
        log
    }

    fn fail(&mut self) {
        self.channel.terminate();
        self.state = DriverState::Failed;
    }

    pub fn log(&self) -> &Bitacora {
        &self.log
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn initial_observation(&self) -> Option<&[f64]> {
        self.initial.as_deref()
    }

    pub fn completed_periods(&self) -> usize {
        self.log.len()
    }

    /// Start time of the next sampling period.
    pub fn current_time(&self) -> f64 {
        self.params.time_of(self.log.len())
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }
}

fn run_context<'a>(engine: &'a str, label: Option<&'a str>) -> LogContext<'a> {
    let ctx = LogContext::new().with_engine(engine);
    match label {
        Some(label) => ctx.with_run(label),
        None => ctx,
    }
}

fn closed_after_failure() -> EngineError {
    EngineError::ChannelClosed("engine was stopped after an earlier failure".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::scripted::ScriptedChannel;

    fn params(kh: u32) -> RunParameters {
        RunParameters::new(0.1, kh, vec!["u".into()], vec!["y".into(), "z".into()]).unwrap()
    }

    #[test]
    fn start_reads_without_writing_or_logging() {
        let channel = ScriptedChannel::with_output(["0", "0.5"]);
        let mut sim = Simulator::with_channel(channel, params(1));
        assert_eq!(sim.start().unwrap(), vec![0.0, 0.5]);
        assert!(sim.channel().written.is_empty());
        assert!(sim.log().is_empty());
        assert_eq!(sim.initial_observation(), Some(&[0.0, 0.5][..]));
        assert!(matches!(sim.start(), Err(EngineError::AlreadyStarted)));
    }

    #[test]
    fn advance_before_start_is_rejected() {
        let mut sim = Simulator::with_channel(ScriptedChannel::default(), params(1));
        assert!(matches!(sim.advance(&[1.0]), Err(EngineError::NotStarted)));
        assert!(sim.channel().written.is_empty());
    }

    #[test]
    fn keeps_only_the_last_sub_step() {
        let output = ["0", "0", "1", "10", "2", "20", "3", "30"];
        let mut sim = Simulator::with_channel(ScriptedChannel::with_output(output), params(3));
        sim.start().unwrap();
        assert_eq!(sim.advance(&[5.0]).unwrap(), vec![3.0, 30.0]);
        assert_eq!(sim.channel().written, vec!["5", "5", "5"]);
        assert_eq!(sim.log().len(), 1);
        assert_eq!(sim.log().get(0).unwrap().observation, vec![3.0, 30.0]);
        assert_eq!(sim.log().get(0).unwrap().time, 0.0);
        assert!((sim.current_time() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn wrong_arity_writes_nothing() {
        let mut sim = Simulator::with_channel(ScriptedChannel::with_output(["0", "0"]), params(1));
        sim.start().unwrap();
        let err = sim.advance(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(sim.channel().written.is_empty());
        assert!(sim.is_running());
    }

    #[test]
    fn failed_period_is_not_committed() {
        let output = ["0", "0", "1", "1", "2", "2", "3"];
        let mut sim = Simulator::with_channel(ScriptedChannel::with_output(output), params(2));
        sim.start().unwrap();
        sim.advance(&[1.0]).unwrap();
        let err = sim.advance(&[1.0]).unwrap_err();
        match &err {
            EngineError::Aborted {
                period,
                sub_step,
                completed,
                ..
            } => {
                assert_eq!((*period, *sub_step, *completed), (1, 1, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.cause(), EngineError::ChannelClosed(_)));
        assert_eq!(sim.log().len(), 1);
        assert!(sim.channel().terminated);
        assert!(matches!(sim.advance(&[1.0]), Err(EngineError::ChannelClosed(_))));

        let log = sim.stop();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn run_context_carries_engine_and_label() {
        let ctx = run_context("/opt/simulador/Simulador", Some("bench"));
        assert_eq!(ctx.engine, Some("/opt/simulador/Simulador"));
        assert_eq!(ctx.run, Some("bench"));

        let sim = Simulator::with_channel(ScriptedChannel::default(), params(1)).with_label("bench");
        let ctx = sim.context();
        assert_eq!(ctx.run, Some("bench"));
        assert!(ctx.engine.is_some());
    }
}
