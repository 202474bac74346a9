//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "End-to-end driver runs against the loopback engine."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::path::Path;
use std::time::{Duration, Instant};

use simext_common::EngineConfig;
use simext_engine::{EngineError, RunParameters, Simulator};
use simext_model::ConfigValidator;

const LOOPBACK: &str = env!("CARGO_BIN_EXE_simext-loopback");

fn loopback(args: &[&str]) -> EngineConfig {
    let path = Path::new(LOOPBACK);
    let dir = path.parent().expect("loopback has a parent directory");
    let name = path.file_name().expect("loopback has a file name");
    EngineConfig::new(dir, name)
        .with_args(args.iter().copied())
        .with_read_timeout(Duration::from_secs(10))
        .with_shutdown_grace(Duration::from_millis(100))
}

fn params(h: f64, kh: u32, inputs: &[&str], outputs: &[&str]) -> RunParameters {
    let names = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
    RunParameters::new(h, kh, names(inputs), names(outputs)).expect("valid parameters")
}

#[test]
fn every_period_returns_n_outputs_and_is_logged() {
    let config = loopback(&["--inputs", "2", "--outputs", "3"]);
    let mut sim = Simulator::launch(&config, params(0.01, 1, &["Vt", "Tl"], &["n", "ia", "w"]))
        .expect("launch loopback")
        .with_label("arity");

    let initial = sim.start().expect("initial observation");
    assert_eq!(initial, vec![0.0, 0.0, 0.0]);
    assert!(sim.log().is_empty());

    for i in 0..5 {
        let observation = sim.advance(&[i as f64, 1.0]).expect("advance");
        assert_eq!(observation.len(), 3);
        assert_eq!(observation[0], (i + 1) as f64);
        assert_eq!(observation[1], i as f64);
        assert_eq!(observation[2], i as f64 + 1.0);
    }

    let log = sim.stop();
    assert_eq!(log.len(), 5);
    for (i, record) in log.iter().enumerate() {
        assert!((record.time - i as f64 * 0.01).abs() < 1e-12);
        assert_eq!(record.input, vec![i as f64, 1.0]);
    }
    assert_eq!(log.observation("ia").unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn only_the_last_sub_step_is_logged() {
    let mut sim = Simulator::launch(&loopback(&[]), params(0.001, 3, &["u"], &["n", "y"]))
        .expect("launch loopback");
    sim.start().expect("initial observation");
    for _ in 0..3 {
        sim.advance(&[2.5]).expect("advance");
    }
    assert_eq!(sim.log().len(), 3);
    assert_eq!(sim.log().observation("n").unwrap(), vec![3.0, 6.0, 9.0]);
    let times = sim.log().times();
    assert!((times[2] - 2.0 * 0.001 * 3.0).abs() < 1e-15);
    assert!((sim.current_time() - 0.009).abs() < 1e-12);
}

#[test]
fn start_never_appends_and_first_advance_does() {
    let mut sim = Simulator::launch(&loopback(&[]), params(0.5, 1, &["u"], &["n", "y"]))
        .expect("launch loopback");
    sim.start().expect("initial observation");
    assert_eq!(sim.completed_periods(), 0);
    assert!(matches!(sim.start(), Err(EngineError::AlreadyStarted)));
    sim.advance(&[1.0]).expect("advance");
    assert_eq!(sim.completed_periods(), 1);
    assert_eq!(sim.log().get(0).unwrap().time, 0.0);
}

#[test]
fn premature_exit_is_channel_closed() {
    let config = loopback(&["--exit-after", "4"]);
    let mut sim = Simulator::launch(&config, params(0.1, 3, &["u"], &["n", "y"]))
        .expect("launch loopback");
    sim.start().expect("initial observation");
    sim.advance(&[1.0]).expect("first period");

    let err = sim.advance(&[1.0]).unwrap_err();
    assert!(matches!(err.cause(), EngineError::ChannelClosed(_)), "{err}");
    match err {
        EngineError::Aborted {
            period,
            sub_step,
            completed,
            ..
        } => {
            assert_eq!(period, 1);
            assert_eq!(sub_step, 2);
            assert_eq!(completed, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.log().len(), 1);
    assert!(matches!(sim.advance(&[1.0]), Err(EngineError::ChannelClosed(_))));
}

#[test]
fn malformed_output_is_a_protocol_error() {
    let config = loopback(&["--garbage-at", "2"]);
    let mut sim = Simulator::launch(&config, params(0.1, 1, &["u"], &["n", "y"]))
        .expect("launch loopback");
    sim.start().expect("initial observation");
    sim.advance(&[1.0]).expect("first period");
    let err = sim.advance(&[1.0]).unwrap_err();
    match err.cause() {
        EngineError::Protocol { line } => assert_eq!(line, "#garbage"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.log().len(), 1);
}

#[test]
fn stalled_engine_times_out() {
    let config = loopback(&["--stall-at", "1"]).with_read_timeout(Duration::from_millis(200));
    let mut sim = Simulator::launch(&config, params(0.1, 1, &["u"], &["n", "y"]))
        .expect("launch loopback");
    sim.start().expect("initial observation");
    let started = Instant::now();
    let err = sim.advance(&[1.0]).unwrap_err();
    assert!(matches!(err.cause(), EngineError::ChannelTimeout(_)), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(sim.log().is_empty());
}

#[test]
fn missing_engine_is_a_launch_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = EngineConfig::new(dir.path(), "Simulador");
    let err = Simulator::launch(&config, params(0.1, 1, &["u"], &["y"])).unwrap_err();
    assert!(matches!(err, EngineError::Launch { .. }), "{err}");
}

#[test]
fn parameters_follow_the_validated_configuration() {
    let validator = ConfigValidator::new(
        r#"{"MotorCD": {"Derivacion": {"parametros": ["R"], "entradas": ["Vt", "Tl"],
                                       "observaciones": ["ia", "w"]}}}"#
            .parse()
            .expect("library"),
        r#"["EULER_PROG"]"#.parse().expect("methods"),
    );
    let config = validator
        .validate_str(
            r#"[{"ID": "m", "Modulo": "MotorCD", "Clase": "Derivacion", "Parametros": {"R": 1.0}},
                {"Modulo": "Config_Sim",
                 "Config": {"h": 0.002, "kh": 2, "metodo": "EULER_PROG", "bitacora": ["m.w", "m.ia"]}}]"#,
        )
        .expect("valid configuration");
    let run = RunParameters::from_simulation(&config, validator.library()).expect("parameters");
    assert_eq!(run.input_names(), ["m.Vt", "m.Tl"]);
    assert_eq!(run.output_names(), ["m.w", "m.ia"]);

    let mut sim = Simulator::launch(&loopback(&["--inputs", "2"]), run).expect("launch loopback");
    sim.start().expect("initial observation");
    let observation = sim.advance(&[24.0, 0.5]).expect("advance");
    assert_eq!(observation, vec![2.0, 24.0]);
    let log = sim.stop();
    assert_eq!(log.input("m.Tl").unwrap(), vec![0.5]);
    assert_eq!(log.observation("m.ia").unwrap(), vec![24.0]);
}
