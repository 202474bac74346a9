//! ---
//! simext_section: "04-configuration"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "File-level validation of run configurations."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use simext_model::{validate_files, ConfigError, ConfigValidator};
use tempfile::{tempdir, TempDir};

const LIBRARY: &str = r#"{
    "MotorCD": {
        "Derivacion": {
            "parametros": ["R", "L", "J", "B", "K1"],
            "entradas": ["Vt", "Tlc"],
            "observaciones": ["ia", "w"]
        }
    },
    "Carga": {
        "Inercial": {
            "parameters": ["Jc"],
            "inputs": ["w"],
            "observations": ["Tc"]
        }
    }
}"#;

const METHODS: &str = r#"["EULER_PROG", "TRAPEZOIDAL", "RUNGEKUTTA4"]"#;

const CONFIGURATION: &str = r#"[
    {"ID": "motor1", "Modulo": "MotorCD", "Clase": "Derivacion",
     "Parametros": {"R": 1.086, "L": 0.01216, "J": 0.0137, "B": 0.0, "K1": 1.2}},
    {"ID": "carga1", "Modulo": "Carga", "Clase": "Inercial",
     "Parametros": {"Jc": 0.5}, "Metodo": "RUNGEKUTTA4"},
    {"Modulo": "Config_Sim",
     "Config": {"h": 0.0005, "kh": 4, "metodo": "EULER_PROG",
                "bitacora": ["motor1.w", "carga1.Tc"]}}
]"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("library.json"), LIBRARY).expect("library");
        fs::write(dir.path().join("methods.json"), METHODS).expect("methods");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.path("config.json");
        fs::write(&path, contents).expect("config");
        path
    }

    fn validate(&self, config: &Path) -> simext_model::Result<simext_model::SimulationConfig> {
        validate_files(self.path("library.json"), self.path("methods.json"), config)
            .map(|(_, config)| config)
    }
}

#[test]
fn validates_a_complete_configuration() {
    let fixture = Fixture::new();
    let config_path = fixture.write_config(CONFIGURATION);
    let (validator, config) = validate_files(
        fixture.path("library.json"),
        fixture.path("methods.json"),
        &config_path,
    )
    .expect("configuration should validate");

    assert_eq!(config.models.len(), 2);
    assert_eq!(config.simulation.kh, 4);
    assert!((config.simulation.h - 0.0005).abs() < f64::EPSILON);
    assert_eq!(config.method_for(&config.models[1]), "RUNGEKUTTA4");
    assert_eq!(
        config.input_names(validator.library()),
        vec!["motor1.Vt", "motor1.Tlc", "carga1.w"]
    );
    assert_eq!(config.output_names(), vec!["motor1.w", "carga1.Tc"]);
}

#[test]
fn missing_configuration_file_is_reported_first() {
    let fixture = Fixture::new();
    let missing = fixture.path("absent.json");
    let err = validate_files(
        fixture.path("no-library.json"),
        fixture.path("methods.json"),
        &missing,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ConfigNotFound(ref path) if path == &missing));
}

#[test]
fn trailing_descriptor_must_be_the_simulation_marker() {
    let fixture = Fixture::new();
    let path = fixture.write_config(
        r#"[
            {"Modulo": "Config_Sim",
             "Config": {"h": 0.001, "kh": 1, "metodo": "EULER_PROG", "bitacora": ["motor1.w"]}},
            {"ID": "motor1", "Modulo": "MotorCD", "Clase": "Derivacion",
             "Parametros": {"R": 1.0, "L": 1.0, "J": 1.0, "B": 1.0, "K1": 1.0}}
        ]"#,
    );
    let err = fixture.validate(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)), "{err}");
}

#[test]
fn integer_step_size_is_rejected() {
    let fixture = Fixture::new();
    let path = fixture.write_config(&CONFIGURATION.replace("\"h\": 0.0005", "\"h\": 1"));
    let err = fixture.validate(&path).unwrap_err();
    assert!(matches!(err, ConfigError::TypeMismatch { ref field, .. } if field == "h"));
}

#[test]
fn unregistered_global_method_is_rejected() {
    let fixture = Fixture::new();
    let path = fixture.write_config(&CONFIGURATION.replace(
        "\"metodo\": \"EULER_PROG\"",
        "\"metodo\": \"EULER_REGR\"",
    ));
    let err = fixture.validate(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedMethod(ref m) if m == "EULER_REGR"));
}

#[test]
fn unknown_class_parameter_and_variable_are_rejected() {
    let fixture = Fixture::new();

    let path = fixture.write_config(&CONFIGURATION.replace("\"Inercial\"", "\"Elastica\""));
    let err = fixture.validate(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownModel { ref id, .. } if id == "carga1"));

    let path = fixture.write_config(&CONFIGURATION.replace("\"Jc\": 0.5", "\"Jx\": 0.5"));
    let err = fixture.validate(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownParameter { ref parameter, .. } if parameter == "Jx"));

    let path = fixture.write_config(&CONFIGURATION.replace("carga1.Tc", "carga1.theta"));
    let err = fixture.validate(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownVariable { ref variable, .. } if variable == "carga1.theta"));
}

#[test]
fn malformed_json_names_the_file() {
    let fixture = Fixture::new();
    let path = fixture.write_config("[{\"ID\": ");
    let err = fixture.validate(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Json { .. }));
    assert!(err.to_string().contains("config.json"));
}

#[test]
fn validator_can_be_reused_across_documents() {
    let fixture = Fixture::new();
    let validator =
        ConfigValidator::from_paths(fixture.path("library.json"), fixture.path("methods.json"))
            .expect("validator");
    assert!(validator.validate_str(CONFIGURATION).is_ok());
    assert!(validator.validate_str("{}").is_err());
    assert!(validator.methods().contains("TRAPEZOIDAL"));
}
