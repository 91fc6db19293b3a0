// tests/config_loading.rs

use std::fs;
use std::path::PathBuf;

use change_supervisor::config::load_and_validate;
use change_supervisor::errors::SupervisorError;
use change_supervisor::types::{NotifyMode, TerminationPolicy};
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("Supervisor.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn full_config_round_trips_into_supervisor_settings() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[supervisor]
target = "//server:main"
mode = "signal"
termination = "forced"
startup_args = ["--output_base=/tmp/ob"]
build_args = ["--config=dev"]
program_args = ["--port", "8080"]

[builder]
bazel = "/usr/local/bin/bazelisk"

[watch]
root = "src"
patterns = ["**/*.rs", "BUILD"]
exclude = ["target/**"]
debounce_ms = 250
"#,
    );

    let cfg = load_and_validate(&path).expect("valid config");

    assert_eq!(cfg.mode(), NotifyMode::Signal);
    assert_eq!(cfg.builder_section().bazel, PathBuf::from("/usr/local/bin/bazelisk"));
    assert_eq!(cfg.watch_section().debounce_ms, 250);
    assert_eq!(cfg.watch_section().root, Some(PathBuf::from("src")));

    let sup = cfg.supervisor_config();
    assert_eq!(sup.target, "//server:main");
    assert_eq!(sup.termination, TerminationPolicy::Forced);
    assert_eq!(sup.startup_args, vec!["--output_base=/tmp/ob"]);
    assert_eq!(sup.build_args, vec!["--config=dev"]);
    assert_eq!(sup.program_args, vec!["--port", "8080"]);
}

#[test]
fn cli_overrides_win_over_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[supervisor]
target = "//:app"

[watch]
patterns = ["**"]
"#,
    );

    let cfg = load_and_validate(&path)
        .unwrap()
        .with_overrides(Some("//:other".into()), Some(NotifyMode::Signal), true);

    assert_eq!(cfg.supervisor_section().target, "//:other");
    assert_eq!(cfg.mode(), NotifyMode::Signal);
    assert_eq!(cfg.supervisor_config().termination, TerminationPolicy::Forced);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, SupervisorError::IoError(_)), "got {err:?}");
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[supervisor\ntarget = ");
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, SupervisorError::TomlError(_)), "got {err:?}");
}

#[test]
fn unknown_mode_is_rejected_while_parsing() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[supervisor]
target = "//:app"
mode = "telepathy"

[watch]
patterns = ["**"]
"#,
    );
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, SupervisorError::TomlError(_)), "got {err:?}");
}

#[test]
fn semantic_problems_are_config_errors() {
    let cases = [
        ("empty target", "[supervisor]\ntarget = \" \"\n[watch]\npatterns = [\"**\"]\n"),
        ("no patterns", "[supervisor]\ntarget = \"//:app\"\n"),
        (
            "bad glob",
            "[supervisor]\ntarget = \"//:app\"\n[watch]\npatterns = [\"src/[\"]\n",
        ),
        (
            "zero debounce",
            "[supervisor]\ntarget = \"//:app\"\n[watch]\npatterns = [\"**\"]\ndebounce_ms = 0\n",
        ),
    ];

    for (name, contents) in cases {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, contents);
        let err = load_and_validate(&path).unwrap_err();
        assert!(
            matches!(err, SupervisorError::ConfigError(_)),
            "{name}: got {err:?}"
        );
    }
}
