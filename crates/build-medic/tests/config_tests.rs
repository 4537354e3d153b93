//! Configuration layering and report writing

use build_medic::config::{Cli, MedicConfig};
use build_medic::report::{finish_session, write_session_report, SessionReport};
use clap::Parser;
use medic_engine::session::SessionRecorder;
use medic_engine::{Attempt, DiagnosedError, SessionOutcome};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

fn cli_for(root: &std::path::Path, extra: &[&str]) -> Cli {
    let mut args = vec![
        "build-medic".to_string(),
        "--project-root".to_string(),
        root.display().to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn test_toml_sections() {
    let config = MedicConfig::from_toml_str(
        r#"
[repair]
max_attempts = 3
build_output_dir = "out"
source_extensions = ["c", "h", "cu"]
build_command = "make -C {build_dir}"

[oracle]
endpoint = "http://gpu-box:8000/v1/chat/completions"
model = "deepseek-coder"
timeout_secs = 60
"#,
    )
    .unwrap();

    assert_eq!(config.repair.max_attempts, 3);
    assert_eq!(config.repair.build_output_dir, PathBuf::from("out"));
    assert!(config.repair.source_extensions.contains("cu"));
    assert_eq!(config.repair.build_argv().unwrap(), vec!["make", "-C", "out"]);
    // Untouched keys keep their defaults
    assert_eq!(config.repair.build_timeout_secs, 600);
    assert_eq!(config.oracle.model, "deepseek-coder");
    assert_eq!(config.oracle.max_tokens, 8192);
}

#[test]
fn test_layering_file_env_cli() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("medic.toml"),
        "[repair]\nmax_attempts = 2\nbuild_output_dir = \"from-file\"\n\n[oracle]\nmodel = \"file-model\"\n",
    )
    .unwrap();

    // File only
    let config = MedicConfig::load_with(&cli_for(dir.path(), &[]), env_of(&[])).unwrap();
    assert_eq!(config.repair.max_attempts, 2);
    assert_eq!(config.oracle.model, "file-model");
    assert_eq!(config.repair.project_root, dir.path());

    // Env beats file
    let env = env_of(&[
        ("MEDIC_MAX_ATTEMPTS", "4"),
        ("MEDIC_MODEL", "env-model"),
        ("MEDIC_SOURCE_EXTENSIONS", "cpp,.hpp"),
        ("MEDIC_API_KEY", "sk-test"),
    ]);
    let config = MedicConfig::load_with(&cli_for(dir.path(), &[]), &env).unwrap();
    assert_eq!(config.repair.max_attempts, 4);
    assert_eq!(config.oracle.model, "env-model");
    assert_eq!(config.oracle.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.repair.source_extensions.len(), 2);
    assert_eq!(config.repair.build_output_dir, PathBuf::from("from-file"));

    // CLI beats env
    let cli = cli_for(dir.path(), &["--max-attempts", "7", "--model", "cli-model", "--build-dir", "b2"]);
    let config = MedicConfig::load_with(&cli, &env).unwrap();
    assert_eq!(config.repair.max_attempts, 7);
    assert_eq!(config.oracle.model, "cli-model");
    assert_eq!(config.repair.build_output_dir, PathBuf::from("b2"));
}

#[test]
fn test_explicit_config_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let cli = cli_for(dir.path(), &["--config", missing.to_str().unwrap()]);
    let err = MedicConfig::load_with(&cli, env_of(&[])).unwrap_err();
    assert!(format!("{err:#}").contains("nope.toml"));
}

#[test]
fn test_validation_errors() {
    let dir = tempfile::tempdir().unwrap();

    let cli = cli_for(dir.path(), &["--max-attempts", "0"]);
    let err = MedicConfig::load_with(&cli, env_of(&[])).unwrap_err();
    assert!(format!("{err:#}").contains("max_attempts"));

    let err = MedicConfig::load_with(
        &cli_for(dir.path(), &[]),
        env_of(&[("MEDIC_BUILD_TIMEOUT_SECS", "soon")]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("MEDIC_BUILD_TIMEOUT_SECS"));

    let err = MedicConfig::load_with(
        &cli_for(dir.path(), &[]),
        env_of(&[("MEDIC_SOURCE_EXTENSIONS", " , ")]),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("source_extensions"));
}

#[test]
fn test_report_path_defaults_under_build_dir() {
    let dir = tempfile::tempdir().unwrap();
    let cli = cli_for(dir.path(), &["--build-dir", "out"]);
    let config = MedicConfig::load_with(&cli, env_of(&[])).unwrap();
    assert_eq!(
        config.report_path(&cli),
        dir.path().join("out").join("medic-session.json")
    );

    let cli = cli_for(dir.path(), &["--report", "/tmp/r.json", "--diagnose-only"]);
    assert!(cli.diagnose_only);
    assert_eq!(config.report_path(&cli), PathBuf::from("/tmp/r.json"));
}

#[test]
fn test_session_report_lists_paths_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = SessionRecorder::new(dir.path(), 3);
    recorder.record_build();
    let mut attempt = Attempt::new(
        1,
        DiagnosedError::LinkError {
            symbol: "init_logging".to_string(),
        },
    );
    attempt.context_bundle = medic_engine::ContextBundle::from_files([(
        "src/log.h",
        "void init_logging(void);".to_string(),
    )]);
    attempt.patch_set = Some(
        [(PathBuf::from("src/log.c"), "void init_logging(void) {}".to_string())]
            .into_iter()
            .collect(),
    );
    attempt.applied = true;
    recorder.record_attempt(attempt);
    let session = recorder.finalize(SessionOutcome::ExhaustedAttempts, Vec::new());

    let path = dir.path().join("build/medic-session.json");
    write_session_report(&session, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let report: SessionReport = serde_json::from_str(&text).unwrap();
    assert_eq!(report.session_id, session.id);
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.attempts[0].context_files, vec![PathBuf::from("src/log.h")]);
    assert_eq!(report.attempts[0].patched_files, vec![PathBuf::from("src/log.c")]);
    assert!(!text.contains("void init_logging(void) {}"));

    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["outcome"]["outcome"], "exhausted_attempts");
    assert_eq!(json["attempts"][0]["diagnosis"]["kind"], "link_error");
}

#[test]
fn test_unwritable_report_keeps_success_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = SessionRecorder::new(dir.path(), 3);
    recorder.record_build();
    let session = recorder.finalize(SessionOutcome::Succeeded, Vec::new());

    // The target is an existing directory, so the write fails
    assert!(write_session_report(&session, dir.path()).is_err());
    assert_eq!(finish_session(&session, dir.path()), 0);

    let failed = SessionRecorder::new(dir.path(), 3).finalize(SessionOutcome::ExhaustedAttempts, Vec::new());
    assert_eq!(finish_session(&failed, dir.path()), 1);
}
