//! CLI subprocess integration tests.
//!
//! These tests invoke the `kiln` binary as a subprocess and verify exit
//! codes, stdout content, and JSON output stability.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn kiln_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kiln"));
    cmd.env_remove("KILN_LOG");
    cmd
}

fn write_manifest(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("kiln.toml");
    std::fs::write(&path, content).unwrap();
    path
}

const CHAIN: &str = r#"manifest_version = 1

[[modules]]
id = "agents.codex"
phase = 2
dependencies = ["lang.bun"]
verify = "command -v codex"

[[modules]]
id = "lang.bun"
dependencies = ["base.system"]
tags = ["js"]

[[modules]]
id = "base.system"
phase = 0
run_as = "root"

[[modules]]
id = "tools.atuin"
enabled_by_default = false
"#;

fn run(project: &Path, args: &[&str]) -> Output {
    let manifest = project.join("kiln.toml");
    let out = project.join("generated");
    kiln_bin()
        .arg("--manifest")
        .arg(&manifest)
        .arg("--out")
        .arg(&out)
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let output = kiln_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "kiln --version must exit 0");
    assert!(
        stdout(&output).contains("kiln"),
        "version output must contain 'kiln': {}",
        stdout(&output)
    );
}

#[test]
fn cli_help_lists_commands() {
    let output = kiln_bin().arg("--help").output().unwrap();
    assert!(output.status.success(), "kiln --help must exit 0");
    let text = stdout(&output);
    for command in ["generate", "check", "validate", "order", "deps", "plan", "init"] {
        assert!(text.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_generate_writes_artifacts() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["generate"]);
    assert!(
        output.status.success(),
        "generate must exit 0. stderr: {}",
        stderr(&output)
    );
    let out = project.path().join("generated");
    for name in [
        "manifest_index.sh",
        "install_base.sh",
        "install_lang.sh",
        "install_tools.sh",
        "install_agents.sh",
        "install_all.sh",
        "doctor_checks.sh",
    ] {
        assert!(out.join(name).is_file(), "missing {name}");
    }
}

#[test]
fn cli_generate_json_output() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["--json", "generate"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["modules"], 4);
    assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);
    assert_eq!(
        json["categories"],
        serde_json::json!(["base", "lang", "tools", "agents"])
    );
    assert_eq!(json["report"]["written"].as_array().unwrap().len(), 7);
}

#[test]
fn cli_generate_lib_dir_override() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["generate", "--lib-dir", "/opt/kiln/lib"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let installer =
        std::fs::read_to_string(project.path().join("generated").join("install_lang.sh")).unwrap();
    assert!(installer.contains("'/opt/kiln/lib'"));
}

#[test]
fn cli_check_honours_lib_dir_used_for_generate() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let generated = run(project.path(), &["generate", "--lib-dir", "/opt/kiln/lib"]);
    assert!(generated.status.success(), "stderr: {}", stderr(&generated));
    assert!(stdout(&generated).contains("helper library: /opt/kiln/lib"));

    let clean = run(project.path(), &["check", "--lib-dir", "/opt/kiln/lib"]);
    assert_eq!(clean.status.code(), Some(0), "stdout: {}", stdout(&clean));

    let mismatched = run(project.path(), &["check"]);
    assert_eq!(mismatched.status.code(), Some(1));
}

#[test]
fn cli_check_clean_then_drift() {
    let project = tempfile::tempdir().unwrap();
    let manifest = write_manifest(project.path(), CHAIN);

    let missing = run(project.path(), &["check"]);
    assert_eq!(missing.status.code(), Some(1), "check before generate must report drift");

    assert!(run(project.path(), &["generate"]).status.success());
    let clean = run(project.path(), &["check"]);
    assert_eq!(clean.status.code(), Some(0), "stdout: {}", stdout(&clean));
    assert!(stdout(&clean).contains("clean"));

    std::fs::write(&manifest, format!("{CHAIN}\n")).unwrap();
    let drift = run(project.path(), &["--json", "check"]);
    assert_eq!(drift.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_str(&stdout(&drift)).unwrap();
    assert_eq!(json["has_drift"], true);
    assert_eq!(json["fingerprint_matches"], false);
}

#[test]
fn cli_validate_reports_counts() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["--json", "validate"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["status"], "valid");
    assert_eq!(json["modules"], 4);
    assert_eq!(
        json["order"],
        serde_json::json!(["base.system", "lang.bun", "tools.atuin", "agents.codex"])
    );
    assert!(!project.path().join("generated").exists());
}

#[test]
fn cli_order_prints_install_order() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["order"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    let base = text.find("base.system").unwrap();
    let bun = text.find("lang.bun").unwrap();
    let codex = text.find("agents.codex").unwrap();
    assert!(base < bun && bun < codex, "{text}");
}

#[test]
fn cli_deps_transitive_and_reverse() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["--json", "deps", "agents.codex"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["modules"], serde_json::json!(["lang.bun", "base.system"]));
    assert_eq!(json["direct"]["dependencies"], serde_json::json!(["lang.bun"]));
    assert_eq!(json["direct"]["dependents"], serde_json::json!([]));

    let output = run(project.path(), &["deps", "--reverse", "base.system"]);
    let text = stdout(&output);
    assert!(text.contains("lang.bun") && text.contains("agents.codex"), "{text}");
}

#[test]
fn cli_deps_unknown_module_is_graph_error() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["deps", "lang.cobol"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("unknown module 'lang.cobol'"));
}

#[test]
fn cli_plan_only_with_dependencies() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["--json", "plan", "--only", "agents.codex"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        json["modules"],
        serde_json::json!(["base.system", "lang.bun", "agents.codex"])
    );
}

#[test]
fn cli_plan_without_filters_uses_default_selection() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(project.path(), &["plan"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("plan: modules enabled by default"), "{text}");
    assert!(!text.contains("tools.atuin"), "{text}");

    let output = run(project.path(), &["plan", "--include-disabled"]);
    let text = stdout(&output);
    assert!(text.contains("plan: every module"), "{text}");
    assert!(text.contains("tools.atuin"), "{text}");
}

#[test]
fn cli_plan_rejects_skipping_required_dependency() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);

    let output = run(
        project.path(),
        &["plan", "--only", "agents.codex", "--skip", "base.system"],
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("selection error"));
}

#[test]
fn cli_cycle_exits_with_manifest_code_and_writes_nothing() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(
        project.path(),
        "manifest_version = 1\n[[modules]]\nid = \"a.x\"\ndependencies = [\"a.y\"]\n[[modules]]\nid = \"a.y\"\ndependencies = [\"a.x\"]\n",
    );

    let output = run(project.path(), &["generate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("graph error: dependency cycle"));
    assert!(!project.path().join("generated").exists());
}

#[test]
fn cli_malformed_manifest_names_field() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(
        project.path(),
        "manifest_version = 1\n[[modules]]\nid = \"lang.bun\"\nphase = \"late\"\n",
    );

    let output = run(project.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("manifest error"), "{err}");
    assert!(err.contains("`phase`"), "{err}");
}

#[test]
fn cli_missing_manifest_is_manifest_error() {
    let project = tempfile::tempdir().unwrap();
    let output = run(project.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_output_path_is_file_exits_with_output_code() {
    let project = tempfile::tempdir().unwrap();
    write_manifest(project.path(), CHAIN);
    std::fs::write(project.path().join("generated"), "not a directory").unwrap();

    let output = run(project.path(), &["generate"]);
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("output error"));
}

#[test]
fn cli_init_writes_template_and_refuses_overwrite() {
    let project = tempfile::tempdir().unwrap();

    let output = run(project.path(), &["init", "--template", "workstation"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(project.path().join("kiln.toml").is_file());
    assert!(run(project.path(), &["validate"]).status.success());

    let again = run(project.path(), &["init"]);
    assert_eq!(again.status.code(), Some(1));
    assert!(stderr(&again).contains("--force"));

    let forced = run(project.path(), &["init", "--force"]);
    assert!(forced.status.success());
}

#[test]
fn cli_init_unknown_template_fails() {
    let project = tempfile::tempdir().unwrap();
    let output = run(project.path(), &["init", "--template", "nope"]);
    assert!(!output.status.success());
    assert!(!project.path().join("kiln.toml").exists());
}

#[test]
fn cli_yaml_manifest_is_accepted() {
    let project = tempfile::tempdir().unwrap();
    let manifest = project.path().join("kiln.yaml");
    std::fs::write(
        &manifest,
        "manifest_version: 1\nmodules:\n  - id: base.system\n    phase: 0\n  - id: lang.bun\n    dependencies: [base.system]\n",
    )
    .unwrap();

    let output = kiln_bin()
        .arg("--manifest")
        .arg(&manifest)
        .arg("validate")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn cli_completions_bash() {
    let output = kiln_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("kiln"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = kiln_bin()
        .arg("man-pages")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(dir.path().join("kiln.1").is_file());
    assert!(dir.path().join("kiln-generate.1").is_file());
}
