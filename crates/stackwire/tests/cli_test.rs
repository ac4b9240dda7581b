#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const SETTINGS: &str = r#"
stack_name: InfraStack
region: us-east-1
registry:
  repository: poe-infra-services
  tags: ["latest", "v1.2.0"]
"#;

fn stackwire(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stackwire").unwrap();
    cmd.current_dir(dir)
        .env_remove("STACKWIRE_CONFIG_PATH")
        .env_remove("STACKWIRE_PROFILE")
        .env_remove("STACKWIRE_VERSION")
        .env_remove("STACKWIRE_REGION")
        .env_remove("CDK_DEFAULT_REGION");
    cmd
}

/// Help lists every subcommand
#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    stackwire(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("capacity"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    stackwire(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackwire"));
}

#[test]
fn test_deploy_help() {
    let dir = tempfile::tempdir().unwrap();
    stackwire(dir.path())
        .args(["deploy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--profile"))
        .stdout(predicate::str::contains("--version"))
        .stdout(predicate::str::contains("--outputs"));
}

#[test]
fn test_capacity_table() {
    let dir = tempfile::tempdir().unwrap();
    stackwire(dir.path())
        .arg("capacity")
        .assert()
        .success()
        .stdout(predicate::str::contains("staging"))
        .stdout(predicate::str::contains("production"))
        .stdout(predicate::str::contains("cache.m6g.large"));
}

#[test]
fn test_plan_lists_layers() {
    let dir = tempfile::tempdir().unwrap();
    stackwire(dir.path())
        .args(["plan", "--profile", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("layer 2"))
        .stdout(predicate::str::contains("compute"))
        .stdout(predicate::str::contains("CORS_ORIGIN"));

    assert!(!dir.path().join(".stackwire").join("production").exists());
}

#[test]
fn test_unknown_profile_rejected() {
    let dir = tempfile::tempdir().unwrap();
    stackwire(dir.path())
        .args(["plan", "--profile", "qa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown profile"));
}

#[test]
fn test_deploy_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stackwire.yaml"), SETTINGS).unwrap();

    stackwire(dir.path())
        .args(["deploy", "--version", "v1.2.0", "--outputs", "outputs.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ApiUrl"))
        .stdout(predicate::str::contains("Deployment complete"));

    let outputs: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("outputs.json")).unwrap())
            .unwrap();
    for key in [
        "ApiUrl",
        "IdentityPoolId",
        "IdentityClientId",
        "EdgeDomain",
        "FrontendUrl",
    ] {
        assert!(
            outputs[key].as_str().is_some_and(|v| !v.is_empty()),
            "{key} missing"
        );
    }
    assert!(
        dir.path()
            .join(".stackwire")
            .join("staging")
            .join("state.json")
            .exists()
    );
}

#[test]
fn test_deploy_unknown_image_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stackwire.yaml"), SETTINGS).unwrap();

    stackwire(dir.path())
        .args(["deploy", "--version", "v9.9.9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Deployment failed"))
        .stderr(predicate::str::contains("compute"))
        .stderr(predicate::str::contains("v9.9.9"));
}

#[test]
fn test_profile_from_env() {
    let dir = tempfile::tempdir().unwrap();
    stackwire(dir.path())
        .env("STACKWIRE_PROFILE", "production")
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("production"));
}
