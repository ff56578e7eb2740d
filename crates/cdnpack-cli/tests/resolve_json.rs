//! Integration tests for `cdnpack resolve --json`.

use serial_test::serial;
use std::path::Path;
use std::process::{Command, Output};

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "cdnpack-cli", "--bin", "cdnpack", "--"]);
    cmd.env_remove("NODE_ENV");
    cmd
}

fn install(root: &Path, name: &str, version: &str, peers: &[&str]) {
    let dir = root.join("node_modules").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    let peers: serde_json::Map<String, serde_json::Value> = peers
        .iter()
        .map(|p| ((*p).to_string(), serde_json::json!("*")))
        .collect();
    let pkg = serde_json::json!({ "name": name, "version": version, "peerDependencies": peers });
    std::fs::write(dir.join("package.json"), pkg.to_string()).unwrap();
}

fn resolve_json(cwd: &Path, args: &[&str]) -> (Output, serde_json::Value) {
    let output = cargo_bin()
        .args(["--json", "resolve"])
        .args(args)
        .arg("--cwd")
        .arg(cwd)
        .output()
        .expect("Failed to run command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap_or_else(|e| {
        panic!(
            "stdout should be valid JSON ({e}). stdout: {stdout}\nstderr: {}",
            String::from_utf8_lossy(&output.stderr)
        )
    });
    (output, json)
}

#[test]
#[serial]
fn test_resolve_react_development() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), "react", "15.6.1", &[]);

    let (output, json) = resolve_json(dir.path(), &["react", "./src/app.js", "--env", "development"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(json["ok"], true);
    assert_eq!(json["schema_version"].as_u64(), Some(1));
    assert_eq!(json["env"], "development");
    assert_eq!(json["output"], "chunks");

    let decisions = json["decisions"].as_array().unwrap();
    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0]["specifier"], "react");
    assert_eq!(decisions[0]["result"], "external");
    assert_eq!(decisions[0]["var"], "React");
    assert_eq!(
        decisions[0]["url"],
        "https://unpkg.com/react@15.6.1/dist/react.js"
    );
    assert_eq!(decisions[1]["result"], "bundle");

    let chunks = json["chunks"].as_array().unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["name"], "react");
}

#[test]
#[serial]
fn test_resolve_production_mode() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), "react", "15.6.1", &[]);

    let (output, json) = resolve_json(dir.path(), &["react", "--mode", "production"]);

    assert!(output.status.success());
    assert_eq!(json["env"], "production");
    assert_eq!(
        json["assets"][0]["url"],
        "https://unpkg.com/react@15.6.1/dist/react.min.js"
    );
}

#[test]
#[serial]
fn test_manifest_out_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), "react", "15.6.1", &[]);
    install(dir.path(), "babel-polyfill", "6.23.0", &[]);

    let (output, json) = resolve_json(
        dir.path(),
        &[
            "react",
            "babel-polyfill",
            "--env",
            "development",
            "--manifest-out",
            "cdn-manifest.json",
        ],
    );

    assert!(output.status.success());
    assert_eq!(json["output"], "manifest");
    assert_eq!(json["decisions"][1]["result"], "defer");

    let written = std::fs::read_to_string(dir.path().join("cdn-manifest.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(
        manifest["react.js"],
        "https://unpkg.com/react@15.6.1/dist/react.js"
    );
    assert_eq!(
        manifest["babel-polyfill.js"],
        "https://unpkg.com/babel-polyfill@6.23.0/dist/polyfill.js"
    );
}

#[test]
#[serial]
fn test_html_output() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), "react", "15.6.1", &[]);

    let (output, json) = resolve_json(dir.path(), &["react", "--env", "dev", "--output", "html"]);

    assert!(output.status.success());
    let html = json["html"].as_str().unwrap();
    assert!(html.contains("src=\"https://unpkg.com/react@15.6.1/dist/react.js\""));
}

#[test]
#[serial]
fn test_exclude_and_only_is_config_error() {
    let dir = tempfile::tempdir().unwrap();

    let (output, json) = resolve_json(dir.path(), &["react", "--exclude", "react", "--only", "vue"]);

    assert!(!output.status.success());
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "CDN_CONFIG_INVALID");
    assert_eq!(
        json["error"]["message"],
        "You can't use 'exclude' and 'only' at the same time"
    );
}

#[test]
#[serial]
fn test_missing_package_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    let (output, json) = resolve_json(dir.path(), &["react"]);

    assert!(!output.status.success());
    assert_eq!(json["error"]["code"], "CDN_METADATA_NOT_FOUND");
}

#[test]
#[serial]
fn test_defaults_to_project_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), "react", "15.6.1", &[]);
    install(dir.path(), "react-dom", "15.6.1", &["react"]);
    std::fs::write(
        dir.path().join("package.json"),
        r#"{"name":"app","dependencies":{"react-dom":"^15.6.1","react":"^15.6.1"}}"#,
    )
    .unwrap();

    let (output, json) = resolve_json(dir.path(), &["--env", "production"]);

    assert!(output.status.success());
    let specifiers: Vec<_> = json["decisions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["specifier"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(specifiers, vec!["react", "react-dom"]);
    assert_eq!(json["assets"].as_array().unwrap().len(), 2);
}

#[test]
#[serial]
fn test_config_file_and_flag_override() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), "react", "15.6.1", &[]);
    std::fs::write(
        dir.path().join("cdnpack.json"),
        r#"{"exclude":["react"],"env":"production"}"#,
    )
    .unwrap();

    let (_, json) = resolve_json(dir.path(), &["react"]);
    assert_eq!(json["env"], "production");
    assert_eq!(json["decisions"][0]["result"], "bundle");

    let (_, json) = resolve_json(dir.path(), &["react", "--only", "react"]);
    assert_eq!(json["decisions"][0]["result"], "external");
}

#[test]
#[serial]
fn test_unsatisfied_peer_warns() {
    let dir = tempfile::tempdir().unwrap();
    install(dir.path(), "react-dom", "15.6.1", &["left-pad"]);
    install(dir.path(), "left-pad", "1.3.0", &[]);

    let (output, json) = resolve_json(dir.path(), &["react-dom", "--env", "development"]);

    assert!(output.status.success());
    assert_eq!(json["decisions"][0]["result"], "bundle");
    let warnings = json["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("'left-pad'"));
}

#[test]
#[serial]
fn test_catalog_json() {
    let output = cargo_bin()
        .args(["--json", "catalog", "--env", "production"])
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["env"], "production");
    let react = json["modules"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == "react")
        .expect("react should be listed");
    assert_eq!(react["var"], "React");
    assert_eq!(
        react["versions"][0]["url"],
        "https://unpkg.com/react@[version]/dist/react.min.js"
    );
}

#[test]
#[serial]
fn test_version_command() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("cdnpack "));
}
