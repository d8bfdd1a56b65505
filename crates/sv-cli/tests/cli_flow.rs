//! End-to-end tests of the `spikeval` binary.
//!
//! Every test runs the binary with `HOME` and `XDG_CONFIG_HOME` pointing into
//! a temporary directory so that no user configuration leaks in.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn spikeval_binary() -> String {
    env!("CARGO_BIN_EXE_spikeval").to_string()
}

fn spikeval(home: &Path) -> Command {
    let mut command = Command::new(spikeval_binary());
    command
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("SV_EVALUATION__MAX_SHIFT")
        .env_remove("SV_EVALUATION__TOLERANCE")
        .env_remove("RUST_LOG");
    command
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "spikeval should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

/// Ground truth of two units and a sorting that reports them 8 samples late
/// under different labels.
fn late_sorting(dir: &Path) {
    write(dir, "gt.json", r#"{"0": [100, 300, 500], "1": [200, 400]}"#);
    write(dir, "ev.json", r#"{"7": [108, 308, 508], "9": [208, 408]}"#);
}

#[test]
fn test_evaluate_reports_every_module() {
    let temp = TempDir::new().unwrap();
    late_sorting(temp.path());

    let output = spikeval(temp.path())
        .arg("evaluate")
        .arg("--ground-truth")
        .arg(temp.path().join("gt.json"))
        .arg("--estimated")
        .arg(temp.path().join("ev.json"))
        .output()
        .unwrap();
    let text = stdout(&output);

    assert!(text.contains("shift:        -8 samples (-0.250 ms)"), "{text}");
    assert!(text.contains("[classification]"));
    assert!(text.contains("| 0/7 |"));
    assert!(text.contains("| 1/9 |"));
    assert!(text.contains("[variation_of_information]"));
    assert!(text.contains("[waveform_amplitude]\nFAILED: invalid input: raw_data: needs raw data"));
}

#[test]
fn test_evaluate_json_with_raw_data() {
    let temp = TempDir::new().unwrap();
    late_sorting(temp.path());
    let raw: Vec<String> = (0..600).map(|_| "[0.0, 0.0]".to_string()).collect();
    write(temp.path(), "raw.json", &format!("[{}]", raw.join(",")));
    write(
        temp.path(),
        "config.toml",
        "[evaluation]\nwaveform_cut = [10, 10]\n",
    );

    let output = spikeval(temp.path())
        .arg("--config")
        .arg(temp.path().join("config.toml"))
        .arg("evaluate")
        .arg("--ground-truth")
        .arg(temp.path().join("gt.json"))
        .arg("--estimated")
        .arg(temp.path().join("ev.json"))
        .arg("--raw")
        .arg(temp.path().join("raw.json"))
        .arg("--json")
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    assert_eq!(json["shift"]["global"], -8);
    assert_eq!(json["params"]["waveform_cut"], serde_json::json!([10, 10]));
    assert_eq!(json["contingency"]["summary"]["tp"], 5);
    let outcomes = json["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o["status"] == "ok"), "{outcomes:?}");
    assert_eq!(outcomes[2]["results"][0]["kind"], "table");
}

#[test]
fn test_configuration_layers_in_order() {
    let temp = TempDir::new().unwrap();
    late_sorting(temp.path());
    // Too narrow to find the 8-sample latency.
    write(temp.path(), "narrow.toml", "[evaluation]\nmax_shift = 5\n");

    let shift = |configure: &dyn Fn(&mut Command)| {
        let mut command = spikeval(temp.path());
        command
            .arg("--config")
            .arg(temp.path().join("narrow.toml"))
            .arg("shift")
            .arg("--ground-truth")
            .arg(temp.path().join("gt.json"))
            .arg("--estimated")
            .arg(temp.path().join("ev.json"));
        configure(&mut command);
        stdout(&command.output().unwrap())
    };

    // Config file alone.
    assert!(shift(&|_| {}).starts_with("shift: 0 samples"));

    // Environment beats the config file.
    let from_env = shift(&|c| {
        c.env("SV_EVALUATION__MAX_SHIFT", "20");
    });
    assert!(from_env.starts_with("shift: -8 samples"), "{from_env}");

    // Command line beats the environment.
    let from_flag = shift(&|c| {
        c.env("SV_EVALUATION__MAX_SHIFT", "20").arg("--max-shift").arg("5");
    });
    assert!(from_flag.starts_with("shift: 0 samples"), "{from_flag}");
}

#[test]
fn test_platform_config_file_is_read() {
    let temp = TempDir::new().unwrap();
    late_sorting(temp.path());
    let config_dir = temp.path().join(".config/spikeval");
    std::fs::create_dir_all(&config_dir).unwrap();
    write(&config_dir, "config.toml", "[evaluation]\nshift_mode = \"none\"\n");

    let output = spikeval(temp.path())
        .arg("evaluate")
        .arg("--ground-truth")
        .arg(temp.path().join("gt.json"))
        .arg("--estimated")
        .arg(temp.path().join("ev.json"))
        .arg("--modules")
        .arg("classification")
        .output()
        .unwrap();
    let text = stdout(&output);

    assert!(text.contains("shift:        none"), "{text}");
    assert!(!text.contains("[variation_of_information]"));
}

#[test]
fn test_batch_evaluates_manifest_in_order() {
    let temp = TempDir::new().unwrap();
    late_sorting(temp.path());
    write(temp.path(), "exact.json", r#"{"0": [100, 300, 500], "1": [200, 400]}"#);
    write(
        temp.path(),
        "manifest.json",
        r#"[
            {"name": "late", "ground_truth": "gt.json", "estimated": "ev.json"},
            {"name": "exact", "ground_truth": "gt.json", "estimated": "exact.json"}
        ]"#,
    );

    let output = spikeval(temp.path())
        .arg("batch")
        .arg("--manifest")
        .arg(temp.path().join("manifest.json"))
        .arg("--json")
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();

    assert_eq!(json[0]["name"], "late");
    assert_eq!(json[0]["report"]["shift"]["global"], -8);
    assert_eq!(json[1]["name"], "exact");
    assert_eq!(json[1]["report"]["shift"]["global"], 0);
}

#[test]
fn test_unreadable_input_fails_with_context() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "gt.json", "not json");
    write(temp.path(), "ev.json", "{}");

    let output = spikeval(temp.path())
        .arg("evaluate")
        .arg("--ground-truth")
        .arg(temp.path().join("gt.json"))
        .arg("--estimated")
        .arg(temp.path().join("ev.json"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse"), "{stderr}");
}

#[test]
fn test_invalid_parameters_fail_fast() {
    let temp = TempDir::new().unwrap();
    late_sorting(temp.path());

    let output = spikeval(temp.path())
        .arg("evaluate")
        .arg("--ground-truth")
        .arg(temp.path().join("gt.json"))
        .arg("--estimated")
        .arg(temp.path().join("ev.json"))
        .arg("--tolerance")
        .arg("-1")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("tolerance must not be negative"), "{stderr}");
}
