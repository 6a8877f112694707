use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "saga-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_saga-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("power-name"));
}

#[test]
fn cli_runs_smoke_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_saga-tester");
    let output_path = temp_path("smoke");
    let output = Command::new(exe)
        .args(["--report", "json", "--scenarios", "smoke", "--seeds", "1,2", "--output"])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Saga Scenario Tester"));

    let content = std::fs::read_to_string(output_path).expect("read output");
    let parsed: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let runs = parsed.as_array().expect("array of runs");
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run["passed"] == true));
}

#[test]
fn cli_validates_bundled_game() {
    let exe = env!("CARGO_BIN_EXE_saga-tester");
    let output = Command::new(exe)
        .arg("--validate-only")
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no issues found"));
}

#[test]
fn cli_rejects_config_with_dangling_station() {
    let exe = env!("CARGO_BIN_EXE_saga-tester");
    let config_path = temp_path("broken.json");
    std::fs::write(
        &config_path,
        r#"{
            "name": "Broken",
            "stations": {
                "hall": { "id": "hall", "type": "story", "opens": ["cellar"] }
            },
            "openStationsAtStart": ["hall"]
        }"#,
    )
    .expect("write config");

    let output = Command::new(exe)
        .arg("--validate-only")
        .arg("--config")
        .arg(&config_path)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unknown station cellar"));
}

#[test]
fn cli_runs_custom_scenario_file() {
    let exe = env!("CARGO_BIN_EXE_saga-tester");
    let scenario_path = temp_path("scenarios.json");
    std::fs::write(
        &scenario_path,
        r#"[
            {
                "name": "gate-first",
                "steps": [
                    { "step": "visit", "station": "start" },
                    { "step": "scan", "code": "https://saga.example/s/gate" }
                ],
                "expectations": [
                    { "expect": "currentStation", "station": "gate" },
                    { "expect": "adHoc", "key": "visited", "value": ["gate"] }
                ]
            }
        ]"#,
    )
    .expect("write scenarios");

    let output_path = temp_path("custom-md");
    let output = Command::new(exe)
        .args(["--report", "markdown", "--scenario-file"])
        .arg(&scenario_path)
        .arg("--output")
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("# Saga Scenario Results"));
    assert!(content.contains("| gate-first | 1337 | ✅ |"));
}

#[test]
fn cli_exits_nonzero_when_an_expectation_fails() {
    let exe = env!("CARGO_BIN_EXE_saga-tester");
    let scenario_path = temp_path("failing.json");
    std::fs::write(
        &scenario_path,
        r#"[
            {
                "name": "wrong-place",
                "steps": [{ "step": "visit", "station": "start" }],
                "expectations": [{ "expect": "currentStation", "station": "well" }]
            }
        ]"#,
    )
    .expect("write scenarios");

    let status = Command::new(exe)
        .args(["--report", "json", "--scenario-file"])
        .arg(&scenario_path)
        .status()
        .expect("run cli");
    assert!(!status.success());
}
