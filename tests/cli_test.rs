use std::fs;
use std::process::Command;

use traffic_core::config::Topology;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_traffic_core"))
}

/// The generator prints a topology document on stdout
#[test]
fn test_generate_complete_network() {
    let output = binary()
        .args(["generate", "complete", "--nodes", "3"])
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute traffic_core");

    assert!(
        output.status.success(),
        "Generator failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let topology: Topology = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(topology.node_list.len(), 3);
    assert_eq!(topology.edge_list.len(), 6);
}

#[test]
fn test_generate_rejects_bad_probability() {
    let output = binary()
        .args(["generate", "erdos-renyi", "--nodes", "3", "--probability", "2"])
        .output()
        .expect("Failed to execute traffic_core");

    assert!(!output.status.success());
}

/// A scenario runs to the end and writes one snapshot per tick
#[test]
fn test_run_scenario_with_snapshots() {
    let dir = std::env::temp_dir().join(format!("traffic_core_cli_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let scenario = dir.join("scenario.json");
    fs::write(
        &scenario,
        r#"{
            "node_list": [ { "id": 0 }, { "id": 1 }, { "id": 2 } ],
            "edge_list": [
                { "id": 0, "start_node": 0, "end_node": 1, "edge_length": 10.0 },
                { "id": 1, "start_node": 1, "end_node": 2, "edge_length": 10.0 }
            ],
            "car_list": [ { "id": 1, "start_edge": 0, "end_edge": 1 } ]
        }"#,
    )
    .unwrap();
    let snapshots = dir.join("snapshots");

    let output = binary()
        .arg("run")
        .arg("--scenario")
        .arg(&scenario)
        .args(["--ticks", "4", "--seed", "1"])
        .arg("--snapshot-dir")
        .arg(&snapshots)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute traffic_core");

    assert!(
        output.status.success(),
        "Simulation failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cars completed: 1"), "stdout: {stdout}");
    for tick in 1..=4 {
        assert!(snapshots.join(format!("{tick}_snapshot.json")).exists());
    }

    fs::remove_dir_all(&dir).unwrap();
}
