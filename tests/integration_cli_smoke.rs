use std::process::Command;
use tempfile::TempDir;
use workload_trace::ExperimentResults;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_workload-trace"))
}

/// `process` writes a results file and a replay trace; `analyze` on the
/// replay reproduces the same statistics.
#[test]
fn process_then_analyze() {
    let dir = TempDir::new().unwrap();
    let starts = dir.path().join("start.txt");
    let finishes = dir.path().join("end.txt");
    std::fs::write(&starts, "1 0\n2 10000000\n3 200000000\n").unwrap();
    std::fs::write(&finishes, "1 50000000\n2 60000000\n3 210000000\n").unwrap();

    let processed = dir.path().join("experiment.yaml");
    let trace = dir.path().join("traces/experiment.txt");
    std::fs::create_dir_all(trace.parent().unwrap()).unwrap();

    let output = binary()
        .arg("process")
        .arg("--starts")
        .arg(&starts)
        .arg("--finishes")
        .arg(&finishes)
        .args(["--duration", "300ms", "--name", "smoke"])
        .arg("-o")
        .arg(&processed)
        .arg("--trace-out")
        .arg(&trace)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Experiment: smoke"));
    assert!(stdout.contains("throughput p50"));

    let analyzed = dir.path().join("analyzed.json");
    let output = binary()
        .arg("analyze")
        .arg(&trace)
        .args(["--duration", "300ms", "--name", "smoke"])
        .arg("-o")
        .arg(&analyzed)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let processed = ExperimentResults::load(&processed).unwrap();
    let analyzed = ExperimentResults::load(&analyzed).unwrap();
    assert_eq!(processed, analyzed);
    assert_eq!(processed.ts.throughput(), vec![0.0, 20.0, 0.0, 10.0]);
}

#[test]
fn missing_duration_fails() {
    let dir = TempDir::new().unwrap();
    let trace = dir.path().join("trace.txt");
    std::fs::write(&trace, "0\t10\n").unwrap();

    let output = binary()
        .arg("analyze")
        .arg(&trace)
        .arg("-o")
        .arg(dir.path().join("out.yaml"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("duration"));
}

#[test]
fn regen_reports_failure_but_writes_the_rest() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("closed-loop");
    std::fs::create_dir_all(dir.join("traces")).unwrap();
    std::fs::write(dir.join("ok.yaml"), "flags:\n  duration: 1s\n").unwrap();
    std::fs::write(dir.join("traces/ok.txt"), "0\t5000000\n500000000\t510000000\n").unwrap();
    std::fs::write(dir.join("broken.yaml"), "flags:\n  duration: 1s\n").unwrap();
    std::fs::write(dir.join("traces/broken.txt"), "garbage\n").unwrap();

    let output = binary().arg("regen").arg(&dir).output().unwrap();

    assert!(!output.status.success());
    assert!(root.path().join("closed-loop_regen/ok.yaml").exists());
    assert!(!root.path().join("closed-loop_regen/broken.yaml").exists());
}
