use std::fs;
use std::time::Duration;

use assert_cmd::Command;
use influx_json_recorder::types::config::Config;
use predicates::prelude::*;
use tempfile::tempdir;

mod support;

const BIN: &str = "influx-json-recorder";

#[test]
fn missing_config_is_created_and_process_exits() {
    let dir = tempdir().expect("failed to create temp dir for test");

    Command::cargo_bin(BIN).unwrap()
        .current_dir(dir.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("created one with placeholder values"));

    let path = dir.path().join("config.toml");
    assert!(path.exists());
    assert_eq!(Config::load(&path).unwrap(), Config::placeholder());
}

#[test]
fn config_path_can_be_given_as_argument() {
    let dir = tempdir().expect("failed to create temp dir for test");

    Command::cargo_bin(BIN).unwrap()
        .current_dir(dir.path())
        .arg("custom.toml")
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    assert!(dir.path().join("custom.toml").exists());
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn malformed_config_halts_without_overwriting() {
    let dir = tempdir().expect("failed to create temp dir for test");
    let path = dir.path().join("config.toml");
    let broken = "[Record\njsonURL = \"http://127.0.0.1\"\n";
    fs::write(&path, broken).unwrap();

    Command::cargo_bin(BIN).unwrap()
        .current_dir(dir.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("couldn't load config file"));

    assert_eq!(fs::read_to_string(&path).unwrap(), broken);
}

#[test]
fn zero_interval_halts() {
    let dir = tempdir().expect("failed to create temp dir for test");
    let path = dir.path().join("config.toml");
    let config = toml::to_string(&Config::placeholder())
        .unwrap()
        .replace("recordIntervalMsec = 5000", "recordIntervalMsec = 0");
    fs::write(&path, &config).unwrap();

    Command::cargo_bin(BIN).unwrap()
        .current_dir(dir.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("greater than zero"));

    assert_eq!(fs::read_to_string(&path).unwrap(), config);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sigterm_flushes_buffered_points_and_exits_cleanly() {
    use std::process::{Command as StdCommand, Stdio};
    use std::time::Instant;

    use assert_cmd::prelude::*;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use wait_timeout::ChildExt;

    use support::Responder;

    // 1) a source and an influxdb to point the config at
    let source = Responder::start(vec![(200, r#"{"temp": 21.5, "humidity": 60}"#)]).await;
    let influx = Responder::start(vec![(204, "")]).await;

    let dir = tempdir().expect("failed to create temp dir for test");
    let mut config = Config::placeholder();
    config.record.json_url = source.url("/status");
    config.record.interval_ms = 100;
    config.influx.url = influx.url("");
    fs::write(dir.path().join("config.toml"), toml::to_string(&config).unwrap()).unwrap();

    // 2) spawn the binary without a terminal so the console stays off
    let mut child = StdCommand::cargo_bin(BIN).unwrap()
        .current_dir(dir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn recorder");

    // 3) let a few cycles run; the periodic flush is a second away, so the
    //    points are still buffered when the signal arrives
    let start = Instant::now();
    while source.requests().len() < 3 {
        if start.elapsed() > Duration::from_secs(10) {
            let _ = child.kill();
            panic!("recorder never polled the source three times");
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    // 4) SIGTERM
    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).expect("failed to send SIGTERM");

    // 5) clean exit after the final flush
    let status = match child.wait_timeout(Duration::from_secs(10)).expect("wait_timeout failed") {
        Some(status) => status,
        None => {
            let _ = child.kill();
            panic!("process did not exit within timeout after SIGTERM");
        }
    };
    assert!(status.success(), "unexpected exit status: {status:?}");

    let lines: Vec<String> = influx.requests()
        .iter()
        .flat_map(|r| r.body.lines().map(str::to_string).collect::<Vec<_>>())
        .collect();
    assert!(!lines.is_empty(), "no points reached influxdb");
    assert!(lines.iter().all(|l| l.starts_with("MyMeasurement,Host=Home00 humidity=60,temp=21.5 ")));
}
