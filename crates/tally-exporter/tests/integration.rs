//! Tests running the `tally-exporter` binary.

use std::{
    fs,
    io::{Read as _, Write as _},
    net::{Ipv4Addr, TcpListener, TcpStream},
    path::Path,
    process::{Child, Command, ExitStatus, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn exporter_command(log_file: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tally-exporter"));
    command
        .arg("--log-file")
        .arg(log_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn run_to_completion(command: &mut Command) -> Output {
    command.output().expect("failed running exporter")
}

fn free_port() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    listener.local_addr().unwrap().port()
}

fn scrape(port: u16, path: &str) -> String {
    let started_at = Instant::now();
    let mut stream = loop {
        match TcpStream::connect((Ipv4Addr::LOCALHOST, port)) {
            Ok(stream) => break stream,
            Err(err) => {
                assert!(
                    started_at.elapsed() < TEST_TIMEOUT,
                    "exporter didn't start listening: {err}"
                );
                thread::sleep(POLL_INTERVAL);
            }
        }
    };
    stream.set_read_timeout(Some(TEST_TIMEOUT)).unwrap();
    write!(
        stream,
        "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    )
    .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

fn wait_with_timeout(child: &mut Child) -> ExitStatus {
    let started_at = Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if started_at.elapsed() > TEST_TIMEOUT {
            child.kill().ok();
            panic!("exporter didn't exit in time");
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[test]
fn missing_config_argument_prints_usage() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("logfile");
    let output = run_to_completion(&mut exporter_command(&log_file));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "{stderr}");
}

#[test]
fn invalid_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("log").join("logfile");
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, "conf:\n  port: 0\n").unwrap();

    let output = run_to_completion(exporter_command(&log_file).arg(&config_path));
    assert!(!output.status.success());

    let logs = fs::read_to_string(&log_file).unwrap();
    assert!(logs.contains("Failed to read config file"), "{logs}");
    assert!(logs.contains("port must be non-zero"), "{logs}");

    let output = run_to_completion(exporter_command(&log_file).arg(dir.path().join("missing.yaml")));
    assert!(!output.status.success());
    let logs = fs::read_to_string(&log_file).unwrap();
    assert_eq!(logs.matches("Failed to read config file").count(), 2, "{logs}");
}

#[test]
fn occupied_port_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("log").join("logfile");
    let occupying_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = occupying_listener.local_addr().unwrap().port();
    let config_path = dir.path().join("config.yaml");
    fs::write(
        &config_path,
        format!("conf:\n  port: {port}\n  bind_address: 127.0.0.1\n"),
    )
    .unwrap();

    let output = run_to_completion(exporter_command(&log_file).arg(&config_path));
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));

    let logs = fs::read_to_string(&log_file).unwrap();
    assert!(
        logs.contains(&format!("Failed binding to 127.0.0.1:{port}")),
        "{logs}"
    );
    assert!(!logs.contains("Starting exporter"), "{logs}");
    drop(occupying_listener);
}

#[cfg(unix)]
#[test]
fn serving_metrics_and_graceful_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let log_file = dir.path().join("log").join("logfile");
    let port = free_port();
    let config_path = dir.path().join("config.yaml");
    fs::write(
        &config_path,
        format!("conf:\n  port: {port}\n  bind_address: 127.0.0.1\n  shutdown_timeout: 2s\n"),
    )
    .unwrap();

    let mut child = exporter_command(&log_file)
        .arg(&config_path)
        .spawn()
        .unwrap();

    let response = scrape(port, "/metrics");
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(
        response.contains("content-type: text/plain; version=0.0.4; charset=utf-8"),
        "{response}"
    );
    assert!(
        response.contains("example_metric_with_label{label_1=\"1.000000\",label_2=\"second label\"} 42.0"),
        "{response}"
    );
    let response = scrape(port, "/");
    assert!(response.contains("<a href='/metrics'>Metrics</a>"), "{response}");

    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    let status = wait_with_timeout(&mut child);
    assert!(status.success(), "{status:?}");

    let logs = fs::read_to_string(&log_file).unwrap();
    assert!(logs.contains("received signal SIGTERM"), "{logs}");
    assert!(logs.contains("Exporter shut down gracefully"), "{logs}");
}
