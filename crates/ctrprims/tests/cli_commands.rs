#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/ctrcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn read_request_line(stream: &mut UnixStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn respond(stream: &mut UnixStream, status: &str, content_type: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn handle(mut stream: UnixStream) {
    let line = read_request_line(&mut stream);
    let target = line.split_whitespace().nth(1).unwrap_or_default().to_string();
    let path = target.split('?').next().unwrap_or_default();

    if path.ends_with("/_ping") {
        respond(&mut stream, "200 OK", "text/plain", "OK");
    } else if path.ends_with("/containers/json") {
        respond(
            &mut stream,
            "200 OK",
            "application/json",
            r#"[{"Id":"abc123def4567890","Names":["/web"],"Image":"nginx:1.27","State":"running","Status":"Up 2 minutes","Ports":null,"Labels":null}]"#,
        );
    } else if path.ends_with("/images/create") {
        respond(
            &mut stream,
            "200 OK",
            "application/json",
            concat!(
                "{\"status\":\"Pulling from library/private\",\"id\":\"latest\"}\n",
                "{\"errorDetail\":{\"message\":\"pull access denied for private\"},",
                "\"error\":\"pull access denied for private\"}\n",
            ),
        );
    } else if path.ends_with("/containers/missing/json") {
        respond(
            &mut stream,
            "404 Not Found",
            "application/json",
            r#"{"message":"No such container: missing"}"#,
        );
    } else {
        respond(
            &mut stream,
            "500 Internal Server Error",
            "application/json",
            r#"{"message":"unexpected request"}"#,
        );
    }
}

fn spawn_engine(tag: &str) -> PathBuf {
    let sock_path = unique_temp_dir(tag).join("engine.sock");
    let listener = UnixListener::bind(&sock_path).expect("engine socket should bind");
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream));
        }
    });
    sock_path
}

fn run_cli(host: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ctrprims"))
        .env_remove("DOCKER_HOST")
        .env_remove("CONTAINER_HOST")
        .env_remove("PODMAN_HOST")
        .env_remove("CTRPRIMS_HOST")
        .arg("--host")
        .arg(host)
        .arg("--log-level")
        .arg("error")
        .arg("--timeout")
        .arg("5s")
        .args(args)
        .output()
        .expect("cli should run")
}

#[test]
fn ps_json_lists_containers() {
    let sock = spawn_engine("ps");
    let host = format!("unix://{}", sock.display());

    let output = run_cli(&host, &["ps", "--all", "--format", "json"]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let listed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let first = &listed.as_array().expect("array of containers")[0];
    assert_eq!(first["Id"], "abc123def4567890");
    assert_eq!(first["Image"], "nginx:1.27");
}

#[test]
fn ping_raw_prints_engine_reply() {
    let sock = spawn_engine("ping");
    let host = format!("unix://{}", sock.display());

    let output = run_cli(&host, &["ping", "--format", "raw"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "OK");
}

#[test]
fn inspect_missing_container_exits_not_found() {
    let sock = spawn_engine("inspect");
    let host = format!("unix://{}", sock.display());

    let output = run_cli(&host, &["inspect", "missing"]);
    assert_eq!(output.status.code(), Some(44));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("No such container: missing"),
        "stderr: {stderr}"
    );
}

#[test]
fn pull_error_envelope_fails_without_digest() {
    let sock = spawn_engine("pull");
    let host = format!("unix://{}", sock.display());

    let output = run_cli(&host, &["pull", "private:latest", "--format", "pretty"]);
    assert_eq!(output.status.code(), Some(69));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Digest"), "stdout: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pull access denied for private"), "stderr: {stderr}");
}

#[test]
fn unreachable_engine_exits_transport_error() {
    let dir = unique_temp_dir("unreachable");
    let host = format!("unix://{}", dir.join("nope.sock").display());

    let output = run_cli(&host, &["ping"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn unsupported_host_scheme_is_usage_error() {
    let output = run_cli("ftp://engine.example:21", &["ping"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn logs_requires_container_argument() {
    let output = Command::new(env!("CARGO_BIN_EXE_ctrprims"))
        .arg("logs")
        .output()
        .expect("cli should run");
    assert_eq!(output.status.code(), Some(2));
}
