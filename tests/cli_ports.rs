// tests/cli_ports.rs

mod common;
use crate::common::{ServiceConfigBuilder, Workspace, assert_success, status_row, stdout};

use std::net::TcpListener;
use std::process::Command;

use herd_test_utils::builders::ConfigFileBuilder;

fn python3_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

#[test]
fn port_check_waits_for_the_listener() {
    if !python3_available() {
        eprintln!("python3 not found; skipping");
        return;
    }
    let port = free_port();
    let launch = format!("sleep 1; exec python3 -m http.server {port} --bind 127.0.0.1");
    let ws = Workspace::new(
        ConfigFileBuilder::new().with_service("web", ServiceConfigBuilder::new(&launch).port(port).build()),
    );

    let out = ws.herd(&["start", "web"]);
    assert_success(&out);
    let progress = stdout(&out);
    assert!(progress.contains("web: Success"), "{progress}");
    assert!(progress.contains("web > Build: Success"), "{progress}");
    assert!(progress.contains("web > Start: Success"), "{progress}");

    // The listener is up by the time start returns.
    std::net::TcpStream::connect(("127.0.0.1", port)).expect("service accepts connections");

    let table = stdout(&ws.herd(&["status", "web"]));
    let row = status_row(&table, "web").expect("web listed");
    assert!(row.contains("Running"), "{table}");
    assert!(row.contains(&port.to_string()), "{table}");

    assert_success(&ws.herd(&["stop", "web"]));
    assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
}
