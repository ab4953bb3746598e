//! Integration tests for the daemon over its Unix socket: lifecycle,
//! booking flow, subscription streaming, restart persistence.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::TempDir;

// =============================================================================
// Test fixture
// =============================================================================

struct DaemonFixture {
    runtime_dir: TempDir,
    data_dir: TempDir,
    config_dir: TempDir,
    child: Option<Child>,
}

impl DaemonFixture {
    fn new() -> Self {
        Self {
            runtime_dir: TempDir::new().expect("create runtime dir"),
            data_dir: TempDir::new().expect("create data dir"),
            config_dir: TempDir::new().expect("create config dir"),
            child: None,
        }
    }

    fn with_config(config: &str) -> Self {
        let fixture = Self::new();
        std::fs::write(fixture.config_dir.path().join("config.toml"), config)
            .expect("write config");
        fixture
    }

    fn start(&mut self) {
        assert!(self.child.is_none(), "daemon already started");
        let child = Command::new(env!("CARGO_BIN_EXE_sd"))
            .args(["daemon", "run"])
            .env("SLOTDESK_RUNTIME_DIR", self.runtime_dir.path())
            .env("SLOTDESK_DATA_DIR", self.data_dir.path())
            .env("SLOTDESK_CONFIG_DIR", self.config_dir.path())
            .env("SLOTDESK_TESTING", "1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        self.child = Some(child);
        self.wait_for_socket();
    }

    fn socket_path(&self) -> PathBuf {
        self.runtime_dir.path().join("daemon.sock")
    }

    fn wait_for_socket(&self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if UnixStream::connect(self.socket_path()).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        panic!("daemon socket never appeared at {:?}", self.socket_path());
    }

    fn connect(&self) -> UnixStream {
        let stream = UnixStream::connect(self.socket_path()).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("set timeout");
        stream
    }

    /// One-shot ndjson request/response.
    fn request(&self, body: serde_json::Value) -> serde_json::Value {
        let mut stream = self.connect();
        let mut line = serde_json::to_vec(&body).expect("encode request");
        line.push(b'\n');
        stream.write_all(&line).expect("send request");

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        reader.read_line(&mut response).expect("read response");
        serde_json::from_str(response.trim_end()).expect("decode response")
    }

    /// Wait for the daemon process to exit on its own.
    fn wait_for_exit(&mut self) {
        let mut child = self.child.take().expect("daemon not started");
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if child.try_wait().expect("try_wait").is_some() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        let _ = child.kill();
        panic!("daemon did not exit after shutdown request");
    }

    fn shutdown(&mut self) {
        let resp = self.request(serde_json::json!({"op": "shutdown"}));
        assert!(resp.get("ok").is_some(), "shutdown refused: {resp}");
        self.wait_for_exit();
    }
}

impl Drop for DaemonFixture {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn booking_flow_over_the_socket() {
    let mut fixture = DaemonFixture::new();
    fixture.start();

    let resp = fixture.request(serde_json::json!({
        "op": "book",
        "date": "2025-11-03",
        "time": "09:00",
        "device_id": "dev0000001",
        "booked_by": "Ana",
    }));
    assert_eq!(resp["ok"]["key"], "2025-11-03_09:00", "book failed: {resp}");

    // duplicate booking
    let resp = fixture.request(serde_json::json!({
        "op": "book",
        "date": "2025-11-03",
        "time": "09:00",
        "device_id": "dev0000002",
        "booked_by": "Ben",
    }));
    assert_eq!(resp["err"]["code"], "slot_taken");

    // listing shows the booking
    let resp = fixture.request(serde_json::json!({"op": "bookings", "date": "2025-11-03"}));
    assert_eq!(resp["ok"]["bookings"]["09:00"]["booked_by"], "Ana");

    // a stranger cannot cancel
    let resp = fixture.request(serde_json::json!({
        "op": "cancel",
        "date": "2025-11-03",
        "time": "09:00",
        "device_id": "dev0000002",
    }));
    assert_eq!(resp["err"]["code"], "forbidden");
    assert_eq!(resp["err"]["details"]["retryable"], false);

    // the owner can, and the audit trail is reported
    let resp = fixture.request(serde_json::json!({
        "op": "cancel",
        "date": "2025-11-03",
        "time": "09:00",
        "device_id": "dev0000001",
    }));
    assert_eq!(resp["ok"]["audit_written"], true, "cancel failed: {resp}");

    let ledger = fixture
        .data_dir
        .path()
        .join("ledger")
        .join("bookings_2025-11-03.csv");
    let contents = std::fs::read_to_string(ledger).expect("ledger exists");
    assert!(contents.contains(",cancelled,"));

    fixture.shutdown();
}

#[test]
fn malformed_input_gets_typed_errors() {
    let mut fixture = DaemonFixture::new();
    fixture.start();

    let resp = fixture.request(serde_json::json!({
        "op": "book",
        "date": "2025-11-03",
        "time": "09:00",
        "booked_by": "Ana",
    }));
    assert_eq!(resp["err"]["code"], "missing_field");

    let resp = fixture.request(serde_json::json!({
        "op": "book",
        "date": "2025-11-03",
        "time": "09:07",
        "device_id": "dev0000001",
        "booked_by": "Ana",
    }));
    assert_eq!(resp["err"]["code"], "invalid_format");

    let resp = fixture.request(serde_json::json!({
        "op": "cancel",
        "date": "2025-11-03",
        "time": "09:00",
        "device_id": "dev0000001",
    }));
    assert_eq!(resp["err"]["code"], "not_found");

    fixture.shutdown();
}

#[test]
fn kiosk_and_admin_verification() {
    let mut fixture = DaemonFixture::with_config(
        "[admin]\npassword = \"secret-pw-123\"\n",
    );
    fixture.start();

    let resp = fixture.request(serde_json::json!({
        "op": "admin_verify",
        "password": "wrong",
    }));
    assert_eq!(resp["err"]["code"], "forbidden");

    let resp = fixture.request(serde_json::json!({
        "op": "admin_verify",
        "password": "secret-pw-123",
    }));
    assert!(resp.get("ok").is_some());

    let resp = fixture.request(serde_json::json!({
        "op": "book",
        "date": "2025-11-03",
        "time": "10:00",
        "device_id": "dev0000003",
        "booked_by": "Walk-up",
        "kiosk": true,
    }));
    assert!(resp.get("ok").is_some(), "kiosk book failed: {resp}");

    // same device, no admin: refused
    let resp = fixture.request(serde_json::json!({
        "op": "cancel",
        "date": "2025-11-03",
        "time": "10:00",
        "device_id": "dev0000003",
    }));
    assert_eq!(resp["err"]["code"], "forbidden");

    // any device with admin: allowed, recorded as completed
    let resp = fixture.request(serde_json::json!({
        "op": "cancel",
        "date": "2025-11-03",
        "time": "10:00",
        "device_id": "dev0000099",
        "is_admin": true,
        "reason": "completed",
    }));
    assert_eq!(resp["ok"]["reason"], "completed", "admin cancel failed: {resp}");

    fixture.shutdown();
}

#[test]
fn subscription_streams_booking_events() {
    let mut fixture = DaemonFixture::new();
    fixture.start();

    let mut stream = fixture.connect();
    stream
        .write_all(b"{\"op\":\"subscribe\",\"date\":\"2025-11-03\"}\n")
        .expect("send subscribe");
    let mut reader = BufReader::new(stream);

    let mut ack = String::new();
    reader.read_line(&mut ack).expect("read ack");
    let ack: serde_json::Value = serde_json::from_str(ack.trim_end()).expect("decode ack");
    assert_eq!(ack["ok"]["date"], "2025-11-03");

    fixture.request(serde_json::json!({
        "op": "book",
        "date": "2025-11-03",
        "time": "14:00",
        "device_id": "dev0000001",
        "booked_by": "Ana",
    }));

    let mut frame = String::new();
    reader.read_line(&mut frame).expect("read event frame");
    let event: serde_json::Value = serde_json::from_str(frame.trim_end()).expect("decode event");
    assert_eq!(event["type"], "slot");
    assert_eq!(event["action"], "booked");
    assert_eq!(event["slot_key"], "2025-11-03_14:00");

    fixture.shutdown();
}

#[test]
fn bookings_survive_daemon_restart() {
    let mut fixture = DaemonFixture::new();
    fixture.start();

    let resp = fixture.request(serde_json::json!({
        "op": "book",
        "date": "2025-11-03",
        "time": "09:15",
        "device_id": "abcdefghij",
        "booked_by": "Ana",
    }));
    assert!(resp.get("ok").is_some());

    fixture.shutdown();
    fixture.start();

    let resp = fixture.request(serde_json::json!({"op": "bookings", "date": "2025-11-03"}));
    assert_eq!(resp["ok"]["bookings"]["09:15"]["device_id"], "abcdefghij");
    assert_eq!(resp["ok"]["bookings"]["09:15"]["booked_by"], "Ana");

    fixture.shutdown();
}

#[test]
fn status_and_ping_respond() {
    let mut fixture = DaemonFixture::new();
    fixture.start();

    let resp = fixture.request(serde_json::json!({"op": "ping"}));
    assert!(resp.get("ok").is_some());

    let resp = fixture.request(serde_json::json!({"op": "status"}));
    assert_eq!(resp["ok"]["bookings"], 0);
    assert!(resp["ok"]["version"].is_string());

    fixture.shutdown();
}
