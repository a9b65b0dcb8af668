//! Hardware integration tests.
//!
//! These require a real, cross-connected serial port pair (null-modem cable
//! or com0com/socat equivalent) named via the `SERIAL_TEST_PORT_A` and
//! `SERIAL_TEST_PORT_B` environment variables.
//!
//! Run with: cargo test --features hardware-tests

#![cfg(feature = "hardware-tests")]

use parking_lot::Mutex;
use serial_test::serial;
use serial_transport::{BufferView, SerialSettings, SerialTransport, Transport};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn port_pair() -> (String, String) {
    // Transport logs are handy when a hardware run misbehaves; enable with
    // RUST_LOG=serial_transport=trace.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let a = std::env::var("SERIAL_TEST_PORT_A").expect("SERIAL_TEST_PORT_A not set");
    let b = std::env::var("SERIAL_TEST_PORT_B").expect("SERIAL_TEST_PORT_B not set");
    (a, b)
}

fn create(port_name: &str) -> SerialTransport {
    let settings = SerialSettings {
        port_name: port_name.to_string(),
        ..SerialSettings::default()
    };
    Transport::create(settings).expect("create transport")
}

fn wait_for_bytes(received: &Arc<Mutex<Vec<u8>>>, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while received.lock().len() < expected {
        assert!(Instant::now() < deadline, "timed out waiting for {expected} bytes");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
#[serial]
fn open_close_reopen_on_real_port() {
    let (port_a, _) = port_pair();
    let transport = create(&port_a);

    transport.open().unwrap();
    transport.close().unwrap();
    transport.open().unwrap();
    transport.close().unwrap();
}

#[test]
#[serial]
fn bytes_cross_the_wire_in_order() {
    let (port_a, port_b) = port_pair();
    let sender = create(&port_a);
    let receiver = create(&port_b);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let _sub = receiver.subscribe(move |data| sink.lock().extend_from_slice(data.as_slice()));

    receiver.open().unwrap();
    sender.open().unwrap();

    sender.send(BufferView::from(b"hello, ")).unwrap();
    sender.send(BufferView::from(b"wire")).unwrap();

    wait_for_bytes(&received, 11);
    assert_eq!(*received.lock(), b"hello, wire");
}
