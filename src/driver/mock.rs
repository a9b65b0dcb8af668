//! In-memory serial driver for tests.
//!
//! `MockDriver` simulates the underlying channel without hardware: inbound
//! data is injected into a read queue, outbound data is captured in a write
//! log, and `inject`/`trigger_*` fire notifications synchronously on the
//! calling thread (which plays the role of the driver-owned notification
//! thread).
//!
//! `MockDriver::pair` connects two drivers back to back, so two transports
//! built on them behave like ports joined by a null-modem cable. Paired
//! delivery notifies through a per-driver notifier thread, so the handler
//! never runs on the writer's thread.

use super::{DataEvent, DataHandler, FaultHandler, FaultKind, SerialDriver};
use crate::error::TransportError;
use crate::settings::SerialSettings;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{mpsc, Arc, Weak};
use std::thread;

#[derive(Default)]
struct MockState {
    configured: Option<SerialSettings>,
    open: bool,
    read_queue: VecDeque<u8>,
    write_log: Vec<Vec<u8>>,
    fail_open: bool,
    fail_write: bool,
    fail_read: bool,
    data_handler: Option<DataHandler>,
    fault_handler: Option<FaultHandler>,
    peer: Option<Weak<Mutex<MockState>>>,
    notify_tx: Option<mpsc::Sender<DataEvent>>,
}

/// Scriptable in-memory [`SerialDriver`].
///
/// The driver is a shallow handle over shared state; cloning it yields a
/// second handle to the same simulated channel, so a test can keep one while
/// handing the other to a transport.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create two drivers wired to each other: everything written on one
    /// side is queued on the other and its data handler fires on the
    /// receiving driver's notifier thread.
    pub fn pair() -> (Self, Self) {
        let a = Self::new();
        let b = Self::new();
        a.state.lock().peer = Some(Arc::downgrade(&b.state));
        b.state.lock().peer = Some(Arc::downgrade(&a.state));
        Self::spawn_notifier(&a.state);
        Self::spawn_notifier(&b.state);
        (a, b)
    }

    /// Start the notifier thread that fires the data handler for paired
    /// delivery. One thread per driver keeps dispatches sequential, so a
    /// published buffer is fully handled before the next signal.
    fn spawn_notifier(state: &Arc<Mutex<MockState>>) {
        let (tx, rx) = mpsc::channel::<DataEvent>();
        state.lock().notify_tx = Some(tx);
        let weak = Arc::downgrade(state);
        thread::spawn(move || {
            while let Ok(event) = rx.recv() {
                let handler = match weak.upgrade() {
                    Some(state) => state.lock().data_handler.clone(),
                    None => break,
                };
                if let Some(handler) = handler {
                    handler(event);
                }
            }
        });
    }

    /// Queue `data` as inbound bytes and fire the data-available handler,
    /// as the hardware would on arrival.
    pub fn inject(&self, data: &[u8]) {
        let handler = {
            let mut state = self.state.lock();
            state.read_queue.extend(data);
            state.data_handler.clone()
        };
        if let Some(handler) = handler {
            handler(DataEvent::DataReady);
        }
    }

    /// Fire the data handler with an explicit signal, without queuing bytes.
    pub fn trigger_data(&self, event: DataEvent) {
        let handler = self.state.lock().data_handler.clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Fire the fault handler with the given fault kind.
    pub fn trigger_fault(&self, fault: FaultKind) {
        let handler = self.state.lock().fault_handler.clone();
        if let Some(handler) = handler {
            handler(fault);
        }
    }

    /// All writes issued so far, one entry per `write_all` call.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Settings most recently applied via `configure`.
    pub fn configured_settings(&self) -> Option<SerialSettings> {
        self.state.lock().configured.clone()
    }

    /// Bytes currently queued for reading.
    pub fn pending_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Make the next `open` fail with an I/O error.
    pub fn fail_next_open(&self) {
        self.state.lock().fail_open = true;
    }

    /// Make every `write_all` fail with an I/O error until cleared.
    pub fn set_fail_write(&self, fail: bool) {
        self.state.lock().fail_write = fail;
    }

    /// Make every `read` fail with an I/O error until cleared.
    pub fn set_fail_read(&self, fail: bool) {
        self.state.lock().fail_read = fail;
    }

    fn deliver_to_peer(&self, data: &[u8]) {
        let peer = self.state.lock().peer.clone();
        let Some(peer) = peer.and_then(|weak| weak.upgrade()) else {
            return;
        };

        // Queue under the peer lock so back-to-back writes keep their byte
        // order, then signal the peer's notifier thread. The caller may
        // still hold its transport lock, so the handler must not run here.
        let notify = {
            let mut peer_state = peer.lock();
            if !peer_state.open {
                // Bytes sent to a closed port are lost on the wire.
                return;
            }
            peer_state.read_queue.extend(data);
            peer_state.notify_tx.clone()
        };

        if let Some(notify) = notify {
            let _ = notify.send(DataEvent::DataReady);
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialDriver for MockDriver {
    fn configure(&mut self, settings: &SerialSettings) -> Result<(), TransportError> {
        self.state.lock().configured = Some(settings.clone());
        Ok(())
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_open {
            state.fail_open = false;
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "simulated open failure",
            )));
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.state.lock().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            if state.fail_write {
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "simulated write failure",
                )));
            }
            state.write_log.push(data.to_vec());
        }
        self.deliver_to_peer(data);
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        let state = self.state.lock();
        if state.fail_read {
            return Err(TransportError::Io(io::Error::other("simulated read failure")));
        }
        Ok(state.read_queue.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if state.fail_read {
            return Err(TransportError::Io(io::Error::other("simulated read failure")));
        }

        let mut read = 0;
        for slot in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    read += 1;
                }
                None => break,
            }
        }
        Ok(read)
    }

    fn set_data_handler(&mut self, handler: DataHandler) {
        self.state.lock().data_handler = Some(handler);
    }

    fn set_fault_handler(&mut self, handler: FaultHandler) {
        self.state.lock().fault_handler = Some(handler);
    }

    fn shutdown(&mut self) {
        let mut state = self.state.lock();
        state.open = false;
        state.read_queue.clear();
        state.data_handler = None;
        state.fault_handler = None;
        // Dropping the sender lets the notifier thread exit.
        state.notify_tx = None;
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockDriver")
            .field("open", &state.open)
            .field("pending_bytes", &state.read_queue.len())
            .field("writes", &state.write_log.len())
            .finish()
    }
}
