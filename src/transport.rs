//! Transport lifecycle state machine and factory.
//!
//! `SerialTransport` gates every operation by lifecycle state
//! (created → open ⇄ closed, any state → disposed) and bridges the driver's
//! asynchronous data-available notification into a synchronous
//! read → hook → publish sequence. The [`Transport`] factory validates the
//! settings and wires a transport to a driver.

use crate::buffer::BufferView;
use crate::driver::{DataEvent, FaultKind, SerialDriver, SystemDriver};
use crate::error::TransportError;
use crate::event::{EventSource, Subscription};
use crate::hooks::TransportHooks;
use crate::settings::SerialSettings;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{error, info, trace, warn};

/// Factory for [`SerialTransport`] instances.
///
/// Every constructor takes the settings by value, so the transport's active
/// configuration is a snapshot: mutating the caller's copy afterwards has no
/// effect.
pub struct Transport;

impl Transport {
    /// Create a transport over the system serial port named in `settings`.
    pub fn create(settings: SerialSettings) -> Result<SerialTransport, TransportError> {
        Self::create_with_driver(Box::new(SystemDriver::new()), settings, None)
    }

    /// Create a transport with send/receive interception hooks.
    pub fn create_with_hooks(
        settings: SerialSettings,
        hooks: Arc<dyn TransportHooks>,
    ) -> Result<SerialTransport, TransportError> {
        Self::create_with_driver(Box::new(SystemDriver::new()), settings, Some(hooks))
    }

    /// Create a transport over a caller-supplied driver.
    ///
    /// This is the injection seam used by tests ([`MockDriver`]) and by
    /// integrations that bring their own channel implementation.
    ///
    /// [`MockDriver`]: crate::driver::MockDriver
    pub fn create_with_driver(
        driver: Box<dyn SerialDriver>,
        settings: SerialSettings,
        hooks: Option<Arc<dyn TransportHooks>>,
    ) -> Result<SerialTransport, TransportError> {
        validate_settings(&settings)?;
        Ok(SerialTransport::new(driver, settings, hooks))
    }
}

fn validate_settings(settings: &SerialSettings) -> Result<(), TransportError> {
    if settings.port_name.trim().is_empty() {
        return Err(TransportError::invalid_argument("port name must not be empty"));
    }
    if settings.baud_rate == 0 {
        return Err(TransportError::invalid_argument("baud rate must be greater than zero"));
    }
    Ok(())
}

/// A byte-oriented, full-duplex transport over a serial channel.
///
/// A transport can be opened and closed multiple times. [`dispose`] is
/// terminal and idempotent; after it, every other operation fails with
/// [`TransportError::Disposed`]. Dropping the transport disposes it.
///
/// `open`, `close` and `send` are serialized against each other by an
/// internal lock on the driver handle; in particular, concurrent `send`
/// calls are written to the wire one at a time. The receive path runs on the
/// driver's notification thread and only contends for that lock while
/// draining the receive buffer.
///
/// [`dispose`]: SerialTransport::dispose
pub struct SerialTransport {
    inner: Arc<Inner>,
}

struct Inner {
    driver: Mutex<Box<dyn SerialDriver>>,
    settings: SerialSettings,
    hooks: Option<Arc<dyn TransportHooks>>,
    received: EventSource<BufferView>,
    disposed: AtomicBool,
    // Raised while close() holds the driver lock; see handle_data.
    closing: AtomicBool,
}

impl SerialTransport {
    fn new(
        mut driver: Box<dyn SerialDriver>,
        settings: SerialSettings,
        hooks: Option<Arc<dyn TransportHooks>>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let data_weak = Weak::clone(weak);
            driver.set_data_handler(Arc::new(move |event| {
                if let Some(inner) = data_weak.upgrade() {
                    inner.handle_data(event);
                }
            }));

            let fault_weak = Weak::clone(weak);
            driver.set_fault_handler(Arc::new(move |fault| {
                if let Some(inner) = fault_weak.upgrade() {
                    inner.handle_fault(fault);
                }
            }));

            Inner {
                driver: Mutex::new(driver),
                settings,
                hooks,
                received: EventSource::new(),
                disposed: AtomicBool::new(false),
                closing: AtomicBool::new(false),
            }
        });

        Self { inner }
    }

    /// Open the transport, programming the channel with the settings
    /// snapshot. Fails with [`TransportError::AlreadyOpen`] if already open;
    /// a failed open leaves the transport closed and re-openable.
    pub fn open(&self) -> Result<(), TransportError> {
        self.inner.open()
    }

    /// Close the transport. Calling `close` when not open is a no-op.
    pub fn close(&self) -> Result<(), TransportError> {
        self.inner.close()
    }

    /// Send the given data over the transport.
    ///
    /// The before-send hook (if any) runs first and may substitute the
    /// buffer; the resulting bytes are written as a single write. Success
    /// means the bytes were handed to the driver, not that the remote end
    /// received them.
    pub fn send(&self, data: BufferView) -> Result<(), TransportError> {
        self.inner.send(data)
    }

    /// Subscribe to received-data notifications.
    ///
    /// The callback runs on the driver's notification thread, once per
    /// received buffer, in publication order. Subscribing after `dispose`
    /// yields an inert subscription.
    pub fn subscribe(&self, callback: impl Fn(&BufferView) + Send + Sync + 'static) -> Subscription {
        self.inner.received.subscribe(callback)
    }

    /// Release the channel and stop all notifications. Idempotent; after
    /// the first call every other operation fails with
    /// [`TransportError::Disposed`].
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether the transport is currently open.
    pub fn is_open(&self) -> bool {
        !self.inner.disposed.load(Ordering::SeqCst) && self.inner.driver.lock().is_open()
    }

    /// Whether the transport has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// The settings snapshot this transport was created with.
    pub fn settings(&self) -> &SerialSettings {
        &self.inner.settings
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.inner.settings)
            .field("open", &self.is_open())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Inner {
    fn ensure_not_disposed(&self) -> Result<(), TransportError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed);
        }
        Ok(())
    }

    fn open(&self) -> Result<(), TransportError> {
        self.ensure_not_disposed()?;

        let mut driver = self.driver.lock();
        if driver.is_open() {
            return Err(TransportError::AlreadyOpen);
        }

        let result = driver
            .configure(&self.settings)
            .and_then(|()| driver.open());

        match result {
            Ok(()) => {
                info!(
                    port = %self.settings.port_name,
                    settings = %self.settings,
                    "opened serial transport"
                );
                Ok(())
            }
            Err(error) => {
                error!(
                    port = %self.settings.port_name,
                    settings = %self.settings,
                    %error,
                    "failed to open serial transport"
                );
                Err(error)
            }
        }
    }

    fn close(&self) -> Result<(), TransportError> {
        self.ensure_not_disposed()?;

        // The driver may join its notification thread inside close(). Raise
        // the flag before taking the lock so an in-flight dispatch backs off
        // instead of blocking on the lock held across that join.
        self.closing.store(true, Ordering::SeqCst);
        let result = self.close_locked();
        self.closing.store(false, Ordering::SeqCst);
        result
    }

    fn close_locked(&self) -> Result<(), TransportError> {
        let mut driver = self.driver.lock();
        if !driver.is_open() {
            return Ok(());
        }

        match driver.close() {
            Ok(()) => {
                info!(port = %self.settings.port_name, "closed serial transport");
                Ok(())
            }
            Err(error) => {
                error!(
                    port = %self.settings.port_name,
                    %error,
                    "failed to close serial transport"
                );
                Err(error)
            }
        }
    }

    fn send(&self, data: BufferView) -> Result<(), TransportError> {
        self.ensure_not_disposed()?;

        let mut driver = self.driver.lock();
        if !driver.is_open() {
            return Err(TransportError::NotOpen);
        }

        // The hook may substitute the buffer; a hook failure aborts the
        // send without writing anything.
        let data = match &self.hooks {
            Some(hooks) => match hooks.before_send(data) {
                Ok(data) => data,
                Err(cause) => {
                    error!(
                        port = %self.settings.port_name,
                        error = %cause,
                        "before-send hook failed; send aborted"
                    );
                    return Err(TransportError::Hook(cause));
                }
            },
            None => data,
        };

        match driver.write_all(data.as_slice()) {
            Ok(()) => {
                trace!(
                    port = %self.settings.port_name,
                    data = %data,
                    "sent data via serial transport"
                );
                Ok(())
            }
            Err(error) => {
                error!(
                    port = %self.settings.port_name,
                    data = %data,
                    %error,
                    "failed to send data via serial transport"
                );
                Err(error)
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.driver.lock().shutdown();
        self.received.close();
        info!(port = %self.settings.port_name, "disposed serial transport");
    }

    /// Receive dispatch, invoked by the driver's notification thread.
    ///
    /// Read failures are logged and swallowed (there is no caller to
    /// surface them to; the notification is dropped and the transport stays
    /// usable). Hook failures are logged at error severity and drop the
    /// notification.
    fn handle_data(&self, event: DataEvent) {
        if self.disposed.load(Ordering::SeqCst) || event == DataEvent::NoData {
            return;
        }

        let data = {
            // close() and dispose() hold the driver lock while the driver
            // joins its notification thread, which may be the thread running
            // this dispatch. Never block on the lock unconditionally; back
            // off and re-check the lifecycle flags so the join can complete.
            let mut driver = loop {
                if self.disposed.load(Ordering::SeqCst) || self.closing.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(guard) = self.driver.try_lock_for(Duration::from_millis(1)) {
                    break guard;
                }
            };
            if !driver.is_open() {
                return;
            }

            let pending = match driver.bytes_to_read() {
                Ok(pending) => pending,
                Err(error) => {
                    error!(
                        port = %self.settings.port_name,
                        %error,
                        "failed to query received byte count"
                    );
                    return;
                }
            };

            let mut buffer = vec![0u8; pending];
            let read = if pending == 0 {
                0
            } else {
                match driver.read(&mut buffer) {
                    Ok(read) => read,
                    Err(error) => {
                        error!(
                            port = %self.settings.port_name,
                            %error,
                            "failed to read received data"
                        );
                        return;
                    }
                }
            };
            buffer.truncate(read);
            BufferView::from(buffer)
        };

        trace!(
            port = %self.settings.port_name,
            data = %data,
            "received data via serial transport"
        );

        let data = match &self.hooks {
            Some(hooks) => match hooks.after_receive(data) {
                Ok(data) => data,
                Err(cause) => {
                    error!(
                        port = %self.settings.port_name,
                        error = %cause,
                        "after-receive hook failed; notification dropped"
                    );
                    return;
                }
            },
            None => data,
        };

        if !data.is_empty() {
            self.received.publish(&data);
        }
    }

    /// Fault dispatch, invoked by the driver on hardware-level faults.
    /// Purely observational; never raises and never changes state.
    fn handle_fault(&self, fault: FaultKind) {
        if self.disposed.load(Ordering::SeqCst) || fault == FaultKind::NoFault {
            return;
        }

        warn!(
            port = %self.settings.port_name,
            fault = %fault,
            "serial fault reported on transport"
        );
    }
}
