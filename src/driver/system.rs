//! Production serial driver backed by the `serialport` crate.
//!
//! `serialport` exposes no data-available callback, so the driver realizes
//! the asynchronous notification contract itself: `open` spawns a poller
//! thread that watches the receive buffer and invokes the registered data
//! handler whenever bytes are waiting. The handler runs on that thread,
//! which makes it the "driver-owned thread" of the transport's concurrency
//! model.

use super::{DataEvent, DataHandler, FaultHandler, SerialDriver};
use crate::error::TransportError;
use crate::settings::{Handshake, Parity, SerialSettings, StopBits};
use parking_lot::Mutex;
use std::fmt;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::warn;

/// Interval between receive-buffer polls.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Read timeout programmed into the port. Reads are only issued when the
/// poller has already seen waiting bytes, so this is a safety net rather
/// than a pacing mechanism.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

type SharedPort = Arc<Mutex<Box<dyn serialport::SerialPort>>>;

/// [`SerialDriver`] implementation over a real system serial port.
pub struct SystemDriver {
    settings: Option<SerialSettings>,
    port: Option<SharedPort>,
    poller: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    data_handler: Option<DataHandler>,
    fault_handler: Option<FaultHandler>,
}

impl SystemDriver {
    pub fn new() -> Self {
        Self {
            settings: None,
            port: None,
            poller: None,
            stop: Arc::new(AtomicBool::new(false)),
            data_handler: None,
            fault_handler: None,
        }
    }

    fn stop_poller(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.poller.take() {
            // The poller only sleeps in short intervals; joining is prompt.
            let _ = handle.join();
        }
    }

    fn locked_port(&self) -> Result<&SharedPort, TransportError> {
        self.port.as_ref().ok_or(TransportError::NotOpen)
    }
}

impl Default for SystemDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialDriver for SystemDriver {
    fn configure(&mut self, settings: &SerialSettings) -> Result<(), TransportError> {
        // Reject settings the backend cannot express before touching the
        // device, so a failed open leaves nothing half-programmed.
        convert_data_bits(settings.data_bits)?;
        convert_parity(settings.parity)?;
        convert_stop_bits(settings.stop_bits)?;
        convert_handshake(settings.handshake)?;

        self.settings = Some(settings.clone());
        Ok(())
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| TransportError::invalid_argument("driver has not been configured"))?;

        let port = serialport::new(settings.port_name.as_str(), settings.baud_rate)
            .data_bits(convert_data_bits(settings.data_bits)?)
            .parity(convert_parity(settings.parity)?)
            .stop_bits(convert_stop_bits(settings.stop_bits)?)
            .flow_control(convert_handshake(settings.handshake)?)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::InvalidInput => TransportError::invalid_argument(e.to_string()),
                _ => TransportError::Serial(e),
            })?;

        let port: SharedPort = Arc::new(Mutex::new(port));
        self.port = Some(Arc::clone(&port));

        self.stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&self.stop);
        let handler = self.data_handler.clone();
        let port_name = settings.port_name.clone();

        self.poller = Some(std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                let pending = port.lock().bytes_to_read();
                match pending {
                    Ok(n) if n > 0 => {
                        if let Some(handler) = &handler {
                            handler(DataEvent::DataReady);
                        }
                    }
                    Ok(_) => {}
                    Err(error) => {
                        if !stop.load(Ordering::Acquire) {
                            warn!(port = %port_name, %error, "receive poll failed; stopping poller");
                        }
                        break;
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }));

        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.stop_poller();
        self.port = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.locked_port()?;
        let mut port = port.lock();
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        let port = self.locked_port()?;
        let pending = port.lock().bytes_to_read()?;
        Ok(pending as usize)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        let port = self.locked_port()?;
        let read = port.lock().read(buffer)?;
        Ok(read)
    }

    fn set_data_handler(&mut self, handler: DataHandler) {
        self.data_handler = Some(handler);
    }

    fn set_fault_handler(&mut self, handler: FaultHandler) {
        self.fault_handler = Some(handler);
    }

    fn shutdown(&mut self) {
        self.stop_poller();
        self.port = None;
        self.data_handler = None;
        self.fault_handler = None;
    }
}

impl Drop for SystemDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SystemDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemDriver")
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Map the data-bit count onto the backend type.
fn convert_data_bits(bits: u8) -> Result<serialport::DataBits, TransportError> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(TransportError::unsupported(format!("data bits {other}"))),
    }
}

/// Map parity onto the backend type. `Mark` and `Space` have no backend
/// equivalent and are rejected.
fn convert_parity(parity: Parity) -> Result<serialport::Parity, TransportError> {
    match parity {
        Parity::None => Ok(serialport::Parity::None),
        Parity::Even => Ok(serialport::Parity::Even),
        Parity::Odd => Ok(serialport::Parity::Odd),
        Parity::Mark | Parity::Space => {
            Err(TransportError::unsupported(format!("parity {parity}")))
        }
    }
}

/// Map stop bits onto the backend type. 1.5 stop bits are rejected.
fn convert_stop_bits(stop_bits: StopBits) -> Result<serialport::StopBits, TransportError> {
    match stop_bits {
        StopBits::One => Ok(serialport::StopBits::One),
        StopBits::Two => Ok(serialport::StopBits::Two),
        StopBits::OnePointFive => {
            Err(TransportError::unsupported(format!("stop bits {stop_bits}")))
        }
    }
}

/// Map handshake onto the backend flow-control type. The combined
/// RTS + XON/XOFF mode has no backend equivalent and is rejected.
fn convert_handshake(handshake: Handshake) -> Result<serialport::FlowControl, TransportError> {
    match handshake {
        Handshake::None => Ok(serialport::FlowControl::None),
        Handshake::XOnXOff => Ok(serialport::FlowControl::Software),
        Handshake::RequestToSend => Ok(serialport::FlowControl::Hardware),
        Handshake::RequestToSendXOnXOff => {
            Err(TransportError::unsupported(format!("handshake {handshake}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_bits_conversion() {
        assert_eq!(convert_data_bits(5).unwrap(), serialport::DataBits::Five);
        assert_eq!(convert_data_bits(6).unwrap(), serialport::DataBits::Six);
        assert_eq!(convert_data_bits(7).unwrap(), serialport::DataBits::Seven);
        assert_eq!(convert_data_bits(8).unwrap(), serialport::DataBits::Eight);
        assert!(matches!(
            convert_data_bits(9),
            Err(TransportError::Unsupported(_))
        ));
        assert!(matches!(
            convert_data_bits(0),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[test]
    fn test_parity_conversion() {
        assert_eq!(convert_parity(Parity::None).unwrap(), serialport::Parity::None);
        assert_eq!(convert_parity(Parity::Even).unwrap(), serialport::Parity::Even);
        assert_eq!(convert_parity(Parity::Odd).unwrap(), serialport::Parity::Odd);
        assert!(matches!(
            convert_parity(Parity::Mark),
            Err(TransportError::Unsupported(_))
        ));
        assert!(matches!(
            convert_parity(Parity::Space),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[test]
    fn test_stop_bits_conversion() {
        assert_eq!(convert_stop_bits(StopBits::One).unwrap(), serialport::StopBits::One);
        assert_eq!(convert_stop_bits(StopBits::Two).unwrap(), serialport::StopBits::Two);
        assert!(matches!(
            convert_stop_bits(StopBits::OnePointFive),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[test]
    fn test_handshake_conversion() {
        assert_eq!(
            convert_handshake(Handshake::None).unwrap(),
            serialport::FlowControl::None
        );
        assert_eq!(
            convert_handshake(Handshake::XOnXOff).unwrap(),
            serialport::FlowControl::Software
        );
        assert_eq!(
            convert_handshake(Handshake::RequestToSend).unwrap(),
            serialport::FlowControl::Hardware
        );
        assert!(matches!(
            convert_handshake(Handshake::RequestToSendXOnXOff),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[test]
    fn test_configure_rejects_unsupported_settings() {
        let mut driver = SystemDriver::new();
        let settings = SerialSettings {
            parity: Parity::Mark,
            ..SerialSettings::default()
        };
        assert!(matches!(
            driver.configure(&settings),
            Err(TransportError::Unsupported(_))
        ));
        assert!(!driver.is_open());
    }

    #[test]
    fn test_open_without_configure_fails() {
        let mut driver = SystemDriver::new();
        assert!(matches!(
            driver.open(),
            Err(TransportError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_io_before_open_fails() {
        let mut driver = SystemDriver::new();
        assert!(matches!(driver.write_all(b"x"), Err(TransportError::NotOpen)));
        assert!(matches!(driver.bytes_to_read(), Err(TransportError::NotOpen)));
    }
}
