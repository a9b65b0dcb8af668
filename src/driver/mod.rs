//! Underlying serial channel abstraction.
//!
//! The transport talks to a [`SerialDriver`] instead of a concrete port so
//! that the real backend ([`SystemDriver`]) and an in-memory test double
//! ([`MockDriver`]) are interchangeable. The driver owns the notification
//! side of the contract: it invokes the registered data/fault handlers on a
//! thread of its choosing, independent of any caller thread.

mod mock;
mod system;

pub use mock::MockDriver;
pub use system::SystemDriver;

use crate::error::TransportError;
use crate::settings::SerialSettings;
use std::fmt;
use std::sync::Arc;

/// Signal carried by a data-available notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEvent {
    /// Spurious wakeup; there is nothing to read.
    NoData,
    /// At least one byte is waiting in the receive buffer.
    DataReady,
}

/// Hardware-level fault reported by the driver.
///
/// Purely observational: faults are logged by the transport and never affect
/// its lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Spurious notification; no fault occurred.
    NoFault,
    /// A framing error was detected.
    Framing,
    /// A character-buffer overrun occurred.
    Overrun,
    /// A parity error was detected.
    Parity,
    /// The receive buffer overflowed.
    ReceiveOverflow,
    /// The transmit buffer is full.
    TransmitFull,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoFault => "NoFault",
            Self::Framing => "Framing",
            Self::Overrun => "Overrun",
            Self::Parity => "Parity",
            Self::ReceiveOverflow => "ReceiveOverflow",
            Self::TransmitFull => "TransmitFull",
        };
        f.write_str(name)
    }
}

/// Callback invoked by the driver when received data may be available.
pub type DataHandler = Arc<dyn Fn(DataEvent) + Send + Sync>;

/// Callback invoked by the driver when a hardware-level fault occurs.
pub type FaultHandler = Arc<dyn Fn(FaultKind) + Send + Sync>;

/// Operations the transport requires from an underlying serial channel.
///
/// Handlers are registered once, before the first `open`. The driver may
/// invoke them from its own thread concurrently with caller threads; it must
/// stop invoking them after [`shutdown`](Self::shutdown).
pub trait SerialDriver: Send + fmt::Debug {
    /// Store the settings to program the channel with on the next `open`.
    fn configure(&mut self, settings: &SerialSettings) -> Result<(), TransportError>;

    /// Activate the channel with the configured settings.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Deactivate the channel. Notifications stop after this returns.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Whether the channel is currently active.
    fn is_open(&self) -> bool;

    /// Write all of `data` to the channel as a single write.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Number of bytes currently waiting in the receive buffer.
    fn bytes_to_read(&mut self) -> Result<usize, TransportError>;

    /// Read available bytes into `buffer`, returning the count read.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError>;

    /// Register the data-available notification handler.
    fn set_data_handler(&mut self, handler: DataHandler);

    /// Register the fault notification handler.
    fn set_fault_handler(&mut self, handler: FaultHandler);

    /// Release the channel and all driver resources. Idempotent.
    fn shutdown(&mut self);
}
