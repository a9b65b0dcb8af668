//! Serial byte transport with a strict open/close lifecycle.
//!
//! This library wraps a serial channel behind a small, thread-safe API:
//! open/close/send on caller threads, received data delivered asynchronously
//! to subscribers, and two interception hooks that can observe or rewrite
//! data in either direction.
//!
//! # Modules
//!
//! - `buffer`: immutable byte buffer views passed across every boundary
//! - `settings`: serial settings value objects and framing enums
//! - `hooks`: before-send / after-receive interception points
//! - `event`: broadcast primitive for received-data notifications
//! - `driver`: underlying channel abstraction (`serialport` backend + mock)
//! - `transport`: the lifecycle state machine and factory
//! - `error`: unified error handling
//!
//! # Example
//!
//! ```no_run
//! use serial_transport::{BufferView, SerialSettings, Transport};
//!
//! # fn main() -> Result<(), serial_transport::TransportError> {
//! let settings = SerialSettings {
//!     port_name: "/dev/ttyUSB0".to_string(),
//!     ..SerialSettings::default()
//! };
//!
//! let transport = Transport::create(settings)?;
//! let subscription = transport.subscribe(|data| {
//!     println!("received {data}");
//! });
//!
//! transport.open()?;
//! transport.send(BufferView::from(b"hello"))?;
//! transport.close()?;
//! subscription.unsubscribe();
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through [`tracing`]; without a subscriber installed the
//! transport is silent, which is the default no-op sink.

pub mod buffer;
pub mod driver;
pub mod error;
pub mod event;
pub mod hooks;
pub mod settings;
pub mod transport;

// Re-export the public surface for convenience.
pub use buffer::BufferView;
pub use driver::{DataEvent, FaultKind, MockDriver, SerialDriver, SystemDriver};
pub use error::TransportError;
pub use event::{EventSource, Subscription};
pub use hooks::{HookError, TransportHooks};
pub use settings::{Handshake, Parity, SerialSettings, StopBits};
pub use transport::{SerialTransport, Transport};
