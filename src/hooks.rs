//! Interception hooks for data crossing the transport boundary.
//!
//! Hooks run at exactly two points: before data is written to the port and
//! after received data has been read, before subscribers are notified. A hook
//! consumes a buffer view and returns the view to use downstream, which lets
//! it observe, rewrite, or suppress (by returning an empty view) the data
//! without touching the transport's control flow.

use crate::buffer::BufferView;

/// Error returned by a hook. The transport wraps it into
/// [`TransportError::Hook`](crate::TransportError::Hook) and aborts the
/// operation that invoked the hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Hook methods invoked around send and receive.
///
/// `before_send` runs synchronously inside `send`, on the caller's thread.
/// `after_receive` runs on the driver's notification thread, before the
/// received-data event is published. Both default to passing the buffer
/// through unchanged.
///
/// The two methods may be invoked concurrently from different threads, so
/// implementations carry a `Send + Sync` bound. Hooks must not retain the
/// buffer beyond the call.
pub trait TransportHooks: Send + Sync {
    /// Invoked with the outgoing data; the returned buffer is what gets
    /// written to the port.
    fn before_send(&self, data: BufferView) -> Result<BufferView, HookError> {
        Ok(data)
    }

    /// Invoked with freshly received data; the returned buffer is what
    /// subscribers observe. Returning an empty buffer suppresses the
    /// notification.
    fn after_receive(&self, data: BufferView) -> Result<BufferView, HookError> {
        Ok(data)
    }
}
