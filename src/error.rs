//! Unified transport error type.

use crate::hooks::HookError;
use thiserror::Error;

/// Errors surfaced by transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An operation was invoked on a disposed transport.
    #[error("transport has been disposed")]
    Disposed,

    /// `open` was called while the transport is already open.
    #[error("transport is already open")]
    AlreadyOpen,

    /// An operation required an open transport, but it is not open.
    #[error("transport is not open")]
    NotOpen,

    /// A required argument was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A settings value has no equivalent on the underlying driver.
    #[error("unsupported setting: {0}")]
    Unsupported(String),

    /// An I/O error from the underlying port.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error reported by the serial port backend.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// A send/receive hook returned an error; the operation was aborted.
    #[error("hook failed: {0}")]
    Hook(#[source] HookError),
}

impl TransportError {
    /// Create an `InvalidArgument` error from a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an `Unsupported` error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TransportError::Disposed.to_string(), "transport has been disposed");
        assert_eq!(TransportError::AlreadyOpen.to_string(), "transport is already open");
        assert_eq!(TransportError::NotOpen.to_string(), "transport is not open");
        assert_eq!(
            TransportError::invalid_argument("port name must not be empty").to_string(),
            "invalid argument: port name must not be empty"
        );
        assert_eq!(
            TransportError::unsupported("parity Mark").to_string(),
            "unsupported setting: parity Mark"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err: TransportError = io.into();
        assert!(matches!(err, TransportError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: timed out");
    }

    #[test]
    fn test_hook_error_display() {
        let inner: HookError = "checksum mismatch".into();
        let err = TransportError::Hook(inner);
        assert_eq!(err.to_string(), "hook failed: checksum mismatch");
    }
}
