//! Error types for the RMI register engine and device lifecycle.

use hid_rmi_protocol::RmiProtocolError;
use thiserror::Error;

/// Failure reported by the underlying report transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Report rejected: {0}")]
    Rejected(String),
}

/// How bad an [`RmiError`] is for the attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Error, Debug)]
pub enum RmiError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Short write: expected {expected} bytes, sent {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("No response reading {addr:#06x} after {attempts} attempts")]
    ProtocolTimeout { addr: u16, attempts: u8 },

    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    #[error("PDT scan failed at {addr:#06x}: {source}")]
    Scan {
        addr: u16,
        #[source]
        source: Box<RmiError>,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] RmiProtocolError),

    #[error("Device not attached")]
    NotAttached,

    #[error("Recovery worker error: {0}")]
    Worker(String),
}

pub type RmiResult<T> = Result<T, RmiError>;

impl RmiError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RmiError::Transport(_) => ErrorSeverity::Critical,
            RmiError::ShortWrite { .. } => ErrorSeverity::Error,
            RmiError::ProtocolTimeout { .. } => ErrorSeverity::Warning,
            RmiError::UnsupportedDevice(_) => ErrorSeverity::Error,
            RmiError::Scan { .. } => ErrorSeverity::Error,
            RmiError::Protocol(_) => ErrorSeverity::Error,
            RmiError::NotAttached => ErrorSeverity::Info,
            RmiError::Worker(_) => ErrorSeverity::Error,
        }
    }

    /// Whether issuing the same transaction again might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RmiError::ProtocolTimeout { .. } => true,
            RmiError::Scan { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        RmiError::UnsupportedDevice(reason.into())
    }
}
