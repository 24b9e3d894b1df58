//! Error types and process exit codes.

use thiserror::Error;

/// Everything that can stop the driver.
///
/// Each variant maps onto an [`ErrorKind`], which is what gets stored in the
/// shared run status and turned into the process exit code.
#[derive(Error, Debug)]
pub enum DrumError {
    #[error("drum kit not available: {0}")]
    TransportUnavailable(String),

    #[error("answer length mismatch: expected {expected} bytes, got {actual}")]
    ProtocolLengthMismatch { expected: usize, actual: usize },

    #[error("interrupt transfer failed: {0}")]
    TransferFailed(String),

    #[error("realtime host not available: {0}")]
    RealtimeHostUnavailable(String),

    #[error("realtime host shut down: {0}")]
    RealtimeHostShutdown(String),

    #[error("bad configuration: {0}")]
    BadConfiguration(String),
}

impl DrumError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DrumError::TransportUnavailable(_) => ErrorKind::TransportUnavailable,
            DrumError::ProtocolLengthMismatch { .. } => ErrorKind::ProtocolLengthMismatch,
            DrumError::TransferFailed(_) => ErrorKind::TransferFailed,
            DrumError::RealtimeHostUnavailable(_) => ErrorKind::RealtimeHostUnavailable,
            DrumError::RealtimeHostShutdown(_) => ErrorKind::RealtimeHostShutdown,
            DrumError::BadConfiguration(_) => ErrorKind::BadConfiguration,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

/// Fieldless mirror of [`DrumError`], small enough to live in an atomic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    ProtocolLengthMismatch = 0xff,
    TransferFailed = 0xfe,
    TransportUnavailable = 0xfd,
    RealtimeHostUnavailable = 0xfc,
    BadConfiguration = 0xfb,
    RealtimeHostShutdown = 0xfa,
}

impl ErrorKind {
    /// Exit code reported to the shell for this kind of failure.
    #[inline]
    pub fn exit_code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`exit_code`](Self::exit_code). `0` and unknown codes give `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0xff => Some(ErrorKind::ProtocolLengthMismatch),
            0xfe => Some(ErrorKind::TransferFailed),
            0xfd => Some(ErrorKind::TransportUnavailable),
            0xfc => Some(ErrorKind::RealtimeHostUnavailable),
            0xfb => Some(ErrorKind::BadConfiguration),
            0xfa => Some(ErrorKind::RealtimeHostShutdown),
            _ => None,
        }
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, DrumError>;
