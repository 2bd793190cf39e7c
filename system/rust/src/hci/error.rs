//! Errors produced while driving the controller

use std::fmt;

use super::ids::AdvertisingHandle;

/// A status code returned by the controller (5.3 Vol 1F)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u8);

#[allow(missing_docs)]
impl ErrorCode {
    pub const SUCCESS: Self = Self(0x00);
    pub const UNKNOWN_CONNECTION_IDENTIFIER: Self = Self(0x02);
    pub const HARDWARE_FAILURE: Self = Self(0x03);
    pub const MEMORY_CAPACITY_EXCEEDED: Self = Self(0x07);
    pub const COMMAND_DISALLOWED: Self = Self(0x0C);
    pub const UNSUPPORTED_FEATURE_OR_PARAMETER_VALUE: Self = Self(0x11);
    pub const INVALID_HCI_COMMAND_PARAMETERS: Self = Self(0x12);
    pub const REMOTE_USER_TERMINATED_CONNECTION: Self = Self(0x13);
    pub const UNKNOWN_ADVERTISING_IDENTIFIER: Self = Self(0x42);
    pub const LIMIT_REACHED: Self = Self(0x43);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller status {:#04x}", self.0)
    }
}

/// Failures detected by the host, before or instead of involving the
/// controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostError {
    /// The requested combination of options is not supported
    NotSupported,
    /// A caller-supplied parameter was invalid
    InvalidParameters,
    /// The advertising data exceeds the size limit
    AdvertisingDataTooLong,
    /// The scan response data exceeds the size limit
    ScanResponseTooLong,
    /// The operation failed, e.g. no advertising handle was available
    Failed,
    /// The operation was canceled before it completed
    Canceled,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HostError::NotSupported => "not supported",
            HostError::InvalidParameters => "invalid parameters",
            HostError::AdvertisingDataTooLong => "advertising data too long",
            HostError::ScanResponseTooLong => "scan response too long",
            HostError::Failed => "failed",
            HostError::Canceled => "canceled",
        };
        f.write_str(msg)
    }
}

/// Either a host-side or a controller-side failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Detected by the host
    Host(HostError),
    /// Reported by the controller in a command status or completion
    Controller(ErrorCode),
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        Error::Host(err)
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Error::Controller(code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Host(err) => write!(f, "host error: {err}"),
            Error::Controller(code) => write!(f, "{code}"),
        }
    }
}

impl std::error::Error for ErrorCode {}
impl std::error::Error for HostError {}
impl std::error::Error for Error {}

/// The result of a command or command batch
pub type Result<T> = std::result::Result<T, Error>;

/// Why an advertisement did not start. If a handle was provisionally
/// assigned before the failure, it is included so the caller can correlate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartAdvertisingError {
    /// The cause
    pub error: Error,
    /// The handle the failed operation concerned, if one was assigned
    pub handle: Option<AdvertisingHandle>,
}

impl StartAdvertisingError {
    /// A failure that happened before any handle was assigned
    pub fn without_handle(error: impl Into<Error>) -> Self {
        Self { error: error.into(), handle: None }
    }
}

impl fmt::Display for StartAdvertisingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle {
            Some(handle) => write!(f, "{} (handle {})", self.error, handle.0),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for StartAdvertisingError {}
