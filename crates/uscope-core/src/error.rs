//! Driver error taxonomy and its 1:1 mapping onto wire response codes.
//!
//! Every fallible operation in this crate returns `Result<T, DriverError>`.
//! The dispatcher is the single place that turns a `DriverError` into a
//! `ResponseCode` for the wire — see [`DriverError::response_code`].

use thiserror::Error;

/// Wire response code, exactly as specified in spec.md §6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResponseCode {
    Ok = 1,
    BitstreamNotFound = 2,
    InvalidCmdSchema = 3,
    InvalidArg = 4,
    BitstreamLoadFailed = 5,
    InternalError = 6,
    EmulationError = 7,
    DeploymentError = 8,
    HilBusConflictWarning = 9,
    DriverFileNotFound = 10,
    DriverWriteFailed = 11,
}

impl ResponseCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Sum error type for every recoverable fault the driver can report.
///
/// Address-below-base and MMIO SIGSEGV/SIGBUS faults are deliberately
/// *not* representable here: per spec.md §7 they abort the process via a
/// signal handler rather than propagating through a `Result`.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("malformed command envelope: {0}")]
    InvalidCmdSchema(String),

    #[error("invalid arguments for command: {0}")]
    InvalidArg(String),

    #[error("bitstream not found: {0}")]
    BitstreamNotFound(String),

    #[error("bitstream load timed out after {0} polling iterations")]
    BitstreamLoadFailed(u32),

    #[error("driver file not found: {0}")]
    DriverFileNotFound(String),

    #[error("driver write failed: {0}")]
    DriverWriteFailed(String),

    #[error("deployment conflict: {0}")]
    DeploymentError(String),

    #[error("HIL bus conflict at destination address {address}, channel {channel}")]
    HilBusConflict { address: u16, channel: u16 },

    #[error("emulation error: {0}")]
    EmulationError(String),

    #[error("internal driver error: {0}")]
    InternalError(String),
}

impl DriverError {
    pub fn response_code(&self) -> ResponseCode {
        match self {
            DriverError::InvalidCmdSchema(_) => ResponseCode::InvalidCmdSchema,
            DriverError::InvalidArg(_) => ResponseCode::InvalidArg,
            DriverError::BitstreamNotFound(_) => ResponseCode::BitstreamNotFound,
            DriverError::BitstreamLoadFailed(_) => ResponseCode::BitstreamLoadFailed,
            DriverError::DriverFileNotFound(_) => ResponseCode::DriverFileNotFound,
            DriverError::DriverWriteFailed(_) => ResponseCode::DriverWriteFailed,
            DriverError::DeploymentError(_) => ResponseCode::DeploymentError,
            DriverError::HilBusConflict { .. } => ResponseCode::HilBusConflictWarning,
            DriverError::EmulationError(_) => ResponseCode::EmulationError,
            DriverError::InternalError(_) => ResponseCode::InternalError,
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(e: serde_json::Error) -> Self {
        DriverError::InvalidArg(e.to_string())
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
