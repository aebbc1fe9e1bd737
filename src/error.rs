use strum::Display;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Stack lock not acquired: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Table full: {0}")]
    NoMemory(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The stack accepted the call but rejected it at the ZCL level.
    #[error("ZCL status 0x{0:02X}")]
    ProtocolStatus(u8),

    #[error("Zigbee stack failure: {0}")]
    Stack(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

/// Flat error classification surfaced to hosts that only understand a single
/// OS-style error code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    Timeout,
    NotFound,
    NoMemory,
    NotSupported,
    ProtocolStatus,
    Fail,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BridgeError::InvalidState(_) => ErrorKind::InvalidState,
            BridgeError::Timeout(_) => ErrorKind::Timeout,
            BridgeError::NotFound(_) => ErrorKind::NotFound,
            BridgeError::NoMemory(_) => ErrorKind::NoMemory,
            BridgeError::NotSupported(_) => ErrorKind::NotSupported,
            BridgeError::ProtocolStatus(_) => ErrorKind::ProtocolStatus,
            BridgeError::Stack(_) | BridgeError::IoError(_) | BridgeError::SerdeJsonError(_) => {
                ErrorKind::Fail
            }
        }
    }

    pub(crate) fn invalid_arg(msg: impl Into<String>) -> Self {
        BridgeError::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        BridgeError::InvalidState(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        BridgeError::NotFound(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            BridgeError::invalid_arg("x").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(BridgeError::ProtocolStatus(0x87).kind(), ErrorKind::ProtocolStatus);
        assert_eq!(BridgeError::Stack("boom".into()).kind(), ErrorKind::Fail);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::NotSupported.to_string(), "NOT_SUPPORTED");
        assert_eq!(ErrorKind::NoMemory.to_string(), "NO_MEMORY");
    }

    #[test]
    fn test_protocol_status_message() {
        assert_eq!(BridgeError::ProtocolStatus(0x87).to_string(), "ZCL status 0x87");
    }
}
